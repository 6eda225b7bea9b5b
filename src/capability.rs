//! Process-wide cache of optional driver features.
//!
//! Each [`Capability`] owns one atomic tri-state cell. The first probe decides
//! it; after that every call is a plain load. Racing first probes may both run
//! the driver operation and both store the same terminal value, so the cells
//! use plain stores rather than compare-and-swap.

use crate::error::{DbError, FeatureError};
use crate::udbc::connection::{Connection, Statement};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tracing::{debug, info};

static CAPABILITIES: CapabilityCache = CapabilityCache::new();

/// Returns the process-wide capability cache.
pub fn capabilities() -> &'static CapabilityCache {
    &CAPABILITIES
}

/// Pure read of the process-wide cache, see [`CapabilityCache::is_supported`].
pub fn is_supported(capability: Capability) -> Option<bool> {
    CAPABILITIES.is_supported(capability)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Connection-level network timeout (`network_timeout` / `set_network_timeout`).
    NetworkTimeout,
    /// Statement-level query timeout (`set_query_timeout`).
    QueryTimeout,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::NetworkTimeout => "network timeout",
            Capability::QueryTimeout => "query timeout",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Support {
    Unknown = 0,
    Supported = 1,
    Unsupported = 2,
}

impl Support {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Support::Supported,
            2 => Support::Unsupported,
            _ => Support::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Support::Unknown)
    }
}

struct Cell(AtomicU8);

impl Cell {
    const fn new() -> Self {
        Cell(AtomicU8::new(Support::Unknown as u8))
    }

    fn load(&self) -> Support {
        Support::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, support: Support) {
        self.0.store(support as u8, Ordering::Release);
    }
}

pub struct CapabilityCache {
    network_timeout: Cell,
    query_timeout: Cell,
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityCache {
    pub const fn new() -> Self {
        Self {
            network_timeout: Cell::new(),
            query_timeout: Cell::new(),
        }
    }

    fn cell(&self, capability: Capability) -> &Cell {
        match capability {
            Capability::NetworkTimeout => &self.network_timeout,
            Capability::QueryTimeout => &self.query_timeout,
        }
    }

    pub fn support(&self, capability: Capability) -> Support {
        self.cell(capability).load()
    }

    /// `None` until a probe has decided the feature. Once `Some`, the answer
    /// stays the same for the lifetime of the cache.
    pub fn is_supported(&self, capability: Capability) -> Option<bool> {
        match self.support(capability) {
            Support::Unknown => None,
            Support::Supported => Some(true),
            Support::Unsupported => Some(false),
        }
    }

    /// Records a terminal state. A decided cell is never rewritten.
    fn settle(&self, capability: Capability, support: Support) {
        let cell = self.cell(capability);
        if cell.load().is_terminal() {
            return;
        }
        cell.store(support);
        match support {
            Support::Unsupported => info!("driver does not support {}, disabling it", capability.as_str()),
            _ => debug!("driver supports {}", capability.as_str()),
        }
    }

    /// Folds the two "feature missing" signatures into the cache. `Ok(None)`
    /// means the feature turned out to be unsupported.
    fn classify<T>(
        &self,
        capability: Capability,
        result: Result<T, FeatureError>,
    ) -> Result<Option<T>, DbError> {
        match result {
            Ok(v) => {
                self.settle(capability, Support::Supported);
                Ok(Some(v))
            }
            Err(FeatureError::Other(e)) => Err(e),
            Err(e) => {
                debug!("{} probe reported: {}", capability.as_str(), e);
                self.settle(capability, Support::Unsupported);
                Ok(None)
            }
        }
    }

    /// Whether the driver behind `conn` implements network timeouts.
    ///
    /// Only the first call per cache talks to the driver. A failure other than
    /// "not implemented"/"not supported" is returned and leaves the flag
    /// undecided.
    pub async fn probe_network_timeout(&self, conn: &dyn Connection) -> Result<bool, DbError> {
        match self.support(Capability::NetworkTimeout) {
            Support::Supported => return Ok(true),
            Support::Unsupported => return Ok(false),
            Support::Unknown => {}
        }
        let probed = self.classify(Capability::NetworkTimeout, conn.network_timeout().await)?;
        Ok(probed.is_some())
    }

    /// Sets the query timeout on `stmt` unless the driver is known not to
    /// support it.
    pub async fn set_query_timeout(
        &self,
        stmt: &dyn Statement,
        timeout: Duration,
    ) -> Result<(), DbError> {
        // Undecided drivers get the call; it decides the flag.
        if self.is_supported(Capability::QueryTimeout) == Some(false) {
            return Ok(());
        }
        self.classify(Capability::QueryTimeout, stmt.set_query_timeout(timeout).await)?;
        Ok(())
    }
}
