use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use tracing::debug;

use crate::error::DbError;
use crate::properties::PropertyBag;
use crate::udbc::connection::Connection;
use crate::udbc::driver::Driver;

// Global singleton
pub static DRIVERS: LazyLock<DriverManager> = LazyLock::new(DriverManager::new);

/// Returns the process-wide driver registry.
pub fn driver_mgr() -> &'static DriverManager {
    &DRIVERS
}

/// Registry of drivers keyed by URL scheme
pub struct DriverManager {
    drivers: DashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverManager {
    pub fn new() -> Self {
        Self {
            drivers: DashMap::new(),
        }
    }

    /// Registers a driver, replacing any previous driver for the same scheme.
    pub fn register(&self, driver: impl Driver + 'static) -> Option<Arc<dyn Driver>> {
        let scheme = driver.scheme().to_ascii_lowercase();
        debug!("registering driver: name={}, scheme={}", driver.name(), scheme);
        self.drivers.insert(scheme, Arc::new(driver))
    }

    pub fn deregister(&self, scheme: &str) -> Option<Arc<dyn Driver>> {
        self.drivers
            .remove(&scheme.to_ascii_lowercase())
            .map(|(_, driver)| driver)
    }

    /// Finds the driver responsible for `url`.
    pub fn driver_for(&self, url: &str) -> Result<Arc<dyn Driver>, DbError> {
        let scheme = scheme_of(url)?;
        self.drivers
            .get(&scheme)
            .map(|v| v.value().clone())
            .ok_or(DbError::UnsupportedDatabaseType(scheme))
    }

    pub async fn connect(
        &self,
        url: &str,
        props: &PropertyBag,
    ) -> Result<Box<dyn Connection>, DbError> {
        let driver = self.driver_for(url)?;
        driver.connect(url, props).await
    }
}

/// Extracts the lower-cased scheme of `url`, ignoring a leading `jdbc:`.
pub fn scheme_of(url: &str) -> Result<String, DbError> {
    let url = url.trim();
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    match url.split_once("://") {
        Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_ascii_lowercase()),
        _ => Err(DbError::InvalidDatabaseUrl(url.to_string())),
    }
}
