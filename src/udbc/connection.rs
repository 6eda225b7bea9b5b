use crate::error::{DbError, FeatureError};
use async_trait::async_trait;
use std::time::Duration;

/// A live connection handed out by a driver.
///
/// The timeout operations are optional: drivers that do not override them
/// report [`FeatureError::NotImplemented`].
#[async_trait]
pub trait Connection: Send + Sync {
    async fn create_statement(&self) -> Result<Box<dyn Statement>, DbError>;

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbError>;

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<(), DbError>;

    /// Current protocol-level read timeout. `Duration::ZERO` means none.
    async fn network_timeout(&self) -> Result<Duration, FeatureError> {
        Err(FeatureError::NotImplemented)
    }

    async fn set_network_timeout(&self, _timeout: Duration) -> Result<(), FeatureError> {
        Err(FeatureError::NotImplemented)
    }

    async fn close(&self) -> Result<(), DbError>;
}

#[async_trait]
pub trait Statement: Send + Sync {
    /// Executes `sql` and returns the number of affected rows.
    async fn execute(&self, sql: &str) -> Result<u64, DbError>;

    async fn set_query_timeout(&self, _timeout: Duration) -> Result<(), FeatureError> {
        Err(FeatureError::NotImplemented)
    }

    async fn close(&self) -> Result<(), DbError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::None => "NONE",
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Parses `TRANSACTION_READ_COMMITTED`, `READ_COMMITTED` or `read committed`.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let normalized = normalized
            .strip_prefix("TRANSACTION_")
            .unwrap_or(&normalized);
        match normalized {
            "NONE" => Some(IsolationLevel::None),
            "READ_UNCOMMITTED" => Some(IsolationLevel::ReadUncommitted),
            "READ_COMMITTED" => Some(IsolationLevel::ReadCommitted),
            "REPEATABLE_READ" => Some(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Some(IsolationLevel::Serializable),
            _ => None,
        }
    }
}
