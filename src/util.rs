//! Small helpers the pool runs around connection setup and teardown.

use crate::capability::CapabilityCache;
use crate::error::{DbError, FeatureError};
use crate::udbc::connection::{Connection, IsolationLevel};
use crate::udbc::data_source::DataSource;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lower bound applied to network timeouts handed to drivers.
pub const MIN_NETWORK_TIMEOUT: Duration = Duration::from_millis(250);

/// Lower bound applied to login timeouts handed to data sources.
pub const MIN_LOGIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Closes `connection`, logging and discarding any error.
pub async fn quietly_close_connection(connection: Option<Box<dyn Connection>>) {
    if let Some(connection) = connection {
        if let Err(e) = connection.close().await {
            debug!("error while closing connection: {}", e);
        }
    }
}

pub fn elapsed_millis(start: Instant) -> u128 {
    start.elapsed().as_millis()
}

pub async fn quietly_sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Runs the configured init SQL with auto-commit on. The statement is closed
/// even when execution fails.
pub async fn execute_sql_auto_commit(
    connection: &dyn Connection,
    sql: Option<&str>,
) -> Result<(), DbError> {
    let Some(sql) = sql else {
        return Ok(());
    };
    connection.set_auto_commit(true).await?;
    let statement = connection.create_statement().await?;
    let result = statement.execute(sql).await;
    let closed = statement.close().await;
    result?;
    closed
}

/// Maps a configured isolation name to a level. `None` means "driver default".
pub fn transaction_isolation(name: Option<&str>) -> Result<Option<IsolationLevel>, DbError> {
    match name {
        None => Ok(None),
        Some(name) => IsolationLevel::from_name(name)
            .map(Some)
            .ok_or_else(|| DbError::InvalidIsolation(name.to_string())),
    }
}

/// Applies a network timeout of at least [`MIN_NETWORK_TIMEOUT`] and returns
/// the previous value so it can be restored later. Does nothing and returns
/// `Duration::ZERO` when `use_network_timeout` is false.
pub async fn set_network_timeout(
    connection: &dyn Connection,
    timeout: Duration,
    use_network_timeout: bool,
) -> Result<Duration, DbError> {
    if !use_network_timeout {
        return Ok(Duration::ZERO);
    }
    let previous = connection.network_timeout().await.map_err(feature_failure)?;
    connection
        .set_network_timeout(timeout.max(MIN_NETWORK_TIMEOUT))
        .await
        .map_err(feature_failure)?;
    Ok(previous)
}

/// Probes network timeout support once through `cache`, then applies the
/// timeout only when the driver has it.
pub async fn set_network_timeout_if_supported(
    cache: &CapabilityCache,
    connection: &dyn Connection,
    timeout: Duration,
) -> Result<Duration, DbError> {
    let supported = cache.probe_network_timeout(connection).await?;
    set_network_timeout(connection, timeout, supported).await
}

/// Passes the pool's connection timeout on to the data source as its login
/// timeout. `Duration::MAX` means "wait forever" and is not forwarded.
pub fn set_login_timeout(data_source: &dyn DataSource, connection_timeout: Duration) {
    if connection_timeout == Duration::MAX {
        return;
    }
    let timeout = Duration::from_secs(connection_timeout.max(MIN_LOGIN_TIMEOUT).as_secs());
    if let Err(e) = data_source.set_login_timeout(timeout) {
        warn!("unable to set data source login timeout: {}", e);
    }
}

fn feature_failure(e: FeatureError) -> DbError {
    match e {
        FeatureError::Other(e) => e,
        other => DbError::Driver(Box::new(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PropertyError;
    use crate::properties::Properties;
    use crate::udbc::connection::Statement;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal(Mutex<Vec<String>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct RecordingConnection {
        journal: Arc<Journal>,
        fail_execute: bool,
        timeout: Mutex<Duration>,
    }

    impl RecordingConnection {
        fn new(journal: Arc<Journal>) -> Self {
            Self {
                journal,
                fail_execute: false,
                timeout: Mutex::new(Duration::from_secs(30)),
            }
        }
    }

    struct RecordingStatement {
        journal: Arc<Journal>,
        fail_execute: bool,
    }

    #[async_trait]
    impl Statement for RecordingStatement {
        async fn execute(&self, sql: &str) -> Result<u64, DbError> {
            self.journal.push(format!("execute {sql}"));
            if self.fail_execute {
                return Err(DbError::Query("syntax error".into()));
            }
            Ok(0)
        }

        async fn close(&self) -> Result<(), DbError> {
            self.journal.push("close statement");
            Ok(())
        }
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn create_statement(&self) -> Result<Box<dyn Statement>, DbError> {
            Ok(Box::new(RecordingStatement {
                journal: self.journal.clone(),
                fail_execute: self.fail_execute,
            }))
        }

        async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbError> {
            self.journal.push(format!("auto_commit {auto_commit}"));
            Ok(())
        }

        async fn set_transaction_isolation(&self, _level: IsolationLevel) -> Result<(), DbError> {
            Ok(())
        }

        async fn network_timeout(&self) -> Result<Duration, FeatureError> {
            Ok(*self.timeout.lock().unwrap())
        }

        async fn set_network_timeout(&self, timeout: Duration) -> Result<(), FeatureError> {
            *self.timeout.lock().unwrap() = timeout;
            Ok(())
        }

        async fn close(&self) -> Result<(), DbError> {
            self.journal.push("close connection");
            Err(DbError::Connection("already closed".into()))
        }
    }

    #[tokio::test]
    async fn test_init_sql_runs_with_auto_commit() {
        let journal = Arc::new(Journal::default());
        let conn = RecordingConnection::new(journal.clone());
        execute_sql_auto_commit(&conn, Some("SET NAMES utf8mb4")).await.unwrap();
        assert_eq!(
            journal.entries(),
            vec!["auto_commit true", "execute SET NAMES utf8mb4", "close statement"]
        );
    }

    #[tokio::test]
    async fn test_init_sql_failure_still_closes_statement() {
        let journal = Arc::new(Journal::default());
        let mut conn = RecordingConnection::new(journal.clone());
        conn.fail_execute = true;
        let err = execute_sql_auto_commit(&conn, Some("SELEC 1")).await.unwrap_err();
        assert!(matches!(err, DbError::Query(_)));
        assert_eq!(journal.entries().last().map(String::as_str), Some("close statement"));
    }

    #[tokio::test]
    async fn test_no_init_sql_is_noop() {
        let journal = Arc::new(Journal::default());
        let conn = RecordingConnection::new(journal.clone());
        execute_sql_auto_commit(&conn, None).await.unwrap();
        assert!(journal.entries().is_empty());
    }

    #[tokio::test]
    async fn test_quiet_close_swallows_error() {
        let journal = Arc::new(Journal::default());
        let conn: Box<dyn Connection> = Box::new(RecordingConnection::new(journal.clone()));
        quietly_close_connection(Some(conn)).await;
        quietly_close_connection(None).await;
        assert_eq!(journal.entries(), vec!["close connection"]);
    }

    #[tokio::test]
    async fn test_network_timeout_floor_and_previous_value() {
        let conn = RecordingConnection::new(Arc::new(Journal::default()));
        let previous = set_network_timeout(&conn, Duration::from_millis(10), true)
            .await
            .unwrap();
        assert_eq!(previous, Duration::from_secs(30));
        assert_eq!(*conn.timeout.lock().unwrap(), MIN_NETWORK_TIMEOUT);

        let skipped = set_network_timeout(&conn, Duration::from_secs(9), false)
            .await
            .unwrap();
        assert_eq!(skipped, Duration::ZERO);
        assert_eq!(*conn.timeout.lock().unwrap(), MIN_NETWORK_TIMEOUT);
    }

    #[tokio::test]
    async fn test_network_timeout_through_cache() {
        let cache = CapabilityCache::new();
        let conn = RecordingConnection::new(Arc::new(Journal::default()));
        let previous = set_network_timeout_if_supported(&cache, &conn, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(previous, Duration::from_secs(30));
        assert_eq!(*conn.timeout.lock().unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_transaction_isolation() {
        assert_eq!(transaction_isolation(None).unwrap(), None);
        assert_eq!(
            transaction_isolation(Some("TRANSACTION_SERIALIZABLE")).unwrap(),
            Some(IsolationLevel::Serializable)
        );
        assert!(matches!(
            transaction_isolation(Some("TRANSACTION_BOGUS")),
            Err(DbError::InvalidIsolation(name)) if name == "TRANSACTION_BOGUS"
        ));
    }

    #[derive(Default)]
    struct TimeoutSink {
        login_timeout: Mutex<Option<Duration>>,
        refuse: bool,
    }

    impl Properties for TimeoutSink {
        fn set_property(&mut self, name: &str, _value: &str) -> Result<(), PropertyError> {
            Err(PropertyError::Unknown(name.to_string()))
        }
    }

    #[async_trait]
    impl DataSource for TimeoutSink {
        async fn connection(&self) -> Result<Box<dyn Connection>, DbError> {
            Err(DbError::Connection("unused".into()))
        }

        fn set_login_timeout(&self, timeout: Duration) -> Result<(), FeatureError> {
            if self.refuse {
                return Err(FeatureError::NotSupported("login timeout".into()));
            }
            *self.login_timeout.lock().unwrap() = Some(timeout);
            Ok(())
        }
    }

    #[test]
    fn test_login_timeout() {
        let sink = TimeoutSink::default();
        set_login_timeout(&sink, Duration::from_millis(300));
        assert_eq!(*sink.login_timeout.lock().unwrap(), Some(Duration::from_secs(1)));

        set_login_timeout(&sink, Duration::from_millis(30_900));
        assert_eq!(*sink.login_timeout.lock().unwrap(), Some(Duration::from_secs(30)));

        let untouched = TimeoutSink::default();
        set_login_timeout(&untouched, Duration::MAX);
        assert_eq!(*untouched.login_timeout.lock().unwrap(), None);

        let refusing = TimeoutSink {
            refuse: true,
            ..Default::default()
        };
        set_login_timeout(&refusing, Duration::from_secs(5));
        assert_eq!(*refusing.login_timeout.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn test_sleep_and_elapsed() {
        let start = Instant::now();
        quietly_sleep(Duration::from_millis(20)).await;
        assert!(elapsed_millis(start) >= 20);
    }
}
