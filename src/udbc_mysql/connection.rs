use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::Conn;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::{DbError, FeatureError};
use crate::udbc::connection::{Connection, IsolationLevel, Statement};

// MySQL: "Unknown system variable", e.g. max_execution_time on MariaDB or < 5.7.8
const ER_UNKNOWN_SYSTEM_VARIABLE: u16 = 1193;

type SharedConn = Arc<Mutex<Option<Conn>>>;

pub struct MysqlConnection {
    conn: SharedConn,
}

impl MysqlConnection {
    pub fn new(conn: Conn) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }
}

async fn run(conn: &SharedConn, sql: &str) -> Result<u64, DbError> {
    let mut guard = conn.lock().await;
    let conn = guard
        .as_mut()
        .ok_or_else(|| DbError::Connection("connection is closed".to_string()))?;
    conn.query_drop(sql).await?;
    Ok(conn.affected_rows())
}

#[async_trait]
impl Connection for MysqlConnection {
    async fn create_statement(&self) -> Result<Box<dyn Statement>, DbError> {
        if self.conn.lock().await.is_none() {
            return Err(DbError::Connection("connection is closed".to_string()));
        }
        Ok(Box::new(MysqlStatement {
            conn: self.conn.clone(),
            query_timeout_ms: AtomicU64::new(0),
        }))
    }

    async fn set_auto_commit(&self, auto_commit: bool) -> Result<(), DbError> {
        let flag = if auto_commit { 1 } else { 0 };
        run(&self.conn, &format!("SET autocommit = {}", flag)).await?;
        Ok(())
    }

    async fn set_transaction_isolation(&self, level: IsolationLevel) -> Result<(), DbError> {
        if level == IsolationLevel::None {
            return Err(DbError::InvalidIsolation(level.as_sql().to_string()));
        }
        run(
            &self.conn,
            &format!("SET SESSION TRANSACTION ISOLATION LEVEL {}", level.as_sql()),
        )
        .await?;
        Ok(())
    }

    async fn network_timeout(&self) -> Result<Duration, FeatureError> {
        Err(FeatureError::NotSupported(
            "mysql_async does not expose per-connection socket timeouts".to_string(),
        ))
    }

    async fn close(&self) -> Result<(), DbError> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.disconnect().await?;
        }
        Ok(())
    }
}

/// Statement over a shared connection. The query timeout is kept on the
/// statement and sent as an optimizer hint with each `SELECT`, so it never
/// changes session state seen by later statements.
pub struct MysqlStatement {
    conn: SharedConn,
    query_timeout_ms: AtomicU64,
}

/// Adds a `MAX_EXECUTION_TIME` hint to a `SELECT`. The server only honours
/// the hint on top-level `SELECT` statements, other statements are sent as-is.
fn with_execution_time(sql: &str, timeout_ms: u64) -> String {
    let trimmed = sql.trim_start();
    let is_select = trimmed
        .get(..6)
        .is_some_and(|kw| kw.eq_ignore_ascii_case("select"))
        && !trimmed[6..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_');
    if timeout_ms == 0 || !is_select {
        return sql.to_string();
    }
    format!(
        "{} /*+ MAX_EXECUTION_TIME({}) */{}",
        &trimmed[..6],
        timeout_ms,
        &trimmed[6..]
    )
}

/// Maps the failure of the capability check. An unknown `max_execution_time`
/// variable means the server has no statement execution limit.
fn query_timeout_error(e: mysql_async::Error) -> FeatureError {
    match e {
        mysql_async::Error::Server(e) if e.code == ER_UNKNOWN_SYSTEM_VARIABLE => {
            FeatureError::NotSupported(e.message)
        }
        e => FeatureError::Other(e.into()),
    }
}

#[async_trait]
impl Statement for MysqlStatement {
    async fn execute(&self, sql: &str) -> Result<u64, DbError> {
        let sql = with_execution_time(sql, self.query_timeout_ms.load(Ordering::Relaxed));
        run(&self.conn, &sql).await
    }

    async fn set_query_timeout(&self, timeout: Duration) -> Result<(), FeatureError> {
        {
            let mut guard = self.conn.lock().await;
            let conn = guard
                .as_mut()
                .ok_or_else(|| DbError::Connection("connection is closed".to_string()))?;
            // Read-only check, the session variable itself is left alone.
            conn.query_drop("SELECT @@max_execution_time")
                .await
                .map_err(query_timeout_error)?;
        }
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.query_timeout_ms.store(ms, Ordering::Relaxed);
        Ok(())
    }

    // Statements share the connection; nothing to release.
    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}
