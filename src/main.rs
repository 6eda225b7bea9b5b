use async_trait::async_trait;
use std::sync::mpsc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};
use udbc_provision::driver_manager::driver_mgr;
use udbc_provision::error::{DbError, FeatureError};
use udbc_provision::executor::CallerRuns;
use udbc_provision::properties::PropertyBag;
use udbc_provision::udbc::{Connection, Driver, IsolationLevel, Statement};
use udbc_provision::{DataSourceConfig, capabilities, provision, resolve_data_source, util};

/// Answers every statement locally; enough to walk through pool setup
/// without a database server.
struct LoopbackDriver;

struct LoopbackConnection;

struct LoopbackStatement;

#[async_trait]
impl Driver for LoopbackDriver {
    fn name(&self) -> &str {
        "loopback"
    }

    fn scheme(&self) -> &str {
        "loopback"
    }

    async fn connect(
        &self,
        url: &str,
        props: &PropertyBag,
    ) -> Result<Box<dyn Connection>, DbError> {
        info!("loopback connect {} ({} properties)", url, props.len());
        Ok(Box::new(LoopbackConnection))
    }
}

#[async_trait]
impl Connection for LoopbackConnection {
    async fn create_statement(&self) -> Result<Box<dyn Statement>, DbError> {
        Ok(Box::new(LoopbackStatement))
    }

    async fn set_auto_commit(&self, _auto_commit: bool) -> Result<(), DbError> {
        Ok(())
    }

    async fn set_transaction_isolation(&self, _level: IsolationLevel) -> Result<(), DbError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[async_trait]
impl Statement for LoopbackStatement {
    async fn execute(&self, sql: &str) -> Result<u64, DbError> {
        info!("loopback execute: {}", sql);
        Ok(0)
    }

    async fn set_query_timeout(&self, _timeout: Duration) -> Result<(), FeatureError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::new("debug")).init();
    driver_mgr().register(LoopbackDriver);

    let config = DataSourceConfig::new()
        .url("loopback://demo/app")
        .username("demo")
        .password("secret");
    let data_source = resolve_data_source(&config)?
        .ok_or_else(|| anyhow::anyhow!("no data source configured"))?;
    util::set_login_timeout(data_source.as_ref(), Duration::from_secs(30));

    let conn = data_source.connection().await?;
    let previous =
        util::set_network_timeout_if_supported(capabilities(), conn.as_ref(), Duration::from_secs(5))
            .await?;
    info!("network timeout was {:?}", previous);
    util::execute_sql_auto_commit(conn.as_ref(), Some("SELECT 1")).await?;

    let statement = conn.create_statement().await?;
    capabilities()
        .set_query_timeout(statement.as_ref(), Duration::from_secs(3))
        .await?;
    statement.close().await?;
    util::quietly_close_connection(Some(conn)).await;

    let executor = provision(4, "demo-housekeeper", CallerRuns);
    let (tx, rx) = mpsc::channel();
    for n in 0..3 {
        let tx = tx.clone();
        executor.execute(move || {
            let _ = tx.send(n);
        })?;
    }
    drop(tx);
    let done: Vec<i32> = rx.iter().collect();
    info!("housekeeping tasks finished: {:?}", done);
    executor.shutdown();
    executor.await_termination(Duration::from_secs(1));
    Ok(())
}
