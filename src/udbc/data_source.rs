use crate::driver_manager::driver_mgr;
use crate::error::{DbError, FeatureError, PropertyError};
use crate::properties::{Properties, PropertyBag};
use crate::udbc::connection::Connection;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// A pluggable source of pooled connections.
///
/// Implementations are either handed to the pool ready-made, built by type name
/// through the [`factory`](crate::factory) registry and configured with
/// [`Properties`], or derived from a bare URL as a [`DriverDataSource`].
#[async_trait]
pub trait DataSource: Properties + Send + Sync {
    async fn connection(&self) -> Result<Box<dyn Connection>, DbError>;

    /// Upper bound for establishing a connection. Optional for implementors.
    fn set_login_timeout(&self, _timeout: Duration) -> Result<(), FeatureError> {
        Err(FeatureError::NotImplemented)
    }
}

/// Data source that opens connections through the driver registered for the
/// scheme of its URL.
pub struct DriverDataSource {
    url: String,
    properties: PropertyBag,
    login_timeout_secs: AtomicU64,
}

impl DriverDataSource {
    pub fn new(
        url: impl Into<String>,
        properties: &PropertyBag,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Self {
        let mut properties = properties.clone();
        if let Some(user) = username {
            properties.insert("user".to_string(), user.to_string());
        }
        if let Some(password) = password {
            properties.insert("password".to_string(), password.to_string());
        }
        Self {
            url: url.into(),
            properties,
            login_timeout_secs: AtomicU64::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn login_timeout(&self) -> Option<Duration> {
        match self.login_timeout_secs.load(Ordering::Relaxed) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Properties for DriverDataSource {
    fn set_property(&mut self, name: &str, value: &str) -> Result<(), PropertyError> {
        match name {
            "url" | "jdbcUrl" => self.url = value.to_string(),
            "username" => {
                self.properties.insert("user".to_string(), value.to_string());
            }
            _ => {
                self.properties.insert(name.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataSource for DriverDataSource {
    async fn connection(&self) -> Result<Box<dyn Connection>, DbError> {
        let connect = driver_mgr().connect(&self.url, &self.properties);
        match self.login_timeout() {
            Some(limit) => tokio::time::timeout(limit, connect).await.map_err(|_| {
                debug!("login timed out: url={}, timeout={:?}", self.url, limit);
                DbError::Connection(format!("login timed out after {:?}", limit))
            })?,
            None => connect.await,
        }
    }

    fn set_login_timeout(&self, timeout: Duration) -> Result<(), FeatureError> {
        self.login_timeout_secs
            .store(timeout.as_secs(), Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_become_properties() {
        let mut props = PropertyBag::new();
        props.insert("sslmode".into(), "require".into());
        let ds = DriverDataSource::new("mysql://db/app", &props, Some("app"), Some("s3cret"));

        assert_eq!(ds.url(), "mysql://db/app");
        assert_eq!(ds.properties().get("user").map(String::as_str), Some("app"));
        assert_eq!(ds.properties().get("password").map(String::as_str), Some("s3cret"));
        assert_eq!(ds.properties().get("sslmode").map(String::as_str), Some("require"));
    }

    #[test]
    fn test_properties_pass_through() {
        let mut ds = DriverDataSource::new("mysql://db/app", &PropertyBag::new(), None, None);
        ds.set_property("jdbcUrl", "mysql://other/app").unwrap();
        ds.set_property("username", "reader").unwrap();
        ds.set_property("useCursorFetch", "true").unwrap();

        assert_eq!(ds.url(), "mysql://other/app");
        assert_eq!(ds.properties().get("user").map(String::as_str), Some("reader"));
        assert!(ds.properties().contains_key("useCursorFetch"));
    }

    #[test]
    fn test_login_timeout_whole_seconds() {
        let ds = DriverDataSource::new("mysql://db/app", &PropertyBag::new(), None, None);
        assert_eq!(ds.login_timeout(), None);
        ds.set_login_timeout(Duration::from_millis(2500)).unwrap();
        assert_eq!(ds.login_timeout(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_unknown_scheme_fails_at_open() {
        let ds = DriverDataSource::new(
            "nodriver-ds-test://db/app",
            &PropertyBag::new(),
            None,
            None,
        );
        let err = ds.connection().await.err().unwrap();
        assert!(matches!(err, DbError::UnsupportedDatabaseType(s) if s == "nodriver-ds-test"));
    }
}
