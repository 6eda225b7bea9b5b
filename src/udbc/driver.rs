use crate::error::DbError;
use crate::properties::PropertyBag;
use crate::udbc::connection::Connection;
use async_trait::async_trait;

/// `Driver` opens raw connections for one URL scheme.
///
/// Drivers are registered with the [`DriverManager`](crate::driver_manager::DriverManager)
/// and selected by the scheme of the connection URL at connect time.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Returns the name of the driver, used in logs.
    fn name(&self) -> &str;

    /// URL scheme handled by this driver, e.g. `mysql` for `mysql://host/db`.
    fn scheme(&self) -> &str;

    /// Opens a connection. `props` carries driver properties and, when
    /// configured, the `user` and `password` entries.
    async fn connect(&self, url: &str, props: &PropertyBag)
    -> Result<Box<dyn Connection>, DbError>;
}
