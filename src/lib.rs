extern crate self as udbc_provision;

pub mod capability;
pub mod driver_manager;
pub mod error;
pub mod executor;
pub mod factory;
pub mod models;
pub mod properties;
pub mod resolver;
pub mod udbc;
#[cfg(feature = "mysql")]
pub mod udbc_mysql;
pub mod util;

#[doc(hidden)]
pub use ctor;
pub use udbc_provision_macros::{Properties, constructor};

pub use capability::{Capability, CapabilityCache, Support, capabilities};
pub use error::{DbError, ExecutorError, FeatureError, PropertyError, ProvisioningError};
pub use executor::{ExecutorBuilder, ExecutorHandle, RejectionPolicy, provision};
pub use factory::{Args, instantiate};
pub use models::DataSourceConfig;
pub use resolver::resolve_data_source;
