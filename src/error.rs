use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Represents errors reported by drivers and connections.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Driver error: {0}")]
    Driver(#[source] BoxError),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Unsupported database type: {0}")]
    UnsupportedDatabaseType(String),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Invalid transaction isolation value: {0}")]
    InvalidIsolation(String),
    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(feature = "mysql")]
impl From<mysql_async::Error> for DbError {
    fn from(e: mysql_async::Error) -> Self {
        match e {
            mysql_async::Error::Server(e) => DbError::Query(e.to_string()),
            e => DbError::Database(e.to_string()),
        }
    }
}

/// Outcome of an optional driver operation.
///
/// `NotImplemented` and `NotSupported` mean the driver lacks the feature and are
/// folded into the capability cache. `Other` is a real failure and is handed back
/// to the caller untouched.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("operation not implemented by driver")]
    NotImplemented,
    #[error("feature not supported: {0}")]
    NotSupported(String),
    #[error(transparent)]
    Other(#[from] DbError),
}

#[derive(Error, Debug)]
pub enum PropertyError {
    #[error("no writable property named '{0}'")]
    Unknown(String),
    #[error("invalid value '{value}' for property '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// Fatal configuration-time failures. Pool startup should abort on any of these.
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("no type registered under '{0}'")]
    TypeNotFound(String),
    #[error("type '{type_name}' has no constructor taking ({signature})")]
    NoMatchingConstructor { type_name: String, signature: String },
    #[error("constructor of '{type_name}' failed")]
    Construction {
        type_name: String,
        #[source]
        source: BoxError,
    },
    #[error("type '{type_name}' does not produce a {expected}")]
    TypeMismatch {
        type_name: String,
        expected: &'static str,
    },
    #[error("failed to apply properties to '{type_name}'")]
    Property {
        type_name: String,
        #[source]
        source: PropertyError,
    },
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("task rejected by executor '{0}'")]
    Rejected(String),
    #[error("executor '{0}' has been shut down")]
    Shutdown(String),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
