pub mod connection;
pub mod data_source;
pub mod driver;

pub use connection::{Connection, IsolationLevel, Statement};
pub use data_source::{DataSource, DriverDataSource};
pub use driver::Driver;
