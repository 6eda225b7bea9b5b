pub mod connection;
pub mod driver;

pub use connection::{MysqlConnection, MysqlStatement};
pub use driver::MysqlDriver;
