pub mod data_source_config;

pub use data_source_config::DataSourceConfig;
