mod config;

pub use config::{ConfigError, ExchangeConfig};
