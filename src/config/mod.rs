//! Configuration module for rowgraph.
//!
//! Handles database, pool, live-query and change-feed settings.

mod settings;

pub use settings::{
    expand_env_vars, parse_duration, CdcSettings, DatabaseSettings, Driver, LiveSettings,
    PoolSettings, RetrySettings, Settings, SettingsError,
};
