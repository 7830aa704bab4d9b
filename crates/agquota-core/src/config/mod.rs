mod settings;

pub use settings::{
    DiscoverySettings, Settings, DEFAULT_POLLING_INTERVAL_MS, MIN_POLLING_INTERVAL_MS,
};
