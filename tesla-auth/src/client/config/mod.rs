mod settings;

pub use settings::{HttpSettings, ProviderConfig, Settings, WakeSettings};
