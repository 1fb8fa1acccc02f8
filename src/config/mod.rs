mod settings;

pub use settings::{
    DatabaseConfig, DigestConfig, OtelConfig, ProviderSettings, RetentionConfig, ServerConfig,
    Settings, StoreConfig,
};
