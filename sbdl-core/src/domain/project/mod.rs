// sbdl-core/src/domain/project/mod.rs

pub mod configuration;
pub use configuration::{
    BrokerKind, BrokerSettings, EngineSettings, ProjectConfig, PublisherSettings, SourceSettings,
};
