pub mod schema;

pub use schema::{
    AgentConfig, AttachmentsConfig, CanvasConfig, Config, ObservabilityConfig, PromptsConfig,
    TrainingConfig,
};
