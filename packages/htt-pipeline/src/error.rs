use crate::validator::ValidationReport;
use htt_config::ConfigError;
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage's enablement or parameters could not be determined
    #[error("Assembly error in stage '{stage}': {reason}")]
    Assembly { stage: String, reason: String },

    #[error("Service '{name}' registered twice with different settings")]
    ServiceConflict { name: String },

    #[error("Pipeline graph contains a cycle involving stage '{0}'")]
    Cycle(String),

    /// A stage reader asked for a field outside its recognized set
    #[error("Component '{component}' does not recognize field '{field}'")]
    UnrecognizedField { component: String, field: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Pipeline validation failed:\n{0}")]
    Validation(ValidationReport),
}

impl PipelineError {
    pub fn assembly<E: std::fmt::Display>(stage: impl Into<String>, reason: E) -> Self {
        Self::Assembly {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unrecognized(component: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnrecognizedField {
            component: component.into(),
            field: field.into(),
        }
    }
}
