use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinancialStatementError {
    #[error("Missing required field '{field}' for {entity}")]
    MissingRequiredField { entity: String, field: String },

    #[error("Balance invariant violation: Assets ({total_assets}) != Liabilities ({total_liabilities}) + Equity ({total_equity}), difference {difference}")]
    InvariantViolation {
        total_assets: f64,
        total_liabilities: f64,
        total_equity: f64,
        difference: f64,
    },

    #[error("Field '{field}' of {entity} references unresolved '{reference}'")]
    UnresolvableReference {
        entity: String,
        field: String,
        reference: String,
    },

    #[error("Invalid value for field '{field}': {details}")]
    InvalidFieldValue { field: String, details: String },

    #[error("'{component}' is not a component of {entity}")]
    UnknownComponent { entity: String, component: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FinancialStatementError>;
