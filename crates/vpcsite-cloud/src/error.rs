use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("{0} is not provisioned")]
    ResourceNotFound(String),

    #[error("{0} is already provisioned")]
    ResourceAlreadyExists(String),

    #[error("{resource} depends on {dependency}, which is not declared")]
    DependencyNotFound { resource: String, dependency: String },

    #[error("{resource} cannot be created before {dependency}")]
    DependencyNotProvisioned { resource: String, dependency: String },

    #[error("Dependency cycle among: {0}")]
    CircularDependency(String),

    #[error("{resource} references {reference}, which has no physical ID")]
    UnresolvedReference { resource: String, reference: String },

    #[error("Plan does not match resources: {0}")]
    PlanMismatch(String),

    #[error("Unusable state file: {0}")]
    StateError(String),

    #[error("State is locked: {0}")]
    LockError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
