#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),

    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("environment already exists: {0}")]
    EnvironmentAlreadyExists(String),

    #[error("no environments configured for project: {0}")]
    NoEnvironments(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid import file: {0}")]
    InvalidImport(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("an import is already in progress")]
    ImportInProgress,

    #[error("sign-in timed out after {0} seconds")]
    SignInTimeout(u64),

    #[error("sign-in failed: {0}")]
    SignIn(String),

    #[error("remote api error: {0}")]
    RemoteApi(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EnvError>;
