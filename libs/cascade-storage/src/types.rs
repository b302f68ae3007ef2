use cascade_core::CascadeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CascadeStorageError {
    #[error("failed to create data directory")]
    CreateDataFolder(std::io::Error),
    #[error("db manipulate error: {0}")]
    Crud(String),
    #[error("db error")]
    Db(#[from] sea_orm::DbErr),
    #[error("unknown resource kind `{0}` in stored row")]
    InvalidKind(String),
    #[error("cascade error")]
    Core(#[from] CascadeError),
}

pub type CascadeStorageResult<T> = Result<T, CascadeStorageError>;

impl From<CascadeStorageError> for CascadeError {
    fn from(err: CascadeStorageError) -> Self {
        match err {
            CascadeStorageError::Core(err) => err,
            CascadeStorageError::Db(err) => CascadeError::storage(err),
            other => CascadeError::storage(other),
        }
    }
}
