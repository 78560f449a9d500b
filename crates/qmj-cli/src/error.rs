use qmj_core::CoreError;
use qmj_warehouse::WarehouseError;
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] qmj_core::ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Warehouse(WarehouseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl From<CoreError> for CliError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::Validation(error) => Self::Validation(error),
            CoreError::Serialization(error) => Self::Serialization(error),
        }
    }
}

impl From<WarehouseError> for CliError {
    fn from(error: WarehouseError) -> Self {
        match error {
            WarehouseError::Validation(error) => Self::Validation(error),
            WarehouseError::CompanyNotFound(_) | WarehouseError::SecurityNotFound(_) => {
                Self::NotFound(error.to_string())
            }
            other => Self::Warehouse(other),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::NotFound(_) => 3,
            Self::Serialization(_) => 4,
            Self::Warehouse(_) => 7,
            Self::Io(_) => 10,
            Self::Logging(_) => 10,
        }
    }
}
