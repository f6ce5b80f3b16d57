use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] barsync_core::ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Sync(#[from] barsync_core::SyncError),

    #[error(transparent)]
    Warehouse(#[from] barsync_core::WarehouseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 2,
            Self::Sync(_) => 2,
            Self::Warehouse(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
