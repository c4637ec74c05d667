use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy shared by every analysis component.
///
/// Per-column inapplicability (a missing KPI source column, a regression
/// feature with too few observations) is never reported through this type;
/// those cases resolve to absent results. Only whole-table structural
/// problems surface here.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error loading CSV {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Insufficient data: {rows} rows (minimum: {minimum})")]
    InsufficientData { rows: usize, minimum: usize },

    #[error("Columns collide on standardized name '{0}'")]
    DuplicateColumn(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

impl AnalyticsError {
    pub(crate) fn load<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalyticsError::Load {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn write<E>(path: impl Into<PathBuf>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AnalyticsError::Write {
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn load_message(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        AnalyticsError::Load {
            path: path.into(),
            source: message.into().into(),
        }
    }
}

pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;
