use std::path::PathBuf;

/// Opaque failure raised by a detector backend
pub type DetectorError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(thiserror::Error, Debug)]
pub enum TyreScanError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error on {}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to load detection model {}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: DetectorError,
    },

    #[error("detector failed on part {part} patch {patch}")]
    Detector {
        part: usize,
        patch: usize,
        #[source]
        source: DetectorError,
    },
}

impl TyreScanError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        TyreScanError::InvalidInput(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TyreScanError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        TyreScanError::Image {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TyreScanError>;
