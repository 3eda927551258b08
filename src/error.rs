//! Error types shared across the crate.

use thiserror::Error;

use crate::engine::EngineError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The scene dimension size and the per-scene bounding boxes disagree.
    #[error(
        "the number of scenes in the metadata ({declared}) does not match \
         the number of available scene bounding boxes ({observed})"
    )]
    SceneCountMismatch { declared: usize, observed: usize },

    #[error("scene index {scene} does not match any scene in the document")]
    UnknownScene { scene: i32 },

    #[error("pixel format `{name}` is not supported, possible values are: {valid}")]
    UnsupportedPixelFormat { name: String, valid: String },

    #[error("invalid buffer shape: {message}")]
    Shape { message: String },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("no tile index left for plane `{key}`")]
    IndicesExhausted { key: String },

    #[error("document metadata has already been written for this session")]
    MetadataAlreadyWritten,

    #[error("the writer has already been closed")]
    WriterClosed,

    #[error("TIFF export error: {0}")]
    TiffExport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }
}

impl From<tiff::TiffError> for Error {
    fn from(e: tiff::TiffError) -> Self {
        Self::TiffExport(e.to_string())
    }
}
