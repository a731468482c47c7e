mod document;

pub use document::Document;

use thiserror::Error;

use crate::codec::DecodeError;

/// バッファ操作のエラー
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("offset {0:#x} is out of bounds")]
    OutOfBounds(usize),

    #[error("no file path set")]
    NoPath,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}
