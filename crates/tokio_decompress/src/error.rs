//! tokio_decompress エラー型

use std::fmt;

/// tokio_decompress エラー
#[derive(Debug)]
pub enum Error {
    /// I/O エラー
    Io(std::io::Error),
    /// デコーダー選択エラー (未対応エンコーディング等)
    Decoding(shiguredo_decompress::DecodingError),
    /// 展開エラー
    Decompress(shiguredo_decompress::DecompressError),
    /// 下流コンシューマーによるキャンセル
    Cancelled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Decoding(e) => write!(f, "decoding error: {}", e),
            Error::Decompress(e) => write!(f, "decompression error: {}", e),
            Error::Cancelled => write!(f, "decoding cancelled"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Decoding(e) => Some(e),
            Error::Decompress(e) => Some(e),
            Error::Cancelled => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<shiguredo_decompress::DecodingError> for Error {
    fn from(e: shiguredo_decompress::DecodingError) -> Self {
        Error::Decoding(e)
    }
}

impl From<shiguredo_decompress::DecompressError> for Error {
    fn from(e: shiguredo_decompress::DecompressError) -> Self {
        Error::Decompress(e)
    }
}

/// Result 型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
