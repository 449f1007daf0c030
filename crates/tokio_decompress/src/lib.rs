//! tokio_decompress - Tokio integration for shiguredo_decompress
//!
//! Sans I/O の shiguredo_decompress を tokio の非同期 I/O に接続する。
//!
//! ## 特徴
//!
//! - **AsyncRead アダプター**: 圧縮ボディを読みながら展開する
//!   [`DecodedReader`]
//! - **順序付きディスパッチ**: 展開済みバッチを産出順に mpsc チャネルで
//!   下流コンシューマーへ転送する [`dispatch_decoded`] / [`spawn_consumer`]
//! - **キャンセル**: レシーバーのドロップで展開を即座に停止
//!
//! ## リーダー
//!
//! ```ignore
//! use tokio_decompress::DecodedReader;
//! use tokio::io::AsyncReadExt;
//!
//! let mut reader = DecodedReader::gzip(compressed_body);
//! let mut decoded = Vec::new();
//! reader.read_to_end(&mut decoded).await?;
//! ```
//!
//! ## ディスパッチ
//!
//! ```ignore
//! use tokio_decompress::{dispatch_decoded, spawn_consumer};
//! use shiguredo_decompress::GzipDecompressor;
//! use tokio::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel(4);
//! let consumer = spawn_consumer(None, rx, |batch| println!("{} bytes", batch.len()));
//! dispatch_decoded(body_reader, Box::new(GzipDecompressor::new()), tx).await?;
//! consumer.await?;
//! ```

pub mod dispatch;
pub mod error;
pub mod reader;

pub use dispatch::{dispatch_decoded, spawn_consumer};
pub use error::{Error, Result};
pub use reader::DecodedReader;

// shiguredo_decompress の型を re-export
pub use shiguredo_decompress::{DecoderRegistry, Decompress, DecompressError};
