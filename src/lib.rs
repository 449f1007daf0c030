//! # shiguredo_decompress
//!
//! HTTP Content-Encoding レスポンスボディの透過展開ライブラリ (Sans I/O)
//!
//! ## 特徴
//!
//! - **Sans I/O**: I/O を完全に分離した増分展開設計。トランスポートが
//!   届けた任意サイズのチャンクを消費し、任意サイズの出力へ書き出す
//! - **バイト厳密な検証**: gzip (RFC 1952) / deflate (RFC 1951) の
//!   コンテナフレーミングを検証し、期待値と実値つきでエラー報告する
//! - **プラガブル**: Content-Encoding トークンごとのデコーダー
//!   ファクトリーをレジストリで差し替え可能
//!
//! ## 使い方
//!
//! ### 一括展開
//!
//! ```rust
//! use shiguredo_decompress::{DecoderRegistry, Response, decode_response};
//!
//! let registry = DecoderRegistry::new();
//! let mut response = Response::new(200, "OK")
//!     .header("Content-Type", "text/plain")
//!     .body(b"not compressed".to_vec());
//! // Content-Encoding がなければ何もしない
//! decode_response(&mut response, &registry).unwrap();
//! assert_eq!(response.body, b"not compressed");
//! ```
//!
//! ### ストリーミング展開
//!
//! ```rust
//! use shiguredo_decompress::{ByteSink, ByteSource, Decompress, GzipDecompressor};
//!
//! let mut decoder = GzipDecompressor::new();
//! let mut buf = [0u8; 8192];
//! // チャンクを受信するたびに:
//! //   let mut source = ByteSource::new(chunk, is_last_chunk);
//! //   loop {
//! //       let mut sink = ByteSink::new(&mut buf);
//! //       decoder.decompress(&mut source, &mut sink)?;
//! //       consumer(sink.filled());
//! //       if sink.filled().is_empty() && !source.has_remaining() { break; }
//! //   }
//! let _ = (&mut decoder, &mut buf);
//! ```

pub mod content_encoding;
pub mod decoding;
pub mod decompress;
mod deflate;
mod gzip;
mod inflate;
pub mod registry;
mod response;

pub use content_encoding::ContentCoding;
pub use decoding::{BodyDecoding, DecodingError, decode_response, prepare_decoding};
pub use decompress::{
    ByteSink, ByteSource, Decompress, DecompressError, IdentityDecompressor, decode_all,
};
pub use deflate::DeflateDecompressor;
pub use gzip::GzipDecompressor;
pub use registry::{
    DecoderFactory, DecoderRegistry, DeflateDecoderFactory, GzipDecoderFactory,
    IdentityDecoderFactory, RegistryError,
};
pub use response::Response;
