//! レスポンスボディ展開の統合レイヤー
//!
//! Content-Encoding ヘッダーを検査し、レジストリからデコーダーを選択して
//! トランスポートと下流コンシューマーの間に挟み込む。
//!
//! - ヘッダーがなければ下流へそのまま渡す
//! - 対応ファクトリーがなければ「unsupported encoding」エラー
//! - 展開する場合、下流に見せるヘッダーから Content-Encoding と
//!   Content-Length を取り除く (二重展開と古いボディ長の防止)
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_decompress::{DecoderRegistry, Response, decode_response};
//!
//! let registry = DecoderRegistry::new();
//! let mut response = Response::new(200, "OK").body(b"plain".to_vec());
//! decode_response(&mut response, &registry).unwrap();
//! assert_eq!(response.body, b"plain");
//! ```

use core::fmt;

use crate::content_encoding::ContentCoding;
use crate::decompress::{Decompress, DecompressError, decode_all};
use crate::registry::{DecoderRegistry, RegistryError};
use crate::response::Response;

/// レスポンス展開エラー
#[derive(Debug)]
pub enum DecodingError {
    /// 対応するデコーダーファクトリーが登録されていない
    UnsupportedEncoding(String),
    /// レジストリエラー (再帰的ファクトリー発見等)
    Registry(RegistryError),
    /// 展開エラー
    Decompress(DecompressError),
}

impl fmt::Display for DecodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodingError::UnsupportedEncoding(token) => {
                write!(f, "unsupported encoding: {}", token)
            }
            DecodingError::Registry(e) => write!(f, "registry error: {}", e),
            DecodingError::Decompress(e) => write!(f, "decompression error: {}", e),
        }
    }
}

impl std::error::Error for DecodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodingError::UnsupportedEncoding(_) => None,
            DecodingError::Registry(e) => Some(e),
            DecodingError::Decompress(e) => Some(e),
        }
    }
}

impl From<RegistryError> for DecodingError {
    fn from(e: RegistryError) -> Self {
        DecodingError::Registry(e)
    }
}

impl From<DecompressError> for DecodingError {
    fn from(e: DecompressError) -> Self {
        DecodingError::Decompress(e)
    }
}

/// ボディ展開の準備結果
pub struct BodyDecoding {
    /// 下流コンシューマーに見せるヘッダー
    ///
    /// 展開する場合は Content-Encoding / Content-Length を除去済み。
    pub headers: Vec<(String, String)>,
    /// 展開デコーダー。`None` なら展開不要 (そのまま渡す)
    pub decoder: Option<Box<dyn Decompress + Send>>,
}

impl std::fmt::Debug for BodyDecoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyDecoding")
            .field("headers", &self.headers)
            .field("decoder", &self.decoder.as_ref().map(|_| "..."))
            .finish()
    }
}

/// レスポンスヘッダーからボディ展開を準備する
///
/// Content-Encoding がなければデコーダーなし・ヘッダー無変更で返す。
/// あればレジストリからファクトリーを引き、見つからなければ
/// [`DecodingError::UnsupportedEncoding`]。
pub fn prepare_decoding(
    headers: &[(String, String)],
    registry: &DecoderRegistry,
) -> Result<BodyDecoding, DecodingError> {
    let encoding = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("Content-Encoding"))
        .map(|(_, value)| value.as_str());
    let Some(encoding) = encoding else {
        return Ok(BodyDecoding {
            headers: headers.to_vec(),
            decoder: None,
        });
    };

    let coding = ContentCoding::from_token(encoding);
    let factory = registry
        .factory_for(coding.as_str())?
        .ok_or_else(|| DecodingError::UnsupportedEncoding(encoding.trim().to_string()))?;

    let filtered = headers
        .iter()
        .filter(|(name, _)| {
            !name.eq_ignore_ascii_case("Content-Encoding")
                && !name.eq_ignore_ascii_case("Content-Length")
        })
        .cloned()
        .collect();
    Ok(BodyDecoding {
        headers: filtered,
        decoder: Some(factory.create()),
    })
}

/// レスポンスボディを一括展開する
///
/// Content-Encoding に応じてボディを展開し、ヘッダーを書き換える。
/// ヘッダーがなければ何もしない。ストリーミングが必要な場合は
/// [`prepare_decoding`] を使う。
pub fn decode_response(
    response: &mut Response,
    registry: &DecoderRegistry,
) -> Result<(), DecodingError> {
    let decoding = prepare_decoding(&response.headers, registry)?;
    let Some(mut decoder) = decoding.decoder else {
        return Ok(());
    };
    let decoded = decode_all(&mut *decoder, &response.body)?;
    response.headers = decoding.headers;
    response.body = decoded;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::{DeflateEncoder, GzEncoder};

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn headers(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prepare_without_content_encoding() {
        let registry = DecoderRegistry::new();
        let original = headers(&[("Content-Type", "text/plain"), ("Content-Length", "5")]);
        let decoding = prepare_decoding(&original, &registry).unwrap();
        // ヘッダーはそのまま、デコーダーなし
        assert_eq!(decoding.headers, original);
        assert!(decoding.decoder.is_none());
    }

    #[test]
    fn test_prepare_filters_headers() {
        let registry = DecoderRegistry::new();
        let original = headers(&[
            ("Content-Type", "text/plain"),
            ("Content-Encoding", "gzip"),
            ("content-length", "123"),
            ("Vary", "Accept-Encoding"),
        ]);
        let decoding = prepare_decoding(&original, &registry).unwrap();
        assert_eq!(
            decoding.headers,
            headers(&[("Content-Type", "text/plain"), ("Vary", "Accept-Encoding")])
        );
        assert!(decoding.decoder.is_some());
    }

    #[test]
    fn test_prepare_unsupported_encoding() {
        let registry = DecoderRegistry::new();
        let original = headers(&[("Content-Encoding", "br")]);
        let err = prepare_decoding(&original, &registry).unwrap_err();
        assert_eq!(err.to_string(), "unsupported encoding: br");
    }

    #[test]
    fn test_prepare_token_case_insensitive() {
        let registry = DecoderRegistry::new();
        let original = headers(&[("Content-Encoding", "GZIP")]);
        let decoding = prepare_decoding(&original, &registry).unwrap();
        assert!(decoding.decoder.is_some());
    }

    #[test]
    fn test_decode_response_gzip() {
        let registry = DecoderRegistry::new();
        let compressed = gzip(b"gzip encoded body");
        let mut response = Response::new(200, "OK")
            .header("Content-Encoding", "gzip")
            .header("Content-Length", &compressed.len().to_string())
            .header("Content-Type", "text/plain")
            .body(compressed);

        decode_response(&mut response, &registry).unwrap();
        assert_eq!(response.body, b"gzip encoded body");
        assert!(!response.has_header("Content-Encoding"));
        assert!(!response.has_header("Content-Length"));
        assert_eq!(response.get_header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_decode_response_deflate() {
        let registry = DecoderRegistry::new();
        let compressed = deflate(b"deflate encoded body");
        let mut response = Response::new(200, "OK")
            .header("Content-Encoding", "deflate")
            .body(compressed);

        decode_response(&mut response, &registry).unwrap();
        assert_eq!(response.body, b"deflate encoded body");
    }

    #[test]
    fn test_decode_response_identity() {
        let registry = DecoderRegistry::new();
        let mut response = Response::new(200, "OK")
            .header("Content-Encoding", "identity")
            .body(b"as-is".to_vec());

        decode_response(&mut response, &registry).unwrap();
        assert_eq!(response.body, b"as-is");
        assert!(!response.has_header("Content-Encoding"));
    }

    #[test]
    fn test_decode_response_without_encoding_is_untouched() {
        let registry = DecoderRegistry::new();
        let mut response = Response::new(200, "OK")
            .header("Content-Length", "4")
            .body(b"body".to_vec());
        let original = response.clone();

        decode_response(&mut response, &registry).unwrap();
        assert_eq!(response, original);
    }

    #[test]
    fn test_decode_response_corrupt_body() {
        let registry = DecoderRegistry::new();
        let mut compressed = gzip(b"will be corrupted");
        compressed[0] = 0xcd;
        compressed[1] = 0xab;
        let mut response = Response::new(200, "OK")
            .header("Content-Encoding", "gzip")
            .body(compressed);

        let err = decode_response(&mut response, &registry).unwrap_err();
        assert_eq!(
            err.to_string(),
            "decompression error: not in gzip format; expected: 0x8b1f, found: 0xabcd"
        );
        // エラー時はレスポンスを書き換えない
        assert!(response.has_header("Content-Encoding"));
    }
}
