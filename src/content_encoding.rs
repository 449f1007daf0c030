//! Content-Encoding トークン (RFC 9110 Section 8.4)
//!
//! ## 概要
//!
//! Content-Encoding ヘッダーのコンテント コーディング トークンを正規化する。
//! トークンは大文字小文字を区別しない。レジストリのルックアップと
//! レスポンス統合レイヤーがこの型を使う。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_decompress::ContentCoding;
//!
//! let coding = ContentCoding::from_token("GZIP");
//! assert_eq!(coding, ContentCoding::Gzip);
//! assert_eq!(coding.as_str(), "gzip");
//! ```

use core::fmt;

/// コンテント コーディング (Content Coding)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCoding {
    Gzip,
    Deflate,
    /// brotli (外部ネイティブライブラリによる実装向けの予約トークン)
    Brotli,
    Identity,
    Other(String),
}

impl ContentCoding {
    /// ヘッダー値のトークンから正規化したコーディングを得る
    ///
    /// 前後の空白を除去し、大文字小文字を区別せずに比較する。
    /// 未知のトークンは小文字化して `Other` に保持する。
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        let normalized = token.to_ascii_lowercase();
        match normalized.as_str() {
            "gzip" => ContentCoding::Gzip,
            "deflate" => ContentCoding::Deflate,
            "br" => ContentCoding::Brotli,
            "identity" => ContentCoding::Identity,
            _ => ContentCoding::Other(normalized),
        }
    }

    /// 正規化したトークン値
    pub fn as_str(&self) -> &str {
        match self {
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Brotli => "br",
            ContentCoding::Identity => "identity",
            ContentCoding::Other(value) => value.as_str(),
        }
    }
}

impl fmt::Display for ContentCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
