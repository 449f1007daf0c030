//! deflate コンテナデコーダー (RFC 1951)
//!
//! raw deflate はコンテナフレーミングを持たないため、
//! [`InflateStream`] への薄い委譲に終端検査を足しただけの実装になる。
//! gzip と異なりメンバー連結の概念がないので、終端ブロック後の
//! 余分なバイトは黙殺せず致命的エラーとする。

use crate::decompress::{ByteSink, ByteSource, Decompress, DecompressError};
use crate::inflate::InflateStream;

const CODING: &str = "deflate";

/// deflate 展開デコーダー
#[derive(Debug)]
pub struct DeflateDecompressor {
    inflate: InflateStream,
}

impl DeflateDecompressor {
    /// 新しい DeflateDecompressor を作成
    pub fn new() -> Self {
        Self {
            inflate: InflateStream::new(),
        }
    }
}

impl Default for DeflateDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompress for DeflateDecompressor {
    fn decompress(
        &mut self,
        source: &mut ByteSource<'_>,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), DecompressError> {
        self.inflate.inflate(source, sink)?;
        if self.inflate.is_finished() {
            if source.has_remaining() {
                return Err(DecompressError::TrailingData { coding: CODING });
            }
        } else if source.is_final() && !source.has_remaining() && sink.has_remaining() {
            // 出力満杯 (sink に残容量なし) の場合は未消化の出力が
            // 残っているだけなので、排出後の再呼び出しに任せる
            return Err(DecompressError::UnexpectedEof { coding: CODING });
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.inflate.is_finished()
    }
}
