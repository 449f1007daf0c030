//! raw inflate プリミティブのラッパー
//!
//! flate2 の `Decompress` (zlib ヘッダーなし = raw deflate) を増分展開
//! カーソルに適合させる。コンテナフレーミング (gzip ヘッダー/トレーラー等) は
//! 関知しない。deflate / gzip 両方のコンテナデコーダーがこのラッパーを
//! 合成して使う。

use flate2::{Decompress, FlushDecompress, Status};

use crate::decompress::{ByteSink, ByteSource, DecompressError};

/// raw deflate ストリームの増分展開状態
#[derive(Debug)]
pub(crate) struct InflateStream {
    inner: Decompress,
    finished: bool,
}

impl InflateStream {
    /// 新しい InflateStream を作成 (zlib ヘッダーなし)
    pub(crate) fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            finished: false,
        }
    }

    /// deflate ストリームが終端ブロックまで展開し終えたか
    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// 状態をリセットして新しい deflate ストリームを受け付ける
    ///
    /// gzip のメンバー境界で使う。
    pub(crate) fn reset(&mut self) {
        self.inner.reset(false);
        self.finished = false;
    }

    /// 1 ステップ展開する
    ///
    /// 入力から消費できるだけ消費し、出力残容量の範囲で書き込む。
    /// `(消費バイト数, 生成バイト数)` を返す。進捗ゼロはエラーではない
    /// (入力不足または出力満杯)。
    pub(crate) fn inflate(
        &mut self,
        source: &mut ByteSource<'_>,
        sink: &mut ByteSink<'_>,
    ) -> Result<(usize, usize), DecompressError> {
        if self.finished {
            return Ok((0, 0));
        }

        let in_before = self.inner.total_in();
        let out_before = self.inner.total_out();
        let status = self
            .inner
            .decompress(source.peek(), sink.unfilled(), FlushDecompress::None)
            .map_err(|e| DecompressError::InvalidData(e.to_string()))?;

        let consumed = (self.inner.total_in() - in_before) as usize;
        let produced = (self.inner.total_out() - out_before) as usize;
        source.advance(consumed);
        sink.advance(produced);

        match status {
            Status::StreamEnd => self.finished = true,
            // BufError は「進捗不能」の通知であってエラーではない
            Status::Ok | Status::BufError => {}
        }
        Ok((consumed, produced))
    }
}
