//! 展開トレイト (Sans I/O)
//!
//! Content-Encoding で圧縮されたレスポンスボディを増分展開するための
//! 共通インターフェースを提供する。gzip, deflate 等のコンテナデコーダーは
//! すべてこのトレイトを実装する。
//!
//! ## 増分展開の契約
//!
//! `decompress()` は 1 回の呼び出しで「入力カーソルから消費できるだけ消費し、
//! 出力カーソルへ書き込めるだけ書き込む」。ブロックしてはならず、
//! 進捗ゼロ（入力 0 消費・出力 0 生成）で戻ることも正当である。
//! 呼び出し側は出力カーソルを排出してから、または追加入力を供給してから
//! 再度呼び出す。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_decompress::{ByteSink, ByteSource, Decompress, DeflateDecompressor};
//!
//! // flate2 の raw deflate ストリーム (空データ圧縮: 固定 Huffman 終端ブロック)
//! let compressed = [0x03, 0x00];
//! let mut decoder = DeflateDecompressor::new();
//! let mut buf = [0u8; 64];
//!
//! let mut source = ByteSource::new(&compressed, true);
//! let mut sink = ByteSink::new(&mut buf);
//! decoder.decompress(&mut source, &mut sink).unwrap();
//! assert!(decoder.is_finished());
//! assert!(sink.filled().is_empty());
//! ```

use core::fmt;

/// 入力カーソル
///
/// 展開対象の圧縮バイト列に対する読み取りビュー。1 回の `decompress()`
/// 呼び出しの間だけデコーダーに貸し出され、呼び出しをまたいで保持されない。
///
/// `final_chunk` が true のチャンクをすべて消費した時点で、この論理
/// ストリームに後続の入力は二度と到着しない。
#[derive(Debug)]
pub struct ByteSource<'a> {
    data: &'a [u8],
    position: usize,
    final_chunk: bool,
}

impl<'a> ByteSource<'a> {
    /// 新しい入力カーソルを作成
    ///
    /// `final_chunk` には、このチャンクが論理ストリームの最終チャンクで
    /// あるかどうかを指定する。
    pub fn new(data: &'a [u8], final_chunk: bool) -> Self {
        Self {
            data,
            position: 0,
            final_chunk,
        }
    }

    /// 未消費バイト数
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// 未消費バイトが残っているか
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    /// 最終チャンクかどうか
    #[inline]
    pub fn is_final(&self) -> bool {
        self.final_chunk
    }

    /// 現在の読み取り位置 (= 消費済みバイト数)
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// 未消費領域への参照
    #[inline]
    pub fn peek(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// 読み取り位置を `n` バイト進める
    ///
    /// # Panics
    ///
    /// `n` が `remaining()` を超える場合
    #[inline]
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "advance beyond remaining input");
        self.position += n;
    }

    /// 1 バイト読み取る。未消費バイトがなければ `None`
    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.position)?;
        self.position += 1;
        Some(byte)
    }
}

/// 出力カーソル
///
/// 展開結果を書き込む有界の出力領域。デコーダーは 1 回の呼び出しで
/// 残容量を超えて書き込まない。入力カーソルと同様、呼び出し単位の
/// 一時的な貸し出しである。
#[derive(Debug)]
pub struct ByteSink<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> ByteSink<'a> {
    /// 新しい出力カーソルを作成
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// 残容量 (バイト)
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// 残容量があるか
    #[inline]
    pub fn has_remaining(&self) -> bool {
        self.position < self.data.len()
    }

    /// 書き込み済みバイト数
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// 書き込み済み領域への参照
    #[inline]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.position]
    }

    /// 未書き込み領域への可変参照
    #[inline]
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.data[self.position..]
    }

    /// 書き込み位置を `n` バイト進める
    ///
    /// `unfilled()` へ直接書き込んだ後に呼び出す。
    ///
    /// # Panics
    ///
    /// `n` が `remaining()` を超える場合
    #[inline]
    pub fn advance(&mut self, n: usize) {
        assert!(n <= self.remaining(), "advance beyond sink capacity");
        self.position += n;
    }

    /// バイト列を書き込み、書き込めたバイト数を返す
    ///
    /// 残容量を超える分は書き込まれない。
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let len = bytes.len().min(self.remaining());
        self.data[self.position..self.position + len].copy_from_slice(&bytes[..len]);
        self.position += len;
        len
    }
}

/// 展開エラー
///
/// 展開エラーは入力の決定的な関数であり、一時的な障害ではない。
/// リトライせず即座に呼び出し側へ伝播し、デコーダーインスタンスは破棄する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressError {
    /// gzip マジックナンバー不一致 (RFC 1952: `1f 8b`)
    BadGzipMagic {
        /// 実際に読み取った 2 バイト (リトルエンディアン u16)
        found: u16,
    },
    /// 未対応の圧縮メソッド (RFC 1952: deflate = 8 のみ)
    BadCompressionMethod { found: u8 },
    /// FLG の予約ビット (上位 3 ビット) が立っている
    ReservedFlags { found: u8 },
    /// トレーラーの CRC-32 が展開データと一致しない
    CrcMismatch { expected: u32, found: u32 },
    /// トレーラーの ISIZE が展開サイズ (mod 2^32) と一致しない
    SizeMismatch { expected: u32, found: u32 },
    /// ストリームが構造的に完結する前に入力が尽きた
    UnexpectedEof {
        /// コンテナ名 ("gzip" / "deflate")
        coding: &'static str,
    },
    /// 構造的に完結したストリームの後に余分なバイトがある
    TrailingData {
        /// コンテナ名 ("gzip" / "deflate")
        coding: &'static str,
    },
    /// 圧縮データ自体が不正 (inflate プリミティブのエラー)
    InvalidData(String),
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecompressError::BadGzipMagic { found } => {
                write!(f, "not in gzip format; expected: 0x8b1f, found: {:#x}", found)
            }
            DecompressError::BadCompressionMethod { found } => {
                write!(
                    f,
                    "unsupported compression method; expected: 0x8, found: {:#x}",
                    found
                )
            }
            DecompressError::ReservedFlags { found } => {
                write!(f, "unsupported flags: {:#x}", found)
            }
            DecompressError::CrcMismatch { expected, found } => {
                write!(
                    f,
                    "corrupt gzip stream (CRC32); expected: {:#x}, found: {:#x}",
                    expected, found
                )
            }
            DecompressError::SizeMismatch { expected, found } => {
                write!(
                    f,
                    "corrupt gzip stream (ISIZE); expected: {:#x}, found: {:#x}",
                    expected, found
                )
            }
            DecompressError::UnexpectedEof { coding } => {
                write!(f, "unexpected end of {} stream", coding)
            }
            DecompressError::TrailingData { coding } => {
                write!(f, "{} stream finished prematurely", coding)
            }
            DecompressError::InvalidData(msg) => write!(f, "invalid data: {}", msg),
        }
    }
}

impl std::error::Error for DecompressError {}

/// 増分展開トレイト (Sans I/O)
///
/// # 契約
///
/// - 入力カーソルから 0 バイト以上消費し、出力カーソルへ 0 バイト以上書き込む
/// - 出力カーソルの残容量を超えて書き込まない
/// - ブロックしない (進捗の有無にかかわらず速やかに戻る)
/// - 入力の最終チャンクをすべて消費した時点でストリームが正当な終端状態に
///   達していなければ、それは致命的な切断エラーである
/// - 同一インスタンスへの並行呼び出しは不可 (1 ボディにつき同時 1 呼び出し)
pub trait Decompress {
    /// 圧縮データを展開する
    ///
    /// 入力不足で進捗できない場合 (ヘッダーフィールドがチャンク境界で
    /// 分断されている場合等) は出力 0 で戻る。出力容量が尽きた場合は
    /// 入力 0 消費で戻ることがある。
    fn decompress(
        &mut self,
        source: &mut ByteSource<'_>,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), DecompressError>;

    /// ストリームが正当な終端状態に達したか
    fn is_finished(&self) -> bool;
}

/// 展開なし (identity)
///
/// 入力をそのまま出力へコピーする。`Content-Encoding: identity` 用。
#[derive(Debug, Default)]
pub struct IdentityDecompressor {
    finished: bool,
}

impl IdentityDecompressor {
    /// 新しい IdentityDecompressor を作成
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decompress for IdentityDecompressor {
    fn decompress(
        &mut self,
        source: &mut ByteSource<'_>,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), DecompressError> {
        let len = sink.write(source.peek());
        source.advance(len);
        if source.is_final() && !source.has_remaining() {
            self.finished = true;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

/// 全入力を一括展開する
///
/// `input` を論理ストリーム全体 (最終チャンク) として展開し、
/// 展開結果全体を返す。ストリーミングが不要な場合の補助 API。
pub fn decode_all(
    decoder: &mut dyn Decompress,
    input: &[u8],
) -> Result<Vec<u8>, DecompressError> {
    let mut source = ByteSource::new(input, true);
    let mut output = Vec::new();
    let mut buf = [0u8; 8192];
    while !decoder.is_finished() {
        let before = source.position();
        let mut sink = ByteSink::new(&mut buf);
        decoder.decompress(&mut source, &mut sink)?;
        output.extend_from_slice(sink.filled());
        if !decoder.is_finished() && source.position() == before && sink.position() == 0 {
            // 最終チャンクで進捗なしは契約違反 (デコーダー側のバグ)
            return Err(DecompressError::UnexpectedEof {
                coding: "compressed",
            });
        }
    }
    Ok(output)
}
