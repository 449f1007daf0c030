//! gzip コンテナデコーダー (RFC 1952)
//!
//! raw inflate プリミティブの上に gzip フレーミングの状態機械を実装する。
//! ヘッダー (マジック・圧縮メソッド・フラグ・オプションフィールド)、
//! deflate ボディ、トレーラー (CRC-32 / ISIZE) を検証し、
//! メンバー連結 (1 ストリーム内の複数メンバー) に対応する。
//!
//! すべてのフィールドは任意のチャンク境界で分断されうるため、
//! 状態機械は各フェーズの途中状態を呼び出しをまたいで保持する。

use crc32fast::Hasher;

use crate::decompress::{ByteSink, ByteSource, Decompress, DecompressError};
use crate::inflate::InflateStream;

const CODING: &str = "gzip";

/// RFC 1952 マジックナンバー (ID1, ID2)
const ID1: u8 = 0x1f;
const ID2: u8 = 0x8b;
/// 圧縮メソッド: deflate (唯一の標準値)
const CM_DEFLATE: u8 = 8;

/// FLG ビット (FTEXT = bit 0 は読み飛ばすだけなので定数にしない)
const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;
/// FLG の予約ビット (上位 3 ビット、ゼロでなければならない)
const FLG_RESERVED: u8 = 0xe0;

/// 固定ヘッダー長 (ID1 ID2 CM FLG MTIME[4] XFL OS)
const FIXED_HEADER_LEN: usize = 10;
/// トレーラー長 (CRC32[4] ISIZE[4])
const TRAILER_LEN: usize = 8;

/// gzip デコード状態
///
/// フェーズはメンバー内で単調に遷移し、MemberBoundary でのみ先頭へ戻る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GzipPhase {
    /// 固定ヘッダー 10 バイト読み取り中
    FixedHeader,
    /// FEXTRA 長さプレフィックス (2 バイト LE) 読み取り中
    ExtraLen,
    /// FEXTRA フィールド読み飛ばし中
    Extra { remaining: usize },
    /// FNAME (NUL 終端) 読み飛ばし中
    FileName,
    /// FCOMMENT (NUL 終端) 読み飛ばし中
    Comment,
    /// FHCRC 2 バイト読み飛ばし中 (検証はしない)
    HeaderCrc { remaining: usize },
    /// deflate ボディ展開中
    Body,
    /// トレーラー 8 バイト読み取り中
    Trailer,
    /// メンバー完了。後続入力があれば次のメンバーへ
    MemberBoundary,
    /// 完了
    Done,
}

/// gzip 展開デコーダー
///
/// レスポンスボディ 1 つにつき 1 インスタンス。終端状態 (Done または
/// エラー) に達した後は破棄し、別のボディで再利用しない。
#[derive(Debug)]
pub struct GzipDecompressor {
    phase: GzipPhase,
    /// 固定ヘッダー / 長さプレフィックス / トレーラー用の蓄積バッファ
    buf: [u8; FIXED_HEADER_LEN],
    buf_filled: usize,
    /// 現在のメンバーの FLG バイト
    flags: u8,
    inflate: InflateStream,
    /// 現在のメンバーの展開データに対する CRC-32
    crc: Hasher,
    /// 現在のメンバーの展開バイト数 (mod 2^32)
    size: u32,
    /// 完了したメンバー数
    members_done: u32,
}

impl GzipDecompressor {
    /// 新しい GzipDecompressor を作成
    pub fn new() -> Self {
        Self {
            phase: GzipPhase::FixedHeader,
            buf: [0; FIXED_HEADER_LEN],
            buf_filled: 0,
            flags: 0,
            inflate: InflateStream::new(),
            crc: Hasher::new(),
            size: 0,
            members_done: 0,
        }
    }

    /// 次のメンバーに向けて状態をリセットする
    fn reset_member(&mut self) {
        self.phase = GzipPhase::FixedHeader;
        self.buf_filled = 0;
        self.flags = 0;
        self.inflate.reset();
        self.crc = Hasher::new();
        self.size = 0;
    }

    /// FEXTRA の次のフェーズ
    fn after_extra(&self) -> GzipPhase {
        if self.flags & FNAME != 0 {
            GzipPhase::FileName
        } else {
            self.after_name()
        }
    }

    /// FNAME の次のフェーズ
    fn after_name(&self) -> GzipPhase {
        if self.flags & FCOMMENT != 0 {
            GzipPhase::Comment
        } else {
            self.after_comment()
        }
    }

    /// FCOMMENT の次のフェーズ
    fn after_comment(&self) -> GzipPhase {
        if self.flags & FHCRC != 0 {
            GzipPhase::HeaderCrc {
                remaining: 2,
            }
        } else {
            GzipPhase::Body
        }
    }

    /// 入力不足時の処理
    ///
    /// 最終チャンクを消費し尽くしてなお終端状態でなければ致命的エラー。
    /// 完了済みメンバーの直後 (固定ヘッダー途中で尽きた場合を含む) は
    /// 後続ガベージとして「finished prematurely」に分類する。
    fn need_input(&mut self, source: &ByteSource<'_>) -> Result<(), DecompressError> {
        if !source.is_final() || source.has_remaining() {
            return Ok(());
        }
        match self.phase {
            GzipPhase::MemberBoundary => {
                self.phase = GzipPhase::Done;
                Ok(())
            }
            GzipPhase::FixedHeader if self.members_done > 0 => {
                Err(DecompressError::TrailingData { coding: CODING })
            }
            _ => Err(DecompressError::UnexpectedEof { coding: CODING }),
        }
    }

    /// 固定ヘッダーのバイトを 1 バイト蓄積するたびに検証する
    fn accept_header_byte(&mut self, byte: u8) -> Result<(), DecompressError> {
        self.buf[self.buf_filled] = byte;
        self.buf_filled += 1;
        match self.buf_filled {
            2 => {
                if self.buf[0] != ID1 || self.buf[1] != ID2 {
                    // 完了済みメンバーの後にマジックが現れなければ、
                    // それは次のメンバーではなく後続ガベージである
                    if self.members_done > 0 {
                        return Err(DecompressError::TrailingData { coding: CODING });
                    }
                    return Err(DecompressError::BadGzipMagic {
                        found: u16::from_le_bytes([self.buf[0], self.buf[1]]),
                    });
                }
            }
            3 => {
                if self.buf[2] != CM_DEFLATE {
                    return Err(DecompressError::BadCompressionMethod { found: self.buf[2] });
                }
            }
            4 => {
                if self.buf[3] & FLG_RESERVED != 0 {
                    return Err(DecompressError::ReservedFlags { found: self.buf[3] });
                }
            }
            // MTIME / XFL / OS は検証せず読み飛ばす
            _ => {}
        }
        Ok(())
    }
}

impl Default for GzipDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Decompress for GzipDecompressor {
    fn decompress(
        &mut self,
        source: &mut ByteSource<'_>,
        sink: &mut ByteSink<'_>,
    ) -> Result<(), DecompressError> {
        loop {
            match self.phase {
                GzipPhase::FixedHeader => {
                    while self.buf_filled < FIXED_HEADER_LEN {
                        match source.read_u8() {
                            Some(byte) => self.accept_header_byte(byte)?,
                            None => return self.need_input(source),
                        }
                    }
                    self.flags = self.buf[3];
                    self.buf_filled = 0;
                    self.phase = if self.flags & FEXTRA != 0 {
                        GzipPhase::ExtraLen
                    } else {
                        self.after_extra()
                    };
                }
                GzipPhase::ExtraLen => {
                    while self.buf_filled < 2 {
                        match source.read_u8() {
                            Some(byte) => {
                                self.buf[self.buf_filled] = byte;
                                self.buf_filled += 1;
                            }
                            None => return self.need_input(source),
                        }
                    }
                    let len = u16::from_le_bytes([self.buf[0], self.buf[1]]) as usize;
                    self.buf_filled = 0;
                    self.phase = GzipPhase::Extra { remaining: len };
                }
                GzipPhase::Extra { remaining } => {
                    let n = remaining.min(source.remaining());
                    source.advance(n);
                    if n < remaining {
                        self.phase = GzipPhase::Extra {
                            remaining: remaining - n,
                        };
                        return self.need_input(source);
                    }
                    self.phase = self.after_extra();
                }
                GzipPhase::FileName => loop {
                    match source.read_u8() {
                        Some(0) => {
                            self.phase = self.after_name();
                            break;
                        }
                        Some(_) => {}
                        None => return self.need_input(source),
                    }
                },
                GzipPhase::Comment => loop {
                    match source.read_u8() {
                        Some(0) => {
                            self.phase = self.after_comment();
                            break;
                        }
                        Some(_) => {}
                        None => return self.need_input(source),
                    }
                },
                GzipPhase::HeaderCrc { remaining } => {
                    // ヘッダー CRC16 は消費するだけで検証しない
                    let n = remaining.min(source.remaining());
                    source.advance(n);
                    if n < remaining {
                        self.phase = GzipPhase::HeaderCrc {
                            remaining: remaining - n,
                        };
                        return self.need_input(source);
                    }
                    self.phase = GzipPhase::Body;
                }
                GzipPhase::Body => {
                    let before = sink.position();
                    let (_, produced) = self.inflate.inflate(source, sink)?;
                    if produced > 0 {
                        self.crc.update(&sink.filled()[before..]);
                        self.size = self.size.wrapping_add(produced as u32);
                    }
                    if self.inflate.is_finished() {
                        self.buf_filled = 0;
                        self.phase = GzipPhase::Trailer;
                        continue;
                    }
                    if !sink.has_remaining() {
                        // 出力満杯。呼び出し側が排出してから再呼び出しする
                        return Ok(());
                    }
                    return self.need_input(source);
                }
                GzipPhase::Trailer => {
                    while self.buf_filled < TRAILER_LEN {
                        match source.read_u8() {
                            Some(byte) => {
                                self.buf[self.buf_filled] = byte;
                                self.buf_filled += 1;
                            }
                            None => return self.need_input(source),
                        }
                    }
                    let crc_found =
                        u32::from_le_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]);
                    let size_found =
                        u32::from_le_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]);
                    let crc_computed = self.crc.clone().finalize();
                    if crc_computed != crc_found {
                        return Err(DecompressError::CrcMismatch {
                            expected: crc_computed,
                            found: crc_found,
                        });
                    }
                    if self.size != size_found {
                        return Err(DecompressError::SizeMismatch {
                            expected: self.size,
                            found: size_found,
                        });
                    }
                    self.members_done += 1;
                    self.phase = GzipPhase::MemberBoundary;
                }
                GzipPhase::MemberBoundary => {
                    if source.has_remaining() {
                        // gzip はメンバー連結を許す。次のメンバーとしてパースし、
                        // メンバーでなければヘッダー検証が後続ガベージを報告する
                        self.reset_member();
                        continue;
                    }
                    return self.need_input(source);
                }
                GzipPhase::Done => {
                    if source.has_remaining() {
                        return Err(DecompressError::TrailingData { coding: CODING });
                    }
                    return Ok(());
                }
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.phase == GzipPhase::Done
    }
}
