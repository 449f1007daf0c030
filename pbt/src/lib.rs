//! PBT テスト共通ユーティリティ

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use proptest::prelude::*;

// ========================================
// gzip メンバー構築 (RFC 1952)
// ========================================

const FHCRC: u8 = 1 << 1;
const FEXTRA: u8 = 1 << 2;
const FNAME: u8 = 1 << 3;
const FCOMMENT: u8 = 1 << 4;

/// 構築する gzip メンバーの内容 (展開結果は `data` のみ、他はヘッダーの装飾)
#[derive(Debug, Clone)]
pub struct GzipMember {
    pub data: Vec<u8>,
    pub extra: Option<Vec<u8>>,
    pub file_name: Option<Vec<u8>>,
    pub comment: Option<Vec<u8>>,
    pub header_crc: bool,
}

impl GzipMember {
    pub fn plain(data: Vec<u8>) -> Self {
        Self {
            data,
            extra: None,
            file_name: None,
            comment: None,
            header_crc: false,
        }
    }
}

/// RFC 1952 のフレーミングでメンバーをエンコードする
pub fn encode_member(member: &GzipMember) -> Vec<u8> {
    let mut flags = 0u8;
    if member.extra.is_some() {
        flags |= FEXTRA;
    }
    if member.file_name.is_some() {
        flags |= FNAME;
    }
    if member.comment.is_some() {
        flags |= FCOMMENT;
    }
    if member.header_crc {
        flags |= FHCRC;
    }

    let mut out = vec![0x1f, 0x8b, 8, flags];
    out.extend_from_slice(&[0, 0, 0, 0]); // MTIME
    out.push(0); // XFL
    out.push(255); // OS

    if let Some(extra) = &member.extra {
        out.extend_from_slice(&(extra.len() as u16).to_le_bytes());
        out.extend_from_slice(extra);
    }
    if let Some(name) = &member.file_name {
        out.extend_from_slice(name);
        out.push(0);
    }
    if let Some(comment) = &member.comment {
        out.extend_from_slice(comment);
        out.push(0);
    }
    if member.header_crc {
        let crc16 = (crc32fast::hash(&out) & 0xffff) as u16;
        out.extend_from_slice(&crc16.to_le_bytes());
    }

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&member.data).unwrap();
    out.extend_from_slice(&encoder.finish().unwrap());

    out.extend_from_slice(&crc32fast::hash(&member.data).to_le_bytes());
    out.extend_from_slice(&(member.data.len() as u32).to_le_bytes());
    out
}

/// 複数メンバーの連結ストリームをエンコードする
pub fn encode_members(members: &[GzipMember]) -> Vec<u8> {
    members.iter().flat_map(|m| encode_member(m)).collect()
}

// ========================================
// Strategy 定義
// ========================================

/// 展開対象ペイロード
pub fn payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..2048)
}

/// NUL を含まないヘッダー文字列フィールド (FNAME / FCOMMENT 用)
pub fn zero_free_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(1u8..=255, 0..32)
}

/// gzip メンバー (オプションフィールドをランダムに付与)
pub fn gzip_member() -> impl Strategy<Value = GzipMember> {
    (
        payload(),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
        proptest::option::of(zero_free_bytes()),
        proptest::option::of(zero_free_bytes()),
        any::<bool>(),
    )
        .prop_map(|(data, extra, file_name, comment, header_crc)| GzipMember {
            data,
            extra,
            file_name,
            comment,
            header_crc,
        })
}

/// 入出力チャンクサイズ (1 バイト極端ケースを含む)
pub fn chunk_size() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 2usize..=4096]
}

/// gzip マジックで始まらないゴミバイト列
pub fn garbage_not_magic() -> impl Strategy<Value = Vec<u8>> {
    (0u8..0x1f, proptest::collection::vec(any::<u8>(), 0..63))
        .prop_map(|(first, rest)| {
            let mut bytes = vec![first];
            bytes.extend(rest);
            bytes
        })
}
