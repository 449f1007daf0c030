//! 非同期ストリーミング展開リーダー

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use shiguredo_decompress::{
    ByteSink, ByteSource, DecoderRegistry, Decompress, DeflateDecompressor, GzipDecompressor,
    IdentityDecompressor, prepare_decoding,
};
use tokio::io::{AsyncRead, ReadBuf};

const DEFAULT_BUF_SIZE: usize = 8192;

/// 圧縮ボディを読みながら展開する [`AsyncRead`] アダプター
///
/// 内部リーダーから圧縮バイトを読み、Sans I/O デコーダーを通して
/// 展開済みバイトを返す。展開エラーは `io::ErrorKind::InvalidData` に
/// 変換される。デコーダーがストリーム終端に達したら EOF を返す。
pub struct DecodedReader<R> {
    inner: R,
    decoder: Box<dyn Decompress + Send>,
    buf: Vec<u8>,
    buf_pos: usize,
    buf_len: usize,
    eof: bool,
    done: bool,
}

impl<R: std::fmt::Debug> std::fmt::Debug for DecodedReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedReader")
            .field("inner", &self.inner)
            .field("buf_pos", &self.buf_pos)
            .field("buf_len", &self.buf_len)
            .field("eof", &self.eof)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: AsyncRead + Unpin> DecodedReader<R> {
    /// 任意のデコーダーでリーダーを作成
    pub fn new(inner: R, decoder: Box<dyn Decompress + Send>) -> Self {
        Self::with_capacity(inner, decoder, DEFAULT_BUF_SIZE)
    }

    /// 入力バッファサイズを指定してリーダーを作成
    pub fn with_capacity(inner: R, decoder: Box<dyn Decompress + Send>, capacity: usize) -> Self {
        Self {
            inner,
            decoder,
            buf: vec![0; capacity.max(1)],
            buf_pos: 0,
            buf_len: 0,
            eof: false,
            done: false,
        }
    }

    /// gzip ストリームを展開するリーダーを作成
    pub fn gzip(inner: R) -> Self {
        Self::new(inner, Box::new(GzipDecompressor::new()))
    }

    /// deflate ストリームを展開するリーダーを作成
    pub fn deflate(inner: R) -> Self {
        Self::new(inner, Box::new(DeflateDecompressor::new()))
    }

    /// レスポンスヘッダーからデコーダーを選択してリーダーを作成
    ///
    /// Content-Encoding がなければパススルー。対応ファクトリーが
    /// なければ [`crate::Error::Decoding`]。
    pub fn for_headers(
        inner: R,
        headers: &[(String, String)],
        registry: &DecoderRegistry,
    ) -> crate::error::Result<Self> {
        let decoding = prepare_decoding(headers, registry)?;
        let decoder = decoding
            .decoder
            .unwrap_or_else(|| Box::new(IdentityDecompressor::new()));
        Ok(Self::new(inner, decoder))
    }

    /// 内部リーダーを取り出す
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// デコーダーがストリーム終端に達したか
    pub fn is_finished(&self) -> bool {
        self.decoder.is_finished()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for DecodedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if out.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            if this.done {
                return Poll::Ready(Ok(()));
            }

            if this.buf_pos < this.buf_len || this.eof {
                let (consumed, produced) = {
                    let mut source =
                        ByteSource::new(&this.buf[this.buf_pos..this.buf_len], this.eof);
                    let mut sink = ByteSink::new(out.initialize_unfilled());
                    if let Err(e) = this.decoder.decompress(&mut source, &mut sink) {
                        this.done = true;
                        return Poll::Ready(Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            e,
                        )));
                    }
                    (source.position(), sink.position())
                };
                this.buf_pos += consumed;
                out.advance(produced);

                if this.decoder.is_finished() && this.buf_pos == this.buf_len {
                    this.done = true;
                    return Poll::Ready(Ok(()));
                }
                if produced > 0 {
                    return Poll::Ready(Ok(()));
                }
                // 入力を使い切り出力も出なかった: 追加入力が必要
                if this.buf_pos < this.buf_len {
                    continue;
                }
            }

            this.buf_pos = 0;
            this.buf_len = 0;
            let mut read_buf = ReadBuf::new(&mut this.buf);
            match Pin::new(&mut this.inner).poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Ready(Ok(())) => {
                    this.buf_len = read_buf.filled().len();
                    if this.buf_len == 0 {
                        this.eof = true;
                    }
                }
            }
        }
    }
}
