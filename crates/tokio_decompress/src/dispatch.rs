//! 展開済みバッチの順序付きディスパッチ
//!
//! 圧縮ストリームを読みながら展開し、展開済みバッチを mpsc チャネル
//! 経由で下流コンシューマーへ産出順に転送する。コンシューマーは
//! [`spawn_consumer`] で任意のランタイムハンドル上に起動できる。
//! レシーバーが先にドロップされたらキャンセルと見なし、以降の
//! 展開を即座に停止する。

use shiguredo_decompress::{ByteSink, ByteSource, Decompress};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

const BATCH_SIZE: usize = 8192;

/// 圧縮ストリームを展開し、バッチを順序どおりチャネルへ送る
///
/// デコーダーがストリーム終端に達したら `Ok(())`。レシーバーが
/// ドロップ済みなら [`Error::Cancelled`] を返し、それ以上デコーダーを
/// 呼ばない。
pub async fn dispatch_decoded<R>(
    mut input: R,
    mut decoder: Box<dyn Decompress + Send>,
    tx: mpsc::Sender<Vec<u8>>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut in_buf = vec![0u8; BATCH_SIZE];
    let mut out_buf = vec![0u8; BATCH_SIZE];
    loop {
        let n = input.read(&mut in_buf).await?;
        let eof = n == 0;
        let mut source = ByteSource::new(&in_buf[..n], eof);
        loop {
            let consumed_before = source.position();
            let mut sink = ByteSink::new(&mut out_buf);
            decoder.decompress(&mut source, &mut sink)?;
            let produced = sink.position();
            if produced > 0 && tx.send(out_buf[..produced].to_vec()).await.is_err() {
                return Err(Error::Cancelled);
            }
            if produced == 0 && source.position() == consumed_before {
                break;
            }
        }
        if decoder.is_finished() {
            return Ok(());
        }
        if eof {
            // デコーダーの契約上、最終チャンクを使い切った時点で
            // 終端かエラーのどちらかになる
            return Ok(());
        }
    }
}

/// 下流コンシューマーを指定のランタイムハンドル上に起動する
///
/// `handle` が `None` なら現在のランタイムに spawn する。バッチは
/// 送信順 (= 産出順) に一つずつ渡される。チャネルが閉じたら終了。
pub fn spawn_consumer<C>(
    handle: Option<&Handle>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    mut consumer: C,
) -> JoinHandle<()>
where
    C: FnMut(Vec<u8>) + Send + 'static,
{
    let task = async move {
        while let Some(batch) = rx.recv().await {
            consumer(batch);
        }
    };
    match handle {
        Some(handle) => handle.spawn(task),
        None => tokio::spawn(task),
    }
}
