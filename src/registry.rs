//! デコーダーレジストリ
//!
//! Content-Encoding トークンからデコーダーファクトリーを引く。
//! ファクトリー集合は最初のルックアップ時に一度だけ遅延発見され、
//! レジストリの生存期間 (通常はプロセス生存期間) にわたってキャッシュされる。
//! 発見のやり直しや無効化は行わない。
//!
//! レジストリは隠れたグローバルシングルトンではなく、明示的に構築して
//! 明示的に引き渡すオブジェクトである。
//!
//! ## 使い方
//!
//! ```rust
//! use shiguredo_decompress::DecoderRegistry;
//!
//! let registry = DecoderRegistry::new();
//! let factory = registry.factory_for("gzip").unwrap().unwrap();
//! let decoder = factory.create();
//! assert!(!decoder.is_finished());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use crate::decompress::{Decompress, IdentityDecompressor};
use crate::deflate::DeflateDecompressor;
use crate::gzip::GzipDecompressor;

/// レジストリエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// ファクトリー発見処理が同一スレッドから再入的に呼び出された
    ///
    /// 発見クロージャの内部から同じレジストリをルックアップすると発生する。
    /// デッドロックさせず構成エラーとして報告する。
    RecursiveDiscovery,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::RecursiveDiscovery => {
                write!(f, "recursive loading of decoder factories")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// デコーダーファクトリー
///
/// 1 つのコンテント コーディングに対応し、レスポンスボディごとに
/// 新しいデコーダーインスタンスを作成する。
pub trait DecoderFactory: Send + Sync {
    /// 対応するエンコーディングトークン (正規化済み小文字)
    fn encoding(&self) -> &str;

    /// 新しいデコーダーを作成
    fn create(&self) -> Box<dyn Decompress + Send>;
}

/// gzip ファクトリー
pub struct GzipDecoderFactory;

impl DecoderFactory for GzipDecoderFactory {
    fn encoding(&self) -> &str {
        "gzip"
    }

    fn create(&self) -> Box<dyn Decompress + Send> {
        Box::new(GzipDecompressor::new())
    }
}

/// deflate ファクトリー
pub struct DeflateDecoderFactory;

impl DecoderFactory for DeflateDecoderFactory {
    fn encoding(&self) -> &str {
        "deflate"
    }

    fn create(&self) -> Box<dyn Decompress + Send> {
        Box::new(DeflateDecompressor::new())
    }
}

/// identity ファクトリー
pub struct IdentityDecoderFactory;

impl DecoderFactory for IdentityDecoderFactory {
    fn encoding(&self) -> &str {
        "identity"
    }

    fn create(&self) -> Box<dyn Decompress + Send> {
        Box::new(IdentityDecompressor::new())
    }
}

type DiscoveryFn = dyn Fn() -> Vec<Arc<dyn DecoderFactory>> + Send + Sync;

/// デコーダーレジストリ
///
/// ファクトリー発見は最初のルックアップで一度だけ実行される。
/// 複数スレッドから同時に初回ルックアップされた場合、発見は 1 回だけ走り、
/// 他のスレッドは完了までブロックして同じキャッシュ結果を観測する。
pub struct DecoderRegistry {
    discovery: Box<DiscoveryFn>,
    factories: OnceLock<Vec<Arc<dyn DecoderFactory>>>,
    init_lock: Mutex<()>,
}

impl DecoderRegistry {
    /// 組み込みファクトリー (gzip, deflate, identity) を持つレジストリを作成
    pub fn new() -> Self {
        Self::with_discovery(|| {
            vec![
                Arc::new(GzipDecoderFactory) as Arc<dyn DecoderFactory>,
                Arc::new(DeflateDecoderFactory),
                Arc::new(IdentityDecoderFactory),
            ]
        })
    }

    /// カスタム発見クロージャを持つレジストリを作成
    ///
    /// クロージャは最初のルックアップ時に一度だけ呼び出される。
    pub fn with_discovery<F>(discovery: F) -> Self
    where
        F: Fn() -> Vec<Arc<dyn DecoderFactory>> + Send + Sync + 'static,
    {
        Self {
            discovery: Box::new(discovery),
            factories: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// トークンに対応するファクトリーを引く
    ///
    /// トークンは前後空白を無視し、大文字小文字を区別しない。
    /// 対応するファクトリーがなければ `Ok(None)`。
    pub fn factory_for(
        &self,
        token: &str,
    ) -> Result<Option<Arc<dyn DecoderFactory>>, RegistryError> {
        let token = token.trim();
        let factories = self.factories()?;
        Ok(factories
            .iter()
            .find(|factory| factory.encoding().eq_ignore_ascii_case(token))
            .cloned())
    }

    /// キャッシュ済みファクトリー一覧 (未発見なら発見を実行)
    fn factories(&self) -> Result<&[Arc<dyn DecoderFactory>], RegistryError> {
        // ロックなしの高速パス
        if let Some(factories) = self.factories.get() {
            return Ok(factories);
        }
        // ロック獲得前に再入を検出する (獲得後ではデッドロックする)
        let _guard = DiscoveryGuard::enter(self)?;
        let _lock = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        // ロック獲得中に他スレッドが発見を終えていれば再実行しない
        if let Some(factories) = self.factories.get() {
            return Ok(factories);
        }
        let discovered = (self.discovery)();
        Ok(self.factories.get_or_init(move || discovered))
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encodings: Option<Vec<&str>> = self
            .factories
            .get()
            .map(|factories| factories.iter().map(|factory| factory.encoding()).collect());
        f.debug_struct("DecoderRegistry")
            .field("factories", &encodings)
            .finish()
    }
}

thread_local! {
    /// このスレッドで発見処理中のレジストリ (アドレスで識別)
    static DISCOVERING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// 発見処理中マーカー (スコープガード)
struct DiscoveryGuard {
    key: usize,
}

impl DiscoveryGuard {
    fn enter(registry: &DecoderRegistry) -> Result<Self, RegistryError> {
        let key = registry as *const DecoderRegistry as usize;
        DISCOVERING.with(|discovering| {
            let mut discovering = discovering.borrow_mut();
            if discovering.contains(&key) {
                return Err(RegistryError::RecursiveDiscovery);
            }
            discovering.push(key);
            Ok(())
        })?;
        Ok(Self { key })
    }
}

impl Drop for DiscoveryGuard {
    fn drop(&mut self) {
        DISCOVERING.with(|discovering| {
            discovering.borrow_mut().retain(|&key| key != self.key);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::decompress::decode_all;

    #[test]
    fn test_builtin_factories() {
        let registry = DecoderRegistry::new();
        for token in ["gzip", "deflate", "identity"] {
            let factory = registry.factory_for(token).unwrap();
            assert!(factory.is_some(), "missing factory for {}", token);
            assert_eq!(factory.unwrap().encoding(), token);
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = DecoderRegistry::new();
        assert!(registry.factory_for("GZIP").unwrap().is_some());
        assert!(registry.factory_for("Deflate").unwrap().is_some());
        assert!(registry.factory_for(" gzip ").unwrap().is_some());
    }

    #[test]
    fn test_unknown_token_returns_none() {
        let registry = DecoderRegistry::new();
        assert!(registry.factory_for("br").unwrap().is_none());
        assert!(registry.factory_for("zstd").unwrap().is_none());
    }

    #[test]
    fn test_created_decoder_decodes() {
        use std::io::Write;

        use flate2::Compression;
        use flate2::write::GzEncoder;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"registry test").unwrap();
        let compressed = encoder.finish().unwrap();

        let registry = DecoderRegistry::new();
        let factory = registry.factory_for("gzip").unwrap().unwrap();
        let mut decoder = factory.create();
        assert_eq!(decode_all(&mut *decoder, &compressed).unwrap(), b"registry test");
    }

    #[test]
    fn test_discovery_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let registry = DecoderRegistry::with_discovery(move || {
            count2.fetch_add(1, Ordering::SeqCst);
            vec![Arc::new(GzipDecoderFactory) as Arc<dyn DecoderFactory>]
        });

        assert!(registry.factory_for("gzip").unwrap().is_some());
        assert!(registry.factory_for("deflate").unwrap().is_none());
        assert!(registry.factory_for("gzip").unwrap().is_some());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_lookup_discovers_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        let registry = Arc::new(DecoderRegistry::with_discovery(move || {
            count2.fetch_add(1, Ordering::SeqCst);
            // 発見中に他スレッドの初回ルックアップが重なるようにする
            std::thread::sleep(Duration::from_millis(50));
            vec![Arc::new(GzipDecoderFactory) as Arc<dyn DecoderFactory>]
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.factory_for("gzip").unwrap().is_some())
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_recursive_discovery_is_detected() {
        let slot: Arc<OnceLock<Arc<DecoderRegistry>>> = Arc::new(OnceLock::new());
        let slot2 = slot.clone();
        let inner_result: Arc<Mutex<Option<RegistryError>>> = Arc::new(Mutex::new(None));
        let inner_result2 = inner_result.clone();

        let registry = Arc::new(DecoderRegistry::with_discovery(move || {
            // 行儀の悪いファクトリーが発見中に同じレジストリを引くケース
            if let Some(registry) = slot2.get() {
                if let Err(e) = registry.factory_for("gzip") {
                    *inner_result2.lock().unwrap() = Some(e);
                }
            }
            Vec::new()
        }));
        let _ = slot.set(registry.clone());

        // 外側のルックアップ自体は完了する (発見結果は空)
        assert!(registry.factory_for("gzip").unwrap().is_none());
        assert_eq!(
            inner_result.lock().unwrap().take(),
            Some(RegistryError::RecursiveDiscovery)
        );
    }

    #[test]
    fn test_custom_factory() {
        struct PassThroughBrotli;
        impl DecoderFactory for PassThroughBrotli {
            fn encoding(&self) -> &str {
                "br"
            }
            fn create(&self) -> Box<dyn Decompress + Send> {
                Box::new(IdentityDecompressor::new())
            }
        }

        let registry = DecoderRegistry::with_discovery(|| {
            vec![
                Arc::new(GzipDecoderFactory) as Arc<dyn DecoderFactory>,
                Arc::new(PassThroughBrotli),
            ]
        });
        assert!(registry.factory_for("br").unwrap().is_some());
        assert!(registry.factory_for("BR").unwrap().is_some());
        assert!(registry.factory_for("identity").unwrap().is_none());
    }

    #[test]
    fn test_registry_error_display() {
        assert_eq!(
            RegistryError::RecursiveDiscovery.to_string(),
            "recursive loading of decoder factories"
        );
    }
}
