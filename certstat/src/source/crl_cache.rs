//! Caching decorator for [`OnlineCrlSource`] along with in-memory and folder-backed stores

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::environment::pki_environment_traits::{CrlCacheStore, CrlSource};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::source::crl_source::{get_crl_dps, CrlToken, OnlineCrlSource};
use crate::util::error::{Error, Result};
use crate::util::utilities::{get_now_as_unix_epoch, sha256_hex};

/// Function returning the current time as seconds since the Unix epoch
pub type NowFn = fn() -> u64;

/// Derives the cache key for a CRL distribution point URI, i.e., the lowercase hex SHA-256 of the
/// URI. The same value names files in a [`FolderCrlCacheStore`].
pub fn crl_cache_key(uri: &str) -> String {
    sha256_hex(uri.as_bytes())
}

/// `MemoryCrlCacheStore` is a [`CrlCacheStore`] that holds CRLs in a map for the life of the
/// instance.
#[derive(Debug, Default)]
pub struct MemoryCrlCacheStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryCrlCacheStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the store
    pub fn len(&self) -> usize {
        if let Ok(g) = self.entries.lock() {
            g.len()
        } else {
            0
        }
    }

    /// Returns true if the store holds no entries
    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }
}

impl CrlCacheStore for MemoryCrlCacheStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Ok(g) = self.entries.lock() {
            g.get(key).cloned()
        } else {
            None
        }
    }

    fn insert(&self, key: &str, crl: &[u8]) -> Result<()> {
        if let Ok(mut g) = self.entries.lock() {
            g.insert(key.to_string(), crl.to_vec());
            Ok(())
        } else {
            Err(Error::Unrecognized)
        }
    }

    fn update(&self, key: &str, crl: &[u8]) -> Result<()> {
        self.insert(key, crl)
    }

    fn clear(&self) {
        if let Ok(mut g) = self.entries.lock() {
            g.clear();
        }
    }
}

/// `FolderCrlCacheStore` is a [`CrlCacheStore`] that writes each CRL to `<key>.crl` in a folder so
/// that cached CRLs survive across processes.
#[derive(Clone, Debug)]
#[readonly::make]
pub struct FolderCrlCacheStore {
    /// Folder where CRLs are stored
    #[readonly]
    pub crls_folder: String,
}

impl FolderCrlCacheStore {
    /// Creates a store that uses the indicated folder, creating the folder if necessary
    pub fn new(crls_folder: &str) -> Result<Self> {
        fs::create_dir_all(crls_folder)?;
        Ok(FolderCrlCacheStore {
            crls_folder: crls_folder.to_string(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        Path::new(self.crls_folder.as_str()).join(format!("{}.crl", key))
    }
}

impl CrlCacheStore for FolderCrlCacheStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.path_for(key);
        if !path.exists() {
            return None;
        }
        match fs::read(&path) {
            Ok(b) => Some(b),
            Err(e) => {
                error!("Failed to read cached CRL from {}: {}", path.display(), e);
                None
            }
        }
    }

    fn insert(&self, key: &str, crl: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Err(e) = fs::write(&path, crl) {
            error!("Failed to write cached CRL to {}: {}", path.display(), e);
            return Err(Error::StdIoError(e.kind()));
        }
        Ok(())
    }

    fn update(&self, key: &str, crl: &[u8]) -> Result<()> {
        self.insert(key, crl)
    }

    fn clear(&self) {
        let files = match fs::read_dir(&self.crls_folder) {
            Ok(files) => files,
            Err(_) => return,
        };
        for entry in files.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("crl") {
                if let Err(e) = fs::remove_file(&path) {
                    error!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// State of a cache key as observed by this process
enum CacheSlot {
    /// No CRL has been obtained for the key by this instance
    Unfetched,
    /// A CRL has been written to the store for the key
    Fetched,
}

/// `CachingCrlSource` wraps an [`OnlineCrlSource`] and a [`CrlCacheStore`]. A cached CRL is used
/// only while its nextUpdate is after the current time; otherwise it is downloaded again and the
/// store is updated. A CRL that lacks nextUpdate is always downloaded again.
///
/// Each distribution point URI has its own lock that is held while the store is read, freshness is
/// checked and the CRL is refreshed and written, so concurrent requests for the same URI result in
/// a single download.
pub struct CachingCrlSource {
    online: OnlineCrlSource,
    store: Arc<dyn CrlCacheStore>,
    now: NowFn,
    slots: Mutex<BTreeMap<String, Arc<Mutex<CacheSlot>>>>,
}

impl CachingCrlSource {
    /// Creates a caching source that uses the wall clock
    pub fn new(online: OnlineCrlSource, store: Arc<dyn CrlCacheStore>) -> Self {
        Self::with_clock(online, store, get_now_as_unix_epoch)
    }

    /// Creates a caching source that uses the given clock
    pub fn with_clock(online: OnlineCrlSource, store: Arc<dyn CrlCacheStore>, now: NowFn) -> Self {
        CachingCrlSource {
            online,
            store,
            now,
            slots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns a builder
    pub fn builder() -> CachingCrlSourceBuilder {
        CachingCrlSourceBuilder::default()
    }

    fn slot(&self, key: &str) -> Option<Arc<Mutex<CacheSlot>>> {
        if let Ok(mut g) = self.slots.lock() {
            Some(
                g.entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(CacheSlot::Unfetched)))
                    .clone(),
            )
        } else {
            None
        }
    }

    fn is_fresh(&self, token: &CrlToken) -> bool {
        match token.next_update() {
            Some(nu) => nu > (self.now)(),
            None => false,
        }
    }

    /// Returns the CRL for the URI from the store when fresh, otherwise downloads it and refreshes
    /// the store.
    pub fn get_crl(&self, uri: &str) -> Option<CrlToken> {
        let key = crl_cache_key(uri);
        let slot = self.slot(&key)?;
        let mut state = match slot.lock() {
            Ok(g) => g,
            Err(_) => return None,
        };

        let cached = match self.store.get(&key) {
            Some(bytes) => match CrlToken::new(&bytes, Some(uri.to_string())) {
                Ok(token) => Some(token),
                Err(e) => {
                    info!("Discarding unparsable cached CRL for {}: {:?}", uri, e);
                    None
                }
            },
            None => None,
        };

        let present = cached.is_some();
        if let Some(token) = cached {
            if self.is_fresh(&token) {
                debug!("Using cached CRL for {}", uri);
                *state = CacheSlot::Fetched;
                return Some(token);
            }
            debug!("Cached CRL for {} is stale", uri);
        }

        let token = match self.online.fetch_crl(uri) {
            Ok(token) => token,
            Err(e) => {
                info!("Failed to refresh CRL from {}: {:?}", uri, e);
                return None;
            }
        };

        let r = if present {
            self.store.update(&key, &token.encoded)
        } else {
            self.store.insert(&key, &token.encoded)
        };
        match r {
            Ok(()) => *state = CacheSlot::Fetched,
            Err(e) => error!("Failed to cache CRL from {}: {:?}", uri, e),
        }
        Some(token)
    }

    /// Returns true if a CRL has been obtained for the URI by this instance
    pub fn is_fetched(&self, uri: &str) -> bool {
        let key = crl_cache_key(uri);
        let slot = match self.slots.lock() {
            Ok(g) => g.get(&key).cloned(),
            Err(_) => None,
        };
        let mut retval = false;
        if let Some(slot) = slot {
            if let Ok(g) = slot.lock() {
                retval = matches!(*g, CacheSlot::Fetched);
            }
        }
        retval
    }
}

impl CrlSource for CachingCrlSource {
    fn find_crl(
        &self,
        cert: &CertificateWithContext,
        _issuer: &CertificateWithContext,
    ) -> Option<CrlToken> {
        for uri in get_crl_dps(cert) {
            if let Some(token) = self.get_crl(&uri) {
                return Some(token);
            }
        }
        None
    }
}

/// Builder for [`CachingCrlSource`]. Both the online source and the store must be supplied.
#[derive(Default)]
pub struct CachingCrlSourceBuilder {
    online: Option<OnlineCrlSource>,
    store: Option<Arc<dyn CrlCacheStore>>,
    now: Option<NowFn>,
}

impl CachingCrlSourceBuilder {
    /// Sets the online source used to refresh the cache
    pub fn online_source(mut self, online: OnlineCrlSource) -> Self {
        self.online = Some(online);
        self
    }

    /// Sets the store that holds cached CRLs
    pub fn store(mut self, store: Arc<dyn CrlCacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the clock used to check freshness
    pub fn clock(mut self, now: NowFn) -> Self {
        self.now = Some(now);
        self
    }

    /// Returns the configured source or [`Error::Misconfiguration`] if a collaborator is missing
    pub fn build(self) -> Result<CachingCrlSource> {
        let online = match self.online {
            Some(o) => o,
            None => {
                error!("CachingCrlSource requires an online CRL source");
                return Err(Error::Misconfiguration);
            }
        };
        let store = match self.store {
            Some(s) => s,
            None => {
                error!("CachingCrlSource requires a cache store");
                return Err(Error::Misconfiguration);
            }
        };
        Ok(CachingCrlSource::with_clock(
            online,
            store,
            self.now.unwrap_or(get_now_as_unix_epoch),
        ))
    }
}

#[test]
fn memory_store_test() {
    let store = MemoryCrlCacheStore::new();
    assert!(store.is_empty());
    assert!(store.get("k").is_none());
    store.insert("k", &[1, 2, 3]).unwrap();
    assert_eq!(Some(vec![1, 2, 3]), store.get("k"));
    store.update("k", &[4]).unwrap();
    assert_eq!(Some(vec![4]), store.get("k"));
    assert_eq!(1, store.len());
    store.clear();
    assert!(store.is_empty());
}

#[test]
fn folder_store_test() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().join("cache");
    let store = FolderCrlCacheStore::new(folder.to_str().unwrap()).unwrap();
    let key = crl_cache_key("http://crl.example.test/ca.crl");
    assert!(store.get(&key).is_none());
    store.insert(&key, &[0x30, 0x00]).unwrap();
    assert!(folder.join(format!("{}.crl", key)).exists());
    assert_eq!(Some(vec![0x30, 0x00]), store.get(&key));
    store.clear();
    assert!(store.get(&key).is_none());
}

#[test]
fn cache_key_test() {
    let key = crl_cache_key("http://crl.example.test/ca.crl");
    assert_eq!(64, key.len());
    assert_eq!(key, key.to_lowercase());
    assert_ne!(key, crl_cache_key("http://crl.example.test/other.crl"));
}

#[test]
fn builder_requires_collaborators() {
    assert_eq!(
        Some(Error::Misconfiguration),
        CachingCrlSource::builder().build().err()
    );
    assert_eq!(
        Some(Error::Misconfiguration),
        CachingCrlSource::builder()
            .store(Arc::new(MemoryCrlCacheStore::new()))
            .build()
            .err()
    );
}
