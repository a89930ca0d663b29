//! HTTP transport used by the online sources, along with a blocklist of unreachable URIs

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::info;

use crate::environment::pki_environment_traits::CheckRemoteResource;
use crate::source::crl_cache::NowFn;
use crate::util::utilities::get_now_as_unix_epoch;

#[cfg(feature = "remote")]
use std::time::Duration;

#[cfg(feature = "remote")]
use log::debug;

#[cfg(feature = "remote")]
use reqwest::header::CONTENT_TYPE;

#[cfg(feature = "remote")]
use crate::{
    environment::pki_environment_traits::HttpTransport,
    util::error::{Error, Result},
    validator::status_settings::{StatusSettings, PS_CRL_TIMEOUT_DEFAULT, PS_OCSP_TIMEOUT_DEFAULT},
};

/// Number of seconds a URI stays on a [`UriBlocklist`] by default
pub const BLOCKLIST_RETRY_INTERVAL_DEFAULT: u64 = 300;

/// `UriBlocklist` provides an in-memory [`CheckRemoteResource`] implementation. URIs that could not
/// be reached are added and are skipped until the retry interval elapses or the URI is removed.
pub struct UriBlocklist {
    blocklist: Mutex<BTreeMap<String, u64>>,
    retry_interval: u64,
    now: NowFn,
}

impl Default for UriBlocklist {
    fn default() -> Self {
        Self::with_retry_interval(BLOCKLIST_RETRY_INTERVAL_DEFAULT, get_now_as_unix_epoch)
    }
}

impl UriBlocklist {
    /// Creates an empty blocklist that uses the default retry interval and the wall clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty blocklist whose entries expire `retry_interval` seconds after being added,
    /// as measured by `now`
    pub fn with_retry_interval(retry_interval: u64, now: NowFn) -> Self {
        UriBlocklist {
            blocklist: Mutex::new(BTreeMap::new()),
            retry_interval,
            now,
        }
    }

    /// Creates a blocklist populated with the given URIs
    pub fn with_uris(uris: &[String]) -> Self {
        let bl = Self::default();
        for uri in uris {
            bl.add_to_blocklist(uri);
        }
        bl
    }
}

impl CheckRemoteResource for UriBlocklist {
    fn check_blocklist(&self, uri: &str) -> bool {
        let now = (self.now)();
        if let Ok(mut g) = self.blocklist.lock() {
            match g.get(uri) {
                Some(added) if now < added.saturating_add(self.retry_interval) => true,
                Some(_) => {
                    info!("Retry interval for {} elapsed", uri);
                    g.remove(uri);
                    false
                }
                None => false,
            }
        } else {
            false
        }
    }

    fn add_to_blocklist(&self, uri: &str) {
        let now = (self.now)();
        if let Ok(mut g) = self.blocklist.lock() {
            if g.insert(uri.to_string(), now).is_none() {
                info!("Added {} to blocklist", uri);
            }
        }
    }

    fn remove_from_blocklist(&self, uri: &str) {
        if let Ok(mut g) = self.blocklist.lock() {
            if g.remove(uri).is_some() {
                info!("Removed {} from blocklist", uri);
            }
        }
    }
}

/// `ReqwestTransport` implements [`HttpTransport`] using reqwest's blocking client. Separate
/// timeouts are applied to GET requests (used for CRLs and certificates) and POST requests (used
/// for OCSP).
#[cfg(feature = "remote")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    fetch_timeout: Duration,
    post_timeout: Duration,
}

#[cfg(feature = "remote")]
impl Default for ReqwestTransport {
    fn default() -> Self {
        ReqwestTransport {
            fetch_timeout: PS_CRL_TIMEOUT_DEFAULT,
            post_timeout: PS_OCSP_TIMEOUT_DEFAULT,
        }
    }
}

#[cfg(feature = "remote")]
impl ReqwestTransport {
    /// Creates a transport with the indicated timeouts
    pub fn new(fetch_timeout: Duration, post_timeout: Duration) -> Self {
        ReqwestTransport {
            fetch_timeout,
            post_timeout,
        }
    }

    /// Creates a transport using the `PS_CRL_TIMEOUT` and `PS_OCSP_TIMEOUT` settings
    pub fn from_settings(sts: &StatusSettings) -> Self {
        Self::new(sts.get_crl_timeout(), sts.get_ocsp_timeout())
    }

    fn client(&self, timeout: Duration) -> Result<reqwest::blocking::Client> {
        match reqwest::blocking::Client::builder().timeout(timeout).build() {
            Ok(c) => Ok(c),
            Err(e) => {
                debug!("Failed to prepare HTTP client: {}", e);
                Err(Error::NetworkError)
            }
        }
    }

    fn read_body(uri: &str, response: reqwest::blocking::Response) -> Result<Vec<u8>> {
        if !response.status().is_success() {
            debug!("Request to {} failed with status {}", uri, response.status());
            return Err(Error::NetworkError);
        }
        match response.bytes() {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(e) => {
                debug!("Failed to read response body from {} with {}", uri, e);
                Err(Error::NetworkError)
            }
        }
    }
}

#[cfg(feature = "remote")]
impl HttpTransport for ReqwestTransport {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let client = self.client(self.fetch_timeout)?;
        match client.get(uri).send() {
            Ok(response) => Self::read_body(uri, response),
            Err(e) => {
                debug!("Failed to fetch {}: {:?}", uri, e);
                Err(Error::NetworkError)
            }
        }
    }

    fn post(&self, uri: &str, content_type: &str, body: &[u8]) -> Result<Vec<u8>> {
        let client = self.client(self.post_timeout)?;
        match client
            .post(uri)
            .body(body.to_vec())
            .header(CONTENT_TYPE, content_type)
            .send()
        {
            Ok(response) => Self::read_body(uri, response),
            Err(e) => {
                debug!("Request send failed with {}: {}", e, uri);
                Err(Error::NetworkError)
            }
        }
    }
}

#[cfg(test)]
static BLOCKLIST_CLOCK: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1000);

#[cfg(test)]
fn blocklist_clock() -> u64 {
    BLOCKLIST_CLOCK.load(std::sync::atomic::Ordering::SeqCst)
}

#[test]
fn blocklist_test() {
    let bl = UriBlocklist::with_uris(&["http://blocklist.test".to_string()]);
    assert!(bl.check_blocklist("http://blocklist.test"));
    assert!(!bl.check_blocklist("http://other.test"));
    bl.add_to_blocklist("http://other.test");
    assert!(bl.check_blocklist("http://other.test"));
    bl.remove_from_blocklist("http://other.test");
    assert!(!bl.check_blocklist("http://other.test"));
}

#[test]
fn blocklist_entries_expire() {
    use std::sync::atomic::Ordering;
    let bl = UriBlocklist::with_retry_interval(60, blocklist_clock);
    bl.add_to_blocklist("http://blocklist.test");
    BLOCKLIST_CLOCK.store(1059, Ordering::SeqCst);
    assert!(bl.check_blocklist("http://blocklist.test"));
    BLOCKLIST_CLOCK.store(1060, Ordering::SeqCst);
    assert!(!bl.check_blocklist("http://blocklist.test"));
}

#[cfg(feature = "remote")]
#[test]
fn unreachable_host_is_network_error() {
    let t = ReqwestTransport::new(Duration::from_secs(2), Duration::from_secs(2));
    assert_eq!(
        Err(Error::NetworkError),
        t.fetch("http://127.0.0.1:1/unreachable.crl")
    );
}
