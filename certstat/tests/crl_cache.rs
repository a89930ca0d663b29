mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use common::*;

use certstat::*;

static REFRESH_CLOCK: AtomicU64 = AtomicU64::new(NOW);
fn refresh_clock() -> u64 {
    REFRESH_CLOCK.load(Ordering::SeqCst)
}

fn fixed_clock() -> u64 {
    NOW
}

fn caching_source(
    transport: &Arc<MockTransport>,
    store: Arc<dyn CrlCacheStore>,
    now: NowFn,
) -> CachingCrlSource {
    CachingCrlSource::builder()
        .online_source(OnlineCrlSource::new(transport.clone()))
        .store(store)
        .clock(now)
        .build()
        .unwrap()
}

#[test]
fn fresh_crl_is_not_downloaded_again() {
    let transport = MockTransport::new();
    transport.set(CRL_URI, &ca_crl(&[]));
    let store = Arc::new(MemoryCrlCacheStore::new());
    let source = caching_source(&transport, store.clone(), fixed_clock);

    assert!(!source.is_fetched(CRL_URI));
    for _ in 0..3 {
        assert!(source.find_crl(&leaf(), &ca()).is_some());
    }
    assert_eq!(1, transport.fetch_count());
    assert_eq!(1, store.len());
    assert!(source.is_fetched(CRL_URI));
}

#[test]
fn stale_crl_is_downloaded_once_more() {
    let transport = MockTransport::new();
    transport.set(CRL_URI, &ca_crl(&[]));
    let store = Arc::new(MemoryCrlCacheStore::new());
    let source = caching_source(&transport, store.clone(), refresh_clock);

    let first = source.get_crl(CRL_URI).unwrap();
    assert_eq!(Some(NOW + 7 * DAY), first.next_update());
    assert!(source.get_crl(CRL_URI).is_some());
    assert_eq!(1, transport.fetch_count());

    // publish a newer CRL and move past nextUpdate of the cached one
    let newer = make_crl(
        CA_NAME,
        &ca_key(),
        NOW + 7 * DAY,
        Some(NOW + 14 * DAY),
        &[(LEAF_SERIAL, NOW + 7 * DAY, None)],
    );
    transport.set(CRL_URI, &newer);
    REFRESH_CLOCK.store(NOW + 8 * DAY, Ordering::SeqCst);

    let second = source.get_crl(CRL_URI).unwrap();
    assert_eq!(Some(NOW + 14 * DAY), second.next_update());
    assert_eq!(2, transport.fetch_count());

    assert!(source.get_crl(CRL_URI).is_some());
    assert_eq!(2, transport.fetch_count());
    assert_eq!(1, store.len());
    assert_eq!(Some(newer), store.get(&crl_cache_key(CRL_URI)));
}

#[test]
fn crl_without_next_update_is_always_refreshed() {
    let transport = MockTransport::new();
    transport.set(CRL_URI, &make_crl(CA_NAME, &ca_key(), NOW - DAY, None, &[]));
    let source = caching_source(&transport, Arc::new(MemoryCrlCacheStore::new()), fixed_clock);
    assert!(source.get_crl(CRL_URI).is_some());
    assert!(source.get_crl(CRL_URI).is_some());
    assert_eq!(2, transport.fetch_count());
}

#[test]
fn stale_crl_is_not_served_when_refresh_fails() {
    let transport = MockTransport::new();
    let store = Arc::new(MemoryCrlCacheStore::new());
    let stale = make_crl(CA_NAME, &ca_key(), NOW - 10 * DAY, Some(NOW - DAY), &[]);
    store.insert(&crl_cache_key(CRL_URI), &stale).unwrap();

    let source = caching_source(&transport, store, fixed_clock);
    assert!(source.get_crl(CRL_URI).is_none());
    assert_eq!(1, transport.fetch_count());
    assert!(!source.is_fetched(CRL_URI));
}

#[test]
fn concurrent_requests_share_one_download() {
    let transport = MockTransport::new();
    transport.set(CRL_URI, &ca_crl(&[]));
    let source = Arc::new(caching_source(
        &transport,
        Arc::new(MemoryCrlCacheStore::new()),
        fixed_clock,
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let source = source.clone();
            thread::spawn(move || source.get_crl(CRL_URI).is_some())
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap());
    }
    assert_eq!(1, transport.fetch_count());
}

#[test]
fn folder_store_survives_new_instance() {
    let dir = tempfile::tempdir().unwrap();
    let folder = dir.path().to_str().unwrap().to_string();
    let transport = MockTransport::new();
    transport.set(CRL_URI, &ca_crl(&[]));

    let source = caching_source(
        &transport,
        Arc::new(FolderCrlCacheStore::new(&folder).unwrap()),
        fixed_clock,
    );
    assert!(source.get_crl(CRL_URI).is_some());
    assert_eq!(1, transport.fetch_count());

    let source = caching_source(
        &transport,
        Arc::new(FolderCrlCacheStore::new(&folder).unwrap()),
        fixed_clock,
    );
    assert!(source.get_crl(CRL_URI).is_some());
    assert_eq!(1, transport.fetch_count());
}

#[test]
fn verifier_over_cache() {
    let transport = MockTransport::new();
    transport.set(CRL_URI, &ca_crl(&[(LEAF_SERIAL, NOW - DAY, None)]));
    let source = caching_source(&transport, Arc::new(MemoryCrlCacheStore::new()), fixed_clock);
    let v = CrlCertificateVerifier::new(pe(), Some(Arc::new(source)));
    assert!(v.check(&leaf(), &ca(), NOW).unwrap().is_revoked());
    assert!(v.check(&leaf_with_serial(0x20), &ca(), NOW).unwrap().is_valid());
    assert_eq!(1, transport.fetch_count());
}

#[test]
fn crl_is_fetched_once_uri_recovers() {
    let transport = MockTransport::new();
    let source = caching_source(&transport, Arc::new(MemoryCrlCacheStore::new()), fixed_clock);
    assert!(source.find_crl(&leaf(), &ca()).is_none());
    assert!(!source.is_fetched(CRL_URI));

    transport.set(CRL_URI, &ca_crl(&[]));
    assert!(source.find_crl(&leaf(), &ca()).is_some());
    assert!(source.is_fetched(CRL_URI));
    assert_eq!(2, transport.fetch_count());

    let online = OnlineCrlSource::new(transport.clone());
    assert_eq!(
        Err(Error::InvalidUriScheme),
        online.fetch_crl(LDAP_CRL_URI).map(|_| ())
    );
    assert_eq!(2, transport.fetch_count());
}

static BLOCKLIST_CLOCK: AtomicU64 = AtomicU64::new(NOW);
fn blocklist_clock() -> u64 {
    BLOCKLIST_CLOCK.load(Ordering::SeqCst)
}

#[test]
fn blocklisted_uri_is_retried_after_interval() {
    let transport = MockTransport::new();
    let blocklist = Arc::new(UriBlocklist::with_retry_interval(600, blocklist_clock));
    let online = OnlineCrlSource::with_blocklist(transport.clone(), blocklist.clone());
    assert_eq!(Err(Error::NetworkError), online.fetch_crl(CRL_URI).map(|_| ()));
    assert_eq!(Err(Error::UriOnBlocklist), online.fetch_crl(CRL_URI).map(|_| ()));
    assert_eq!(1, transport.fetch_count());

    transport.set(CRL_URI, &ca_crl(&[]));
    BLOCKLIST_CLOCK.store(NOW + 600, Ordering::SeqCst);
    assert!(online.fetch_crl(CRL_URI).is_ok());
    assert_eq!(2, transport.fetch_count());
    assert!(!blocklist.check_blocklist(CRL_URI));
}
