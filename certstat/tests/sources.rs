mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::*;

use certstat::*;

fn store_with(certs: &[CertificateWithContext], source_type: CertificateSourceType) -> CertSource {
    let mut source = CertSource::new(source_type);
    for c in certs {
        source.add_certificate(c);
    }
    source
}

#[test]
fn cert_source_resolves_by_subject() {
    let mut source = store_with(&[root(), ca()], CertificateSourceType::TrustStore);
    assert!(!source.add_certificate(&ca()));
    assert_eq!(2, source.len());

    let found = source.resolve_issuers(&name(CA_NAME)).unwrap();
    assert_eq!(vec![ca()], found);
    assert_eq!(CertificateSourceType::TrustStore, found[0].source_type);
    assert!(source.resolve_issuers(&name(LEAF_NAME)).unwrap().is_empty());
}

#[test]
fn composite_preserves_order_and_skips_absent() {
    let ca_other = ca().with_source(CertificateSourceType::Other, None);
    let a: Arc<dyn CertificateSource> =
        Arc::new(store_with(&[ca()], CertificateSourceType::TrustedList));
    let b: Arc<dyn CertificateSource> =
        Arc::new(store_with(&[ca_other], CertificateSourceType::TrustStore));

    let mut composite = CompositeCertificateSource::new();
    composite.add_source(a.clone());
    composite.add_source(b.clone());
    let found = composite.resolve_issuers(&name(CA_NAME)).unwrap();
    assert_eq!(2, found.len());
    assert_eq!(CertificateSourceType::TrustedList, found[0].source_type);
    assert_eq!(CertificateSourceType::TrustStore, found[1].source_type);

    let mut composite = CompositeCertificateSource::new();
    composite.add_optional_source(None);
    composite.add_source(b);
    assert_eq!(2, composite.len());
    let found = composite.resolve_issuers(&name(CA_NAME)).unwrap();
    assert_eq!(1, found.len());
    assert_eq!(CertificateSourceType::TrustStore, found[0].source_type);
}

struct FailingSource;

impl CertificateSource for FailingSource {
    fn resolve_issuers(&self, _name: &x509_cert::name::Name) -> Result<Vec<CertificateWithContext>> {
        Err(Error::NetworkError)
    }
}

#[test]
fn composite_skips_failing_child() {
    let mut composite = CompositeCertificateSource::new();
    composite.add_source(Arc::new(FailingSource));
    composite.add_source(Arc::new(store_with(&[ca()], CertificateSourceType::Other)));
    assert_eq!(vec![ca()], composite.resolve_issuers(&name(CA_NAME)).unwrap());

    // with no candidates, the failure is reported rather than an empty result
    assert_eq!(
        Err(Error::NetworkError),
        composite.resolve_issuers(&name(ROOT_NAME))
    );

    let mut composite = CompositeCertificateSource::new();
    composite.add_optional_source(None);
    composite.add_source(Arc::new(store_with(&[ca()], CertificateSourceType::Other)));
    assert!(composite.resolve_issuers(&name(ROOT_NAME)).unwrap().is_empty());
}

#[test]
fn aia_source_downloads_issuer() {
    let transport = MockTransport::new();
    transport.set(CA_ISSUERS_URI, &ca().encoded_cert);
    let token = CertificateToken::new(leaf());
    let source = token.embedded_certificate_source(transport.clone()).unwrap();

    let found = source.resolve_issuers(&name(CA_NAME)).unwrap();
    assert_eq!(vec![ca()], found);
    assert_eq!(CertificateSourceType::Aia, found[0].source_type);
    assert_eq!(Some(CA_ISSUERS_URI.to_string()), found[0].context);

    // subject mismatch yields nothing
    assert!(source.resolve_issuers(&name(ROOT_NAME)).unwrap().is_empty());
    assert_eq!(2, transport.fetch_count());

    // no caIssuers
    assert!(CertificateToken::new(ca())
        .embedded_certificate_source(transport.clone())
        .is_none());
}

#[test]
fn aia_source_is_best_effort() {
    let transport = MockTransport::new();
    let source = AiaCertificateSource::new(leaf(), transport.clone());
    assert!(source.resolve_issuers(&name(CA_NAME)).unwrap().is_empty());

    transport.set(CA_ISSUERS_URI, b"not a certificate");
    assert!(source.resolve_issuers(&name(CA_NAME)).unwrap().is_empty());
}

#[test]
fn signed_token_checks_issuer() {
    let token = CertificateToken::new(leaf());
    assert_eq!(&name(CA_NAME), token.signer_name());
    assert!(token.is_signed_by(&pe(), &ca()));
    assert!(!token.is_signed_by(&pe(), &root()));
    assert_eq!(sha256_hex(&leaf().encoded_cert), token.dss_id());
}

#[test]
fn revocation_data_binding() {
    let token: Arc<dyn SignedToken> = Arc::new(CertificateToken::new(leaf()));
    let crl = ca_crl(&[]);
    let rd = RevocationData::new(token.clone(), RevocationEvidence::Crl(crl.clone())).unwrap();
    assert_eq!(&RevocationEvidence::Crl(crl), rd.evidence());

    assert!(RevocationData::new(token.clone(), RevocationEvidence::Crl(vec![0x30, 0x00])).is_err());
    assert!(RevocationData::new(
        token.clone(),
        RevocationEvidence::Ocsp(leaf_ocsp(TestStatus::Good))
    )
    .is_ok());
    assert!(RevocationData::new(
        token,
        RevocationEvidence::SourceType(ValidatorSourceType::Ocsp)
    )
    .is_ok());
}

#[derive(Default)]
struct CountingObserver {
    crls: AtomicUsize,
    ocsp: AtomicUsize,
}

impl NotFoundObserver for CountingObserver {
    fn crl_not_found(&self, _cert: &CertificateWithContext) {
        self.crls.fetch_add(1, Ordering::SeqCst);
    }

    fn ocsp_not_found(&self, _cert: &CertificateWithContext) {
        self.ocsp.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn offline_sources_notify_observer() {
    let observer = Arc::new(CountingObserver::default());

    let mut crls = OfflineCrlSource::new();
    crls.set_observer(observer.clone());
    assert!(crls.add_crl(&ca_crl(&[])).unwrap());
    assert!(!crls.add_crl(&ca_crl(&[])).unwrap());
    assert_eq!(1, crls.len());
    assert!(crls.find_crl(&leaf(), &ca()).is_some());
    assert!(crls.find_crl(&ca(), &root()).is_none());

    let mut ocsp = OfflineOcspSource::new();
    ocsp.set_observer(observer.clone());
    assert!(ocsp.add_response(&leaf_ocsp(TestStatus::Good)).unwrap());
    assert!(ocsp.get_response(&leaf(), &ca()).is_some());
    assert!(ocsp.get_response(&ca(), &root()).is_none());

    assert_eq!(1, observer.crls.load(Ordering::SeqCst));
    assert_eq!(1, observer.ocsp.load(Ordering::SeqCst));
}

#[test]
fn offline_sources_from_folders() {
    let dir = tempfile::tempdir().unwrap();
    let crl_dir = dir.path().join("crls");
    let ocsp_dir = dir.path().join("ocsp");
    let cert_dir = dir.path().join("certs");
    for d in [&crl_dir, &ocsp_dir, &cert_dir] {
        std::fs::create_dir(d).unwrap();
    }
    std::fs::write(crl_dir.join("ca.crl"), ca_crl(&[])).unwrap();
    std::fs::write(crl_dir.join("junk.crl"), b"junk").unwrap();
    std::fs::write(ocsp_dir.join("leaf.ocsp"), leaf_ocsp(TestStatus::Good)).unwrap();
    std::fs::write(cert_dir.join("root.der"), &root().encoded_cert).unwrap();
    std::fs::write(cert_dir.join("ca.der"), &ca().encoded_cert).unwrap();

    let crls = OfflineCrlSource::from_folder(crl_dir.to_str().unwrap()).unwrap();
    assert_eq!(1, crls.len());
    let ocsp = OfflineOcspSource::from_folder(ocsp_dir.to_str().unwrap()).unwrap();
    assert_eq!(1, ocsp.len());

    let mut ts = CertSource::new(CertificateSourceType::TrustStore);
    assert_eq!(
        2,
        ts.add_certificates_from_folder(cert_dir.to_str().unwrap(), NOW)
            .unwrap()
    );
    // outside the validity period of the certificates
    let mut ts = CertSource::new(CertificateSourceType::TrustStore);
    assert_eq!(
        0,
        ts.add_certificates_from_folder(cert_dir.to_str().unwrap(), NOW + 400 * DAY)
            .unwrap()
    );

    assert!(OfflineCrlSource::from_folder("tests/nonexistent").is_err());
}
