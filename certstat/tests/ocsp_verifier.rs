mod common;

use std::sync::Arc;

use common::*;
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_OCSP_SIGNING};
use der::asn1::ObjectIdentifier;
use p256::ecdsa::SigningKey;
use x509_cert::ext::pkix::crl::CrlReason;

use certstat::*;

fn offline_verifier(responses: &[Vec<u8>]) -> OcspCertificateVerifier {
    let mut source = OfflineOcspSource::new();
    for r in responses {
        source.add_response(r).unwrap();
    }
    OcspCertificateVerifier::new(pe(), Some(Arc::new(source)))
}

#[test]
fn good_is_valid() {
    let resp = leaf_ocsp(TestStatus::Good);
    let status = offline_verifier(&[resp.clone()])
        .check(&leaf(), &ca(), NOW)
        .unwrap();
    assert!(status.is_valid());
    assert_eq!(ValidatorSourceType::Ocsp, status.source_type);
    assert_eq!(RevocationEvidence::Ocsp(resp), status.evidence);
    assert_eq!(NOW - 3600, status.issuance_time);
    assert_eq!(None, status.crl_number);
}

#[test]
fn unknown_is_unknown() {
    let status = offline_verifier(&[leaf_ocsp(TestStatus::Unknown)])
        .check(&leaf(), &ca(), NOW)
        .unwrap();
    assert_eq!(CertificateValidity::Unknown, status.validity);
}

#[test]
fn revoked_before_reference_time() {
    let revoked_at = NOW - 5 * DAY;
    let status = offline_verifier(&[leaf_ocsp(TestStatus::Revoked(revoked_at))])
        .check(&leaf(), &ca(), NOW)
        .unwrap();
    assert!(status.is_revoked());
    assert_eq!(Some(revoked_at), status.revocation_time);
    assert_eq!(Some(CrlReason::KeyCompromise), status.revocation_reason);
}

#[test]
fn revoked_after_reference_time_is_valid() {
    let revoked_at = NOW - 60;
    let status = offline_verifier(&[leaf_ocsp(TestStatus::Revoked(revoked_at))])
        .check(&leaf(), &ca(), NOW - 120)
        .unwrap();
    assert!(status.is_valid());
    assert_eq!(None, status.revocation_time);
}

#[test]
fn response_for_other_certificate_is_ignored() {
    let other = leaf_with_serial(0x42);
    let resp = make_ocsp_response(&other, &ca(), &ca_key(), TestStatus::Good, NOW, None);
    assert!(offline_verifier(&[resp]).check(&leaf(), &ca(), NOW).is_none());
}

#[test]
fn bad_signature_yields_no_verdict() {
    let resp = make_ocsp_response(&leaf(), &ca(), &leaf_key(), TestStatus::Good, NOW, None);
    let mut v = offline_verifier(&[resp]);
    assert!(v.check(&leaf(), &ca(), NOW).is_none());

    v.set_verify_signature(false);
    assert!(v.check(&leaf(), &ca(), NOW).unwrap().is_valid());
}

#[test]
fn stale_response_yields_no_verdict() {
    // nextUpdate is 29 days before the reference time
    let produced_at = NOW - 30 * DAY;
    let resp = make_ocsp_response(&leaf(), &ca(), &ca_key(), TestStatus::Good, produced_at, None);
    let v = offline_verifier(&[resp]);
    assert!(v.check(&leaf(), &ca(), NOW).is_none());
    assert!(v.check(&leaf(), &ca(), produced_at + 60).unwrap().is_valid());
}

#[test]
fn future_response_yields_no_verdict() {
    let produced_at = NOW + 30 * DAY;
    let resp = make_ocsp_response(&leaf(), &ca(), &ca_key(), TestStatus::Good, produced_at, None);
    let v = offline_verifier(&[resp]);
    assert!(v.check(&leaf(), &ca(), NOW).is_none());
    assert!(v.check(&leaf(), &ca(), produced_at).unwrap().is_valid());
}

#[test]
fn response_time_window() {
    let token = OcspToken::new(&leaf_ocsp(TestStatus::Good), None).unwrap();
    let sr = token.find_single(&leaf(), &ca()).unwrap();
    assert!(check_response_time(sr, NOW));
    assert!(check_response_time(sr, NOW - 3600));
    assert!(check_response_time(sr, NOW - 3600 + DAY));
    assert!(!check_response_time(sr, NOW - 3601));
    assert!(!check_response_time(sr, NOW - 3599 + DAY));
    assert!(check_response_time(sr, 0));
}

/// Issues a certificate from the CA for use as a delegated responder
fn responder_cert(
    subject: &str,
    responder_key: &SigningKey,
    serial: u8,
    ekus: &[ObjectIdentifier],
) -> CertificateWithContext {
    let extensions = if ekus.is_empty() {
        vec![]
    } else {
        vec![eku_extension(ekus)]
    };
    make_cert(
        subject,
        responder_key,
        CA_NAME,
        &ca_key(),
        serial,
        extensions,
        CertificateSourceType::Other,
    )
}

fn delegated_response(
    cert: &CertificateWithContext,
    responder_key: &SigningKey,
    responder: &CertificateWithContext,
    produced_at: u64,
) -> Vec<u8> {
    make_ocsp_response(
        cert,
        &ca(),
        responder_key,
        TestStatus::Good,
        produced_at,
        Some(vec![responder.decoded_cert.clone()]),
    )
}

#[test]
fn responder_without_ocsp_signing_is_rejected() {
    // a sibling end entity certificate from the same CA cannot vouch for another certificate
    let victim = leaf_with_serial(0x55);
    let sibling_key = key(0x77);
    let sibling = make_cert(
        "CN=Sibling Leaf,O=Example,C=US",
        &sibling_key,
        CA_NAME,
        &ca_key(),
        0x77,
        vec![],
        CertificateSourceType::Other,
    );
    let resp = delegated_response(&victim, &sibling_key, &sibling, NOW);
    assert!(offline_verifier(&[resp]).check(&victim, &ca(), NOW).is_none());

    let responder_key = key(0x45);
    let responder = responder_cert(
        "CN=Client Auth,O=Example,C=US",
        &responder_key,
        0x07,
        &[ID_KP_CLIENT_AUTH],
    );
    let resp = delegated_response(&victim, &responder_key, &responder, NOW);
    assert!(offline_verifier(&[resp]).check(&victim, &ca(), NOW).is_none());
}

#[test]
fn expired_responder_is_rejected() {
    let responder_key = key(0x46);
    let responder = responder_cert(
        "CN=Test OCSP Responder,O=Example,C=US",
        &responder_key,
        0x08,
        &[ID_KP_OCSP_SIGNING],
    );
    // the responder certificate expires a year after NOW
    let later = NOW + 400 * DAY;
    let resp = delegated_response(&leaf(), &responder_key, &responder, later);
    assert!(offline_verifier(&[resp]).check(&leaf(), &ca(), later).is_none());
}

#[test]
fn delegated_responder() {
    let responder_key = key(0x44);
    let responder = responder_cert(
        "CN=Test OCSP Responder,O=Example,C=US",
        &responder_key,
        0x05,
        &[ID_KP_OCSP_SIGNING],
    );
    let resp = make_ocsp_response(
        &leaf(),
        &ca(),
        &responder_key,
        TestStatus::Good,
        NOW,
        Some(vec![responder.decoded_cert.clone()]),
    );
    assert!(offline_verifier(&[resp])
        .check(&leaf(), &ca(), NOW)
        .unwrap()
        .is_valid());

    // responder certificate that was not issued by the CA is not accepted
    let rogue = make_cert(
        "CN=Rogue Responder,O=Example,C=US",
        &responder_key,
        CA_NAME,
        &responder_key,
        0x06,
        vec![eku_extension(&[ID_KP_OCSP_SIGNING])],
        CertificateSourceType::Other,
    );
    let resp = make_ocsp_response(
        &leaf(),
        &ca(),
        &responder_key,
        TestStatus::Good,
        NOW,
        Some(vec![rogue.decoded_cert.clone()]),
    );
    assert!(offline_verifier(&[resp]).check(&leaf(), &ca(), NOW).is_none());
}

#[test]
fn online_source_posts_to_aia() {
    let transport = MockTransport::new();
    transport.set(OCSP_URI, &leaf_ocsp(TestStatus::Good));
    let source = OnlineOcspSource::new(transport.clone());
    let token = source.get_response(&leaf(), &ca()).unwrap();
    assert_eq!(Some(OCSP_URI.to_string()), token.uri);
    assert_eq!(1, transport.post_count());

    // each check sends a fresh request
    let v = OcspCertificateVerifier::new(pe(), Some(Arc::new(source)));
    assert!(v.check(&leaf(), &ca(), NOW).unwrap().is_valid());
    assert_eq!(2, transport.post_count());

    // the CA has no OCSP AIA
    let source = OnlineOcspSource::new(transport.clone());
    assert!(source.get_response(&ca(), &root()).is_none());
    assert_eq!(2, transport.post_count());
}

#[test]
fn request_carries_cert_id() {
    let req = prepare_ocsp_request(&leaf(), &ca()).unwrap();
    let token = OcspToken::new(&leaf_ocsp(TestStatus::Good), None).unwrap();
    assert!(!req.is_empty());
    let sr = token.find_single(&leaf(), &ca()).unwrap();
    assert!(cert_id_matches_certificate(&sr.cert_id, &leaf(), &ca()));
    assert!(!cert_id_matches_certificate(&sr.cert_id, &leaf_with_serial(0x42), &ca()));
    assert_eq!(NOW - 3600, token.produced_at());
}

#[test]
fn combined_prefers_ocsp_and_falls_back_on_unknown() {
    let crl = ca_crl(&[(LEAF_SERIAL, NOW - DAY, None)]);
    let mut crls = OfflineCrlSource::new();
    crls.add_crl(&crl).unwrap();
    let crl_v: Arc<dyn CertificateStatusVerifier> =
        Arc::new(CrlCertificateVerifier::new(pe(), Some(Arc::new(crls))));

    let good: Arc<dyn CertificateStatusVerifier> =
        Arc::new(offline_verifier(&[leaf_ocsp(TestStatus::Good)]));
    let v = OcspAndCrlVerifier::new(Some(good.clone()), Some(crl_v.clone()));
    let status = v.check(&leaf(), &ca(), NOW).unwrap();
    assert_eq!(ValidatorSourceType::Ocsp, status.source_type);
    assert!(status.is_valid());

    let mut v = OcspAndCrlVerifier::new(Some(good), Some(crl_v.clone()));
    v.set_prefer_ocsp(false);
    let status = v.check(&leaf(), &ca(), NOW).unwrap();
    assert_eq!(ValidatorSourceType::Crl, status.source_type);
    assert!(status.is_revoked());

    let unknown: Arc<dyn CertificateStatusVerifier> =
        Arc::new(offline_verifier(&[leaf_ocsp(TestStatus::Unknown)]));
    let v = OcspAndCrlVerifier::new(Some(unknown.clone()), Some(crl_v));
    let status = v.check(&leaf(), &ca(), NOW).unwrap();
    assert_eq!(ValidatorSourceType::Crl, status.source_type);

    let v = OcspAndCrlVerifier::new(Some(unknown), None);
    let status = v.check(&leaf(), &ca(), NOW).unwrap();
    assert_eq!(CertificateValidity::Unknown, status.validity);

    let v = OcspAndCrlVerifier::new(None, None);
    assert!(v.check(&leaf(), &ca(), NOW).is_none());
}
