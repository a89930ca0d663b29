//! Test PKI generated on the fly with deterministic P-256 keys along with a mock transport

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use const_oid::db::rfc5912::{ID_AD_CA_ISSUERS, ID_AD_OCSP, ID_CE_CRL_REASONS};
use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use const_oid::AssociatedOid;
use der::asn1::{BitString, GeneralizedTime, Ia5String, Null, ObjectIdentifier, OctetString, UtcTime};
use der::{Decode, Encode};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::crl::CrlReason;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::certpolicy::PolicyInformation;
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, BasicConstraints, CertificatePolicies,
    CrlDistributionPoints, ExtendedKeyUsage, KeyUsage, KeyUsages,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};
use x509_ocsp::{
    BasicOcspResponse, CertId, CertStatus, OcspGeneralizedTime, OcspResponse, OcspResponseStatus,
    ResponderId, ResponseBytes, ResponseData, RevokedInfo, SingleResponse,
};

use certstat::*;

/// Reference time used by tests, 2023-11-14T22:13:20Z
pub const NOW: u64 = 1_700_000_000;
pub const DAY: u64 = 86_400;

pub const ROOT_NAME: &str = "CN=Test Root,O=Example,C=US";
pub const CA_NAME: &str = "CN=Test CA,O=Example,C=US";
pub const LEAF_NAME: &str = "CN=Test Leaf,O=Example,C=US";

pub const CRL_URI: &str = "http://crl.example.test/ca.crl";
pub const OCSP_URI: &str = "http://ocsp.example.test";
pub const CA_ISSUERS_URI: &str = "http://aia.example.test/ca.der";
pub const LDAP_CRL_URI: &str = "ldap://ldap.example.test/cn=Test%20CA?certificateRevocationList";

pub const LEAF_SERIAL: u8 = 0x10;

pub const TEST_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1.1");
pub const OTHER_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1.2");

const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

pub fn key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

pub fn root_key() -> SigningKey {
    key(0x11)
}

pub fn ca_key() -> SigningKey {
    key(0x22)
}

pub fn leaf_key() -> SigningKey {
    key(0x33)
}

pub fn pe() -> PkiEnvironment {
    let mut pe = PkiEnvironment::default();
    populate_default_pki_environment(&mut pe);
    pe
}

fn sig_alg() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ECDSA_WITH_SHA256,
        parameters: None,
    }
}

fn sign(key: &SigningKey, tbs: &[u8]) -> BitString {
    let sig: Signature = key.sign(tbs);
    BitString::from_bytes(sig.to_der().as_bytes()).unwrap()
}

fn spki(key: &SigningKey) -> SubjectPublicKeyInfoOwned {
    let doc = key.verifying_key().to_public_key_der().unwrap();
    SubjectPublicKeyInfoOwned::from_der(doc.as_bytes()).unwrap()
}

pub fn utc(t: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(t)).unwrap())
}

pub fn gt(t: u64) -> OcspGeneralizedTime {
    OcspGeneralizedTime(GeneralizedTime::from_unix_duration(Duration::from_secs(t)).unwrap())
}

pub fn name(s: &str) -> Name {
    Name::from_str(s).unwrap()
}

pub fn ext<T: Encode + AssociatedOid>(critical: bool, value: &T) -> Extension {
    Extension {
        extn_id: T::OID,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

fn uri(s: &str) -> GeneralName {
    GeneralName::UniformResourceIdentifier(Ia5String::new(s).unwrap())
}

pub fn ca_extensions() -> Vec<Extension> {
    vec![
        ext(
            true,
            &BasicConstraints {
                ca: true,
                path_len_constraint: None,
            },
        ),
        ext(true, &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign)),
    ]
}

pub fn crl_dp_extension(uris: &[&str]) -> Extension {
    let dps = CrlDistributionPoints(vec![DistributionPoint {
        distribution_point: Some(DistributionPointName::FullName(
            uris.iter().map(|u| uri(u)).collect(),
        )),
        reasons: None,
        crl_issuer: None,
    }]);
    ext(false, &dps)
}

pub fn aia_extension(ocsp: Option<&str>, ca_issuers: Option<&str>) -> Extension {
    let mut ads = vec![];
    if let Some(ocsp) = ocsp {
        ads.push(AccessDescription {
            access_method: ID_AD_OCSP,
            access_location: uri(ocsp),
        });
    }
    if let Some(ca_issuers) = ca_issuers {
        ads.push(AccessDescription {
            access_method: ID_AD_CA_ISSUERS,
            access_location: uri(ca_issuers),
        });
    }
    ext(false, &AuthorityInfoAccessSyntax(ads))
}

pub fn policies_extension(oids: &[ObjectIdentifier]) -> Extension {
    let cps = CertificatePolicies(
        oids.iter()
            .map(|oid| PolicyInformation {
                policy_identifier: *oid,
                policy_qualifiers: None,
            })
            .collect(),
    );
    ext(false, &cps)
}

pub fn key_usage_extension(ku: KeyUsage) -> Extension {
    ext(true, &ku)
}

pub fn eku_extension(oids: &[ObjectIdentifier]) -> Extension {
    ext(false, &ExtendedKeyUsage(oids.to_vec()))
}

/// Issues a certificate
pub fn make_cert(
    subject: &str,
    subject_key: &SigningKey,
    issuer: &str,
    issuer_key: &SigningKey,
    serial: u8,
    extensions: Vec<Extension>,
    source_type: CertificateSourceType,
) -> CertificateWithContext {
    let serial_number: SerialNumber = SerialNumber::new(&[serial]).unwrap();
    let tbs_certificate: TbsCertificate = TbsCertificate {
        version: Version::V3,
        serial_number,
        signature: sig_alg(),
        issuer: name(issuer),
        validity: Validity {
            not_before: utc(NOW - 365 * DAY),
            not_after: utc(NOW + 365 * DAY),
        },
        subject: name(subject),
        subject_public_key_info: spki(subject_key),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        },
    };
    let signature = sign(issuer_key, &tbs_certificate.to_der().unwrap());
    let cert: Certificate = Certificate {
        tbs_certificate,
        signature_algorithm: sig_alg(),
        signature,
    };
    CertificateWithContext::new(&cert.to_der().unwrap(), source_type, None).unwrap()
}

pub fn root() -> CertificateWithContext {
    make_cert(
        ROOT_NAME,
        &root_key(),
        ROOT_NAME,
        &root_key(),
        0x01,
        ca_extensions(),
        CertificateSourceType::TrustStore,
    )
}

pub fn ca() -> CertificateWithContext {
    make_cert(
        CA_NAME,
        &ca_key(),
        ROOT_NAME,
        &root_key(),
        0x02,
        ca_extensions(),
        CertificateSourceType::Other,
    )
}

/// Leaf issued by the CA with a CRL DP, an OCSP AIA and a caIssuers AIA
pub fn leaf() -> CertificateWithContext {
    leaf_with_serial(LEAF_SERIAL)
}

pub fn leaf_with_serial(serial: u8) -> CertificateWithContext {
    make_cert(
        LEAF_NAME,
        &leaf_key(),
        CA_NAME,
        &ca_key(),
        serial,
        vec![
            crl_dp_extension(&[CRL_URI]),
            aia_extension(Some(OCSP_URI), Some(CA_ISSUERS_URI)),
            key_usage_extension(KeyUsage(KeyUsages::DigitalSignature.into())),
            policies_extension(&[TEST_POLICY]),
        ],
        CertificateSourceType::Signature,
    )
}

/// A revoked entry: serial, revocation date and optional reason
pub type Entry = (u8, u64, Option<CrlReason>);

/// Issues a CRL
pub fn make_crl(
    issuer: &str,
    issuer_key: &SigningKey,
    this_update: u64,
    next_update: Option<u64>,
    entries: &[Entry],
) -> Vec<u8> {
    let mut revoked = vec![];
    for (serial, date, reason) in entries {
        let serial_number: SerialNumber = SerialNumber::new(&[*serial]).unwrap();
        let crl_entry_extensions = reason.map(|r| {
            vec![Extension {
                extn_id: ID_CE_CRL_REASONS,
                critical: false,
                extn_value: OctetString::new(r.to_der().unwrap()).unwrap(),
            }]
        });
        let rc: RevokedCert = RevokedCert {
            serial_number,
            revocation_date: utc(*date),
            crl_entry_extensions,
        };
        revoked.push(rc);
    }
    let tbs_cert_list: TbsCertList = TbsCertList {
        version: Version::V2,
        signature: sig_alg(),
        issuer: name(issuer),
        this_update: utc(this_update),
        next_update: next_update.map(utc),
        revoked_certificates: if revoked.is_empty() {
            None
        } else {
            Some(revoked)
        },
        crl_extensions: None,
    };
    let signature = sign(issuer_key, &tbs_cert_list.to_der().unwrap());
    let crl: CertificateList = CertificateList {
        tbs_cert_list,
        signature_algorithm: sig_alg(),
        signature,
    };
    crl.to_der().unwrap()
}

/// CRL issued by the test CA at NOW - 1 day, valid for 7 days
pub fn ca_crl(entries: &[Entry]) -> Vec<u8> {
    make_crl(
        CA_NAME,
        &ca_key(),
        NOW - DAY,
        Some(NOW + 7 * DAY),
        entries,
    )
}

/// Status to place in a test OCSP response
#[derive(Clone, Copy, Debug)]
pub enum TestStatus {
    Good,
    Revoked(u64),
    Unknown,
}

pub fn cert_id(cert: &CertificateWithContext, issuer: &CertificateWithContext) -> CertId {
    CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: PKIXALG_SHA1,
            parameters: None,
        },
        issuer_name_hash: OctetString::new(get_subject_name_hash(&issuer.decoded_cert).unwrap())
            .unwrap(),
        issuer_key_hash: OctetString::new(get_key_hash(&issuer.decoded_cert)).unwrap(),
        serial_number: cert.serial_number().clone(),
    }
}

/// Issues an OCSP response for `cert` signed with `signer_key`, optionally carrying `certs`
pub fn make_ocsp_response(
    cert: &CertificateWithContext,
    issuer: &CertificateWithContext,
    signer_key: &SigningKey,
    status: TestStatus,
    produced_at: u64,
    certs: Option<Vec<Certificate>>,
) -> Vec<u8> {
    let cert_status = match status {
        TestStatus::Good => CertStatus::Good(Null),
        TestStatus::Revoked(t) => CertStatus::Revoked(RevokedInfo {
            revocation_time: gt(t),
            revocation_reason: Some(CrlReason::KeyCompromise),
        }),
        TestStatus::Unknown => CertStatus::Unknown(Null),
    };
    let tbs_response_data = ResponseData {
        version: x509_ocsp::Version::V1,
        responder_id: ResponderId::ByName(issuer.subject().clone()),
        produced_at: gt(produced_at),
        responses: vec![SingleResponse {
            cert_id: cert_id(cert, issuer),
            cert_status,
            this_update: gt(produced_at),
            next_update: Some(gt(produced_at + DAY)),
            single_extensions: None,
        }],
        response_extensions: None,
    };
    let signature = sign(signer_key, &tbs_response_data.to_der().unwrap());
    let basic = BasicOcspResponse {
        tbs_response_data,
        signature_algorithm: sig_alg(),
        signature,
        certs,
    };
    let or = OcspResponse {
        response_status: OcspResponseStatus::Successful,
        response_bytes: Some(ResponseBytes {
            response_type: ID_PKIX_OCSP_BASIC,
            response: OctetString::new(basic.to_der().unwrap()).unwrap(),
        }),
    };
    or.to_der().unwrap()
}

/// OCSP response for the leaf signed by the CA at NOW - 1 hour
pub fn leaf_ocsp(status: TestStatus) -> Vec<u8> {
    make_ocsp_response(&leaf(), &ca(), &ca_key(), status, NOW - 3600, None)
}

/// `MockTransport` serves canned responses and counts requests
#[derive(Default)]
pub struct MockTransport {
    resources: Mutex<BTreeMap<String, Vec<u8>>>,
    pub fetches: AtomicUsize,
    pub posts: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, uri: &str, body: &[u8]) {
        self.resources
            .lock()
            .unwrap()
            .insert(uri.to_string(), body.to_vec());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn post_count(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    fn get(&self, uri: &str) -> Result<Vec<u8>> {
        match self.resources.lock().unwrap().get(uri) {
            Some(b) => Ok(b.clone()),
            None => Err(Error::NetworkError),
        }
    }
}

impl HttpTransport for MockTransport {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.get(uri)
    }

    fn post(&self, uri: &str, content_type: &str, _body: &[u8]) -> Result<Vec<u8>> {
        assert_eq!("application/ocsp-request", content_type);
        self.posts.fetch_add(1, Ordering::SeqCst);
        self.get(uri)
    }
}
