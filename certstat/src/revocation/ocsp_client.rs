//! Structures and functions to perform OCSP client functionality

use std::sync::Arc;

use log::{debug, error, info};

use const_oid::db::rfc5280::ID_KP_OCSP_SIGNING;
use const_oid::db::rfc6960::{ID_PKIX_OCSP_NOCHECK, ID_PKIX_OCSP_NONCE};
use der::asn1::OctetString;
use der::{Decode, Encode};
use sha1::{Digest, Sha1};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::Extensions;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;
use x509_ocsp::*;

use crate::environment::pki_environment::PkiEnvironment;
use crate::environment::pki_environment_traits::{CertificateStatusVerifier, OcspSource};
use crate::evidence::cert_with_context::{CertificateSourceType, CertificateWithContext};
use crate::evidence::certificate_status::{CertificateStatus, CertificateValidity};
use crate::evidence::revocation_data::RevocationEvidence;
use crate::evidence::signed_token::verify_signed_with_issuer;
use crate::source::ocsp_source::OcspToken;
use crate::util::alg_oids::PKIXALG_SHA1;
use crate::util::error::{Error, Result};
use crate::util::utilities::{compare_names, valid_at_time};
use crate::validator::status_settings::StatusSettings;

/// Content type used when posting OCSP requests
pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";

/// get_key_hash returns the SHA-1 hash of the value of the subjectPublicKey field of the
/// certificate (excluding tag, length, and number of unused bits).
pub fn get_key_hash(cert: &Certificate) -> Vec<u8> {
    Sha1::digest(
        cert.tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes(),
    )
    .to_vec()
}

/// get_subject_name_hash returns the SHA-1 hash of the DER encoding of the certificate's subject
/// name.
pub fn get_subject_name_hash(cert: &Certificate) -> Result<Vec<u8>> {
    let enc_subject = match cert.tbs_certificate.subject.to_der() {
        Ok(enc_subject) => enc_subject,
        Err(e) => return Err(Error::Asn1Error(e)),
    };

    Ok(Sha1::digest(enc_subject.as_slice()).to_vec())
}

/// unsupported_critical_extensions_present_single_response returns true if any critical extension
/// is present with a SingleResponse
fn unsupported_critical_extensions_present_single_response(sr: &SingleResponse) -> bool {
    match &sr.single_extensions {
        Some(exts) => exts.iter().any(|e| e.critical),
        None => false,
    }
}

/// unsupported_critical_extensions_present_response returns true if any critical extension other
/// than nonce is present in ResponseData
fn unsupported_critical_extensions_present_response(rd: &ResponseData) -> bool {
    match &rd.response_extensions {
        Some(exts) => exts
            .iter()
            .any(|e| e.critical && e.extn_id != ID_PKIX_OCSP_NONCE),
        None => false,
    }
}

/// cert_id_match returns true if the serial number, issuer name hash and issuer key hash in the
/// cert_id object match the values passed as parameters. Else it returns false.
pub fn cert_id_match(
    cert_id: &CertId,
    serial_number: &SerialNumber,
    name_hash: &[u8],
    key_hash: &[u8],
) -> bool {
    if cert_id.serial_number.as_bytes() != serial_number.as_bytes() {
        return false;
    }
    if cert_id.issuer_name_hash.as_bytes() != name_hash {
        return false;
    }
    if cert_id.issuer_key_hash.as_bytes() != key_hash {
        return false;
    }
    true
}

/// cert_id_matches_certificate returns true if the cert_id identifies `cert` as issued by `issuer`.
/// Only SHA-1 CertIds are supported.
pub fn cert_id_matches_certificate(
    cert_id: &CertId,
    cert: &CertificateWithContext,
    issuer: &CertificateWithContext,
) -> bool {
    if cert_id.hash_algorithm.oid != PKIXALG_SHA1 {
        debug!(
            "Ignoring CertId that uses unsupported hash algorithm {}",
            cert_id.hash_algorithm.oid
        );
        return false;
    }
    let name_hash = match get_subject_name_hash(&issuer.decoded_cert) {
        Ok(nh) => nh,
        Err(_e) => return false,
    };
    let key_hash = get_key_hash(&issuer.decoded_cert);
    cert_id_match(cert_id, cert.serial_number(), &name_hash, &key_hash)
}

/// prepare_ocsp_request returns an encoded OCSPRequest for `cert` that features a single SHA-1
/// CertId prepared using `issuer`. No nonce is included.
pub fn prepare_ocsp_request(
    cert: &CertificateWithContext,
    issuer: &CertificateWithContext,
) -> Result<Vec<u8>> {
    let hash_algorithm = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA1,
        parameters: None,
    };
    let name_hash = get_subject_name_hash(&issuer.decoded_cert)?;
    let key_hash = get_key_hash(&issuer.decoded_cert);
    let issuer_name_hash = match OctetString::new(name_hash) {
        Ok(inh) => inh,
        Err(e) => return Err(Error::Asn1Error(e)),
    };
    let issuer_key_hash = match OctetString::new(key_hash) {
        Ok(ikh) => ikh,
        Err(e) => return Err(Error::Asn1Error(e)),
    };

    let req_cert = CertId {
        hash_algorithm,
        issuer_name_hash,
        issuer_key_hash,
        serial_number: cert.serial_number().clone(),
    };
    let request_list = vec![Request {
        req_cert,
        single_request_extensions: None,
    }];
    let tbs_request = TbsRequest {
        version: Version::V1,
        requestor_name: None,
        request_list,
        request_extensions: None,
    };
    let ocsp_req = OcspRequest {
        tbs_request,
        optional_signature: None,
    };
    match ocsp_req.to_der() {
        Ok(eor) => Ok(eor),
        Err(e) => Err(Error::Asn1Error(e)),
    }
}

/// DeferDecodeBasicOcspResponse decodes the outer fields of a BasicOCSPResponse while retaining the
/// encoded tbsResponseData for use when verifying the signature.
///
/// ```text
/// BasicOCSPResponse       ::= SEQUENCE {
///    tbsResponseData      ResponseData,
///    signatureAlgorithm   AlgorithmIdentifier,
///    signature            BIT STRING,
///    certs            [0] EXPLICIT SEQUENCE OF Certificate OPTIONAL }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
struct DeferDecodeBasicOcspResponse {
    pub tbs_response_data: Vec<u8>,
}

impl ::der::FixedTag for DeferDecodeBasicOcspResponse {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeBasicOcspResponse {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_response_data = reader.tlv_bytes()?;
            let _signature_algorithm = reader.tlv_bytes()?;
            let _signature = reader.tlv_bytes()?;
            let _certs =
                ::der::asn1::ContextSpecific::<::der::Any>::decode_explicit(reader, ::der::TagNumber::N0)?;
            Ok(Self {
                tbs_response_data: tbs_response_data.to_vec(),
            })
        })
    }
}

fn no_check_present(exts: &Option<Extensions>) -> bool {
    if let Some(exts) = exts {
        for ext in exts {
            if ext.extn_id == ID_PKIX_OCSP_NOCHECK {
                return true;
            }
        }
    }
    false
}

/// verify_response_signature verifies the signature on a BasicOCSPResponse using the public key
/// from `signers_cert`.
fn verify_response_signature(
    pe: &PkiEnvironment,
    signers_cert: &Certificate,
    enc_basic_resp: &[u8],
    bor: &BasicOcspResponse,
) -> Result<()> {
    let ddbor = match DeferDecodeBasicOcspResponse::from_der(enc_basic_resp) {
        Ok(bor) => bor,
        Err(e) => return Err(Error::Asn1Error(e)),
    };

    let signature = if let Some(s) = bor.signature.as_bytes() {
        s
    } else {
        return Err(Error::Unrecognized);
    };

    pe.verify_signature_message(
        &ddbor.tbs_response_data,
        signature,
        &bor.signature_algorithm,
        &signers_cert.tbs_certificate.subject_public_key_info,
    )
}

/// check_response_time returns true if `at_time` falls within the thisUpdate and nextUpdate
/// values of the SingleResponse. A response with no nextUpdate is treated as current from
/// thisUpdate onward. Pass 0 to skip the check.
pub fn check_response_time(sr: &SingleResponse, at_time: u64) -> bool {
    if 0 == at_time {
        return true;
    }

    let tu = sr.this_update.0.to_unix_duration().as_secs();
    if tu > at_time {
        debug!("OCSP response thisUpdate {} is later than {}", tu, at_time);
        return false;
    }

    if let Some(next_update) = sr.next_update {
        let nu = next_update.0.to_unix_duration().as_secs();
        if nu < at_time {
            debug!("OCSP response nextUpdate {} is earlier than {}", nu, at_time);
            return false;
        }
    }
    true
}

/// is_authorized_responder returns true if `candidate` may sign responses on behalf of its issuer
/// at `at_time`, i.e., the signature algorithm fields agree, the certificate is valid at the time
/// of interest and the extended key usage extension includes id-kp-OCSPSigning.
fn is_authorized_responder(candidate: &CertificateWithContext, at_time: u64) -> bool {
    let cert = &candidate.decoded_cert;
    if cert.tbs_certificate.signature != cert.signature_algorithm {
        error!(
            "Candidate responder certificate issued to {} features mismatched signature algorithms",
            candidate.subject_string()
        );
        return false;
    }

    if valid_at_time(&cert.tbs_certificate, at_time).is_err() {
        error!(
            "Candidate responder certificate issued to {} is not valid at {}",
            candidate.subject_string(),
            at_time
        );
        return false;
    }

    match candidate.extended_key_usage() {
        Some(ekus) if ekus.contains(&ID_KP_OCSP_SIGNING) => true,
        _ => {
            error!(
                "Candidate responder certificate issued to {} lacks id-kp-OCSPSigning",
                candidate.subject_string()
            );
            false
        }
    }
}

/// verify_ocsp_token returns Ok if the response in `token` was signed by `issuer` or by an
/// authorized responder certificate carried in the response that was itself signed by `issuer`.
pub fn verify_ocsp_token(
    pe: &PkiEnvironment,
    token: &OcspToken,
    issuer: &CertificateWithContext,
    at_time: u64,
) -> Result<()> {
    let bor = &token.basic;
    if unsupported_critical_extensions_present_response(&bor.tbs_response_data) {
        error!("OCSP response contained at least one unsupported critical extension");
        return Err(Error::OcspResponseError);
    }

    if verify_response_signature(pe, &issuer.decoded_cert, &token.encoded_basic, bor).is_ok() {
        return Ok(());
    }

    if let Some(certs) = &bor.certs {
        for cert in certs {
            let candidate = match CertificateWithContext::from_certificate(
                cert.clone(),
                CertificateSourceType::Signature,
                token.uri.clone(),
            ) {
                Ok(c) => c,
                Err(_e) => continue,
            };
            if !compare_names(candidate.issuer(), issuer.subject()) {
                continue;
            }
            if !verify_signed_with_issuer(pe, &candidate.encoded_cert, issuer) {
                debug!(
                    "Candidate responder certificate issued to {} was not signed by the issuer",
                    candidate.subject_string()
                );
                continue;
            }
            if !is_authorized_responder(&candidate, at_time) {
                continue;
            }
            if !no_check_present(&cert.tbs_certificate.extensions) {
                info!(
                    "Responder certificate issued to {} lacks id-pkix-ocsp-nocheck",
                    candidate.subject_string()
                );
            }
            if verify_response_signature(pe, cert, &token.encoded_basic, bor).is_ok() {
                return Ok(());
            }
            error!(
                "Verified candidate responder certificate issued to {} but response signature verification failed",
                candidate.subject_string()
            );
        }
    }
    Err(Error::SignatureVerificationFailure)
}

/// `OcspCertificateVerifier` renders a verdict using an OCSP response obtained from an
/// [`OcspSource`].
///
/// By default the response signature must verify using the issuer's key or the key of a delegated
/// responder certificate issued by the issuer. Signature verification can be disabled via
/// `PS_VERIFY_OCSP_SIGNATURE`.
#[derive(Clone)]
pub struct OcspCertificateVerifier {
    pe: PkiEnvironment,
    source: Option<Arc<dyn OcspSource>>,
    verify_signature: bool,
}

impl OcspCertificateVerifier {
    /// Creates a verifier that consults the given source
    pub fn new(pe: PkiEnvironment, source: Option<Arc<dyn OcspSource>>) -> Self {
        OcspCertificateVerifier {
            pe,
            source,
            verify_signature: true,
        }
    }

    /// Creates a verifier configured by `PS_VERIFY_OCSP_SIGNATURE`
    pub fn from_settings(
        pe: PkiEnvironment,
        source: Option<Arc<dyn OcspSource>>,
        sts: &StatusSettings,
    ) -> Self {
        let mut v = Self::new(pe, source);
        v.verify_signature = sts.get_verify_ocsp_signature();
        v
    }

    /// Enables or disables response signature verification
    pub fn set_verify_signature(&mut self, verify_signature: bool) {
        self.verify_signature = verify_signature;
    }
}

impl CertificateStatusVerifier for OcspCertificateVerifier {
    fn check(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
        at_time: u64,
    ) -> Option<CertificateStatus> {
        let source = self.source.as_ref()?;
        let token = source.get_response(cert, issuer)?;

        let sr = match token.find_single(cert, issuer) {
            Some(sr) => sr,
            None => {
                info!(
                    "OCSP response contained no status for certificate issued to {}",
                    cert.subject_string()
                );
                return None;
            }
        };

        if unsupported_critical_extensions_present_single_response(sr) {
            error!("OCSP response featured unrecognized critical extensions in single response");
            return None;
        }

        if !check_response_time(sr, at_time) {
            error!(
                "OCSP response for certificate issued to {} is not current at {}",
                cert.subject_string(),
                at_time
            );
            return None;
        }

        if self.verify_signature {
            if let Err(e) = verify_ocsp_token(&self.pe, &token, issuer, at_time) {
                error!(
                    "Failed to verify OCSP response for certificate issued to {}: {:?}",
                    cert.subject_string(),
                    e
                );
                return None;
            }
        }

        let produced_at = token.produced_at();
        let evidence = RevocationEvidence::Ocsp(token.encoded.clone());
        let status = match &sr.cert_status {
            CertStatus::Good(_null) => CertificateStatus::new(
                cert,
                issuer,
                at_time,
                CertificateValidity::Valid,
                evidence,
                produced_at,
                None,
                None,
            ),
            CertStatus::Revoked(ri) => {
                let rt = ri.revocation_time.0.to_unix_duration().as_secs();
                if rt > at_time {
                    CertificateStatus::new(
                        cert,
                        issuer,
                        at_time,
                        CertificateValidity::Valid,
                        evidence,
                        produced_at,
                        None,
                        None,
                    )
                } else {
                    CertificateStatus::new(
                        cert,
                        issuer,
                        at_time,
                        CertificateValidity::Revoked,
                        evidence,
                        produced_at,
                        Some(rt),
                        ri.revocation_reason,
                    )
                }
            }
            CertStatus::Unknown(_null) => CertificateStatus::new(
                cert,
                issuer,
                at_time,
                CertificateValidity::Unknown,
                evidence,
                produced_at,
                None,
                None,
            ),
        };
        info!(
            "Determined revocation status ({}) using OCSP for certificate issued to {}",
            status.validity,
            cert.subject_string()
        );
        Some(status)
    }
}
