//! Verdict produced by a status verifier for one (certificate, issuer) pair

use serde::{Deserialize, Serialize};
use x509_cert::ext::pkix::crl::CrlReason;

use crate::evidence::cert_with_context::CertificateWithContext;
use crate::evidence::revocation_data::RevocationEvidence;

/// `CertificateValidity` is the verdict rendered for a certificate at a reference time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum CertificateValidity {
    /// Positive evidence indicates the certificate was not revoked at the reference time
    Valid,
    /// Positive evidence indicates the certificate was revoked at or before the reference time
    Revoked,
    /// The responder could not determine status
    Unknown,
}

/// `ValidatorSourceType` identifies the type of evidence a verdict is based on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum ValidatorSourceType {
    /// Certificate revocation list
    Crl,
    /// OCSP response
    Ocsp,
}

impl core::fmt::Display for CertificateValidity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CertificateValidity::Valid => write!(f, "VALID"),
            CertificateValidity::Revoked => write!(f, "REVOKED"),
            CertificateValidity::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl core::fmt::Display for ValidatorSourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ValidatorSourceType::Crl => write!(f, "CRL"),
            ValidatorSourceType::Ocsp => write!(f, "OCSP"),
        }
    }
}

/// `CertificateStatus` is the verdict record returned by a
/// [`CertificateStatusVerifier`](crate::CertificateStatusVerifier). Times are expressed as
/// seconds since the Unix epoch.
#[derive(Clone, Debug)]
#[readonly::make]
pub struct CertificateStatus {
    /// Certificate whose status was determined
    #[readonly]
    pub certificate: CertificateWithContext,
    /// Issuer of `certificate`
    #[readonly]
    pub issuer: CertificateWithContext,
    /// Time as of which status was determined
    #[readonly]
    pub reference_time: u64,
    /// Verdict
    #[readonly]
    pub validity: CertificateValidity,
    /// Type of evidence used
    #[readonly]
    pub source_type: ValidatorSourceType,
    /// Encoded evidence, i.e., the CRL or complete OCSP response
    #[readonly]
    pub evidence: RevocationEvidence,
    /// thisUpdate from a CRL or producedAt from an OCSP response
    #[readonly]
    pub issuance_time: u64,
    /// Revocation time when the certificate was revoked at the reference time
    #[readonly]
    pub revocation_time: Option<u64>,
    /// Revocation reason when available
    #[readonly]
    pub revocation_reason: Option<CrlReason>,
    /// CRL number, diagnostic only
    #[readonly]
    pub crl_number: Option<Vec<u8>>,
}

impl CertificateStatus {
    /// Assembles a new verdict record.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        certificate: &CertificateWithContext,
        issuer: &CertificateWithContext,
        reference_time: u64,
        validity: CertificateValidity,
        evidence: RevocationEvidence,
        issuance_time: u64,
        revocation_time: Option<u64>,
        revocation_reason: Option<CrlReason>,
    ) -> Self {
        let source_type = match &evidence {
            RevocationEvidence::Ocsp(_) => ValidatorSourceType::Ocsp,
            RevocationEvidence::Crl(_) => ValidatorSourceType::Crl,
            RevocationEvidence::SourceType(st) => *st,
        };
        CertificateStatus {
            certificate: certificate.clone(),
            issuer: issuer.clone(),
            reference_time,
            validity,
            source_type,
            evidence,
            issuance_time,
            revocation_time,
            revocation_reason,
            crl_number: None,
        }
    }

    /// Attaches a CRL number to the record.
    pub(crate) fn with_crl_number(mut self, crl_number: Option<Vec<u8>>) -> Self {
        self.crl_number = crl_number;
        self
    }

    /// Returns true if the verdict is [`CertificateValidity::Valid`]
    pub fn is_valid(&self) -> bool {
        self.validity == CertificateValidity::Valid
    }

    /// Returns true if the verdict is [`CertificateValidity::Revoked`]
    pub fn is_revoked(&self) -> bool {
        self.validity == CertificateValidity::Revoked
    }
}
