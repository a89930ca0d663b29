//! Combination of OCSP and CRL verifiers

use std::sync::Arc;

use log::{debug, info};

use crate::environment::pki_environment_traits::CertificateStatusVerifier;
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::evidence::certificate_status::{CertificateStatus, CertificateValidity};
use crate::validator::status_settings::StatusSettings;

/// `OcspAndCrlVerifier` consults an OCSP verifier and a CRL verifier in turn and returns the first
/// verdict. An Unknown verdict from OCSP does not stop the search: the CRL verifier is consulted
/// and its verdict preferred if it has one.
#[derive(Clone)]
pub struct OcspAndCrlVerifier {
    ocsp: Option<Arc<dyn CertificateStatusVerifier>>,
    crl: Option<Arc<dyn CertificateStatusVerifier>>,
    prefer_ocsp: bool,
}

impl OcspAndCrlVerifier {
    /// Creates a verifier that consults OCSP before CRLs
    pub fn new(
        ocsp: Option<Arc<dyn CertificateStatusVerifier>>,
        crl: Option<Arc<dyn CertificateStatusVerifier>>,
    ) -> Self {
        OcspAndCrlVerifier {
            ocsp,
            crl,
            prefer_ocsp: true,
        }
    }

    /// Creates a verifier whose order is governed by `PS_PREFER_OCSP` and whose members are
    /// enabled by `PS_CHECK_OCSP_FROM_AIA` and `PS_CHECK_CRLS`
    pub fn from_settings(
        ocsp: Option<Arc<dyn CertificateStatusVerifier>>,
        crl: Option<Arc<dyn CertificateStatusVerifier>>,
        sts: &StatusSettings,
    ) -> Self {
        OcspAndCrlVerifier {
            ocsp: if sts.get_check_ocsp_from_aia() { ocsp } else { None },
            crl: if sts.get_check_crls() { crl } else { None },
            prefer_ocsp: sts.get_prefer_ocsp(),
        }
    }

    /// Sets whether OCSP is consulted before CRLs
    pub fn set_prefer_ocsp(&mut self, prefer_ocsp: bool) {
        self.prefer_ocsp = prefer_ocsp;
    }

    fn ordered(&self) -> [&Option<Arc<dyn CertificateStatusVerifier>>; 2] {
        if self.prefer_ocsp {
            [&self.ocsp, &self.crl]
        } else {
            [&self.crl, &self.ocsp]
        }
    }
}

impl CertificateStatusVerifier for OcspAndCrlVerifier {
    fn check(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
        at_time: u64,
    ) -> Option<CertificateStatus> {
        let mut unknown = None;
        for verifier in self.ordered().into_iter().flatten() {
            match verifier.check(cert, issuer, at_time) {
                Some(status) if status.validity == CertificateValidity::Unknown => {
                    debug!(
                        "Status of certificate issued to {} is unknown, trying next verifier",
                        cert.subject_string()
                    );
                    if unknown.is_none() {
                        unknown = Some(status);
                    }
                }
                Some(status) => return Some(status),
                None => {}
            }
        }
        if unknown.is_none() {
            info!(
                "Failed to determine revocation status for certificate issued to {}",
                cert.subject_string()
            );
        }
        unknown
    }
}
