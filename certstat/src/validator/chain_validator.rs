//! Walks from a certificate towards a self-signed certificate, determining the status of each link

use std::sync::Arc;

use log::{debug, error, info};

use crate::environment::pki_environment::{populate_default_pki_environment, PkiEnvironment};
use crate::environment::pki_environment_traits::{
    CertificateSource, CertificateStatusVerifier, HttpTransport,
};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::evidence::certificate_status::CertificateStatus;
use crate::evidence::revocation_data::{RevocationData, RevocationEvidence};
use crate::evidence::signed_token::{CertificateToken, SignedToken};
use crate::util::error::{Error, Result};
use crate::util::utilities::is_self_signed_with_buffer;
use crate::validator::status_settings::{StatusSettings, PS_MAX_CHAIN_LENGTH_DEFAULT};

/// `ChainResult` describes the outcome of a chain walk.
///
/// `certificates` begins with the certificate presented for validation and ends with the last
/// issuer that could be resolved. `statuses[i]` is the verdict for `certificates[i]` as issued by
/// `certificates[i + 1]`, so there is one fewer status than there are certificates.
#[derive(Clone, Debug, Default)]
pub struct ChainResult {
    /// Certificates in order from the target towards the root
    pub certificates: Vec<CertificateWithContext>,
    /// Verdict for each link, if one could be determined
    pub statuses: Vec<Option<CertificateStatus>>,
    /// Evidence used to produce each verdict that carries a CRL or OCSP response
    pub revocation_data: Vec<RevocationData>,
}

impl ChainResult {
    /// Returns true if the last certificate is self-signed, i.e., the walk reached a root
    pub fn is_complete(&self, pe: &PkiEnvironment) -> bool {
        match self.certificates.last() {
            Some(c) => is_self_signed_with_buffer(pe, &c.decoded_cert, &c.encoded_cert),
            None => false,
        }
    }

    /// Returns true if any link was determined to be revoked
    pub fn any_revoked(&self) -> bool {
        self.statuses.iter().flatten().any(|s| s.is_revoked())
    }
}

/// `ChainValidator` resolves issuers using a [`CertificateSource`] and asks a
/// [`CertificateStatusVerifier`] for the status of each (certificate, issuer) pair.
///
/// At each step the first candidate issuer whose key verifies the signature on the current
/// certificate is chosen. When the source yields no usable candidate and a transport is
/// configured, caIssuers URIs in the current certificate are followed. The walk stops at a
/// self-signed certificate, when no issuer can be found or when the maximum chain length is
/// reached.
#[derive(Clone)]
pub struct ChainValidator {
    pe: PkiEnvironment,
    source: Arc<dyn CertificateSource>,
    verifier: Option<Arc<dyn CertificateStatusVerifier>>,
    transport: Option<Arc<dyn HttpTransport>>,
    max_chain_length: u8,
}

impl ChainValidator {
    /// Returns a builder
    pub fn builder() -> ChainValidatorBuilder {
        ChainValidatorBuilder::default()
    }

    fn find_issuer(
        &self,
        cert: &CertificateWithContext,
        chain: &[CertificateWithContext],
    ) -> Option<CertificateWithContext> {
        let token = CertificateToken::new(cert.clone());
        let mut sources = vec![self.source.clone()];
        if let Some(transport) = &self.transport {
            if let Some(aia) = token.embedded_certificate_source(transport.clone()) {
                sources.push(aia);
            }
        }

        for source in sources {
            let candidates = match source.resolve_issuers(cert.issuer()) {
                Ok(candidates) => candidates,
                Err(e) => {
                    error!(
                        "Failed to resolve issuers for {}: {:?}",
                        cert.subject_string(),
                        e
                    );
                    continue;
                }
            };
            for candidate in candidates {
                if chain.contains(&candidate) {
                    continue;
                }
                if token.is_signed_by(&self.pe, &candidate) {
                    return Some(candidate);
                }
                debug!(
                    "Candidate issuer {} did not verify signature on certificate issued to {}",
                    candidate.subject_string(),
                    cert.subject_string()
                );
            }
        }
        None
    }

    /// Walks from `cert` towards a self-signed certificate and determines the status of each link
    /// as of `at_time` (seconds since the Unix epoch).
    pub fn validate(&self, cert: &CertificateWithContext, at_time: u64) -> ChainResult {
        let mut result = ChainResult {
            certificates: vec![cert.clone()],
            ..Default::default()
        };

        loop {
            let current = match result.certificates.last() {
                Some(c) => c.clone(),
                None => break,
            };
            if is_self_signed_with_buffer(&self.pe, &current.decoded_cert, &current.encoded_cert) {
                debug!("Reached self-signed certificate {}", current.subject_string());
                break;
            }
            if result.certificates.len() >= self.max_chain_length as usize {
                info!(
                    "Stopped at {} after reaching maximum chain length of {}",
                    current.subject_string(),
                    self.max_chain_length
                );
                break;
            }
            let issuer = match self.find_issuer(&current, &result.certificates) {
                Some(issuer) => issuer,
                None => {
                    info!("No issuer found for {}", current.subject_string());
                    break;
                }
            };

            let status = match &self.verifier {
                Some(verifier) => verifier.check(&current, &issuer, at_time),
                None => None,
            };
            if let Some(status) = &status {
                match &status.evidence {
                    RevocationEvidence::Crl(_) | RevocationEvidence::Ocsp(_) => {
                        let token: Arc<dyn SignedToken> = Arc::new(CertificateToken::new(current));
                        match RevocationData::new(token, status.evidence.clone()) {
                            Ok(rd) => result.revocation_data.push(rd),
                            Err(e) => error!("Failed to bind revocation evidence: {:?}", e),
                        }
                    }
                    RevocationEvidence::SourceType(_) => {}
                }
            }
            result.statuses.push(status);
            result.certificates.push(issuer);
        }
        result
    }
}

/// Builder for [`ChainValidator`]. A certificate source must be supplied.
#[derive(Default)]
pub struct ChainValidatorBuilder {
    pe: Option<PkiEnvironment>,
    source: Option<Arc<dyn CertificateSource>>,
    verifier: Option<Arc<dyn CertificateStatusVerifier>>,
    transport: Option<Arc<dyn HttpTransport>>,
    max_chain_length: Option<u8>,
}

impl ChainValidatorBuilder {
    /// Sets the environment used to verify signatures. Defaults to an environment prepared by
    /// [`populate_default_pki_environment`].
    pub fn environment(mut self, pe: PkiEnvironment) -> Self {
        self.pe = Some(pe);
        self
    }

    /// Sets the source used to resolve issuers
    pub fn certificate_source(mut self, source: Arc<dyn CertificateSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the verifier used to determine the status of each link. Without a verifier, every
    /// status is None.
    pub fn verifier(mut self, verifier: Arc<dyn CertificateStatusVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Sets the transport used to follow caIssuers URIs
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the maximum number of certificates in a chain
    pub fn max_chain_length(mut self, max_chain_length: u8) -> Self {
        self.max_chain_length = Some(max_chain_length);
        self
    }

    /// Applies `PS_MAX_CHAIN_LENGTH`, `PS_CHECK_REVOCATION_STATUS` and
    /// `PS_RETRIEVE_FROM_AIA_HTTP`. Call after the verifier and transport have been supplied.
    pub fn settings(mut self, sts: &StatusSettings) -> Self {
        self.max_chain_length = Some(sts.get_max_chain_length());
        if !sts.get_check_revocation_status() {
            self.verifier = None;
        }
        if !sts.get_retrieve_from_aia_http() {
            self.transport = None;
        }
        self
    }

    /// Returns the configured validator or [`Error::Misconfiguration`] if no certificate source
    /// was supplied
    pub fn build(self) -> Result<ChainValidator> {
        let source = match self.source {
            Some(s) => s,
            None => {
                error!("ChainValidator requires a certificate source");
                return Err(Error::Misconfiguration);
            }
        };
        Ok(ChainValidator {
            pe: self.pe.unwrap_or_else(|| {
                let mut pe = PkiEnvironment::default();
                populate_default_pki_environment(&mut pe);
                pe
            }),
            source,
            verifier: self.verifier,
            transport: self.transport,
            max_chain_length: self.max_chain_length.unwrap_or(PS_MAX_CHAIN_LENGTH_DEFAULT),
        })
    }
}

#[test]
fn builder_requires_source() {
    assert_eq!(
        Some(Error::Misconfiguration),
        ChainValidator::builder().build().err()
    );
}
