//! Binding of a signed token to one piece of revocation evidence

use std::sync::Arc;

use log::error;

use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use der::Decode;
use x509_cert::crl::CertificateList;
use x509_ocsp::{BasicOcspResponse, OcspResponse};

use crate::evidence::certificate_status::ValidatorSourceType;
use crate::evidence::signed_token::SignedToken;
use crate::util::error::{Error, Result};

/// `RevocationEvidence` holds the evidence a verdict is based on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RevocationEvidence {
    /// Encoded CertificateList
    Crl(Vec<u8>),
    /// Encoded OCSPResponse, including the signed BasicOCSPResponse
    Ocsp(Vec<u8>),
    /// Marker naming the type of source without carrying the artifact
    SourceType(ValidatorSourceType),
}

/// Returns Ok if the buffer contains a CertificateList
fn check_crl(enc: &[u8]) -> Result<()> {
    match CertificateList::from_der(enc) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("Revocation evidence is not a CRL: {}", e);
            Err(Error::InvalidEvidence)
        }
    }
}

/// Returns Ok if the buffer contains an OCSPResponse, which, if it features response bytes,
/// carries a parsable BasicOCSPResponse
fn check_ocsp(enc: &[u8]) -> Result<()> {
    let or = match OcspResponse::from_der(enc) {
        Ok(or) => or,
        Err(e) => {
            error!("Revocation evidence is not an OCSP response: {}", e);
            return Err(Error::InvalidEvidence);
        }
    };
    if let Some(rb) = &or.response_bytes {
        if rb.response_type != ID_PKIX_OCSP_BASIC
            || BasicOcspResponse::from_der(rb.response.as_bytes()).is_err()
        {
            error!("Revocation evidence does not contain a basic OCSP response");
            return Err(Error::InvalidEvidence);
        }
    }
    Ok(())
}

/// `RevocationData` binds a [`SignedToken`] to exactly one piece of [`RevocationEvidence`].
///
/// Certificate tokens accept a CRL, an OCSP response or a source type marker. Other tokens accept
/// only a source type marker.
#[derive(Clone)]
pub struct RevocationData {
    token: Arc<dyn SignedToken>,
    evidence: RevocationEvidence,
}

impl RevocationData {
    /// Binds evidence to a token, rejecting evidence that cannot be associated with the token with
    /// [`Error::InvalidEvidence`].
    pub fn new(token: Arc<dyn SignedToken>, evidence: RevocationEvidence) -> Result<Self> {
        match &evidence {
            RevocationEvidence::SourceType(_) => {}
            RevocationEvidence::Crl(enc) => {
                if token.certificate().is_none() {
                    return Err(Error::InvalidEvidence);
                }
                check_crl(enc)?;
            }
            RevocationEvidence::Ocsp(enc) => {
                if token.certificate().is_none() {
                    return Err(Error::InvalidEvidence);
                }
                check_ocsp(enc)?;
            }
        }
        Ok(RevocationData { token, evidence })
    }

    /// Token the evidence pertains to
    pub fn token(&self) -> &Arc<dyn SignedToken> {
        &self.token
    }

    /// Evidence bound to the token
    pub fn evidence(&self) -> &RevocationEvidence {
        &self.evidence
    }
}

impl core::fmt::Debug for RevocationData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RevocationData")
            .field("token", &self.token.dss_id())
            .field("evidence", &self.evidence)
            .finish()
    }
}
