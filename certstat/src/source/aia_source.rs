//! Certificate source that downloads issuer certificates from caIssuers locations

use std::sync::Arc;

use log::{debug, info};
use x509_cert::name::Name;

use crate::environment::pki_environment_traits::{CertificateSource, HttpTransport};
use crate::evidence::cert_with_context::{CertificateSourceType, CertificateWithContext};
use crate::util::error::Result;
use crate::util::utilities::{compare_names, name_to_string};

/// `AiaCertificateSource` resolves the issuer of a known certificate by following the caIssuers
/// URIs in that certificate's authority information access extension.
///
/// Discovery is best-effort: download and parsing failures yield an empty result. Each URI is
/// expected to return exactly one DER or PEM encoded certificate. Certificates are returned only
/// when their subject matches the requested name.
pub struct AiaCertificateSource {
    cert: CertificateWithContext,
    transport: Arc<dyn HttpTransport>,
}

impl AiaCertificateSource {
    /// Creates a source around the certificate whose AIA extension points to its issuer
    pub fn new(cert: CertificateWithContext, transport: Arc<dyn HttpTransport>) -> Self {
        AiaCertificateSource { cert, transport }
    }

    fn fetch_one(&self, uri: &str) -> Option<CertificateWithContext> {
        let bytes = match self.transport.fetch(uri) {
            Ok(bytes) => bytes,
            Err(e) => {
                info!("Failed to download certificate from {}: {:?}", uri, e);
                return None;
            }
        };
        match CertificateWithContext::new(&bytes, CertificateSourceType::Aia, Some(uri.to_string())) {
            Ok(cert) => Some(cert),
            Err(e) => {
                debug!("Failed to parse certificate downloaded from {}: {:?}", uri, e);
                None
            }
        }
    }
}

impl CertificateSource for AiaCertificateSource {
    fn resolve_issuers(&self, name: &Name) -> Result<Vec<CertificateWithContext>> {
        let mut retval = vec![];
        for uri in self.cert.ca_issuers_uris() {
            if let Some(cert) = self.fetch_one(&uri) {
                if compare_names(cert.subject(), name) {
                    if !retval.contains(&cert) {
                        retval.push(cert);
                    }
                } else {
                    debug!(
                        "Ignoring certificate from {} issued to {} while seeking {}",
                        uri,
                        cert.subject_string(),
                        name_to_string(name)
                    );
                }
            }
        }
        Ok(retval)
    }
}
