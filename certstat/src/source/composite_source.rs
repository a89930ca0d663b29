//! Certificate source that fans out to a list of child sources

use std::sync::Arc;

use log::error;
use x509_cert::name::Name;

use crate::environment::pki_environment_traits::CertificateSource;
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::util::error::Result;
use crate::util::utilities::name_to_string;

/// `CompositeCertificateSource` queries every registered child source in registration order and
/// concatenates the results. Absent children are skipped and children that return an error are
/// logged and skipped. Duplicates found via different children are preserved. When no child
/// yields a certificate, the first error returned by a child, if any, is returned.
#[derive(Clone, Default)]
pub struct CompositeCertificateSource {
    sources: Vec<Option<Arc<dyn CertificateSource>>>,
}

impl CompositeCertificateSource {
    /// Creates an empty composite source
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a child source
    pub fn add_source(&mut self, source: Arc<dyn CertificateSource>) {
        self.sources.push(Some(source));
    }

    /// Registers a child source that may be absent, i.e., an AIA source for a certificate that
    /// has no AIA extension
    pub fn add_optional_source(&mut self, source: Option<Arc<dyn CertificateSource>>) {
        self.sources.push(source);
    }

    /// Number of registered children, including absent ones
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if no children are registered
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl CertificateSource for CompositeCertificateSource {
    fn resolve_issuers(&self, name: &Name) -> Result<Vec<CertificateWithContext>> {
        let mut retval = vec![];
        let mut first_error = None;
        for source in self.sources.iter().flatten() {
            match source.resolve_issuers(name) {
                Ok(mut certs) => retval.append(&mut certs),
                Err(e) => {
                    error!(
                        "Certificate source failed while resolving issuers for {}: {:?}",
                        name_to_string(name),
                        e
                    );
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) if retval.is_empty() => Err(e),
            _ => Ok(retval),
        }
    }
}
