//! In-memory certificate source indexed by subject name

use std::collections::BTreeMap;

use log::{debug, info};
use x509_cert::name::Name;

use crate::environment::pki_environment_traits::CertificateSource;
use crate::evidence::cert_with_context::{CertificateSourceType, CertificateWithContext};
use crate::util::error::Result;
use crate::util::file_utils::{read_folder, CERT_FILE_EXTS};
use crate::util::utilities::{name_to_string, valid_at_time};

/// `CertSource` provides a [`CertificateSource`] implementation backed by certificates supplied by
/// the caller, i.e., the contents of a trust store or the certificates carried in a signature.
///
/// Each certificate is tagged with the [`CertificateSourceType`] given at construction. Lookups
/// compare the string form of the requested name to the string form of each subject name.
#[derive(Clone)]
pub struct CertSource {
    source_type: CertificateSourceType,
    certs: Vec<CertificateWithContext>,
    name_map: BTreeMap<String, Vec<usize>>,
}

impl CertSource {
    /// Creates an empty source whose certificates will be tagged with `source_type`
    pub fn new(source_type: CertificateSourceType) -> CertSource {
        CertSource {
            source_type,
            certs: Vec::new(),
            name_map: BTreeMap::new(),
        }
    }

    /// Type assigned to certificates added to this source
    pub fn source_type(&self) -> CertificateSourceType {
        self.source_type
    }

    /// Adds a certificate, retagged with this source's type. Returns false if the certificate was
    /// already present.
    pub fn add_certificate(&mut self, cert: &CertificateWithContext) -> bool {
        if self.certs.contains(cert) {
            return false;
        }
        let cert = cert.with_source(self.source_type, cert.context.clone());
        let index = self.certs.len();
        self.name_map
            .entry(name_to_string(cert.subject()))
            .or_default()
            .push(index);
        self.certs.push(cert);
        true
    }

    /// Parses and adds an encoded certificate
    pub fn add_encoded_certificate(&mut self, enc_cert: &[u8], context: Option<String>) -> Result<bool> {
        let cert = CertificateWithContext::new(enc_cert, self.source_type, context)?;
        Ok(self.add_certificate(&cert))
    }

    /// Recursively reads certificates from the indicated folder and returns the number of
    /// certificates added. Files that cannot be parsed or that are not valid at `time_of_interest`
    /// are skipped. Pass 0 for `time_of_interest` to skip the validity check.
    ///
    /// Only files with .der, .crt, .cer or .pem extensions are processed.
    pub fn add_certificates_from_folder(&mut self, folder: &str, time_of_interest: u64) -> Result<usize> {
        let initial_count = self.certs.len();
        for (path, buffer) in read_folder(folder, CERT_FILE_EXTS)? {
            let context = path.to_str().map(|s| s.to_string());
            let cert = match CertificateWithContext::new(&buffer, self.source_type, context) {
                Ok(cert) => cert,
                Err(e) => {
                    debug!("Ignored {} as not a certificate: {:?}", path.display(), e);
                    continue;
                }
            };
            if valid_at_time(&cert.decoded_cert.tbs_certificate, time_of_interest).is_err() {
                info!(
                    "Ignored {} as not valid at indicated time of interest",
                    path.display()
                );
                continue;
            }
            self.add_certificate(&cert);
        }
        Ok(self.certs.len() - initial_count)
    }

    /// All certificates held by the source
    pub fn certificates(&self) -> &[CertificateWithContext] {
        &self.certs
    }

    /// Number of certificates held by the source
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    /// Returns true if the source holds no certificates
    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

impl CertificateSource for CertSource {
    fn resolve_issuers(&self, name: &Name) -> Result<Vec<CertificateWithContext>> {
        let name_str = name_to_string(name);
        match self.name_map.get(&name_str) {
            Some(indices) => Ok(indices
                .iter()
                .filter_map(|i| self.certs.get(*i))
                .cloned()
                .collect()),
            None => {
                debug!("No certificates found for {} in {} source", name_str, self.source_type);
                Ok(vec![])
            }
        }
    }
}
