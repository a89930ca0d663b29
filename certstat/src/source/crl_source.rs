//! CRL sources that retrieve CRLs from distribution points or from a caller-supplied set

use std::sync::Arc;

use log::{debug, info};

use der::Decode;
use x509_cert::crl::CertificateList;

use crate::environment::pki_environment_traits::{
    CheckRemoteResource, CrlSource, HttpTransport, NoopNotFoundObserver, NotFoundObserver,
};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::util::error::{Error, Result};
use crate::util::file_utils::{read_folder, CRL_FILE_EXTS};
use crate::util::utilities::{compare_names, is_http_uri, name_to_string, pem_to_der};

/// `CrlToken` carries a CRL in encoded and decoded form along with the URI it was retrieved from,
/// if any.
#[derive(Clone, Debug, Eq, PartialEq)]
#[readonly::make]
pub struct CrlToken {
    /// Encoded CertificateList
    #[readonly]
    pub encoded: Vec<u8>,
    /// Decoded CertificateList
    #[readonly]
    pub crl: CertificateList,
    /// Location from which the CRL was retrieved
    #[readonly]
    pub uri: Option<String>,
}

impl CrlToken {
    /// Parses a DER or PEM encoded CRL
    pub fn new(enc_crl: &[u8], uri: Option<String>) -> Result<Self> {
        let encoded = pem_to_der(enc_crl.to_vec())?;
        let crl = CertificateList::from_der(&encoded)?;
        Ok(CrlToken { encoded, crl, uri })
    }

    /// nextUpdate from the CRL as seconds since the Unix epoch, if present
    pub fn next_update(&self) -> Option<u64> {
        self.crl
            .tbs_cert_list
            .next_update
            .map(|nu| nu.to_unix_duration().as_secs())
    }

    /// thisUpdate from the CRL as seconds since the Unix epoch
    pub fn this_update(&self) -> u64 {
        self.crl
            .tbs_cert_list
            .this_update
            .to_unix_duration()
            .as_secs()
    }
}

/// get_crl_dps returns the http and https URIs read from the CRL DP extension, if any. URIs that
/// use other schemes, i.e., ldap, are skipped.
pub fn get_crl_dps(cert: &CertificateWithContext) -> Vec<String> {
    let mut retval = vec![];
    for uri in cert.crl_dp_uris() {
        if is_http_uri(&uri) {
            retval.push(uri);
        } else {
            debug!(
                "Skipping unsupported CRL DP URI {} in certificate issued to {}",
                uri,
                cert.subject_string()
            );
        }
    }
    retval
}

/// `OnlineCrlSource` downloads CRLs from the distribution points named in a certificate.
///
/// When a blocklist is supplied, URIs that could not be reached are added to it and are not
/// contacted again until the blocklist releases them. A successful download removes the URI from
/// the blocklist.
pub struct OnlineCrlSource {
    transport: Arc<dyn HttpTransport>,
    blocklist: Option<Arc<dyn CheckRemoteResource>>,
}

impl OnlineCrlSource {
    /// Creates a source that uses the given transport and retries failed URIs on every request
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        OnlineCrlSource {
            transport,
            blocklist: None,
        }
    }

    /// Creates a source that uses the given transport and blocklist
    pub fn with_blocklist(
        transport: Arc<dyn HttpTransport>,
        blocklist: Arc<dyn CheckRemoteResource>,
    ) -> Self {
        OnlineCrlSource {
            transport,
            blocklist: Some(blocklist),
        }
    }

    /// fetch_crl retrieves and parses the CRL at the given URI.
    ///
    /// Returns [`Error::InvalidUriScheme`] for URIs that are not http or https and
    /// [`Error::UriOnBlocklist`] for URIs that are currently on the blocklist.
    pub fn fetch_crl(&self, uri: &str) -> Result<CrlToken> {
        if !is_http_uri(uri) {
            debug!("Ignored non-HTTP URI presented for CRL retrieval");
            return Err(Error::InvalidUriScheme);
        }

        if let Some(blocklist) = &self.blocklist {
            if blocklist.check_blocklist(uri) {
                info!("{} is on the blocklist", uri);
                return Err(Error::UriOnBlocklist);
            }
        }

        let bytes = match self.transport.fetch(uri) {
            Ok(b) => b,
            Err(e) => {
                debug!("Failed to fetch CRL from {}: {:?}", uri, e);
                if let Some(blocklist) = &self.blocklist {
                    blocklist.add_to_blocklist(uri);
                }
                return Err(e);
            }
        };
        if let Some(blocklist) = &self.blocklist {
            blocklist.remove_from_blocklist(uri);
        }

        match CrlToken::new(&bytes, Some(uri.to_string())) {
            Ok(token) => Ok(token),
            Err(e) => {
                info!("Failed to parse CRL downloaded from {}: {:?}", uri, e);
                Err(e)
            }
        }
    }
}

impl CrlSource for OnlineCrlSource {
    fn find_crl(
        &self,
        cert: &CertificateWithContext,
        _issuer: &CertificateWithContext,
    ) -> Option<CrlToken> {
        for uri in get_crl_dps(cert) {
            if let Ok(token) = self.fetch_crl(&uri) {
                return Some(token);
            }
        }
        None
    }
}

/// `OfflineCrlSource` provides a [`CrlSource`] implementation backed by CRLs supplied by the
/// caller, i.e., those included in a signature or read from a folder.
pub struct OfflineCrlSource {
    crls: Vec<CrlToken>,
    observer: Arc<dyn NotFoundObserver>,
}

impl Default for OfflineCrlSource {
    fn default() -> Self {
        OfflineCrlSource {
            crls: vec![],
            observer: Arc::new(NoopNotFoundObserver),
        }
    }
}

impl OfflineCrlSource {
    /// Creates an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the observer notified when no CRL is found for a certificate
    pub fn set_observer(&mut self, observer: Arc<dyn NotFoundObserver>) {
        self.observer = observer;
    }

    /// Parses and adds an encoded CRL. Returns false if the CRL was already present.
    pub fn add_crl(&mut self, enc_crl: &[u8]) -> Result<bool> {
        let token = CrlToken::new(enc_crl, None)?;
        if self.crls.iter().any(|c| c.encoded == token.encoded) {
            return Ok(false);
        }
        self.crls.push(token);
        Ok(true)
    }

    /// Recursively reads CRLs from the indicated folder. Files that cannot be parsed are skipped.
    pub fn from_folder(folder: &str) -> Result<Self> {
        let mut source = Self::new();
        for (path, buffer) in read_folder(folder, CRL_FILE_EXTS)? {
            if let Err(e) = source.add_crl(&buffer) {
                debug!("Ignored {} as not a CRL: {:?}", path.display(), e);
            }
        }
        info!("Read {} CRLs from {}", source.len(), folder);
        Ok(source)
    }

    /// Number of CRLs held by the source
    pub fn len(&self) -> usize {
        self.crls.len()
    }

    /// Returns true if the source holds no CRLs
    pub fn is_empty(&self) -> bool {
        self.crls.is_empty()
    }
}

impl CrlSource for OfflineCrlSource {
    fn find_crl(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<CrlToken> {
        for token in &self.crls {
            if compare_names(&token.crl.tbs_cert_list.issuer, issuer.subject()) {
                return Some(token.clone());
            }
        }
        info!(
            "No CRL issued by {} available for certificate issued to {}",
            name_to_string(issuer.subject()),
            cert.subject_string()
        );
        self.observer.crl_not_found(cert);
        None
    }
}
