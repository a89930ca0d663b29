//! OCSP sources that obtain responses from responders or from a caller-supplied set

use std::sync::Arc;

use log::{debug, error, info};

use const_oid::db::rfc6960::ID_PKIX_OCSP_BASIC;
use der::Decode;
use x509_ocsp::{BasicOcspResponse, OcspResponse, OcspResponseStatus, SingleResponse};

use crate::environment::pki_environment_traits::{
    HttpTransport, NoopNotFoundObserver, NotFoundObserver, OcspSource,
};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::revocation::ocsp_client::{
    cert_id_matches_certificate, prepare_ocsp_request, OCSP_REQUEST_CONTENT_TYPE,
};
use crate::util::error::{Error, Result};
use crate::util::file_utils::{read_folder, OCSP_FILE_EXTS};

/// `OcspToken` carries an encoded OCSPResponse, the encoded and decoded BasicOCSPResponse it
/// contains and the URI of the responder, if any.
#[derive(Clone, Debug, Eq, PartialEq)]
#[readonly::make]
pub struct OcspToken {
    /// Encoded OCSPResponse
    #[readonly]
    pub encoded: Vec<u8>,
    /// Encoded BasicOCSPResponse read from the responseBytes field
    #[readonly]
    pub encoded_basic: Vec<u8>,
    /// Decoded BasicOCSPResponse
    #[readonly]
    pub basic: BasicOcspResponse,
    /// Location of the responder that provided the response
    #[readonly]
    pub uri: Option<String>,
}

impl OcspToken {
    /// Parses an encoded OCSPResponse. Responses with a status other than successful, with no
    /// response bytes or with response bytes other than the basic type are rejected with
    /// [`Error::OcspResponseError`].
    pub fn new(enc_ocsp_resp: &[u8], uri: Option<String>) -> Result<Self> {
        let or = match OcspResponse::from_der(enc_ocsp_resp) {
            Ok(or) => or,
            Err(e) => {
                error!("Failed to parse OcspResponse: {}", e);
                return Err(Error::Asn1Error(e));
            }
        };

        if or.response_status != OcspResponseStatus::Successful {
            error!("OcspResponse indicates failure ({:?})", or.response_status);
            return Err(Error::OcspResponseError);
        }

        let rb = match &or.response_bytes {
            Some(rb) => rb,
            None => {
                error!("OcspResponse contained no response bytes");
                return Err(Error::OcspResponseError);
            }
        };

        if rb.response_type != ID_PKIX_OCSP_BASIC {
            error!(
                "OcspResponse contained response bytes other than basic type ({})",
                rb.response_type
            );
            return Err(Error::OcspResponseError);
        }

        let encoded_basic = rb.response.as_bytes().to_vec();
        let basic = match BasicOcspResponse::from_der(&encoded_basic) {
            Ok(bor) => bor,
            Err(e) => {
                error!(
                    "OcspResponse contained BasicOcspResponse that could not be parsed with: {}",
                    e
                );
                return Err(Error::Asn1Error(e));
            }
        };

        Ok(OcspToken {
            encoded: enc_ocsp_resp.to_vec(),
            encoded_basic,
            basic,
            uri,
        })
    }

    /// producedAt as seconds since the Unix epoch
    pub fn produced_at(&self) -> u64 {
        self.basic
            .tbs_response_data
            .produced_at
            .0
            .to_unix_duration()
            .as_secs()
    }

    /// Returns the SingleResponse that pertains to `cert` issued by `issuer`, if any
    pub fn find_single(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<&SingleResponse> {
        self.basic
            .tbs_response_data
            .responses
            .iter()
            .find(|sr| cert_id_matches_certificate(&sr.cert_id, cert, issuer))
    }
}

/// `OnlineOcspSource` posts OCSP requests to the responders named in the authority information
/// access extension of a certificate.
pub struct OnlineOcspSource {
    transport: Arc<dyn HttpTransport>,
}

impl OnlineOcspSource {
    /// Creates a source that uses the given transport
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        OnlineOcspSource { transport }
    }

    /// Sends a request for `cert` to the responder at `uri` and parses the response
    pub fn send_ocsp_request(
        &self,
        uri: &str,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Result<OcspToken> {
        let enc_ocsp_req = prepare_ocsp_request(cert, issuer)?;
        let enc_ocsp_resp = match self
            .transport
            .post(uri, OCSP_REQUEST_CONTENT_TYPE, &enc_ocsp_req)
        {
            Ok(r) => r,
            Err(e) => {
                debug!("OCSP request send failed with {:?}: {}", e, uri);
                return Err(e);
            }
        };
        OcspToken::new(&enc_ocsp_resp, Some(uri.to_string()))
    }
}

impl OcspSource for OnlineOcspSource {
    fn get_response(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<OcspToken> {
        let ocsp_aias = cert.ocsp_uris();
        if ocsp_aias.is_empty() {
            info!("No OCSP AIAs found for {}", cert.subject_string());
            return None;
        }
        for uri in ocsp_aias {
            match self.send_ocsp_request(&uri, cert, issuer) {
                Ok(token) => return Some(token),
                Err(e) => info!(
                    "Failed to obtain OCSP response for {} via {}: {:?}",
                    cert.subject_string(),
                    uri,
                    e
                ),
            }
        }
        None
    }
}

/// `OfflineOcspSource` provides an [`OcspSource`] implementation backed by OCSP responses supplied
/// by the caller, i.e., those included in a signature or read from a folder.
pub struct OfflineOcspSource {
    responses: Vec<OcspToken>,
    observer: Arc<dyn NotFoundObserver>,
}

impl Default for OfflineOcspSource {
    fn default() -> Self {
        OfflineOcspSource {
            responses: vec![],
            observer: Arc::new(NoopNotFoundObserver),
        }
    }
}

impl OfflineOcspSource {
    /// Creates an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the observer notified when no response is found for a certificate
    pub fn set_observer(&mut self, observer: Arc<dyn NotFoundObserver>) {
        self.observer = observer;
    }

    /// Parses and adds an encoded OCSPResponse. Returns false if the response was already present.
    pub fn add_response(&mut self, enc_ocsp_resp: &[u8]) -> Result<bool> {
        let token = OcspToken::new(enc_ocsp_resp, None)?;
        if self.responses.iter().any(|r| r.encoded == token.encoded) {
            return Ok(false);
        }
        self.responses.push(token);
        Ok(true)
    }

    /// Recursively reads OCSP responses from the indicated folder. Files that cannot be parsed are
    /// skipped.
    pub fn from_folder(folder: &str) -> Result<Self> {
        let mut source = Self::new();
        for (path, buffer) in read_folder(folder, OCSP_FILE_EXTS)? {
            if let Err(e) = source.add_response(&buffer) {
                debug!("Ignored {} as not an OCSP response: {:?}", path.display(), e);
            }
        }
        info!("Read {} OCSP responses from {}", source.len(), folder);
        Ok(source)
    }

    /// Number of responses held by the source
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Returns true if the source holds no responses
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl OcspSource for OfflineOcspSource {
    fn get_response(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<OcspToken> {
        for token in &self.responses {
            if token.find_single(cert, issuer).is_some() {
                return Some(token.clone());
            }
        }
        info!(
            "No OCSP response available for certificate issued to {}",
            cert.subject_string()
        );
        self.observer.ocsp_not_found(cert);
        None
    }
}

#[test]
fn malformed_response_test() {
    assert!(OcspToken::new(&[0x30, 0x03, 0x0A, 0x01, 0x00], None).is_err());
    // tryLater, no response bytes
    assert_eq!(
        Err(Error::OcspResponseError),
        OcspToken::new(&[0x30, 0x03, 0x0A, 0x01, 0x03], None)
    );
    assert!(OcspToken::new(&[0x04, 0x00], None).is_err());
}
