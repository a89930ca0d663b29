//! Abstraction over signed artifacts whose issuers and revocation evidence are sought

use std::sync::Arc;

use log::debug;

use der::asn1::BitString;
use spki::AlgorithmIdentifierOwned;
use x509_cert::name::Name;

use crate::environment::pki_environment::PkiEnvironment;
use crate::environment::pki_environment_traits::{CertificateSource, HttpTransport};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::source::aia_source::AiaCertificateSource;
use crate::util::utilities::{compare_names, sha256_hex};

/// DeferDecodeSigned provides a structure for decoding the outer fields of a signed structure, i.e.,
/// Certificate or CertificateList, while retaining the encoded to-be-signed field.
///
/// ```text
/// Certificate  ::=  SEQUENCE  {
///      tbsCertificate       TBSCertificate,
///      signatureAlgorithm   AlgorithmIdentifier,
///      signature            BIT STRING  }
/// ```
///
/// Deferred decoding avoids re-encoding the to-be-signed field (and potentially encountering
/// problems with structures that were not DER-encoded prior to signing) when verifying signatures.
pub struct DeferDecodeSigned {
    /// Encoded to-be-signed field
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_field = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_field.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

/// `verify_signed_with_issuer` returns true if the signature on an encoded Certificate or
/// CertificateList verifies using the public key from the issuer certificate.
pub fn verify_signed_with_issuer(
    pe: &PkiEnvironment,
    encoded: &[u8],
    issuer: &CertificateWithContext,
) -> bool {
    use der::Decode;
    let defer = match DeferDecodeSigned::from_der(encoded) {
        Ok(defer) => defer,
        Err(e) => {
            debug!("Failed to defer decode signed object: {}", e);
            return false;
        }
    };
    let signature = match defer.signature.as_bytes() {
        Some(s) => s,
        None => return false,
    };
    pe.verify_signature_message(
        &defer.tbs_field,
        signature,
        &defer.signature_algorithm,
        &issuer.decoded_cert.tbs_certificate.subject_public_key_info,
    )
    .is_ok()
}

/// `SignedToken` describes a signed artifact with a signer name, a means of checking whether a
/// candidate issuer signed it and an optional source of certificates carried by the artifact
/// itself, i.e., an AIA extension in a certificate.
pub trait SignedToken: Send + Sync {
    /// Name of the entity that signed the token, i.e., the issuer of a certificate
    fn signer_name(&self) -> &Name;

    /// Encoded token
    fn encoded(&self) -> &[u8];

    /// Returns true if the signature on the token verifies using the issuer's public key
    fn is_signed_by(&self, pe: &PkiEnvironment, issuer: &CertificateWithContext) -> bool;

    /// Returns a certificate source derived from the token itself, if any
    fn embedded_certificate_source(
        &self,
        transport: Arc<dyn HttpTransport>,
    ) -> Option<Arc<dyn CertificateSource>>;

    /// Returns the certificate when the token is a certificate
    fn certificate(&self) -> Option<&CertificateWithContext> {
        None
    }

    /// Identifier for the token, i.e., for use in logging and map keys
    fn dss_id(&self) -> String {
        sha256_hex(self.encoded())
    }
}

/// `CertificateToken` is the [`SignedToken`] implementation for certificates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CertificateToken {
    cert: CertificateWithContext,
}

impl CertificateToken {
    /// Creates a new token for the given certificate
    pub fn new(cert: CertificateWithContext) -> Self {
        CertificateToken { cert }
    }
}

impl From<CertificateWithContext> for CertificateToken {
    fn from(cert: CertificateWithContext) -> Self {
        CertificateToken::new(cert)
    }
}

impl SignedToken for CertificateToken {
    fn signer_name(&self) -> &Name {
        self.cert.issuer()
    }

    fn encoded(&self) -> &[u8] {
        &self.cert.encoded_cert
    }

    fn is_signed_by(&self, pe: &PkiEnvironment, issuer: &CertificateWithContext) -> bool {
        if !compare_names(self.cert.issuer(), issuer.subject()) {
            return false;
        }
        verify_signed_with_issuer(pe, &self.cert.encoded_cert, issuer)
    }

    fn embedded_certificate_source(
        &self,
        transport: Arc<dyn HttpTransport>,
    ) -> Option<Arc<dyn CertificateSource>> {
        if self.cert.ca_issuers_uris().is_empty() {
            return None;
        }
        Some(Arc::new(AiaCertificateSource::new(
            self.cert.clone(),
            transport,
        )))
    }

    fn certificate(&self) -> Option<&CertificateWithContext> {
        Some(&self.cert)
    }
}
