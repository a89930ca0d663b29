//! Wrapper that binds a certificate to the means by which it was found

use core::cmp::Ordering;
use core::hash::{Hash, Hasher};

use log::error;
use serde::{Deserialize, Serialize};

use const_oid::db::rfc5912::{ID_AD_CA_ISSUERS, ID_AD_OCSP};
use const_oid::AssociatedOid;
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{
    AuthorityInfoAccessSyntax, BasicConstraints, CertificatePolicies, CrlDistributionPoints,
    ExtendedKeyUsage, KeyUsage,
};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::util::error::{Error, Result};
use crate::util::utilities::{is_http_uri, name_to_string, pem_to_der};

/// `CertificateSourceType` indicates how a certificate was found.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum CertificateSourceType {
    /// Found in a trusted list
    TrustedList,
    /// Found in a local trust store
    TrustStore,
    /// Carried in a signature or other signed structure
    Signature,
    /// Downloaded from an Authority Information Access caIssuers location
    Aia,
    /// Found by other means
    Other,
}

impl core::fmt::Display for CertificateSourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            CertificateSourceType::TrustedList => "TrustedList",
            CertificateSourceType::TrustStore => "TrustStore",
            CertificateSourceType::Signature => "Signature",
            CertificateSourceType::Aia => "AIA",
            CertificateSourceType::Other => "Other",
        };
        write!(f, "{}", s)
    }
}

/// [`CertificateWithContext`] aggregates a binary DER-encoded Certificate, the decoded Certificate,
/// the [`CertificateSourceType`] describing where it was found and an optional opaque context value,
/// i.e., the trusted list entry that contributed the certificate.
///
/// Equality, ordering and hashing consider only the encoded certificate, so two occurrences of a
/// certificate found via different sources compare as equal.
#[derive(Clone, Debug)]
#[readonly::make]
pub struct CertificateWithContext {
    /// Binary, encoded Certificate object
    #[readonly]
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    #[readonly]
    pub decoded_cert: Certificate,
    /// Where the certificate was found
    #[readonly]
    pub source_type: CertificateSourceType,
    /// Optional source-specific context
    #[readonly]
    pub context: Option<String>,
}

impl CertificateWithContext {
    /// Parses a DER or PEM encoded certificate and binds it to the given source type.
    pub fn new(
        enc_cert: &[u8],
        source_type: CertificateSourceType,
        context: Option<String>,
    ) -> Result<Self> {
        let encoded_cert = pem_to_der(enc_cert.to_vec())?;
        let decoded_cert = match Certificate::from_der(&encoded_cert) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to parse certificate: {}", e);
                return Err(Error::Asn1Error(e));
            }
        };
        Ok(CertificateWithContext {
            encoded_cert,
            decoded_cert,
            source_type,
            context,
        })
    }

    /// Encodes a decoded certificate and binds it to the given source type.
    pub fn from_certificate(
        cert: Certificate,
        source_type: CertificateSourceType,
        context: Option<String>,
    ) -> Result<Self> {
        let encoded_cert = cert.to_der()?;
        Ok(CertificateWithContext {
            encoded_cert,
            decoded_cert: cert,
            source_type,
            context,
        })
    }

    /// Returns a copy of this certificate bound to a different source type and context.
    pub fn with_source(&self, source_type: CertificateSourceType, context: Option<String>) -> Self {
        CertificateWithContext {
            encoded_cert: self.encoded_cert.clone(),
            decoded_cert: self.decoded_cert.clone(),
            source_type,
            context,
        }
    }

    /// Subject name of the certificate
    pub fn subject(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.subject
    }

    /// Issuer name of the certificate
    pub fn issuer(&self) -> &Name {
        &self.decoded_cert.tbs_certificate.issuer
    }

    /// Serial number of the certificate
    pub fn serial_number(&self) -> &SerialNumber {
        &self.decoded_cert.tbs_certificate.serial_number
    }

    /// Subject name of the certificate as a string
    pub fn subject_string(&self) -> String {
        name_to_string(self.subject())
    }

    /// Returns true if an extension with the given OID is present.
    pub fn has_extension(&self, oid: &ObjectIdentifier) -> bool {
        match &self.decoded_cert.tbs_certificate.extensions {
            Some(exts) => exts.iter().any(|e| e.extn_id == *oid),
            None => false,
        }
    }

    /// Returns the decoded extension of type T, if present. Decoding failures are logged and
    /// treated as an absent extension.
    pub fn get_extension<'a, T>(&'a self) -> Option<T>
    where
        T: Decode<'a> + AssociatedOid,
    {
        match self.decoded_cert.tbs_certificate.get::<T>() {
            Ok(Some((_critical, ext))) => Some(ext),
            Ok(None) => None,
            Err(_e) => {
                error!(
                    "Failed to decode extension {} from certificate issued to {}",
                    T::OID,
                    self.subject_string()
                );
                None
            }
        }
    }

    /// Key usage extension, if present
    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.get_extension::<KeyUsage>()
    }

    /// Key purposes from the extended key usage extension, if present
    pub fn extended_key_usage(&self) -> Option<Vec<ObjectIdentifier>> {
        self.get_extension::<ExtendedKeyUsage>().map(|eku| eku.0)
    }

    /// Basic constraints extension, if present
    pub fn basic_constraints(&self) -> Option<BasicConstraints> {
        self.get_extension::<BasicConstraints>()
    }

    /// Policy identifiers from the certificate policies extension, if present
    pub fn policy_oids(&self) -> Vec<ObjectIdentifier> {
        match self.get_extension::<CertificatePolicies>() {
            Some(cps) => cps.0.iter().map(|p| p.policy_identifier).collect(),
            None => vec![],
        }
    }

    /// Returns http and https URIs from the authority information access extension for the given
    /// access method.
    fn aia_uris(&self, access_method: &ObjectIdentifier) -> Vec<String> {
        let mut uris = vec![];
        if let Some(aia) = self.get_extension::<AuthorityInfoAccessSyntax>() {
            for ad in &aia.0 {
                if ad.access_method != *access_method {
                    continue;
                }
                if let GeneralName::UniformResourceIdentifier(uri) = &ad.access_location {
                    let s = uri.to_string();
                    if is_http_uri(&s) && !uris.contains(&s) {
                        uris.push(s);
                    }
                }
            }
        }
        uris
    }

    /// caIssuers URIs that use http or https
    pub fn ca_issuers_uris(&self) -> Vec<String> {
        self.aia_uris(&ID_AD_CA_ISSUERS)
    }

    /// OCSP responder URIs that use http or https
    pub fn ocsp_uris(&self) -> Vec<String> {
        self.aia_uris(&ID_AD_OCSP)
    }

    /// Distribution points from the CRL distribution points extension, if present
    pub fn crl_distribution_points(&self) -> Vec<DistributionPoint> {
        match self.get_extension::<CrlDistributionPoints>() {
            Some(dps) => dps.0,
            None => vec![],
        }
    }

    /// Full name URIs from the CRL distribution points extension. Name relative to CRL issuer
    /// forms are ignored. No scheme filtering is applied.
    pub fn crl_dp_uris(&self) -> Vec<String> {
        let mut uris = vec![];
        for dp in self.crl_distribution_points() {
            if let Some(DistributionPointName::FullName(gns)) = &dp.distribution_point {
                for gn in gns {
                    if let GeneralName::UniformResourceIdentifier(uri) = gn {
                        let s = uri.to_string();
                        if !uris.contains(&s) {
                            uris.push(s);
                        }
                    }
                }
            }
        }
        uris
    }
}

impl PartialEq for CertificateWithContext {
    fn eq(&self, other: &Self) -> bool {
        self.encoded_cert == other.encoded_cert
    }
}

impl Eq for CertificateWithContext {}

impl Hash for CertificateWithContext {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded_cert.hash(state);
    }
}

impl PartialOrd for CertificateWithContext {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CertificateWithContext {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encoded_cert.cmp(&other.encoded_cert)
    }
}

impl TryFrom<&[u8]> for CertificateWithContext {
    type Error = Error;

    fn try_from(enc_cert: &[u8]) -> Result<Self> {
        CertificateWithContext::new(enc_cert, CertificateSourceType::Other, None)
    }
}
