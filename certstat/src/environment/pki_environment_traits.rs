//! The pki_environment_traits module features trait definitions and type definitions for the
//! collaborators used when resolving issuers and determining certificate status.
//!
//! All traits require `Send + Sync` so that a single configured instance can be shared across
//! threads via `Arc`.

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::name::Name;

use crate::evidence::{CertificateStatus, CertificateWithContext};
use crate::source::crl_source::CrlToken;
use crate::source::ocsp_source::OcspToken;
use crate::util::error::*;
use crate::PkiEnvironment;

/// `CalculateHash` provides a function signature for implementations that perform hashing
pub type CalculateHash = fn(
    &PkiEnvironment,
    &AlgorithmIdentifierOwned, // hash alg
    &[u8],                     // buffer to hash
) -> Result<Vec<u8>>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform
/// signature verification over a message.
pub type VerifySignatureMessage = fn(
    &PkiEnvironment,
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `OidLookup` implementations take an OID and returns either a friendly name for the OID or a
/// NotFound error. Where NotFound is returned by all OidLookup implementations, the
/// [`PkiEnvironment`] returns a dot notation version of the OID.
pub type OidLookup = fn(&ObjectIdentifier) -> Result<String>;

/// The [`CertificateSource`] trait enables trait objects to resolve candidate issuer certificates
/// by subject name.
pub trait CertificateSource: Send + Sync {
    /// resolve_issuers returns zero or more certificates whose subject matches the presented name.
    ///
    /// An empty vector is returned when no certificate is found. [`Error::NetworkError`] is
    /// returned by sources that are not best-effort when a network dependency could not be reached.
    fn resolve_issuers(&self, name: &Name) -> Result<Vec<CertificateWithContext>>;
}

/// The [`CrlSource`] trait defines the interface for retrieving a CRL for a certificate.
pub trait CrlSource: Send + Sync {
    /// Returns a CRL covering `cert` issued by `issuer`, if one can be found
    fn find_crl(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<CrlToken>;
}

/// The [`OcspSource`] trait defines the interface for retrieving an OCSP response for a certificate.
pub trait OcspSource: Send + Sync {
    /// Returns an OCSP response pertaining to `cert` issued by `issuer`, if one can be found
    fn get_response(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<OcspToken>;
}

/// The [`CertificateStatusVerifier`] trait is implemented by the CRL and OCSP verifiers (and the
/// combination of the two).
pub trait CertificateStatusVerifier: Send + Sync {
    /// Returns a verdict for `cert` as of `at_time` (seconds since Unix epoch) or None when no
    /// trustworthy evidence is available.
    fn check(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
        at_time: u64,
    ) -> Option<CertificateStatus>;
}

/// The [`HttpTransport`] trait abstracts the HTTP client used to fetch certificates and CRLs and to
/// post OCSP requests. Failures are reported as [`Error::NetworkError`].
pub trait HttpTransport: Send + Sync {
    /// Retrieves the resource at the given URI
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;

    /// Posts body to the given URI with the indicated content type and returns the response body
    fn post(&self, uri: &str, content_type: &str, body: &[u8]) -> Result<Vec<u8>>;
}

/// The [`CheckRemoteResource`] trait defines an interface for tracking remote resources that should
/// not be contacted for a while, i.e., because an earlier attempt failed.
pub trait CheckRemoteResource: Send + Sync {
    /// Returns true if the URI is currently on the blocklist
    fn check_blocklist(&self, uri: &str) -> bool;

    /// Adds the URI to the blocklist
    fn add_to_blocklist(&self, uri: &str);

    /// Removes the URI from the blocklist, i.e., after a successful retrieval
    fn remove_from_blocklist(&self, uri: &str);
}

/// The [`CrlCacheStore`] trait defines a key to blob table used to persist CRLs. Keys are derived
/// by [`CachingCrlSource`](crate::CachingCrlSource).
pub trait CrlCacheStore: Send + Sync {
    /// Returns the CRL stored under the key, if any
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores a CRL under a key that is not yet present
    fn insert(&self, key: &str, crl: &[u8]) -> Result<()>;

    /// Replaces the CRL stored under a key
    fn update(&self, key: &str, crl: &[u8]) -> Result<()>;

    /// Removes all entries
    fn clear(&self);
}

/// The [`NotFoundObserver`] trait is notified when an offline source has no evidence for a
/// certificate. Notifications have no effect on verdicts.
pub trait NotFoundObserver: Send + Sync {
    /// Called when no CRL could be found for the certificate
    fn crl_not_found(&self, _cert: &CertificateWithContext) {}

    /// Called when no OCSP response could be found for the certificate
    fn ocsp_not_found(&self, _cert: &CertificateWithContext) {}
}

/// [`NotFoundObserver`] implementation that ignores all notifications
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotFoundObserver;

impl NotFoundObserver for NoopNotFoundObserver {}
