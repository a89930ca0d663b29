//! Error types

use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Error type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// Unrecognized occurs when an error conditions does not match anything else here.
    Unrecognized,
    /// A URI scheme was encountered that was not valid in given context, i.e., ldap URI presented to OCSP
    InvalidUriScheme,
    /// An artifact could not be parsed
    ParseError,
    /// A CRL was found to be incompatible with the certificate whose revocation status is sought.
    CrlIncompatible,
    /// A networking issue occurred.
    NetworkError,
    /// A URI was not contacted because it is on the blocklist.
    UriOnBlocklist,
    /// An error occurred processing an OCSP response
    OcspResponseError,
    /// A signature did not verify using the presented public key
    SignatureVerificationFailure,
    /// An issuer lacks the key usage necessary to sign the artifact, i.e., cRLSign for a CRL
    InvalidKeyUsage,
    /// Revocation evidence of a type that cannot be associated with the target token was presented
    InvalidEvidence,
    /// A required collaborator, i.e., transport or cache store, was not configured
    Misconfiguration,
    /// Asn1Error is used to propagate error information from the x509 crate.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    StdIoError(std::io::ErrorKind),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => write!(f, "NotFound"),
            Error::Unrecognized => write!(f, "Unrecognized"),
            Error::InvalidUriScheme => write!(f, "InvalidUriScheme"),
            Error::ParseError => write!(f, "ParseError"),
            Error::CrlIncompatible => write!(f, "CrlIncompatible"),
            Error::NetworkError => write!(f, "NetworkError"),
            Error::UriOnBlocklist => write!(f, "UriOnBlocklist"),
            Error::OcspResponseError => write!(f, "OcspResponseError"),
            Error::SignatureVerificationFailure => write!(f, "SignatureVerificationFailure"),
            Error::InvalidKeyUsage => write!(f, "InvalidKeyUsage"),
            Error::InvalidEvidence => write!(f, "InvalidEvidence"),
            Error::Misconfiguration => write!(f, "Misconfiguration"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            Error::StdIoError(err) => write!(f, "StdError: {:?}", err),
        }
    }
}

impl std::error::Error for Error {}

#[test]
fn error_test() {
    assert_eq!("NotFound", format!("{}", Error::NotFound));
    assert_eq!("NetworkError", format!("{}", Error::NetworkError));
    assert_eq!("InvalidEvidence", format!("{}", Error::InvalidEvidence));
    assert_eq!("Misconfiguration", format!("{}", Error::Misconfiguration));
    let _s = format!("{}", Error::Unrecognized);
    let _s = format!("{}", Error::InvalidUriScheme);
    let _s = format!("{}", Error::ParseError);
    let _s = format!("{}", Error::CrlIncompatible);
    let _s = format!("{}", Error::OcspResponseError);
    let _s = format!("{}", Error::SignatureVerificationFailure);
    let _s = format!("{}", Error::InvalidKeyUsage);
    let e: Error = std::io::Error::from(std::io::ErrorKind::NotFound).into();
    assert_eq!(Error::StdIoError(std::io::ErrorKind::NotFound), e);
}
