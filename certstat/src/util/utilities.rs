//! Utility functions that support certificate status determination

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, error};

use const_oid::db::rfc4519::{
    COMMON_NAME, COUNTRY_NAME, DOMAIN_COMPONENT, LOCALITY_NAME, ORGANIZATIONAL_UNIT_NAME,
    ORGANIZATION_NAME, SERIAL_NUMBER,
};
use der::asn1::ObjectIdentifier;
use der::Decode;
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use subtle_encoding::hex;
use x509_cert::name::Name;
use x509_cert::{Certificate, TbsCertificate};

use crate::environment::pki_environment::PkiEnvironment;
use crate::evidence::signed_token::DeferDecodeSigned;
use crate::util::alg_oids::*;
use crate::util::error::{Error, Result};

/// `get_hash_alg_from_sig_alg` takes an ObjectIdentifier that notionally contains a signature
/// algorithm, i.e., [`PKIXALG_ECDSA_WITH_SHA256`], and returns an AlgorithmIdentifier containing
/// the associated hash algorithm with absent parameters.
pub fn get_hash_alg_from_sig_alg(sig_alg: &ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    let oid = if PKIXALG_SHA256_WITH_RSA_ENCRYPTION == *sig_alg
        || PKIXALG_ECDSA_WITH_SHA256 == *sig_alg
    {
        PKIXALG_SHA256
    } else if PKIXALG_SHA384_WITH_RSA_ENCRYPTION == *sig_alg
        || PKIXALG_ECDSA_WITH_SHA384 == *sig_alg
    {
        PKIXALG_SHA384
    } else if PKIXALG_SHA224_WITH_RSA_ENCRYPTION == *sig_alg
        || PKIXALG_ECDSA_WITH_SHA224 == *sig_alg
    {
        PKIXALG_SHA224
    } else if PKIXALG_SHA512_WITH_RSA_ENCRYPTION == *sig_alg
        || PKIXALG_ECDSA_WITH_SHA512 == *sig_alg
    {
        PKIXALG_SHA512
    } else {
        return Err(Error::Unrecognized);
    };
    Ok(AlgorithmIdentifierOwned {
        oid,
        parameters: None,
    })
}

/// `oid_lookup` takes an ObjectIdentifier and returns a string with a friendly name for the OID or
/// Error::NotFound.
pub fn oid_lookup(oid: &ObjectIdentifier) -> Result<String> {
    let s = match *oid {
        PKIXALG_SHA1 => "SHA1",
        PKIXALG_SHA224 => "SHA224",
        PKIXALG_SHA256 => "SHA256",
        PKIXALG_SHA384 => "SHA384",
        PKIXALG_SHA512 => "SHA512",
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => "SHA224 with RSA Encryption",
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => "SHA256 with RSA Encryption",
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => "SHA384 with RSA Encryption",
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => "SHA512 with RSA Encryption",
        PKIXALG_ECDSA_WITH_SHA224 => "ECDSA with SHA224",
        PKIXALG_ECDSA_WITH_SHA256 => "ECDSA with SHA256",
        PKIXALG_ECDSA_WITH_SHA384 => "ECDSA with SHA384",
        PKIXALG_ECDSA_WITH_SHA512 => "ECDSA with SHA512",
        PKIXALG_RSA_ENCRYPTION => "RSA Encryption",
        PKIXALG_EC_PUBLIC_KEY => "EC Public Key",
        COMMON_NAME => "cn",
        COUNTRY_NAME => "c",
        DOMAIN_COMPONENT => "dc",
        LOCALITY_NAME => "l",
        ORGANIZATION_NAME => "o",
        ORGANIZATIONAL_UNIT_NAME => "ou",
        SERIAL_NUMBER => "serialNumber",
        _ => return Err(Error::NotFound),
    };
    Ok(s.to_string())
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
///
/// Names that differ in encoding are compared using a case-insensitive comparison of their string
/// representations with runs of whitespace collapsed.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    if left == right {
        return true;
    }
    if left.0.len() != right.0.len() {
        return false;
    }
    fn normalize(name: &Name) -> String {
        name_to_string(name)
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join(" ")
    }
    normalize(left) == normalize(right)
}

/// `buffer_to_hex` takes a byte array and returns a string featuring upper case ASCII hex characters
/// (without commas, spaces, or brackets).
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    let r = std::str::from_utf8(hex.as_slice());
    if let Ok(s) = r {
        s.to_string()
    } else {
        "".to_string()
    }
}

/// `sha256_hex` returns the lower case ASCII hex representation of the SHA256 hash of the presented
/// buffer. It is used to derive cache keys from URIs and identifiers for encoded tokens.
pub fn sha256_hex(buffer: &[u8]) -> String {
    let digest = Sha256::digest(buffer);
    let hex = hex::encode(digest.as_slice());
    match std::str::from_utf8(hex.as_slice()) {
        Ok(s) => s.to_string(),
        Err(_e) => "".to_string(),
    }
}

/// `is_http_uri` returns true if the presented URI uses the http or https scheme.
pub fn is_http_uri(uri: &str) -> bool {
    let lower = uri.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// `get_now_as_unix_epoch` returns the current time as seconds since the Unix epoch or 0 if the
/// system clock is set before the epoch.
pub fn get_now_as_unix_epoch() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_e) => 0,
    }
}

/// `valid_at_time` checks the validity period of the presented certificate against the time of
/// interest, expressed as seconds since Unix epoch. Pass 0 to skip the check.
///
/// It returns the number of seconds left to live if the certificate is valid at the given time or
/// [`Error::NotFound`] if it is not.
pub fn valid_at_time(target: &TbsCertificate, toi: u64) -> Result<u64> {
    if 0 == toi {
        return Ok(0);
    }

    let nb = target.validity.not_before.to_unix_duration().as_secs();
    let na = target.validity.not_after.to_unix_duration().as_secs();
    if nb > toi || na < toi {
        debug!(
            "Certificate issued to {} is not valid at {}",
            name_to_string(&target.subject),
            toi
        );
        return Err(Error::NotFound);
    }
    Ok(na - toi)
}

/// `is_self_signed_with_buffer` returns true if the public key in the parsed certificate can be
/// used to verify the TBSCertificate field as parsed from the encoded certificate object.
pub fn is_self_signed_with_buffer(pe: &PkiEnvironment, cert: &Certificate, enc_cert: &[u8]) -> bool {
    match DeferDecodeSigned::from_der(enc_cert) {
        Ok(defer_cert) => {
            let r = pe.verify_signature_message(
                &defer_cert.tbs_field,
                cert.signature.raw_bytes(),
                &cert.tbs_certificate.signature,
                &cert.tbs_certificate.subject_public_key_info,
            );
            r.is_ok()
        }
        Err(e) => {
            error!(
                "Failed to defer decode certificate in is_self_signed with: {}",
                e
            );
            false
        }
    }
}

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// `get_file_as_byte_vec` takes a Path containing a file name and returns a vector of bytes containing
/// the contents of that file or an [Error::StdIoError].
pub fn get_file_as_byte_vec(filename: &Path) -> Result<Vec<u8>> {
    Ok(std::fs::read(filename)?)
}

/// `get_file_as_byte_vec_pem` takes a Path containing a file name and returns a vector of bytes containing
/// the contents of that file or an [Error::StdIoError]. If the file is PEM encoded, it is decoded
/// prior to returning the vector of bytes. To read without PEM, use `get_file_as_byte_vec`.
pub fn get_file_as_byte_vec_pem(filename: &Path) -> Result<Vec<u8>> {
    let b = get_file_as_byte_vec(filename)?;
    match pem_to_der(b) {
        Ok(b) => Ok(b),
        Err(e) => {
            error!("Failed to parse PEM data from {:?}: {:?}", filename, e);
            Err(e)
        }
    }
}

/// `pem_to_der` returns the presented buffer unchanged unless it begins with a PEM encapsulation
/// boundary, in which case the decoded contents are returned.
pub fn pem_to_der(b: Vec<u8>) -> Result<Vec<u8>> {
    if b.first() == Some(&0x2D) {
        return match pem_rfc7468::decode_vec(b.as_slice()) {
            Ok(b) => Ok(b.1),
            Err(_e) => Err(Error::ParseError),
        };
    }
    Ok(b)
}

#[test]
fn get_hash_alg_from_sig_alg_test() {
    assert_eq!(
        PKIXALG_SHA256,
        get_hash_alg_from_sig_alg(&PKIXALG_ECDSA_WITH_SHA256)
            .unwrap()
            .oid
    );
    assert_eq!(
        PKIXALG_SHA384,
        get_hash_alg_from_sig_alg(&PKIXALG_SHA384_WITH_RSA_ENCRYPTION)
            .unwrap()
            .oid
    );
    assert_eq!(
        PKIXALG_SHA512,
        get_hash_alg_from_sig_alg(&PKIXALG_ECDSA_WITH_SHA512)
            .unwrap()
            .oid
    );
    assert!(get_hash_alg_from_sig_alg(&PKIXALG_SHA256).is_err());
}

#[test]
fn names_and_hex() {
    use core::str::FromStr;
    let n1 = Name::from_str("CN=Test CA,O=Example,C=US").unwrap();
    let n2 = Name::from_str("CN=test  ca,O=EXAMPLE,C=US").unwrap();
    let n3 = Name::from_str("CN=Other CA,O=Example,C=US").unwrap();
    assert!(compare_names(&n1, &n1));
    assert!(compare_names(&n1, &n2));
    assert!(!compare_names(&n1, &n3));
    assert_eq!("0A0B", buffer_to_hex(&[0x0a, 0x0b]));
    assert_eq!(
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        sha256_hex(b"abc")
    );
    assert!(is_http_uri("HTTP://example.com/ca.crl"));
    assert!(is_http_uri("https://example.com/ca.crl"));
    assert!(!is_http_uri("ldap://example.com/cn=CA"));
}

#[test]
fn pem_passthrough() {
    let der = vec![0x30, 0x03, 0x02, 0x01, 0x01];
    assert_eq!(der, pem_to_der(der.clone()).unwrap());
    assert_eq!(
        Err(Error::ParseError),
        pem_to_der(b"-----BEGIN garbage".to_vec())
    );
}
