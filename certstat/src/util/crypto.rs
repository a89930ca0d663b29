//! Provides implementations of crypto-related [`PkiEnvironment`] interfaces using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project for support.

use der::{asn1::ObjectIdentifier, Encode};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::environment::pki_environment::PkiEnvironment;
use crate::util::alg_oids::*;
use crate::util::error::{Error, Result};
use crate::util::logging::{log_message, PeLogLevels};
use crate::util::utilities::get_hash_alg_from_sig_alg;

/// is_rsa returns true is the presented OID is one of [`PKIXALG_SHA224_WITH_RSA_ENCRYPTION`],
/// [`PKIXALG_SHA256_WITH_RSA_ENCRYPTION`], [`PKIXALG_SHA384_WITH_RSA_ENCRYPTION`] or
/// [`PKIXALG_SHA512_WITH_RSA_ENCRYPTION`] and false otherwise.
pub(crate) fn is_rsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_SHA256_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA384_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA224_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA512_WITH_RSA_ENCRYPTION
}

/// is_ecdsa returns true is the presented OID is one of [`PKIXALG_ECDSA_WITH_SHA224`],
/// [`PKIXALG_ECDSA_WITH_SHA256`], [`PKIXALG_ECDSA_WITH_SHA384`] or [`PKIXALG_ECDSA_WITH_SHA512`] and false otherwise.
pub(crate) fn is_ecdsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_ECDSA_WITH_SHA256
        || *oid == PKIXALG_ECDSA_WITH_SHA384
        || *oid == PKIXALG_ECDSA_WITH_SHA224
        || *oid == PKIXALG_ECDSA_WITH_SHA512
}

/// calculate_hash_rust_crypto implements the [`CalculateHash`](crate::CalculateHash) interface for
/// [`PkiEnvironment`] using implementations from the Rust Crypto project.
///
/// It supports [`PKIXALG_SHA1`], [`PKIXALG_SHA224`], [`PKIXALG_SHA256`], [`PKIXALG_SHA384`] and
/// [`PKIXALG_SHA512`]. SHA-1 is included because OCSP certificate identifiers are computed with it.
pub fn calculate_hash_rust_crypto(
    _pe: &PkiEnvironment,
    hash_alg: &AlgorithmIdentifierOwned,
    buffer_to_hash: &[u8],
) -> Result<Vec<u8>> {
    match hash_alg.oid {
        PKIXALG_SHA1 => Ok(Sha1::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA224 => Ok(Sha224::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA256 => Ok(Sha256::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA384 => Ok(Sha384::digest(buffer_to_hash).to_vec()),
        PKIXALG_SHA512 => Ok(Sha512::digest(buffer_to_hash).to_vec()),
        _ => Err(Error::Unrecognized),
    }
}

fn get_named_curve_parameter(alg_id: &AlgorithmIdentifierOwned) -> Result<ObjectIdentifier> {
    if let Some(params) = &alg_id.parameters {
        if let Ok(oid) = params.decode_as::<ObjectIdentifier>() {
            return Ok(oid);
        }
    }
    Err(Error::ParseError)
}

fn verify_rsa(
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    use rsa::pkcs1v15::{Signature, VerifyingKey};

    let enc_spki = spki.to_der()?;
    let rsa = match RsaPublicKey::from_public_key_der(&enc_spki) {
        Ok(rsa) => rsa,
        Err(_e) => return Err(Error::ParseError),
    };
    let s = match Signature::try_from(signature) {
        Ok(s) => s,
        Err(_e) => return Err(Error::ParseError),
    };

    let r = match signature_alg.oid {
        PKIXALG_SHA224_WITH_RSA_ENCRYPTION => {
            VerifyingKey::<Sha224>::new(rsa).verify(message_to_verify, &s)
        }
        PKIXALG_SHA256_WITH_RSA_ENCRYPTION => {
            VerifyingKey::<Sha256>::new(rsa).verify(message_to_verify, &s)
        }
        PKIXALG_SHA384_WITH_RSA_ENCRYPTION => {
            VerifyingKey::<Sha384>::new(rsa).verify(message_to_verify, &s)
        }
        PKIXALG_SHA512_WITH_RSA_ENCRYPTION => {
            VerifyingKey::<Sha512>::new(rsa).verify(message_to_verify, &s)
        }
        _ => return Err(Error::Unrecognized),
    };
    r.map_err(|_e| Error::SignatureVerificationFailure)
}

/// verify_signature_message_rust_crypto implements the
/// [`VerifySignatureMessage`](crate::VerifySignatureMessage) interface for [`PkiEnvironment`] using
/// implementations from the [Rust Crypto](https://github.com/RustCrypto) project.
///
/// RSA PKCS #1 v1.5 signatures and ECDSA signatures on the P256 and P384 curves are supported. ECDSA
/// verification is performed over a digest computed using the hash algorithm implied by the
/// signature algorithm, so ecdsa-with-SHA384 on P256 and similar pairings work as expected.
pub fn verify_signature_message_rust_crypto(
    pe: &PkiEnvironment,
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    if is_rsa(&signature_alg.oid) {
        return verify_rsa(message_to_verify, signature, signature_alg, spki);
    } else if is_ecdsa(&signature_alg.oid) {
        let named_curve = get_named_curve_parameter(&spki.algorithm)?;
        let hash_alg = get_hash_alg_from_sig_alg(&signature_alg.oid)?;
        let digest = calculate_hash_rust_crypto(pe, &hash_alg, message_to_verify)?;

        let r = match named_curve {
            PKIXALG_SECP256R1 => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
                    .map_err(|_e| Error::ParseError)?;
                let s = p256::ecdsa::Signature::from_der(signature).map_err(|_e| Error::ParseError)?;
                key.verify_prehash(&digest, &s)
            }
            PKIXALG_SECP384R1 => {
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes())
                    .map_err(|_e| Error::ParseError)?;
                let s = p384::ecdsa::Signature::from_der(signature).map_err(|_e| Error::ParseError)?;
                key.verify_prehash(&digest, &s)
            }
            _ => {
                log_message(
                    &PeLogLevels::PeError,
                    format!("Unrecognized or unsupported named curve: {}", named_curve).as_str(),
                );
                return Err(Error::Unrecognized);
            }
        };
        return r.map_err(|_e| Error::SignatureVerificationFailure);
    }
    log_message(
        &PeLogLevels::PeError,
        format!("Unrecognized signature algorithm: {}", signature_alg.oid).as_str(),
    );
    Err(Error::Unrecognized)
}

#[test]
fn test_calculate_hash() {
    use hex_literal::hex;
    let mut pe = PkiEnvironment::default();
    pe.clear_all_callbacks();
    pe.add_calculate_hash_callback(calculate_hash_rust_crypto);

    let hash_algorithm = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA256,
        parameters: None,
    };
    let result = pe.calculate_hash(&hash_algorithm, "abc".as_bytes()).unwrap();
    assert_eq!(
        result,
        hex!("BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD")
    );

    let hash_algorithm = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA1,
        parameters: None,
    };
    let result = pe.calculate_hash(&hash_algorithm, "abc".as_bytes()).unwrap();
    assert_eq!(result, hex!("A9993E364706816ABA3E25717850C26C9CD0D89D"));

    let unknown = AlgorithmIdentifierOwned {
        oid: PKIXALG_EC_PUBLIC_KEY,
        parameters: None,
    };
    assert_eq!(
        Err(Error::Unrecognized),
        pe.calculate_hash(&unknown, "abc".as_bytes())
    );
}

#[test]
fn test_verify_signature_message_p256() {
    use der::Decode;
    use p256::ecdsa::{signature::Signer, Signature, SigningKey};
    use p256::pkcs8::EncodePublicKey;

    let mut pe = PkiEnvironment::default();
    pe.clear_all_callbacks();
    pe.add_verify_signature_message_callback(verify_signature_message_rust_crypto);

    let signing_key = SigningKey::from_slice(&[0x11; 32]).unwrap();
    let spki_der = signing_key
        .verifying_key()
        .to_public_key_der()
        .unwrap()
        .to_vec();
    let spki = SubjectPublicKeyInfoOwned::from_der(&spki_der).unwrap();
    assert_eq!(
        PKIXALG_SECP256R1,
        get_named_curve_parameter(&spki.algorithm).unwrap()
    );

    let sig_alg = AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    };
    let msg = b"revocation status";
    let sig: Signature = signing_key.sign(msg);
    let sig_der = sig.to_der();
    assert!(pe
        .verify_signature_message(msg, sig_der.as_bytes(), &sig_alg, &spki)
        .is_ok());
    assert_eq!(
        Err(Error::SignatureVerificationFailure),
        pe.verify_signature_message(b"something else", sig_der.as_bytes(), &sig_alg, &spki)
    );
}
