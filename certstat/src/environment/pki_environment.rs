//! PkiEnvironment aggregates a set of function pointers that supply the cryptographic functionality
//! used when verifying signatures on certificates, CRLs and OCSP responses.
//!
//! The sample below illustrates preparation of a PkiEnvironment object for use by the status
//! verifiers.
//! ```
//! use certstat::*;
//!
//! // the default PkiEnvironment uses `oid_lookup` to look up friendly names for OIDs
//! let mut pe = PkiEnvironment::default();
//!
//! // add basic hashing and signature verification capabilities
//! populate_default_pki_environment(&mut pe);
//! ```
//!
//! The aggregation of function pointers allows for implementations of features to vary, i.e., an
//! app may add a verification callback backed by a hardware module ahead of the default callbacks.

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::{environment::pki_environment_traits::*, util::crypto::*, util::error::*, util::utilities::oid_lookup};

/// [`PkiEnvironment`] provides a switchboard of callback functions that allow support to vary on
/// different platforms or to allow support to be tailored for specific use cases.
#[derive(Clone)]
pub struct PkiEnvironment {
    /// List of functions that provide a message digest functionality
    calculate_hash_callbacks: Vec<CalculateHash>,

    /// List of functions that provide a signature verification functionality given a message
    verify_signature_message_callbacks: Vec<VerifySignatureMessage>,

    /// List of functions that provide OID lookup capabilities
    oid_lookups: Vec<OidLookup>,
}

impl Default for PkiEnvironment {
    /// PkiEnvironment::default returns a new [`PkiEnvironment`] with empty callback vectors for each
    /// type of callback except `oid_lookups`, which features the [`oid_lookup`] function.
    fn default() -> Self {
        PkiEnvironment {
            calculate_hash_callbacks: vec![],
            verify_signature_message_callbacks: vec![],
            oid_lookups: vec![oid_lookup],
        }
    }
}

impl PkiEnvironment {
    /// PkiEnvironment::new returns a new [`PkiEnvironment`] with empty callback vectors for each type of callback
    pub fn new() -> PkiEnvironment {
        PkiEnvironment {
            calculate_hash_callbacks: vec![],
            verify_signature_message_callbacks: vec![],
            oid_lookups: vec![],
        }
    }

    /// clear_all_callbacks clears the contents of all function pointer vectors.
    pub fn clear_all_callbacks(&mut self) {
        self.calculate_hash_callbacks.clear();
        self.verify_signature_message_callbacks.clear();
        self.oid_lookups.clear();
    }

    /// add_calculate_hash_callback adds a [`CalculateHash`] callback to the list used by calculate_hash.
    pub fn add_calculate_hash_callback(&mut self, c: CalculateHash) {
        self.calculate_hash_callbacks.push(c);
    }

    /// clear_calculate_hash_callbacks clears the list of [`CalculateHash`] callbacks used by calculate_hash.
    pub fn clear_calculate_hash_callbacks(&mut self) {
        self.calculate_hash_callbacks.clear();
    }

    /// calculate_hash iterates over calculate_hash_callbacks until an authoritative answer is found
    /// or all options have been exhausted
    pub fn calculate_hash(
        &self,
        hash_alg: &AlgorithmIdentifierOwned,
        buffer_to_hash: &[u8],
    ) -> Result<Vec<u8>> {
        for f in &self.calculate_hash_callbacks {
            if let Ok(r) = f(self, hash_alg, buffer_to_hash) {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_verify_signature_message_callback adds a [`VerifySignatureMessage`] callback to the list used by verify_signature_message.
    pub fn add_verify_signature_message_callback(&mut self, c: VerifySignatureMessage) {
        self.verify_signature_message_callbacks.push(c);
    }

    /// clear_verify_signature_message_callbacks clears the list of [`VerifySignatureMessage`] callbacks used by verify_signature_message.
    pub fn clear_verify_signature_message_callbacks(&mut self) {
        self.verify_signature_message_callbacks.clear();
    }

    /// verify_signature_message iterates over verify_signature_message_callbacks until an authoritative answer is found
    /// or all options have been exhausted.
    ///
    /// When no callback succeeds, the most specific error is returned, i.e., a callback that recognized
    /// the algorithm but failed to verify the signature yields [`Error::SignatureVerificationFailure`].
    pub fn verify_signature_message(
        &self,
        message_to_verify: &[u8],                 // buffer to verify
        signature: &[u8],                         // signature
        signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
        spki: &SubjectPublicKeyInfoOwned,         // public key
    ) -> Result<()> {
        let mut err = Error::Unrecognized;
        for f in &self.verify_signature_message_callbacks {
            match f(self, message_to_verify, signature, signature_alg, spki) {
                Ok(r) => return Ok(r),
                Err(Error::Unrecognized) => {}
                Err(e) => err = e,
            }
        }
        Err(err)
    }

    /// add_oid_lookup adds a oid_lookup callback to the list used by oid_lookup.
    pub fn add_oid_lookup(&mut self, c: OidLookup) {
        self.oid_lookups.push(c);
    }

    /// clear_oid_lookups clears the list of oid_lookup callbacks used by oid_lookup.
    pub fn clear_oid_lookups(&mut self) {
        self.oid_lookups.clear();
    }

    /// oid_lookup takes an [`ObjectIdentifier`] and returns either a friendly name for the OID or the
    /// OID represented in dot notation.
    pub fn oid_lookup(&self, oid: &ObjectIdentifier) -> String {
        for f in &self.oid_lookups {
            if let Ok(r) = f(oid) {
                return r;
            }
        }
        oid.to_string()
    }
}

/// `populate_default_pki_environment` populates a [`PkiEnvironment`] instance with the default set
/// of callback functions.
///
/// The following callbacks are added:
/// - [`calculate_hash_rust_crypto`]
/// - [`verify_signature_message_rust_crypto`]
///
/// [`oid_lookup`] is added if OID lookup support is absent.
pub fn populate_default_pki_environment(pe: &mut PkiEnvironment) {
    pe.add_calculate_hash_callback(calculate_hash_rust_crypto);
    pe.add_verify_signature_message_callback(verify_signature_message_rust_crypto);
    if pe.oid_lookups.is_empty() {
        pe.add_oid_lookup(oid_lookup);
    }
}

#[test]
fn oid_lookup_fallback() {
    use crate::util::alg_oids::*;
    let mut pe = PkiEnvironment::default();
    assert_eq!("SHA256", pe.oid_lookup(&PKIXALG_SHA256));
    pe.clear_oid_lookups();
    assert_eq!("2.16.840.1.101.3.4.2.1", pe.oid_lookup(&PKIXALG_SHA256));

    let mut pe = PkiEnvironment::new();
    populate_default_pki_environment(&mut pe);
    assert_eq!("ECDSA with SHA256", pe.oid_lookup(&PKIXALG_ECDSA_WITH_SHA256));
}
