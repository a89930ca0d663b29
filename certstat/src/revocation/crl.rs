//! Structures and functions to determine certificate status using CRLs

use std::sync::Arc;

use log::{debug, error, info};

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_CERTIFICATE_ISSUER, ID_CE_CRL_NUMBER, ID_CE_CRL_REASONS,
    ID_CE_DELTA_CRL_INDICATOR, ID_CE_FRESHEST_CRL, ID_CE_HOLD_INSTRUCTION_CODE,
    ID_CE_INVALIDITY_DATE, ID_CE_ISSUING_DISTRIBUTION_POINT,
};
use der::Decode;
use x509_cert::crl::{CertificateList, RevokedCert};
use x509_cert::ext::pkix::crl::CrlReason;
use x509_cert::ext::pkix::{CrlNumber, KeyUsages};
use x509_cert::ext::Extensions;
use x509_cert::serial_number::SerialNumber;

use crate::environment::pki_environment::PkiEnvironment;
use crate::environment::pki_environment_traits::{CertificateStatusVerifier, CrlSource};
use crate::evidence::cert_with_context::CertificateWithContext;
use crate::evidence::certificate_status::{CertificateStatus, CertificateValidity};
use crate::evidence::revocation_data::RevocationEvidence;
use crate::evidence::signed_token::verify_signed_with_issuer;
use crate::source::crl_source::CrlToken;
use crate::util::error::{Error, Result};
use crate::util::utilities::{compare_names, name_to_string};

/// check_crl_sign returns Ok if the certificate features a key usage extension that asserts
/// cRLSign and [`Error::InvalidKeyUsage`] otherwise.
pub fn check_crl_sign(cert: &CertificateWithContext) -> Result<()> {
    match cert.key_usage() {
        Some(ku) => {
            if ku.0.contains(KeyUsages::CRLSign) {
                Ok(())
            } else {
                error!("crlSign is not set in key usage extension");
                Err(Error::InvalidKeyUsage)
            }
        }
        None => {
            error!(
                "key usage extension is missing or could not be parsed from certificate issued to {}",
                cert.subject_string()
            );
            Err(Error::InvalidKeyUsage)
        }
    }
}

/// check_crl_validity returns [`Error::CrlIncompatible`] if the CRL's nextUpdate is earlier than
/// the time of interest. An absent nextUpdate is treated as current. A CRL whose thisUpdate is
/// later than the time of interest is accepted. Pass 0 to skip the check.
pub fn check_crl_validity(toi: u64, crl: &CertificateList) -> Result<()> {
    if 0 != toi {
        let tu = crl.tbs_cert_list.this_update.to_unix_duration().as_secs();
        if tu > toi {
            debug!(
                "CRL from {} has this update time ({}) later than time of interest ({})",
                name_to_string(&crl.tbs_cert_list.issuer),
                tu,
                toi
            );
        }
        if let Some(nu) = crl.tbs_cert_list.next_update {
            let nu = nu.to_unix_duration().as_secs();
            if nu < toi {
                info!(
                    "Discarding CRL from {} as having next update time ({}) earlier than time of interest ({})",
                    name_to_string(&crl.tbs_cert_list.issuer),
                    nu,
                    toi
                );
                return Err(Error::CrlIncompatible);
            }
        }
    }
    Ok(())
}

/// check_crl_extensions returns [`Error::CrlIncompatible`] if any unsupported critical extension is
/// present in the CRL.
fn check_crl_extensions(exts: &Option<Extensions>) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_ISSUING_DISTRIBUTION_POINT,
        ID_CE_DELTA_CRL_INDICATOR,
        ID_CE_FRESHEST_CRL,
        ID_CE_CRL_NUMBER,
        ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ];
    if let Some(exts) = exts {
        for e in exts {
            if e.critical && !exts_to_ignore.contains(&e.extn_id) {
                return Err(Error::CrlIncompatible);
            }
        }
    }
    Ok(())
}

/// check_entry_extensions inspects the extensions in a CRL entry. Invalidity date and reasons are
/// informational, so presence is fine. Hold instruction is ignored with the corresponding
/// certificate treated as revoked. Presence of any other critical extension is cause to discard the
/// CRL.
fn check_entry_extensions(rc: &RevokedCert) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_INVALIDITY_DATE,
        ID_CE_CRL_REASONS,
        ID_CE_HOLD_INSTRUCTION_CODE,
    ];
    if let Some(exts) = &rc.crl_entry_extensions {
        for e in exts {
            if e.critical && !exts_to_ignore.contains(&e.extn_id) {
                return Err(Error::CrlIncompatible);
            }
        }
    }
    Ok(())
}

/// certificate_issuer_extension_present returns true if a certificate issuer extension is found
/// in the presented RevokedCert instance and false otherwise.
fn certificate_issuer_extension_present(rc: &RevokedCert) -> bool {
    if let Some(exts) = &rc.crl_entry_extensions {
        for e in exts {
            if e.extn_id == ID_CE_CERTIFICATE_ISSUER {
                return true;
            }
        }
    }
    false
}

/// get_reason_code returns the reason from the reasonCode entry extension, if present
pub fn get_reason_code(rc: &RevokedCert) -> Option<CrlReason> {
    if let Some(exts) = &rc.crl_entry_extensions {
        for e in exts {
            if e.extn_id == ID_CE_CRL_REASONS {
                match CrlReason::from_der(e.extn_value.as_bytes()) {
                    Ok(reason) => return Some(reason),
                    Err(e) => {
                        debug!("Failed to parse reasonCode extension: {}", e);
                        return None;
                    }
                }
            }
        }
    }
    None
}

/// get_crl_number returns the content octets of the CRL number extension, if present
pub fn get_crl_number(crl: &CertificateList) -> Option<Vec<u8>> {
    if let Some(exts) = &crl.tbs_cert_list.crl_extensions {
        for e in exts {
            if e.extn_id == ID_CE_CRL_NUMBER {
                match CrlNumber::from_der(e.extn_value.as_bytes()) {
                    Ok(num) => return Some(num.0.as_bytes().to_vec()),
                    Err(e) => {
                        debug!("Failed to parse CRL number extension: {}", e);
                        return None;
                    }
                }
            }
        }
    }
    None
}

/// find_revoked_cert returns the entry for the serial number, if any
pub fn find_revoked_cert<'a>(
    crl: &'a CertificateList,
    serial_number: &SerialNumber,
) -> Option<&'a RevokedCert> {
    match &crl.tbs_cert_list.revoked_certificates {
        Some(rcs) => rcs
            .iter()
            .find(|rc| rc.serial_number.as_bytes() == serial_number.as_bytes()),
        None => None,
    }
}

/// verify_crl returns Ok if the CRL was issued by `issuer`: the names match, the signature verifies
/// using the issuer's public key and the issuer's key usage extension asserts cRLSign.
pub fn verify_crl(
    pe: &PkiEnvironment,
    token: &CrlToken,
    issuer: &CertificateWithContext,
) -> Result<()> {
    if !compare_names(&token.crl.tbs_cert_list.issuer, issuer.subject()) {
        info!(
            "CRL issued by {} does not match issuer {}",
            name_to_string(&token.crl.tbs_cert_list.issuer),
            issuer.subject_string()
        );
        return Err(Error::CrlIncompatible);
    }

    if !verify_signed_with_issuer(pe, &token.encoded, issuer) {
        error!(
            "CRL signature verification error for CRL issued by {}",
            issuer.subject_string()
        );
        return Err(Error::SignatureVerificationFailure);
    }

    check_crl_sign(issuer)
}

/// `CrlCertificateVerifier` renders a verdict using a CRL obtained from a [`CrlSource`].
#[derive(Clone)]
pub struct CrlCertificateVerifier {
    pe: PkiEnvironment,
    source: Option<Arc<dyn CrlSource>>,
}

impl CrlCertificateVerifier {
    /// Creates a verifier that consults the given source
    pub fn new(pe: PkiEnvironment, source: Option<Arc<dyn CrlSource>>) -> Self {
        CrlCertificateVerifier { pe, source }
    }
}

impl CertificateStatusVerifier for CrlCertificateVerifier {
    fn check(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
        at_time: u64,
    ) -> Option<CertificateStatus> {
        let source = self.source.as_ref()?;
        let token = source.find_crl(cert, issuer)?;

        if let Err(e) = verify_crl(&self.pe, &token, issuer) {
            info!(
                "Discarding CRL for certificate issued to {}: {:?}",
                cert.subject_string(),
                e
            );
            return None;
        }
        if check_crl_validity(at_time, &token.crl).is_err() {
            return None;
        }
        if check_crl_extensions(&token.crl.tbs_cert_list.crl_extensions).is_err() {
            error!("CRL contains unsupported critical extension");
            return None;
        }

        let issuance_time = token.this_update();
        let crl_number = get_crl_number(&token.crl);
        let evidence = RevocationEvidence::Crl(token.encoded.clone());

        let status = match find_revoked_cert(&token.crl, cert.serial_number()) {
            Some(rc) => {
                if certificate_issuer_extension_present(rc) {
                    error!("CRL entry contains certificate issuer extension, which is not supported");
                    return None;
                }
                if check_entry_extensions(rc).is_err() {
                    error!("CRL entry contains unsupported critical extension");
                    return None;
                }
                let rd = rc.revocation_date.to_unix_duration().as_secs();
                if rd > at_time {
                    debug!(
                        "Certificate issued to {} was revoked at {}, after {}",
                        cert.subject_string(),
                        rd,
                        at_time
                    );
                    CertificateStatus::new(
                        cert,
                        issuer,
                        at_time,
                        CertificateValidity::Valid,
                        evidence,
                        issuance_time,
                        None,
                        None,
                    )
                } else {
                    CertificateStatus::new(
                        cert,
                        issuer,
                        at_time,
                        CertificateValidity::Revoked,
                        evidence,
                        issuance_time,
                        Some(rd),
                        get_reason_code(rc),
                    )
                }
            }
            None => CertificateStatus::new(
                cert,
                issuer,
                at_time,
                CertificateValidity::Valid,
                evidence,
                issuance_time,
                None,
                None,
            ),
        };
        info!(
            "Determined revocation status ({}) using CRL for certificate issued to {}",
            status.validity,
            cert.subject_string()
        );
        Some(status.with_crl_number(crl_number))
    }
}
