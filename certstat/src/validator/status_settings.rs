//! Structures and functions related to configuring certificate status determination

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Result as SerdeResult;

use pkiprocmacros::*;

use crate::util::error::{Error, Result};
use crate::util::utilities::{get_file_as_byte_vec, get_now_as_unix_epoch};

/// `StatusSettings` is a typedef for a `BTreeMap` that maps arbitrary string values to a
/// variant map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSettings(pub BTreeMap<String, StatusSettingTypes>);

impl StatusSettings {
    /// Creates a new empty [`StatusSettings`]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `StatusSettingTypes` is used to define a variant map with types associated with determining
/// the status of certificates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusSettingTypes {
    /// Represents bool values
    Bool(bool),
    /// Represents u8 values
    U8(u8),
    /// Represents u64 values
    U64(u64),
    /// Represents String values
    String(String),
    /// Represents duration or a timeout
    Duration(Duration),
}

//-----------------------------------------------------------------------------------------------
// Types of status settings
//-----------------------------------------------------------------------------------------------
/// `PS_TIME_OF_INTEREST` is used to retrieve the reference time from a [`StatusSettings`] object.
/// The value is expressed as a u64 containing seconds since Unix epoch (i.e., 1970-01-01T00:00:00Z)
/// and need not be the current time. By default, the value is set to current time.
pub static PS_TIME_OF_INTEREST: &str = "psTimeOfInterest";

/// `PS_CHECK_REVOCATION_STATUS` is used to retrieve a boolean value from a [`StatusSettings`]
/// object that indicates whether revocation status should be determined at all. Defaults to true.
pub static PS_CHECK_REVOCATION_STATUS: &str = "psCheckRevocationStatus";

/// `PS_CHECK_OCSP_FROM_AIA` is used to retrieve a boolean value from a [`StatusSettings`]
/// object that indicates whether OCSP responders listed in AIA extensions should be consulted.
/// Defaults to true.
pub static PS_CHECK_OCSP_FROM_AIA: &str = "psCheckOcspFromAia";

/// `PS_CHECK_CRLS` is used to retrieve a boolean value from a [`StatusSettings`] object that
/// indicates whether CRLs should be consulted. Defaults to true.
pub static PS_CHECK_CRLS: &str = "psCheckCrls";

/// `PS_PREFER_OCSP` is used to retrieve a boolean value from a [`StatusSettings`] object that
/// indicates whether OCSP should be asked before CRLs. Defaults to true.
pub static PS_PREFER_OCSP: &str = "psPreferOcsp";

/// `PS_VERIFY_OCSP_SIGNATURE` is used to retrieve a boolean value from a [`StatusSettings`] object
/// that indicates whether the signature on an OCSP response must verify before the response is
/// used. Defaults to true.
pub static PS_VERIFY_OCSP_SIGNATURE: &str = "psVerifyOcspSignature";

/// `PS_RETRIEVE_FROM_AIA_HTTP` is used to retrieve a boolean value from a [`StatusSettings`] object
/// that indicates whether issuer certificates may be fetched from caIssuers URIs. Defaults to true.
pub static PS_RETRIEVE_FROM_AIA_HTTP: &str = "psRetrieveFromAiaHttp";

/// `PS_MAX_CHAIN_LENGTH` is used to retrieve a u8 value from a [`StatusSettings`] object that
/// limits the number of certificates a chain walk will visit. Defaults to 15.
pub static PS_MAX_CHAIN_LENGTH: &str = "psMaxChainLength";

/// `PS_CRL_TIMEOUT` is used to retrieve a Duration value from a [`StatusSettings`] object
/// that is used when fetching CRLs. Defaults to 60 seconds.
pub static PS_CRL_TIMEOUT: &str = "psCrlTimeout";

/// `PS_OCSP_TIMEOUT` is used to retrieve a Duration value from a [`StatusSettings`] object
/// that is used when posting OCSP requests. Defaults to 10 seconds.
pub static PS_OCSP_TIMEOUT: &str = "psOcspTimeout";

/// `PS_TRUST_ANCHOR_FOLDER` is used to retrieve a String value from a [`StatusSettings`] object
/// that names a folder of trust anchor certificates.
pub static PS_TRUST_ANCHOR_FOLDER: &str = "psTrustAnchorFolder";

/// `PS_CERTIFICATION_AUTHORITY_FOLDER` is used to retrieve a String value from a [`StatusSettings`]
/// object that names a folder of intermediate CA certificates.
pub static PS_CERTIFICATION_AUTHORITY_FOLDER: &str = "psCertificationAuthorityFolder";

/// `PS_CRL_FOLDER` is used to retrieve a String value from a [`StatusSettings`] object that names a
/// folder of CRLs to use as offline evidence.
pub static PS_CRL_FOLDER: &str = "psCrlFolder";

/// `PS_OCSP_FOLDER` is used to retrieve a String value from a [`StatusSettings`] object that names a
/// folder of OCSP responses to use as offline evidence.
pub static PS_OCSP_FOLDER: &str = "psOcspFolder";

/// `PS_CRL_CACHE_FOLDER` is used to retrieve a String value from a [`StatusSettings`] object that
/// names a folder where fetched CRLs are cached. When absent, an in-memory cache is used.
pub static PS_CRL_CACHE_FOLDER: &str = "psCrlCacheFolder";

/// Default maximum number of certificates visited when walking a chain
pub const PS_MAX_CHAIN_LENGTH_DEFAULT: u8 = 15;

/// Default timeout used when fetching CRLs
pub const PS_CRL_TIMEOUT_DEFAULT: Duration = Duration::from_secs(60);

/// Default timeout used when posting OCSP requests
pub const PS_OCSP_TIMEOUT_DEFAULT: Duration = Duration::from_secs(10);

sts_gets_and_sets_with_default!(PS_TIME_OF_INTEREST, u64, get_now_as_unix_epoch());
sts_gets_and_sets_with_default!(PS_CHECK_REVOCATION_STATUS, bool, true);
sts_gets_and_sets_with_default!(PS_CHECK_OCSP_FROM_AIA, bool, true);
sts_gets_and_sets_with_default!(PS_CHECK_CRLS, bool, true);
sts_gets_and_sets_with_default!(PS_PREFER_OCSP, bool, true);
sts_gets_and_sets_with_default!(PS_VERIFY_OCSP_SIGNATURE, bool, true);
sts_gets_and_sets_with_default!(PS_RETRIEVE_FROM_AIA_HTTP, bool, true);
sts_gets_and_sets_with_default!(PS_MAX_CHAIN_LENGTH, u8, PS_MAX_CHAIN_LENGTH_DEFAULT);
sts_gets_and_sets_with_default!(PS_CRL_TIMEOUT, Duration, PS_CRL_TIMEOUT_DEFAULT);
sts_gets_and_sets_with_default!(PS_OCSP_TIMEOUT, Duration, PS_OCSP_TIMEOUT_DEFAULT);
sts_gets_and_sets!(PS_TRUST_ANCHOR_FOLDER, String);
sts_gets_and_sets!(PS_CERTIFICATION_AUTHORITY_FOLDER, String);
sts_gets_and_sets!(PS_CRL_FOLDER, String);
sts_gets_and_sets!(PS_OCSP_FOLDER, String);
sts_gets_and_sets!(PS_CRL_CACHE_FOLDER, String);

/// `read_settings` accepts an optional string containing the name of a file that notionally contains
/// JSON data that represents [`StatusSettings`]. When no file name is given or the file does not
/// exist, an empty settings object is returned, i.e., all defaults apply. A file that cannot be
/// parsed yields [`Error::ParseError`].
///
/// ```json
/// {"psCheckCrls":{"Bool":false},"psMaxChainLength":{"U8":5}}
/// ```
pub fn read_settings(fname: &Option<String>) -> Result<StatusSettings> {
    if let Some(fname) = fname {
        let p = Path::new(fname.as_str());
        if Path::exists(p) {
            if let Ok(json) = get_file_as_byte_vec(p) {
                let r: SerdeResult<StatusSettings> = serde_json::from_slice(&json);
                return match r {
                    Ok(sts) => Ok(sts),
                    Err(_e) => Err(Error::ParseError),
                };
            }
        }
    }
    Ok(StatusSettings::new())
}

#[test]
fn test_default_gets_sts() {
    let sts = StatusSettings::default();

    let before = get_now_as_unix_epoch();
    assert!(sts.get_time_of_interest() >= before);
    assert!(sts.get_check_revocation_status());
    assert!(sts.get_check_ocsp_from_aia());
    assert!(sts.get_check_crls());
    assert!(sts.get_prefer_ocsp());
    assert!(sts.get_verify_ocsp_signature());
    assert!(sts.get_retrieve_from_aia_http());
    assert_eq!(15, sts.get_max_chain_length());
    assert_eq!(Duration::from_secs(60), sts.get_crl_timeout());
    assert_eq!(Duration::from_secs(10), sts.get_ocsp_timeout());
}

#[test]
fn test_no_default_gets_sts() {
    let sts = StatusSettings::default();
    assert_eq!(None, sts.get_trust_anchor_folder());
    assert_eq!(None, sts.get_certification_authority_folder());
    assert_eq!(None, sts.get_crl_folder());
    assert_eq!(None, sts.get_ocsp_folder());
    assert_eq!(None, sts.get_crl_cache_folder());
}

#[test]
fn test_sets_sts() {
    let mut sts = StatusSettings::default();
    sts.set_time_of_interest(1_700_000_000);
    sts.set_check_crls(false);
    sts.set_prefer_ocsp(false);
    sts.set_max_chain_length(3);
    sts.set_crl_timeout(Duration::from_secs(5));
    sts.set_crl_folder("crls".to_string());
    assert_eq!(1_700_000_000, sts.get_time_of_interest());
    assert!(!sts.get_check_crls());
    assert!(!sts.get_prefer_ocsp());
    assert_eq!(3, sts.get_max_chain_length());
    assert_eq!(Duration::from_secs(5), sts.get_crl_timeout());
    assert_eq!(Some("crls".to_string()), sts.get_crl_folder());

    // wrong type in map falls back to default
    sts.0
        .insert(PS_CHECK_OCSP_FROM_AIA.to_string(), StatusSettingTypes::U8(1));
    assert!(sts.get_check_ocsp_from_aia());
}

#[test]
fn test_read_settings() {
    use std::io::Write;

    assert_eq!(StatusSettings::new(), read_settings(&None).unwrap());
    assert_eq!(
        StatusSettings::new(),
        read_settings(&Some("tests/does_not_exist.json".to_string())).unwrap()
    );

    let mut sts = StatusSettings::default();
    sts.set_check_crls(false);
    sts.set_max_chain_length(5);
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(serde_json::to_string(&sts).unwrap().as_bytes())
        .unwrap();
    let fname = f.path().to_str().unwrap().to_string();
    let read = read_settings(&Some(fname)).unwrap();
    assert_eq!(sts, read);
    assert!(!read.get_check_crls());
    assert_eq!(5, read.get_max_chain_length());

    let mut bad = tempfile::NamedTempFile::new().unwrap();
    bad.write_all(b"{not json").unwrap();
    let fname = bad.path().to_str().unwrap().to_string();
    assert_eq!(Err(Error::ParseError), read_settings(&Some(fname)));
}
