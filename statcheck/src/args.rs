//! Arguments for the statcheck utility

use clap::Parser;
use serde::{Deserialize, Serialize};

use certstat::get_now_as_unix_epoch;

/// Certificate status checker
#[derive(Parser, Debug, Serialize, Deserialize, Default)]
#[command(arg_required_else_help(true))]
#[clap(author, version, about, long_about = None)]
pub struct StatcheckArgs {
    /// Full path and filename of a binary DER-encoded or PEM-encoded certificate whose chain and
    /// revocation status should be determined.
    #[clap(short, long, help_heading = "STATUS")]
    pub end_entity_file: Option<String>,

    /// Full path of folder containing trust anchor certificates. Only files with .der, .crt, .cer
    /// or .pem as file extension are processed.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub ta_folder: Option<String>,

    /// Full path of folder containing intermediate CA certificates.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub ca_folder: Option<String>,

    /// Time to use for status determination expressed as the number of seconds since Unix epoch
    /// (defaults to current system time).
    #[clap(short = 'i', long, default_value_t = get_now_as_unix_epoch(), help_heading = "COMMON OPTIONS")]
    pub time_of_interest: u64,

    /// Full path and filename of YAML-formatted configuration file for log4rs logging mechanism.
    /// See <https://docs.rs/log4rs/latest/log4rs/> for details.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub logging_config: Option<String>,

    /// Full path and filename of JSON-formatted status settings.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub settings: Option<String>,

    /// Full path of folder containing CRLs to use before attempting retrieval.
    #[clap(long, help_heading = "REVOCATION")]
    pub crl_folder: Option<String>,

    /// Full path of folder containing OCSP responses to use before sending requests.
    #[clap(long, help_heading = "REVOCATION")]
    pub ocsp_folder: Option<String>,

    /// Full path of folder used to cache downloaded CRLs. When absent, downloaded CRLs are cached
    /// in memory for the duration of the run.
    #[clap(long, help_heading = "REVOCATION")]
    pub cache_folder: Option<String>,

    /// Flag that indicates no network access should be attempted, i.e., only evidence read from
    /// folders is used and caIssuers URIs are not followed.
    #[clap(long, help_heading = "REVOCATION")]
    pub offline: bool,
}
