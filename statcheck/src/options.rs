//! Assembles sources and verifiers from the command line and reports the status of each link in
//! the chain of the presented certificate.
//!
//! ```text
//! $ statcheck -e leaf.der -t tas --crl-folder crls --offline
//! 0: CN=Test Leaf,O=Example,C=US [Other] VALID (CRL)
//! 1: CN=Test CA,O=Example,C=US [Other] VALID (CRL)
//! 2: CN=Test Root,O=Example,C=US [TrustStore] self-signed
//! Chain complete: true
//! Revoked: false
//! ```

use std::path::Path;
use std::sync::Arc;

use log::{error, info};

use certstat::*;

use crate::args::StatcheckArgs;

/// `FirstCrlSource` asks each source in turn and returns the first CRL found
struct FirstCrlSource(Vec<Arc<dyn CrlSource>>);

impl CrlSource for FirstCrlSource {
    fn find_crl(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<CrlToken> {
        self.0.iter().find_map(|s| s.find_crl(cert, issuer))
    }
}

/// `FirstOcspSource` asks each source in turn and returns the first response found
struct FirstOcspSource(Vec<Arc<dyn OcspSource>>);

impl OcspSource for FirstOcspSource {
    fn get_response(
        &self,
        cert: &CertificateWithContext,
        issuer: &CertificateWithContext,
    ) -> Option<OcspToken> {
        self.0.iter().find_map(|s| s.get_response(cert, issuer))
    }
}

/// Command line values take precedence over values read from the settings file
fn apply_args(args: &StatcheckArgs, sts: &mut StatusSettings) {
    sts.set_time_of_interest(args.time_of_interest);
    if let Some(f) = &args.ta_folder {
        sts.set_trust_anchor_folder(f.clone());
    }
    if let Some(f) = &args.ca_folder {
        sts.set_certification_authority_folder(f.clone());
    }
    if let Some(f) = &args.crl_folder {
        sts.set_crl_folder(f.clone());
    }
    if let Some(f) = &args.ocsp_folder {
        sts.set_ocsp_folder(f.clone());
    }
    if let Some(f) = &args.cache_folder {
        sts.set_crl_cache_folder(f.clone());
    }
    if args.offline {
        sts.set_retrieve_from_aia_http(false);
    }
}

fn load_certs(
    folder: Option<String>,
    source_type: CertificateSourceType,
    toi: u64,
) -> Option<Arc<dyn CertificateSource>> {
    let folder = folder?;
    let mut source = CertSource::new(source_type);
    match source.add_certificates_from_folder(&folder, toi) {
        Ok(count) => info!("Read {} certificates from {}", count, folder),
        Err(e) => error!("Failed to read certificates from {}: {:?}", folder, e),
    }
    Some(Arc::new(source))
}

#[cfg(feature = "remote")]
fn transport(args: &StatcheckArgs, sts: &StatusSettings) -> Option<Arc<dyn HttpTransport>> {
    if args.offline {
        None
    } else {
        Some(Arc::new(ReqwestTransport::from_settings(sts)))
    }
}

#[cfg(not(feature = "remote"))]
fn transport(args: &StatcheckArgs, _sts: &StatusSettings) -> Option<Arc<dyn HttpTransport>> {
    if !args.offline {
        info!("Built without remote support; only evidence read from folders is used");
    }
    None
}

fn crl_source(sts: &StatusSettings, transport: &Option<Arc<dyn HttpTransport>>) -> FirstCrlSource {
    let mut sources: Vec<Arc<dyn CrlSource>> = vec![];
    if let Some(folder) = sts.get_crl_folder() {
        match OfflineCrlSource::from_folder(&folder) {
            Ok(s) => sources.push(Arc::new(s)),
            Err(e) => error!("Failed to read CRLs from {}: {:?}", folder, e),
        }
    }
    if let Some(transport) = transport {
        let store: Option<Arc<dyn CrlCacheStore>> = match sts.get_crl_cache_folder() {
            Some(folder) => match FolderCrlCacheStore::new(&folder) {
                Ok(s) => Some(Arc::new(s)),
                Err(e) => {
                    error!("Failed to prepare CRL cache in {}: {:?}", folder, e);
                    None
                }
            },
            None => Some(Arc::new(MemoryCrlCacheStore::new())),
        };
        if let Some(store) = store {
            sources.push(Arc::new(CachingCrlSource::new(
                OnlineCrlSource::new(transport.clone()),
                store,
            )));
        }
    }
    FirstCrlSource(sources)
}

fn ocsp_source(
    sts: &StatusSettings,
    transport: &Option<Arc<dyn HttpTransport>>,
) -> FirstOcspSource {
    let mut sources: Vec<Arc<dyn OcspSource>> = vec![];
    if let Some(folder) = sts.get_ocsp_folder() {
        match OfflineOcspSource::from_folder(&folder) {
            Ok(s) => sources.push(Arc::new(s)),
            Err(e) => error!("Failed to read OCSP responses from {}: {:?}", folder, e),
        }
    }
    if let Some(transport) = transport {
        sources.push(Arc::new(OnlineOcspSource::new(transport.clone())));
    }
    FirstOcspSource(sources)
}

fn describe_link(
    index: usize,
    cert: &CertificateWithContext,
    status: Option<&Option<CertificateStatus>>,
    complete: bool,
) -> String {
    let prefix = format!("{}: {} [{}]", index, cert.subject_string(), cert.source_type);
    match status {
        Some(Some(s)) => match s.revocation_time {
            Some(rt) => format!("{} {} ({}) at {}", prefix, s.validity, s.source_type, rt),
            None => format!("{} {} ({})", prefix, s.validity, s.source_type),
        },
        Some(None) => format!("{} UNDETERMINED", prefix),
        None if complete => format!("{} self-signed", prefix),
        None => format!("{} no issuer found", prefix),
    }
}

/// The `options` function performs the action indicated by the command line arguments
pub fn options(args: &StatcheckArgs) {
    let mut sts = match read_settings(&args.settings) {
        Ok(sts) => sts,
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to read settings file: {:?}", e).as_str(),
            );
            return;
        }
    };
    apply_args(args, &mut sts);

    let ee_file = match &args.end_entity_file {
        Some(f) => f,
        None => {
            log_message(
                &PeLogLevels::PeError,
                "An end entity file must be provided using --end-entity-file",
            );
            return;
        }
    };
    let target = match get_file_as_byte_vec_pem(Path::new(ee_file)) {
        Ok(bytes) => {
            match CertificateWithContext::new(&bytes, CertificateSourceType::Other, Some(ee_file.clone())) {
                Ok(c) => c,
                Err(e) => {
                    log_message(
                        &PeLogLevels::PeError,
                        format!("Failed to parse {}: {:?}", ee_file, e).as_str(),
                    );
                    return;
                }
            }
        }
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to read {}: {:?}", ee_file, e).as_str(),
            );
            return;
        }
    };

    let toi = sts.get_time_of_interest();
    let mut certs = CompositeCertificateSource::new();
    certs.add_optional_source(load_certs(
        sts.get_trust_anchor_folder(),
        CertificateSourceType::TrustStore,
        toi,
    ));
    certs.add_optional_source(load_certs(
        sts.get_certification_authority_folder(),
        CertificateSourceType::Other,
        toi,
    ));

    let mut pe = PkiEnvironment::default();
    populate_default_pki_environment(&mut pe);

    let transport = transport(args, &sts);
    let ocsp = OcspCertificateVerifier::from_settings(
        pe.clone(),
        Some(Arc::new(ocsp_source(&sts, &transport))),
        &sts,
    );
    let crl = CrlCertificateVerifier::new(pe.clone(), Some(Arc::new(crl_source(&sts, &transport))));
    let verifier = OcspAndCrlVerifier::from_settings(Some(Arc::new(ocsp)), Some(Arc::new(crl)), &sts);

    let mut builder = ChainValidator::builder()
        .environment(pe.clone())
        .certificate_source(Arc::new(certs))
        .verifier(Arc::new(verifier));
    if let Some(transport) = transport {
        builder = builder.transport(transport);
    }
    let validator = match builder.settings(&sts).build() {
        Ok(v) => v,
        Err(e) => {
            log_message(
                &PeLogLevels::PeError,
                format!("Failed to prepare validator: {:?}", e).as_str(),
            );
            return;
        }
    };

    let result = validator.validate(&target, toi);
    let complete = result.is_complete(&pe);
    for (i, cert) in result.certificates.iter().enumerate() {
        log_message(
            &PeLogLevels::PeInfo,
            describe_link(i, cert, result.statuses.get(i), complete).as_str(),
        );
    }
    log_message(
        &PeLogLevels::PeInfo,
        format!("Chain complete: {}", complete).as_str(),
    );
    log_message(
        &PeLogLevels::PeInfo,
        format!("Revoked: {}", result.any_revoked()).as_str(),
    );
}
