//! The file_utils module contains utility functions related to interactions with the filesystem.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{debug, error};
use walkdir::WalkDir;

use crate::util::error::{Error, Result};
use crate::util::utilities::get_file_as_byte_vec_pem;

/// `CERT_FILE_EXTS` lists the file extensions processed when loading certificates from a folder
pub const CERT_FILE_EXTS: &[&str] = &["der", "crt", "cer", "pem"];

/// `CRL_FILE_EXTS` lists the file extensions processed when loading CRLs from a folder
pub const CRL_FILE_EXTS: &[&str] = &["crl", "der", "pem"];

/// `OCSP_FILE_EXTS` lists the file extensions processed when loading OCSP responses from a folder
pub const OCSP_FILE_EXTS: &[&str] = &["ocsp", "ors", "der"];

/// `files_in_folder` recursively traverses the indicated folder and returns the paths of all files
/// that feature one of the given extensions. [`Error::NotFound`] is returned if the folder does not
/// exist or is not a directory.
pub fn files_in_folder(folder: &str, file_exts: &[&str]) -> Result<Vec<PathBuf>> {
    if !Path::is_dir(Path::new(folder)) {
        error!("{} does not exist or is not a directory", folder);
        return Err(Error::NotFound);
    }

    let mut files = vec![];
    for entry in WalkDir::new(folder) {
        match entry {
            Ok(e) => {
                if e.file_type().is_dir() {
                    continue;
                }
                let path = e.path();
                match path.extension().and_then(OsStr::to_str) {
                    Some(ext) if file_exts.contains(&ext.to_lowercase().as_str()) => {
                        files.push(path.to_path_buf());
                    }
                    _ => {
                        debug!("Skipping {}", path.display());
                    }
                }
            }
            Err(e) => {
                error!("Failed to unwrap entry while traversing {}: {}", folder, e);
                continue;
            }
        }
    }
    files.sort();
    Ok(files)
}

/// `read_folder` returns the contents of each file in the indicated folder that features one of the
/// given extensions, with PEM-encoded files decoded. Files that cannot be read are logged and skipped.
pub fn read_folder(folder: &str, file_exts: &[&str]) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut retval = vec![];
    for path in files_in_folder(folder, file_exts)? {
        match get_file_as_byte_vec_pem(&path) {
            Ok(b) => retval.push((path, b)),
            Err(e) => {
                error!("Failed to read {}: {:?}", path.display(), e);
            }
        }
    }
    Ok(retval)
}

#[test]
fn non_existent_dir() {
    let r = files_in_folder("tests/examples/nonexistent", CERT_FILE_EXTS);
    assert_eq!(Some(Error::NotFound), r.err());
}

#[test]
fn filters_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.der"), [0x30, 0x00]).unwrap();
    std::fs::write(dir.path().join("b.txt"), b"ignored").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(dir.path().join("sub").join("c.CRT"), [0x30, 0x00]).unwrap();

    let folder = dir.path().to_str().unwrap();
    let files = files_in_folder(folder, CERT_FILE_EXTS).unwrap();
    assert_eq!(2, files.len());
    let contents = read_folder(folder, CERT_FILE_EXTS).unwrap();
    assert_eq!(vec![0x30, 0x00], contents[0].1);
}
