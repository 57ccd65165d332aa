use crate::guard::{AuthCode, GuardError, SharedSecret};
use serde::Deserialize;
use std::ffi::OsStr;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of the authenticator files
pub const MAFILE_EXTENSION: &str = "maFile";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MaFileError {
    #[error("error while listing {}: {:#}", path.display(), err)]
    ReadDir { err: std::io::Error, path: PathBuf },
    #[error("error while reading {}: {:#}", path.display(), err)]
    Read { err: std::io::Error, path: PathBuf },
    #[error("error while parsing {}: {:#}", path.display(), err)]
    Json {
        err: serde_json::error::Error,
        path: PathBuf,
    },
    #[error("no .maFile files in {}", path.display())]
    NoFiles { path: PathBuf },
}

/// Mobile authenticator data, as exported by authenticator tools
#[derive(Debug, Clone, Deserialize)]
pub struct MaFile {
    pub account_name: String,
    pub shared_secret: SharedSecret,
}

impl MaFile {
    /// Generate the steam guard code for right now
    pub fn auth_code(&self) -> Result<AuthCode, GuardError> {
        self.shared_secret.auth_code()
    }
}

/// A parsed maFile together with its file name
#[derive(Debug, Clone)]
pub struct NamedMaFile {
    pub name: String,
    pub content: MaFile,
}

impl Display for NamedMaFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.content.account_name)
    }
}

/// Parse all maFiles in a directory, sorted by file name
///
/// Fails if the directory can't be read, if any of the files is invalid or if no files are found.
pub fn read_dir(path: &Path) -> Result<Vec<NamedMaFile>, MaFileError> {
    let entries = fs::read_dir(path).map_err(|err| MaFileError::ReadDir {
        err,
        path: path.into(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| MaFileError::ReadDir {
            err,
            path: path.into(),
        })?;
        let file_path = entry.path();
        if file_path.extension() != Some(OsStr::new(MAFILE_EXTENSION)) || !file_path.is_file() {
            continue;
        }

        let raw = fs::read_to_string(&file_path).map_err(|err| MaFileError::Read {
            err,
            path: file_path.clone(),
        })?;
        let content = serde_json::from_str(&raw).map_err(|err| MaFileError::Json {
            err,
            path: file_path.clone(),
        })?;
        files.push(NamedMaFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            content,
        });
    }

    if files.is_empty() {
        return Err(MaFileError::NoFiles { path: path.into() });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ALICE: &str = r#"{
        "shared_secret": "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA=",
        "serial_number": "1234",
        "revocation_code": "R12345",
        "account_name": "alice",
        "Session": null
    }"#;

    #[test]
    fn test_read_dir() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("76561198000000002.maFile"), ALICE).unwrap();
        fs::write(
            dir.path().join("76561198000000001.maFile"),
            r#"{"account_name": "bob", "shared_secret": "Ym9i"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("manifest.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a mafile").unwrap();

        let files = read_dir(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "76561198000000001.maFile");
        assert_eq!(files[0].content.account_name, "bob");
        assert_eq!(files[1].content.account_name, "alice");
        assert_eq!(
            files[1].content.shared_secret.as_str(),
            "MTIzNDU2Nzg5MDEyMzQ1Njc4OTA="
        );
        assert_eq!(files[1].content.auth_code().unwrap().as_str().len(), 5);
    }

    #[test]
    fn test_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            read_dir(&dir.path().join("missing")),
            Err(MaFileError::ReadDir { .. })
        ));
    }

    #[test]
    fn test_no_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("other.json"), ALICE).unwrap();
        assert!(matches!(
            read_dir(dir.path()),
            Err(MaFileError::NoFiles { .. })
        ));
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.maFile"), r#"{"account_name": "carol"}"#).unwrap();
        assert!(matches!(
            read_dir(dir.path()),
            Err(MaFileError::Json { .. })
        ));
    }

    #[test]
    fn test_secret_not_in_debug() {
        let file: MaFile = serde_json::from_str(ALICE).unwrap();
        assert!(!format!("{file:?}").contains("MTIz"));
    }
}
