use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    core::error::IssuanceError,
    storage::{journal::ActivityJournal, state::ResourceState},
};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

const PRIVATE_MODE: u32 = 0o600;
const PUBLIC_MODE: u32 = 0o644;

/// Files kept per domain under the artifact directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PrivateKey,
    Csr,
    Certificate,
    Log,
    State,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::PrivateKey => "key",
            ArtifactKind::Csr => "csr",
            ArtifactKind::Certificate => "crt",
            ArtifactKind::Log => "log",
            ArtifactKind::State => "state.json",
        }
    }
}

/// Per-domain files on disk: `{dir}/{domain}.key|.csr|.crt|.log|.state.json`.
///
/// No locking is done; callers serialize runs for the same domain.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, domain: &str, kind: ArtifactKind) -> PathBuf {
        self.dir.join(format!("{domain}.{}", kind.extension()))
    }

    pub fn journal(&self, domain: &str) -> ActivityJournal {
        ActivityJournal::new(self.path(domain, ArtifactKind::Log))
    }

    fn ensure_dir(&self) -> Result<(), IssuanceError> {
        fs::create_dir_all(&self.dir).map_err(|err| IssuanceError::filesystem(&self.dir, err))
    }

    pub fn write_private_key(&self, domain: &str, pem: &[u8]) -> Result<PathBuf, IssuanceError> {
        self.write(domain, ArtifactKind::PrivateKey, pem, PRIVATE_MODE)
    }

    pub fn write_csr(&self, domain: &str, pem: &str) -> Result<PathBuf, IssuanceError> {
        self.write(domain, ArtifactKind::Csr, pem.as_bytes(), PUBLIC_MODE)
    }

    /// Writes the certificate body exactly as received.
    pub fn write_certificate(&self, domain: &str, pem: &str) -> Result<PathBuf, IssuanceError> {
        self.write(domain, ArtifactKind::Certificate, pem.as_bytes(), PUBLIC_MODE)
    }

    pub fn save_state(&self, state: &ResourceState) -> Result<PathBuf, IssuanceError> {
        let json = serde_json::to_vec_pretty(state).map_err(|err| {
            IssuanceError::Configuration(format!("failed to encode resource state: {err}"))
        })?;
        self.write(&state.domain, ArtifactKind::State, &json, PRIVATE_MODE)
    }

    pub fn load_state(&self, domain: &str) -> Result<Option<ResourceState>, IssuanceError> {
        let path = self.path(domain, ArtifactKind::State);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(IssuanceError::filesystem(path, err)),
        };
        serde_json::from_slice(&raw).map(Some).map_err(|err| {
            IssuanceError::Configuration(format!(
                "resource state {} is corrupt: {err}",
                path.display()
            ))
        })
    }

    pub fn remove_state(&self, domain: &str) -> Result<(), IssuanceError> {
        remove_if_exists(&self.path(domain, ArtifactKind::State)).map(|_| ())
    }

    /// Removes the key, CSR and certificate of `domain`. Best effort: missing
    /// files are skipped and other failures only logged. Returns what was
    /// removed.
    pub fn cleanup(&self, domain: &str) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for kind in [
            ArtifactKind::Csr,
            ArtifactKind::Certificate,
            ArtifactKind::PrivateKey,
        ] {
            let path = self.path(domain, kind);
            match remove_if_exists(&path) {
                Ok(true) => removed.push(path),
                Ok(false) => {}
                Err(err) => warn!("[artifacts] {err}"),
            }
        }
        debug!("[artifacts] removed {} file(s) for {domain}", removed.len());
        removed
    }

    fn write(
        &self,
        domain: &str,
        kind: ArtifactKind,
        content: &[u8],
        mode: u32,
    ) -> Result<PathBuf, IssuanceError> {
        self.ensure_dir()?;
        let path = self.path(domain, kind);
        write_file(&path, content, mode)?;
        debug!("[artifacts] wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }
}

fn remove_if_exists(path: &Path) -> Result<bool, IssuanceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(IssuanceError::filesystem(path, err)),
    }
}

fn write_file(path: &Path, content: &[u8], mode: u32) -> Result<(), IssuanceError> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        options.mode(mode);
    }
    let mut file = options
        .open(path)
        .map_err(|err| IssuanceError::filesystem(path, err))?;
    file.write_all(content)
        .and_then(|_| file.flush())
        .map_err(|err| IssuanceError::filesystem(path, err))?;
    ensure_permissions(path, mode)
}

/// `mode` only applies at creation; an existing file keeps its bits unless
/// they are reset here.
fn ensure_permissions(path: &Path, mode: u32) -> Result<(), IssuanceError> {
    #[cfg(unix)]
    {
        let metadata = fs::metadata(path).map_err(|err| IssuanceError::filesystem(path, err))?;
        if metadata.permissions().mode() & 0o777 != mode {
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
                .map_err(|err| IssuanceError::filesystem(path, err))?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}
