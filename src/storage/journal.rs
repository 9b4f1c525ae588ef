use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use log::warn;

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Append-only, human-readable activity log for one domain.
///
/// Lines look like `2024-05-01 13:37:00 Enrolling certificate for example.com`.
/// Write failures are reported through `log` and otherwise ignored so a
/// broken journal never fails an issuance.
#[derive(Debug, Clone)]
pub struct ActivityJournal {
    path: PathBuf,
}

impl ActivityJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, message: &str) {
        let line = format!("{} {message}\n", Local::now().format("%Y-%m-%d %H:%M:%S"));
        if let Err(err) = self.append(line.as_bytes()) {
            warn!("[journal] failed to write {}: {err}", self.path.display());
        }
    }

    fn append(&self, line: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            options.mode(0o644);
        }
        options.open(&self.path)?.write_all(line)
    }
}
