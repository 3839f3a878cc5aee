use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Per-season error artifact: one `<game_id>\t<message>` line per failed game,
/// appended across runs so a later retry can pick the ids back up.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn for_season(log_dir: &Path, season: &str) -> Self {
        Self { path: log_dir.join(format!("{season}.error")) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, game_id: &str, message: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        // keep one entry per line even for multi-line error chains
        let message = message.replace(['\n', '\r'], " ");
        writeln!(file, "{game_id}\t{message}")
    }

    /// Log to the artifact, falling back to the log facade when the file
    /// itself cannot be written.
    pub fn record_or_warn(&self, game_id: &str, message: &str) {
        if let Err(e) = self.record(game_id, message) {
            log::warn!("could not write {}: {e}", self.path.display());
        }
    }
}
