//! Ephemeral on-disk copies of validated queries.
//!
//! The search tool reads its query from a file. Each request stages its own
//! file with a name chosen by [`tempfile`], hands the path to the tool, and
//! releases it afterwards. An [`Artifact`] that is dropped without being
//! released (panic, cancelled request) still removes its file.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, warn};

use crate::query::Query;

const PREFIX: &str = "query_";
const SUFFIX: &str = ".fasta";

/// The query file could not be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to stage query file: {0}")]
pub struct StagingError(#[from] io::Error);

/// Creates query files in one directory.
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

    /// Write `query` plus a trailing newline to a fresh, uniquely named file.
    pub fn stage(&self, query: &Query) -> Result<Artifact, StagingError> {
        let mut file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(SUFFIX)
            .tempfile_in(&self.dir)?;
        file.write_all(query.as_str().as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;

        // Close our handle; the path keeps delete-on-drop.
        let path = file.into_temp_path();
        debug!(path = %path.display(), "staged query");
        Ok(Artifact { path })
    }
}

/// A staged query file, owned by exactly one request.
#[derive(Debug)]
pub struct Artifact {
    path: TempPath,
}

impl Artifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Failures are logged and swallowed so they never
    /// replace the request's own result.
    pub fn release(self) {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => debug!(path = %path.display(), "released query"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove query file"),
        }
    }
}
