//! One search request, end to end: validate, stage, run, release.

use std::sync::Arc;

use tracing::info;

use crate::artifact::{ArtifactStore, StagingError};
use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, ProcessRunner, SearchGateway, SearchMode};
use crate::query::{self, Query, ValidationError};

/// The two ways a query can arrive in one request.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    /// Pasted text.
    pub fasta: Option<String>,
    /// Uploaded file bytes. Takes precedence over `fasta`.
    pub file: Option<Vec<u8>>,
}

impl Submission {
    pub fn text(fasta: impl Into<String>) -> Self {
        Self {
            fasta: Some(fasta.into()),
            file: None,
        }
    }

    pub fn upload(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            fasta: None,
            file: Some(bytes.into()),
        }
    }

    /// Validate whichever source wins. Neither present is an empty query.
    pub fn into_query(self, max_chars: usize) -> Result<Query, ValidationError> {
        match (self.file, self.fasta) {
            (Some(bytes), _) => query::validate_bytes(&bytes, max_chars),
            (None, Some(text)) => query::validate(&text, max_chars),
            (None, None) => Err(ValidationError::Empty),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Staging(#[from] StagingError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Stateless across requests; safe to share behind an `Arc`.
pub struct SearchService {
    config: Arc<GatewayConfig>,
    store: ArtifactStore,
    gateway: SearchGateway,
}

impl SearchService {
    pub fn new(config: Arc<GatewayConfig>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            store: ArtifactStore::new(&config.scratch_dir),
            gateway: SearchGateway::new(runner, Arc::clone(&config)),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run `submission` through the search tool in `mode`.
    ///
    /// The staged file is released before returning, whatever the outcome.
    /// If this future is dropped mid-run, the artifact's destructor removes
    /// the file and the runner kills the process.
    pub async fn search(
        &self,
        mode: SearchMode,
        submission: Submission,
    ) -> Result<Vec<u8>, SearchError> {
        let query = submission.into_query(self.config.max_query_chars)?;
        info!(
            %mode,
            records = query.record_count(),
            chars = query.len(),
            "search requested"
        );

        let artifact = self.store.stage(&query)?;
        let result = self.gateway.run(mode, &artifact).await;
        artifact.release();

        Ok(result?)
    }
}
