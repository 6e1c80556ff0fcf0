// src/import/mod.rs

use chrono::Utc;
use std::{marker::PhantomData, path::Path, sync::Arc};
use tokio::fs;
use tracing::{info, instrument, warn};

use crate::entity::ImportEntity;
use crate::error::{ImportError, ImportResult};
use crate::notify::{Level, Notification, Notifier};
use crate::parse::{parse_rows, NormalizedRow};
use crate::store::LocalStore;

/// Rows shown before the user confirms an import.
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug)]
pub enum SessionState {
    Idle,
    /// File text is being read.
    FileSelected { file_name: String },
    Parsed {
        file_name: String,
        rows: Vec<NormalizedRow>,
    },
    /// Shown until another file is picked; never importable.
    Invalid {
        file_name: String,
        error: ImportError,
    },
}

/// One local CSV import flow for entity kind `E`:
/// `Idle → FileSelected → Parsed | Invalid`, and `Parsed → Idle` on import.
pub struct ImportSession<E: ImportEntity> {
    state: SessionState,
    _marker: PhantomData<E>,
}

impl<E: ImportEntity> Default for ImportSession<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ImportEntity> ImportSession<E> {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Parsed { .. })
    }

    pub fn error(&self) -> Option<&ImportError> {
        match &self.state {
            SessionState::Invalid { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::FileSelected { file_name }
            | SessionState::Parsed { file_name, .. }
            | SessionState::Invalid { file_name, .. } => Some(file_name),
        }
    }

    /// Read-only view of the first parsed rows.
    pub fn preview(&self) -> &[NormalizedRow] {
        match &self.state {
            SessionState::Parsed { rows, .. } => &rows[..rows.len().min(PREVIEW_ROWS)],
            _ => &[],
        }
    }

    pub fn row_count(&self) -> usize {
        match &self.state {
            SessionState::Parsed { rows, .. } => rows.len(),
            _ => 0,
        }
    }

    /// Read a CSV file and parse it. Any previous preview is discarded.
    ///
    /// Returns the parsed row count, or a copy of the error now shown by the
    /// session.
    #[instrument(level = "info", skip(self, path), fields(entity = E::schema().label, path = %path.as_ref().display()))]
    pub async fn select_file(&mut self, path: impl AsRef<Path>) -> ImportResult<usize> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        self.state = SessionState::FileSelected {
            file_name: file_name.clone(),
        };

        match fs::read_to_string(path).await {
            Ok(text) => self.load_text(file_name, &text),
            Err(source) => {
                warn!(error = %source, "could not read file");
                self.state = SessionState::Invalid {
                    file_name,
                    error: ImportError::ReadFile {
                        path: path.to_path_buf(),
                        source: Arc::new(source),
                    },
                };
                self.readiness()
            }
        }
    }

    /// Parse already-loaded file text.
    pub fn load_text(
        &mut self,
        file_name: impl Into<String>,
        text: &str,
    ) -> ImportResult<usize> {
        let file_name = file_name.into();
        self.state = match parse_rows(text, E::schema()) {
            Ok(rows) => {
                info!(file = %file_name, rows = rows.len(), "file ready to import");
                SessionState::Parsed { file_name, rows }
            }
            Err(error) => {
                warn!(file = %file_name, error = %error, "file rejected");
                SessionState::Invalid { file_name, error }
            }
        };
        self.readiness()
    }

    fn readiness(&self) -> ImportResult<usize> {
        match &self.state {
            SessionState::Invalid { error, .. } => Err(error.clone()),
            _ => Ok(self.row_count()),
        }
    }

    /// Materialize every parsed row, append them to the store as one batch
    /// and return to `Idle`.
    #[instrument(level = "info", skip_all, fields(entity = E::schema().label))]
    pub fn import(&mut self, store: &LocalStore, notifier: &dyn Notifier) -> ImportResult<Vec<E>> {
        let (file_name, rows) = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Parsed { file_name, rows } => (file_name, rows),
            other => {
                self.state = other;
                return Err(ImportError::NothingToImport);
            }
        };

        let now = Utc::now();
        let records: Vec<E> = rows.iter().map(|row| E::materialize(row, now)).collect();
        let total = store.append(records.clone());
        info!(file = %file_name, imported = records.len(), total, "import finished");

        notifier.notify(Notification::new(
            Level::Success,
            "Import complete",
            format!(
                "Imported {} {} from {}",
                records.len(),
                E::schema().label,
                file_name
            ),
        ));
        Ok(records)
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }
}
