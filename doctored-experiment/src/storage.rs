//! Append-only CSV result tables.
//!
//! Both tables get a header only when the file is new (missing or empty), so
//! repeated sessions accumulate rows without rewriting earlier ones. The
//! participant table carries one column per survey category, so its schema
//! follows the question set of each run.

use crate::error::StorageError;
use crate::session::{SessionOutcome, SessionReport};
use doctored_core::{CategoryTally, Demographics, TrialRecord};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const TRIAL_FILE: &str = "trial_data.csv";
pub const PARTICIPANT_FILE: &str = "participant_data.csv";

/// Fixed leading columns of the participant table.
pub const PARTICIPANT_COLUMNS: [&str; 7] = [
    "subject_id",
    "age",
    "gender",
    "social_media_time",
    "news_time",
    "content_creation_time",
    "fact_checking_time",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub trial_rows: usize,
    pub participant_row: bool,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    trial_path: PathBuf,
    participant_path: PathBuf,
}

impl ResultStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            trial_path: data_dir.join(TRIAL_FILE),
            participant_path: data_dir.join(PARTICIPANT_FILE),
        }
    }

    pub fn trial_path(&self) -> &Path {
        &self.trial_path
    }

    pub fn participant_path(&self) -> &Path {
        &self.participant_path
    }

    /// Writes whatever the outcome allows.
    ///
    /// Completed sessions save both tables. A declined form, or an
    /// interruption after the trial loop, still saves the trials. Aborted
    /// sessions save nothing unless `keep_trials_on_abort`.
    /// The two tables are written independently; if both fail the first
    /// error is returned.
    pub fn save(
        &self,
        report: &SessionReport,
        keep_trials_on_abort: bool,
    ) -> Result<SaveSummary, StorageError> {
        let save_trials = report.outcome.saves_trials(keep_trials_on_abort);
        let mut summary = SaveSummary::default();
        let mut first_error = None;

        if save_trials {
            match self.append_trials(&report.trials) {
                Ok(rows) => summary.trial_rows = rows,
                Err(e) => {
                    tracing::error!(error = %e, "could not save trial data");
                    first_error = Some(e);
                }
            }
        } else {
            tracing::warn!(
                discarded = report.trials.len(),
                outcome = ?report.outcome,
                "session ended early, trial data not saved"
            );
        }

        match (&report.outcome, &report.demographics) {
            (SessionOutcome::Completed, Some(demographics)) => {
                match self.append_participant(report.participant_id, demographics, &report.tally) {
                    Ok(()) => summary.participant_row = true,
                    Err(e) => {
                        tracing::error!(error = %e, "could not save participant data");
                        first_error.get_or_insert(e);
                    }
                }
            }
            (SessionOutcome::Completed, None) => {
                tracing::warn!("session completed without demographics, no participant row");
            }
            _ => {}
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Appends one row per trial. Returns the number of rows written.
    pub fn append_trials(&self, trials: &[TrialRecord]) -> Result<usize, StorageError> {
        if trials.is_empty() {
            tracing::info!("no trials to save");
            return Ok(0);
        }
        let (file, is_new) = open_append(&self.trial_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        for trial in trials {
            writer.serialize(trial).map_err(|source| StorageError::Write {
                path: self.trial_path.clone(),
                source,
            })?;
        }
        writer.flush().map_err(|source| StorageError::Flush {
            path: self.trial_path.clone(),
            source,
        })?;
        tracing::info!(
            path = %self.trial_path.display(),
            rows = trials.len(),
            header = is_new,
            "trial data saved"
        );
        Ok(trials.len())
    }

    pub fn append_participant(
        &self,
        participant_id: Uuid,
        demographics: &Demographics,
        tally: &CategoryTally,
    ) -> Result<(), StorageError> {
        let header = participant_header(tally);
        let (file, is_new) = open_append(&self.participant_path)?;
        if !is_new {
            self.warn_on_schema_drift(&header);
        }

        let write_err = |source: csv::Error| StorageError::Write {
            path: self.participant_path.clone(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(&header).map_err(write_err)?;
        }
        writer
            .write_record(participant_row(participant_id, demographics, tally))
            .map_err(write_err)?;
        writer.flush().map_err(|source| StorageError::Flush {
            path: self.participant_path.clone(),
            source,
        })?;
        tracing::info!(
            path = %self.participant_path.display(),
            categories = tally.len(),
            header = is_new,
            "participant data saved"
        );
        Ok(())
    }

    fn warn_on_schema_drift(&self, header: &[String]) {
        let existing = csv::Reader::from_path(&self.participant_path)
            .and_then(|mut r| r.headers().cloned());
        match existing {
            Ok(existing) if existing.iter().ne(header.iter().map(String::as_str)) => {
                tracing::warn!(
                    path = %self.participant_path.display(),
                    existing = ?existing.iter().collect::<Vec<_>>(),
                    current = ?header,
                    "participant columns differ from the existing file, appending anyway"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not read existing participant header"),
        }
    }
}

pub fn participant_header(tally: &CategoryTally) -> Vec<String> {
    PARTICIPANT_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(tally.categories().map(str::to_string))
        .collect()
}

fn participant_row(id: Uuid, d: &Demographics, tally: &CategoryTally) -> Vec<String> {
    let mut row = vec![
        id.to_string(),
        d.age.to_string(),
        d.gender.to_string(),
        format_hours(d.social_media_time),
        format_hours(d.news_time),
        format_hours(d.content_creation_time),
        format_hours(d.fact_checking_time),
    ];
    row.extend(tally.iter().map(|(_, count)| count.to_string()));
    row
}

fn format_hours(hours: f64) -> String {
    format!("{hours:?}")
}

/// Opens `path` for appending, creating the parent directory if needed.
/// The flag is true when the file is new and still needs a header.
fn open_append(path: &Path) -> Result<(File, bool), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StorageError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((file, is_new))
}
