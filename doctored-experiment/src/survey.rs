use crate::error::SurveyError;
use doctored_core::CategoryTally;
use serde::Deserialize;
use std::path::Path;

/// A yes/no survey item. Columns other than these two are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Question {
    pub question: String,
    pub category: String,
}

pub fn load_questions(path: &Path) -> Result<Vec<Question>, SurveyError> {
    let read_err = |source: csv::Error| SurveyError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(read_err)?;

    let headers = reader.headers().map_err(read_err)?.clone();
    for column in ["question", "category"] {
        if !headers.iter().any(|h| h == column) {
            return Err(SurveyError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let questions = reader
        .deserialize::<Question>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    if questions.is_empty() {
        return Err(SurveyError::Empty(path.to_path_buf()));
    }
    tracing::info!(
        path = %path.display(),
        questions = questions.len(),
        "loaded survey questions"
    );
    Ok(questions)
}

/// Zeroed tally with one entry per distinct category.
pub fn tally_for(questions: &[Question]) -> CategoryTally {
    CategoryTally::with_categories(questions.iter().map(|q| q.category.as_str()))
}
