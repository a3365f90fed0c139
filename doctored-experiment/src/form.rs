//! Demographic intake form model: editing, focus and validation.

use doctored_core::{Demographics, FormRow, FormView, Gender, InputKey};

const AGE: usize = 0;
const GENDER: usize = 1;
const SOCIAL_MEDIA: usize = 2;
const NEWS: usize = 3;
const CONTENT_CREATION: usize = 4;
const FACT_CHECKING: usize = 5;

const MAX_AGE: u32 = 150;
const MAX_INPUT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Decimal,
    Gender,
}

#[derive(Debug, Clone)]
struct Field {
    label: &'static str,
    kind: FieldKind,
    text: String,
}

/// What a key press did to the form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    Ignored,
    Edited,
    FocusMoved,
    Submitted(Demographics),
    /// Submit failed validation; the form stays open.
    Invalid,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DemographicForm {
    fields: Vec<Field>,
    gender: usize,
    focus: usize,
    error: Option<String>,
}

impl Default for DemographicForm {
    fn default() -> Self {
        let field = |label, kind, text: &str| Field {
            label,
            kind,
            text: text.to_string(),
        };
        Self {
            fields: vec![
                field("Age:", FieldKind::Integer, ""),
                field("Gender:", FieldKind::Gender, ""),
                field(
                    "Time spent on social media per week (hours):",
                    FieldKind::Decimal,
                    "0",
                ),
                field(
                    "Time spent consuming news per week (hours):",
                    FieldKind::Decimal,
                    "0",
                ),
                field(
                    "Time spent creating visual content per week (hours):",
                    FieldKind::Decimal,
                    "0",
                ),
                field(
                    "Time spent fact-checking per week (hours):",
                    FieldKind::Decimal,
                    "0",
                ),
            ],
            gender: 0,
            focus: AGE,
            error: None,
        }
    }
}

impl DemographicForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one key press. `cancel` is the key that backs out of the form.
    pub fn handle_key(&mut self, key: InputKey, cancel: &InputKey) -> FormAction {
        if key.same_key(cancel) {
            return FormAction::Cancelled;
        }
        let kind = self.fields[self.focus].kind;
        match key {
            InputKey::Enter => self.submit(),
            InputKey::Tab | InputKey::Down => {
                self.focus = (self.focus + 1) % self.fields.len();
                FormAction::FocusMoved
            }
            InputKey::BackTab | InputKey::Up => {
                self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
                FormAction::FocusMoved
            }
            InputKey::Left if kind == FieldKind::Gender => {
                self.gender = (self.gender + Gender::ALL.len() - 1) % Gender::ALL.len();
                FormAction::Edited
            }
            InputKey::Right | InputKey::Char(' ') if kind == FieldKind::Gender => {
                self.gender = (self.gender + 1) % Gender::ALL.len();
                FormAction::Edited
            }
            InputKey::Backspace if kind != FieldKind::Gender => {
                if self.fields[self.focus].text.pop().is_some() {
                    FormAction::Edited
                } else {
                    FormAction::Ignored
                }
            }
            InputKey::Char(c) if accepts(kind, c) => {
                let text = &mut self.fields[self.focus].text;
                if text.len() >= MAX_INPUT_LEN {
                    return FormAction::Ignored;
                }
                // The prefilled zero is replaced rather than extended.
                if kind == FieldKind::Decimal && text == "0" && c.is_ascii_digit() {
                    text.clear();
                }
                text.push(c);
                FormAction::Edited
            }
            _ => FormAction::Ignored,
        }
    }

    fn submit(&mut self) -> FormAction {
        match self.parse() {
            Ok(demographics) => {
                self.error = None;
                FormAction::Submitted(demographics)
            }
            Err((index, message)) => {
                self.focus = index;
                self.error = Some(message);
                FormAction::Invalid
            }
        }
    }

    fn parse(&self) -> Result<Demographics, (usize, String)> {
        let age_text = self.fields[AGE].text.trim();
        let age = age_text
            .parse::<u32>()
            .ok()
            .filter(|age| *age <= MAX_AGE)
            .ok_or_else(|| {
                (
                    AGE,
                    format!("Age must be a whole number between 0 and {MAX_AGE}."),
                )
            })?;
        Ok(Demographics {
            age,
            gender: Gender::ALL[self.gender],
            social_media_time: self.hours(SOCIAL_MEDIA)?,
            news_time: self.hours(NEWS)?,
            content_creation_time: self.hours(CONTENT_CREATION)?,
            fact_checking_time: self.hours(FACT_CHECKING)?,
        })
    }

    fn hours(&self, index: usize) -> Result<f64, (usize, String)> {
        let field = &self.fields[index];
        let text = field.text.trim();
        let text = if text.is_empty() { "0" } else { text };
        text.parse::<f64>()
            .ok()
            .filter(|h| h.is_finite() && *h >= 0.0)
            .ok_or_else(|| {
                let label = field.label.trim_end_matches(':');
                (index, format!("{label} must be a number of hours, 0 or more."))
            })
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn view(&self, hint: &str) -> FormView {
        FormView {
            title: "About you".to_string(),
            rows: self
                .fields
                .iter()
                .map(|f| FormRow {
                    label: f.label.to_string(),
                    value: match f.kind {
                        FieldKind::Gender => Gender::ALL[self.gender].to_string(),
                        _ => f.text.clone(),
                    },
                    is_choice: f.kind == FieldKind::Gender,
                })
                .collect(),
            focus: self.focus,
            error: self.error.clone(),
            hint: hint.to_string(),
        }
    }
}

fn accepts(kind: FieldKind, c: char) -> bool {
    match kind {
        FieldKind::Integer => c.is_ascii_digit(),
        FieldKind::Decimal => c.is_ascii_digit() || c == '.',
        FieldKind::Gender => false,
    }
}
