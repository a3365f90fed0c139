use std::path::Path;

/// What the display should show on the next frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Scene<'a> {
    Blank,
    /// Centered, wrapped text block.
    Text(&'a str),
    Fixation,
    /// Full-screen image stimulus.
    Image(&'a Path),
    Form(FormView),
}

/// Snapshot of the demographic form for drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct FormView {
    pub title: String,
    pub rows: Vec<FormRow>,
    pub focus: usize,
    pub error: Option<String>,
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub label: String,
    pub value: String,
    /// Value is one of a fixed set of choices.
    pub is_choice: bool,
}
