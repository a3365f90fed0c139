pub mod config;
pub mod error;
pub mod form;
pub mod prompts;
pub mod session;
pub mod stimuli;
pub mod storage;
pub mod survey;
pub mod trial;

pub use config::{SessionConfig, StimulusConfig};
pub use error::{ConfigError, SessionError, StimulusError, StorageError, SurveyError};
pub use form::{DemographicForm, FormAction};
pub use session::{
    SessionContext, SessionEvent, SessionInputs, SessionOutcome, SessionReport,
    SessionStateMachine,
};
pub use storage::{ResultStore, SaveSummary};
pub use survey::Question;
pub use trial::{Trial, TrialTimestamps};
