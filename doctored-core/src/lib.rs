pub mod keys;
pub mod participant;
pub mod phase;
pub mod scene;
pub mod stimulus;
pub mod trial;

pub use keys::{Decision, InputKey, KeyContext, KeyMap};
pub use participant::{CategoryTally, Demographics, Gender};
pub use phase::SessionPhase;
pub use scene::{FormRow, FormView, Scene};
pub use stimulus::{PlannedTrial, StimulusKind, StimulusPair};
pub use trial::{Response, TrialRecord, TrialState};
