use doctored_core::TrialState;

/// The trial currently on screen. `plan_index` points into the shuffled plan
/// and doubles as the trial id.
#[derive(Debug, Clone)]
pub struct Trial<T> {
    pub plan_index: usize,
    pub state: TrialState,
    pub timestamps: TrialTimestamps<T>,
}

#[derive(Debug, Clone)]
pub struct TrialTimestamps<T> {
    pub fixation_start: T,
    /// Set on the first presented frame that shows the image.
    pub stimulus_onset: Option<T>,
    pub response: Option<T>,
}

impl<T: Copy> Trial<T> {
    pub fn new(plan_index: usize, now: T) -> Self {
        Self {
            plan_index,
            state: TrialState::Fixation,
            timestamps: TrialTimestamps {
                fixation_start: now,
                stimulus_onset: None,
                response: None,
            },
        }
    }
}
