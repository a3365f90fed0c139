use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The two image categories being discriminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    /// Manipulated image.
    Signal,
    /// Original image.
    Noise,
}

impl StimulusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StimulusKind::Signal => "signal",
            StimulusKind::Noise => "noise",
        }
    }
}

/// A manipulated image and the original it was made from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusPair {
    pub signal: PathBuf,
    pub noise: PathBuf,
}

impl StimulusPair {
    pub fn path_for(&self, kind: StimulusKind) -> &Path {
        match kind {
            StimulusKind::Signal => &self.signal,
            StimulusKind::Noise => &self.noise,
        }
    }
}

/// One pair after randomization, with the image chosen for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTrial {
    pub pair: StimulusPair,
    pub shown: StimulusKind,
}

impl PlannedTrial {
    pub fn image(&self) -> &Path {
        self.pair.path_for(self.shown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_trial_shows_the_masked_image() {
        let pair = StimulusPair {
            signal: PathBuf::from("stimuli/signal1.jpg"),
            noise: PathBuf::from("stimuli/noise1.jpg"),
        };
        let shown_noise = PlannedTrial {
            pair: pair.clone(),
            shown: StimulusKind::Noise,
        };
        let shown_signal = PlannedTrial {
            pair,
            shown: StimulusKind::Signal,
        };
        assert_eq!(shown_noise.image(), Path::new("stimuli/noise1.jpg"));
        assert_eq!(shown_signal.image(), Path::new("stimuli/signal1.jpg"));
    }
}
