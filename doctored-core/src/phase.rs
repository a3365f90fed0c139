/// Phases of a session, in the order they are run.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Instructions,
    Trials,
    ComprehensionGate,
    Survey,
    Demographics,
    /// Asked after the participant cancels the demographic form.
    ConfirmDecline,
    Finished,
}

impl SessionPhase {
    /// Phase that follows on the normal path. The decline confirmation is a
    /// detour off the form and has no successor of its own.
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Instructions => Trials,
            Trials => ComprehensionGate,
            ComprehensionGate => Survey,
            Survey => Demographics,
            Demographics => Finished,
            ConfirmDecline | Finished => return None,
        })
    }

    /// Phases where the abort key ends the session on the spot.
    pub fn is_abort_site(&self) -> bool {
        matches!(
            self,
            Self::Trials | Self::ComprehensionGate | Self::Survey
        )
    }

    /// True once every trial has been run.
    pub fn is_past_trials(&self) -> bool {
        matches!(
            self,
            Self::ComprehensionGate
                | Self::Survey
                | Self::Demographics
                | Self::ConfirmDecline
                | Self::Finished
        )
    }

    pub fn is_trials(&self) -> bool {
        matches!(self, Self::Trials)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instructions => "instructions",
            Self::Trials => "trials",
            Self::ComprehensionGate => "comprehension_gate",
            Self::Survey => "survey",
            Self::Demographics => "demographics",
            Self::ConfirmDecline => "confirm_decline",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
