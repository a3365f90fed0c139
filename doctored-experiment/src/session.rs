use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::form::{DemographicForm, FormAction};
use crate::prompts;
use crate::stimuli::{discover_pairs, plan_trials};
use crate::survey::{Question, load_questions, tally_for};
use crate::trial::Trial;
use doctored_core::{
    CategoryTally, Decision, Demographics, InputKey, KeyContext, PlannedTrial, Response, Scene,
    SessionPhase, StimulusPair, TrialRecord, TrialState,
};
use doctored_timing::Timer;
use rand::Rng;
use rand::seq::SliceRandom;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    TrialStarted(usize),
    StimulusOnset(usize),
    TrialRecorded {
        trial_id: usize,
        response: Response,
    },
    /// The comprehension prompt was not confirmed and is shown again.
    GateRetry,
    QuestionAnswered {
        category: String,
        yes: bool,
    },
    FormRejected,
    Finished(SessionOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    /// The participant cancelled the demographic form and confirmed.
    DemographicsDeclined,
    Aborted {
        during: SessionPhase,
    },
    /// The session stopped without the abort key, e.g. the window was
    /// closed or the display failed.
    Interrupted {
        during: SessionPhase,
    },
}

impl SessionOutcome {
    /// Whether the recorded trials go to disk.
    ///
    /// Only an interruption after the trial loop keeps them unconditionally.
    /// Aborts, and interruptions before the loop finished, follow
    /// `keep_trials_on_abort`.
    pub fn saves_trials(&self, keep_trials_on_abort: bool) -> bool {
        match self {
            Self::Completed | Self::DemographicsDeclined => true,
            Self::Interrupted { during } if during.is_past_trials() => true,
            Self::Aborted { .. } | Self::Interrupted { .. } => keep_trials_on_abort,
        }
    }
}

/// Validated inputs for one session.
#[derive(Debug, Clone)]
pub struct SessionInputs {
    pub pairs: Vec<StimulusPair>,
    pub questions: Vec<Question>,
}

impl SessionInputs {
    /// Reads the stimulus directory and the question table named by `config`.
    pub fn load(config: &SessionConfig) -> Result<Self, SessionError> {
        let pairs = discover_pairs(&config.stimuli)?;
        tracing::info!(
            pairs = pairs.len(),
            dir = %config.stimuli.dir.display(),
            "paired stimulus images"
        );
        let questions = load_questions(&config.questions_path)?;
        Ok(Self { pairs, questions })
    }
}

/// Everything a session produced, handed to storage once it is over.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub participant_id: Uuid,
    pub trials: Vec<TrialRecord>,
    pub tally: CategoryTally,
    pub demographics: Option<Demographics>,
    pub outcome: SessionOutcome,
}

/// Accumulated results of the running session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub participant_id: Uuid,
    pub trials: Vec<TrialRecord>,
    pub tally: CategoryTally,
    pub demographics: Option<Demographics>,
}

struct Texts {
    instructions: String,
    gate: String,
    confirm_decline: String,
    form_hint: String,
}

pub struct SessionStateMachine<T>
where
    T: Timer,
{
    pub phase: SessionPhase,
    pub timer: T,
    pub config: SessionConfig,
    context: SessionContext,
    plan: Vec<PlannedTrial>,
    current: Option<Trial<T::Timestamp>>,
    next_trial: usize,
    questions: Vec<Question>,
    question_index: usize,
    form: DemographicForm,
    outcome: Option<SessionOutcome>,
    texts: Texts,
}

impl<T> SessionStateMachine<T>
where
    T: Timer<Timestamp = u64>,
{
    /// Plans the trials and question order from `rng`. Nothing is shuffled
    /// after this.
    pub fn new<R: Rng>(
        config: SessionConfig,
        inputs: SessionInputs,
        timer: T,
        mut rng: R,
    ) -> Self {
        let SessionInputs {
            pairs,
            mut questions,
        } = inputs;
        let plan = plan_trials(pairs, &mut rng);
        let tally = tally_for(&questions);
        questions.shuffle(&mut rng);

        let texts = Texts {
            instructions: prompts::instructions(&config.keys, config.response_window_ms),
            gate: prompts::comprehension_gate(&config.keys),
            confirm_decline: prompts::confirm_decline(&config.keys),
            form_hint: prompts::form_hint(&config.keys),
        };
        let participant_id = Uuid::new_v4();
        tracing::info!(
            %participant_id,
            trials = plan.len(),
            questions = questions.len(),
            "session prepared"
        );

        Self {
            phase: SessionPhase::default(),
            timer,
            config,
            context: SessionContext {
                participant_id,
                trials: Vec::with_capacity(plan.len()),
                tally,
                demographics: None,
            },
            plan,
            current: None,
            next_trial: 0,
            questions,
            question_index: 0,
            form: DemographicForm::new(),
            outcome: None,
            texts,
        }
    }

    /// Feeds one key press into the current phase.
    pub fn handle_key(&mut self, key: InputKey) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let keys = &self.config.keys;

        match self.phase {
            SessionPhase::Instructions => self.advance_phase(&mut events),
            SessionPhase::Trials => match keys.classify(&key, KeyContext::Trial) {
                Decision::Abort => self.abort(&mut events),
                decision @ (Decision::Reject | Decision::Accept) => {
                    self.record_response(Response::from_decision(decision), &mut events)
                }
                _ => {}
            },
            SessionPhase::ComprehensionGate => match keys.classify(&key, KeyContext::YesNo) {
                Decision::Abort => self.abort(&mut events),
                Decision::Yes => self.advance_phase(&mut events),
                _ => {
                    tracing::debug!(%key, "comprehension gate not confirmed");
                    events.push(SessionEvent::GateRetry);
                }
            },
            SessionPhase::Survey => match keys.classify(&key, KeyContext::YesNo) {
                Decision::Abort => self.abort(&mut events),
                Decision::Yes => self.answer_question(true, &mut events),
                Decision::No => self.answer_question(false, &mut events),
                _ => {}
            },
            SessionPhase::Demographics => {
                let cancel = keys.abort;
                match self.form.handle_key(key, &cancel) {
                    FormAction::Submitted(demographics) => {
                        tracing::info!(
                            age = demographics.age,
                            gender = %demographics.gender,
                            "demographics submitted"
                        );
                        self.context.demographics = Some(demographics);
                        self.finish(SessionOutcome::Completed, &mut events);
                    }
                    FormAction::Cancelled => {
                        self.enter_phase(SessionPhase::ConfirmDecline, &mut events)
                    }
                    FormAction::Invalid => events.push(SessionEvent::FormRejected),
                    _ => {}
                }
            }
            SessionPhase::ConfirmDecline => match keys.classify(&key, KeyContext::YesNo) {
                Decision::Yes => self.finish(SessionOutcome::DemographicsDeclined, &mut events),
                Decision::No | Decision::Abort => {
                    self.enter_phase(SessionPhase::Demographics, &mut events)
                }
                _ => {}
            },
            SessionPhase::Finished => {}
        }

        events
    }

    /// Advances timed trial states. Call once per frame.
    pub fn update(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.phase.is_trials() {
            return events;
        }
        let fixation = self.config.fixation();
        let window = self.config.response_window();

        let Some(trial) = &mut self.current else {
            return events;
        };
        match trial.state {
            TrialState::Fixation => {
                if self.timer.elapsed(trial.timestamps.fixation_start) >= fixation {
                    trial.state = TrialState::Stimulus;
                }
            }
            TrialState::Response => {
                let elapsed = trial
                    .timestamps
                    .stimulus_onset
                    .map(|onset| self.timer.elapsed(onset))
                    .unwrap_or_default();
                if elapsed >= window {
                    self.record_response(Response::Timeout, &mut events);
                }
            }
            TrialState::Stimulus | TrialState::Complete => {}
        }
        events
    }

    /// Tells the session a frame has reached the screen. The first frame
    /// carrying the image starts the reaction-time clock.
    pub fn on_frame_presented(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.phase.is_trials() {
            return events;
        }
        let now = self.timer.now();
        if let Some(trial) = &mut self.current {
            if trial.state == TrialState::Stimulus {
                trial.state = TrialState::Response;
                trial.timestamps.stimulus_onset = Some(now);
                tracing::debug!(trial = trial.plan_index, onset_ns = now, "stimulus on screen");
                events.push(SessionEvent::StimulusOnset(trial.plan_index));
            }
        }
        events
    }

    /// Ends the session from outside the key path, e.g. when the window is
    /// closed or can no longer be drawn. Unlike the abort key this keeps
    /// trials once the trial loop is over.
    pub fn interrupt(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !self.phase.is_finished() {
            let during = self.phase;
            tracing::warn!(
                %during,
                trials = self.context.trials.len(),
                "session interrupted"
            );
            self.finish(SessionOutcome::Interrupted { during }, &mut events);
        }
        events
    }

    fn advance_phase(&mut self, events: &mut Vec<SessionEvent>) {
        if let Some(next) = self.phase.next() {
            self.enter_phase(next, events);
        }
    }

    fn enter_phase(&mut self, to: SessionPhase, events: &mut Vec<SessionEvent>) {
        let from = self.phase;
        self.phase = to;
        tracing::info!(%from, %to, "phase changed");
        events.push(SessionEvent::PhaseChanged { from, to });

        match to {
            SessionPhase::Trials if self.plan.is_empty() => self.advance_phase(events),
            SessionPhase::Trials => self.start_trial(events),
            SessionPhase::Survey if self.questions.is_empty() => self.advance_phase(events),
            SessionPhase::Finished => {
                if self.outcome.is_none() {
                    self.outcome = Some(SessionOutcome::Completed);
                }
            }
            _ => {}
        }
    }

    fn start_trial(&mut self, events: &mut Vec<SessionEvent>) {
        let index = self.next_trial;
        let now = self.timer.now();
        self.current = Some(Trial::new(index, now));
        tracing::debug!(trial = index, at_ns = now, "trial started");
        events.push(SessionEvent::TrialStarted(index));
    }

    /// Records the response for the current trial during the Response state.
    /// A key that lands after the window closed counts as a timeout.
    fn record_response(&mut self, response: Response, events: &mut Vec<SessionEvent>) {
        let window = self.config.response_window();
        let now = self.timer.now();
        let Some(trial) = &mut self.current else {
            return;
        };
        if trial.state != TrialState::Response {
            return;
        }
        let elapsed = trial
            .timestamps
            .stimulus_onset
            .map(|onset| self.timer.elapsed(onset))
            .unwrap_or_default();
        let (response, reaction_time) = if response == Response::Timeout || elapsed > window {
            (Response::Timeout, window)
        } else {
            (response, elapsed)
        };
        trial.timestamps.response = Some(now);
        trial.state = TrialState::Complete;

        let planned = &self.plan[trial.plan_index];
        let record = TrialRecord {
            subject_id: self.context.participant_id,
            trial_id: trial.plan_index,
            stimuli_type: planned.shown,
            stimuli: planned.image().display().to_string(),
            response,
            reaction_time: reaction_time.as_secs_f64(),
        };
        tracing::info!(
            trial = record.trial_id,
            shown = planned.shown.as_str(),
            response = response.as_str(),
            rt_ms = reaction_time.as_secs_f64() * 1e3,
            "trial recorded"
        );
        events.push(SessionEvent::TrialRecorded {
            trial_id: record.trial_id,
            response,
        });
        self.context.trials.push(record);

        self.current = None;
        self.next_trial += 1;
        if self.next_trial < self.plan.len() {
            self.start_trial(events);
        } else {
            self.advance_phase(events);
        }
    }

    fn answer_question(&mut self, yes: bool, events: &mut Vec<SessionEvent>) {
        let Some(question) = self.questions.get(self.question_index) else {
            return;
        };
        if yes {
            self.context.tally.record_yes(&question.category);
        }
        events.push(SessionEvent::QuestionAnswered {
            category: question.category.clone(),
            yes,
        });
        self.question_index += 1;
        if self.question_index >= self.questions.len() {
            tracing::info!(yes = self.context.tally.total(), "survey complete");
            self.advance_phase(events);
        }
    }

    fn abort(&mut self, events: &mut Vec<SessionEvent>) {
        let during = self.phase;
        tracing::warn!(
            %during,
            trials = self.context.trials.len(),
            "session aborted by participant"
        );
        self.finish(SessionOutcome::Aborted { during }, events);
    }

    fn finish(&mut self, outcome: SessionOutcome, events: &mut Vec<SessionEvent>) {
        self.current = None;
        self.outcome = Some(outcome);
        self.enter_phase(SessionPhase::Finished, events);
        events.push(SessionEvent::Finished(outcome));
    }

    /// What should be on screen right now.
    pub fn scene(&self) -> Scene<'_> {
        match self.phase {
            SessionPhase::Instructions => Scene::Text(&self.texts.instructions),
            SessionPhase::Trials => match self.current.as_ref() {
                Some(t) if t.state == TrialState::Fixation => Scene::Fixation,
                Some(t) if matches!(t.state, TrialState::Stimulus | TrialState::Response) => {
                    Scene::Image(self.plan[t.plan_index].image())
                }
                _ => Scene::Blank,
            },
            SessionPhase::ComprehensionGate => Scene::Text(&self.texts.gate),
            SessionPhase::Survey => self
                .questions
                .get(self.question_index)
                .map_or(Scene::Blank, |q| Scene::Text(&q.question)),
            SessionPhase::Demographics => Scene::Form(self.form.view(&self.texts.form_hint)),
            SessionPhase::ConfirmDecline => Scene::Text(&self.texts.confirm_decline),
            SessionPhase::Finished => Scene::Text(prompts::FAREWELL),
        }
    }

    pub fn current_phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.outcome
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn plan(&self) -> &[PlannedTrial] {
        &self.plan
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_trial_state(&self) -> Option<TrialState> {
        self.current.as_ref().map(|t| t.state)
    }

    /// (1-based trial number, total) while trials are running.
    pub fn trial_progress(&self) -> Option<(usize, usize)> {
        self.phase
            .is_trials()
            .then(|| (self.next_trial + 1, self.plan.len()))
    }

    pub fn response_window(&self) -> Duration {
        self.config.response_window()
    }

    /// Consumes the session. A session that never finished counts as
    /// interrupted in whatever phase it stopped.
    pub fn into_report(self) -> SessionReport {
        let outcome = self.outcome.unwrap_or(SessionOutcome::Interrupted {
            during: self.phase,
        });
        SessionReport {
            participant_id: self.context.participant_id,
            trials: self.context.trials,
            tally: self.context.tally,
            demographics: self.context.demographics,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctored_core::StimulusKind;
    use doctored_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;

    fn inputs(pairs: usize) -> SessionInputs {
        SessionInputs {
            pairs: (1..=pairs)
                .map(|n| StimulusPair {
                    signal: PathBuf::from(format!("stimuli/signal{n}.jpg")),
                    noise: PathBuf::from(format!("stimuli/noise{n}.jpg")),
                })
                .collect(),
            questions: vec![
                Question {
                    question: "Do you share photos?".into(),
                    category: "sharing".into(),
                },
                Question {
                    question: "Do you check sources?".into(),
                    category: "checking".into(),
                },
            ],
        }
    }

    fn session(pairs: usize) -> (SessionStateMachine<ManualTimer>, ManualTimer) {
        let timer = ManualTimer::new();
        let machine = SessionStateMachine::new(
            SessionConfig::default(),
            inputs(pairs),
            timer.clone(),
            StdRng::seed_from_u64(42),
        );
        (machine, timer)
    }

    /// Runs fixation and presents the image of the current trial.
    fn show_stimulus(s: &mut SessionStateMachine<ManualTimer>, timer: &ManualTimer) {
        timer.advance_ms(1000);
        s.update();
        s.on_frame_presented();
        assert_eq!(s.current_trial_state(), Some(TrialState::Response));
    }

    #[test]
    fn instructions_accept_any_key() {
        let (mut s, _) = session(2);
        assert!(matches!(s.scene(), Scene::Text(_)));
        let events = s.handle_key(InputKey::Char('q'));
        assert!(events.contains(&SessionEvent::PhaseChanged {
            from: SessionPhase::Instructions,
            to: SessionPhase::Trials,
        }));
        assert_eq!(s.scene(), Scene::Fixation);
    }

    #[test]
    fn escape_on_instructions_just_continues() {
        let (mut s, _) = session(2);
        s.handle_key(InputKey::Escape);
        assert_eq!(s.phase, SessionPhase::Trials);
        assert_eq!(s.outcome(), None);
    }

    #[test]
    fn fixation_lasts_the_configured_time() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        timer.advance_ms(999);
        s.update();
        assert_eq!(s.current_trial_state(), Some(TrialState::Fixation));
        timer.advance_ms(1);
        s.update();
        assert_eq!(s.current_trial_state(), Some(TrialState::Stimulus));
        assert!(matches!(s.scene(), Scene::Image(_)));
    }

    #[test]
    fn keys_before_the_image_is_shown_are_ignored() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        s.handle_key(InputKey::Char('j'));
        timer.advance_ms(1000);
        s.update();
        s.handle_key(InputKey::Char('j'));
        assert!(s.context().trials.is_empty());
    }

    #[test]
    fn response_records_reaction_time_from_onset() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        timer.advance_ms(640);
        let events = s.handle_key(InputKey::Char('j'));
        assert!(events.contains(&SessionEvent::TrialRecorded {
            trial_id: 0,
            response: Response::Signal,
        }));
        let record = &s.context().trials[0];
        assert_eq!(record.response, Response::Signal);
        assert!((record.reaction_time - 0.640).abs() < 1e-9);
        assert_eq!(record.stimuli_type, s.plan()[0].shown);
    }

    #[test]
    fn no_key_within_the_window_is_a_timeout() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        timer.advance_ms(2000);
        s.update();
        let record = &s.context().trials[0];
        assert_eq!(record.response, Response::Timeout);
        assert_eq!(record.reaction_time, 2.0);
        assert_eq!(s.phase, SessionPhase::ComprehensionGate);
    }

    #[test]
    fn late_key_before_the_tick_is_still_a_timeout() {
        let (mut s, timer) = session(2);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        timer.advance_ms(2300);
        s.handle_key(InputKey::Char('f'));
        let record = &s.context().trials[0];
        assert_eq!(record.response, Response::Timeout);
        assert_eq!(record.reaction_time, 2.0);
        // The late key must not answer the next trial either.
        assert_eq!(s.current_trial_state(), Some(TrialState::Fixation));
        assert_eq!(s.context().trials.len(), 1);
    }

    #[test]
    fn abort_during_trials_finishes_immediately() {
        let (mut s, timer) = session(3);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('f'));
        let events = s.handle_key(InputKey::Escape);
        let outcome = SessionOutcome::Aborted {
            during: SessionPhase::Trials,
        };
        assert!(events.contains(&SessionEvent::Finished(outcome)));
        assert!(s.is_finished());
        let report = s.into_report();
        assert_eq!(report.outcome, outcome);
        assert_eq!(report.trials.len(), 1);
    }

    #[test]
    fn gate_repeats_until_yes() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('j'));
        assert_eq!(s.phase, SessionPhase::ComprehensionGate);

        for key in ['n', 'f', 'x'] {
            let events = s.handle_key(InputKey::Char(key));
            assert_eq!(events, vec![SessionEvent::GateRetry]);
            assert_eq!(s.phase, SessionPhase::ComprehensionGate);
        }
        s.handle_key(InputKey::Char('j'));
        assert_eq!(s.phase, SessionPhase::Survey);
    }

    #[test]
    fn survey_counts_yes_answers_per_category() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('j'));
        s.handle_key(InputKey::Char('y'));

        let first = s.questions()[0].category.clone();
        s.handle_key(InputKey::Char('q'));
        assert_eq!(s.phase, SessionPhase::Survey);
        s.handle_key(InputKey::Char('j'));
        s.handle_key(InputKey::Char('n'));
        assert_eq!(s.phase, SessionPhase::Demographics);
        assert_eq!(s.context().tally.get(&first), Some(1));
        assert_eq!(s.context().tally.total(), 1);
    }

    #[test]
    fn cancelled_form_can_be_resumed_or_declined() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        for key in ['j', 'y', 'y', 'y'] {
            s.handle_key(InputKey::Char(key));
        }
        assert_eq!(s.phase, SessionPhase::Demographics);

        s.handle_key(InputKey::Escape);
        assert_eq!(s.phase, SessionPhase::ConfirmDecline);
        s.handle_key(InputKey::Char('n'));
        assert_eq!(s.phase, SessionPhase::Demographics);

        s.handle_key(InputKey::Escape);
        let events = s.handle_key(InputKey::Char('y'));
        assert!(events.contains(&SessionEvent::Finished(
            SessionOutcome::DemographicsDeclined
        )));
        let report = s.into_report();
        assert!(report.demographics.is_none());
        assert_eq!(report.trials.len(), 1);
    }

    #[test]
    fn unfinished_session_reports_as_interrupted() {
        let (s, _) = session(1);
        assert_eq!(
            s.into_report().outcome,
            SessionOutcome::Interrupted {
                during: SessionPhase::Instructions,
            }
        );
    }

    #[test]
    fn abort_key_at_the_gate_ends_the_session() {
        let (mut s, timer) = session(1);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('f'));
        assert_eq!(s.phase, SessionPhase::ComprehensionGate);

        let events = s.handle_key(InputKey::Escape);
        let outcome = SessionOutcome::Aborted {
            during: SessionPhase::ComprehensionGate,
        };
        assert!(events.contains(&SessionEvent::Finished(outcome)));
        assert!(!outcome.saves_trials(false));
        assert_eq!(s.into_report().outcome, outcome);
    }

    #[test]
    fn interrupting_the_form_keeps_finished_trials() {
        let (mut s, timer) = session(2);
        s.handle_key(InputKey::Enter);
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('j'));
        show_stimulus(&mut s, &timer);
        s.handle_key(InputKey::Char('f'));
        for key in ['y', 'y', 'n'] {
            s.handle_key(InputKey::Char(key));
        }
        assert_eq!(s.phase, SessionPhase::Demographics);

        let events = s.interrupt();
        let outcome = SessionOutcome::Interrupted {
            during: SessionPhase::Demographics,
        };
        assert!(events.contains(&SessionEvent::Finished(outcome)));
        assert!(s.interrupt().is_empty());
        let report = s.into_report();
        assert_eq!(report.outcome, outcome);
        assert_eq!(report.trials.len(), 2);
        assert!(report.outcome.saves_trials(false));
    }

    #[test]
    fn trial_saving_depends_on_how_the_session_ended() {
        let interrupted = |during| SessionOutcome::Interrupted { during };
        let aborted = |during| SessionOutcome::Aborted { during };

        assert!(SessionOutcome::Completed.saves_trials(false));
        assert!(SessionOutcome::DemographicsDeclined.saves_trials(false));
        assert!(interrupted(SessionPhase::Survey).saves_trials(false));
        assert!(interrupted(SessionPhase::ConfirmDecline).saves_trials(false));
        assert!(!interrupted(SessionPhase::Trials).saves_trials(false));
        assert!(interrupted(SessionPhase::Trials).saves_trials(true));
        assert!(!aborted(SessionPhase::Survey).saves_trials(false));
        assert!(aborted(SessionPhase::Survey).saves_trials(true));
    }

    #[test]
    fn scene_shows_the_masked_image() {
        let (mut s, timer) = session(4);
        s.handle_key(InputKey::Enter);
        timer.advance_ms(1000);
        s.update();
        let expected = s.plan()[0].image().to_path_buf();
        assert_eq!(s.scene(), Scene::Image(expected.as_path()));
        let kinds: Vec<_> = s.plan().iter().map(|t| t.shown).collect();
        assert_eq!(kinds.iter().filter(|k| **k == StimulusKind::Signal).count(), 2);
    }
}
