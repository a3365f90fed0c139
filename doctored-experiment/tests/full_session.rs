use doctored_core::{InputKey, Response, SessionPhase, TrialState};
use doctored_experiment::{
    ResultStore, SessionConfig, SessionEvent, SessionInputs, SessionOutcome, SessionStateMachine,
    StimulusConfig,
};
use doctored_timing::ManualTimer;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::Path;

type Session = SessionStateMachine<ManualTimer>;

/// Four image pairs and six questions over three categories.
fn fixture(root: &Path) -> SessionConfig {
    let stimuli = root.join("stimuli");
    fs::create_dir_all(&stimuli).unwrap();
    for n in 1..=4 {
        fs::write(stimuli.join(format!("signal{n}.jpg")), b"").unwrap();
        fs::write(stimuli.join(format!("noise{n}.jpg")), b"").unwrap();
    }
    let questions = root.join("questions.csv");
    fs::write(
        &questions,
        "question,category\n\
         Do you trust photos in the news?,trust\n\
         Do you trust photos on social media?,trust\n\
         Do you post photos weekly?,habits\n\
         Do you edit photos before posting?,habits\n\
         Have you reported a fake image?,checking\n\
         Do you reverse-search images?,checking\n",
    )
    .unwrap();
    SessionConfig {
        stimuli: StimulusConfig {
            dir: stimuli,
            ..StimulusConfig::default()
        },
        questions_path: questions,
        data_dir: root.join("data"),
        ..SessionConfig::default()
    }
}

fn start(config: &SessionConfig, seed: u64) -> (Session, ManualTimer) {
    let inputs = SessionInputs::load(config).unwrap();
    let timer = ManualTimer::new();
    let session = SessionStateMachine::new(
        config.clone(),
        inputs,
        timer.clone(),
        StdRng::seed_from_u64(seed),
    );
    (session, timer)
}

/// Drives one frame: tick, present, tick.
fn frame(session: &mut Session, timer: &ManualTimer, ms: u64) -> Vec<SessionEvent> {
    timer.advance_ms(ms);
    let mut events = session.update();
    events.extend(session.on_frame_presented());
    events
}

fn run_trials(session: &mut Session, timer: &ManualTimer, answers: &[Option<char>]) {
    session.handle_key(InputKey::Char(' '));
    assert_eq!(session.phase, SessionPhase::Trials);
    for answer in answers {
        // A key during fixation must not leak into the trial.
        session.handle_key(InputKey::Char('j'));
        while session.current_trial_state() == Some(TrialState::Fixation) {
            frame(session, timer, 16);
        }
        assert_eq!(session.current_trial_state(), Some(TrialState::Response));
        match answer {
            Some(key) => {
                timer.advance_ms(450);
                session.handle_key(InputKey::Char(*key));
            }
            None => {
                while session.phase.is_trials()
                    && session.current_trial_state() == Some(TrialState::Response)
                {
                    frame(session, timer, 16);
                }
            }
        }
    }
}

fn finish_survey(session: &mut Session, yes_count: usize) {
    session.handle_key(InputKey::Char('n'));
    session.handle_key(InputKey::Char('y'));
    assert_eq!(session.phase, SessionPhase::Survey);
    for i in 0..6 {
        let key = if i < yes_count { 'y' } else { 'n' };
        session.handle_key(InputKey::Char(key));
    }
    assert_eq!(session.phase, SessionPhase::Demographics);
}

fn fill_form(session: &mut Session) {
    for c in "27".chars() {
        session.handle_key(InputKey::Char(c));
    }
    session.handle_key(InputKey::Tab);
    session.handle_key(InputKey::Right);
    session.handle_key(InputKey::Tab);
    session.handle_key(InputKey::Char('5'));
    let events = session.handle_key(InputKey::Enter);
    assert!(events.contains(&SessionEvent::Finished(SessionOutcome::Completed)));
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn completed_run_writes_one_row_per_pair_and_one_participant() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 1);

    run_trials(
        &mut session,
        &timer,
        &[Some('j'), Some('f'), None, Some('j')],
    );
    assert_eq!(session.phase, SessionPhase::ComprehensionGate);
    finish_survey(&mut session, 4);
    fill_form(&mut session);

    let report = session.into_report();
    assert_eq!(report.trials.len(), 4);
    let responses: Vec<_> = report.trials.iter().map(|t| t.response).collect();
    assert_eq!(
        responses,
        [Response::Signal, Response::Noise, Response::Timeout, Response::Signal]
    );
    for trial in &report.trials {
        assert!(trial.reaction_time >= 0.0 && trial.reaction_time <= 2.0);
    }
    assert_eq!(report.tally.len(), 3);
    assert_eq!(report.tally.total(), 4);

    let store = ResultStore::new(&config.data_dir);
    let summary = store.save(&report, config.keep_trials_on_abort).unwrap();
    assert_eq!(summary.trial_rows, 4);
    assert!(summary.participant_row);

    let trials = read_lines(store.trial_path());
    assert_eq!(trials.len(), 5);
    let participants = read_lines(store.participant_path());
    assert_eq!(participants.len(), 2);
    let header: Vec<_> = participants[0].split(',').collect();
    assert_eq!(&header[7..], ["checking", "habits", "trust"]);
    let counts: u32 = participants[1]
        .split(',')
        .skip(7)
        .map(|v| v.parse::<u32>().unwrap())
        .sum();
    assert_eq!(counts, 4);
}

#[test]
fn mask_is_balanced_across_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    for seed in 0..8 {
        let (session, _) = start(&config, seed);
        let signal = session
            .plan()
            .iter()
            .filter(|t| t.shown == doctored_core::StimulusKind::Signal)
            .count();
        assert_eq!(signal, 2);
    }
}

#[test]
fn abort_mid_trials_appends_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 2);

    run_trials(&mut session, &timer, &[Some('j'), Some('f')]);
    let events = session.handle_key(InputKey::Escape);
    assert!(events.contains(&SessionEvent::Finished(SessionOutcome::Aborted {
        during: SessionPhase::Trials,
    })));

    let report = session.into_report();
    assert_eq!(report.trials.len(), 2);
    let store = ResultStore::new(&config.data_dir);
    store.save(&report, config.keep_trials_on_abort).unwrap();
    assert!(!store.trial_path().exists());
    assert!(!store.participant_path().exists());
}

#[test]
fn abort_during_survey_loses_partial_tallies() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 3);

    run_trials(&mut session, &timer, &[None, None, None, None]);
    session.handle_key(InputKey::Char('y'));
    session.handle_key(InputKey::Char('y'));
    session.handle_key(InputKey::Escape);
    assert!(session.is_finished());

    let store = ResultStore::new(&config.data_dir);
    store.save(&session.into_report(), false).unwrap();
    assert!(!store.participant_path().exists());
}

#[test]
fn abort_at_the_gate_appends_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 5);

    run_trials(&mut session, &timer, &[Some('j'), None, Some('f'), Some('j')]);
    assert_eq!(session.phase, SessionPhase::ComprehensionGate);
    let events = session.handle_key(InputKey::Escape);
    assert!(events.contains(&SessionEvent::Finished(SessionOutcome::Aborted {
        during: SessionPhase::ComprehensionGate,
    })));

    let report = session.into_report();
    assert_eq!(report.trials.len(), 4);
    let store = ResultStore::new(&config.data_dir);
    store.save(&report, config.keep_trials_on_abort).unwrap();
    assert!(!store.trial_path().exists());
    assert!(!store.participant_path().exists());
}

#[test]
fn window_closed_on_the_form_still_saves_trials() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 6);

    run_trials(&mut session, &timer, &[Some('j'), Some('f'), None, Some('j')]);
    finish_survey(&mut session, 2);
    assert_eq!(session.phase, SessionPhase::Demographics);
    session.interrupt();

    let report = session.into_report();
    assert_eq!(
        report.outcome,
        SessionOutcome::Interrupted {
            during: SessionPhase::Demographics,
        }
    );
    let store = ResultStore::new(&config.data_dir);
    let summary = store.save(&report, config.keep_trials_on_abort).unwrap();
    assert_eq!(summary.trial_rows, 4);
    assert_eq!(read_lines(store.trial_path()).len(), 1 + 4);
    assert!(!store.participant_path().exists());
}

#[test]
fn two_runs_share_one_header() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let store = ResultStore::new(&config.data_dir);

    for seed in [10, 11] {
        let (mut session, timer) = start(&config, seed);
        run_trials(
            &mut session,
            &timer,
            &[Some('j'), Some('j'), Some('f'), Some('f')],
        );
        finish_survey(&mut session, 1);
        fill_form(&mut session);
        store.save(&session.into_report(), false).unwrap();
    }

    let trials = read_lines(store.trial_path());
    assert_eq!(trials.len(), 1 + 8);
    assert_eq!(trials.iter().filter(|l| l.starts_with("subject_id")).count(), 1);
    let participants = read_lines(store.participant_path());
    assert_eq!(participants.len(), 1 + 2);
}

#[test]
fn declined_demographics_keep_trial_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path());
    let (mut session, timer) = start(&config, 4);

    run_trials(&mut session, &timer, &[Some('f'), None, Some('j'), None]);
    finish_survey(&mut session, 0);
    session.handle_key(InputKey::Escape);
    assert_eq!(session.phase, SessionPhase::ConfirmDecline);
    session.handle_key(InputKey::Char('y'));

    let report = session.into_report();
    assert_eq!(report.outcome, SessionOutcome::DemographicsDeclined);
    let store = ResultStore::new(&config.data_dir);
    let summary = store.save(&report, false).unwrap();
    assert_eq!(summary.trial_rows, 4);
    assert!(!summary.participant_row);
    assert!(!store.participant_path().exists());
}

#[test]
fn missing_questions_fail_before_the_session_starts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fixture(dir.path());
    config.questions_path = dir.path().join("absent.csv");
    assert!(SessionInputs::load(&config).is_err());
}
