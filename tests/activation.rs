//! Activation State Machine Integration Tests
//!
//! Drives the machine with synthetic frames at a 64 ms cadence.

mod common;

use std::time::{Duration, Instant};

use almex::config::ListenerSettings;
use almex::core::{ActivationMachine, ActivationState, Transition, WindowEnd};

use common::{loud, murmur, silence, FRAME};

fn machine() -> ActivationMachine {
    ActivationMachine::from_settings(&ListenerSettings::default())
}

/// Feed frames, returning every non-trivial transition with its frame index
fn drive(
    machine: &mut ActivationMachine,
    start: Instant,
    frames: impl IntoIterator<Item = Vec<i16>>,
) -> Vec<(usize, Transition)> {
    frames
        .into_iter()
        .enumerate()
        .filter_map(|(i, frame)| {
            let now = start + FRAME * i as u32;
            match machine.feed(&frame, now) {
                Transition::None => None,
                t => Some((i, t)),
            }
        })
        .collect()
}

fn frames_for(duration: Duration) -> usize {
    (duration.as_millis() / FRAME.as_millis()) as usize + 1
}

#[test]
fn test_quiet_input_never_wakes() {
    let mut machine = machine();
    let frames = (0..1000).map(|i| if i % 3 == 0 { murmur() } else { silence() });

    let transitions = drive(&mut machine, Instant::now(), frames);

    assert!(transitions.is_empty());
    assert_eq!(machine.state(), ActivationState::Idle);
}

#[test]
fn test_wake_then_silence_finalizes_exactly_once() {
    let mut machine = machine();
    let mut frames = vec![loud()];
    frames.extend((0..frames_for(Duration::from_secs(12))).map(|_| silence()));

    let transitions = drive(&mut machine, Instant::now(), frames);

    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0], (0, Transition::Woke));
    match &transitions[1] {
        (index, Transition::Finalized(capture)) => {
            // Silence must exceed 10 s: first frame after 10 s of quiet
            assert_eq!(*index, frames_for(Duration::from_secs(10)));
            assert_eq!(capture.reason, WindowEnd::Silence);
            assert_eq!(capture.samples.len(), (index + 1) * common::FRAME_SAMPLES);
            assert!(capture.duration() > Duration::from_secs(10));
        }
        other => panic!("expected finalize, got {other:?}"),
    }
    assert_eq!(machine.state(), ActivationState::Idle);
}

#[test]
fn test_periodic_activity_extends_window() {
    let mut machine = machine();
    let start = Instant::now();
    let every = frames_for(Duration::from_secs(5));
    let thirty_secs = frames_for(Duration::from_secs(30));

    // Wake, then a murmur every ~5 s for 30 s, then silence
    let mut frames = vec![loud()];
    for i in 1..thirty_secs {
        frames.push(if i % every == 0 { murmur() } else { silence() });
    }
    frames.extend((0..frames_for(Duration::from_secs(12))).map(|_| silence()));

    let mut finalized_at = None;
    for (i, frame) in frames.into_iter().enumerate() {
        let transition = machine.feed(&frame, start + FRAME * i as u32);
        if i < thirty_secs {
            assert_eq!(machine.state(), ActivationState::Active, "frame {i}");
        }
        if let Transition::Finalized(capture) = transition {
            assert!(finalized_at.is_none(), "finalized twice");
            assert!(capture.duration() > Duration::from_secs(30));
            finalized_at = Some(i);
        }
    }

    assert!(finalized_at.is_some_and(|i| i > thirty_secs));
}

#[test]
fn test_loud_frame_while_active_is_not_a_second_wake() {
    let mut machine = machine();
    let start = Instant::now();

    assert_eq!(machine.feed(&loud(), start), Transition::Woke);
    assert_eq!(machine.feed(&loud(), start + FRAME), Transition::None);
    assert_eq!(machine.state(), ActivationState::Active);
}
