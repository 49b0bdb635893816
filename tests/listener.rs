//! Listener Integration Tests
//!
//! Runs full listening sessions over scripted audio and fake collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use almex::config::ListenerSettings;
use almex::core::{
    shutdown_channel, ActivationState, Collaborators, Listener, ManualClock, SessionEnd,
    SHUTDOWN_GRACE,
};
use almex::store::{ConversationStore, SqliteStore};

use common::{
    at, loud, murmur, silence, CountingWakeLock, RecordingSpeaker, ScriptedResponder,
    ScriptedSource, ScriptedTranscriber,
};

struct Rig {
    clock: Arc<ManualClock>,
    source: Arc<ScriptedSource>,
    wake_lock: Arc<CountingWakeLock>,
    transcriber: Arc<ScriptedTranscriber>,
    responder: Arc<ScriptedResponder>,
    conversations: Arc<SqliteStore>,
    speaker: Arc<RecordingSpeaker>,
}

impl Rig {
    fn new(
        frames: Vec<Vec<i16>>,
        transcriber: ScriptedTranscriber,
        responder: ScriptedResponder,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(at("2024-01-01 08:00:00")));
        Self {
            source: Arc::new(ScriptedSource::new(frames, clock.clone())),
            clock,
            wake_lock: Arc::new(CountingWakeLock::default()),
            transcriber: Arc::new(transcriber),
            responder: Arc::new(responder),
            conversations: Arc::new(SqliteStore::open_in_memory().unwrap()),
            speaker: Arc::new(RecordingSpeaker::default()),
        }
    }

    fn listener(&self) -> Listener {
        Listener::new(
            self.source.clone(),
            self.wake_lock.clone(),
            Collaborators {
                transcriber: self.transcriber.clone(),
                responder: self.responder.clone(),
                conversations: self.conversations.clone(),
                speaker: self.speaker.clone(),
            },
            self.clock.clone(),
            ListenerSettings::default(),
        )
    }

    fn assert_released(&self) {
        assert_eq!(self.wake_lock.acquired(), 1);
        assert_eq!(self.wake_lock.released(), 1);
        assert_eq!(self.source.opened(), 1);
        assert_eq!(self.source.closed(), 1);
    }
}

/// One spoken command: wake, a little speech, then 11 s of silence
fn command_frames() -> Vec<Vec<i16>> {
    let mut frames = vec![loud(), murmur(), murmur()];
    frames.extend((0..172).map(|_| silence()));
    frames
}

#[tokio::test]
async fn test_full_cycle_stores_and_speaks_reply() {
    let rig = Rig::new(
        command_frames(),
        ScriptedTranscriber::saying("what do I have today"),
        ScriptedResponder::replying("You have gym at eight."),
    );
    let listener = rig.listener();
    let status = listener.status();

    let (_trigger, shutdown) = shutdown_channel();
    let end = listener.run(shutdown).await.unwrap();

    assert_eq!(end, SessionEnd::StreamEnded);
    rig.assert_released();
    assert_eq!(rig.transcriber.calls(), 1);
    assert_eq!(rig.speaker.spoken(), vec!["You have gym at eight."]);
    assert_eq!(
        rig.responder.contexts.lock().unwrap().as_slice(),
        ["This is the first conversation with the user."]
    );

    let turns = rig.conversations.recent_turns(10).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_message, "what do I have today");
    assert!(turns[0].summary.starts_with("User: what do I have today"));

    let status = status.borrow().clone();
    assert_eq!(status.state, ActivationState::Idle);
    assert!(!status.processing);
    assert_eq!(status.captures_finalized, 1);
    assert_eq!(status.exchanges_completed, 1);
}

#[tokio::test]
async fn test_transcription_failure_still_releases_resources() {
    let rig = Rig::new(
        command_frames(),
        ScriptedTranscriber::failing(),
        ScriptedResponder::replying("unused"),
    );
    let listener = rig.listener();
    let status = listener.status();

    let (_trigger, shutdown) = shutdown_channel();
    listener.run(shutdown).await.unwrap();

    rig.assert_released();
    assert!(rig.speaker.spoken().is_empty());
    assert!(rig.conversations.recent_turns(10).unwrap().is_empty());

    let status = status.borrow().clone();
    assert_eq!(status.state, ActivationState::Idle);
    assert_eq!(status.captures_finalized, 1);
    assert_eq!(status.exchanges_completed, 0);
}

#[tokio::test]
async fn test_response_failure_uses_fallback_reply() {
    let rig = Rig::new(
        command_frames(),
        ScriptedTranscriber::saying("hello"),
        ScriptedResponder::failing(),
    );

    let (_trigger, shutdown) = shutdown_channel();
    rig.listener().run(shutdown).await.unwrap();

    rig.assert_released();
    let spoken = rig.speaker.spoken();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].starts_with("Sorry"));
    assert_eq!(rig.conversations.recent_turns(10).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_wake_during_dispatch_is_ignored() {
    // A second command right after the first window closes. The responder
    // only answers once the frame loop goes quiet, so those frames arrive
    // while the first dispatch is still in flight.
    let mut frames = command_frames();
    frames.extend(command_frames());

    let rig = Rig::new(
        frames,
        ScriptedTranscriber::saying("hello"),
        ScriptedResponder::slow("hi", Duration::from_secs(60)),
    );
    let listener = rig.listener();
    let status = listener.status();

    let (_trigger, shutdown) = shutdown_channel();
    listener.run(shutdown).await.unwrap();

    rig.assert_released();
    assert_eq!(status.borrow().captures_finalized, 1);
    assert_eq!(rig.transcriber.calls(), 1);
    assert_eq!(rig.speaker.spoken(), vec!["hi"]);
}

#[tokio::test]
async fn test_shutdown_releases_open_microphone() {
    let clock = Arc::new(ManualClock::new(at("2024-01-01 08:00:00")));
    let mut source = ScriptedSource::new(vec![loud(), murmur()], clock.clone());
    source.hold_open = true;

    let rig = Rig {
        source: Arc::new(source),
        clock,
        ..Rig::new(
            Vec::new(),
            ScriptedTranscriber::saying("unused"),
            ScriptedResponder::replying("unused"),
        )
    };
    let listener = rig.listener();
    let status = listener.status();

    let (trigger, shutdown) = shutdown_channel();
    let session = tokio::spawn(async move { listener.run(shutdown).await });

    // Wait until the window is open, then stop mid-capture
    let mut watch = status.clone();
    tokio::time::timeout(
        Duration::from_secs(5),
        watch.wait_for(|s| s.state == ActivationState::Active),
    )
    .await
    .unwrap()
    .unwrap();
    trigger.trigger();

    let end = tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(end, SessionEnd::Shutdown);
    rig.assert_released();
    assert_eq!(status.borrow().state, ActivationState::Idle);
    assert_eq!(rig.transcriber.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_dispatch_releases_promptly() {
    let clock = Arc::new(ManualClock::new(at("2024-01-01 08:00:00")));
    let mut source = ScriptedSource::new(command_frames(), clock.clone());
    source.hold_open = true;

    let rig = Rig {
        source: Arc::new(source),
        clock,
        ..Rig::new(
            Vec::new(),
            ScriptedTranscriber::saying("hello"),
            ScriptedResponder::slow("too late", Duration::from_secs(60)),
        )
    };
    let listener = rig.listener();
    let status = listener.status();

    let (trigger, shutdown) = shutdown_channel();
    let session = tokio::spawn(async move { listener.run(shutdown).await });

    let mut watch = status.clone();
    watch.wait_for(|s| s.processing).await.unwrap();
    let stopped_at = tokio::time::Instant::now();
    trigger.trigger();

    // Microphone and wake lock go within one frame, not after the reply
    tokio::time::sleep(Duration::from_millis(64)).await;
    assert_eq!(rig.source.closed(), 1);
    assert_eq!(rig.wake_lock.released(), 1);

    let end = session.await.unwrap().unwrap();
    assert_eq!(end, SessionEnd::Shutdown);
    assert!(stopped_at.elapsed() <= SHUTDOWN_GRACE + Duration::from_millis(100));

    rig.assert_released();
    assert!(rig.speaker.spoken().is_empty());
    assert!(rig.conversations.recent_turns(10).unwrap().is_empty());
    let status = status.borrow().clone();
    assert_eq!(status.state, ActivationState::Idle);
    assert!(!status.processing);
    assert_eq!(status.exchanges_completed, 0);
}

#[tokio::test]
async fn test_unavailable_microphone_releases_wake_lock() {
    let clock = Arc::new(ManualClock::new(at("2024-01-01 08:00:00")));
    let wake_lock = Arc::new(CountingWakeLock::default());
    let listener = Listener::new(
        Arc::new(ScriptedSource::unavailable(clock.clone())),
        wake_lock.clone(),
        Collaborators {
            transcriber: Arc::new(ScriptedTranscriber::saying("unused")),
            responder: Arc::new(ScriptedResponder::replying("unused")),
            conversations: Arc::new(SqliteStore::open_in_memory().unwrap()),
            speaker: Arc::new(RecordingSpeaker::default()),
        },
        clock,
        ListenerSettings::default(),
    );

    let (_trigger, shutdown) = shutdown_channel();
    assert!(listener.run(shutdown).await.is_err());
    assert_eq!(wake_lock.acquired(), 1);
    assert_eq!(wake_lock.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_forever_retries_until_shutdown() {
    let clock = Arc::new(ManualClock::new(at("2024-01-01 08:00:00")));
    let wake_lock = Arc::new(CountingWakeLock::default());
    let listener = Listener::new(
        Arc::new(ScriptedSource::unavailable(clock.clone())),
        wake_lock.clone(),
        Collaborators {
            transcriber: Arc::new(ScriptedTranscriber::saying("unused")),
            responder: Arc::new(ScriptedResponder::replying("unused")),
            conversations: Arc::new(SqliteStore::open_in_memory().unwrap()),
            speaker: Arc::new(RecordingSpeaker::default()),
        },
        clock,
        ListenerSettings {
            retry_delay_secs: 5,
            ..ListenerSettings::default()
        },
    );

    let (trigger, shutdown) = shutdown_channel();
    let task = tokio::spawn(listener.run_forever(shutdown));

    tokio::time::sleep(Duration::from_secs(12)).await;
    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    // Attempts at 0 s, 5 s and 10 s
    assert_eq!(wake_lock.acquired(), 3);
    assert_eq!(wake_lock.released(), 3);
}
