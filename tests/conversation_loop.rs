//! End-to-end conversation loop tests through the public API.
//!
//! Everything runs on the shipped mocks: a scripted recognition engine, a
//! scripted chat backend, and a recording synthesis engine, so the full
//! session cycle is exercised without hardware or a network.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use voxloop::silence::SilenceTimerConfig;
use voxloop::stt::{MockEngineHandle, MockRecognitionEngine, RecognizerConfig};
use voxloop::tts::PlayerConfig;
use voxloop::{
    MockChatBackend, MockSynthesisEngine, SessionCallbacks, SessionConfig, SessionStatus,
    VoiceSession,
};

struct Harness {
    session: VoiceSession,
    engine: MockEngineHandle,
    backend: Arc<MockChatBackend>,
    synthesis: MockSynthesisEngine,
    statuses: Arc<Mutex<Vec<SessionStatus>>>,
    replies: Arc<Mutex<Vec<String>>>,
}

fn start(backend: MockChatBackend) -> Harness {
    start_with(backend, MockSynthesisEngine::new())
}

fn start_with(backend: MockChatBackend, synthesis: MockSynthesisEngine) -> Harness {
    let (engine, handle) = MockRecognitionEngine::new();
    let backend = Arc::new(backend);
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let replies = Arc::new(Mutex::new(Vec::new()));

    let config = SessionConfig {
        recognizer: RecognizerConfig {
            silence: SilenceTimerConfig {
                threshold: Duration::from_millis(50),
            },
        },
        player: PlayerConfig::default(),
        system_prompt: None,
        max_history_turns: 0,
    };

    let s = statuses.clone();
    let r = replies.clone();
    let session = VoiceSession::start(
        config,
        Box::new(engine),
        backend.clone(),
        Arc::new(synthesis.clone()),
        SessionCallbacks {
            on_status: Box::new(move |status| s.lock().unwrap().push(status)),
            on_transcript: Box::new(|_| {}),
            on_reply: Box::new(move |reply| r.lock().unwrap().push(reply.to_string())),
            on_error: Box::new(|_| {}),
        },
    )
    .unwrap();

    Harness {
        session,
        engine: handle,
        backend,
        synthesis,
        statuses,
        replies,
    }
}

fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn multi_turn_conversation_accumulates_history() {
    let mut harness = start(MockChatBackend::new().with_reply("Okay, searching."));

    harness.engine.emit_final("find me a driving job in Pune");
    assert!(wait_until(
        || harness.backend.calls().len() == 1
            && harness.session.status() == SessionStatus::Listening,
        Duration::from_secs(3)
    ));

    harness.engine.emit_final("only morning shifts");
    assert!(wait_until(
        || harness.backend.calls().len() == 2
            && harness.session.status() == SessionStatus::Listening,
        Duration::from_secs(3)
    ));

    // The second request carries the whole conversation so far.
    let calls = harness.backend.calls();
    assert_eq!(calls[0].len(), 1);
    assert_eq!(calls[1].len(), 3);
    assert_eq!(calls[1][0].content, "find me a driving job in Pune");
    assert_eq!(calls[1][1].content, "Okay, searching.");
    assert_eq!(calls[1][2].content, "only morning shifts");

    // Both replies were surfaced and spoken.
    assert_eq!(harness.replies.lock().unwrap().len(), 2);
    assert_eq!(harness.synthesis.spoken().len(), 2);

    // Each turn walks listening -> processing -> speaking -> listening.
    let statuses = harness.statuses.lock().unwrap().clone();
    assert_eq!(
        statuses,
        vec![
            SessionStatus::Connecting,
            SessionStatus::Listening,
            SessionStatus::Processing,
            SessionStatus::Speaking,
            SessionStatus::Listening,
            SessionStatus::Processing,
            SessionStatus::Speaking,
            SessionStatus::Listening,
        ]
    );

    harness.session.end();
    assert_eq!(harness.session.status(), SessionStatus::Idle);
}

#[test]
fn ending_while_speaking_cuts_playback_and_goes_idle() {
    // Slow playback so end() lands mid-utterance.
    let mut harness = start_with(
        MockChatBackend::new().with_reply("A long reply that keeps the speaker busy for a while."),
        MockSynthesisEngine::new().with_duration(Duration::from_secs(2)),
    );

    harness.engine.emit_final("talk to me");
    assert!(wait_until(
        || harness.session.status() == SessionStatus::Speaking,
        Duration::from_secs(3)
    ));

    let ended_at = Instant::now();
    harness.session.end();
    assert!(
        ended_at.elapsed() < Duration::from_secs(1),
        "end() must not wait for playback to finish"
    );
    assert_eq!(harness.session.status(), SessionStatus::Idle);

    // No status movement after idle.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        harness.statuses.lock().unwrap().last(),
        Some(&SessionStatus::Idle)
    );
}

#[test]
fn a_new_session_starts_cleanly_after_the_previous_one_ends() {
    let mut first = start(MockChatBackend::new().with_reply("First session."));
    first.engine.emit_final("hello");
    assert!(wait_until(
        || !first.synthesis.spoken().is_empty(),
        Duration::from_secs(3)
    ));
    first.session.end();

    let mut second = start(MockChatBackend::new().with_reply("Second session."));
    second.engine.emit_final("hello again");
    assert!(wait_until(
        || second.synthesis.spoken() == vec!["Second session.".to_string()],
        Duration::from_secs(3)
    ));

    // The fresh session has a fresh history.
    assert_eq!(second.backend.calls()[0].len(), 1);
    second.session.end();
}
