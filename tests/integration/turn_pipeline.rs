//! End-to-end turn behaviour through the service, driven by in-process fakes.

use std::sync::Mutex;
use std::time::Duration;

use attune::emotion::EmotionScore;
use attune::error::AttuneError;
use attune::history::{NO_EMOTION_PLACEHOLDER, Role};
use attune::llm::{ChatMessage, ChatRole};
use attune::pipeline::{Stage, no_publish};
use attune::session::state::status;
use attune::session::{DetectedEmotion, SessionState, TurnPhase};

use crate::helpers::{Harness, HarnessConfig, sid};

async fn run_all_stages(h: &Harness, id: &str) -> SessionState {
    let mut last = None;
    for stage in Stage::ALL {
        let outcome = h.service.trigger(id, stage).await.unwrap();
        let failed = outcome.failed();
        last = Some(outcome.state);
        if failed {
            break;
        }
    }
    last.unwrap()
}

#[tokio::test]
async fn first_turn_persists_user_and_assistant_messages() {
    let h = Harness::new(HarnessConfig::default());
    let id = h.service.open_session(Some("scenario-a")).await.unwrap();

    let recorded = h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    assert_eq!(recorded.state.phase, TurnPhase::Recording);
    assert_eq!(recorded.state.status, status::LISTENING);
    assert_eq!(recorded.next, Some(Stage::Transcribe));

    let transcribed = h.service.trigger(id.as_str(), Stage::Transcribe).await.unwrap();
    assert_eq!(transcribed.state.phase, TurnPhase::DetectingEmotion);
    assert_eq!(
        transcribed.state.pending_transcript.as_deref(),
        Some("I got the job!")
    );
    assert!(h.artifact(&id).exists());

    let detected = h.service.trigger(id.as_str(), Stage::DetectEmotion).await.unwrap();
    let emotion = detected.state.pending_emotion.clone().unwrap();
    assert_eq!(emotion.label, "happy");
    assert_eq!(emotion.display, "happy (82%)");
    assert_eq!(detected.state.phase, TurnPhase::Generating);

    let generated = h.service.trigger(id.as_str(), Stage::Generate).await.unwrap();
    assert_eq!(generated.state.phase, TurnPhase::Idle);
    assert_eq!(generated.state.status, status::COMPLETE);
    assert_eq!(generated.next, None);
    assert!(!generated.failed());

    // One framing prompt naming the emotion, then exactly the new user turn.
    let contexts = h.generator.contexts();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].system_prompt.contains("happy"));
    assert_eq!(contexts[0].messages, vec![ChatMessage::user("I got the job!")]);

    let messages = h.history.read(&id).await.unwrap();
    assert_eq!(messages.len(), 2);
    let user = messages.iter().find(|m| m.role == Role::User).unwrap();
    assert_eq!(user.content, "I got the job!");
    assert_eq!(user.emotion.as_deref(), Some("happy (82%)"));

    let turns = h.service.history(id.as_str()).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_text, "I got the job!");
    assert_eq!(turns[0].emotion_display, "happy (82%)");
    assert_eq!(
        turns[0].response_text,
        "Congratulations! That's wonderful news."
    );

    assert_eq!(
        h.speaker.spoken(),
        vec![(
            "Congratulations! That's wonderful news.".to_owned(),
            "happy".to_owned()
        )]
    );
    assert!(!h.artifact(&id).exists());
}

#[tokio::test]
async fn transcriber_failure_is_reported_in_status() {
    let h = Harness::new(HarnessConfig {
        transcripts: vec![Err("device busy".into())],
        ..Default::default()
    });
    let id = h.service.open_session(Some("scenario-b")).await.unwrap();

    h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    let outcome = h.service.trigger(id.as_str(), Stage::Transcribe).await.unwrap();

    assert!(outcome.failed());
    assert_eq!(outcome.state.phase, TurnPhase::Idle);
    assert_eq!(
        outcome.state.status,
        "❌ Error during transcription: device busy"
    );
    assert!(h.history.read(&id).await.unwrap().is_empty());
    assert!(h.artifact(&id).exists(), "artifact is kept for inspection");

    let view = h.service.snapshot(id.as_str()).await.unwrap();
    assert_eq!(view.phase, TurnPhase::Idle);
    assert!(view.status.contains("device busy"));
}

#[tokio::test]
async fn failed_transcription_keeps_prior_state_and_history() {
    let h = Harness::new(HarnessConfig {
        transcripts: vec![Ok("first".into()), Err("mic unplugged".into())],
        replies: vec![Ok("reply one".into())],
        ..Default::default()
    });
    let id = h.service.open_session(Some("isolation")).await.unwrap();

    let first = run_all_stages(&h, id.as_str()).await;
    assert_eq!(first.status, status::COMPLETE);
    let before = h.history.read(&id).await.unwrap();

    let recorded = h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    let failed = h.service.trigger(id.as_str(), Stage::Transcribe).await.unwrap();

    assert!(failed.state.status.contains("mic unplugged"));
    assert_eq!(failed.state.pending_emotion, recorded.state.pending_emotion);
    assert_eq!(failed.state.pending_transcript, None);
    assert_eq!(failed.state.last_response.as_deref(), Some("reply one"));
    assert_eq!(h.history.read(&id).await.unwrap(), before);
}

#[tokio::test]
async fn stage_failure_folds_into_input_state() {
    let h = Harness::new(HarnessConfig {
        transcripts: vec![Err("device busy".into())],
        ..Default::default()
    });
    let mut input = SessionState::new(sid("direct")).start_turn();
    input.pending_emotion = Some(DetectedEmotion::new("sad", 0.7));

    let err = h
        .service
        .pipeline()
        .transcribe(&input, &no_publish)
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Transcribe);

    let folded = input.fail(&err);
    assert_eq!(folded.phase, TurnPhase::Idle);
    assert_eq!(folded.pending_emotion, input.pending_emotion);
    assert!(folded.status.contains("device busy"));
}

#[tokio::test]
async fn two_turns_display_in_order_despite_reversed_store_reads() {
    let h = Harness::new(HarnessConfig {
        transcripts: vec![Ok("hello".into()), Ok("how are you?".into())],
        replies: vec![Ok("hi!".into()), Ok("great, thanks".into())],
        reverse_history: true,
        ..Default::default()
    });
    let id = h.service.open_session(Some("scenario-c")).await.unwrap();

    assert_eq!(run_all_stages(&h, id.as_str()).await.status, status::COMPLETE);
    assert_eq!(run_all_stages(&h, id.as_str()).await.status, status::COMPLETE);

    let turns = h.service.history(id.as_str()).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].user_text, "hello");
    assert_eq!(turns[0].response_text, "hi!");
    assert_eq!(turns[1].user_text, "how are you?");
    assert_eq!(turns[1].response_text, "great, thanks");

    let second = &h.generator.contexts()[1];
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "hi!", "how are you?"]);
    assert_eq!(second.messages[1].role, ChatRole::Assistant);

    let latest = h.service.latest_turn(id.as_str()).await.unwrap().unwrap();
    assert_eq!(latest.user_text, "how are you?");
}

#[tokio::test]
async fn equal_confidence_selects_text_emotion() {
    let h = Harness::new(HarnessConfig {
        text_emotion: Some(EmotionScore::new("joy", 0.6)),
        audio_emotion: Some(EmotionScore::new("sad", 0.6)),
        ..Default::default()
    });
    let id = h.service.open_session(Some("tie")).await.unwrap();
    h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    h.service.trigger(id.as_str(), Stage::Transcribe).await.unwrap();
    let detected = h.service.trigger(id.as_str(), Stage::DetectEmotion).await.unwrap();
    assert_eq!(detected.state.pending_emotion.unwrap().label, "joy");
}

#[tokio::test]
async fn both_classifiers_failing_falls_back_to_neutral() {
    let h = Harness::new(HarnessConfig {
        text_emotion: None,
        audio_emotion: None,
        ..Default::default()
    });
    let id = h.service.open_session(Some("no-emotion")).await.unwrap();
    let done = run_all_stages(&h, id.as_str()).await;
    assert_eq!(done.status, status::COMPLETE);
    assert_eq!(done.pending_emotion.unwrap().display, "neutral (0%)");
    assert!(h.generator.contexts()[0].system_prompt.contains("neutral"));
}

#[tokio::test]
async fn speaker_failure_does_not_fail_the_turn() {
    let h = Harness::new(HarnessConfig {
        speaker_fails: true,
        ..Default::default()
    });
    let id = h.service.open_session(Some("mute")).await.unwrap();
    let done = run_all_stages(&h, id.as_str()).await;
    assert_eq!(done.status, status::COMPLETE);
    assert_eq!(h.speaker.spoken().len(), 1);
    assert_eq!(h.history.read(&id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn generation_failure_keeps_artifact_and_history_untouched() {
    let h = Harness::new(HarnessConfig {
        replies: vec![Err("rate limited".into())],
        ..Default::default()
    });
    let id = h.service.open_session(Some("gen-fail")).await.unwrap();
    let done = run_all_stages(&h, id.as_str()).await;

    assert_eq!(done.phase, TurnPhase::Idle);
    assert_eq!(
        done.status,
        "❌ Error during response generation: rate limited"
    );
    assert!(h.history.read(&id).await.unwrap().is_empty());
    assert!(h.artifact(&id).exists());
    assert!(h.speaker.spoken().is_empty());
}

#[tokio::test]
async fn out_of_order_stage_is_rejected_without_side_effects() {
    let h = Harness::new(HarnessConfig::default());
    let id = h.service.open_session(Some("order")).await.unwrap();

    let err = h.service.trigger(id.as_str(), Stage::Generate).await.unwrap_err();
    assert!(matches!(
        err,
        AttuneError::InvalidTransition {
            stage: "generate",
            expected: "generating",
            actual: "idle"
        }
    ));
    let view = h.service.snapshot(id.as_str()).await.unwrap();
    assert_eq!(view.status, status::READY);
    assert!(h.generator.contexts().is_empty());
}

#[tokio::test]
async fn record_mid_turn_is_busy() {
    let h = Harness::new(HarnessConfig::default());
    let id = h.service.open_session(Some("busy")).await.unwrap();
    h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    let err = h.service.trigger(id.as_str(), Stage::Record).await.unwrap_err();
    assert!(matches!(err, AttuneError::SessionBusy(_)));
}

#[tokio::test]
async fn abandoned_turn_can_be_restarted() {
    let h = Harness::new(HarnessConfig {
        stale_after: Duration::from_millis(1),
        ..Default::default()
    });
    let id = h.service.open_session(Some("stale")).await.unwrap();
    h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let restarted = h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    assert_eq!(restarted.state.phase, TurnPhase::Recording);
}

#[tokio::test]
async fn concurrent_trigger_is_rejected_while_stage_runs() {
    let h = Harness::new(HarnessConfig::default());
    let id = h.service.open_session(Some("single-flight")).await.unwrap();
    let slot = h.service.registry().get(&id).await.unwrap();
    let _running = slot.try_begin().unwrap();

    let err = h.service.trigger(id.as_str(), Stage::Record).await.unwrap_err();
    assert!(matches!(err, AttuneError::SessionBusy(_)));
    assert_eq!(h.transcriber.calls(), 0);
}

#[tokio::test]
async fn cancelled_stage_leaves_session_retriggerable() {
    let h = Harness::new(HarnessConfig {
        transcribe_delay: Duration::from_millis(500),
        ..Default::default()
    });
    let id = h.service.open_session(Some("cancelled")).await.unwrap();
    h.service.trigger(id.as_str(), Stage::Record).await.unwrap();
    let slot = h.service.registry().get(&id).await.unwrap();
    let recorded = slot.snapshot();

    let cut_short = tokio::time::timeout(
        Duration::from_millis(50),
        h.service.trigger(id.as_str(), Stage::Transcribe),
    )
    .await;
    assert!(cut_short.is_err());
    assert_eq!(h.transcriber.calls(), 1);

    let after = slot.snapshot();
    assert_eq!(after.phase, TurnPhase::Recording);
    assert_eq!(after.status, recorded.status);

    let retried = h.service.trigger(id.as_str(), Stage::Transcribe).await.unwrap();
    assert!(!retried.failed());
    assert_eq!(retried.state.phase, TurnPhase::DetectingEmotion);
    assert_eq!(retried.state.pending_transcript.as_deref(), Some("I got the job!"));
}

#[tokio::test]
async fn sessions_are_independent() {
    let h = Harness::new(HarnessConfig {
        transcripts: vec![Ok("from a".into())],
        ..Default::default()
    });
    let a = h.service.open_session(Some("sess-a")).await.unwrap();
    let b = h.service.open_session(Some("sess-b")).await.unwrap();

    h.service.trigger(a.as_str(), Stage::Record).await.unwrap();
    h.service.trigger(b.as_str(), Stage::Record).await.unwrap();
    h.service.trigger(a.as_str(), Stage::Transcribe).await.unwrap();

    assert!(h.artifact(&a).exists());
    assert!(!h.artifact(&b).exists());
    let b_view = h.service.snapshot(b.as_str()).await.unwrap();
    assert_eq!(b_view.phase, TurnPhase::Recording);
}

#[tokio::test]
async fn invalid_and_unknown_sessions() {
    let h = Harness::new(HarnessConfig::default());

    let err = h.service.trigger("not a valid id", Stage::Record).await.unwrap_err();
    assert!(matches!(err, AttuneError::InvalidSession(_)));

    let err = h.service.latest_turn("../../etc").await.unwrap_err();
    assert!(matches!(err, AttuneError::InvalidSession(_)));

    let err = h.service.snapshot("never-opened").await.unwrap_err();
    assert!(matches!(err, AttuneError::SessionNotFound(_)));
}

#[tokio::test]
async fn run_turn_publishes_progress_in_order() {
    let h = Harness::new(HarnessConfig::default());
    let id = sid("progress");
    let seen = Mutex::new(Vec::<String>::new());
    let on_progress = |s: &SessionState| seen.lock().unwrap().push(s.status.clone());

    let done = h.service.run_turn(&id, &on_progress).await.unwrap();
    assert_eq!(done.status, status::COMPLETE);

    let seen = seen.into_inner().unwrap();
    let expected = [
        status::LISTENING,
        status::RECORDING,
        status::TRANSCRIBING,
        status::TRANSCRIBED,
        status::DETECTING_EMOTION,
        "😶 Emotion detected: happy (82%)",
        status::GENERATING,
        status::COMPLETE,
    ];
    assert_eq!(seen, expected.map(str::to_owned).to_vec());
}

#[tokio::test]
async fn session_listing_uses_first_user_message() {
    let h = Harness::new(HarnessConfig::default());
    let id = h.service.open_session(Some("listed")).await.unwrap();
    run_all_stages(&h, id.as_str()).await;

    let sessions = h.service.sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].session_id, id);
    assert_eq!(sessions[0].preview, "I got the job!");
}

#[tokio::test]
async fn snapshot_restores_session_known_only_from_history() {
    let h = Harness::new(HarnessConfig::default());
    h.history
        .append(attune::history::NewMessage::user(sid("restored"), "hey", None))
        .await
        .unwrap();
    h.history
        .append(attune::history::NewMessage::assistant(sid("restored"), "hello"))
        .await
        .unwrap();

    let view = h.service.snapshot("restored").await.unwrap();
    assert_eq!(view.phase, TurnPhase::Idle);
    assert_eq!(view.chat_history.len(), 1);
    assert_eq!(view.chat_history[0].emotion_display, NO_EMOTION_PLACEHOLDER);
}

#[tokio::test]
async fn artifact_cleanup_is_idempotent() {
    let h = Harness::new(HarnessConfig::default());
    let artifact = h.artifact(&sid("cleanup"));
    assert!(!artifact.delete().unwrap());
    assert!(!artifact.delete().unwrap());
}
