//! Session manager behavior against a scripted process

mod common;

use std::time::Duration;

use common::{Harness, data, exits, states};
use termdeck::client::{ClientSync, SessionUpdate};
use termdeck::config::{ColorScheme, Config, ProviderConfig};
use termdeck::session::{CreateOptions, SessionError};
use termdeck::{AdapterErrorKind, NO_SEQ, PromptKind, ProviderKind, SessionEvent, SessionState};

fn create(h: &Harness, id: &str, provider: ProviderKind) {
    h.manager
        .create(id, CreateOptions::new(h.dir.path(), provider))
        .unwrap();
}

async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_buffer_replay_by_seq() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let p = h.spawner.last();

    p.emit("A");
    p.emit("B");

    let all = h.manager.get_buffer_since("t1", NO_SEQ).unwrap();
    let chunks: Vec<(i64, &str)> = all.chunks.iter().map(|c| (c.seq, c.data.as_str())).collect();
    assert_eq!(chunks, vec![(0, "A"), (1, "B")]);
    assert_eq!(all.current_seq, 1);

    let since = h.manager.get_buffer_since("t1", 0).unwrap();
    assert_eq!(since.chunks.len(), 1);
    assert_eq!((since.chunks[0].seq, since.chunks[0].data.as_str()), (1, "B"));

    // Out-of-range cursors from callers
    assert!(h.manager.get_buffer_since("t1", i64::MAX).unwrap().chunks.is_empty());
    assert_eq!(h.manager.get_buffer_since("t1", i64::MIN).unwrap().chunks.len(), 2);

    assert_eq!(h.manager.get_buffer("t1").as_deref(), Some("AB"));
    assert_eq!(
        data(&h.drain()),
        vec![(0, "A".to_string()), (1, "B".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_clear_buffer_keeps_counting() {
    let h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let p = h.spawner.last();

    p.emit("A");
    p.emit("B");
    assert_eq!(h.manager.clear_buffer("t1"), Some(1));
    assert_eq!(h.manager.get_buffer("t1").as_deref(), Some(""));

    p.emit("C");
    let since = h.manager.get_buffer_since("t1", NO_SEQ).unwrap();
    assert_eq!(since.chunks.len(), 1);
    assert_eq!(since.chunks[0].seq, 2);
    assert_eq!(h.manager.clear_buffer("missing"), None);
}

#[tokio::test(start_paused = true)]
async fn test_state_sequence_with_idle_fallback() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    // Startup grace elapses with no signal from the CLI
    sleep(2_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Attention));

    p.emit("\x1b[2m✻ Thinking… (esc to interrupt)\x1b[0m");
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Running));

    // Silence past the 60s idle timeout, caught by a 10s sweep
    sleep(75_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Attention));

    // Plain output is no evidence of work
    p.emit("all done\r\n");
    sleep(500).await;

    assert_eq!(
        states(&h.drain()),
        vec![
            SessionState::Starting,
            SessionState::Attention,
            SessionState::Running,
            SessionState::Attention,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_running_is_immediate_and_flips_are_debounced() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    p.emit("(esc to interrupt)");
    p.emit("? for shortcuts");
    p.emit("(esc to interrupt)");
    sleep(1_000).await;

    assert_eq!(
        states(&h.drain()),
        vec![SessionState::Starting, SessionState::Running]
    );
}

#[tokio::test(start_paused = true)]
async fn test_adapter_idle_timeout_override() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Gemini);
    let p = h.spawner.last();

    p.emit("⠏ Reading files (esc to cancel, 3s)");
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Running));

    // Gemini's 30s timeout applies, not the 60s default
    sleep(45_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Attention));
    h.drain();
}

#[tokio::test(start_paused = true)]
async fn test_config_idle_timeout_beats_adapter() {
    let mut config = Config::default();
    config.provider.insert(
        "gemini".to_string(),
        ProviderConfig {
            idle_timeout_ms: Some(120_000),
            ..Default::default()
        },
    );
    let h = Harness::with_config(config);
    create(&h, "t1", ProviderKind::Gemini);

    h.spawner.last().emit("(esc to cancel)");
    sleep(65_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Running));
}

#[tokio::test(start_paused = true)]
async fn test_stopped_idle_checker_leaves_running_sessions_alone() {
    let h = Harness::new();
    assert!(h.manager.is_idle_checker_running());
    h.manager.stop_idle_checker();
    assert!(!h.manager.is_idle_checker_running());

    create(&h, "t1", ProviderKind::Claude);
    h.spawner.last().emit("esc to interrupt");
    sleep(180_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Running));
}

#[tokio::test(start_paused = true)]
async fn test_exit_reaches_subscriber_once() {
    let mut h = Harness::new();
    let mut sync = ClientSync::new();
    let mut sub = sync.subscribe("t1");

    create(&h, "t1", ProviderKind::Shell);
    let p = h.spawner.last();
    p.emit("bye\r\n");
    p.exit(1);
    p.exit(1);

    assert!(!h.manager.exists("t1"));
    assert_eq!(h.manager.get_state("t1"), None);
    assert!(!h.manager.write("t1", "ls\r"));

    let events = h.drain();
    assert_eq!(exits(&events), vec![1]);
    assert_eq!(states(&events).last(), Some(&SessionState::Dead));
    for event in events {
        sync.handle_event(event);
    }

    let mut updates = Vec::new();
    while let Ok(update) = sub.receiver.try_recv() {
        updates.push(update);
    }
    let exit_updates: Vec<_> = updates
        .iter()
        .filter(|u| matches!(u, SessionUpdate::Exit { .. }))
        .collect();
    assert_eq!(exit_updates, vec![&SessionUpdate::Exit { exit_code: 1 }]);
    assert_eq!(sync.metadata("t1").unwrap().exit_code, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_create_replaces_existing_session() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let old = h.spawner.last();
    create(&h, "t1", ProviderKind::Claude);
    let new = h.spawner.last();

    assert!(old.was_killed());
    assert!(!new.was_killed());
    assert_eq!(h.manager.list_sessions().len(), 1);

    // The old process is still draining; none of it belongs to the new session
    old.emit("stale output");
    old.exit(137);
    new.emit("fresh");

    let events = h.drain();
    assert!(exits(&events).is_empty());
    assert_eq!(data(&events), vec![(0, "fresh".to_string())]);
    assert_eq!(h.manager.get_buffer("t1").as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn test_kill_stops_data_and_reports_exit() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let p = h.spawner.last();
    h.drain();

    assert!(h.manager.kill("t1"));
    assert!(p.was_killed());
    assert!(!h.manager.exists("t1"));
    assert!(!h.manager.kill("t1"));

    p.emit("late output");
    p.exit(137);

    let events = h.drain();
    assert!(data(&events).is_empty());
    assert_eq!(exits(&events), vec![137]);
    assert_eq!(
        events.first(),
        Some(&SessionEvent::StateChange {
            session_id: "t1".into(),
            new_state: SessionState::Dead,
            old_state: Some(SessionState::Starting),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_killed_process_exiting_after_recreate_is_silent() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let first = h.spawner.last();
    h.manager.kill("t1");
    create(&h, "t1", ProviderKind::Shell);

    first.exit(137);
    assert!(exits(&h.drain()).is_empty());
    assert!(h.manager.exists("t1"));
}

#[tokio::test(start_paused = true)]
async fn test_output_during_spawn_follows_creation() {
    let mut h = Harness::new();
    h.spawner.during_next_spawn(|p| p.emit("early"));
    create(&h, "t1", ProviderKind::Shell);

    let events = h.drain();
    assert!(matches!(
        events.first(),
        Some(SessionEvent::StateChange {
            new_state: SessionState::Starting,
            ..
        })
    ));
    assert_eq!(data(&events), vec![(0, "early".to_string())]);
    assert_eq!(h.manager.get_buffer("t1").as_deref(), Some("early"));
}

#[tokio::test(start_paused = true)]
async fn test_exit_during_spawn_is_reported_after_creation() {
    let mut h = Harness::new();
    h.spawner.during_next_spawn(|p| {
        p.emit("boom\r\n");
        p.exit(2);
    });
    create(&h, "t1", ProviderKind::Shell);

    let events = h.drain();
    assert_eq!(
        states(&events),
        vec![SessionState::Starting, SessionState::Dead]
    );
    assert_eq!(data(&events), vec![(0, "boom\r\n".to_string())]);
    assert_eq!(exits(&events), vec![2]);
    assert!(!h.manager.exists("t1"));
}

#[tokio::test(start_paused = true)]
async fn test_kill_while_spawning() {
    let mut h = Harness::new();
    let manager = h.manager.clone();
    h.spawner.during_next_spawn(move |_| {
        // The table is not locked while the process starts
        assert!(!manager.exists("t1"));
        assert!(manager.kill("t1"));
    });
    create(&h, "t1", ProviderKind::Shell);

    let p = h.spawner.last();
    assert!(p.was_killed());
    assert!(!h.manager.exists("t1"));

    p.emit("late output");
    p.exit(137);
    let events = h.drain();
    assert!(data(&events).is_empty());
    assert_eq!(states(&events), vec![SessionState::Dead]);
    assert_eq!(exits(&events), vec![137]);
}

#[tokio::test(start_paused = true)]
async fn test_create_while_spawning_keeps_newest() {
    let mut h = Harness::new();
    let manager = h.manager.clone();
    let cwd = h.dir.path().to_path_buf();
    h.spawner.during_next_spawn(move |_| {
        manager
            .create("t1", CreateOptions::new(cwd, ProviderKind::Codex))
            .unwrap();
    });
    create(&h, "t1", ProviderKind::Shell);

    let processes = h.spawner.processes();
    assert_eq!(processes.len(), 2);
    assert!(processes[0].was_killed());
    assert!(!processes[1].was_killed());
    assert_eq!(h.manager.list_sessions().len(), 1);

    processes[0].exit(137);
    assert!(exits(&h.drain()).is_empty());
    assert!(h.manager.exists("t1"));
}

#[tokio::test(start_paused = true)]
async fn test_kill_all() {
    let h = Harness::new();
    create(&h, "a", ProviderKind::Shell);
    create(&h, "b", ProviderKind::Codex);

    assert_eq!(h.manager.kill_all(), 2);
    assert!(h.spawner.processes().iter().all(|p| p.was_killed()));
    assert!(h.manager.list_sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_not_found_is_reported_once() {
    let mut h = Harness::new();
    let mut options = CreateOptions::new(h.dir.path(), ProviderKind::Claude);
    options.existing_conversation_id = Some("abc".into());
    h.manager.create("t1", options).unwrap();
    let p = h.spawner.last();
    assert!(p.request().args.iter().any(|a| a.contains("abc")));

    p.emit("No conversation found with session ID: abc\r\n");
    p.emit("No conversation found with session ID: abc\r\n");

    let events = h.drain();
    let invalid = events
        .iter()
        .filter(|e| matches!(e, SessionEvent::SessionInvalid { .. }))
        .count();
    assert_eq!(invalid, 1);
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Starting));
    assert_eq!(
        h.manager.session_error("t1").map(|e| e.kind),
        Some(AdapterErrorKind::SessionNotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn test_fatal_error_latches_until_activity() {
    let h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    p.emit("zsh: command not found: claude\r\n");
    sleep(200).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Error));
    assert_eq!(
        h.manager.session_error("t1").map(|e| e.kind),
        Some(AdapterErrorKind::BinaryNotFound)
    );

    // Neither the startup grace nor the idle sweep clears it
    sleep(90_000).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Error));

    p.emit("(esc to interrupt)");
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Running));
}

#[tokio::test(start_paused = true)]
async fn test_error_split_across_reads() {
    let h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    p.emit("zsh: command not fo");
    p.emit("und: claude\r\n");
    sleep(200).await;
    assert_eq!(h.manager.get_state("t1"), Some(SessionState::Error));
}

#[tokio::test(start_paused = true)]
async fn test_error_is_readable_when_error_state_arrives() {
    let mut h = Harness::new();
    let mut sync = ClientSync::new();
    let mut sub = sync.subscribe("t1");
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    p.emit("zsh: command not found: claude\r\n");
    sleep(200).await;
    for event in h.drain() {
        sync.handle_event(event);
    }

    let mut seen = None;
    while let Ok(update) = sub.receiver.try_recv() {
        if let SessionUpdate::StateChange {
            new_state: SessionState::Error,
            ..
        } = update
        {
            seen = h.manager.session_error("t1").map(|e| e.kind);
        }
    }
    assert_eq!(seen, Some(AdapterErrorKind::BinaryNotFound));

    // Gone with the session
    p.exit(127);
    assert_eq!(h.manager.session_error("t1"), None);
}

#[tokio::test(start_paused = true)]
async fn test_prompt_event() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    h.spawner.last().emit(
        "│ Do you want to make this edit to main.rs?\r\n│ ❯ 1. Yes\r\n│   2. No, and tell Claude what to do differently\r\n",
    );

    let prompt = h
        .drain()
        .into_iter()
        .find_map(|e| match e {
            SessionEvent::Prompt { prompt, .. } => Some(prompt),
            _ => None,
        })
        .expect("prompt event");
    assert_eq!(prompt.kind, PromptKind::Choice);
    assert_eq!(prompt.options.len(), 2);
    assert_eq!(prompt.options[0].input, "1");
}

#[tokio::test(start_paused = true)]
async fn test_status_query_detects_conversation_id() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    assert!(h.manager.write("t1", "/status"));
    assert!(h.manager.write("t1", "\r"));
    assert_eq!(p.written(), "/status\r");

    p.emit("Session ID: 3F2504E0-4F89-11D3-9A0C-0305E82C3301\r\n");
    p.emit("Session ID: 00000000-0000-0000-0000-000000000000\r\n");

    let detected: Vec<String> = h
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::SessionDetected {
                conversation_id, ..
            } => Some(conversation_id),
            _ => None,
        })
        .collect();
    assert_eq!(detected, vec!["3f2504e0-4f89-11d3-9a0c-0305e82c3301"]);
}

#[tokio::test(start_paused = true)]
async fn test_status_query_watch_expires() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Claude);
    let p = h.spawner.last();

    h.manager.write("t1", "/status\r");
    sleep(6_000).await;
    p.emit("Session ID: 3f2504e0-4f89-11d3-9a0c-0305e82c3301\r\n");

    assert!(
        !h.drain()
            .iter()
            .any(|e| matches!(e, SessionEvent::SessionDetected { .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_output_is_filtered_before_storing() {
    let mut h = Harness::new();
    create(&h, "t1", ProviderKind::Shell);
    let p = h.spawner.last();

    p.emit("a\x1b]0;window title\x07b\x1b]52;c;c2VjcmV0");
    p.emit("\x07c\x1b[4munderlined\x1b[24m");

    assert_eq!(
        h.manager.get_buffer("t1").as_deref(),
        Some("abcunderlined\x1b[24m")
    );
    assert!(data(&h.drain()).iter().all(|(_, d)| !d.contains("\x1b]")));
}

#[tokio::test(start_paused = true)]
async fn test_spawn_environment_and_startup_command() {
    let mut config = Config::default();
    config.settings.color_scheme = ColorScheme::Light;
    config.provider.insert(
        "shell".to_string(),
        ProviderConfig {
            env: [("PROJECT".to_string(), "demo".to_string())].into(),
            ..Default::default()
        },
    );
    let h = Harness::with_config(config);

    let mut options = CreateOptions::new(h.dir.path(), ProviderKind::Shell);
    options.initial_prompt = Some("echo hi".into());
    options.cols = 132;
    options.rows = 43;
    h.manager.create("t1", options).unwrap();

    let p = h.spawner.last();
    let request = p.request();
    assert_eq!(request.cwd, h.dir.path());
    assert_eq!(request.env["TERM"], "xterm-256color");
    assert_eq!(request.env["COLORTERM"], "truecolor");
    assert_eq!(request.env["COLORFGBG"], "0;15");
    assert_eq!(request.env["PROJECT"], "demo");
    assert_eq!(p.size(), (132, 43));
    assert_eq!(p.written(), "echo hi\r");

    assert!(h.manager.resize("t1", 100, 30));
    assert_eq!(p.size(), (100, 30));
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_binary_override_from_config() {
    let mut config = Config::default();
    config.provider.insert(
        "codex".to_string(),
        ProviderConfig {
            binary: Some("/opt/codex/bin/codex".into()),
            args: vec!["--no-alt-screen".into()],
            ..Default::default()
        },
    );
    let h = Harness::with_config(config);
    create(&h, "t1", ProviderKind::Codex);

    let script = h.spawner.last().request().args.last().cloned().unwrap();
    assert!(script.starts_with("exec '/opt/codex/bin/codex'"));
    assert!(script.contains("'--no-alt-screen'"));
}

#[tokio::test(start_paused = true)]
async fn test_create_failures() {
    let mut h = Harness::new();

    let missing = h.dir.path().join("does-not-exist");
    let err = h
        .manager
        .create("t1", CreateOptions::new(missing, ProviderKind::Shell))
        .unwrap_err();
    assert!(matches!(err, SessionError::InvalidCwd(_)));

    h.spawner.fail_next();
    let err = h
        .manager
        .create("t1", CreateOptions::new(h.dir.path(), ProviderKind::Claude))
        .unwrap_err();
    match err {
        SessionError::Spawn {
            session_id,
            provider,
            reason,
        } => {
            assert_eq!(session_id, "t1");
            assert_eq!(provider, ProviderKind::Claude);
            assert!(reason.contains("No such file"));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(!h.manager.exists("t1"));
    assert!(h.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_session_operations() {
    let h = Harness::new();
    assert!(!h.manager.write("nope", "x"));
    assert!(!h.manager.resize("nope", 80, 24));
    assert!(!h.manager.kill("nope"));
    assert!(!h.manager.exists("nope"));
    assert_eq!(h.manager.get_buffer("nope"), None);
    assert_eq!(h.manager.get_buffer_since("nope", NO_SEQ), None);
    assert_eq!(h.manager.get_state("nope"), None);
    assert_eq!(h.manager.session_error("nope"), None);
}

#[tokio::test(start_paused = true)]
async fn test_list_sessions() {
    let h = Harness::new();
    create(&h, "b", ProviderKind::Shell);
    create(&h, "a", ProviderKind::Claude);
    h.spawner.processes()[1].emit("(esc to interrupt)");

    let sessions = h.manager.list_sessions();
    let rows: Vec<(&str, SessionState)> = sessions
        .iter()
        .map(|s| (s.session_id.as_str(), s.state))
        .collect();
    assert_eq!(
        rows,
        vec![("a", SessionState::Running), ("b", SessionState::Starting)]
    );
}
