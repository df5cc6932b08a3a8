//! End-to-end tests driving real child processes through [`vtsession::Session`].
//!
//! Each test spawns an actual process (`echo`, `cat`, `bash`) inside a PTY
//! and exercises the public API the way a caller automating a TUI would.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use vtsession::{LaunchOptions, Pattern, Session, TextOptions, VtError};

fn launch(command: &str, args: &[&str]) -> Session {
    let options = LaunchOptions::new(command)
        .args(args.iter().map(|s| (*s).to_string()))
        .size(80, 24);
    smol::block_on(Session::launch(options)).expect("session launches")
}

/// E1: spawn `echo hello`, snapshot the screen, see the trimmed output.
#[test]
fn echo_produces_expected_snapshot() {
    let session = launch("echo", &["hello from the other side"]);
    smol::block_on(async {
        let mut options = TextOptions::new();
        options.trim_end = true;
        let projection = session.text(&options).await.expect("text");
        assert_eq!(projection.0, "\nhello from the other side");
    });
    session.close();
}

/// E2: `cat` loops input back to output; typed text and Enter reappear.
#[test]
fn cat_loops_typed_text_back() {
    let session = launch("cat", &[]);
    smol::block_on(async {
        session.r#type("loopback").await.expect("type");
        session.press(&["enter"]).await.expect("press enter");
        let projection = session
            .wait_for_text(Pattern::literal("loopback"), None)
            .await
            .expect("wait_for_text");
        assert!(projection.0.matches("loopback").count() >= 2);
        session.press(&["ctrl", "d"]).await.expect("press ctrl+d");
    });
    session.close();
}

/// E3: a real shell round-trip — run a command, see its output, exit cleanly.
#[test]
fn bash_round_trip_runs_a_command() {
    let session = launch("bash", &["--norc", "--noprofile"]);
    smol::block_on(async {
        session.r#type("echo \"ready: $((20 + 22))\"").await.expect("type");
        session.press(&["enter"]).await.expect("press enter");
        let projection = session
            .wait_for_text(Pattern::literal("ready: 42"), None)
            .await
            .expect("wait_for_text");
        assert!(projection.0.contains("ready: 42"));

        session.r#type("exit").await.expect("type exit");
        session.press(&["enter"]).await.expect("press enter");
    });
    session.close();
}

/// E4: a pattern matching more than one location fails `click` unless
/// `first` is set, in which case the earliest match wins.
#[test]
fn ambiguous_click_requires_first_flag() {
    let session = launch("bash", &["--norc", "--noprofile"]);
    smol::block_on(async {
        session.r#type("printf 'go go go\\n'").await.expect("type");
        session.press(&["enter"]).await.expect("press enter");
        session
            .wait_for_text(Pattern::literal("go go go"), None)
            .await
            .expect("wait_for_text");

        let err = session.click(&Pattern::literal("go"), false, None).await.unwrap_err();
        match err {
            VtError::AmbiguousClick { count, .. } => assert_eq!(count, 3),
            other => panic!("expected AmbiguousClick, got {other:?}"),
        }

        session.click(&Pattern::literal("go"), true, None).await.expect("click with first=true");
    });
    session.close();
}

/// E5: a regex pattern (the CLI's `/value: \d+/` shape, built directly here
/// since the CLI layer is out of scope) finds the value printed by a shell
/// command.
#[test]
fn regex_pattern_finds_printed_value() {
    let session = launch("bash", &["--norc", "--noprofile"]);
    smol::block_on(async {
        session.r#type("echo \"value: 42\"").await.expect("type");
        session.press(&["enter"]).await.expect("press enter");

        let pattern = Pattern::regex(r"value: \d+", "").expect("valid regex");
        let projection = session.wait_for_text(pattern, None).await.expect("wait_for_text");
        assert!(projection.0.contains("value: 42"));
    });
    session.close();
}

/// E6: `capture_frames` samples the screen at a fixed interval without
/// waiting for quiescence between frames, so it can observe a genuinely
/// animating screen — one that a debounced `text()` call would otherwise
/// only ever see settled. Drives a shell loop that redraws a counter every
/// 5ms and asserts at least two distinct frames are observed.
#[test]
fn capture_frames_observes_an_animating_screen() {
    let script = r#"printf 'ready\n'; read -r _; i=0; while [ "$i" -lt 200 ]; do i=$((i + 1)); printf 'tick %d\r' "$i"; sleep 0.005; done"#;
    let session = launch("bash", &["-c", script]);
    smol::block_on(async {
        session
            .wait_for_text(Pattern::literal("ready"), None)
            .await
            .expect("wait_for_text ready");

        let frames = session
            .capture_frames(&["enter"], 6, 20)
            .await
            .expect("capture_frames");
        assert_eq!(frames.len(), 6);

        let distinct: std::collections::HashSet<&str> = frames.iter().map(|f| f.0.as_str()).collect();
        assert!(
            distinct.len() >= 2,
            "expected at least two distinct frames while the counter animates, got {frames:?}"
        );
    });
    session.close();
}

/// Resizing updates the geometry observed by subsequent snapshots.
#[test]
fn resize_changes_subsequent_snapshot_width() {
    let session = launch("cat", &[]);
    session.resize(40, 12).expect("resize");
    smol::block_on(async {
        let options = TextOptions { immediate: true, ..TextOptions::new() };
        let projection = session.text(&options).await.expect("text");
        // 40 cols + mandatory leading newline + no trailing content beyond blank rows.
        let first_line_len = projection.0.lines().nth(1).map(str::len).unwrap_or(0);
        assert!(first_line_len <= 40);
    });
    session.close();
}

/// Operations on a closed session fail with `ClosedSession`, and `close` is
/// idempotent.
#[test]
fn closed_session_rejects_further_operations() {
    let session = launch("cat", &[]);
    session.close();
    session.close();
    smol::block_on(async {
        let err = session.r#type("x").await.unwrap_err();
        assert!(matches!(err, VtError::ClosedSession));
        let err = session.press(&["enter"]).await.unwrap_err();
        assert!(matches!(err, VtError::ClosedSession));
    });
}
