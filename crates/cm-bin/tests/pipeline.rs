//! End-to-end coverage of the chain the binary wires together: script text
//! through parsing and grouping to a dry-run listing, and a full
//! presenter/agent round trip over a local socket with a recording backend
//! in place of the desktop.

use cm_agent::Agent;
use cm_automation::{ActionBackend, BackendError};
use cm_blocks::{BlockKind, dry_run_listing, group};
use cm_presenter::{Presenter, StepOutcome};
use cm_script::{Directive, parse_script};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const DEMO_SCRIPT: &str = "\
---
title: Shipping It
typing_speed: 20
typing_variance: 4
---

## Section: Warm-up
[SAY] Welcome everyone.
[SAY] Let's look at the project.
[FOCUS] Terminal
[TYPE] ls
[RUN]
[PAUSE] 2

## Section: The Demo
[SLIDE 3]
[KEY cmd+shift+s]
[SAY] That's all, folks.
";

#[test]
fn demo_script_parses_groups_and_lists() {
    let script = parse_script(DEMO_SCRIPT).expect("demo script parses");
    assert_eq!(script.front_matter.title.as_deref(), Some("Shipping It"));
    assert_eq!(script.front_matter.typing_speed_ms, 20);

    let blocks = group(&script);
    let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BlockKind::Action,
            BlockKind::Pause(Some(2)),
            BlockKind::Action,
            BlockKind::NarrationOnly,
        ]
    );
    assert_eq!(blocks[0].section.as_deref(), Some("Warm-up"));
    assert_eq!(
        blocks[0].narration.as_deref(),
        Some("Welcome everyone.\nLet's look at the project.")
    );
    assert_eq!(blocks[2].section.as_deref(), Some("The Demo"));

    let listing = dry_run_listing(&blocks);
    assert!(listing.contains("#0 action  (Warm-up)"));
    assert!(listing.contains("say: Welcome everyone."));
    assert!(listing.contains("[TYPE] ls"));
    assert!(listing.contains("#1 pause 2s  (Warm-up)"));
    assert!(listing.contains("[KEY] cmd+shift+s"));
    assert!(listing.contains("#3 narration  (The Demo)"));
}

/// Scripts arrive from disk in production; make sure the fixture survives
/// the write/read/parse path the binary uses.
#[test]
fn script_fixture_round_trips_through_disk() {
    let tmp = tempfile::NamedTempFile::new().expect("temp file");
    std::fs::write(tmp.path(), DEMO_SCRIPT).expect("write fixture");

    let text = std::fs::read_to_string(tmp.path()).expect("read fixture");
    let script = parse_script(&text).expect("fixture parses");
    assert_eq!(script.front_matter.title.as_deref(), Some("Shipping It"));
    assert_eq!(group(&script).len(), 4);
}

/// Recording stand-in for the AppleScript backend.
#[derive(Clone, Default)]
struct RecordingBackend {
    calls: Arc<Mutex<Vec<(Vec<Directive>, u64, u64)>>>,
}

impl ActionBackend for RecordingBackend {
    async fn execute(
        &mut self,
        actions: &[Directive],
        typing_speed_ms: u64,
        typing_variance_ms: u64,
    ) -> Result<(), BackendError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((actions.to_vec(), typing_speed_ms, typing_variance_ms));
        Ok(())
    }
}

#[tokio::test]
async fn presentation_round_trip_over_localhost() {
    let backend = RecordingBackend::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let agent = Agent::from_listener(listener, backend.clone());
    let addr = agent.local_addr().expect("addr");
    let _ = tokio::spawn(agent.run());

    let script = parse_script(DEMO_SCRIPT).expect("demo script parses");
    let mut presenter = Presenter::new(&script, addr.to_string());
    presenter.connect().await.expect("connect");

    let mut outcomes = Vec::new();
    loop {
        match presenter.step().await {
            StepOutcome::Finished => break,
            outcome => outcomes.push(outcome),
        }
    }
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Executed,
            StepOutcome::Paused(Some(2)),
            StepOutcome::Executed,
            StepOutcome::NarrationOnly,
        ]
    );

    let calls = backend.calls.lock().expect("calls lock").clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].0,
        vec![
            Directive::Focus {
                app: "Terminal".into()
            },
            Directive::Type { text: "ls".into() },
            Directive::Run,
        ]
    );
    // Front-matter cadence rides along with every block.
    assert_eq!((calls[0].1, calls[0].2), (20, 4));
    assert_eq!((calls[1].1, calls[1].2), (20, 4));
}
