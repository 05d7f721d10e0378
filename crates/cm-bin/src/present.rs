//! Presentation event loop and cue screen.
//!
//! One consumer loop: keypresses arrive from the input task, a short tick
//! keeps timed pauses honest, and every iteration redraws the cue screen.
//! Socket work all happens inside `Presenter::step`, so the loop stays a
//! single thread of control.

use crate::input::{PresenterKey, spawn_input_task};
use crate::term::ScreenGuard;
use anyhow::Result;
use cm_blocks::{Block, BlockKind};
use cm_presenter::{Presenter, StepOutcome};
use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{Write, stdout};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::info;

const TICK: Duration = Duration::from_millis(200);
const HELP_LINE: &str = "Enter step · b back · r reconnect · q quit";

pub async fn run(mut presenter: Presenter) -> Result<()> {
    let _screen = ScreenGuard::enter()?;
    let (tx, mut rx) = mpsc::channel(64);
    let (input_task, input_shutdown) = spawn_input_task(tx);

    let result = drive(&mut presenter, &mut rx).await;

    input_shutdown.signal();
    let _ = input_task.await;
    result
}

struct UiState {
    status: String,
    pause_until: Option<Instant>,
}

async fn drive(presenter: &mut Presenter, rx: &mut mpsc::Receiver<PresenterKey>) -> Result<()> {
    let mut ui = UiState {
        status: "ready, Enter to begin".to_string(),
        pause_until: None,
    };
    draw(presenter, &ui)?;

    let mut tick = tokio::time::interval(TICK);
    loop {
        let key = tokio::select! {
            key = rx.recv() => match key {
                Some(key) => Some(key),
                None => return Ok(()),
            },
            _ = tick.tick() => None,
        };

        let advance = match key {
            Some(PresenterKey::Quit) => {
                info!(target: "runtime.shutdown", reason = "quit_key", "presentation_quit");
                return Ok(());
            }
            Some(PresenterKey::Back) => {
                presenter.go_back();
                ui.pause_until = None;
                ui.status = "stepped back".to_string();
                false
            }
            Some(PresenterKey::Reconnect) => {
                ui.status = match presenter.connect().await {
                    Ok(()) => "reconnected".to_string(),
                    Err(err) => format!("reconnect failed: {err}"),
                };
                false
            }
            Some(PresenterKey::Advance) => true,
            // Timed pauses auto-advance once their deadline passes.
            None => ui.pause_until.is_some_and(|deadline| Instant::now() >= deadline),
        };

        if advance {
            ui.pause_until = None;
            match presenter.step().await {
                StepOutcome::Finished => {
                    info!(target: "runtime.shutdown", reason = "finished", "presentation_quit");
                    return Ok(());
                }
                StepOutcome::Executed => ui.status = "executed".to_string(),
                StepOutcome::NarrationOnly => ui.status = "narration".to_string(),
                StepOutcome::Paused(None) => {
                    ui.status = "paused, Enter to continue".to_string();
                }
                StepOutcome::Paused(Some(secs)) => {
                    ui.pause_until = Some(Instant::now() + Duration::from_secs(secs));
                    ui.status = format!("paused {secs}s, Enter to skip");
                }
                StepOutcome::AgentError(detail) => {
                    ui.status = format!("agent error: {detail}");
                }
                StepOutcome::ConnectionLost => {
                    ui.status = "connection lost, press r to reconnect".to_string();
                }
            }
        }

        draw(presenter, &ui)?;
    }
}

fn draw(presenter: &Presenter, ui: &UiState) -> Result<()> {
    let mut out = stdout();
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;

    let title = presenter
        .front_matter()
        .title
        .as_deref()
        .unwrap_or("Code Monkey");
    let (current, total) = presenter.progress();
    queue!(
        out,
        Print(format!("{title}  [{current}/{total}]")),
        MoveTo(0, 1),
        Print("─".repeat(48))
    )?;

    let mut row: u16 = 3;
    if let Some(block) = presenter.current_block() {
        if let Some(section) = &block.section {
            queue!(out, MoveTo(0, row), Print(format!("section: {section}")))?;
            row += 2;
        }
        queue!(out, MoveTo(0, row), Print(format!("next: {}", block_summary(block))))?;
        row += 2;
        if let Some(narration) = &block.narration {
            for line in narration.lines() {
                queue!(out, MoveTo(2, row), Print(line))?;
                row += 1;
            }
            row += 1;
        }
    } else {
        queue!(out, MoveTo(0, row), Print("end of script"))?;
        row += 2;
    }

    let link = if presenter.is_connected() {
        "agent: connected"
    } else {
        "agent: disconnected"
    };
    queue!(out, MoveTo(0, row + 1), Print(format!("{link}  ·  {}", ui.status)))?;
    queue!(out, MoveTo(0, row + 3), Print(HELP_LINE))?;
    out.flush()?;
    Ok(())
}

fn block_summary(block: &Block) -> String {
    match block.kind {
        BlockKind::Action => {
            let names: Vec<&str> = block.actions.iter().map(|a| a.name()).collect();
            format!("{} ({})", names.len(), names.join(", "))
        }
        BlockKind::Pause(Some(secs)) => format!("pause {secs}s"),
        BlockKind::Pause(None) => "pause".to_string(),
        BlockKind::NarrationOnly => "narration".to_string(),
    }
}
