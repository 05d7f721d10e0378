//! Desktop automation backend for the executor.
//!
//! [`applescript`] generates script text; [`Typewriter`] decomposes typing
//! into delayed keystrokes; [`OsaBackend`] runs the result through the
//! host's `osascript` interpreter. The executor depends only on the
//! [`ActionBackend`] capability so tests can substitute a recording
//! implementation.

pub mod applescript;
pub mod typewriter;

pub use typewriter::Typewriter;

use cm_script::Directive;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid key combo {combo:?}: {reason}")]
    InvalidKeyCombo { combo: String, reason: String },
    #[error("failed to launch osascript: {source}")]
    OsascriptLaunch {
        #[source]
        source: std::io::Error,
    },
    #[error("{action} failed: {detail}")]
    Osascript { action: String, detail: String },
    #[error("failed to spawn {command:?}: {source}")]
    ExecSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name} directive reached the automation backend")]
    UnexpectedDirective { name: &'static str },
}

/// The executor's single capability: enact one action list, in order,
/// honoring the supplied typing cadence. Any failure stops the list and
/// names the failing action.
pub trait ActionBackend {
    fn execute(
        &mut self,
        actions: &[Directive],
        typing_speed_ms: u64,
        typing_variance_ms: u64,
    ) -> impl Future<Output = Result<(), BackendError>>;
}

/// Production backend: every action becomes one or more `osascript -e`
/// invocations against the local desktop.
#[derive(Debug, Default)]
pub struct OsaBackend {
    _private: (),
}

impl OsaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    async fn run_action(
        &mut self,
        action: &Directive,
        typing_speed_ms: u64,
        typing_variance_ms: u64,
    ) -> Result<(), BackendError> {
        match action {
            Directive::Focus { app } => {
                run_osascript(&applescript::focus_app(app), &format!("focus {app:?}")).await
            }
            Directive::Slide { action } => {
                run_osascript(&applescript::slide(*action), "slide control").await
            }
            Directive::Key { combo } => {
                let script = applescript::keystroke(combo)?;
                run_osascript(&script, &format!("key {combo:?}")).await
            }
            Directive::Clear => run_osascript(&applescript::clear_screen(), "clear").await,
            Directive::Run => run_osascript(&applescript::press_return(), "run").await,
            Directive::Type { text } => {
                for (script, delay) in Typewriter::new(text, typing_speed_ms, typing_variance_ms) {
                    run_osascript(&script, "type").await?;
                    tokio::time::sleep(delay).await;
                }
                Ok(())
            }
            Directive::Wait { seconds } => {
                tokio::time::sleep(std::time::Duration::from_secs(*seconds)).await;
                Ok(())
            }
            Directive::Exec { command } => spawn_detached(command),
            Directive::Say { .. } | Directive::Pause { .. } | Directive::Section { .. } => {
                Err(BackendError::UnexpectedDirective {
                    name: action.name(),
                })
            }
        }
    }
}

impl ActionBackend for OsaBackend {
    async fn execute(
        &mut self,
        actions: &[Directive],
        typing_speed_ms: u64,
        typing_variance_ms: u64,
    ) -> Result<(), BackendError> {
        for action in actions {
            self.run_action(action, typing_speed_ms, typing_variance_ms)
                .await?;
        }
        Ok(())
    }
}

async fn run_osascript(script: &str, action: &str) -> Result<(), BackendError> {
    debug!(target: "automation.osascript", action, "osascript_invoke");
    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| BackendError::OsascriptLaunch { source })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => format!("osascript exited with {}", output.status),
            text => text.to_string(),
        };
        warn!(target: "automation.osascript", action, detail = detail.as_str(), "osascript_failed");
        return Err(BackendError::Osascript {
            action: action.to_string(),
            detail,
        });
    }
    Ok(())
}

/// Launches the command through `sh -c`, detached from the protocol loop.
/// The child is never awaited; its exit status is its own business.
fn spawn_detached(command: &str) -> Result<(), BackendError> {
    debug!(target: "automation.osascript", command, "exec_spawn");
    Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| BackendError::ExecSpawn {
            command: command.to_string(),
            source,
        })?;
    Ok(())
}
