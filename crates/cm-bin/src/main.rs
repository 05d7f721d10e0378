//! codemonkey entrypoint: `agent`, `present`, and `check` subcommands.

mod input;
mod present;
mod term;

use clap::{Parser, Subcommand};
use cm_agent::Agent;
use cm_automation::OsaBackend;
use cm_blocks::{BlockKind, dry_run_listing, group};
use cm_presenter::Presenter;
use cm_script::{Script, parse_script};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Once;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const EXIT_PARSE: u8 = 1;
const EXIT_CONNECT: u8 = 2;
const EXIT_PROTOCOL: u8 = 3;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "codemonkey", version, about = "Two-machine presentation driver")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the executor on the audience-visible demo machine.
    Agent {
        /// Script to validate at startup.
        script: PathBuf,
        /// Listen port; defaults to the script's `agent_port`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Drive a presentation from this machine.
    Present {
        script: PathBuf,
        /// Agent address as HOST:PORT; required unless --dry-run is set.
        #[arg(long)]
        agent: Option<String>,
        /// Print the block listing and exit without touching the network.
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse and group a script, reporting diagnostics.
    Check { script: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    match Args::parse().command {
        Command::Agent { script, port } => run_agent(&script, port).await,
        Command::Present {
            script,
            agent,
            dry_run,
        } => run_present(&script, agent, dry_run).await,
        Command::Check { script } => run_check(&script),
    }
}

async fn run_agent(script_path: &Path, port: Option<u16>) -> ExitCode {
    init_stderr_logging();
    install_panic_hook();

    // Validation only; the controller is authoritative and ships every
    // action block over the wire.
    let script = match load_script(script_path) {
        Ok(script) => script,
        Err(code) => return code,
    };
    let blocks = group(&script);
    info!(
        target: "runtime",
        script = %script_path.display(),
        blocks = blocks.len(),
        "script_validated"
    );

    let port = port.unwrap_or(script.front_matter.agent_port);
    let agent = match Agent::bind(port, OsaBackend::new()).await {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(EXIT_CONNECT);
        }
    };

    tokio::select! {
        result = agent.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(EXIT_PROTOCOL)
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!(target: "runtime.shutdown", reason = "ctrl_c", "agent_quit");
            ExitCode::SUCCESS
        }
    }
}

async fn run_present(script_path: &Path, agent: Option<String>, dry_run: bool) -> ExitCode {
    let script = match load_script(script_path) {
        Ok(script) => script,
        Err(code) => return code,
    };

    if dry_run {
        print!("{}", dry_run_listing(&group(&script)));
        return ExitCode::SUCCESS;
    }

    let Some(agent_addr) = agent else {
        eprintln!("--agent HOST:PORT is required unless --dry-run is set");
        return ExitCode::from(EXIT_PARSE);
    };

    // The TUI owns stdout, so presenter logs go to a file.
    let _log_guard = init_file_logging();
    install_panic_hook();

    let mut presenter = Presenter::new(&script, agent_addr);
    if let Err(err) = presenter.connect().await {
        eprintln!("{err}");
        return ExitCode::from(EXIT_CONNECT);
    }

    match present::run(presenter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(EXIT_PROTOCOL)
        }
    }
}

fn run_check(script_path: &Path) -> ExitCode {
    init_stderr_logging();
    let script = match load_script(script_path) {
        Ok(script) => script,
        Err(code) => return code,
    };
    let blocks = group(&script);
    let actions = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::Action)
        .count();
    let pauses = blocks
        .iter()
        .filter(|b| matches!(b.kind, BlockKind::Pause(_)))
        .count();
    let narration = blocks
        .iter()
        .filter(|b| b.kind == BlockKind::NarrationOnly)
        .count();
    println!(
        "{}: {} blocks ({actions} action, {pauses} pause, {narration} narration)",
        script_path.display(),
        blocks.len()
    );
    ExitCode::SUCCESS
}

fn load_script(path: &Path) -> Result<Script, ExitCode> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("{}: {err}", path.display());
            return Err(ExitCode::from(EXIT_PARSE));
        }
    };
    match parse_script(&text) {
        Ok(script) => Ok(script),
        Err(err) => {
            eprintln!("{}: {}", path.display(), err.diagnostic());
            Err(ExitCode::from(EXIT_PARSE))
        }
    }
}

fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_file_logging() -> Option<WorkerGuard> {
    let log_path = Path::new("codemonkey.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(log_path);
    }
    let appender = tracing_appender::rolling::never(".", "codemonkey.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    match tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
    {
        Ok(()) => Some(guard),
        // A subscriber is already installed; drop the guard so the writer
        // shuts down.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}
