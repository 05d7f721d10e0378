//! Grouping: ordered directives in, presenter-visible blocks out.
//!
//! A block is one unit of advancement: an action group transmitted to the
//! agent atomically, a pause, or a narration-only waypoint. The block list
//! is built once from a parsed script and never mutated afterwards; the
//! presenter only moves a cursor over it.

pub mod listing;

pub use listing::dry_run_listing;

use cm_script::{Directive, Script};
use tracing::debug;

/// What stepping onto a block means for the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// `actions` is non-empty and is sent to the agent as one `Execute`.
    Action,
    /// Advancement stops here, optionally resuming after a timeout.
    Pause(Option<u64>),
    /// Nothing to execute; narration is the whole content.
    NarrationOnly,
}

impl BlockKind {
    pub fn label(&self) -> &'static str {
        match self {
            BlockKind::Action => "action",
            BlockKind::Pause(_) => "pause",
            BlockKind::NarrationOnly => "narration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub narration: Option<String>,
    pub actions: Vec<Directive>,
    pub section: Option<String>,
    pub kind: BlockKind,
}

/// Walks the parsed lines once, maintaining the current section, a pending
/// narration buffer, and a pending action buffer.
///
/// `Say` joins the narration buffer (flushing first if actions are already
/// pending, so narration always describes the actions that follow it).
/// `Pause` flushes and then emits a pause block that takes any narration
/// still pending. `Section` flushes and only updates the carry-forward
/// label. Everything else accumulates into the action buffer.
pub fn group(script: &Script) -> Vec<Block> {
    let mut grouper = Grouper::default();
    for parsed in &script.lines {
        match &parsed.directive {
            Directive::Section { name } => {
                grouper.flush();
                grouper.section = Some(name.clone());
            }
            Directive::Say { text } => {
                if !grouper.actions.is_empty() {
                    grouper.flush();
                }
                grouper.narration.push(text.clone());
            }
            Directive::Pause { timeout } => {
                grouper.flush();
                let narration = grouper.take_narration();
                grouper.emit(narration, Vec::new(), BlockKind::Pause(*timeout));
            }
            action => grouper.actions.push(action.clone()),
        }
    }
    grouper.finish()
}

#[derive(Default)]
struct Grouper {
    blocks: Vec<Block>,
    section: Option<String>,
    narration: Vec<String>,
    actions: Vec<Directive>,
}

impl Grouper {
    fn take_narration(&mut self) -> Option<String> {
        if self.narration.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.narration).join("\n"))
    }

    /// Emits the pending action buffer (with its narration) as an action
    /// block. A flush with no pending actions is a no-op.
    fn flush(&mut self) {
        if self.actions.is_empty() {
            return;
        }
        let narration = self.take_narration();
        let actions = std::mem::take(&mut self.actions);
        self.emit(narration, actions, BlockKind::Action);
    }

    fn emit(&mut self, narration: Option<String>, actions: Vec<Directive>, kind: BlockKind) {
        self.blocks.push(Block {
            narration,
            actions,
            section: self.section.clone(),
            kind,
        });
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        if let Some(narration) = self.take_narration() {
            self.emit(Some(narration), Vec::new(), BlockKind::NarrationOnly);
        }
        debug!(target: "blocks.group", blocks = self.blocks.len(), "script_grouped");
        self.blocks
    }
}
