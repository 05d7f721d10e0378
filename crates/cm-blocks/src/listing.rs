//! Dry-run listing: a deterministic, human-readable dump of the block list.
//! No network, no backend, just text.

use crate::{Block, BlockKind};
use std::fmt::Write;

/// Renders every block in order: index, kind, section, narration, and the
/// directives in source order.
pub fn dry_run_listing(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (index, block) in blocks.iter().enumerate() {
        let kind = match block.kind {
            BlockKind::Pause(Some(secs)) => format!("pause {secs}s"),
            other => other.label().to_string(),
        };
        write!(out, "#{index} {kind}").ok();
        if let Some(section) = &block.section {
            write!(out, "  ({section})").ok();
        }
        out.push('\n');
        if let Some(narration) = &block.narration {
            for line in narration.lines() {
                writeln!(out, "    say: {line}").ok();
            }
        }
        for action in &block.actions {
            writeln!(out, "    {action}").ok();
        }
    }
    if blocks.is_empty() {
        out.push_str("(no blocks)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cm_script::parse_script;
    use pretty_assertions::assert_eq;

    #[test]
    fn listing_covers_every_block_in_order() {
        let script = parse_script(
            "## Section: Intro\n[SAY] Watch closely\n[FOCUS] Terminal\n[TYPE] ls\n[RUN]\n[PAUSE] 3\n[SAY] fin",
        )
        .unwrap();
        let blocks = crate::group(&script);
        let listing = dry_run_listing(&blocks);
        assert_eq!(
            listing,
            "#0 action  (Intro)\n    say: Watch closely\n    [FOCUS] Terminal\n    [TYPE] ls\n    [RUN]\n#1 pause 3s  (Intro)\n#2 narration  (Intro)\n    say: fin\n"
        );
    }

    #[test]
    fn empty_block_list_is_marked() {
        assert_eq!(dry_run_listing(&[]), "(no blocks)\n");
    }
}
