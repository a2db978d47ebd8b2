//! Line-based import detection.
//!
//! Each line is looked at on its own, so parenthesized imports spanning
//! several lines only contribute what sits on their first line. Comment
//! markers are not understood: a leading `#` is skipped like whitespace,
//! which means commented-out imports are reported as real ones.

pub mod stdlib;

use std::collections::BTreeSet;

pub use stdlib::{STDLIB_MODULES, is_stdlib};

/// Collect the third-party top-level module names imported by `source`.
///
/// Never fails; lines that don't look like imports are ignored.
pub fn extract(source: &str) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    for line in source.lines() {
        let line = line.trim_start_matches(|c: char| c == '#' || c.is_whitespace());
        let line = line.trim_end();

        if let Some(rest) = line.strip_prefix("import ") {
            for segment in rest.split(',') {
                let word = segment.split_whitespace().next().unwrap_or("");
                insert_candidate(&mut modules, word);
            }
        } else if line.starts_with("from ") {
            if let Some(target) = line.split_whitespace().nth(1) {
                insert_candidate(&mut modules, target);
            }
        }
    }

    modules
}

/// Keep the first dotted segment of `path` unless it is empty, private or stdlib.
fn insert_candidate(modules: &mut BTreeSet<String>, path: &str) {
    let name = path.split('.').next().unwrap_or("");
    if name.is_empty() || name.starts_with('_') || is_stdlib(name) {
        return;
    }
    modules.insert(name.to_string());
}
