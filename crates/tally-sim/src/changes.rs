//! Change-set inspection for module collections
//!
//! Backs `tally-sim diff`: given a baseline and an edited copy of a module
//! list, shows what a save would send.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use tally_draft::{diff, ChangeSet};
use tally_model::{Module, Resource, ResourceId};

/// Change set turning `baseline` into `draft`
///
/// Baseline modules missing from the draft are deletes. Draft modules
/// without an id, or with a local id, are creates.
#[must_use]
pub fn diff_modules(baseline: &[Module], mut draft: Vec<Module>) -> ChangeSet<Module> {
    for module in &mut draft {
        if module.id.as_str().is_empty() {
            module.set_id(ResourceId::local());
        }
    }

    let kept: HashSet<&ResourceId> = draft.iter().map(|m| &m.id).collect();
    let tombstones: BTreeSet<ResourceId> = baseline
        .iter()
        .filter(|m| !kept.contains(&m.id))
        .map(|m| m.id.clone())
        .collect();

    diff(baseline, &draft, &tombstones)
}

/// Plain-text rendering of a module change set
#[must_use]
pub fn render_text(changes: &ChangeSet<Module>) -> String {
    let mut out = String::new();
    if changes.is_empty() {
        out.push_str("No changes.\n");
        return out;
    }

    let _ = writeln!(out, "{} operation(s)", changes.len());
    for module in &changes.creates {
        let _ = writeln!(out, "  create  {:?}", module.name);
    }
    for update in &changes.updates {
        let _ = writeln!(out, "  update  {} {:?}", update.id, update.patch);
    }
    for id in &changes.deletes {
        let _ = writeln!(out, "  delete  {id}");
    }
    for reorder in &changes.reorders {
        let ids: Vec<&str> = reorder.ids.iter().map(ResourceId::as_str).collect();
        let parent = reorder.parent.as_ref().map_or("(top level)", ResourceId::as_str);
        let _ = writeln!(out, "  reorder {parent}: [{}]", ids.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn module(id: &str, name: &str, order: u32) -> Module {
        Module::new(name).with_id(id).with_order(order)
    }

    #[test]
    fn missing_modules_are_deleted_and_new_ones_created() {
        let baseline = vec![module("srv-1", "Login", 0), module("srv-2", "Search", 1)];
        let draft = vec![module("srv-1", "Login", 0), Module::new("Profile").with_order(1)];

        let changes = diff_modules(&baseline, draft);
        assert_eq!(changes.deletes, vec![ResourceId::new("srv-2")]);
        assert_eq!(changes.creates.len(), 1);
        assert!(changes.creates[0].id.is_local());
    }

    #[test]
    fn text_lists_every_operation() {
        let baseline = vec![module("srv-a", "A", 0), module("srv-b", "B", 1)];
        let draft = vec![module("srv-b", "B", 0), module("srv-a", "A", 1)];

        let text = render_text(&diff_modules(&baseline, draft));
        assert!(text.starts_with("1 operation(s)"));
        assert!(text.contains("reorder (top level): [srv-b, srv-a]"));
    }

    #[test]
    fn identical_lists_have_no_changes() {
        let baseline = vec![module("srv-a", "A", 0)];
        assert_eq!(render_text(&diff_modules(&baseline, baseline.clone())), "No changes.\n");
    }
}
