//! Command set merging
//!
//! `merge(a, b)` merges `a` onto `b`. The operand with the strictly higher
//! priority is dominant; on a tie `a` is. The dominant set decides the merge
//! type, via its `key_mergetypes` entry for the other set's key or else its
//! own merge type, and its commands win collisions unless the duplicates
//! rule keeps both.
//!
//! [`merge_all`] sorts by ascending priority and folds left, so the highest
//! priority set is merged last and dominates everything under it. Swapping
//! the fold order changes which commands are available.

use crate::cmdset::{CommandSet, MergeType};
use crate::command::Command;
use tracing::debug;

/// Merge `incoming` onto `current`
pub fn merge(incoming: &CommandSet, current: &CommandSet) -> CommandSet {
    let (dominant, recessive) = if current.priority > incoming.priority {
        (current, incoming)
    } else {
        (incoming, current)
    };

    let merge_type = if recessive.key.is_empty() {
        dominant.merge_type
    } else {
        dominant
            .key_mergetypes
            .get(&recessive.key)
            .copied()
            .unwrap_or(dominant.merge_type)
    };

    let keep_duplicates = incoming.priority == current.priority
        && (incoming.allows_duplicates() || current.allows_duplicates());

    let d = &dominant.commands;
    let r = &recessive.commands;
    let commands = match merge_type {
        MergeType::Union => union(d, r, keep_duplicates),
        MergeType::Intersect => intersect(d, r, keep_duplicates),
        MergeType::Replace => d.clone(),
        MergeType::Remove => r
            .iter()
            .filter(|c| !collides(c, d))
            .cloned()
            .collect(),
    };

    let mut result = dominant.empty_like();
    result.commands = commands;
    result.actual_merge_type = Some(merge_type);
    result.duplicates = None;
    result.no_exits = dominant.no_exits.or(recessive.no_exits);
    result.no_objs = dominant.no_objs.or(recessive.no_objs);
    result.no_channels = dominant.no_channels.or(recessive.no_channels);
    result.merged_from = lineage(recessive);
    result.merged_from.extend(lineage(dominant));

    debug!(
        dominant = %dominant.key,
        recessive = %recessive.key,
        mergetype = %merge_type,
        priority = result.priority,
        duplicates = keep_duplicates,
        commands = result.commands.len(),
        "Merged command sets"
    );
    result
}

/// Fold `sets` in ascending priority order
///
/// Sets of equal priority keep their given order, so the later one is
/// dominant. No sets gives an empty, unnamed set.
pub fn merge_all<I>(sets: I) -> CommandSet
where
    I: IntoIterator<Item = CommandSet>,
{
    let mut sets: Vec<CommandSet> = sets.into_iter().collect();
    sets.sort_by_key(CommandSet::priority);
    let mut iter = sets.into_iter();
    let Some(first) = iter.next() else {
        return CommandSet::default();
    };
    iter.fold(first, |merged, next| merge(&next, &merged))
}

fn collides(command: &Command, others: &[Command]) -> bool {
    others.iter().any(|o| o.same_as(command))
}

fn union(d: &[Command], r: &[Command], keep_duplicates: bool) -> Vec<Command> {
    let mut out = d.to_vec();
    out.extend(
        r.iter()
            .filter(|c| keep_duplicates || !collides(c, d))
            .cloned(),
    );
    out
}

fn intersect(d: &[Command], r: &[Command], keep_duplicates: bool) -> Vec<Command> {
    let mut out: Vec<Command> = d.iter().filter(|c| collides(c, r)).cloned().collect();
    if keep_duplicates {
        out.extend(r.iter().filter(|c| collides(c, d)).cloned());
    }
    out
}

fn lineage(set: &CommandSet) -> Vec<String> {
    if set.merged_from.is_empty() {
        vec![set.key.clone()]
    } else {
        set.merged_from.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandHandler, ParsedArgs};
    use crate::context::CommandContext;
    use crate::error::CommandError;
    use async_trait::async_trait;

    // the help text records which side a command came from
    struct Tagged;

    #[async_trait]
    impl CommandHandler for Tagged {
        async fn execute(
            &self,
            _ctx: &mut CommandContext<'_>,
            _args: &ParsedArgs,
        ) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn cmd(key: &str, side: &str) -> Command {
        Command::new(key, Tagged).with_help(side)
    }

    fn set(key: &str, priority: i32, keys: &[&str]) -> CommandSet {
        CommandSet::new(key)
            .with_priority(priority)
            .with_commands(keys.iter().map(|k| cmd(k, key)))
    }

    fn sides(set: &CommandSet) -> Vec<(String, String)> {
        let mut out: Vec<_> = set
            .iter()
            .map(|c| (c.key().to_string(), c.help_text().to_string()))
            .collect();
        out.sort();
        out
    }

    fn pair(key: &str, side: &str) -> (String, String) {
        (key.to_string(), side.to_string())
    }

    fn keys(set: &CommandSet) -> Vec<&str> {
        let mut keys: Vec<_> = set.iter().map(Command::key).collect();
        keys.sort_unstable();
        keys
    }

    #[test]
    fn test_union_without_collisions() {
        let a = set("a", 5, &["a1", "a2"]);
        let b = set("b", 0, &["b1", "b2", "b3", "b4"]);
        let c = merge(&a, &b);
        assert_eq!(c.len(), 6);
        assert_eq!(c.priority(), 5);
        assert_eq!(c.actual_merge_type(), Some(MergeType::Union));
    }

    #[test]
    fn test_union_dominant_wins_collision() {
        let a = set("a", 5, &["x", "a2"]);
        let b = set("b", 0, &["x", "b2", "b3", "b4"]);
        let c = merge(&a, &b);
        assert_eq!(c.len(), 5);
        assert_eq!(c.get("x").map(Command::help_text), Some("a"));
    }

    #[test]
    fn test_intersect_keeps_shared_from_dominant() {
        let a = set("a", 5, &["x", "y", "z"]).with_merge_type(MergeType::Intersect);
        let b = set("b", 0, &["x", "w", "v", "z"]);
        let c = merge(&a, &b);
        assert_eq!(keys(&c), vec!["x", "z"]);
        assert!(c.iter().all(|cmd| cmd.help_text() == "a"));
    }

    #[test]
    fn test_replace_keeps_only_dominant() {
        let a = set("a", 5, &["a1", "a3"]).with_merge_type(MergeType::Replace);
        let b = set("b", 0, &["a1", "b2", "b4", "b5"]);
        let c = merge(&a, &b);
        assert_eq!(sides(&c), vec![pair("a1", "a"), pair("a3", "a")]);
    }

    #[test]
    fn test_remove_masks_recessive() {
        let a = set("a", 5, &["x", "y"]).with_merge_type(MergeType::Remove);
        let b = set("b", 0, &["x", "b2", "b3", "b4", "b5"]);
        let c = merge(&a, &b);
        assert_eq!(keys(&c), vec!["b2", "b3", "b4", "b5"]);
    }

    #[test]
    fn test_higher_priority_recessive_argument_dominates() {
        // b is passed second but outranks a
        let a = set("a", 0, &["x"]).with_merge_type(MergeType::Replace);
        let b = set("b", 10, &["x", "y"]);
        let c = merge(&a, &b);
        assert_eq!(c.priority(), 10);
        assert_eq!(c.actual_merge_type(), Some(MergeType::Union));
        assert_eq!(c.get("x").map(Command::help_text), Some("b"));
        assert_eq!(c.key(), "b");
    }

    #[test]
    fn test_tie_keeps_argument_order() {
        let a = set("a", 3, &["x"]);
        let b = set("b", 3, &["x"]);
        assert_eq!(merge(&a, &b).get("x").map(Command::help_text), Some("a"));
        assert_eq!(merge(&b, &a).get("x").map(Command::help_text), Some("b"));
    }

    #[test]
    fn test_key_mergetype_override() {
        let a = set("menu", 5, &["x"]).with_key_mergetype("default", MergeType::Replace);
        let default = set("default", 0, &["look", "get"]);
        let other = set("other", 0, &["look", "get"]);
        assert_eq!(keys(&merge(&a, &default)), vec!["x"]);
        assert_eq!(keys(&merge(&a, &other)), vec!["get", "look", "x"]);

        // unnamed sets never match an override
        let unnamed = set("", 0, &["look"]);
        assert_eq!(keys(&merge(&a, &unnamed)), vec!["look", "x"]);
    }

    #[test]
    fn test_duplicates_at_equal_priority() {
        let a = set("a", 0, &["press button"]).with_duplicates(true);
        let b = set("b", 0, &["press button"]);
        let c = merge(&a, &b);
        assert_eq!(c.get_all("press button").len(), 2);
        assert_eq!(c.duplicates(), None);

        // either side may ask for it
        assert_eq!(merge(&b, &a).get_all("press button").len(), 2);

        // not across priorities
        let high = set("a", 1, &["press button"]).with_duplicates(true);
        assert_eq!(merge(&high, &b).get_all("press button").len(), 1);
    }

    #[test]
    fn test_object_attached_sets_default_to_duplicates() {
        let mut a = set("button1", 0, &["press button"]);
        let b = set("button2", 0, &["press button"]);
        assert_eq!(merge(&a, &b).len(), 1);
        a.set_object_attached(true);
        assert_eq!(merge(&a, &b).len(), 2);
        assert_eq!(merge(&a.clone().with_duplicates(false), &b).len(), 1);
    }

    #[test]
    fn test_intersect_with_duplicates_keeps_both() {
        let a = set("a", 0, &["x", "y"])
            .with_merge_type(MergeType::Intersect)
            .with_duplicates(true);
        let b = set("b", 0, &["x", "z"]);
        let c = merge(&a, &b);
        assert_eq!(sides(&c), vec![pair("x", "a"), pair("x", "b")]);
    }

    #[test]
    fn test_flags_pass_through() {
        let a = set("a", 5, &[]).with_no_exits(false);
        let b = set("b", 0, &[]).with_no_exits(true).with_no_objs(true);
        let c = merge(&a, &b);
        assert_eq!(c.no_exits(), Some(false));
        assert_eq!(c.no_objs(), Some(true));
        assert_eq!(c.no_channels(), None);
    }

    #[test]
    fn test_merge_all_folds_ascending() {
        let low = set("low", -10, &["look"]);
        let mid = set("mid", 0, &["look", "get"]);
        let high = set("high", 5, &["get"]).with_merge_type(MergeType::Remove);
        let merged = merge_all(vec![high.clone(), low.clone(), mid.clone()]);
        let stepwise = merge(&high, &merge(&mid, &low));
        assert_eq!(sides(&merged), sides(&stepwise));
        assert_eq!(keys(&merged), vec!["look"]);
        assert_eq!(merged.get("look").map(Command::help_text), Some("mid"));
        assert_eq!(merged.merged_from(), ["low", "mid", "high"]);
    }

    #[test]
    fn test_merge_all_edge_cases() {
        assert!(merge_all(Vec::<CommandSet>::new()).is_empty());
        let only = set("only", 2, &["look"]);
        let merged = merge_all(vec![only]);
        assert_eq!(merged.key(), "only");
        assert_eq!(merged.actual_merge_type(), None);
    }
}
