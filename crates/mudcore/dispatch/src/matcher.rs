//! Input matching strategy
//!
//! Turning an input line into candidate commands is pluggable. The dispatcher
//! only needs every command the line could mean; it decides what zero, one or
//! many candidates imply.

use mudcore_cmdset::{Command, CommandSet};

/// One way of reading the input line
#[derive(Debug, Clone)]
pub struct CommandMatch {
    pub command: Command,
    /// The name as typed
    pub cmdname: String,
    /// Everything after the name, switches included
    pub args: String,
}

/// Finds the commands an input line refers to
pub trait CommandMatcher: Send + Sync {
    fn find(&self, input: &str, available: &CommandSet) -> Vec<CommandMatch>;
}

/// Exact key/alias matching
///
/// Multi-word names are supported and the longest name that matches wins, so
/// `press button now` finds `press button` before `press`. A `/switch` glued
/// to the name is split off into the arguments. Inputs starting with a
/// single punctuation character (`'hello`, `:waves`) also try that character
/// as the name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatcher;

impl CommandMatcher for ExactMatcher {
    fn find(&self, input: &str, available: &CommandSet) -> Vec<CommandMatch> {
        let input = input.trim();
        let tokens = token_spans(input);
        let Some(&(first_start, _)) = tokens.first() else {
            return Vec::new();
        };

        for n in (1..=tokens.len()).rev() {
            let (last_start, last) = tokens[n - 1];
            let end = last_start + last.len();
            let found = collect(available, &input[first_start..end], &input[end..]);
            if !found.is_empty() {
                return found;
            }

            if let Some(slash) = last.find('/').filter(|&i| i > 0) {
                let name_end = last_start + slash;
                let found = collect(available, &input[first_start..name_end], &input[name_end..]);
                if !found.is_empty() {
                    return found;
                }
            }
        }

        let mut chars = input.chars();
        match chars.next() {
            Some(c) if !c.is_alphanumeric() => {
                let split = c.len_utf8();
                collect(available, &input[..split], &input[split..])
            }
            _ => Vec::new(),
        }
    }
}

fn collect(available: &CommandSet, name: &str, rest: &str) -> Vec<CommandMatch> {
    available
        .get_all(name)
        .into_iter()
        .map(|command| CommandMatch {
            command: command.clone(),
            cmdname: name.to_string(),
            args: rest.trim().to_string(),
        })
        .collect()
}

/// Whitespace-separated tokens with their byte offsets
fn token_spans(input: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in input.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                spans.push((s, &input[s..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        spans.push((s, &input[s..]));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mudcore_cmdset::{CommandContext, CommandError, CommandHandler, ParsedArgs};

    struct Noop;

    #[async_trait]
    impl CommandHandler for Noop {
        async fn execute(
            &self,
            _ctx: &mut CommandContext<'_>,
            _args: &ParsedArgs,
        ) -> Result<(), CommandError> {
            Ok(())
        }
    }

    fn available() -> CommandSet {
        CommandSet::new("test").with_commands([
            Command::new("look", Noop).with_aliases(["l"]),
            Command::new("press", Noop),
            Command::new("press button", Noop),
            Command::new("say", Noop).with_aliases(["'"]),
        ])
    }

    fn names(matches: &[CommandMatch]) -> Vec<(&str, &str)> {
        matches
            .iter()
            .map(|m| (m.command.key(), m.args.as_str()))
            .collect()
    }

    #[test]
    fn test_token_spans() {
        assert_eq!(token_spans("  a  bc d"), vec![(2, "a"), (5, "bc"), (8, "d")]);
        assert!(token_spans("   ").is_empty());
    }

    #[test]
    fn test_alias_and_case() {
        let found = ExactMatcher.find("L sword", &available());
        assert_eq!(names(&found), vec![("look", "sword")]);
        assert_eq!(found[0].cmdname, "L");
    }

    #[test]
    fn test_longest_name_wins() {
        let set = available();
        assert_eq!(
            names(&ExactMatcher.find("press   button hard", &set)),
            vec![("press button", "hard")]
        );
        assert_eq!(names(&ExactMatcher.find("press lever", &set)), vec![("press", "lever")]);
    }

    #[test]
    fn test_switches_stay_in_args() {
        let found = ExactMatcher.find("look/brief sword", &available());
        assert_eq!(names(&found), vec![("look", "/brief sword")]);
        assert_eq!(found[0].cmdname, "look");
    }

    #[test]
    fn test_punctuation_alias() {
        let found = ExactMatcher.find("'hello there", &available());
        assert_eq!(names(&found), vec![("say", "hello there")]);
    }

    #[test]
    fn test_no_match() {
        assert!(ExactMatcher.find("dance", &available()).is_empty());
        assert!(ExactMatcher.find("", &available()).is_empty());
        assert!(ExactMatcher.find(":waves", &available()).is_empty());
    }
}
