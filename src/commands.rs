/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "repos",
    aliases: &["r", "repo", "repositories"],
    description: "Browse repositories",
  },
  Command {
    name: "users",
    aliases: &["u", "user"],
    description: "Manage users (admin)",
  },
  Command {
    name: "orgsecrets",
    aliases: &["o", "org", "secrets"],
    description: "Organization secrets [namespace]",
  },
  Command {
    name: "sync",
    aliases: &["s"],
    description: "Synchronise repositories with the provider",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit d9s",
  },
];

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Repos,
  Users,
  OrgSecrets(Option<String>),
  Sync,
  Quit,
}

/// Parse a submitted command line. Only the first word is matched against
/// the command table; the rest are arguments.
pub fn parse(line: &str) -> Option<Action> {
  let mut words = line.split_whitespace();
  let word = words.next()?.to_lowercase();
  let cmd = COMMANDS
    .iter()
    .find(|c| c.name == word || c.aliases.contains(&word.as_str()))?;

  let action = match cmd.name {
    "repos" => Action::Repos,
    "users" => Action::Users,
    "orgsecrets" => Action::OrgSecrets(words.next().map(str::to_string)),
    "sync" => Action::Sync,
    "quit" => Action::Quit,
    _ => return None,
  };
  Some(action)
}

/// Get autocomplete suggestions for the first word of `input`
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input
    .split_whitespace()
    .next()
    .unwrap_or_default()
    .to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| {
      let priority = if cmd.name == input_lower {
        0
      } else if cmd.aliases.contains(&input_lower.as_str()) {
        1
      } else if cmd.name.starts_with(&input_lower) {
        2
      } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
        3
      } else if cmd.name.contains(&input_lower) {
        4
      } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
        5
      } else {
        return None;
      };
      Some((cmd, priority))
    })
    .collect();

  matches.sort_by_key(|(_, priority)| *priority);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    assert_eq!(get_suggestions("").len(), COMMANDS.len());
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "s" is the sync alias and a prefix of nothing else
    assert_eq!(get_suggestions("s")[0].name, "sync");
    assert_eq!(get_suggestions("secrets")[0].name, "orgsecrets");
  }

  #[test]
  fn test_prefix_and_fuzzy_match() {
    assert_eq!(get_suggestions("us")[0].name, "users");
    assert_eq!(get_suggestions("secr")[0].name, "orgsecrets");
  }

  #[test]
  fn test_suggestions_ignore_arguments() {
    assert_eq!(get_suggestions("orgsecrets octocat")[0].name, "orgsecrets");
  }

  #[test]
  fn test_parse_with_argument() {
    assert_eq!(
      parse("o octocat"),
      Some(Action::OrgSecrets(Some("octocat".to_string())))
    );
    assert_eq!(parse("orgsecrets"), Some(Action::OrgSecrets(None)));
    assert_eq!(parse("Q"), Some(Action::Quit));
  }

  #[test]
  fn test_parse_unknown() {
    assert_eq!(parse("builds"), None);
    assert_eq!(parse("   "), None);
  }
}
