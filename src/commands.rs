//! `:` commands and their autocomplete ranking.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandId {
  Exchanges,
  Tasks,
  Contacts,
  Documents,
  Users,
  Audit,
  Reports,
  Notifications,
  PracticePanther,
  ClearCache,
  Logout,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub id: CommandId,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

pub const COMMANDS: &[Command] = &[
  Command {
    id: CommandId::Exchanges,
    name: "exchanges",
    aliases: &["ex", "x", "1031"],
    description: "Exchange pipeline",
  },
  Command {
    id: CommandId::Tasks,
    name: "tasks",
    aliases: &["t", "todo"],
    description: "Tasks across all exchanges",
  },
  Command {
    id: CommandId::Contacts,
    name: "contacts",
    aliases: &["c", "people"],
    description: "Clients, escrow and title contacts",
  },
  Command {
    id: CommandId::Documents,
    name: "documents",
    aliases: &["d", "docs", "files"],
    description: "Uploaded documents",
  },
  Command {
    id: CommandId::Users,
    name: "users",
    aliases: &["u", "admin"],
    description: "Platform users (admin)",
  },
  Command {
    id: CommandId::Audit,
    name: "audit",
    aliases: &["a", "logs"],
    description: "Audit log feed",
  },
  Command {
    id: CommandId::Reports,
    name: "reports",
    aliases: &["r", "dashboard", "stats"],
    description: "Portfolio figures",
  },
  Command {
    id: CommandId::Notifications,
    name: "notifications",
    aliases: &["n", "prefs"],
    description: "Notification preferences",
  },
  Command {
    id: CommandId::PracticePanther,
    name: "pp",
    aliases: &["practicepanther", "sync", "crm"],
    description: "PracticePanther integration",
  },
  Command {
    id: CommandId::ClearCache,
    name: "clear-cache",
    aliases: &["cc", "flush"],
    description: "Drop every cached response",
  },
  Command {
    id: CommandId::Logout,
    name: "logout",
    aliases: &["signout"],
    description: "Clear the stored session",
  },
  Command {
    id: CommandId::Quit,
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit exdesk",
  },
];

/// How well `cmd` matches `input`; lower is better, `None` is no match.
fn rank(cmd: &Command, input: &str) -> Option<u8> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

/// Autocomplete suggestions, best match first.
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input = input.trim().to_lowercase();
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u8)> = COMMANDS
    .iter()
    .filter_map(|cmd| rank(cmd, &input).map(|r| (cmd, r)))
    .collect();
  // Stable sort keeps table order within a rank
  matches.sort_by_key(|(_, r)| *r);
  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a name or alias exactly.
pub fn lookup(input: &str) -> Option<CommandId> {
  let input = input.trim().to_lowercase();
  COMMANDS
    .iter()
    .find(|cmd| matches!(rank(cmd, &input), Some(0 | 1)))
    .map(|cmd| cmd.id)
}
