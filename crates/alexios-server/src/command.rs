//! Utterance classification and argument parsing.
//!
//! Everything here is pure. Parsers never normalize case or trim: they
//! return slices of the original text so a caller can always recover what
//! was said.

/// Branches a command can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Send,
    Read,
    SignUp,
    Status,
}

/// Prefixes in priority order. The first match wins; anything that matches
/// none of them is a [`CommandKind::Status`] query.
pub const COMMAND_PREFIXES: &[(&str, CommandKind)] = &[
    ("Send", CommandKind::Send),
    ("Read", CommandKind::Read),
    ("Sign Up", CommandKind::SignUp),
];

/// Arguments of a well-formed `Send <name> <text>` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendCommand {
    pub recipient: String,
    pub body: String,
}

/// A classified utterance with its arguments already parsed.
///
/// `None` payloads mean the branch was recognised but its arguments were
/// malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Send(Option<SendCommand>),
    /// Zero-based mailbox position.
    Read(Option<usize>),
    SignUp(Option<String>),
    Status,
}

impl Intent {
    /// Classifies `command` and parses the arguments for its branch.
    pub fn classify(command: &str) -> Self {
        match classify(command) {
            CommandKind::Send => Intent::Send(parse_send(command)),
            CommandKind::Read => Intent::Read(parse_read(command)),
            CommandKind::SignUp => Intent::SignUp(parse_register(command)),
            CommandKind::Status => Intent::Status,
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Intent::Send(_) => CommandKind::Send,
            Intent::Read(_) => CommandKind::Read,
            Intent::SignUp(_) => CommandKind::SignUp,
            Intent::Status => CommandKind::Status,
        }
    }
}

/// Picks the branch for `command` by case-sensitive prefix match.
pub fn classify(command: &str) -> CommandKind {
    COMMAND_PREFIXES
        .iter()
        .find(|(prefix, _)| command.starts_with(prefix))
        .map(|(_, kind)| *kind)
        .unwrap_or(CommandKind::Status)
}

/// Parses `Send <recipient> <body...>`.
///
/// The body is everything after the recipient, internal whitespace and
/// punctuation included. Returns `None` if either part is missing or empty.
pub fn parse_send(command: &str) -> Option<SendCommand> {
    let mut parts = command.splitn(3, char::is_whitespace);
    let _keyword = parts.next()?;
    let recipient = parts.next()?;
    let body = parts.next()?;
    if recipient.is_empty() || body.is_empty() {
        return None;
    }
    Some(SendCommand {
        recipient: recipient.to_string(),
        body: body.to_string(),
    })
}

/// Parses `Read <n>` into the zero-based position `n - 1`.
///
/// Returns `None` if the number is missing, not an integer, or below 1.
pub fn parse_read(command: &str) -> Option<usize> {
    let raw = command.split_whitespace().nth(1)?;
    let index: i64 = raw.parse().ok()?;
    if index < 1 {
        return None;
    }
    usize::try_from(index - 1).ok()
}

/// Parses `Sign Up <username>`.
///
/// The username is the verbatim remainder after the two keyword words and
/// may itself contain spaces.
pub fn parse_register(command: &str) -> Option<String> {
    let username = command.splitn(3, char::is_whitespace).nth(2)?;
    if username.is_empty() {
        return None;
    }
    Some(username.to_string())
}
