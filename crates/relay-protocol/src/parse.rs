//! Classification of lines submitted by clients.

use crate::error::ProtocolError;

/// Prefix that marks a private message: `/[<name>]<body>`.
const PRIVATE_PREFIX: &str = "/[";

/// Closing bracket of the private target.
const PRIVATE_CLOSE: char = ']';

/// Quit command, matched case-insensitively as a prefix.
const QUIT_COMMAND: &str = "/quit";

/// A private message extracted from a client line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivateMessage<'a> {
    /// Text between `/[` and the first `]`, verbatim.
    pub target: &'a str,
    /// Everything after the first `]`.
    pub body: &'a str,
}

/// A line received from a client after its name was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientLine<'a> {
    /// Disconnect request.
    Quit,
    /// Private message to one member.
    Private(PrivateMessage<'a>),
    /// Started like a private message but has no closing bracket.
    MalformedPrivate,
    /// Anything else: a chat message for everyone.
    Chat(&'a str),
}

impl<'a> ClientLine<'a> {
    /// Classifies a line. Never fails: free-form text is a chat message.
    pub fn parse(line: &'a str) -> Self {
        if parse_quit(line) {
            return Self::Quit;
        }
        match parse_private_target(line) {
            Ok(Some(private)) => Self::Private(private),
            Ok(None) => Self::Chat(line),
            Err(_) => Self::MalformedPrivate,
        }
    }
}

/// Returns true if the line starts with `/quit`, ignoring ASCII case.
pub fn parse_quit(line: &str) -> bool {
    line.get(..QUIT_COMMAND.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(QUIT_COMMAND))
}

/// Extracts the target and body of a private message.
///
/// Returns `Ok(None)` for lines that are not private messages and
/// `Err(ProtocolError::MalformedPrivate)` when the closing bracket is
/// missing.
pub fn parse_private_target(line: &str) -> Result<Option<PrivateMessage<'_>>, ProtocolError> {
    let Some(rest) = line.strip_prefix(PRIVATE_PREFIX) else {
        return Ok(None);
    };

    let (target, body) = rest
        .split_once(PRIVATE_CLOSE)
        .ok_or(ProtocolError::MalformedPrivate)?;

    Ok(Some(PrivateMessage { target, body }))
}
