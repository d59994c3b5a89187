//! Server-to-client protocol lines.

use std::fmt;

use relay_core::{MemberName, Roster};

const SUBMIT_NAME: &str = "SUBMITNAME";
const NAME_ACCEPTED: &str = "NAMEACCEPTED";
const MESSAGE: &str = "MESSAGE";
const COORDINATOR: &str = "COORDINATOR";
const MEMBERS: &str = "MEMBERS";

/// One line sent from the relay to a client.
///
/// `Display` produces the wire form without the trailing newline; the
/// transport appends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Ask the client for a display name.
    SubmitName,

    /// The submitted name was accepted.
    NameAccepted(MemberName),

    /// Free-form text to display verbatim.
    Message(String),

    /// The current coordinator.
    Coordinator(MemberName),

    /// The current member set, in lexicographic order.
    Members(Vec<MemberName>),
}

impl ServerLine {
    /// Creates a `SUBMITNAME` line.
    pub fn submit_name() -> Self {
        Self::SubmitName
    }

    /// Creates a `NAMEACCEPTED <name>` line.
    pub fn name_accepted(name: MemberName) -> Self {
        Self::NameAccepted(name)
    }

    /// Creates a `MESSAGE <text>` line. The text is pre-formatted.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Creates a `COORDINATOR <name>` line.
    pub fn coordinator(name: MemberName) -> Self {
        Self::Coordinator(name)
    }

    /// The `COORDINATOR` and `MEMBERS` lines describing a roster.
    ///
    /// An empty roster has no coordinator to announce and yields nothing.
    pub fn roster_update(roster: &Roster) -> Vec<Self> {
        match roster.coordinator() {
            Some(coordinator) => vec![
                Self::coordinator(coordinator.clone()),
                Self::Members(roster.members().to_vec()),
            ],
            None => Vec::new(),
        }
    }

    /// Encodes the line into its wire form.
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServerLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubmitName => f.write_str(SUBMIT_NAME),
            Self::NameAccepted(name) => write!(f, "{NAME_ACCEPTED} {name}"),
            Self::Message(text) => write!(f, "{MESSAGE} {text}"),
            Self::Coordinator(name) => write!(f, "{COORDINATOR} {name}"),
            Self::Members(names) => {
                write!(f, "{MEMBERS} [")?;
                for (i, name) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(name.as_str())?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> MemberName {
        MemberName::parse(s).unwrap()
    }

    #[test]
    fn test_encode_fixed_vocabulary() {
        assert_eq!(ServerLine::submit_name().encode(), "SUBMITNAME");
        assert_eq!(
            ServerLine::name_accepted(name("alice")).encode(),
            "NAMEACCEPTED alice"
        );
        assert_eq!(
            ServerLine::message("alice(12:00): hi").encode(),
            "MESSAGE alice(12:00): hi"
        );
        assert_eq!(
            ServerLine::coordinator(name("bob")).encode(),
            "COORDINATOR bob"
        );
    }

    #[test]
    fn test_roster_update_lines() {
        let roster = Roster::new(Some(name("bob")), vec![name("carol"), name("bob")]);
        let lines: Vec<String> = ServerLine::roster_update(&roster)
            .iter()
            .map(ServerLine::encode)
            .collect();
        assert_eq!(lines, vec!["COORDINATOR bob", "MEMBERS [bob, carol]"]);
    }

    #[test]
    fn test_roster_update_empty_roster() {
        assert!(ServerLine::roster_update(&Roster::empty()).is_empty());
    }
}
