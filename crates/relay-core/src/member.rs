//! Member identity and roster value objects.

use std::fmt;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Member Name
// ============================================================================

/// Display name claimed by one connected participant.
///
/// Names are compared by value and ordered lexicographically (byte order),
/// which is also the order used when a new coordinator has to be picked.
/// A `MemberName` is always non-empty and never spans more than one line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberName(String);

impl MemberName {
    /// Validates a candidate name as submitted by a client.
    ///
    /// The candidate is taken verbatim: surrounding whitespace is part of
    /// the name.
    pub fn parse(candidate: impl Into<String>) -> DomainResult<Self> {
        let name = candidate.into();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        if name.contains(['\n', '\r']) {
            return Err(DomainError::NameContainsLineBreak { name });
        }
        Ok(Self(name))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MemberName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for MemberName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MemberName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ============================================================================
// Roster
// ============================================================================

/// Point-in-time copy of the membership and coordinator.
///
/// Produced by the registry inside the same atomic step as the mutation it
/// describes, so the coordinator is always one of `members` (or `None` when
/// `members` is empty). `members` is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    coordinator: Option<MemberName>,
    members: Vec<MemberName>,
}

impl Roster {
    /// Builds a roster from any collection of members.
    ///
    /// Members are sorted and deduplicated. A coordinator that is not part
    /// of the member set is discarded.
    pub fn new(
        coordinator: Option<MemberName>,
        members: impl IntoIterator<Item = MemberName>,
    ) -> Self {
        let mut members: Vec<MemberName> = members.into_iter().collect();
        members.sort();
        members.dedup();
        let coordinator = coordinator.filter(|c| members.binary_search(c).is_ok());
        Self {
            coordinator,
            members,
        }
    }

    /// The empty roster.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn coordinator(&self) -> Option<&MemberName> {
        self.coordinator.as_ref()
    }

    /// Members in lexicographic order.
    pub fn members(&self) -> &[MemberName] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, name: &MemberName) -> bool {
        self.members.binary_search(name).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> MemberName {
        MemberName::parse(s).unwrap()
    }

    #[test]
    fn test_member_name_rejects_empty() {
        assert_eq!(MemberName::parse(""), Err(DomainError::EmptyName));
    }

    #[test]
    fn test_member_name_rejects_line_breaks() {
        assert!(matches!(
            MemberName::parse("ali\nce"),
            Err(DomainError::NameContainsLineBreak { .. })
        ));
        assert!(MemberName::parse("alice\r").is_err());
    }

    #[test]
    fn test_member_name_keeps_whitespace() {
        let n = name(" alice ");
        assert_eq!(n.as_str(), " alice ");
        assert_ne!(n, name("alice"));
    }

    #[test]
    fn test_member_name_value_equality() {
        let a = name("bob");
        let b = MemberName::parse(String::from("bob")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "bob");
    }

    #[test]
    fn test_member_name_ordering_is_lexicographic() {
        let mut names = vec![name("carol"), name("alice"), name("bob")];
        names.sort();
        assert_eq!(names, vec![name("alice"), name("bob"), name("carol")]);
    }

    #[test]
    fn test_roster_sorts_and_dedups() {
        let roster = Roster::new(
            Some(name("bob")),
            vec![name("carol"), name("bob"), name("carol")],
        );
        assert_eq!(roster.members(), &[name("bob"), name("carol")]);
        assert_eq!(roster.coordinator(), Some(&name("bob")));
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_roster_drops_foreign_coordinator() {
        let roster = Roster::new(Some(name("zed")), vec![name("alice")]);
        assert_eq!(roster.coordinator(), None);
        assert!(roster.contains(&name("alice")));
    }

    #[test]
    fn test_empty_roster() {
        let roster = Roster::empty();
        assert!(roster.is_empty());
        assert_eq!(roster.coordinator(), None);
    }
}
