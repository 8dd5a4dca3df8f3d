use crate::domain::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Conversation id shared by both participants of a match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(String);

impl MatchId {
    pub const SEPARATOR: char = '_';

    /// Lexicographically ordered pair key, identical whichever side initiated.
    #[must_use]
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{low}{}{high}", Self::SEPARATOR))
    }

    /// Wraps an id received from a client. It is only trusted after a lookup.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub id: MatchId,
    pub users: [UserId; 2],
    pub created_at: Option<OffsetDateTime>,
}

impl Match {
    #[must_use]
    pub fn involves(&self, user: &UserId) -> bool {
        self.users.contains(user)
    }

    /// The participant that is not `user`, if `user` takes part at all.
    #[must_use]
    pub fn counterpart(&self, user: &UserId) -> Option<&UserId> {
        if !self.involves(user) {
            return None;
        }
        self.users.iter().find(|u| *u != user)
    }
}
