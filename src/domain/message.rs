use crate::domain::matching::MatchId;
use crate::domain::user::UserId;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: MatchId,
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
    pub timestamp: Option<OffsetDateTime>,
    pub read: bool,
}

/// A message about to be written; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: MatchId,
    pub sender: UserId,
    pub receiver: UserId,
    pub text: String,
}

impl NewMessage {
    /// Trims the text and enforces the length bounds.
    ///
    /// # Errors
    /// Returns a description of the violated bound.
    pub fn new(
        conversation_id: MatchId,
        sender: UserId,
        receiver: UserId,
        text: &str,
        max_len: usize,
    ) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("Message text cannot be empty".to_string());
        }
        if text.chars().count() > max_len {
            return Err(format!("Message text exceeds {max_len} characters"));
        }
        Ok(Self { conversation_id, sender, receiver, text: text.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_trims_and_bounds() {
        let a = UserId::new("a");
        let b = UserId::new("b");
        let id = MatchId::for_pair(&a, &b);

        let msg = NewMessage::new(id.clone(), a.clone(), b.clone(), "  hi there \n", 10).unwrap();
        assert_eq!(msg.text, "hi there");

        assert!(NewMessage::new(id.clone(), a.clone(), b.clone(), "   ", 10).is_err());
        assert!(NewMessage::new(id, a, b, "this is far too long", 10).is_err());
    }
}
