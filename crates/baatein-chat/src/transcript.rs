use baatein_core::types::{Role, Turn};

use crate::error::ChatError;

/// Ordered conversation log for one session.
///
/// Turn 0 is always the persona's system prompt and is never removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn::new(role, content));
    }

    /// Remove the most recent turn, never the system seed.
    pub fn rollback_last(&mut self) -> Result<Turn, ChatError> {
        if self.turns.len() <= 1 {
            return Err(ChatError::EmptyTranscript);
        }
        self.turns.pop().ok_or(ChatError::EmptyTranscript)
    }

    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn system_prompt(&self) -> &str {
        &self.turns[0].content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_seeds_system_turn() {
        let transcript = Transcript::new("You are Nova.");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.snapshot()[0], Turn::system("You are Nova."));
        assert_eq!(transcript.system_prompt(), "You are Nova.");
    }

    #[test]
    fn test_append_and_rollback() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Role::User, "hello");
        transcript.append(Role::Assistant, "hi there");
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.last(), Some(&Turn::assistant("hi there")));

        let removed = transcript.rollback_last().unwrap();
        assert_eq!(removed, Turn::assistant("hi there"));
        assert_eq!(transcript.last(), Some(&Turn::user("hello")));
    }

    #[test]
    fn test_rollback_never_removes_system_turn() {
        let mut transcript = Transcript::new("sys");
        transcript.append(Role::User, "hello");
        transcript.rollback_last().unwrap();

        let err = transcript.rollback_last().unwrap_err();
        assert!(matches!(err, ChatError::EmptyTranscript));
        assert_eq!(transcript.snapshot(), &[Turn::system("sys")]);
    }
}
