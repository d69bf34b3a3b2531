use crate::model::ChatMessage;

/// Ordered, append-only conversation log.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push(ChatMessage::assistant(greeting));
        transcript
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatRole;

    #[test]
    fn test_messages_keep_append_order() {
        let mut transcript = Transcript::with_greeting("hello");
        transcript.push(ChatMessage::user("first"));
        transcript.push(ChatMessage::assistant("second"));

        let contents: Vec<&str> = transcript.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "first", "second"]);
        assert_eq!(transcript.last().map(|m| m.role), Some(ChatRole::Assistant));
        assert_eq!(transcript.len(), 3);
    }
}
