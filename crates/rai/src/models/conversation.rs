use serde::{Deserialize, Serialize};

use super::message::Message;

/// A system prompt plus the ordered history of messages.
///
/// Messages can only be appended; nothing is removed or reordered once added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    system: Option<String>,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        let system = system.into();
        self.system = if system.is_empty() { None } else { Some(system) };
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn append<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = Message>,
    {
        self.messages.extend(messages);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Conversation {
            system: None,
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut conversation = Conversation::new().with_system("be brief");
        conversation.push(Message::user("one"));
        conversation.append(vec![Message::assistant("two"), Message::user("three")]);

        let contents: Vec<&str> = conversation
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(conversation.system(), Some("be brief"));
        assert_eq!(conversation.len(), 3);
    }

    #[test]
    fn test_empty_system_prompt_is_absent() {
        let conversation = Conversation::new().with_system("");
        assert_eq!(conversation.system(), None);
        assert!(conversation.is_empty());
    }
}
