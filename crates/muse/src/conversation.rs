//! Ordered message history with branch-by-truncation semantics.
//!
//! Single-writer: the engine assumes at most one turn is in flight per
//! conversation. No locking happens here; that discipline is the caller's.

use uuid::Uuid;

use crate::models::{Attachment, Message, MessagePatch, Role};

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
    attachments: Vec<Attachment>,
}

impl Conversation {
    pub fn new() -> Self {
        Conversation::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Conversation {
            messages,
            attachments: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Shallow-merge patch fields into the message with this id. Unknown
    /// ids are ignored.
    pub fn update(&mut self, id: Uuid, patch: MessagePatch) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == id) {
            if let Some(content) = patch.content {
                message.content = content;
            }
            if let Some(is_streaming) = patch.is_streaming {
                message.is_streaming = is_streaming;
            }
        }
    }

    pub fn delete(&mut self, id: Uuid) {
        self.messages.retain(|m| m.id != id);
    }

    /// Truncate to the prefix ending at and including `id`, discarding the
    /// suffix permanently, and clear pending attachments. A no-op when the
    /// id is not present.
    pub fn fork(&mut self, id: Uuid) {
        if let Some(index) = self.messages.iter().position(|m| m.id == id) {
            self.messages.truncate(index + 1);
            self.attachments.clear();
        }
    }

    /// Determine the user message to resend for a regeneration. If the last
    /// message is assistant-authored it is deleted first. Returns `None` for
    /// an empty conversation or when the remaining tail is not a user turn.
    pub fn regenerate_target(&mut self) -> Option<Uuid> {
        let last = self.messages.last()?;
        if last.role == Role::Assistant {
            let id = last.id;
            self.delete(id);
        }
        let target = self.messages.last()?;
        if target.role == Role::User {
            Some(target.id)
        } else {
            None
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Conversation, Vec<Uuid>) {
        let mut convo = Conversation::new();
        let messages = vec![
            Message::user("A"),
            Message::assistant("B"),
            Message::user("C"),
            Message::assistant("D"),
        ];
        let ids = messages.iter().map(|m| m.id).collect();
        for m in messages {
            convo.add(m);
        }
        (convo, ids)
    }

    #[test]
    fn test_update_is_a_shallow_merge() {
        let (mut convo, ids) = seeded();
        convo.update(ids[1], MessagePatch::content("B grown"));
        let msg = convo.get(ids[1]).unwrap();
        assert_eq!(msg.content, "B grown");
        assert!(!msg.is_streaming);

        convo.update(ids[1], MessagePatch::streaming(true));
        let msg = convo.get(ids[1]).unwrap();
        assert_eq!(msg.content, "B grown");
        assert!(msg.is_streaming);
    }

    #[test]
    fn test_update_unknown_id_is_noop() {
        let (mut convo, _) = seeded();
        let before = convo.messages().to_vec();
        convo.update(Uuid::new_v4(), MessagePatch::settle("x"));
        assert_eq!(convo.messages(), &before[..]);
    }

    #[test]
    fn test_fork_truncates_inclusively_and_clears_attachments() {
        let (mut convo, ids) = seeded();
        let original: Vec<Message> = convo.messages().to_vec();
        convo.add_attachment(Attachment::new("f.txt", "text/plain", "aGk="));

        convo.fork(ids[1]);

        assert_eq!(convo.messages().len(), 2);
        assert_eq!(convo.messages(), &original[..2]);
        assert!(convo.attachments().is_empty());
    }

    #[test]
    fn test_fork_unknown_id_is_noop() {
        let (mut convo, _) = seeded();
        convo.add_attachment(Attachment::new("f.txt", "text/plain", "aGk="));
        convo.fork(Uuid::new_v4());
        assert_eq!(convo.messages().len(), 4);
        assert_eq!(convo.attachments().len(), 1);
    }

    #[test]
    fn test_regenerate_removes_trailing_assistant() {
        let mut convo = Conversation::new();
        let user = Message::user("A");
        let user_id = user.id;
        convo.add(user);
        convo.add(Message::assistant("B"));

        let target = convo.regenerate_target();
        assert_eq!(target, Some(user_id));
        assert_eq!(convo.messages().len(), 1);
    }

    #[test]
    fn test_regenerate_with_trailing_user_deletes_nothing() {
        let mut convo = Conversation::new();
        let user = Message::user("A");
        let user_id = user.id;
        convo.add(user);

        assert_eq!(convo.regenerate_target(), Some(user_id));
        assert_eq!(convo.messages().len(), 1);
    }

    #[test]
    fn test_regenerate_on_empty_conversation() {
        let mut convo = Conversation::new();
        assert_eq!(convo.regenerate_target(), None);
    }

    #[test]
    fn test_delete_removes_one_message() {
        let (mut convo, ids) = seeded();
        convo.delete(ids[2]);
        assert_eq!(convo.messages().len(), 3);
        assert!(convo.get(ids[2]).is_none());
    }
}
