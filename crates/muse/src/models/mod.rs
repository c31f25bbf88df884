pub mod attachment;
pub mod message;

pub use self::attachment::Attachment;
pub use self::message::{Message, MessagePatch, Role};
