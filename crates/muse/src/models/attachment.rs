use serde::{Deserialize, Serialize};

/// A file the user staged for the next turn. Attachments are transient:
/// the conversation clears them after every settled turn and on fork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    /// Base64 payload, without any `data:...;base64,` prefix.
    pub data: String,
}

impl Attachment {
    pub fn new<N: Into<String>, M: Into<String>, D: Into<String>>(
        name: N,
        mime_type: M,
        data: D,
    ) -> Self {
        let data = data.into();
        let data = match data.split_once("base64,") {
            Some((_, rest)) => rest.to_string(),
            None => data,
        };
        Attachment {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_prefix_is_stripped() {
        let att = Attachment::new("photo.png", "image/png", "data:image/png;base64,aGVsbG8=");
        assert_eq!(att.data, "aGVsbG8=");
    }

    #[test]
    fn test_raw_base64_kept_as_is() {
        let att = Attachment::new("photo.png", "image/png", "aGVsbG8=");
        assert_eq!(att.data, "aGVsbG8=");
    }
}
