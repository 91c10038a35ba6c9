//! Message types sent to the reasoning engine.
//!
//! A triage stage is a single user message: the prompt text, plus an
//! uploaded image for image triage. Providers translate these into their
//! own wire formats.

use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The prompt author
    User,
    /// The reasoning engine
    Assistant,
    /// System instructions
    System,
}

/// A single message exchanged with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Images that accompany the text (user messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attach an image to this message.
    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

/// Raw image bytes plus their media type (e.g. `image/png`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub media_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ImageAttachment {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
        }
    }

    /// Guess the media type from the leading magic bytes.
    pub fn sniff_media_type(data: &[u8]) -> Option<&'static str> {
        match data {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
            [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
            [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for ImageAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAttachment")
            .field("media_type", &self.media_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_has_role() {
        let msg = Message::user("I have a mild headache");
        assert_eq!(msg.role, Role::User);
        assert!(msg.images.is_empty());
    }

    #[test]
    fn with_image_attaches() {
        let img = ImageAttachment::new("image/png", vec![1, 2, 3]);
        let msg = Message::user("look at this").with_image(img);
        assert_eq!(msg.images.len(), 1);
        assert_eq!(msg.images[0].len(), 3);
    }

    #[test]
    fn sniffs_common_formats() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(ImageAttachment::sniff_media_type(&png), Some("image/png"));
        assert_eq!(
            ImageAttachment::sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some("image/jpeg")
        );
        assert_eq!(ImageAttachment::sniff_media_type(b"GIF89a"), Some("image/gif"));
        assert_eq!(
            ImageAttachment::sniff_media_type(b"RIFF\0\0\0\0WEBPVP8 "),
            Some("image/webp")
        );
        assert_eq!(ImageAttachment::sniff_media_type(b"%PDF-1.7"), None);
    }

    #[test]
    fn debug_hides_bytes() {
        let img = ImageAttachment::new("image/jpeg", vec![0; 2048]);
        let dbg = format!("{img:?}");
        assert!(dbg.contains("2048"));
        assert!(!dbg.contains("[0, 0"));
    }
}
