//! Bot API wire types
//!
//! Only the fields the relay reads are modeled; serde skips the rest.

use serde::Deserialize;

/// Envelope around every Bot API response
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating a rate-limited request
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

impl Update {
    /// The message carried by this update, from a group or a channel
    pub fn into_message(self) -> Option<Message> {
        self.message.or(self.channel_post)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    /// Available sizes of an attached photo
    pub photo: Option<Vec<PhotoSize>>,
}

impl Message {
    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty())
    }

    /// Highest resolution version of the attached photo
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_ref()?
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Chat {
    /// Readable name for logs
    pub fn display_name(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.first_name.clone())
            .or_else(|| self.username.as_ref().map(|u| format!("@{u}")))
            .unwrap_or_else(|| self.id.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    /// Server-side path, valid for at least an hour
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_photo_update() {
        let json = r#"{
            "update_id": 901,
            "message": {
                "message_id": 55,
                "date": 1700000000,
                "chat": {"id": -1001234, "type": "supergroup", "title": "Alloy"},
                "photo": [
                    {"file_id": "small", "file_unique_id": "a", "width": 90, "height": 160, "file_size": 1200},
                    {"file_id": "big", "file_unique_id": "b", "width": 720, "height": 1280, "file_size": 90000},
                    {"file_id": "mid", "file_unique_id": "c", "width": 320, "height": 569}
                ]
            }
        }"#;

        let update: Update = serde_json::from_str(json).unwrap();
        assert_eq!(update.update_id, 901);

        let message = update.into_message().unwrap();
        assert!(message.has_photo());
        assert_eq!(message.largest_photo().unwrap().file_id, "big");
        assert_eq!(message.chat.display_name(), "Alloy");
    }

    #[test]
    fn test_parse_text_update() {
        let json = r#"{"update_id": 1, "message": {"message_id": 2, "chat": {"id": 3, "type": "private", "first_name": "Imelda"}, "text": "hi"}}"#;
        let message = serde_json::from_str::<Update>(json).unwrap().into_message().unwrap();
        assert!(!message.has_photo());
        assert!(message.largest_photo().is_none());
        assert_eq!(message.chat.display_name(), "Imelda");
    }

    #[test]
    fn test_parse_channel_post() {
        let json = r#"{"update_id": 1, "channel_post": {"message_id": 2, "chat": {"id": 3, "type": "channel", "username": "shops"}}}"#;
        let message = serde_json::from_str::<Update>(json).unwrap().into_message().unwrap();
        assert_eq!(message.chat.display_name(), "@shops");
    }

    #[test]
    fn test_parse_rate_limit_error() {
        let json = r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 7", "parameters": {"retry_after": 7}}"#;
        let response: ApiResponse<Message> = serde_json::from_str(json).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.unwrap().retry_after, Some(7));
    }
}
