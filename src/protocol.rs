//! Чат-протокол поверх data channel: одна JSON-запись на строку.
//!
//! Ключи записи (`type`, `from`, `text`, `timestamp`) и значения `type`
//! (`chat`, `join`, `leave`) общие для обеих сторон, переговоров о версии нет.
//! Локально созданные сообщения не проверяются, входящие проверяются всегда.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Максимальная длина тела сообщения, в символах.
pub const MAX_TEXT_LENGTH: usize = 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid JSON format")]
    MalformedPayload,

    #[error("message type is required")]
    MissingKind,

    #[error("from field is required")]
    MissingSender,

    #[error("invalid message type: {0:?}")]
    UnknownKind(String),

    #[error("message text exceeds maximum length: {len} > {max}")]
    BodyTooLong { len: usize, max: usize },

    #[error("invalid timestamp: {0}")]
    NegativeTimestamp(i64),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Join,
    Leave,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::Join => "join",
            MessageKind::Leave => "leave",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(MessageKind::Chat),
            "join" => Ok(MessageKind::Join),
            "leave" => Ok(MessageKind::Leave),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

/// Одно событие чата.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(rename = "text")]
    pub body: String,
    /// Миллисекунды с начала эпохи.
    pub timestamp: i64,
}

/// Сырая запись с провода: любое поле может отсутствовать.
#[derive(Deserialize, Default)]
struct WireRecord {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "from", default)]
    sender: Option<String>,
    #[serde(rename = "text", default)]
    body: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl ChatMessage {
    /// Новое сообщение с текущим временем. Без валидации.
    pub fn new(kind: MessageKind, sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind,
            sender: sender.into(),
            body: body.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Запись в одну строку с завершающим '\n'.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = serde_json::to_vec(self).unwrap_or_else(|e| {
            tracing::error!("failed to serialize chat message: {e}");
            b"{}".to_vec()
        });
        data.push(b'\n');
        data
    }

    /// Разбирает и проверяет входящую запись.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        let data = data.strip_suffix(&b"\n"[..]).unwrap_or(data);
        let raw: WireRecord =
            serde_json::from_slice(data).map_err(|_| ProtocolError::MalformedPayload)?;

        let kind = match raw.kind.as_deref() {
            None | Some("") => return Err(ProtocolError::MissingKind),
            Some(k) => k,
        };
        let sender = match raw.sender {
            Some(s) if !s.is_empty() => s,
            _ => return Err(ProtocolError::MissingSender),
        };
        let kind = kind.parse::<MessageKind>()?;

        let msg = Self {
            kind,
            sender,
            body: raw.body.unwrap_or_default(),
            timestamp: raw.timestamp.unwrap_or_default(),
        };
        msg.validate()?;
        Ok(msg)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.sender.is_empty() {
            return Err(ProtocolError::MissingSender);
        }
        let len = self.body.chars().count();
        if len > MAX_TEXT_LENGTH {
            return Err(ProtocolError::BodyTooLong {
                len,
                max: MAX_TEXT_LENGTH,
            });
        }
        if self.timestamp < 0 {
            return Err(ProtocolError::NegativeTimestamp(self.timestamp));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = self.to_bytes();
        f.write_str(String::from_utf8_lossy(&line[..line.len() - 1]).as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(kind: MessageKind, sender: &str, body: &str, timestamp: i64) -> ChatMessage {
        ChatMessage {
            kind,
            sender: sender.into(),
            body: body.into(),
            timestamp,
        }
    }

    #[test]
    fn new_stamps_current_time() {
        let before = chrono::Utc::now().timestamp_millis();
        let m = ChatMessage::new(MessageKind::Chat, "alice", "hello world");
        let after = chrono::Utc::now().timestamp_millis();

        assert_eq!(m.kind, MessageKind::Chat);
        assert_eq!(m.sender, "alice");
        assert_eq!(m.body, "hello world");
        assert!(m.timestamp >= before && m.timestamp <= after);
    }

    #[test]
    fn new_does_not_validate() {
        let m = ChatMessage::new(MessageKind::Chat, "", "x".repeat(MAX_TEXT_LENGTH + 1));
        assert!(!m.is_valid());
    }

    #[test]
    fn serializes_single_line_record() {
        let m = msg(MessageKind::Chat, "alice", "hello", 1234567890);
        assert_eq!(
            m.to_bytes(),
            b"{\"type\":\"chat\",\"from\":\"alice\",\"text\":\"hello\",\"timestamp\":1234567890}\n"
        );

        let tricky = msg(MessageKind::Chat, "user", "hello \"world\" \n\t", 1);
        let bytes = tricky.to_bytes();
        assert_eq!(bytes.iter().filter(|&&b| b == b'\n').count(), 1);
        assert_eq!(ChatMessage::from_bytes(&bytes).unwrap(), tricky);
    }

    #[test]
    fn roundtrip_valid_messages() {
        let cases = [
            msg(MessageKind::Chat, "alice", "hi", 1234567890),
            msg(MessageKind::Join, "bob", "", 0),
            msg(MessageKind::Leave, "charlie", "goodbye", i64::MAX),
            msg(MessageKind::Chat, "дима", &"я".repeat(MAX_TEXT_LENGTH), 42),
        ];
        for m in cases {
            assert_eq!(ChatMessage::from_bytes(&m.to_bytes()).unwrap(), m);
        }
    }

    #[test]
    fn accepts_record_without_terminator() {
        let m = ChatMessage::from_bytes(
            br#"{"type":"leave","from":"charlie","text":"goodbye","timestamp":1234567890}"#,
        )
        .unwrap();
        assert_eq!(m.kind, MessageKind::Leave);
        assert_eq!(m.body, "goodbye");
    }

    #[test]
    fn missing_optional_fields_default() {
        let m = ChatMessage::from_bytes(br#"{"type":"join","from":"bob"}"#).unwrap();
        assert_eq!(m.body, "");
        assert_eq!(m.timestamp, 0);
    }

    #[test]
    fn rejects_invalid_records() {
        let long = format!(
            r#"{{"type":"chat","from":"alice","text":"{}","timestamp":1}}"#,
            "a".repeat(MAX_TEXT_LENGTH + 1)
        );
        let cases: Vec<(&str, ProtocolError)> = vec![
            (r#"{"type":"chat","from":"alice""#, ProtocolError::MalformedPayload),
            ("not json at all", ProtocolError::MalformedPayload),
            ("", ProtocolError::MalformedPayload),
            ("{}", ProtocolError::MissingKind),
            (
                r#"{"from":"alice","text":"hello","timestamp":1}"#,
                ProtocolError::MissingKind,
            ),
            (
                r#"{"type":"chat","text":"hello","timestamp":1}"#,
                ProtocolError::MissingSender,
            ),
            (
                r#"{"type":"chat","from":"","text":"hello","timestamp":1}"#,
                ProtocolError::MissingSender,
            ),
            (
                r#"{"type":"invalid","from":"alice","text":"hello","timestamp":1}"#,
                ProtocolError::UnknownKind("invalid".into()),
            ),
            (
                long.as_str(),
                ProtocolError::BodyTooLong {
                    len: MAX_TEXT_LENGTH + 1,
                    max: MAX_TEXT_LENGTH,
                },
            ),
            (
                r#"{"type":"chat","from":"alice","text":"hello","timestamp":-1}"#,
                ProtocolError::NegativeTimestamp(-1),
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(
                ChatMessage::from_bytes(input.as_bytes()).unwrap_err(),
                expected,
                "input: {input}"
            );
        }
    }

    #[test]
    fn zero_timestamp_is_valid() {
        let m = ChatMessage::from_bytes(br#"{"type":"chat","from":"a","text":"","timestamp":0}"#)
            .unwrap();
        assert_eq!(m.timestamp, 0);
    }

    #[test]
    fn display_has_no_terminator() {
        let m = msg(MessageKind::Join, "bob", "", 7);
        assert_eq!(
            m.to_string(),
            r#"{"type":"join","from":"bob","text":"","timestamp":7}"#
        );
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("join".parse::<MessageKind>().unwrap(), MessageKind::Join);
        assert!("JOIN".parse::<MessageKind>().is_err());
        assert_eq!(MessageKind::Leave.to_string(), "leave");
    }
}
