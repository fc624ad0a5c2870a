use crate::error::PeerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl SdpKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
        }
    }
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Offer или answer: `{"type": "...", "sdp": "..."}` в текстовом виде.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    #[serde(rename = "sdp")]
    pub body: String,
}

impl SessionDescriptor {
    pub fn offer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            body: body.into(),
        }
    }

    pub fn answer(body: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            body: body.into(),
        }
    }

    pub fn to_text(&self) -> String {
        // Структура из двух строк сериализуется всегда
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_text(text: &str) -> Result<Self, PeerError> {
        serde_json::from_str(text).map_err(|e| PeerError::InvalidDescriptor(e.to_string()))
    }

    /// Проверка, что пришёл дескриптор нужного типа.
    pub fn expect_kind(&self, expected: SdpKind) -> Result<(), PeerError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(PeerError::DescriptorKindMismatch {
                expected: expected.as_str(),
                actual: self.kind.as_str(),
            })
        }
    }

    pub(crate) fn from_rtc(desc: &RTCSessionDescription) -> Result<Self, PeerError> {
        let kind = match desc.sdp_type {
            RTCSdpType::Offer => SdpKind::Offer,
            RTCSdpType::Answer => SdpKind::Answer,
            other => {
                return Err(PeerError::InvalidDescriptor(format!(
                    "unsupported sdp type {other}"
                )))
            }
        };
        Ok(Self {
            kind,
            body: desc.sdp.clone(),
        })
    }

    pub(crate) fn to_rtc(&self) -> Result<RTCSessionDescription, PeerError> {
        let desc = match self.kind {
            SdpKind::Offer => RTCSessionDescription::offer(self.body.clone())?,
            SdpKind::Answer => RTCSessionDescription::answer(self.body.clone())?,
        };
        Ok(desc)
    }
}

/// Состояние транспорта в словаре этой библиотеки, а не движка.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Как состояние транспорта влияет на флаг "подключено".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Up,
    Down,
    Unchanged,
}

impl TransportState {
    pub fn link(self) -> LinkChange {
        match self {
            TransportState::Connected => LinkChange::Up,
            TransportState::Disconnected | TransportState::Failed | TransportState::Closed => {
                LinkChange::Down
            }
            TransportState::New | TransportState::Connecting => LinkChange::Unchanged,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransportState::New => "new",
            TransportState::Connecting => "connecting",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RTCPeerConnectionState> for TransportState {
    fn from(st: RTCPeerConnectionState) -> Self {
        match st {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => {
                TransportState::New
            }
            RTCPeerConnectionState::Connecting => TransportState::Connecting,
            RTCPeerConnectionState::Connected => TransportState::Connected,
            RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
            RTCPeerConnectionState::Failed => TransportState::Failed,
            RTCPeerConnectionState::Closed => TransportState::Closed,
        }
    }
}

/// Обработчик входящих байтов; заменяется целиком при повторной регистрации.
pub type MessageHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

/// Обработчик смены состояния транспорта.
pub type StateHandler = Arc<dyn Fn(TransportState) + Send + Sync>;
