//! Чат один-на-один поверх WebRTC data channel без сигнального сервера.
//!
//! Стороны вручную обмениваются токенами (offer/answer, сжатые в
//! base64url), после чего общаются через упорядоченный data channel.

pub mod config;
pub mod error;
pub mod logger;
pub mod peer;
pub mod protocol;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{PeerConfig, ServerConfig, SessionConfig};
pub use error::{PeerError, SessionError};
pub use peer::{FakePeer, RtcPeer, SessionDescriptor, TransportPeer, TransportState};
pub use protocol::{ChatMessage, MessageKind, ProtocolError};
pub use session::{ChatSession, ConnectionState};
pub use signaling::SignalingError;
