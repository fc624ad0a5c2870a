//! Ошибки по слоям: кодек, протокол, транспорт, сессия.
//!
//! Каждый слой отдаёт свой enum, чтобы вызывающий код (UI/CLI) мог показать
//! точную причину, а не общее "что-то пошло не так".

use crate::protocol::ProtocolError;
use crate::signaling::SignalingError;

/// Ошибки транспортного слоя (WebRTC peer или его тестовый двойник).
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Текст дескриптора не разбирается как `{"type": ..., "sdp": ...}`.
    #[error("invalid session descriptor: {0}")]
    InvalidDescriptor(String),

    /// Offer там, где ждали answer, или наоборот.
    #[error("expected {expected} descriptor, got {actual}")]
    DescriptorKindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("data channel is not open")]
    ChannelNotOpen,

    #[error("no local description after ICE gathering")]
    NoLocalDescription,

    #[error("ICE gathering did not complete within {0:?}")]
    GatherTimeout(std::time::Duration),

    /// Peer закрыли, пока шёл сбор кандидатов.
    #[error("operation cancelled: peer closed")]
    Cancelled,

    #[error("webrtc engine error: {0}")]
    Engine(#[from] webrtc::Error),
}

/// Ошибки, которые `ChatSession` возвращает вызывающему коду.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("username cannot be empty")]
    UsernameEmpty,

    #[error("already connected to a room")]
    AlreadyConnected,

    #[error("room code cannot be empty")]
    EmptyRoomCode,

    #[error("answer code cannot be empty")]
    EmptyAnswerCode,

    #[error("not connected to any room")]
    NotConnected,

    #[error("message text cannot be empty")]
    EmptyText,

    /// Рукопожатие выполняется один раз на сессию.
    #[error("handshake already started (state: {0})")]
    HandshakeAlreadyStarted(crate::session::ConnectionState),

    #[error("no pending offer to accept an answer for")]
    NoPendingOffer,

    #[error("session is closed")]
    SessionClosed,

    #[error("invalid room code: {0}")]
    InvalidRoomCode(#[source] SignalingError),

    #[error("invalid answer code: {0}")]
    InvalidAnswerCode(#[source] SignalingError),

    #[error("failed to encode descriptor: {0}")]
    Encode(#[source] SignalingError),

    #[error("transport error: {0}")]
    Transport(#[from] PeerError),

    /// Только для error-callback: битые входящие байты.
    #[error("invalid message received: {0}")]
    Protocol(#[from] ProtocolError),
}
