use crate::error::PeerError;
use crate::peer::types::{MessageHandler, SessionDescriptor, StateHandler};
use async_trait::async_trait;

/// Единственная точка контакта с движком реального времени.
///
/// Реализации: [`RtcPeer`](crate::peer::connection::RtcPeer) поверх webrtc-rs
/// и [`FakePeer`](crate::peer::fake::FakePeer) для тестов. Обе ведут себя
/// одинаково с точки зрения сессии.
#[async_trait]
pub trait TransportPeer: Send + Sync {
    /// Создаёт data channel и offer. Возвращается только после завершения
    /// сбора кандидатов: дескриптор уходит вручную, trickle ICE нет.
    async fn create_offer(&self) -> Result<SessionDescriptor, PeerError>;

    /// Применяет offer, создаёт answer и так же ждёт конца сбора кандидатов.
    async fn create_answer(&self, remote: &SessionDescriptor)
        -> Result<SessionDescriptor, PeerError>;

    async fn set_remote_answer(&self, remote: &SessionDescriptor) -> Result<(), PeerError>;

    /// Применяет offer и готовит приём входящего data channel.
    async fn set_remote_offer(&self, remote: &SessionDescriptor) -> Result<(), PeerError>;

    /// `ChannelNotOpen`, пока канала нет или он не открыт.
    async fn send(&self, data: &[u8]) -> Result<(), PeerError>;

    fn on_message(&self, handler: MessageHandler);

    fn on_state_change(&self, handler: StateHandler);

    /// Повторный вызов безопасен и возвращает `Ok(())`.
    async fn close(&self) -> Result<(), PeerError>;
}
