//! Детерминированный двойник транспорта для тестов.
//!
//! Без сети и случайностей: дескрипторы нумеруются счётчиком
//! (`fake-offer-1`, `fake-answer-1`, ...), отправленные байты складываются в
//! буфер, а входящие сообщения и смены состояния подаются вручную через
//! `simulate_*`. Два двойника можно связать через [`FakePeer::link`]: тогда
//! `send` на одном доставляет байты другому, а принятый answer "поднимает"
//! соединение на обоих.

use crate::error::PeerError;
use crate::peer::state::PeerSlots;
use crate::peer::transport::TransportPeer;
use crate::peer::types::{
    LinkChange, MessageHandler, SdpKind, SessionDescriptor, StateHandler, TransportState,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

#[derive(Default)]
pub struct FakePeer {
    slots: Arc<PeerSlots>,
    counter: AtomicUsize,
    channel_open: AtomicBool,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    fail_descriptors: AtomicBool,
    gather_delay: Mutex<Option<Duration>>,
    sent: Mutex<Vec<Vec<u8>>>,
    calls: Mutex<Vec<&'static str>>,
    remote: Mutex<Option<SessionDescriptor>>,
    partner: Mutex<Option<Weak<FakePeer>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakePeer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Связывает два двойника в "сеть".
    pub fn link(a: &Arc<FakePeer>, b: &Arc<FakePeer>) {
        *lock(&a.partner) = Some(Arc::downgrade(b));
        *lock(&b.partner) = Some(Arc::downgrade(a));
    }

    /// Как будто байты пришли от удалённой стороны.
    pub fn simulate_message(&self, data: impl Into<Vec<u8>>) {
        self.slots.dispatch_message(data.into());
    }

    /// Как будто движок сообщил о смене состояния. `Connected` открывает
    /// канал, состояния обрыва его закрывают.
    pub fn simulate_state(&self, state: TransportState) {
        match state.link() {
            LinkChange::Up => self.channel_open.store(true, Ordering::SeqCst),
            LinkChange::Down => self.channel_open.store(false, Ordering::SeqCst),
            LinkChange::Unchanged => {}
        }
        self.slots.dispatch_state(state);
    }

    pub fn set_channel_open(&self, open: bool) {
        self.channel_open.store(open, Ordering::SeqCst);
    }

    /// Все последующие `send` завершатся ошибкой движка.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Все последующие offer/answer операции завершатся ошибкой.
    pub fn set_fail_descriptors(&self, fail: bool) {
        self.fail_descriptors.store(fail, Ordering::SeqCst);
    }

    /// Имитирует долгий сбор кандидатов; `close()` его прерывает.
    pub fn set_gather_delay(&self, delay: Duration) {
        *lock(&self.gather_delay) = Some(delay);
    }

    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }

    /// Имена вызванных методов транспорта, по порядку.
    pub fn calls(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    pub fn remote_description(&self) -> Option<SessionDescriptor> {
        lock(&self.remote).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) {
        lock(&self.calls).push(call);
    }

    fn partner(&self) -> Option<Arc<FakePeer>> {
        lock(&self.partner).as_ref().and_then(Weak::upgrade)
    }

    fn next_descriptor(&self, kind: SdpKind) -> SessionDescriptor {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        SessionDescriptor {
            kind,
            body: format!("fake-{kind}-{n}"),
        }
    }

    fn check_descriptor_failure(&self) -> Result<(), PeerError> {
        if self.fail_descriptors.load(Ordering::SeqCst) {
            return Err(PeerError::InvalidDescriptor("scripted failure".into()));
        }
        Ok(())
    }

    async fn gather(&self) -> Result<(), PeerError> {
        let delay = *lock(&self.gather_delay);
        if let Some(delay) = delay {
            let step = Duration::from_millis(5);
            let mut waited = Duration::ZERO;
            while waited < delay {
                if self.is_closed() {
                    return Err(PeerError::Cancelled);
                }
                tokio::time::sleep(step).await;
                waited += step;
            }
        }
        if self.is_closed() {
            return Err(PeerError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
impl TransportPeer for FakePeer {
    async fn create_offer(&self) -> Result<SessionDescriptor, PeerError> {
        self.record("create_offer");
        self.check_descriptor_failure()?;
        self.gather().await?;
        Ok(self.next_descriptor(SdpKind::Offer))
    }

    async fn create_answer(
        &self,
        remote: &SessionDescriptor,
    ) -> Result<SessionDescriptor, PeerError> {
        self.record("create_answer");
        self.check_descriptor_failure()?;
        self.set_remote_offer(remote).await?;
        self.gather().await?;
        Ok(self.next_descriptor(SdpKind::Answer))
    }

    async fn set_remote_answer(&self, remote: &SessionDescriptor) -> Result<(), PeerError> {
        self.record("set_remote_answer");
        self.check_descriptor_failure()?;
        remote.expect_kind(SdpKind::Answer)?;
        *lock(&self.remote) = Some(remote.clone());

        // связанная пара "соединяется" сразу после применения answer
        if let Some(partner) = self.partner() {
            self.simulate_state(TransportState::Connecting);
            partner.simulate_state(TransportState::Connecting);
            self.simulate_state(TransportState::Connected);
            partner.simulate_state(TransportState::Connected);
        }
        Ok(())
    }

    async fn set_remote_offer(&self, remote: &SessionDescriptor) -> Result<(), PeerError> {
        self.record("set_remote_offer");
        remote.expect_kind(SdpKind::Offer)?;
        *lock(&self.remote) = Some(remote.clone());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), PeerError> {
        self.record("send");
        if self.closed.load(Ordering::SeqCst) || !self.channel_open.load(Ordering::SeqCst) {
            return Err(PeerError::ChannelNotOpen);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PeerError::Engine(webrtc::Error::ErrConnectionClosed));
        }
        lock(&self.sent).push(data.to_vec());
        if let Some(partner) = self.partner() {
            partner.simulate_message(data.to_vec());
        }
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) {
        self.slots.set_message_handler(handler);
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.slots.set_state_handler(handler);
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.record("close");
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.channel_open.store(false, Ordering::SeqCst);
        Ok(())
    }
}
