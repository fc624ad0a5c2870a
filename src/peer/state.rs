use crate::peer::types::{MessageHandler, StateHandler, TransportState};
use std::sync::{Arc, PoisonError, RwLock};
use webrtc::data_channel::RTCDataChannel;

/// ========== PEER STATE ==========

/// Общее состояние одного peer: data channel и зарегистрированные обработчики.
///
/// Разделяется между методами peer и колбэками движка, которые приходят из
/// его внутренних задач. Обработчики копируются из-под блокировки и вызываются
/// уже без неё.
#[derive(Default)]
pub struct PeerSlots {
    data_channel: RwLock<Option<Arc<RTCDataChannel>>>,
    on_message: RwLock<Option<MessageHandler>>,
    on_state: RwLock<Option<StateHandler>>,
}

impl PeerSlots {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn data_channel(&self) -> Option<Arc<RTCDataChannel>> {
        self.data_channel
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_data_channel(&self, dc: Arc<RTCDataChannel>) {
        *self
            .data_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(dc);
    }

    pub fn take_data_channel(&self) -> Option<Arc<RTCDataChannel>> {
        self.data_channel
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn set_message_handler(&self, handler: MessageHandler) {
        *self.on_message.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn set_state_handler(&self, handler: StateHandler) {
        *self.on_state.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn dispatch_message(&self, data: Vec<u8>) {
        let handler = self
            .on_message
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(data);
        }
    }

    pub fn dispatch_state(&self, state: TransportState) {
        let handler = self
            .on_state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(handler) = handler {
            handler(state);
        }
    }
}
