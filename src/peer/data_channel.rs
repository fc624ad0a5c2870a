use crate::peer::state::PeerSlots;
use std::sync::Arc;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;

/// общий обработчик data-channel
///
/// Запоминает канал в `slots` и пробрасывает входящие сообщения в текущий
/// обработчик peer. Используется и инициатором (свой канал), и отвечающей
/// стороной (канал из `on_data_channel`).
pub fn attach_dc(dc: &Arc<RTCDataChannel>, slots: &Arc<PeerSlots>) {
    tracing::debug!("attach_dc called for channel '{}'", dc.label());
    slots.set_data_channel(dc.clone());

    let label = dc.label().to_string();
    dc.on_open(Box::new(move || {
        tracing::info!("Data channel '{label}' opened");
        Box::pin(async {})
    }));

    let msg_slots = Arc::clone(slots);
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        tracing::debug!("Received message, length: {}", msg.data.len());
        msg_slots.dispatch_message(msg.data.to_vec());
        Box::pin(async {})
    }));

    dc.on_close(Box::new(|| {
        tracing::info!("Data channel closed");
        Box::pin(async {})
    }));

    dc.on_error(Box::new(|err: webrtc::Error| {
        tracing::warn!("Data channel error: {err}");
        Box::pin(async {})
    }));
}
