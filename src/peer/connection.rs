use crate::config::PeerConfig;
use crate::error::PeerError;
use crate::logger::dump_selected_pair;
use crate::peer::data_channel::attach_dc;
use crate::peer::ice::wait_for_gathering;
use crate::peer::state::PeerSlots;
use crate::peer::transport::TransportPeer;
use crate::peer::types::{
    MessageHandler, SdpKind, SessionDescriptor, StateHandler, TransportState,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_gatherer_state::RTCIceGathererState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::{
    api::APIBuilder,
    data_channel::{data_channel_init::RTCDataChannelInit, RTCDataChannel},
    peer_connection::{
        configuration::RTCConfiguration, peer_connection_state::RTCPeerConnectionState,
        RTCPeerConnection,
    },
};

/// Peer поверх webrtc-rs: один упорядоченный data channel на соединение.
pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    slots: Arc<PeerSlots>,
    config: PeerConfig,
    closed: watch::Sender<bool>,
}

impl RtcPeer {
    /// создаём Peer и вешаем обработчики состояний
    pub async fn new(config: PeerConfig) -> Result<Self, PeerError> {
        let api = APIBuilder::new().build();
        let pc = Arc::new(api.new_peer_connection(rtc_config(&config)).await?);
        let slots = PeerSlots::new();

        // слабая ссылка, чтобы обработчик не держал соединение живым
        let pc_weak = Arc::downgrade(&pc);
        let state_slots = Arc::clone(&slots);
        pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
            tracing::info!("Peer connection state changed to: {st}");
            let state = TransportState::from(st);

            if matches!(state, TransportState::Disconnected | TransportState::Failed) {
                if let Some(pc) = pc_weak.upgrade() {
                    tokio::spawn(async move {
                        dump_selected_pair(&pc, "BEFORE-FAIL").await;
                    });
                }
            }

            state_slots.dispatch_state(state);
            Box::pin(async {})
        }));

        pc.on_ice_connection_state_change(Box::new(|st: RTCIceConnectionState| {
            tracing::debug!("ICE connection state changed to: {st}");
            Box::pin(async {})
        }));

        pc.on_ice_gathering_state_change(Box::new(|st: RTCIceGathererState| {
            tracing::debug!("ICE gathering state changed to: {st:?}");
            Box::pin(async {})
        }));

        let (closed, _) = watch::channel(false);
        Ok(Self {
            pc,
            slots,
            config,
            closed,
        })
    }
}

#[async_trait]
impl TransportPeer for RtcPeer {
    async fn create_offer(&self) -> Result<SessionDescriptor, PeerError> {
        // инициатор сам создаёт data channel
        let init = RTCDataChannelInit {
            ordered: Some(true),
            ..Default::default()
        };
        let dc = self
            .pc
            .create_data_channel(&self.config.channel_label, Some(init))
            .await?;
        attach_dc(&dc, &self.slots);

        tracing::debug!("Creating offer...");
        let offer = self.pc.create_offer(None).await?;
        let gather_complete = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(offer).await?;

        wait_for_gathering(
            &self.pc,
            gather_complete,
            self.closed.subscribe(),
            self.config.gather_timeout,
        )
        .await
    }

    async fn create_answer(
        &self,
        remote: &SessionDescriptor,
    ) -> Result<SessionDescriptor, PeerError> {
        self.set_remote_offer(remote).await?;

        tracing::debug!("Creating answer...");
        let answer = self.pc.create_answer(None).await?;
        let gather_complete = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(answer).await?;

        wait_for_gathering(
            &self.pc,
            gather_complete,
            self.closed.subscribe(),
            self.config.gather_timeout,
        )
        .await
    }

    async fn set_remote_answer(&self, remote: &SessionDescriptor) -> Result<(), PeerError> {
        remote.expect_kind(SdpKind::Answer)?;
        self.pc.set_remote_description(remote.to_rtc()?).await?;
        tracing::info!("Remote answer applied");
        Ok(())
    }

    async fn set_remote_offer(&self, remote: &SessionDescriptor) -> Result<(), PeerError> {
        remote.expect_kind(SdpKind::Offer)?;
        let desc = remote.to_rtc()?;

        // отвечающая сторона получает канал от инициатора
        let slots = Arc::clone(&self.slots);
        self.pc
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                tracing::info!("Data channel '{}' received from remote", dc.label());
                attach_dc(&dc, &slots);
                Box::pin(async {})
            }));

        self.pc.set_remote_description(desc).await?;
        tracing::info!("Remote offer applied");
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), PeerError> {
        let dc = self.slots.data_channel().ok_or(PeerError::ChannelNotOpen)?;
        if dc.ready_state() != RTCDataChannelState::Open {
            return Err(PeerError::ChannelNotOpen);
        }
        dc.send(&Bytes::copy_from_slice(data)).await?;
        Ok(())
    }

    fn on_message(&self, handler: MessageHandler) {
        self.slots.set_message_handler(handler);
    }

    fn on_state_change(&self, handler: StateHandler) {
        self.slots.set_state_handler(handler);
    }

    async fn close(&self) -> Result<(), PeerError> {
        // уже закрыт: ничего не делаем
        if self.closed.send_replace(true) {
            return Ok(());
        }

        if let Some(dc) = self.slots.take_data_channel() {
            if let Err(e) = dc.close().await {
                tracing::warn!("Error closing data channel: {e}");
            }
        }

        self.pc.close().await.map_err(|e| {
            tracing::error!("Error closing peer connection: {e}");
            PeerError::from(e)
        })
    }
}

/// Создает конфигурацию для peer connection
fn rtc_config(config: &PeerConfig) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: config.rtc_ice_servers(),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}
