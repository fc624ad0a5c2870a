use crate::error::PeerError;
use crate::logger::analyze_candidates;
use crate::peer::types::SessionDescriptor;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use webrtc::peer_connection::RTCPeerConnection;

/// Ждём окончания сбора ICE кандидатов, затем берём финальный SDP.
///
/// `gather_complete` нужно получить через `gathering_complete_promise()` до
/// `set_local_description`, иначе сигнал о завершении можно пропустить.
/// Выходим раньше с `Cancelled`, если peer закрыли, и с `GatherTimeout`,
/// если движок не уложился в `limit`.
pub async fn wait_for_gathering(
    pc: &RTCPeerConnection,
    mut gather_complete: mpsc::Receiver<()>,
    mut closed: watch::Receiver<bool>,
    limit: Duration,
) -> Result<SessionDescriptor, PeerError> {
    tracing::debug!("Waiting for ICE gathering (limit {} s)", limit.as_secs_f32());

    tokio::select! {
        res = timeout(limit, gather_complete.recv()) => {
            if res.is_err() {
                tracing::warn!("ICE gathering timeout after {} s", limit.as_secs_f32());
                return Err(PeerError::GatherTimeout(limit));
            }
        }
        _ = async { closed.wait_for(|closed| *closed).await.map(|_| ()) } => {
            tracing::info!("Peer closed while gathering candidates");
            return Err(PeerError::Cancelled);
        }
    }

    let desc = pc
        .local_description()
        .await
        .ok_or(PeerError::NoLocalDescription)?;
    analyze_candidates(&desc.sdp);
    SessionDescriptor::from_rtc(&desc)
}
