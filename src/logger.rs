use crate::utils::count_candidates;
use tracing_subscriber::EnvFilter;
use webrtc::peer_connection::RTCPeerConnection;

/// Подключает tracing-subscriber. Повторный вызов ничего не делает.
pub fn init() {
    // Проверяем конфигурацию логирования
    if !crate::config::LOGGING_ENABLED || !crate::config::dev::ENABLE_LOGGING {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(crate::config::DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Быстрый снимок getStats → выбранная пара
pub async fn dump_selected_pair(pc: &RTCPeerConnection, moment: &str) {
    let stats = pc.get_stats().await;
    for (_, v) in stats.reports {
        if let webrtc::stats::StatsReportType::CandidatePair(pair) = v {
            if pair.nominated {
                tracing::info!(
                    "STATS {moment}: {}:{}  type: {:?}  bytes={}/{} state={:?}",
                    pair.local_candidate_id,
                    pair.remote_candidate_id,
                    pair.stats_type,
                    pair.bytes_sent,
                    pair.bytes_received,
                    pair.state
                );
            }
        }
    }
}

/// Сводка по собранным кандидатам в финальном SDP
pub fn analyze_candidates(sdp: &str) {
    let (host, srflx, relay) = count_candidates(sdp);
    tracing::debug!("Candidate analysis: {host} host, {srflx} srflx, {relay} relay");

    if relay == 0 {
        tracing::debug!("No TURN relay candidates found, connection through symmetric NAT may fail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_twice_is_harmless() {
        init();
        init();
        tracing::debug!("logger initialised");
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(crate::config::DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn analyze_handles_sdp_without_candidates() {
        analyze_candidates("v=0\r\nm=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n");
    }
}
