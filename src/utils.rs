use crate::config::ServerConfig;

// Функция для добавления схемы протокола к URL ICE сервера, если она отсутствует
pub fn add_ice_url_scheme(config: &ServerConfig) -> String {
    // Если url уже начинается с "turn:" или "stun:", возвращаем как есть
    if config.url.starts_with("turn:") || config.url.starts_with("stun:") {
        config.url.clone()
    } else {
        let scheme = if config.r#type == "turn" {
            "turn:"
        } else {
            "stun:"
        };
        format!("{}{}", scheme, config.url)
    }
}

/// Начало токена для логов, целиком его не пишем
pub fn token_preview(token: &str) -> String {
    let head: String = token.chars().take(10).collect();
    if head.len() < token.len() {
        format!("{head}...")
    } else {
        head
    }
}

/// Сводка по типам кандидатов в SDP: (host, srflx, relay)
pub fn count_candidates(sdp: &str) -> (usize, usize, usize) {
    let mut host = 0;
    let mut srflx = 0;
    let mut relay = 0;
    for line in sdp.lines().filter(|l| l.starts_with("a=candidate:")) {
        if line.contains("typ host") {
            host += 1;
        } else if line.contains("typ srflx") {
            srflx += 1;
        } else if line.contains("typ relay") {
            relay += 1;
        }
    }
    (host, srflx, relay)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_missing_scheme() {
        let mut cfg = ServerConfig::stun("s", "stun.example.org:3478");
        assert_eq!(add_ice_url_scheme(&cfg), "stun:stun.example.org:3478");

        cfg.r#type = "turn".into();
        assert_eq!(add_ice_url_scheme(&cfg), "turn:stun.example.org:3478");

        cfg.url = "stun:already.example.org".into();
        assert_eq!(add_ice_url_scheme(&cfg), "stun:already.example.org");
    }

    #[test]
    fn preview_truncates_long_tokens() {
        assert_eq!(token_preview("abcdefghijklmnop"), "abcdefghij...");
        assert_eq!(token_preview("short"), "short");
    }

    #[test]
    fn counts_candidate_types() {
        let sdp = "v=0\r\n\
            a=candidate:1 1 udp 2130706431 192.168.1.10 5000 typ host\r\n\
            a=candidate:2 1 udp 2130706431 10.0.0.2 5001 typ host\r\n\
            a=candidate:3 1 udp 1694498815 203.0.113.7 5000 typ srflx raddr 0.0.0.0 rport 0\r\n\
            a=sctp-port:5000\r\n";
        assert_eq!(count_candidates(sdp), (2, 1, 0));
    }
}
