// Конфигурация библиотеки
// Логирование можно отключить только в режиме разработки

use serde::{Deserialize, Serialize};
use std::time::Duration;
use webrtc::ice_transport::ice_server::RTCIceServer;

use crate::utils::add_ice_url_scheme;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true; // В режиме отладки логирование включено

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false; // В продакшене логирование отключено

// Дополнительные настройки для режима разработки
#[cfg(debug_assertions)]
pub mod dev {
    // Для полного отключения логирования в режиме разработки
    // измените эту константу на false
    pub const ENABLE_LOGGING: bool = true;
}

#[cfg(not(debug_assertions))]
pub mod dev {
    pub const ENABLE_LOGGING: bool = false;
}

/// Фильтр по умолчанию, если RUST_LOG не задан
pub const DEFAULT_LOG_FILTER: &str = "ssc_lib=debug,webrtc=warn";

/// STUN по умолчанию
pub const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";

/// Сколько ждём завершения сбора ICE кандидатов
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// Пауза перед отправкой `join`, чтобы data channel успел открыться
pub const DEFAULT_JOIN_GRACE: Duration = Duration::from_millis(100);

/// Пауза перед уведомлением о ручном отключении
pub const DEFAULT_DISCONNECT_NOTIFY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("server URL cannot be empty")]
    EmptyUrl,
    #[error("TURN server {0} requires username and credential")]
    MissingTurnCredentials(String),
}

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl ServerConfig {
    pub fn stun(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            r#type: "stun".into(),
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if self.r#type == "turn" && (self.username.is_none() || self.credential.is_none()) {
            return Err(ConfigError::MissingTurnCredentials(self.id.clone()));
        }
        Ok(())
    }

    pub fn to_ice_server(&self) -> RTCIceServer {
        RTCIceServer {
            urls: vec![add_ice_url_scheme(self)],
            username: self.username.clone().unwrap_or_default(),
            credential: self.credential.clone().unwrap_or_default(),
        }
    }
}

/// Настройки транспортного peer
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub ice_servers: Vec<ServerConfig>,
    pub gather_timeout: Duration,
    pub channel_label: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![ServerConfig::stun("default-stun", DEFAULT_STUN_URL)],
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
            channel_label: "chat".into(),
        }
    }
}

impl PeerConfig {
    /// Без STUN: только host кандидаты, для локальных тестов
    pub fn host_only() -> Self {
        Self {
            ice_servers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_ice_servers(mut self, servers: Vec<ServerConfig>) -> Result<Self, ConfigError> {
        for server in &servers {
            server.validate()?;
        }
        self.ice_servers = servers;
        Ok(self)
    }

    pub fn rtc_ice_servers(&self) -> Vec<RTCIceServer> {
        self.ice_servers.iter().map(ServerConfig::to_ice_server).collect()
    }
}

/// Настройки сессии чата
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub join_grace: Duration,
    pub disconnect_notify_delay: Duration,
    pub peer: PeerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_grace: DEFAULT_JOIN_GRACE,
            disconnect_notify_delay: DEFAULT_DISCONNECT_NOTIFY_DELAY,
            peer: PeerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(username: Option<&str>, credential: Option<&str>) -> ServerConfig {
        ServerConfig {
            id: "relay".into(),
            r#type: "turn".into(),
            url: "turn.example.org:3478".into(),
            username: username.map(Into::into),
            credential: credential.map(Into::into),
        }
    }

    #[test]
    fn default_uses_google_stun() {
        let cfg = PeerConfig::default();
        let servers = cfg.rtc_ice_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls, vec![DEFAULT_STUN_URL.to_string()]);
        assert_eq!(cfg.gather_timeout, DEFAULT_GATHER_TIMEOUT);
        assert_eq!(cfg.channel_label, "chat");
    }

    #[test]
    fn turn_requires_credentials() {
        assert_eq!(
            turn(Some("u"), None).validate(),
            Err(ConfigError::MissingTurnCredentials("relay".into()))
        );
        assert!(turn(Some("u"), Some("p")).validate().is_ok());
    }

    #[test]
    fn empty_url_rejected() {
        let mut s = ServerConfig::stun("x", "");
        assert_eq!(s.validate(), Err(ConfigError::EmptyUrl));
        s.url = "stun.example.org".into();
        assert!(s.validate().is_ok());
    }

    #[test]
    fn with_ice_servers_validates_all() {
        let bad = PeerConfig::default().with_ice_servers(vec![
            ServerConfig::stun("a", "stun.example.org"),
            turn(None, None),
        ]);
        assert!(bad.is_err());

        let good = PeerConfig::default()
            .with_ice_servers(vec![turn(Some("u"), Some("p"))])
            .unwrap();
        let ice = good.rtc_ice_servers();
        assert_eq!(ice[0].urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(ice[0].username, "u");
        assert_eq!(ice[0].credential, "p");
    }
}
