//! Сессия чата: ручное рукопожатие, конечный автомат соединения и
//! чат-протокол поверх транспорта.
//!
//! Поток для создателя комнаты: `create_room` → отдать токен собеседнику →
//! `accept_answer` с его ответным токеном. Для присоединяющегося:
//! `join_room` с токеном комнаты → вернуть ответный токен создателю. Дальше
//! транспорт сам сообщает о подключении, и сессия поднимает `connected`.
//!
//! Все поля сессии под одним `RwLock`, который держится только на время
//! чтения/записи полей. Колбэки пользователя вызываются уже без блокировки,
//! поэтому из них можно снова обращаться к сессии.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::peer::{LinkChange, RtcPeer, SessionDescriptor, TransportPeer, TransportState};
use crate::protocol::{ChatMessage, MessageKind};
use crate::signaling;
use crate::utils::token_preview;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::Mutex as AsyncMutex;

/// Этап жизни сессии.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    /// Offer создан и отдан, ждём answer от собеседника.
    OfferCreated,
    /// Answer создан и отдан создателю комнаты.
    AnswerCreated,
    /// Answer применён, ждём подключения транспорта.
    AnswerAccepted,
    Connected,
    Disconnected,
    Closed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::OfferCreated => "offer-created",
            ConnectionState::AnswerCreated => "answer-created",
            ConnectionState::AnswerAccepted => "answer-accepted",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type MessageCallback = Arc<dyn Fn(ChatMessage) + Send + Sync>;
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(SessionError) + Send + Sync>;

/// По одному слоту на событие: новая регистрация заменяет старую.
#[derive(Default, Clone)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    on_connected: Option<EventCallback>,
    on_disconnected: Option<EventCallback>,
    on_error: Option<ErrorCallback>,
}

struct SessionState {
    connection: ConnectionState,
    connected: bool,
    room_token: Option<String>,
    callbacks: Callbacks,
}

struct SessionInner {
    peer: Arc<dyn TransportPeer>,
    username: String,
    config: SessionConfig,
    state: RwLock<SessionState>,
    /// Шаги рукопожатия выполняются строго по одному.
    handshake: AsyncMutex<()>,
}

/// Сессия чата между двумя участниками.
///
/// Клонируется дёшево: все клоны указывают на одну сессию.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    /// Сессия поверх webrtc-rs с настройками из `config.peer`.
    pub async fn new(username: &str, config: SessionConfig) -> Result<Self, SessionError> {
        if username.is_empty() {
            return Err(SessionError::UsernameEmpty);
        }
        let peer = RtcPeer::new(config.peer.clone()).await?;
        Self::with_peer(username, Arc::new(peer), config)
    }

    /// Сессия поверх произвольного транспорта (например, `FakePeer`).
    pub fn with_peer(
        username: &str,
        peer: Arc<dyn TransportPeer>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if username.is_empty() {
            return Err(SessionError::UsernameEmpty);
        }

        let inner = Arc::new(SessionInner {
            peer,
            username: username.to_string(),
            config,
            state: RwLock::new(SessionState {
                connection: ConnectionState::Idle,
                connected: false,
                room_token: None,
                callbacks: Callbacks::default(),
            }),
            handshake: AsyncMutex::new(()),
        });
        SessionInner::attach_peer_handlers(&inner);

        Ok(Self { inner })
    }

    /// Создаёт комнату: offer → токен для передачи собеседнику.
    pub async fn create_room(&self) -> Result<String, SessionError> {
        let inner = &self.inner;
        let _guard = inner.handshake.lock().await;
        inner.check_can_start()?;

        let offer = inner.peer.create_offer().await?;
        let token = signaling::encode(&offer.to_text()).map_err(SessionError::Encode)?;

        {
            let mut st = inner.write();
            if st.connection == ConnectionState::Closed {
                return Err(SessionError::SessionClosed);
            }
            st.room_token = Some(token.clone());
            st.connection = ConnectionState::OfferCreated;
        }

        tracing::info!("Created room with code: {}", token_preview(&token));
        Ok(token)
    }

    /// Присоединяется к комнате по её токену, возвращает ответный токен.
    pub async fn join_room(&self, room_code: &str) -> Result<String, SessionError> {
        let inner = &self.inner;
        if inner.read().connected {
            return Err(SessionError::AlreadyConnected);
        }
        let room_code = room_code.trim();
        if room_code.is_empty() {
            return Err(SessionError::EmptyRoomCode);
        }

        let _guard = inner.handshake.lock().await;
        inner.check_can_start()?;

        let offer_text = signaling::decode(room_code).map_err(SessionError::InvalidRoomCode)?;
        let offer = SessionDescriptor::from_text(&offer_text)?;

        let answer = inner.peer.create_answer(&offer).await?;
        let answer_token =
            signaling::encode(&answer.to_text()).map_err(SessionError::Encode)?;

        {
            let mut st = inner.write();
            if st.connection == ConnectionState::Closed {
                return Err(SessionError::SessionClosed);
            }
            st.room_token = Some(room_code.to_string());
            // транспорт мог уже подключиться, тогда состояние не трогаем
            if st.connection == ConnectionState::Idle {
                st.connection = ConnectionState::AnswerCreated;
            }
        }

        tracing::info!(
            "Created answer for room. Answer code: {}",
            token_preview(&answer_token)
        );
        Ok(answer_token)
    }

    /// Применяет ответный токен (только для создателя комнаты).
    pub async fn accept_answer(&self, answer_code: &str) -> Result<(), SessionError> {
        let inner = &self.inner;
        let answer_code = answer_code.trim();
        if answer_code.is_empty() {
            return Err(SessionError::EmptyAnswerCode);
        }

        let _guard = inner.handshake.lock().await;
        match inner.read().connection {
            ConnectionState::OfferCreated => {}
            ConnectionState::Closed => return Err(SessionError::SessionClosed),
            ConnectionState::Connected => return Err(SessionError::AlreadyConnected),
            _ => return Err(SessionError::NoPendingOffer),
        }

        let answer_text =
            signaling::decode(answer_code).map_err(SessionError::InvalidAnswerCode)?;
        let answer = SessionDescriptor::from_text(&answer_text)?;
        inner.peer.set_remote_answer(&answer).await?;

        {
            let mut st = inner.write();
            if st.connection == ConnectionState::OfferCreated {
                st.connection = ConnectionState::AnswerAccepted;
            }
        }

        tracing::info!("Accepted answer from peer");
        Ok(())
    }

    /// Отправляет текст собеседнику как `chat` сообщение.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let inner = &self.inner;
        if !inner.read().connected {
            return Err(SessionError::NotConnected);
        }
        if text.is_empty() {
            return Err(SessionError::EmptyText);
        }

        let msg = ChatMessage::new(MessageKind::Chat, inner.username.as_str(), text);
        inner.peer.send(&msg.to_bytes()).await?;

        tracing::debug!("Sent message, length: {}", text.len());
        Ok(())
    }

    /// Закрывает сессию. Можно вызывать сколько угодно раз.
    ///
    /// Если соединение было установлено, собеседнику уходит `leave` (ошибка
    /// отправки только логируется), а `on_disconnected` вызывается один раз
    /// в фоне после закрытия транспорта.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        // колбэк берём сейчас: сессию могут отпустить сразу после вызова
        let (was_connected, on_disconnected) = {
            let mut st = inner.write();
            let was = st.connected;
            st.connected = false;
            st.room_token = None;
            st.connection = ConnectionState::Closed;
            (was, st.callbacks.on_disconnected.clone())
        };

        if was_connected {
            let leave = ChatMessage::new(MessageKind::Leave, inner.username.as_str(), "");
            if let Err(e) = inner.peer.send(&leave.to_bytes()).await {
                tracing::warn!("Failed to send leave message: {e}");
            }
        }

        let result = inner.peer.close().await;

        if let (true, Some(callback)) = (was_connected, on_disconnected) {
            let delay = inner.config.disconnect_notify_delay;
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        tokio::time::sleep(delay).await;
                        callback();
                    });
                }
                Err(_) => {
                    tracing::debug!("No tokio runtime, notifying disconnect inline");
                    callback();
                }
            }
        }

        tracing::info!("Session closed");
        result.map_err(SessionError::from)
    }

    pub fn on_message<F>(&self, callback: F)
    where
        F: Fn(ChatMessage) + Send + Sync + 'static,
    {
        self.inner.write().callbacks.on_message = Some(Arc::new(callback));
    }

    pub fn on_connected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.write().callbacks.on_connected = Some(Arc::new(callback));
    }

    pub fn on_disconnected<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.write().callbacks.on_disconnected = Some(Arc::new(callback));
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(SessionError) + Send + Sync + 'static,
    {
        self.inner.write().callbacks.on_error = Some(Arc::new(callback));
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().connected
    }

    pub fn room_token(&self) -> Option<String> {
        self.inner.read().room_token.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.read().connection
    }

    /// Статус для показа пользователю.
    pub fn connection_status(&self) -> &'static str {
        let st = self.inner.read();
        if st.connected {
            "Connected - ready to chat!"
        } else if st.room_token.is_some() {
            "Room created - waiting for connection..."
        } else {
            "Not connected"
        }
    }

    /// Подсказка по ручному обмену токенами.
    pub fn connection_instructions(&self) -> &'static str {
        if self.inner.read().room_token.is_some() {
            "Connection Instructions:\n\
             1. You created a room - share your room code with the other person\n\
             2. They will join your room and give you an \"answer code\"\n\
             3. Paste their answer code to complete the connection"
        } else {
            "Connection Instructions:\n\
             1. Get a room code from someone else\n\
             2. Join the room with their code - you'll get an \"answer code\"\n\
             3. Send your answer code back to them\n\
             4. Connection will establish automatically once they accept your answer"
        }
    }
}

impl SessionInner {
    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Рукопожатие начинается только из `Idle`.
    fn check_can_start(&self) -> Result<(), SessionError> {
        let st = self.read();
        if st.connected {
            return Err(SessionError::AlreadyConnected);
        }
        match st.connection {
            ConnectionState::Idle => Ok(()),
            ConnectionState::Closed => Err(SessionError::SessionClosed),
            other => Err(SessionError::HandshakeAlreadyStarted(other)),
        }
    }

    /// Обработчики транспорта держат слабую ссылку: peer принадлежит сессии.
    fn attach_peer_handlers(inner: &Arc<SessionInner>) {
        let weak = Arc::downgrade(inner);
        inner.peer.on_message(Arc::new(move |data: Vec<u8>| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_inbound(&data);
            }
        }));

        let weak: Weak<SessionInner> = Arc::downgrade(inner);
        inner.peer.on_state_change(Arc::new(move |state: TransportState| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_transport_state(state);
            }
        }));
    }

    fn handle_inbound(&self, data: &[u8]) {
        let msg = match ChatMessage::from_bytes(data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!("Failed to unmarshal message: {e}");
                let callback = self.read().callbacks.on_error.clone();
                if let Some(callback) = callback {
                    callback(SessionError::Protocol(e));
                }
                return;
            }
        };

        match msg.kind {
            MessageKind::Join => tracing::info!("{} joined the chat", msg.sender),
            MessageKind::Leave => tracing::info!("{} left the chat", msg.sender),
            MessageKind::Chat => {
                tracing::debug!("Received message from {}, length: {}", msg.sender, msg.body.len())
            }
        }

        let callback = self.read().callbacks.on_message.clone();
        if let Some(callback) = callback {
            callback(msg);
        }
    }

    /// Срабатывает только на переходах: повторные `connected` от транспорта
    /// не приводят к повторным колбэкам.
    fn handle_transport_state(&self, state: TransportState) {
        tracing::info!("Connection state: {state}");

        let (became_up, became_down, callbacks) = {
            let mut st = self.write();
            if st.connection == ConnectionState::Closed {
                return;
            }

            let was_connected = st.connected;
            match state.link() {
                LinkChange::Up => st.connected = true,
                LinkChange::Down => st.connected = false,
                LinkChange::Unchanged => {}
            }

            let became_up = st.connected && !was_connected;
            let became_down = !st.connected && was_connected;
            if became_up {
                st.connection = ConnectionState::Connected;
            } else if state.link() == LinkChange::Down && st.connection != ConnectionState::Idle
            {
                st.connection = ConnectionState::Disconnected;
            }
            (became_up, became_down, st.callbacks.clone())
        };

        if became_up {
            tracing::info!("Successfully connected to peer");
            self.announce_join();
            if let Some(callback) = callbacks.on_connected {
                callback();
            }
        } else if became_down {
            tracing::info!("Disconnected from peer");
            if let Some(callback) = callbacks.on_disconnected {
                callback();
            }
        }
    }

    /// `join` уходит в фоне после короткой паузы, ошибки только в лог.
    fn announce_join(&self) {
        let data = ChatMessage::new(MessageKind::Join, self.username.as_str(), "").to_bytes();
        let peer = Arc::clone(&self.peer);
        let grace = self.config.join_grace;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(grace).await;
                    if let Err(e) = peer.send(&data).await {
                        tracing::warn!("Failed to send join message: {e}");
                    }
                });
            }
            Err(_) => tracing::warn!("No tokio runtime, join message not sent"),
        }
    }
}
