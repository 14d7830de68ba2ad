//! One live consultation session.
//!
//! A [`ChatSession`] binds a selected room to its own connection manager,
//! expiry clock, composer and message log. Switching rooms means tearing
//! down the old session and opening a new one — no state is shared
//! between rooms. The session-active flag is the single cross-cutting
//! link between the two timers: the expiry clock flips it, the
//! connection manager's reconnect cycle observes it.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use telecare_net::{
    spawn_connection, ChannelTransport, ConnectionEvent, ConnectionHandle, TokenBroker,
};
use telecare_shared::countdown;
use telecare_shared::model::{Chat, RoomDetail};

use crate::api::RoomService;
use crate::composer::Composer;
use crate::error::SessionError;
use crate::expiry::{ExpiryClock, ExpiryStatus};
use crate::identity::SessionIdentity;
use crate::log::{MessageLog, Scroll};
use crate::media::MediaUploader;

/// Session-level events surfaced to the host.
#[derive(Debug)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    /// An inbound message was appended to the log.
    Message { chat: Chat, scroll: Scroll },
    /// Token issuance failed; the session's connection has stopped and
    /// the user retries by re-selecting the room.
    TokenRefused(String),
}

pub struct ChatSession {
    detail: RoomDetail,
    backend: Arc<dyn RoomService>,
    log: MessageLog,
    composer: Arc<Composer>,
    handle: ConnectionHandle,
    events: mpsc::Receiver<ConnectionEvent>,
    clock: Option<ExpiryClock>,
    session_active: Arc<watch::Sender<bool>>,
    torn_down: bool,
}

impl ChatSession {
    /// Fetch the room and wire up the whole session.
    ///
    /// The backend value serves three roles the production [`crate::api::ApiClient`]
    /// implements together: room lookup, token issuance and media upload.
    pub async fn open<B>(
        backend: Arc<B>,
        transport: Arc<dyn ChannelTransport>,
        identity: SessionIdentity,
        room_id: i64,
    ) -> Result<Self, SessionError>
    where
        B: RoomService + TokenBroker + MediaUploader + 'static,
    {
        let detail = backend.room_detail(room_id).await?;
        info!(room = room_id, channel = %detail.room_hash, "Opening chat session");

        let (active_tx, active_rx) = watch::channel(true);
        let active_tx = Arc::new(active_tx);

        // A room that is already over gets no connection at all; the
        // manager observes the dropped flag and exits before its first
        // token request.
        if countdown::is_expired(detail.expired_at, Utc::now()) {
            debug!(room = room_id, "Room already expired at open");
            let _ = active_tx.send(false);
        }

        let (handle, events) = spawn_connection(
            backend.clone() as Arc<dyn TokenBroker>,
            transport,
            detail.room_hash.clone(),
            active_rx.clone(),
        );

        let clock = detail
            .expired_at
            .map(|at| ExpiryClock::start(at, active_tx.clone()));

        let composer = Arc::new(Composer::new(
            detail.room_hash.clone(),
            identity.role.side(),
            backend.clone() as Arc<dyn MediaUploader>,
            handle.clone(),
            active_rx,
        ));

        let mut log = MessageLog::new();
        log.seed(detail.chats.clone());

        Ok(Self {
            detail,
            backend: backend as Arc<dyn RoomService>,
            log,
            composer,
            handle,
            events,
            clock,
            session_active: active_tx,
            torn_down: false,
        })
    }

    pub fn room(&self) -> &RoomDetail {
        &self.detail
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn composer(&self) -> Arc<Composer> {
        self.composer.clone()
    }

    /// Countdown state, absent while the room is pending acceptance.
    pub fn expiry_status(&self) -> Option<ExpiryStatus> {
        self.clock.as_ref().map(|c| c.status())
    }

    pub fn is_expired(&self) -> bool {
        self.expiry_status().map(|s| s.expired).unwrap_or(false)
    }

    /// Next session event. Inbound messages are appended to the log in
    /// arrival order before being surfaced. Returns `None` once the
    /// connection manager has terminated.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.events.recv().await? {
            ConnectionEvent::Connected => Some(SessionEvent::Connected),
            ConnectionEvent::Disconnected => Some(SessionEvent::Disconnected),
            ConnectionEvent::TokenRefused(msg) => Some(SessionEvent::TokenRefused(msg)),
            ConnectionEvent::Message(chat) => {
                let scroll = self.log.append(chat.clone());
                Some(SessionEvent::Message { chat, scroll })
            }
        }
    }

    /// End the consultation on the backend, then tear the session down.
    pub async fn end_consultation(&mut self) -> Result<(), SessionError> {
        self.backend.close_room(self.detail.id).await?;
        self.teardown().await;
        Ok(())
    }

    /// Stop the clock, stop the connection manager, cancel reconnects.
    /// Idempotent; also invoked on room switch.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        info!(room = self.detail.id, "Tearing down chat session");
        let _ = self.session_active.send(false);
        self.handle.teardown().await;
        if let Some(clock) = self.clock.take() {
            clock.stop();
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        // The manager also watches this flag, so dropping a session never
        // leaks a reconnect cycle even without an explicit teardown.
        let _ = self.session_active.send(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    use telecare_net::{ChannelConnection, NetError};
    use telecare_shared::model::{Attachment, SessionToken, TokenPair};
    use telecare_shared::wire::WsFrame;

    use crate::error::ApiError;
    use crate::identity::{Role, SessionIdentity};

    struct FakeBackend {
        detail: RoomDetail,
        tokens_issued: AtomicUsize,
        rooms_closed: AtomicUsize,
    }

    #[async_trait]
    impl RoomService for FakeBackend {
        async fn room_detail(&self, _room_id: i64) -> Result<RoomDetail, ApiError> {
            Ok(self.detail.clone())
        }

        async fn close_room(&self, _room_id: i64) -> Result<(), ApiError> {
            self.rooms_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl TokenBroker for FakeBackend {
        async fn issue_token(&self, room_hash: &str) -> Result<SessionToken, NetError> {
            self.tokens_issued.fetch_add(1, Ordering::SeqCst);
            Ok(SessionToken {
                channel: room_hash.to_string(),
                token: TokenPair {
                    client_token: "ct".into(),
                    channel_token: "cht".into(),
                },
            })
        }
    }

    #[async_trait]
    impl MediaUploader for FakeBackend {
        async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<Attachment, ApiError> {
            Ok(Attachment {
                url: format!("https://cdn/{file_name}"),
                format: "png".into(),
            })
        }
    }

    /// Transport whose first connection receives whatever the test pushes
    /// through `inbound_tx`.
    struct PushTransport {
        inbound: Mutex<Option<UnboundedReceiver<Chat>>>,
    }

    impl PushTransport {
        fn new() -> (Arc<Self>, UnboundedSender<Chat>) {
            let (tx, rx) = unbounded_channel();
            (
                Arc::new(Self {
                    inbound: Mutex::new(Some(rx)),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl ChannelTransport for PushTransport {
        async fn connect(&self) -> Result<Box<dyn ChannelConnection>, NetError> {
            let inbound = self.inbound.lock().unwrap().take();
            Ok(Box::new(PushConnection { inbound }))
        }
    }

    struct PushConnection {
        inbound: Option<UnboundedReceiver<Chat>>,
    }

    #[async_trait]
    impl ChannelConnection for PushConnection {
        async fn send(&mut self, _frame: &WsFrame) -> Result<(), NetError> {
            Ok(())
        }

        async fn next(&mut self) -> Option<Result<Chat, NetError>> {
            match self.inbound.as_mut() {
                Some(rx) => rx.recv().await.map(Ok),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    fn detail(expired_at: Option<chrono::DateTime<Utc>>) -> RoomDetail {
        RoomDetail {
            id: 3,
            room_hash: "room-hash".into(),
            doctor_account_id: 2,
            user_account_id: 1,
            doctor_certificate_url: String::new(),
            expired_at,
            chats: vec![seeded_chat(100)],
        }
    }

    fn seeded_chat(id: i64) -> Chat {
        Chat {
            id,
            room_id: 3,
            sender_account_id: 2,
            message: format!("msg-{id}"),
            attachment: None,
            prescription: None,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn backend(expired_at: Option<chrono::DateTime<Utc>>) -> Arc<FakeBackend> {
        Arc::new(FakeBackend {
            detail: detail(expired_at),
            tokens_issued: AtomicUsize::new(0),
            rooms_closed: AtomicUsize::new(0),
        })
    }

    fn user() -> SessionIdentity {
        SessionIdentity {
            account_id: 1,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_open_seeds_log_and_routes_inbound_in_order() {
        let backend = backend(Some(Utc::now() + Duration::minutes(30)));
        let (transport, inbound_tx) = PushTransport::new();

        let mut session = ChatSession::open(backend, transport, user(), 3)
            .await
            .unwrap();
        assert_eq!(session.log().len(), 1);

        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::Connected)
        ));

        inbound_tx.send(seeded_chat(101)).unwrap();
        inbound_tx.send(seeded_chat(102)).unwrap();

        match session.next_event().await {
            Some(SessionEvent::Message { chat, scroll }) => {
                assert_eq!(chat.id, 101);
                // History was seeded, so appends animate.
                assert_eq!(scroll, Scroll::Smooth);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match session.next_event().await {
            Some(SessionEvent::Message { chat, .. }) => assert_eq!(chat.id, 102),
            other => panic!("unexpected event: {other:?}"),
        }

        let ids: Vec<i64> = session.log().entries().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);

        session.teardown().await;
    }

    #[tokio::test]
    async fn test_already_expired_room_never_connects() {
        let backend = backend(Some(Utc::now() - Duration::hours(1)));
        let (transport, _inbound_tx) = PushTransport::new();

        let mut session = ChatSession::open(backend.clone(), transport, user(), 3)
            .await
            .unwrap();

        // The manager exits on the inactive flag without a token fetch.
        assert!(session.next_event().await.is_none());
        assert_eq!(backend.tokens_issued.load(Ordering::SeqCst), 0);
        assert!(session.is_expired());
    }

    #[tokio::test]
    async fn test_end_consultation_closes_room_and_tears_down() {
        let backend = backend(Some(Utc::now() + Duration::minutes(30)));
        let (transport, _inbound_tx) = PushTransport::new();

        let mut session = ChatSession::open(backend.clone(), transport, user(), 3)
            .await
            .unwrap();
        assert!(matches!(
            session.next_event().await,
            Some(SessionEvent::Connected)
        ));

        session.end_consultation().await.unwrap();
        assert_eq!(backend.rooms_closed.load(Ordering::SeqCst), 1);

        // Idempotent teardown; no second close.
        session.teardown().await;
        session.end_consultation().await.unwrap();
        assert_eq!(backend.rooms_closed.load(Ordering::SeqCst), 2);

        // The manager has stopped; exactly the one original token fetch.
        while session.next_event().await.is_some() {}
        assert_eq!(backend.tokens_issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_room_has_no_clock() {
        let backend = backend(None);
        let (transport, _inbound_tx) = PushTransport::new();

        let session = ChatSession::open(backend, transport, user(), 3)
            .await
            .unwrap();
        assert!(session.expiry_status().is_none());
        assert!(!session.is_expired());
    }
}
