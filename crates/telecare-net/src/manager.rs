//! Connection manager with tokio mpsc command/event pattern.
//!
//! The state machine runs in a dedicated tokio task. External code
//! communicates with it through a typed command channel and receives
//! inbound messages and lifecycle notices over an event channel.
//!
//! One manager instance owns at most one live connection. Each cycle is
//! strictly sequenced: request a fresh token pair, open the transport,
//! authenticate, then pump frames until the connection drops. Any close
//! or transport error starts the next cycle; the manager does not
//! distinguish an intentional server close from a dropped socket. The
//! cycle only ends on teardown (command, dropped handles, or the shared
//! session-active flag going false — which is how session expiry stops
//! reconnects).

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use telecare_shared::model::Chat;
use telecare_shared::wire::{AuthData, WsFrame};

use crate::error::NetError;
use crate::transport::{ChannelTransport, TokenBroker};

const CHANNEL_CAPACITY: usize = 256;

/// Commands sent *into* the manager task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Publish a frame on the active connection.
    Send(WsFrame),
    /// Close the connection and cease all reconnect attempts.
    Teardown,
}

/// Events sent *from* the manager task to the session.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The connection is open and authenticated.
    Connected,
    /// The connection dropped; a reconnect cycle is starting.
    Disconnected,
    /// An inbound message arrived on the channel.
    Message(Chat),
    /// Token issuance failed. Terminal: the manager has stopped and the
    /// user retries by re-selecting the room.
    TokenRefused(String),
}

/// Handle for sending commands to a running manager task.
#[derive(Clone)]
pub struct ConnectionHandle {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
}

impl ConnectionHandle {
    pub fn new(cmd_tx: mpsc::Sender<ConnectionCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Hand a frame to the active connection.
    pub async fn send_frame(&self, frame: WsFrame) -> Result<(), NetError> {
        self.cmd_tx
            .send(ConnectionCommand::Send(frame))
            .await
            .map_err(|_| NetError::Closed)
    }

    /// Stop the manager. Idempotent; errors mean it is already gone.
    pub async fn teardown(&self) {
        let _ = self.cmd_tx.send(ConnectionCommand::Teardown).await;
    }
}

/// Spawn the connection manager for one room's channel.
///
/// `active_rx` is the shared session-active flag: the expiry clock and
/// session teardown flip it to `false`, which stops the reconnect cycle
/// even while a connect or token fetch is pending.
///
/// Returns the command handle and the event receiver.
pub fn spawn_connection(
    broker: Arc<dyn TokenBroker>,
    transport: Arc<dyn ChannelTransport>,
    room_hash: String,
    mut active_rx: watch::Receiver<bool>,
) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<ConnectionCommand>(CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        'session: loop {
            if !*active_rx.borrow() {
                break;
            }

            // TokenPending: every cycle, reconnects included, gets a
            // brand-new pair. Stale tokens are never reused.
            let token = match broker.issue_token(&room_hash).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(room = %room_hash, error = %e, "Token issuance failed");
                    let _ = event_tx
                        .send(ConnectionEvent::TokenRefused(e.to_string()))
                        .await;
                    break 'session;
                }
            };

            // Connecting
            let mut conn = match transport.connect().await {
                Ok(c) => c,
                Err(e) => {
                    warn!(room = %room_hash, error = %e, "Connect failed, retrying with a fresh token");
                    let _ = event_tx.send(ConnectionEvent::Disconnected).await;
                    continue 'session;
                }
            };

            // Authenticate immediately on open.
            let auth = WsFrame::Auth(AuthData {
                channel: token.channel.clone(),
                client_token: token.token.client_token.clone(),
                channel_token: token.token.channel_token.clone(),
            });
            if let Err(e) = conn.send(&auth).await {
                warn!(channel = %token.channel, error = %e, "Auth send failed, reconnecting");
                conn.close().await;
                let _ = event_tx.send(ConnectionEvent::Disconnected).await;
                continue 'session;
            }

            info!(channel = %token.channel, "Channel connection authenticated");
            let _ = event_tx.send(ConnectionEvent::Connected).await;

            // Open: pump commands and inbound frames.
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ConnectionCommand::Send(frame)) => {
                            if let Err(e) = conn.send(&frame).await {
                                warn!(error = %e, "Send failed, reconnecting");
                                conn.close().await;
                                let _ = event_tx.send(ConnectionEvent::Disconnected).await;
                                continue 'session;
                            }
                        }
                        Some(ConnectionCommand::Teardown) | None => {
                            conn.close().await;
                            break 'session;
                        }
                    },
                    inbound = conn.next() => match inbound {
                        Some(Ok(chat)) => {
                            let _ = event_tx.send(ConnectionEvent::Message(chat)).await;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Transport error, reconnecting");
                            conn.close().await;
                            let _ = event_tx.send(ConnectionEvent::Disconnected).await;
                            continue 'session;
                        }
                        None => {
                            debug!("Connection closed by server, reconnecting");
                            let _ = event_tx.send(ConnectionEvent::Disconnected).await;
                            continue 'session;
                        }
                    },
                    changed = active_rx.changed() => {
                        if changed.is_err() || !*active_rx.borrow() {
                            conn.close().await;
                            break 'session;
                        }
                    }
                }
            }
        }

        info!(room = %room_hash, "Connection manager terminated");
    });

    (ConnectionHandle::new(cmd_tx), event_rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use telecare_shared::model::{SessionToken, Side, TokenPair};
    use telecare_shared::wire::ChatData;

    use crate::transport::ChannelConnection;

    struct FakeBroker {
        issued: AtomicUsize,
    }

    impl FakeBroker {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                issued: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenBroker for FakeBroker {
        async fn issue_token(&self, room_hash: &str) -> Result<SessionToken, NetError> {
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(SessionToken {
                channel: room_hash.to_string(),
                token: TokenPair {
                    client_token: format!("client-{n}"),
                    channel_token: format!("channel-{n}"),
                },
            })
        }
    }

    struct RefusingBroker;

    #[async_trait]
    impl TokenBroker for RefusingBroker {
        async fn issue_token(&self, _room_hash: &str) -> Result<SessionToken, NetError> {
            Err(NetError::Token("no session".into()))
        }
    }

    /// Transport whose connections stay open until the test sends a close
    /// signal. All frames written to any connection are recorded.
    struct FakeTransport {
        connects: AtomicUsize,
        close_txs: Mutex<Vec<mpsc::UnboundedSender<()>>>,
        sent: Arc<Mutex<Vec<WsFrame>>>,
    }

    impl FakeTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicUsize::new(0),
                close_txs: Mutex::new(Vec::new()),
                sent: Arc::new(Mutex::new(Vec::new())),
            })
        }

        fn close_connection(&self, index: usize) {
            let txs = self.close_txs.lock().unwrap();
            txs[index].send(()).unwrap();
        }

        fn auth_client_tokens(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|f| match f {
                    WsFrame::Auth(a) => Some(a.client_token.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl ChannelTransport for FakeTransport {
        async fn connect(&self) -> Result<Box<dyn ChannelConnection>, NetError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (close_tx, close_rx) = mpsc::unbounded_channel();
            self.close_txs.lock().unwrap().push(close_tx);
            Ok(Box::new(FakeConnection {
                close_rx,
                sent: self.sent.clone(),
            }))
        }
    }

    struct FakeConnection {
        close_rx: mpsc::UnboundedReceiver<()>,
        sent: Arc<Mutex<Vec<WsFrame>>>,
    }

    #[async_trait]
    impl ChannelConnection for FakeConnection {
        async fn send(&mut self, frame: &WsFrame) -> Result<(), NetError> {
            self.sent.lock().unwrap().push(frame.clone());
            Ok(())
        }

        async fn next(&mut self) -> Option<Result<Chat, NetError>> {
            // A close signal ends the connection; if the test never sends
            // one, stay open forever.
            match self.close_rx.recv().await {
                Some(()) => None,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    async fn wait_for_connected(events: &mut mpsc::Receiver<ConnectionEvent>) {
        loop {
            match events.recv().await {
                Some(ConnectionEvent::Connected) => return,
                Some(_) => continue,
                None => panic!("manager terminated before connecting"),
            }
        }
    }

    #[tokio::test]
    async fn test_reconnect_requests_fresh_token_each_cycle() {
        let broker = FakeBroker::new();
        let transport = FakeTransport::new();
        let (_active_tx, active_rx) = watch::channel(true);

        let (_handle, mut events) = spawn_connection(
            broker.clone(),
            transport.clone(),
            "room-hash".into(),
            active_rx,
        );

        wait_for_connected(&mut events).await;

        // Two consecutive server-side closes.
        transport.close_connection(0);
        wait_for_connected(&mut events).await;
        transport.close_connection(1);
        wait_for_connected(&mut events).await;

        assert_eq!(broker.issued.load(Ordering::SeqCst), 3);
        // Each connection authenticated with its own pair, in issue order.
        assert_eq!(
            transport.auth_client_tokens(),
            vec!["client-1", "client-2", "client-3"]
        );
    }

    #[tokio::test]
    async fn test_teardown_stops_reconnect_cycle() {
        let broker = FakeBroker::new();
        let transport = FakeTransport::new();
        let (_active_tx, active_rx) = watch::channel(true);

        let (handle, mut events) = spawn_connection(
            broker.clone(),
            transport.clone(),
            "room-hash".into(),
            active_rx,
        );

        wait_for_connected(&mut events).await;
        handle.teardown().await;

        // The manager exits without another token fetch or connect.
        while events.recv().await.is_some() {}
        assert_eq!(broker.issued.load(Ordering::SeqCst), 1);
        assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_session_inactive_flag_stops_manager() {
        let broker = FakeBroker::new();
        let transport = FakeTransport::new();
        let (active_tx, active_rx) = watch::channel(true);

        let (_handle, mut events) = spawn_connection(
            broker.clone(),
            transport.clone(),
            "room-hash".into(),
            active_rx,
        );

        wait_for_connected(&mut events).await;

        // Expiry flips the shared flag; no reconnect may follow.
        active_tx.send(false).unwrap();
        while events.recv().await.is_some() {}
        assert_eq!(broker.issued.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_refusal_is_terminal() {
        let transport = FakeTransport::new();
        let (_active_tx, active_rx) = watch::channel(true);

        let (_handle, mut events) = spawn_connection(
            Arc::new(RefusingBroker),
            transport.clone(),
            "room-hash".into(),
            active_rx,
        );

        match events.recv().await {
            Some(ConnectionEvent::TokenRefused(msg)) => {
                assert!(msg.contains("no session"));
            }
            other => panic!("expected TokenRefused, got {other:?}"),
        }
        assert!(events.recv().await.is_none());
        assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_outbound_frame_reaches_connection_after_auth() {
        let broker = FakeBroker::new();
        let transport = FakeTransport::new();
        let (_active_tx, active_rx) = watch::channel(true);

        let (handle, mut events) = spawn_connection(
            broker.clone(),
            transport.clone(),
            "room-hash".into(),
            active_rx,
        );

        wait_for_connected(&mut events).await;

        handle
            .send_frame(WsFrame::Chat(ChatData {
                channel: "room-hash".into(),
                side: Side::User,
                message: "hello".into(),
                attachment: None,
                prescription_drugs: vec![],
            }))
            .await
            .unwrap();
        handle.teardown().await;
        while events.recv().await.is_some() {}

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], WsFrame::Auth(_)));
        assert!(matches!(sent[1], WsFrame::Chat(_)));
    }
}
