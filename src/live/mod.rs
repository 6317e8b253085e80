//! # Live Connection Module
//!
//! Owns the single live telemetry subscription.
//!
//! ## Lifecycle
//!
//! ```text
//!            enable()                      Opened
//! Disabled ───────────► Subscribing ───────────────► Connected
//!    ▲                       │                           │
//!    └─────── disable() ─────┴──── disable() / Closed ───┘
//! ```
//!
//! "Subscribing" and "Connected" are one phase told apart only by the
//! `connected` flag. A subscription that closes is not reopened; live mode
//! has to be toggled again.
//!
//! ## Event delivery
//!
//! Each subscription runs as its own task and reports [`LiveEvent`]s tagged
//! with its subscription id over an mpsc channel. [`LiveConnection::handle_event`]
//! drops every event whose id is not the active subscription, so nothing a
//! closed subscription still had in flight can touch the state.

pub mod source_trait;

pub use source_trait::{LiveSource, LiveStream, WsLiveSource};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::telemetry::{LivePayload, LiveState};

/// What a subscription task reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEventKind {
    /// Handshake completed
    Opened,
    /// One inbound text message, not yet parsed
    Message(String),
    /// Subscription ended (peer close, transport failure or failed open)
    Closed,
}

/// Event from subscription `subscription`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveEvent {
    pub subscription: u64,
    pub kind: LiveEventKind,
}

/// Subscription status exposed to presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub subscribed: bool,
    pub connected: bool,
}

/// Handle to a running subscription task
///
/// Dropping it drops the shutdown sender, which makes the task close the
/// stream and exit.
struct Subscription {
    id: u64,
    _shutdown: oneshot::Sender<()>,
    _task: JoinHandle<()>,
}

/// Build the subscription URL from the page origin
///
/// `https` origins subscribe over `wss`, everything else over `ws`. Host and
/// port are kept, the path is replaced.
///
/// # Examples
///
/// ```
/// use tellotwin::live::live_url;
///
/// let url = live_url("https://twin.example.com/dashboard", "/ws/tello")?;
/// assert_eq!(url.as_str(), "wss://twin.example.com/ws/tello");
///
/// let url = live_url("http://localhost:8000", "/ws/tello")?;
/// assert_eq!(url.as_str(), "ws://localhost:8000/ws/tello");
/// # Ok::<(), tellotwin::error::TelloTwinError>(())
/// ```
pub fn live_url(base_url: &str, path: &str) -> Result<Url> {
    let base = Url::parse(base_url)?;
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let host = base.host_str().ok_or(url::ParseError::EmptyHost)?;

    let authority = match base.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(Url::parse(&format!("{}://{}{}", scheme, authority, path))?)
}

/// Live Connection Manager
pub struct LiveConnection {
    source: Arc<dyn LiveSource>,
    url: Url,
    events: mpsc::UnboundedSender<LiveEvent>,
    state: LiveState,
    active: Option<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConnection")
            .field("url", &self.url.as_str())
            .field("state", &self.state)
            .field("subscription", &self.active.as_ref().map(|s| s.id))
            .finish_non_exhaustive()
    }
}

impl LiveConnection {
    /// Create a disabled manager; subscription events go to `events`
    pub fn new(
        source: Arc<dyn LiveSource>,
        url: Url,
        events: mpsc::UnboundedSender<LiveEvent>,
    ) -> Self {
        Self {
            source,
            url,
            events,
            state: LiveState::default(),
            active: None,
            next_id: 0,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Latest merged live telemetry
    pub fn state(&self) -> &LiveState {
        &self.state
    }

    pub fn is_subscribed(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState {
            subscribed: self.is_subscribed(),
            connected: self.state.connected,
        }
    }

    /// Id of the active subscription, if any
    pub fn subscription_id(&self) -> Option<u64> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Open a subscription, closing any stale one first
    ///
    /// Must be called from within a tokio runtime.
    pub fn enable(&mut self) {
        if self.active.is_some() {
            debug!("Closing stale live subscription before re-subscribing");
            self.disable();
        }

        self.next_id += 1;
        let id = self.next_id;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(pump(
            Arc::clone(&self.source),
            self.url.clone(),
            id,
            self.events.clone(),
            shutdown_rx,
        ));

        info!("Live subscription {} requested: {}", id, self.url);
        self.active = Some(Subscription {
            id,
            _shutdown: shutdown_tx,
            _task: task,
        });
    }

    /// Close the active subscription and mark disconnected
    ///
    /// Takes effect immediately: events already queued by the closed
    /// subscription are ignored by [`Self::handle_event`].
    pub fn disable(&mut self) {
        if let Some(subscription) = self.active.take() {
            info!("Live subscription {} closed", subscription.id);
        }
        self.state.connected = false;
    }

    /// Apply one subscription event; returns true when state changed
    pub fn handle_event(&mut self, event: LiveEvent) -> bool {
        if self.subscription_id() != Some(event.subscription) {
            debug!(
                "Ignoring event from inactive live subscription {}",
                event.subscription
            );
            return false;
        }

        match event.kind {
            LiveEventKind::Opened => {
                self.state.connected = true;
                true
            }
            LiveEventKind::Message(text) => match LivePayload::parse(&text) {
                Ok(payload) if payload.is_empty() => {
                    debug!("Live payload carried no usable fields");
                    false
                }
                Ok(payload) => {
                    self.state.merge(&payload);
                    true
                }
                Err(e) => {
                    debug!("Discarding malformed live payload: {}", e);
                    false
                }
            },
            LiveEventKind::Closed => {
                // No automatic reconnect; the operator re-enables live mode
                self.active = None;
                self.state.connected = false;
                true
            }
        }
    }
}

async fn pump(
    source: Arc<dyn LiveSource>,
    url: Url,
    id: u64,
    events: mpsc::UnboundedSender<LiveEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let send = |kind| events.send(LiveEvent { subscription: id, kind }).is_ok();

    let opened = tokio::select! {
        _ = &mut shutdown => {
            debug!("Live subscription {} cancelled while connecting", id);
            return;
        }
        result = source.open(&url) => result,
    };

    let mut stream = match opened {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Live subscription {} to {} failed: {}", id, url, e);
            send(LiveEventKind::Closed);
            return;
        }
    };

    info!("Live subscription {} connected", id);
    if !send(LiveEventKind::Opened) {
        return;
    }

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Err(e) = stream.close().await {
                    debug!("Live subscription {} close: {}", id, e);
                }
                return;
            }
            item = stream.next_text() => match item {
                Some(Ok(text)) => {
                    if !send(LiveEventKind::Message(text)) {
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!("Live subscription {} dropped: {}", id, e);
                    break;
                }
                None => {
                    info!("Live subscription {} closed by peer", id);
                    break;
                }
            }
        }
    }

    send(LiveEventKind::Closed);
}

#[cfg(test)]
mod tests {
    use super::source_trait::mocks::MockLiveSource;
    use super::*;
    use std::time::Duration;

    fn manager(source: &MockLiveSource) -> (LiveConnection, mpsc::UnboundedReceiver<LiveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = live_url("http://localhost:8000", "/ws/tello").unwrap();
        (LiveConnection::new(Arc::new(source.clone()), url, tx), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<LiveEvent>) -> LiveEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for live event")
            .expect("event channel closed")
    }

    /// Let spawned subscription tasks run until `done` holds
    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..100 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("subscription tasks did not settle");
    }

    #[test]
    fn test_live_url_schemes() {
        assert_eq!(
            live_url("http://localhost:8000", "/ws/tello").unwrap().as_str(),
            "ws://localhost:8000/ws/tello"
        );
        assert_eq!(
            live_url("https://twin.example.com:8443/", "/ws/tello").unwrap().as_str(),
            "wss://twin.example.com:8443/ws/tello"
        );
        assert_eq!(
            live_url("http://[::1]:8000", "/ws/tello").unwrap().as_str(),
            "ws://[::1]:8000/ws/tello"
        );
    }

    #[test]
    fn test_live_url_requires_host() {
        assert!(live_url("mailto:pilot@example.com", "/ws/tello").is_err());
        assert!(live_url("not a url", "/ws/tello").is_err());
    }

    #[tokio::test]
    async fn test_starts_disabled() {
        let source = MockLiveSource::new();
        let (live, _rx) = manager(&source);

        assert_eq!(live.connection_state(), ConnectionState::default());
        assert_eq!(*live.state(), LiveState::default());
        assert_eq!(source.opened(), 0);
    }

    #[tokio::test]
    async fn test_open_sets_connected() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);

        live.enable();
        assert!(live.is_subscribed());
        assert!(!live.is_connected(), "connecting until the open confirmation");

        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, LiveEventKind::Opened);
        assert!(live.handle_event(event));
        assert!(live.is_connected());
        assert_eq!(source.urls.lock().unwrap()[0], "ws://localhost:8000/ws/tello");
    }

    #[tokio::test]
    async fn test_payloads_merge_into_state() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        source.send_text(0, r#"{"roll": 10, "pitch": -5, "yaw": 90, "altitude": 1.5}"#);
        let event = next_event(&mut rx).await;
        assert!(live.handle_event(event));

        source.send_text(0, r#"{"yaw": 45}"#);
        let event = next_event(&mut rx).await;
        assert!(live.handle_event(event));

        assert_eq!(
            *live.state(),
            LiveState {
                roll: 10.0,
                pitch: -5.0,
                yaw: 45.0,
                altitude: 1.5,
                connected: true,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_leaves_state_untouched() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        source.send_text(0, r#"{"roll": 12, "altitude": 0.8}"#);
        let event = next_event(&mut rx).await;
        live.handle_event(event);
        let before = *live.state();

        for garbage in ["{roll: 3", "\u{0}\u{1}", r#"{"pitch": "steep"}"#, "[]"] {
            source.send_text(0, garbage);
            let event = next_event(&mut rx).await;
            assert!(!live.handle_event(event), "{:?} should be discarded", garbage);
        }

        assert_eq!(*live.state(), before);
        assert!(live.is_connected());
        assert!(live.is_subscribed(), "malformed input must not close the subscription");
    }

    #[tokio::test]
    async fn test_mixed_payload_merges_usable_fields() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        source.send_text(0, r#"{"roll": "12.5", "pitch": "steep", "yaw": 30}"#);
        let event = next_event(&mut rx).await;
        assert!(live.handle_event(event));

        assert_eq!(live.state().roll, 12.5);
        assert_eq!(live.state().pitch, 0.0);
        assert_eq!(live.state().yaw, 30.0);
        assert!(live.is_connected());
    }

    #[tokio::test]
    async fn test_disable_closes_subscription() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);
        assert_eq!(source.open_streams(), 1);

        live.disable();
        assert_eq!(live.connection_state(), ConnectionState::default());

        settle(|| source.open_streams() == 0).await;
        assert_eq!(source.closed_by_us(), 1, "stream is closed, not just dropped");
    }

    #[tokio::test]
    async fn test_no_updates_after_disable() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        // Message already queued when live mode is switched off
        source.send_text(0, r#"{"roll": 25}"#);
        let in_flight = next_event(&mut rx).await;
        live.disable();

        assert!(!live.handle_event(in_flight));
        assert_eq!(live.state().roll, 0.0);
        assert!(!live.is_connected());
    }

    #[tokio::test]
    async fn test_toggle_on_off_leaves_no_open_subscription() {
        let source = MockLiveSource::new();
        let (mut live, _rx) = manager(&source);

        live.enable();
        live.disable();

        settle(|| source.open_streams() == 0).await;
        assert!(!live.is_subscribed());
    }

    #[tokio::test]
    async fn test_reenable_closes_stale_handle() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);

        live.enable();
        let first = next_event(&mut rx).await;
        let first_id = first.subscription;
        live.handle_event(first);

        live.enable();
        let second_id = live.subscription_id().unwrap();
        assert_ne!(first_id, second_id);

        settle(|| source.opened() == 2 && source.open_streams() == 1).await;

        // The stale subscription can no longer write
        let stale = LiveEvent {
            subscription: first_id,
            kind: LiveEventKind::Message(r#"{"roll": 5}"#.to_string()),
        };
        assert!(!live.handle_event(stale));
        assert_eq!(live.state().roll, 0.0);
    }

    #[tokio::test]
    async fn test_peer_close_disconnects_without_reconnect() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        source.close_peer(0);
        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, LiveEventKind::Closed);
        assert!(live.handle_event(event));

        assert!(!live.is_connected());
        assert!(!live.is_subscribed());
        tokio::task::yield_now().await;
        assert_eq!(source.opened(), 1, "no automatic reconnect");
    }

    #[tokio::test]
    async fn test_transport_error_ends_subscription() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);

        source.send_error(0, "connection reset");
        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, LiveEventKind::Closed);
        live.handle_event(event);
        assert!(!live.is_connected());
    }

    #[tokio::test]
    async fn test_failed_open_reports_closed() {
        let source = MockLiveSource::new();
        source.set_fail_open(true);
        let (mut live, mut rx) = manager(&source);

        live.enable();
        let event = next_event(&mut rx).await;
        assert_eq!(event.kind, LiveEventKind::Closed);
        live.handle_event(event);

        assert!(!live.is_subscribed());
        assert!(!live.is_connected());
    }

    #[tokio::test]
    async fn test_state_survives_reenable() {
        let source = MockLiveSource::new();
        let (mut live, mut rx) = manager(&source);
        live.enable();
        let opened = next_event(&mut rx).await;
        live.handle_event(opened);
        source.send_text(0, r#"{"yaw": 30}"#);
        let event = next_event(&mut rx).await;
        live.handle_event(event);

        live.disable();
        assert_eq!(live.state().yaw, 30.0, "last known attitude is kept");

        live.enable();
        assert!(!live.is_connected());
        assert_eq!(live.state().yaw, 30.0);
    }
}
