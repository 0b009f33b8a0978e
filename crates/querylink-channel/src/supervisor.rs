use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use querylink_frame::{Frame, ReceiveBuffer};
use querylink_transport::{
    BackendStream, BoxedReader, BoxedWriter, Connector, Result as TransportResult, TransportError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::event::{EventBus, StatusEvent};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Monotonic id of one connect attempt and the session it may become.
pub type SessionId = u64;

/// Lifecycle state of the backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Shut down on request. Only an explicit `connect()` leaves this state.
    Closing,
}

/// Outcome of queueing an outbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Handed to the session's writer.
    Queued,
    /// The writer is backed up; the frame was logged and discarded.
    Dropped,
}

/// Write access to one connected session.
#[derive(Debug, Clone)]
pub struct Outbound {
    session: SessionId,
    tx: mpsc::Sender<Bytes>,
}

impl Outbound {
    /// Session this handle writes to.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Queue an encoded frame without waiting.
    ///
    /// A full queue drops the frame instead of buffering it further; it is
    /// never retried.
    pub fn try_send(&self, frame: Bytes) -> Result<SendStatus> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(SendStatus::Queued),
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(
                    session = self.session,
                    bytes = frame.len(),
                    "outbound queue full; dropping frame"
                );
                Ok(SendStatus::Dropped)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ChannelError::NotConnected),
        }
    }
}

/// Receives what the supervisor reads off a live session.
///
/// Both callbacks run with the supervisor's state locked, which is what
/// keeps a superseded session from ever reaching the handler. They must
/// not call back into the supervisor.
pub trait SessionHandler: Send + Sync + 'static {
    /// A session has just connected.
    fn on_connected(&self, session: SessionId, outbound: &Outbound) {
        let _ = (session, outbound);
    }

    /// A complete frame arrived on the current session.
    fn on_frame(&self, session: SessionId, frame: Frame);

    /// A connecting or connected session has ended, by failure or `close()`.
    /// Anything written to it will never be answered.
    fn on_disconnected(&self, session: SessionId) {
        let _ = session;
    }
}

/// Owns the backend socket lifecycle.
///
/// `connect`, `send` and `close` only do local bookkeeping and return
/// immediately; the socket work runs on tokio tasks and its outcome is
/// reported through [`StatusEvent`]s on the event bus. Failures never reach
/// the caller: each one produces exactly one disconnected status and at most
/// one pending reconnect.
///
/// Dropping the supervisor closes it.
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<State>,
    connector: Arc<dyn Connector>,
    handler: Arc<dyn SessionHandler>,
    events: EventBus,
    runtime: Handle,
    reconnect_delay: Duration,
    outbound_capacity: usize,
}

struct State {
    conn: ConnectionState,
    session: SessionId,
    last_error: Option<String>,
    buffer: ReceiveBuffer,
    attempt: Option<CancellationToken>,
    io: Option<SessionIo>,
    reconnect: Option<JoinHandle<()>>,
}

struct SessionIo {
    outbound: Outbound,
    cancel: CancellationToken,
}

impl State {
    /// Stop whatever the current session is doing and forget its bytes.
    fn teardown(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.cancel();
        }
        if let Some(io) = self.io.take() {
            io.cancel.cancel();
        }
        self.buffer.clear();
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }
}

impl ConnectionSupervisor {
    /// Create a supervisor driven by the current tokio runtime.
    pub fn new(
        config: &ChannelConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn SessionHandler>,
        events: EventBus,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        Ok(Self::with_runtime(runtime, config, connector, handler, events))
    }

    /// Create a supervisor driven by an explicit runtime handle.
    ///
    /// Lets a UI thread outside the runtime own the supervisor.
    pub fn with_runtime(
        runtime: Handle,
        config: &ChannelConfig,
        connector: Arc<dyn Connector>,
        handler: Arc<dyn SessionHandler>,
        events: EventBus,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    conn: ConnectionState::Disconnected,
                    session: 0,
                    last_error: None,
                    buffer: ReceiveBuffer::with_max_frame_len(config.max_frame_len),
                    attempt: None,
                    io: None,
                    reconnect: None,
                }),
                connector,
                handler,
                events,
                runtime,
                reconnect_delay: config.reconnect_delay,
                outbound_capacity: config.outbound_capacity.max(1),
            }),
        }
    }

    /// Start connecting unless a session is already connecting or connected.
    pub fn connect(&self) {
        self.shared.connect();
    }

    /// Queue an encoded frame on the connected session.
    pub fn send(&self, frame: Bytes) -> Result<SendStatus> {
        self.with_outbound(move |_, outbound| outbound.try_send(frame))?
    }

    /// Run `f` against the connected session's writer.
    ///
    /// The session cannot change while `f` runs, so whatever `f` records
    /// about the write belongs to that session. `f` runs with the supervisor
    /// locked and must not call back into it.
    pub fn with_outbound<R>(&self, f: impl FnOnce(SessionId, &Outbound) -> R) -> Result<R> {
        let state = self.shared.lock();
        match (state.conn, state.io.as_ref()) {
            (ConnectionState::Connected, Some(io)) => Ok(f(state.session, &io.outbound)),
            _ => Err(ChannelError::NotConnected),
        }
    }

    /// Feed bytes read from `session` through the framer.
    ///
    /// Returns `false` when `session` is no longer current; such chunks are
    /// discarded without touching the receive buffer.
    pub fn on_data(&self, session: SessionId, chunk: &[u8]) -> bool {
        self.shared.on_data(session, chunk)
    }

    /// Shut the connection down and cancel any pending reconnect. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().conn
    }

    /// Id of the current (or most recent) session.
    pub fn session_id(&self) -> SessionId {
        self.shared.lock().session
    }

    /// Why the most recent session failed, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    /// True while a reconnect timer is armed.
    pub fn reconnect_pending(&self) -> bool {
        self.shared
            .lock()
            .reconnect
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Bytes of an incomplete frame held for the current session.
    pub fn buffered_len(&self) -> usize {
        self.shared.lock().buffer.len()
    }

    /// Bus this supervisor reports status on.
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ConnectionSupervisor")
            .field("target", &self.shared.connector.describe())
            .field("state", &state.conn)
            .field("session", &state.session)
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(self: &Arc<Self>) {
        let mut state = self.lock();
        match state.conn {
            ConnectionState::Connecting | ConnectionState::Connected => {
                trace!(session = state.session, state = ?state.conn, "connect ignored");
            }
            ConnectionState::Disconnected | ConnectionState::Closing => {
                self.start_attempt(&mut state);
            }
        }
    }

    fn start_attempt(self: &Arc<Self>, state: &mut State) {
        state.cancel_reconnect();
        state.teardown();
        state.session += 1;
        state.conn = ConnectionState::Connecting;

        let session = state.session;
        let cancel = CancellationToken::new();
        state.attempt = Some(cancel.clone());

        debug!(session, target = %self.connector.describe(), "connecting to backend");
        let attempt = self.connector.connect();
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => trace!(session, "connect attempt abandoned"),
                result = attempt => shared.finish_attempt(session, result),
            }
        });
    }

    fn finish_attempt(self: &Arc<Self>, session: SessionId, result: TransportResult<BackendStream>) {
        let mut state = self.lock();
        if state.session != session || state.conn != ConnectionState::Connecting {
            debug!(session, current = state.session, "discarding stale connect result");
            return;
        }
        state.attempt = None;
        match result {
            Ok(stream) => self.establish(&mut state, session, stream),
            Err(err) => self.fail(&mut state, session, err.to_string()),
        }
    }

    fn establish(self: &Arc<Self>, state: &mut State, session: SessionId, stream: BackendStream) {
        let peer = stream.peer().to_string();
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(self.outbound_capacity);
        let cancel = CancellationToken::new();
        let outbound = Outbound { session, tx };

        self.runtime
            .spawn(read_loop(Arc::clone(self), session, reader, cancel.clone()));
        self.runtime.spawn(write_loop(
            Arc::clone(self),
            session,
            writer,
            rx,
            cancel.clone(),
        ));

        state.buffer.clear();
        state.io = Some(SessionIo {
            outbound: outbound.clone(),
            cancel,
        });
        state.conn = ConnectionState::Connected;
        state.last_error = None;

        info!(session, %peer, "connected to backend");
        self.events.status(StatusEvent::connected());
        self.handler.on_connected(session, &outbound);
    }

    fn on_data(self: &Arc<Self>, session: SessionId, chunk: &[u8]) -> bool {
        let mut state = self.lock();
        if state.session != session || state.conn != ConnectionState::Connected {
            trace!(
                session,
                current = state.session,
                bytes = chunk.len(),
                "discarding chunk from stale session"
            );
            return false;
        }

        for frame in state.buffer.feed(chunk) {
            trace!(session, bytes = frame.payload.len(), "frame received");
            self.handler.on_frame(session, frame);
        }

        if let Err(err) = state.buffer.check_remainder() {
            self.fail(&mut state, session, err.to_string());
            return false;
        }
        true
    }

    fn report_failure(self: &Arc<Self>, session: SessionId, err: TransportError) {
        let mut state = self.lock();
        self.fail(&mut state, session, err.to_string());
    }

    fn fail(self: &Arc<Self>, state: &mut State, session: SessionId, message: String) {
        if state.session != session {
            trace!(session, current = state.session, "ignoring failure of stale session");
            return;
        }
        match state.conn {
            ConnectionState::Connecting | ConnectionState::Connected => {}
            ConnectionState::Disconnected | ConnectionState::Closing => {
                trace!(session, "failure already handled");
                return;
            }
        }

        state.teardown();
        state.conn = ConnectionState::Disconnected;
        state.last_error = Some(message.clone());
        warn!(session, error = %message, "backend connection failed");
        self.events.status(StatusEvent::disconnected(message));
        self.handler.on_disconnected(session);
        self.schedule_reconnect(state, session);
    }

    fn schedule_reconnect(self: &Arc<Self>, state: &mut State, session: SessionId) {
        if state
            .reconnect
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
        {
            return;
        }

        let delay = self.reconnect_delay;
        debug!(session, ?delay, "reconnect scheduled");
        let shared = Arc::clone(self);
        state.reconnect = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.reconnect_due(session);
        }));
    }

    fn reconnect_due(self: &Arc<Self>, session: SessionId) {
        let mut state = self.lock();
        if state.session != session {
            return;
        }
        state.reconnect = None;
        if state.conn != ConnectionState::Disconnected {
            return;
        }
        info!(session, "reconnecting to backend");
        self.start_attempt(&mut state);
    }

    fn close(self: &Arc<Self>) {
        let mut state = self.lock();
        if state.conn == ConnectionState::Closing {
            return;
        }
        state.cancel_reconnect();
        state.teardown();
        let live = matches!(
            state.conn,
            ConnectionState::Connecting | ConnectionState::Connected
        );
        state.conn = ConnectionState::Closing;
        info!(session = state.session, "backend connection closed");
        self.events.status(StatusEvent::disconnected("connection closed"));
        if live {
            self.handler.on_disconnected(state.session);
        }
    }
}

async fn read_loop(
    shared: Arc<Shared>,
    session: SessionId,
    mut reader: BoxedReader,
    cancel: CancellationToken,
) {
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return,
            read = reader.read(&mut chunk) => read,
        };
        match read {
            Ok(0) => {
                shared.report_failure(session, TransportError::PeerClosed);
                return;
            }
            Ok(n) => {
                if !shared.on_data(session, &chunk[..n]) {
                    return;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                shared.report_failure(session, TransportError::Io(err));
                return;
            }
        }
    }
}

async fn write_loop(
    shared: Arc<Shared>,
    session: SessionId,
    mut writer: BoxedWriter,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let written = tokio::select! {
            _ = cancel.cancelled() => break,
            written = write_frame(&mut writer, &frame) => written,
        };
        if let Err(err) = written {
            shared.report_failure(session, TransportError::Io(err));
            return;
        }
        trace!(session, bytes = frame.len(), "frame written");
    }
    let _ = writer.shutdown().await;
}

async fn write_frame(writer: &mut BoxedWriter, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventSubscriber};
    use crate::testing::{RecordingHandler, ScriptedConnector, Step};

    const DELAY: Duration = Duration::from_secs(5);

    fn supervisor(
        steps: Vec<Step>,
    ) -> (
        ConnectionSupervisor,
        Arc<ScriptedConnector>,
        Arc<RecordingHandler>,
        EventSubscriber,
    ) {
        let connector = ScriptedConnector::new(steps);
        let handler = Arc::new(RecordingHandler::default());
        let bus = EventBus::new(64);
        let events = bus.subscribe();
        let config = ChannelConfig::default()
            .with_reconnect_delay(DELAY)
            .with_max_frame_len(64);
        let sup = ConnectionSupervisor::new(&config, connector.clone(), handler.clone(), bus)
            .expect("test runs inside a runtime");
        (sup, connector, handler, events)
    }

    #[tokio::test]
    async fn connect_success_emits_connected() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, connector, handler, mut events) = supervisor(vec![Step::Accept(local)]);

        assert_eq!(sup.state(), ConnectionState::Disconnected);
        sup.connect();
        assert_eq!(sup.state(), ConnectionState::Connecting);

        assert_eq!(events.recv_status().await, Some(StatusEvent::connected()));
        assert_eq!(sup.state(), ConnectionState::Connected);
        assert_eq!(sup.session_id(), 1);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(handler.connected_sessions(), vec![1]);
        assert!(sup.last_error().is_none());
    }

    #[tokio::test]
    async fn connect_is_idempotent_while_connecting_or_connected() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, connector, _handler, mut events) = supervisor(vec![Step::Accept(local)]);

        sup.connect();
        sup.connect();
        assert_eq!(events.recv_status().await, Some(StatusEvent::connected()));
        sup.connect();

        assert_eq!(connector.attempts(), 1);
        assert_eq!(sup.session_id(), 1);
    }

    #[tokio::test]
    async fn frames_reach_handler_across_chunk_boundaries() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (sup, _connector, handler, mut events) = supervisor(vec![Step::Accept(local)]);
        sup.connect();
        events.recv_status().await;

        remote.write_all(b"[\"/a\"]\n[\"/").await.unwrap();
        remote.write_all(b"b\"]\n").await.unwrap();

        handler.wait_for_frames(2).await;
        assert_eq!(handler.frame_texts(), vec!["[\"/a\"]", "[\"/b\"]"]);
        assert_eq!(sup.buffered_len(), 0);
    }

    #[tokio::test]
    async fn send_requires_connected_session() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (sup, _connector, _handler, mut events) = supervisor(vec![Step::Accept(local)]);

        assert!(matches!(
            sup.send(Bytes::from_static(b"early\n")),
            Err(ChannelError::NotConnected)
        ));

        sup.connect();
        events.recv_status().await;
        assert_eq!(
            sup.send(Bytes::from_static(b"report\n")).unwrap(),
            SendStatus::Queued
        );

        let mut buf = [0u8; 7];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"report\n");
    }

    #[tokio::test]
    async fn stale_session_data_is_discarded() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, _connector, handler, mut events) = supervisor(vec![Step::Accept(local)]);
        sup.connect();
        events.recv_status().await;

        let current = sup.session_id();
        assert!(sup.on_data(current, b"[\"/par"));
        assert_eq!(sup.buffered_len(), 6);

        assert!(!sup.on_data(current - 1, b"tial\"]\n"));
        assert_eq!(sup.buffered_len(), 6);
        assert!(handler.frame_texts().is_empty());

        assert!(sup.on_data(current, b"tial\"]\n"));
        assert_eq!(handler.frame_texts(), vec!["[\"/partial\"]"]);
    }

    #[tokio::test(start_paused = true)]
    async fn peer_close_reconnects_after_fixed_delay() {
        let (local, remote) = tokio::io::duplex(64);
        let (sup, connector, _handler, mut events) =
            supervisor(vec![Step::Accept(local), Step::Hang]);
        sup.connect();
        assert_eq!(events.recv_status().await, Some(StatusEvent::connected()));

        drop(remote);
        let status = events.recv_status().await.unwrap();
        assert!(!status.connected && !status.connecting);
        assert_eq!(status.message.as_deref(), Some("connection closed by peer"));
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        assert!(sup.reconnect_pending());

        tokio::time::sleep(DELAY - Duration::from_millis(100)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(sup.state(), ConnectionState::Disconnected);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(sup.state(), ConnectionState::Connecting);
        assert_eq!(sup.session_id(), 2);
        assert!(!sup.reconnect_pending());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_connects_retry_forever_one_timer_at_a_time() {
        let (sup, connector, _handler, mut events) = supervisor(Vec::new());
        sup.connect();

        for attempt in 1..=4 {
            let status = events.recv_status().await.unwrap();
            assert!(!status.connected);
            assert!(status.message.unwrap().contains("refused"));
            assert_eq!(connector.attempts(), attempt);
            assert!(sup.reconnect_pending());
            tokio::time::sleep(DELAY + Duration::from_millis(1)).await;
        }
        assert_eq!(connector.attempts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failure_reports_emit_once() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, connector, handler, mut events) =
            supervisor(vec![Step::Accept(local), Step::Hang]);
        sup.connect();
        events.recv_status().await;

        let session = sup.session_id();
        let reset = || std::io::Error::from(ErrorKind::ConnectionReset);
        sup.shared.report_failure(session, TransportError::Io(reset()));
        sup.shared.report_failure(session, TransportError::Io(reset()));
        sup.shared.report_failure(session, TransportError::PeerClosed);

        let disconnects = events
            .drain()
            .into_iter()
            .filter(|event| matches!(event, Event::Status(s) if !s.connected))
            .count();
        assert_eq!(disconnects, 1);
        assert_eq!(handler.disconnected_sessions(), vec![session]);
        assert!(sup.last_error().unwrap().contains("reset"));

        tokio::time::sleep(DELAY * 3).await;
        assert_eq!(connector.attempts(), 2);
        assert_eq!(sup.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn oversized_frame_drops_session() {
        let (local, mut remote) = tokio::io::duplex(256);
        let (sup, _connector, handler, mut events) = supervisor(vec![Step::Accept(local)]);
        sup.connect();
        events.recv_status().await;

        remote.write_all(&[b'x'; 100]).await.unwrap();
        let status = events.recv_status().await.unwrap();
        assert!(!status.connected);
        assert!(status.message.unwrap().contains("too large"));
        assert_eq!(sup.buffered_len(), 0);
        assert!(handler.frame_texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_reconnect_and_is_idempotent() {
        let (sup, connector, handler, mut events) = supervisor(Vec::new());
        sup.connect();
        events.recv_status().await;
        assert!(sup.reconnect_pending());

        sup.close();
        sup.close();
        assert_eq!(sup.state(), ConnectionState::Closing);
        assert!(!sup.reconnect_pending());

        let closed = events.drain();
        assert_eq!(
            closed,
            vec![Event::Status(StatusEvent::disconnected("connection closed"))]
        );

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(sup.state(), ConnectionState::Closing);
        // The refused attempt ended session 1; closing afterwards adds nothing.
        assert_eq!(handler.disconnected_sessions(), vec![1]);
    }

    #[tokio::test]
    async fn close_ends_connected_session() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, _connector, handler, mut events) = supervisor(vec![Step::Accept(local)]);
        sup.connect();
        events.recv_status().await;

        sup.close();
        assert_eq!(handler.disconnected_sessions(), vec![1]);
        assert!(matches!(
            sup.with_outbound(|session, _| session),
            Err(ChannelError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn with_outbound_sees_current_session() {
        let (local, mut remote) = tokio::io::duplex(64);
        let (sup, _connector, _handler, mut events) = supervisor(vec![Step::Accept(local)]);
        sup.connect();
        events.recv_status().await;

        let session = sup
            .with_outbound(|session, outbound| {
                assert_eq!(outbound.session(), session);
                outbound.try_send(Bytes::from_static(b"q\n")).unwrap();
                session
            })
            .unwrap();
        assert_eq!(session, sup.session_id());

        let mut buf = [0u8; 2];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"q\n");
    }

    #[tokio::test]
    async fn late_connect_result_after_close_is_ignored() {
        let (sup, _connector, handler, mut events) = supervisor(vec![Step::Hang]);
        sup.connect();
        let session = sup.session_id();
        sup.close();
        events.drain();

        let (local, _remote) = tokio::io::duplex(64);
        sup.shared
            .finish_attempt(session, Ok(BackendStream::new(local, "late")));

        assert_eq!(sup.state(), ConnectionState::Closing);
        assert!(handler.connected_sessions().is_empty());
        assert!(events.try_recv().is_none());
    }

    #[tokio::test]
    async fn connect_after_close_starts_new_session() {
        let (local, _remote) = tokio::io::duplex(64);
        let (sup, _connector, _handler, mut events) =
            supervisor(vec![Step::Hang, Step::Accept(local)]);
        sup.connect();
        sup.close();
        sup.connect();

        assert_eq!(
            events.recv_status().await,
            Some(StatusEvent::disconnected("connection closed"))
        );
        assert_eq!(events.recv_status().await, Some(StatusEvent::connected()));
        assert_eq!(sup.session_id(), 2);
    }
}
