use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use querylink_frame::{encode_query, Frame};
use querylink_results::{decode_bytes, ResultSet};
use querylink_transport::Connector;
use tracing::{debug, trace, warn};

use crate::config::ChannelConfig;
use crate::error::Result;
use crate::event::{EventBus, EventSubscriber, ResultEvent, StatusEvent};
use crate::supervisor::{
    ConnectionState, ConnectionSupervisor, Outbound, SendStatus, SessionHandler, SessionId,
};

/// The single query awaiting results.
///
/// Submitting a new query replaces it; a result frame or `cancel()` clears
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    generation: u64,
    query: String,
    frame: Bytes,
    sent: bool,
}

impl PendingQuery {
    /// Generation number assigned at submission.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The query text as submitted.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Whether the query has been written to the current session.
    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

#[derive(Debug, Default)]
struct Pending {
    last_generation: u64,
    current: Option<PendingQuery>,
    /// Generations written to the current session, oldest first. The backend
    /// answers every query line with one result line, in order.
    in_flight: VecDeque<u64>,
}

/// Query bookkeeping shared with the supervisor's session callbacks.
///
/// The supervisor invokes the callbacks with its own lock held, so the
/// pending lock always nests inside it. `QueryChannel` never calls into the
/// supervisor while holding the pending lock.
struct Queries {
    pending: Mutex<Pending>,
    events: EventBus,
}

impl Queries {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `query` the pending query and return its generation.
    fn replace(&self, query: &str, frame: Bytes) -> u64 {
        let mut pending = self.lock();
        pending.last_generation += 1;
        let generation = pending.last_generation;
        if let Some(previous) = pending.current.replace(PendingQuery {
            generation,
            query: query.to_string(),
            frame,
            sent: false,
        }) {
            debug!(
                superseded = previous.generation,
                generation, "pending query replaced"
            );
        }
        generation
    }

    fn clear(&self) -> Option<PendingQuery> {
        self.lock().current.take()
    }

    /// Write the pending query to `session` unless it already went out.
    ///
    /// Returns whether the pending query is now on the wire. A query that
    /// could not be queued stays unsent and goes out with the next session.
    fn send_pending(&self, session: SessionId, outbound: &Outbound) -> bool {
        let mut guard = self.lock();
        let pending = &mut *guard;
        let Some(query) = pending.current.as_mut() else {
            return false;
        };
        if query.sent {
            return true;
        }

        match outbound.try_send(query.frame.clone()) {
            Ok(SendStatus::Queued) => {
                query.sent = true;
                pending.in_flight.push_back(query.generation);
                trace!(
                    session,
                    generation = query.generation,
                    in_flight = pending.in_flight.len(),
                    "query written"
                );
                true
            }
            Ok(SendStatus::Dropped) => {
                warn!(
                    session,
                    generation = query.generation,
                    "query dropped; outbound queue full"
                );
                false
            }
            Err(err) => {
                debug!(
                    session,
                    generation = query.generation,
                    error = %err,
                    "could not send query"
                );
                false
            }
        }
    }
}

impl SessionHandler for Queries {
    fn on_connected(&self, session: SessionId, outbound: &Outbound) {
        self.lock().in_flight.clear();
        if self.send_pending(session, outbound) {
            debug!(session, "sent query held while disconnected");
        }
    }

    fn on_frame(&self, session: SessionId, frame: Frame) {
        let results = decode_bytes(&frame.payload);
        let mut pending = self.lock();
        let Some(answered) = pending.in_flight.pop_front() else {
            trace!(
                session,
                bytes = frame.wire_size(),
                "discarding unsolicited result frame"
            );
            return;
        };

        match pending.current.take() {
            Some(query) if query.generation == answered => {
                debug!(
                    session,
                    generation = answered,
                    count = results.len(),
                    "results received"
                );
                self.events.results(ResultEvent {
                    generation: answered,
                    query: query.query,
                    results,
                });
            }
            other => {
                pending.current = other;
                debug!(
                    session,
                    generation = answered,
                    "discarding result for superseded or cancelled query"
                );
            }
        }
    }

    fn on_disconnected(&self, session: SessionId) {
        let mut pending = self.lock();
        pending.in_flight.clear();
        if let Some(query) = pending.current.as_mut().filter(|query| query.sent) {
            query.sent = false;
            debug!(
                session,
                generation = query.generation,
                "session ended before results; query will be resent"
            );
        }
    }
}

/// Query channel the UI layer owns.
///
/// Holds at most one pending query and reports everything through one
/// ordered event stream. Must be created inside a tokio runtime; dropping
/// it closes the connection.
pub struct QueryChannel {
    supervisor: ConnectionSupervisor,
    queries: Arc<Queries>,
    cancel_frame: Option<Bytes>,
}

impl QueryChannel {
    /// Create a channel that reaches the backend through `connector`.
    ///
    /// Nothing is connected until [`connect`](Self::connect) or the first
    /// [`submit`](Self::submit).
    pub fn new(config: ChannelConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let cancel_frame = config
            .cancel_frame
            .as_deref()
            .map(encode_query)
            .transpose()?;
        let events = EventBus::new(config.event_capacity);
        let queries = Arc::new(Queries {
            pending: Mutex::default(),
            events: events.clone(),
        });
        let supervisor = ConnectionSupervisor::new(&config, connector, queries.clone(), events)?;
        Ok(Self {
            supervisor,
            queries,
            cancel_frame,
        })
    }

    /// Create a channel to the configured TCP backend.
    pub fn tcp(config: ChannelConfig) -> Result<Self> {
        let connector = Arc::new(config.tcp_connector());
        Self::new(config, connector)
    }

    /// Submit a query, replacing any pending one.
    ///
    /// Returns the query's generation. When no session is connected the
    /// query is held, a connect is started, and an empty result set is
    /// emitted right away so the UI can clear stale results. The held query
    /// is sent as soon as a session comes up.
    pub fn submit(&self, query: &str) -> Result<u64> {
        let frame = encode_query(query)?;
        let generation = self.queries.replace(query, frame);

        let queries = &self.queries;
        if let Ok(sent) = self
            .supervisor
            .with_outbound(|session, outbound| queries.send_pending(session, outbound))
        {
            if sent {
                debug!(generation, "query sent");
            } else {
                debug!(generation, "query stays pending until the next session");
            }
            return Ok(generation);
        }

        debug!(generation, "query held until connected");
        let events = &self.queries.events;
        events.status(StatusEvent::connecting());
        events.results(ResultEvent {
            generation,
            query: query.to_string(),
            results: ResultSet::empty(),
        });
        self.supervisor.connect();
        Ok(generation)
    }

    /// Drop the pending query so any late result for it is discarded.
    ///
    /// The backend still owes an answer for a query already written; that
    /// answer is matched to the cancelled generation and dropped.
    ///
    /// Returns the generation that was cancelled, if any.
    pub fn cancel(&self) -> Option<u64> {
        let cancelled = self.queries.clear();
        if let Some(query) = &cancelled {
            debug!(generation = query.generation, "query cancelled");
        }

        if let Some(frame) = &self.cancel_frame {
            if self.supervisor.state() == ConnectionState::Connected {
                if let Err(err) = self.supervisor.send(frame.clone()) {
                    debug!(error = %err, "cancel frame not sent");
                }
            }
        }
        cancelled.map(|query| query.generation)
    }

    /// Subscribe to status and result events emitted from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        self.queries.events.subscribe()
    }

    /// Connect without submitting anything.
    pub fn connect(&self) {
        self.supervisor.connect();
    }

    /// Close the connection and stop reconnecting.
    pub fn close(&self) {
        self.supervisor.close();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// The query awaiting results, if any.
    pub fn pending(&self) -> Option<PendingQuery> {
        self.queries.lock().current.clone()
    }

    /// Generation of the query awaiting results, if any.
    pub fn pending_generation(&self) -> Option<u64> {
        self.queries.lock().current.as_ref().map(|query| query.generation)
    }

    /// The underlying supervisor.
    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }
}

impl std::fmt::Debug for QueryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryChannel")
            .field("supervisor", &self.supervisor)
            .field("pending", &self.pending_generation())
            .finish()
    }
}
