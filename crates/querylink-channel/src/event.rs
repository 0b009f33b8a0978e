use querylink_results::ResultSet;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

/// Connection status report for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    /// A session is connected.
    pub connected: bool,
    /// A connect attempt is underway or has just been requested.
    pub connecting: bool,
    /// Failure or close reason, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusEvent {
    /// The session is up.
    pub fn connected() -> Self {
        Self {
            connected: true,
            connecting: false,
            message: None,
        }
    }

    /// A connect attempt has been requested.
    pub fn connecting() -> Self {
        Self {
            connected: false,
            connecting: true,
            message: None,
        }
    }

    /// The session is down, with the reason.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self {
            connected: false,
            connecting: false,
            message: Some(message.into()),
        }
    }
}

/// Result set for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEvent {
    /// Generation of the submission these results answer.
    pub generation: u64,
    /// The submitted query text.
    pub query: String,
    /// Paths returned by the backend, possibly empty.
    pub results: ResultSet,
}

/// Everything the channel reports to its subscribers, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Status(StatusEvent),
    Results(ResultEvent),
}

/// Fan-out of channel events to any number of subscribers.
///
/// Emitting never blocks and never fails: with no subscribers the event is
/// simply dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver an event to every current subscriber.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Shorthand for emitting a status event.
    pub fn status(&self, status: StatusEvent) {
        self.emit(Event::Status(status));
    }

    /// Shorthand for emitting a result event.
    pub fn results(&self, results: ResultEvent) {
        self.emit(Event::Results(results));
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's view of the event stream.
#[derive(Debug)]
pub struct EventSubscriber {
    rx: broadcast::Receiver<Event>,
}

impl EventSubscriber {
    /// Next event, or `None` once the channel is gone.
    ///
    /// A subscriber that falls behind skips the oldest events and keeps going.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event subscriber lagged; oldest events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next status event, skipping result events.
    pub async fn recv_status(&mut self) -> Option<StatusEvent> {
        loop {
            if let Event::Status(status) = self.recv().await? {
                return Some(status);
            }
        }
    }

    /// Next result event, skipping status events.
    pub async fn recv_results(&mut self) -> Option<ResultEvent> {
        loop {
            if let Event::Results(results) = self.recv().await? {
                return Some(results);
            }
        }
    }

    /// Next already-buffered event, without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "event subscriber lagged; oldest events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drain every already-buffered event.
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
