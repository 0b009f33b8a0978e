//! Supervised query channel to the search backend.
//!
//! This is the layer the UI talks to. Submit a query, cancel it, and
//! subscribe to a single ordered stream of typed events. Connection loss is
//! never an error here: it becomes a status event and a scheduled reconnect.

pub mod config;
pub mod error;
pub mod event;
pub mod query;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use config::{
    ChannelConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_HOST, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_PORT,
    DEFAULT_RECONNECT_DELAY,
};
pub use error::{ChannelError, Result};
pub use event::{Event, EventBus, EventSubscriber, ResultEvent, StatusEvent};
pub use query::{PendingQuery, QueryChannel};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, Outbound, SendStatus, SessionHandler, SessionId,
};
