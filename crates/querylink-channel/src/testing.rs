//! In-memory connectors and handlers for exercising the channel without a
//! real backend.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use querylink_frame::Frame;
use querylink_transport::{BackendStream, ConnectFuture, Connector, TransportError};
use tokio::io::DuplexStream;
use tokio::sync::watch;

use crate::supervisor::{Outbound, SessionHandler, SessionId};

/// What the next connect attempt does.
pub(crate) enum Step {
    /// Succeed with this end of a duplex pipe.
    Accept(DuplexStream),
    /// Fail as if the port were closed.
    Refuse,
    /// Never complete.
    Hang,
}

/// Connector that plays back a fixed script, refusing once it runs out.
pub(crate) struct ScriptedConnector {
    steps: Mutex<VecDeque<Step>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> ConnectFuture {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Refuse);
        Box::pin(async move {
            match step {
                Step::Accept(stream) => Ok(BackendStream::new(stream, "duplex")),
                Step::Refuse => Err(TransportError::Connect {
                    addr: "scripted".into(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                }),
                Step::Hang => std::future::pending().await,
            }
        })
    }

    fn describe(&self) -> String {
        "scripted".into()
    }
}

/// Handler that remembers everything it was given.
pub(crate) struct RecordingHandler {
    connected: Mutex<Vec<SessionId>>,
    disconnected: Mutex<Vec<SessionId>>,
    frames: Mutex<Vec<(SessionId, Frame)>>,
    frame_count: watch::Sender<usize>,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self {
            connected: Mutex::default(),
            disconnected: Mutex::default(),
            frames: Mutex::default(),
            frame_count: watch::channel(0).0,
        }
    }
}

impl RecordingHandler {
    pub(crate) fn connected_sessions(&self) -> Vec<SessionId> {
        self.connected.lock().unwrap().clone()
    }

    pub(crate) fn disconnected_sessions(&self) -> Vec<SessionId> {
        self.disconnected.lock().unwrap().clone()
    }

    pub(crate) fn frame_texts(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.text().into_owned())
            .collect()
    }

    pub(crate) async fn wait_for_frames(&self, count: usize) {
        let mut rx = self.frame_count.subscribe();
        rx.wait_for(|seen| *seen >= count).await.unwrap();
    }
}

impl SessionHandler for RecordingHandler {
    fn on_connected(&self, session: SessionId, _outbound: &Outbound) {
        self.connected.lock().unwrap().push(session);
    }

    fn on_frame(&self, session: SessionId, frame: Frame) {
        let mut frames = self.frames.lock().unwrap();
        frames.push((session, frame));
        self.frame_count.send_replace(frames.len());
    }

    fn on_disconnected(&self, session: SessionId) {
        self.disconnected.lock().unwrap().push(session);
    }
}
