//! Launcher-side channel to a line-oriented search backend.
//!
//! querylink keeps one persistent TCP connection to the search backend, sends
//! newline-terminated queries, splits newline-terminated JSON result sets out
//! of the byte stream, and reconnects on its own when the backend goes away.
//!
//! # Crate Structure
//!
//! - [`transport`]: backend connectors and transport errors
//! - [`frame`]: newline framing and the receive buffer
//! - [`results`]: tolerant decoding of result frames
//! - [`channel`]: connection supervisor, query channel, and event bus

/// Re-export transport types.
pub mod transport {
    pub use querylink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use querylink_frame::*;
}

/// Re-export result decoding types.
pub mod results {
    pub use querylink_results::*;
}

/// Re-export channel types.
pub mod channel {
    pub use querylink_channel::*;
}
