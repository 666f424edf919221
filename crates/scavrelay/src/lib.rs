//! Live relay between interactive clients and workflow workers
//!
//! A client connects by workflow name. The engine looks up the worker's
//! address, dials its tunnel and, once the client is attached, copies
//! frames both ways until either side goes away.

mod engine;
mod frame;
mod session;
mod tunnel;

pub use engine::{PendingTunnel, RelayEngine};
pub use frame::{CloseReason, Frame, NORMAL_CLOSURE};
pub use session::{PumpEnd, RelaySession, SessionReport, SessionState, Side, CLOSE_TIMEOUT};
pub use tunnel::{dial_worker, tunnel_url, websocket_url, FrameSink, FrameSource, WorkerSink, TUNNEL_PATH};
