use crate::frame::Frame;
use async_trait::async_trait;
use futures::stream::{LocalBoxStream, SplitSink};
use futures::{SinkExt, StreamExt};
use scavcore::RelayError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

/// Path the worker serves its tunnel on
pub const TUNNEL_PATH: &str = "/ws";

/// Where the relay writes frames for one peer
#[async_trait(?Send)]
pub trait FrameSink {
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError>;

    /// Flush and shut the write side. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), RelayError>;
}

/// Frames read from one peer
pub type FrameSource<'a> = LocalBoxStream<'a, Result<Frame, RelayError>>;

/// Turn a worker base address into its tunnel URL.
///
/// `http` becomes `ws`, `https` becomes `wss` and any other scheme falls
/// back to `ws`. The tunnel path is appended to whatever path the address
/// already has.
pub fn tunnel_url(address: &str) -> Result<Url, RelayError> {
    websocket_url(address, TUNNEL_PATH)
}

/// WebSocket URL for `path` under an HTTP-style base address
pub fn websocket_url(address: &str, path: &str) -> Result<Url, RelayError> {
    let address = address.trim();
    let (scheme, rest) = address.split_once("://").unwrap_or(("", address));
    let ws_scheme = if scheme.eq_ignore_ascii_case("https") {
        "wss"
    } else {
        "ws"
    };

    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(RelayError::InvalidAddress {
            address: address.to_string(),
            reason: "missing host".to_string(),
        });
    }

    let candidate = format!("{}://{}/{}", ws_scheme, rest, path.trim_start_matches('/'));
    Url::parse(&candidate).map_err(|e| RelayError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

type WorkerStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a dialed worker tunnel
pub struct WorkerSink {
    inner: SplitSink<WorkerStream, Message>,
}

#[async_trait(?Send)]
impl FrameSink for WorkerSink {
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError> {
        self.inner
            .send(frame.into_message())
            .await
            .map_err(|e| RelayError::Socket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.inner
            .close()
            .await
            .map_err(|e| RelayError::Socket(e.to_string()))
    }
}

/// Open the worker's tunnel
pub async fn dial_worker(url: &Url) -> Result<(FrameSource<'static>, WorkerSink), RelayError> {
    let (stream, response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| RelayError::Dial {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    tracing::debug!(url = %url, status = %response.status(), "Worker tunnel open");

    let (sink, stream) = stream.split();
    let source = stream
        .filter_map(|message| async move {
            match message {
                Ok(message) => Frame::from_message(message).map(Ok),
                Err(e) => Some(Err(RelayError::Socket(e.to_string()))),
            }
        })
        .boxed_local();

    Ok((source, WorkerSink { inner: sink }))
}
