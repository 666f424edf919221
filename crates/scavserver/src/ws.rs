use actix_ws::{AggregatedMessage, CloseCode, CloseReason, MessageStream, Session};
use async_trait::async_trait;
use futures::StreamExt;
use scavcore::RelayError;
use scavrelay::{Frame, FrameSink, FrameSource};

/// Largest message accepted from a client after reassembly
const MAX_CLIENT_MESSAGE: usize = 1024 * 1024;

/// Frames read from an upgraded client connection. Fragmented messages
/// are reassembled before they reach the relay.
pub fn client_source(stream: MessageStream) -> FrameSource<'static> {
    stream
        .aggregate_continuations()
        .max_continuation_size(MAX_CLIENT_MESSAGE)
        .map(|message| match message {
            Ok(AggregatedMessage::Text(text)) => Ok(Frame::Text(text.to_string())),
            Ok(AggregatedMessage::Binary(data)) => Ok(Frame::Binary(data)),
            Ok(AggregatedMessage::Ping(data)) => Ok(Frame::Ping(data)),
            Ok(AggregatedMessage::Pong(data)) => Ok(Frame::Pong(data)),
            Ok(AggregatedMessage::Close(reason)) => Ok(Frame::Close(reason.map(|r| {
                scavrelay::CloseReason {
                    code: u16::from(r.code),
                    description: r.description.unwrap_or_default(),
                }
            }))),
            Err(e) => Err(RelayError::Socket(e.to_string())),
        })
        .boxed_local()
}

/// Write half of an upgraded client connection
pub struct ClientSink {
    session: Option<Session>,
}

impl ClientSink {
    pub fn new(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn session(&mut self) -> Result<&mut Session, RelayError> {
        self.session
            .as_mut()
            .ok_or_else(|| RelayError::Socket("client session already closed".to_string()))
    }
}

fn closed(_: actix_ws::Closed) -> RelayError {
    RelayError::Socket("client session closed".to_string())
}

#[async_trait(?Send)]
impl FrameSink for ClientSink {
    async fn send(&mut self, frame: Frame) -> Result<(), RelayError> {
        match frame {
            Frame::Text(text) => self.session()?.text(text).await.map_err(closed),
            Frame::Binary(data) => self.session()?.binary(data).await.map_err(closed),
            Frame::Ping(data) => self.session()?.ping(&data).await.map_err(closed),
            Frame::Pong(data) => self.session()?.pong(&data).await.map_err(closed),
            Frame::Close(reason) => {
                let session = self
                    .session
                    .take()
                    .ok_or_else(|| RelayError::Socket("client session already closed".to_string()))?;
                let reason = reason.map(|r| CloseReason {
                    code: CloseCode::from(r.code),
                    description: Some(r.description).filter(|d| !d.is_empty()),
                });
                session.close(reason).await.map_err(closed)
            }
        }
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        match self.session.take() {
            Some(session) => session.close(None).await.map_err(closed),
            None => Ok(()),
        }
    }
}
