use bytes::Bytes;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Close code for a session that ended normally
pub const NORMAL_CLOSURE: u16 = 1000;

/// One WebSocket message passing through the relay.
///
/// Both peers speak WebSocket but through different libraries, so the
/// relay works on this neutral form and each side converts at its edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<CloseReason>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub description: String,
}

impl Frame {
    pub fn normal_close() -> Self {
        Frame::Close(Some(CloseReason {
            code: NORMAL_CLOSURE,
            description: String::new(),
        }))
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Frame::Close(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close(_) => "close",
        }
    }

    /// Convert a tungstenite message. Raw frames never surface from a
    /// read, so they map to `None`.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Frame::Text(text)),
            Message::Binary(data) => Some(Frame::Binary(Bytes::from(data))),
            Message::Ping(data) => Some(Frame::Ping(Bytes::from(data))),
            Message::Pong(data) => Some(Frame::Pong(Bytes::from(data))),
            Message::Close(close) => Some(Frame::Close(close.map(|c| CloseReason {
                code: u16::from(c.code),
                description: c.reason.into_owned(),
            }))),
            Message::Frame(_) => None,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(data) => Message::Binary(data.to_vec()),
            Frame::Ping(data) => Message::Ping(data.to_vec()),
            Frame::Pong(data) => Message::Pong(data.to_vec()),
            Frame::Close(reason) => Message::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.description.into(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_code_survives_conversion() {
        let message = Frame::normal_close().into_message();
        match Frame::from_message(message) {
            Some(Frame::Close(Some(reason))) => assert_eq!(reason.code, NORMAL_CLOSURE),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_binary_payload_is_preserved() {
        let frame = Frame::from_message(Message::Binary(vec![0, 159, 146, 150])).unwrap();
        assert_eq!(frame, Frame::Binary(Bytes::from_static(&[0, 159, 146, 150])));
        assert_eq!(frame.kind(), "binary");
    }
}
