//! WebSocket frames
//!
//! Clients send JSON text frames tagged by `command`; the server answers with
//! `CONNECTED` once, `RECEIPT` per accepted subscription change, `MESSAGE`
//! per delivered payload and `ERROR` for rejected frames.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    Subscribe { id: String, destination: String },
    Unsubscribe { id: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    Connected {
        session: String,
        user: String,
    },
    Receipt {
        #[serde(rename = "receiptId")]
        receipt_id: String,
    },
    Message {
        subscription: String,
        destination: String,
        body: Box<RawValue>,
    },
    Error {
        message: String,
    },
}

impl ServerFrame {
    /// Wrap an already-encoded JSON payload.
    pub fn message(subscription: &str, destination: &str, payload: String) -> Option<Self> {
        RawValue::from_string(payload).ok().map(|body| ServerFrame::Message {
            subscription: subscription.to_string(),
            destination: destination.to_string(),
            body,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"command":"ERROR","message":"failed to encode frame"}"#.to_string()
        })
    }
}
