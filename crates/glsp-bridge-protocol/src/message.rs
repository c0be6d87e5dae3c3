//! Envelopes wrapping actions on their way between webview, router and server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Action;

/// An action addressed to (or coming from) one diagram client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage {
    pub client_id: String,
    pub action: Value,
    /// Set on envelopes the editor side produced itself.
    #[serde(
        rename = "__localDispatch",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub local_dispatch: bool,
}

impl ActionMessage {
    pub fn new(client_id: impl Into<String>, action: Value) -> Self {
        Self {
            client_id: client_id.into(),
            action,
            local_dispatch: false,
        }
    }

    /// Envelope for an action originating in the editor itself.
    pub fn local(client_id: impl Into<String>, action: &Action) -> Self {
        Self {
            client_id: client_id.into(),
            action: action.to_value(),
            local_dispatch: true,
        }
    }

    /// Read an envelope from a raw message. Returns `None` when the message is
    /// not an action message.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !is_action_message(value) {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The wire `kind` of the wrapped action.
    pub fn kind(&self) -> &str {
        self.action
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The wrapped action, if it is one the bridge knows.
    pub fn typed_action(&self) -> Option<Action> {
        Action::parse(&self.action)
    }
}

/// True for objects with a string `clientId` and an `action` object whose
/// `kind` is a string.
pub fn is_action_message(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    let has_client = object.get("clientId").map(Value::is_string).unwrap_or(false);
    let has_kind = object
        .get("action")
        .and_then(Value::as_object)
        .and_then(|action| action.get("kind"))
        .map(Value::is_string)
        .unwrap_or(false);
    has_client && has_kind
}

/// First message posted to a freshly created diagram webview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramIdentifier {
    pub diagram_type: String,
    pub uri: String,
    pub client_id: String,
}

/// Sent by the webview once its scripts can receive messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebviewReadyMessage {
    pub ready_message: String,
}

impl WebviewReadyMessage {
    pub fn is(value: &Value) -> bool {
        value
            .get("readyMessage")
            .map(Value::is_string)
            .unwrap_or(false)
    }
}
