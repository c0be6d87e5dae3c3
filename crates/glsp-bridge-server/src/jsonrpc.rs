//! JSON-RPC 2.0 messages with `Content-Length` framing.
//!
//! The GLSP server speaks the same base protocol as a language server: every
//! message is a header block followed by a UTF-8 JSON body.

use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Error code for methods the bridge does not serve.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn error(id: u64, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A decoded message from the server.
#[derive(Debug)]
pub enum IncomingMessage {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Classify a message body by the members it carries.
    pub fn parse(content: &str) -> ServerResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        let has_method = value.get("method").is_some();

        let message = match (has_id, has_method) {
            (true, true) => Self::Request(serde_json::from_value(value)?),
            (true, false) => Self::Response(serde_json::from_value(value)?),
            (false, true) => Self::Notification(serde_json::from_value(value)?),
            (false, false) => {
                return Err(ServerError::protocol_error(
                    "Message has neither id nor method",
                ))
            }
        };
        Ok(message)
    }
}

/// Write one framed message.
pub async fn write_message<W>(writer: &mut W, content: &str) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let message = format!("Content-Length: {}\r\n\r\n{}", content.len(), content);
    trace!(message = %content, "Sending GLSP message");

    writer.write_all(message.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Serialize and write one framed message.
pub async fn write_json<W, T>(writer: &mut W, message: &T) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    write_message(writer, &serde_json::to_string(message)?).await
}

/// Read one framed message body.
///
/// Returns `Ok(None)` when the stream ends cleanly between messages.
pub async fn read_message<R>(reader: &mut R) -> ServerResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    // Read headers
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            if saw_header {
                return Err(ServerError::connection_failed(
                    "Server closed connection mid-message",
                ));
            }
            return Ok(None);
        }

        let line = line.trim();
        if line.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;

        if let Some(len_str) = line.strip_prefix("Content-Length: ") {
            content_length = Some(
                len_str
                    .parse()
                    .map_err(|_| ServerError::protocol_error("Invalid Content-Length"))?,
            );
        }
    }

    let content_length = content_length
        .ok_or_else(|| ServerError::protocol_error("Missing Content-Length header"))?;

    // Read content
    let mut content = vec![0u8; content_length];
    reader.read_exact(&mut content).await?;

    let content = String::from_utf8(content)
        .map_err(|e| ServerError::protocol_error(format!("Invalid UTF-8: {e}")))?;

    trace!(content = %content, "Received GLSP message");
    Ok(Some(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_framing_reads_what_was_written() {
        let mut buffer = Vec::new();
        let request = JsonRpcRequest::new(1, "initialize", Some(json!({"applicationId": "x"})));
        write_json(&mut buffer, &request).await.unwrap();
        write_json(&mut buffer, &JsonRpcNotification::new("shutdown", None))
            .await
            .unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("Content-Length: "));

        let mut reader = BufReader::new(buffer.as_slice());
        let first = read_message(&mut reader).await.unwrap().unwrap();
        let second = read_message(&mut reader).await.unwrap().unwrap();
        assert!(read_message(&mut reader).await.unwrap().is_none());

        assert!(matches!(
            IncomingMessage::parse(&first).unwrap(),
            IncomingMessage::Request(r) if r.method == "initialize" && r.id == 1
        ));
        assert!(matches!(
            IncomingMessage::parse(&second).unwrap(),
            IncomingMessage::Notification(n) if n.method == "shutdown"
        ));
    }

    #[tokio::test]
    async fn test_multibyte_body_uses_byte_length() {
        let mut buffer = Vec::new();
        write_message(&mut buffer, r#"{"label":"größe"}"#).await.unwrap();

        let mut reader = BufReader::new(buffer.as_slice());
        let body = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(body, r#"{"label":"größe"}"#);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let input = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(input.as_slice());
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ServerError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn test_truncated_headers() {
        let input = b"Content-Length: 10\r\n".to_vec();
        let mut reader = BufReader::new(input.as_slice());
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, ServerError::ConnectionFailed(_)));
    }

    #[test]
    fn test_parse_classifies_messages() {
        let response = IncomingMessage::parse(r#"{"jsonrpc":"2.0","id":3,"result":null}"#).unwrap();
        assert!(matches!(response, IncomingMessage::Response(r) if r.id == 3));

        let error = IncomingMessage::parse(
            r#"{"jsonrpc":"2.0","id":4,"error":{"code":-32600,"message":"bad"}}"#,
        )
        .unwrap();
        match error {
            IncomingMessage::Response(r) => assert_eq!(r.error.unwrap().message, "bad"),
            other => panic!("unexpected {:?}", other),
        }

        assert!(IncomingMessage::parse(r#"{"jsonrpc":"2.0"}"#).is_err());
        assert!(IncomingMessage::parse("not json").is_err());
    }
}
