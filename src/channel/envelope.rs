//! # Envelopes
//!
//! Wire shapes of the command channel.
//!
//! Client → gateway: `{"cmd": string, "reqId": number, "param": object}`
//! Gateway → client: `{"code": integer, "msg": string, "data": any}` plus the
//! echoed `cmd` and `reqId` when the reply answers a command.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Messages longer than this are abbreviated in trace logs
const LOG_ABBREVIATE_CHARS: usize = 128;

/// A decoded command request
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CommandEnvelope {
    /// Command name
    pub cmd: String,

    /// Caller-chosen correlation id, echoed back verbatim
    #[serde(rename = "reqId")]
    pub req_id: Number,

    /// Handler-specific parameters
    #[serde(default)]
    pub param: Map<String, Value>,

    /// Optional per-message token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl CommandEnvelope {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// A reply or push payload
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResultEnvelope {
    /// 0 on success, nonzero on failure
    pub code: i32,

    pub msg: String,

    #[serde(default)]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,

    #[serde(default, rename = "reqId", skip_serializing_if = "Option::is_none")]
    pub req_id: Option<Number>,
}

impl ResultEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            msg: String::new(),
            data: Some(data),
            cmd: None,
            req_id: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            code: 0,
            msg: String::new(),
            data: None,
            cmd: None,
            req_id: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            code: -1,
            msg: msg.into(),
            data: None,
            cmd: None,
            req_id: None,
        }
    }

    pub fn bad_request() -> Self {
        Self::error("Bad Request")
    }

    pub fn unknown_command(name: &str) -> Self {
        Self::error(format!("can not find command [{}]", name))
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Tag this reply with the command it answers
    pub fn answering(mut self, envelope: &CommandEnvelope) -> Self {
        self.cmd = Some(envelope.cmd.clone());
        self.req_id = Some(envelope.req_id.clone());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"code":-1,"msg":"Internal Error","data":null}"#.to_string())
    }
}

/// Abbreviate a raw message for logging
pub fn abbreviate(text: &str) -> std::borrow::Cow<'_, str> {
    match text.char_indices().nth(LOG_ABBREVIATE_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]).into(),
        None => text.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_command() {
        let envelope =
            CommandEnvelope::decode(r#"{"cmd":"ping","reqId":1,"param":{"a":1}}"#).unwrap();
        assert_eq!(envelope.cmd, "ping");
        assert_eq!(envelope.req_id, Number::from(1));
        assert_eq!(envelope.param["a"], json!(1));
        assert!(envelope.token.is_none());
    }

    #[test]
    fn test_decode_fractional_req_id() {
        let envelope = CommandEnvelope::decode(r#"{"cmd":"x","reqId":1.5,"param":{}}"#).unwrap();
        assert_eq!(envelope.req_id.as_f64(), Some(1.5));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(CommandEnvelope::decode("{not json").is_err());
        assert!(CommandEnvelope::decode(r#"{"reqId":1}"#).is_err());
        assert!(CommandEnvelope::decode(r#"{"cmd":"ping","reqId":"one"}"#).is_err());
        assert!(CommandEnvelope::decode(r#"{"cmd":"ping","reqId":1,"param":[]}"#).is_err());
    }

    #[test]
    fn test_reply_echoes_request_id() {
        let envelope = CommandEnvelope::decode(r#"{"cmd":"ping","reqId":7,"param":{}}"#).unwrap();
        let reply = ResultEnvelope::ok(json!({"pong": true})).answering(&envelope);

        let value: Value = serde_json::from_str(&reply.to_json()).unwrap();
        assert_eq!(value["code"], json!(0));
        assert_eq!(value["reqId"], json!(7));
        assert_eq!(value["cmd"], json!("ping"));
    }

    #[test]
    fn test_bad_request_shape() {
        let value: Value = serde_json::from_str(&ResultEnvelope::bad_request().to_json()).unwrap();
        assert_eq!(value, json!({"code": -1, "msg": "Bad Request", "data": null}));
    }

    #[test]
    fn test_unknown_command_message() {
        assert_eq!(
            ResultEnvelope::unknown_command("nope").msg,
            "can not find command [nope]"
        );
    }

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short"), "short");
        let long = "é".repeat(200);
        let short = abbreviate(&long);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), LOG_ABBREVIATE_CHARS + 3);
    }
}
