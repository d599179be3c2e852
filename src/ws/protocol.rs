//! Defines the control-message protocol between the browser client and the bridge.
//!
//! Text frames from the client carry a JSON object with a `type` field. The
//! recognized kinds are a closed set; anything else is forwarded to the
//! upstream connection verbatim so new upstream commands keep working without
//! a bridge change.

use super::upstream::UpstreamCommand;
use serde_json::Value;

/// A control frame received from the browser client.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    /// Commit the input audio buffer and request a response.
    Commit,
    /// Cancel any in-flight response generation (barge-in).
    Interrupt,
    /// A client-driven session update (language/voice changes). The carried
    /// object is forwarded to upstream unvalidated.
    SessionUpdate(Value),
    /// Any other well-formed JSON payload, forwarded unmodified.
    Passthrough(Value),
}

/// One payload destined for the upstream connection.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    Command(UpstreamCommand),
    Raw(Value),
}

impl UpstreamPayload {
    /// Serializes the payload to its upstream wire form.
    pub fn to_wire(&self) -> serde_json::Result<String> {
        match self {
            UpstreamPayload::Command(command) => serde_json::to_string(command),
            UpstreamPayload::Raw(value) => serde_json::to_string(value),
        }
    }
}

/// Parses an inbound text frame into a control message.
///
/// Returns `None` when the frame is not valid JSON; such frames are dropped
/// silently and the session continues unaffected.
pub fn parse_control(text: &str) -> Option<ControlMessage> {
    let value: Value = serde_json::from_str(text).ok()?;
    let kind = value.get("type").and_then(Value::as_str);
    Some(match kind {
        Some("commit") => ControlMessage::Commit,
        Some("interrupt") => ControlMessage::Interrupt,
        Some("session.update") => {
            let session = value
                .get("session")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            ControlMessage::SessionUpdate(session)
        }
        _ => ControlMessage::Passthrough(value),
    })
}

impl ControlMessage {
    /// Translates a control message into the upstream payload sequence it
    /// maps to. `Commit` expands to exactly two payloads, in order.
    pub fn into_upstream(self) -> Vec<UpstreamPayload> {
        match self {
            ControlMessage::Commit => vec![
                UpstreamPayload::Command(UpstreamCommand::InputAudioBufferCommit),
                UpstreamPayload::Command(UpstreamCommand::ResponseCreate),
            ],
            ControlMessage::Interrupt => {
                vec![UpstreamPayload::Command(UpstreamCommand::ResponseCancel)]
            }
            ControlMessage::SessionUpdate(session) => {
                vec![UpstreamPayload::Command(UpstreamCommand::SessionUpdate {
                    session,
                })]
            }
            ControlMessage::Passthrough(value) => vec![UpstreamPayload::Raw(value)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_recognized_kinds() {
        assert_eq!(
            parse_control(r#"{"type":"commit"}"#),
            Some(ControlMessage::Commit)
        );
        assert_eq!(
            parse_control(r#"{"type":"interrupt"}"#),
            Some(ControlMessage::Interrupt)
        );
        assert_eq!(
            parse_control(r#"{"type":"session.update","session":{"voice":"Kore"}}"#),
            Some(ControlMessage::SessionUpdate(json!({"voice": "Kore"})))
        );
    }

    #[test]
    fn test_parse_session_update_without_session_defaults_to_empty() {
        assert_eq!(
            parse_control(r#"{"type":"session.update"}"#),
            Some(ControlMessage::SessionUpdate(json!({})))
        );
    }

    #[test]
    fn test_parse_unknown_kind_is_passthrough() {
        let raw = json!({"type": "conversation.item.create", "item": {"id": 7}});
        assert_eq!(
            parse_control(&raw.to_string()),
            Some(ControlMessage::Passthrough(raw))
        );

        // Valid JSON without a `type` field also passes through verbatim.
        let untyped = json!({"hello": "world"});
        assert_eq!(
            parse_control(&untyped.to_string()),
            Some(ControlMessage::Passthrough(untyped))
        );
    }

    #[test]
    fn test_parse_malformed_json_is_dropped() {
        assert_eq!(parse_control("not json"), None);
        assert_eq!(parse_control(""), None);
        assert_eq!(parse_control(r#"{"type": "commit""#), None);
    }

    #[test]
    fn test_commit_expands_to_exactly_two_payloads_in_order() {
        let payloads = ControlMessage::Commit.into_upstream();
        assert_eq!(
            payloads,
            vec![
                UpstreamPayload::Command(UpstreamCommand::InputAudioBufferCommit),
                UpstreamPayload::Command(UpstreamCommand::ResponseCreate),
            ]
        );
    }

    #[test]
    fn test_interrupt_expands_to_one_cancel() {
        let payloads = ControlMessage::Interrupt.into_upstream();
        assert_eq!(
            payloads,
            vec![UpstreamPayload::Command(UpstreamCommand::ResponseCancel)]
        );
    }

    #[test]
    fn test_session_update_carries_client_object() {
        let payloads =
            ControlMessage::SessionUpdate(json!({"spoken_language": "hi-IN"})).into_upstream();
        assert_eq!(
            payloads,
            vec![UpstreamPayload::Command(UpstreamCommand::SessionUpdate {
                session: json!({"spoken_language": "hi-IN"}),
            })]
        );
    }

    #[test]
    fn test_passthrough_wire_form_is_verbatim() {
        let raw = json!({"type": "custom.event", "n": 1});
        let payloads = ControlMessage::Passthrough(raw.clone()).into_upstream();
        assert_eq!(payloads.len(), 1);
        let wire = payloads[0].to_wire().unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&wire).unwrap(), raw);
    }
}
