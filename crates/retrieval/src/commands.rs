//! The closed tool command set exposed to the model.
//!
//! Two tools only: `peek` (cheap probe, snippets + histogram) and
//! `hydrate_turn` (expand one turn id into quotable content). Anything else
//! the model emits, and any arguments that do not parse, surface as
//! [`Error::MalformedToolCall`] so the orchestrator can run its bounded
//! self-correction loop.

use crate::peek::PeekParams;
use hindsight_config::RetrievalConfig;
use hindsight_core::{Error, MessageToolCall, Result, ToolDefinition, TurnId};
use serde::Deserialize;
use serde_json::json;

pub const PEEK_TOOL_NAME: &str = "peek";
pub const HYDRATE_TOOL_NAME: &str = "hydrate_turn";

/// Wider default bucket than the HTTP surface uses: the model is usually
/// orienting itself across months of history on its first probe.
pub const AGENT_DEFAULT_BIN_DAYS: u32 = 7;

/// A validated command parsed from a model tool call.
#[derive(Debug, Clone)]
pub enum ToolCommand {
    Peek(PeekParams),
    Hydrate(TurnId),
}

impl ToolCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Peek(_) => PEEK_TOOL_NAME,
            Self::Hydrate(_) => HYDRATE_TOOL_NAME,
        }
    }
}

#[derive(Deserialize)]
struct HydrateArgs {
    turn_id: TurnId,
}

/// Parse one model tool call into a command.
pub fn parse_tool_call(call: &MessageToolCall) -> Result<ToolCommand> {
    match call.name.as_str() {
        PEEK_TOOL_NAME => {
            let mut params: PeekParams = serde_json::from_str(&call.arguments)
                .map_err(|e| Error::MalformedToolCall(format!("peek arguments: {e}")))?;
            if params.bin_days.is_none() {
                params.bin_days = Some(AGENT_DEFAULT_BIN_DAYS);
            }
            Ok(ToolCommand::Peek(params))
        }
        HYDRATE_TOOL_NAME => {
            let args: HydrateArgs = serde_json::from_str(&call.arguments)
                .map_err(|e| Error::MalformedToolCall(format!("hydrate_turn arguments: {e}")))?;
            Ok(ToolCommand::Hydrate(args.turn_id))
        }
        other => Err(Error::MalformedToolCall(format!("unknown tool: {other}"))),
    }
}

/// The tool palette sent to the model on every round.
pub fn tool_palette(config: &RetrievalConfig) -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: PEEK_TOOL_NAME.into(),
            description: format!(
                "Semantic search over the archived conversation history. Returns a time \
                 histogram over the full candidate set plus short snippet previews of the \
                 best matches. Snippets are previews only; call {HYDRATE_TOOL_NAME} with a \
                 turn_id before quoting anything. Cheap — prefer several narrow peeks over \
                 one broad one."
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural-language search query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": format!(
                            "Candidate-set size for the histogram (default {}, max {})",
                            config.default_top_k, config.max_top_k
                        )
                    },
                    "top_n_snippets": {
                        "type": "integer",
                        "description": format!(
                            "How many snippet previews to return (default {}, max {})",
                            config.default_top_n_snippets, config.max_top_n_snippets
                        )
                    },
                    "bin_days": {
                        "type": "integer",
                        "description": format!(
                            "Histogram bucket width in days (default {AGENT_DEFAULT_BIN_DAYS}, max {})",
                            config.max_bin_days
                        )
                    },
                    "start_time": {
                        "type": "string",
                        "format": "date-time",
                        "description": "Inclusive lower bound, RFC 3339 UTC"
                    },
                    "end_time": {
                        "type": "string",
                        "format": "date-time",
                        "description": "Inclusive upper bound, RFC 3339 UTC"
                    },
                    "conversation_id": {
                        "type": "string",
                        "description": "Restrict the search to one conversation"
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: HYDRATE_TOOL_NAME.into(),
            description: "Fetch the full content of one turn found via peek. Returns the \
                          user message and the assistant reply (or its summary), bounded in \
                          length. Hydrated turns are the only quotable evidence."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "turn_id": {
                        "type": "string",
                        "description": "Turn id from a previous peek result"
                    }
                },
                "required": ["turn_id"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: "call_1".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn parses_peek() {
        let cmd = parse_tool_call(&call(
            PEEK_TOOL_NAME,
            r#"{"query":"boat trip","top_k":50}"#,
        ))
        .unwrap();
        match cmd {
            ToolCommand::Peek(p) => {
                assert_eq!(p.query, "boat trip");
                assert_eq!(p.top_k, Some(50));
                assert_eq!(p.bin_days, Some(AGENT_DEFAULT_BIN_DAYS));
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn explicit_bin_days_wins() {
        let cmd =
            parse_tool_call(&call(PEEK_TOOL_NAME, r#"{"query":"q","bin_days":30}"#)).unwrap();
        match cmd {
            ToolCommand::Peek(p) => assert_eq!(p.bin_days, Some(30)),
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn parses_hydrate() {
        let id = TurnId::new();
        let cmd = parse_tool_call(&call(
            HYDRATE_TOOL_NAME,
            &format!(r#"{{"turn_id":"{id}"}}"#),
        ))
        .unwrap();
        match cmd {
            ToolCommand::Hydrate(got) => assert_eq!(got, id),
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn unknown_tool_is_malformed() {
        let err = parse_tool_call(&call("delete_everything", "{}")).unwrap_err();
        assert!(matches!(err, Error::MalformedToolCall(_)));
    }

    #[test]
    fn bad_json_is_malformed() {
        let err = parse_tool_call(&call(PEEK_TOOL_NAME, "{not json")).unwrap_err();
        assert!(matches!(err, Error::MalformedToolCall(_)));
    }

    #[test]
    fn bad_uuid_is_malformed() {
        let err =
            parse_tool_call(&call(HYDRATE_TOOL_NAME, r#"{"turn_id":"nope"}"#)).unwrap_err();
        assert!(matches!(err, Error::MalformedToolCall(_)));
    }

    #[test]
    fn palette_has_both_tools() {
        let palette = tool_palette(&RetrievalConfig::default());
        let names: Vec<_> = palette.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![PEEK_TOOL_NAME, HYDRATE_TOOL_NAME]);
        assert!(palette[0].parameters["required"]
            .as_array()
            .unwrap()
            .contains(&serde_json::Value::String("query".into())));
    }
}
