//! Action parser — splits LM output into visible reply and tool calls
//!
//! Actions travel in `<actions>[...]</actions>` regions: a JSON array of
//! `{"tool": "name" | "name.command", "args": [...]}` objects. Everything
//! outside those regions is the visible reply.

use regex::Regex;
use serde_json::Value;

/// A structured tool invocation emitted by the language model.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub tool: String,
    pub command: Option<String>,
    pub args: Vec<Value>,
}

impl Action {
    /// Parse the `tool` field: `name` or `name.command`.
    pub fn from_tool_field(field: &str, args: Vec<Value>) -> Self {
        match field.split_once('.') {
            Some((tool, command)) if !command.is_empty() => Self {
                tool: tool.to_string(),
                command: Some(command.to_string()),
                args,
            },
            _ => Self {
                tool: field.to_string(),
                command: None,
                args,
            },
        }
    }

    pub fn qualified_name(&self) -> String {
        match &self.command {
            Some(c) => format!("{}.{}", self.tool, c),
            None => self.tool.clone(),
        }
    }
}

/// Problems encountered while parsing. The visible text survives; each
/// issue becomes a system notice so the LM can self-correct next cycle.
#[derive(Clone, Debug)]
pub enum ParseIssue {
    /// An action region that was not a JSON array of objects.
    MalformedBlock { error: String },
    /// A single bad element; the rest of the block still executes.
    InvalidAction { index: usize, error: String },
}

impl ParseIssue {
    pub fn describe(&self) -> String {
        match self {
            ParseIssue::MalformedBlock { error } => {
                format!("malformed action block dropped: {}", error)
            }
            ParseIssue::InvalidAction { index, error } => {
                format!("action {} dropped: {}", index, error)
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ParsedOutput {
    pub visible: String,
    pub actions: Vec<Action>,
    pub issues: Vec<ParseIssue>,
}

pub struct ActionParser {
    region: Regex,
}

impl Default for ActionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionParser {
    pub fn new() -> Self {
        Self {
            // (?s): regions may span lines. Non-greedy so multiple blocks
            // in one output stay separate.
            region: Regex::new(r"(?s)<actions>(.*?)</actions>").expect("action region regex"),
        }
    }

    pub fn parse(&self, raw: &str) -> ParsedOutput {
        let mut out = ParsedOutput::default();
        let mut visible = String::new();
        let mut cursor = 0;

        for captures in self.region.captures_iter(raw) {
            let whole = captures.get(0).expect("match 0");
            let body = captures.get(1).map(|m| m.as_str()).unwrap_or("");
            visible.push_str(&raw[cursor..whole.start()]);
            cursor = whole.end();
            self.parse_block(body, &mut out);
        }
        visible.push_str(&raw[cursor..]);
        out.visible = visible.trim().to_string();
        out
    }

    fn parse_block(&self, body: &str, out: &mut ParsedOutput) {
        let parsed: Value = match serde_json::from_str(body.trim()) {
            Ok(v) => v,
            Err(e) => {
                out.issues.push(ParseIssue::MalformedBlock {
                    error: e.to_string(),
                });
                return;
            }
        };
        let items = match parsed {
            Value::Array(items) => items,
            _ => {
                out.issues.push(ParseIssue::MalformedBlock {
                    error: "action block must be a JSON array".to_string(),
                });
                return;
            }
        };

        for (index, item) in items.into_iter().enumerate() {
            let obj = match item {
                Value::Object(obj) => obj,
                other => {
                    out.issues.push(ParseIssue::InvalidAction {
                        index,
                        error: format!("expected an object, got {}", kind_of(&other)),
                    });
                    continue;
                }
            };
            let tool = match obj.get("tool").and_then(|v| v.as_str()) {
                Some(t) if !t.trim().is_empty() => t.trim().to_string(),
                _ => {
                    out.issues.push(ParseIssue::InvalidAction {
                        index,
                        error: "missing 'tool' field".to_string(),
                    });
                    continue;
                }
            };
            let args = match obj.get("args") {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(args)) => args.clone(),
                Some(other) => {
                    out.issues.push(ParseIssue::InvalidAction {
                        index,
                        error: format!("'args' must be an array, got {}", kind_of(other)),
                    });
                    continue;
                }
            };
            out.actions.push(Action::from_tool_field(&tool, args));
        }
    }
}

/// Render actions back into a well-formed region. Parse-then-format of a
/// valid region round-trips the action list.
pub fn format_actions(actions: &[Action]) -> String {
    let items: Vec<Value> = actions
        .iter()
        .map(|a| {
            serde_json::json!({
                "tool": a.qualified_name(),
                "args": a.args,
            })
        })
        .collect();
    format!(
        "<actions>{}</actions>",
        serde_json::to_string(&Value::Array(items)).unwrap_or_else(|_| "[]".to_string())
    )
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
