//! Directive scanning over model replies
//!
//! Pattern matching, not a parser. A reply is read line by line; lines
//! starting with `execute:`, `search:` or `tool:` become directives. Tool
//! calls are split naively as `plugin.method(key=value, ...)` with no
//! quoting, escaping or nesting.

use crate::tools::types::PluginArgs;

/// Substrings that suggest a reply wants tools run (matched case-insensitively)
pub const PLUGIN_INDICATORS: &[&str] = &[
    "execute:",
    "run:",
    "tool:",
    "command:",
    "search:",
    "fetch:",
    "calculate:",
    "analyze:",
];

/// One actionable line from a model reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Execute(String),
    Search(String),
    Tool(String),
}

/// A parsed `plugin.method(args)` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub plugin: String,
    pub method: String,
    pub args: PluginArgs,
}

/// Whether `response` mentions any plugin indicator
pub fn has_plugin_indicators(response: &str) -> bool {
    let lower = response.to_lowercase();
    PLUGIN_INDICATORS.iter().any(|ind| lower.contains(ind))
}

/// Collect directives in encounter order
pub fn scan_directives(response: &str) -> Vec<Directive> {
    response
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            if let Some(rest) = line.strip_prefix("execute:") {
                Some(Directive::Execute(rest.trim().to_string()))
            } else if let Some(rest) = line.strip_prefix("search:") {
                Some(Directive::Search(rest.trim().to_string()))
            } else {
                line.strip_prefix("tool:")
                    .map(|rest| Directive::Tool(rest.trim().to_string()))
            }
        })
        .collect()
}

/// Split `plugin.method(k=v, ...)`; None when `.` or `(` is missing
///
/// The plugin is the text before the first `.`, the method runs up to the
/// first `(`, and the argument list ends at the next `)`. Without a `)`
/// the call has no arguments.
/// Pieces without `=` are ignored.
pub fn parse_tool_call(call: &str) -> Option<ToolCall> {
    let dot = call.find('.')?;
    let paren = call.find('(')?;
    if paren < dot {
        return None;
    }

    let plugin = call[..dot].trim().to_string();
    let method = call[dot + 1..paren].trim().to_string();

    let after = &call[paren + 1..];
    // Unclosed argument lists carry no arguments.
    let inner = after.find(')').map_or("", |close| &after[..close]);

    let args = inner
        .split(',')
        .filter_map(|piece| {
            let (key, value) = piece.split_once('=')?;
            Some((key.trim().to_string(), strip_quotes(value.trim()).to_string()))
        })
        .collect();

    Some(ToolCall {
        plugin,
        method,
        args,
    })
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '"' || c == '\'')
}
