//! Block-capable renderer for state messages.
//!
//! Supports the handlebars subset authors use for USSD screens:
//!
//! - `{{path}}`, `{{this.field}}`, `{{../path}}`, `{{@index}}`, `{{@key}}`
//! - `{{#each list}}...{{else}}...{{/each}}`
//! - `{{#if cond}}...{{else}}...{{/if}}`, `{{#unless cond}}...{{/unless}}`
//! - `{{#with object}}...{{/with}}`
//! - helpers: every filter (`{{currency amount}}`, `{{truncate name 20}}`)
//!   plus `{{add @index 1}}`
//! - the pipe form shared with the template engine (`{{amount | currency}}`)
//! - `{{~` / `~}}` whitespace control and `{{! comments }}`
//!
//! A template that fails to parse is returned unchanged.

use serde_json::{json, Value};
use thiserror::Error;

use super::engine::{apply_filters, split_pipeline, unquote};
use super::filters;
use super::path::{lookup, to_display};

#[derive(Debug, Error, PartialEq, Eq)]
enum RenderError {
    #[error("unclosed tag")]
    UnclosedTag,

    #[error("unknown block helper '{0}'")]
    UnknownBlock(String),

    #[error("block '{0}' is not closed")]
    Unterminated(String),

    #[error("unexpected closing tag '{0}'")]
    UnexpectedClose(String),

    #[error("unexpected else")]
    UnexpectedElse,
}

#[derive(Debug)]
enum Token {
    Text(String),
    Tag(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Unless,
    Each,
    With,
}

impl BlockKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            "with" => Some(BlockKind::With),
            _ => None,
        }
    }
}

#[derive(Debug)]
enum Node {
    Text(String),
    Expr(String),
    Block {
        kind: BlockKind,
        arg: String,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

enum End {
    Eof,
    Else,
    Close(String),
}

/// One level of the context stack.
struct Frame<'a> {
    this: &'a Value,
    index: Option<usize>,
    len: usize,
    key: Option<&'a str>,
}

/// Renders state messages against session data.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRenderer;

impl MessageRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders `template`; on a parse failure the template comes back as is.
    pub fn render(&self, template: &str, data: &Value) -> String {
        if !template.contains("{{") {
            return template.to_string();
        }
        match tokenize(template).and_then(parse) {
            Ok(nodes) => {
                let root = [Frame {
                    this: data,
                    index: None,
                    len: 0,
                    key: None,
                }];
                let mut out = String::with_capacity(template.len());
                render_nodes(&nodes, &root, &mut out);
                out
            }
            Err(e) => {
                tracing::warn!(error = %e, "message template failed to parse, rendering raw text");
                template.to_string()
            }
        }
    }
}

fn tokenize(template: &str) -> Result<Vec<Token>, RenderError> {
    let mut tokens = Vec::new();
    let mut rest = template;
    let mut trim_next = false;

    while let Some(start) = rest.find("{{") {
        let mut text = &rest[..start];
        let after = &rest[start + 2..];
        let (close, after) = match after.strip_prefix('{') {
            Some(a) => ("}}}", a),
            None => ("}}", after),
        };
        let end = after.find(close).ok_or(RenderError::UnclosedTag)?;
        let mut inner = &after[..end];

        let trim_before = inner.starts_with('~');
        if trim_before {
            inner = &inner[1..];
        }
        let trim_after = inner.ends_with('~');
        if trim_after {
            inner = &inner[..inner.len() - 1];
        }

        if trim_next {
            text = text.trim_start();
        }
        if trim_before {
            text = text.trim_end();
        }
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }
        tokens.push(Token::Tag(inner.trim().to_string()));

        trim_next = trim_after;
        rest = &after[end + close.len()..];
    }

    let tail = if trim_next { rest.trim_start() } else { rest };
    if !tail.is_empty() {
        tokens.push(Token::Text(tail.to_string()));
    }
    Ok(tokens)
}

fn parse(tokens: Vec<Token>) -> Result<Vec<Node>, RenderError> {
    let mut iter = tokens.into_iter();
    let (nodes, end) = parse_until(&mut iter)?;
    match end {
        End::Eof => Ok(nodes),
        End::Else => Err(RenderError::UnexpectedElse),
        End::Close(name) => Err(RenderError::UnexpectedClose(name)),
    }
}

fn parse_until(iter: &mut std::vec::IntoIter<Token>) -> Result<(Vec<Node>, End), RenderError> {
    let mut nodes = Vec::new();
    while let Some(token) = iter.next() {
        let tag = match token {
            Token::Text(text) => {
                nodes.push(Node::Text(text));
                continue;
            }
            Token::Tag(tag) => tag,
        };

        if let Some(open) = tag.strip_prefix('#') {
            let open = open.trim();
            let (name, arg) = open.split_once(char::is_whitespace).unwrap_or((open, ""));
            let kind = BlockKind::parse(name)
                .ok_or_else(|| RenderError::UnknownBlock(name.to_string()))?;

            let (body, end) = parse_until(iter)?;
            let otherwise = match end {
                End::Close(closed) if closed == name => Vec::new(),
                End::Else => match parse_until(iter)? {
                    (otherwise, End::Close(closed)) if closed == name => otherwise,
                    _ => return Err(RenderError::Unterminated(name.to_string())),
                },
                _ => return Err(RenderError::Unterminated(name.to_string())),
            };
            nodes.push(Node::Block {
                kind,
                arg: arg.trim().to_string(),
                body,
                otherwise,
            });
        } else if let Some(close) = tag.strip_prefix('/') {
            return Ok((nodes, End::Close(close.trim().to_string())));
        } else if tag == "else" {
            return Ok((nodes, End::Else));
        } else if !tag.starts_with('!') {
            nodes.push(Node::Expr(tag));
        }
    }
    Ok((nodes, End::Eof))
}

fn render_nodes(nodes: &[Node], frames: &[Frame<'_>], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr(expr) => out.push_str(&to_display(&evaluate(expr, frames))),
            Node::Block {
                kind,
                arg,
                body,
                otherwise,
            } => render_block(*kind, arg, body, otherwise, frames, out),
        }
    }
}

fn render_block(
    kind: BlockKind,
    arg: &str,
    body: &[Node],
    otherwise: &[Node],
    frames: &[Frame<'_>],
    out: &mut String,
) {
    match kind {
        BlockKind::If | BlockKind::Unless => {
            let truthy = is_truthy(&evaluate(arg, frames));
            let branch = if truthy == (kind == BlockKind::If) {
                body
            } else {
                otherwise
            };
            render_nodes(branch, frames, out);
        }
        BlockKind::Each => {
            let Some(target) = resolve_ref(arg, frames) else {
                render_nodes(otherwise, frames, out);
                return;
            };
            let items: Vec<(Option<&str>, &Value)> = match target {
                Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
                Value::Object(map) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
                _ => Vec::new(),
            };
            if items.is_empty() {
                render_nodes(otherwise, frames, out);
                return;
            }
            let len = items.len();
            for (index, (key, item)) in items.into_iter().enumerate() {
                let mut scoped: Vec<Frame<'_>> = frames.iter().map(Frame::reborrow).collect();
                scoped.push(Frame {
                    this: item,
                    index: Some(index),
                    len,
                    key,
                });
                render_nodes(body, &scoped, out);
            }
        }
        BlockKind::With => match resolve_ref(arg, frames).filter(|v| !v.is_null()) {
            Some(target) => {
                let mut scoped: Vec<Frame<'_>> = frames.iter().map(Frame::reborrow).collect();
                scoped.push(Frame {
                    this: target,
                    index: None,
                    len: 0,
                    key: None,
                });
                render_nodes(body, &scoped, out);
            }
            None => render_nodes(otherwise, frames, out),
        },
    }
}

impl<'a> Frame<'a> {
    fn reborrow(&self) -> Frame<'a> {
        Frame {
            this: self.this,
            index: self.index,
            len: self.len,
            key: self.key,
        }
    }
}

/// Evaluates a tag body: pipe form, helper call, literal or path.
fn evaluate(expr: &str, frames: &[Frame<'_>]) -> Value {
    let segments = split_pipeline(expr);
    if segments.len() > 1 {
        let value = argument(segments[0].trim(), frames);
        return apply_filters(value, &segments[1..]);
    }

    let args = split_args(expr);
    match args.split_first() {
        Some((helper, rest)) if !rest.is_empty() && *helper == "add" => add(rest, frames),
        Some((helper, rest)) if !rest.is_empty() && filters::is_known(helper) => {
            let value = argument(rest[0], frames);
            let filter_arg = rest.get(1).map(|a| to_display(&argument(a, frames)));
            filters::apply(helper, filter_arg.as_deref(), value)
        }
        _ => argument(expr.trim(), frames),
    }
}

fn add(args: &[&str], frames: &[Frame<'_>]) -> Value {
    let total: f64 = args
        .iter()
        .filter_map(|a| filters::as_number(&argument(a, frames)))
        .sum();
    if total.fract() == 0.0 && total.abs() < i64::MAX as f64 {
        json!(total as i64)
    } else {
        json!(total)
    }
}

/// A literal (`"text"`, `42`, `true`) or a path.
fn argument(raw: &str, frames: &[Frame<'_>]) -> Value {
    if raw.starts_with('"') || raw.starts_with('\'') {
        return Value::String(unquote(raw).to_string());
    }
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(n) = raw.parse::<f64>() {
        return json!(n);
    }
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    resolve(raw, frames)
}

fn resolve(path: &str, frames: &[Frame<'_>]) -> Value {
    let Some(frame) = frames.last() else {
        return Value::Null;
    };
    match path {
        "@index" => return frame.index.map(|i| json!(i)).unwrap_or(Value::Null),
        "@first" => return Value::Bool(frame.index == Some(0)),
        "@last" => return Value::Bool(frame.index.is_some_and(|i| i + 1 == frame.len)),
        "@key" => return frame.key.map(|k| json!(k)).unwrap_or(Value::Null),
        _ => {}
    }
    resolve_ref(path, frames).cloned().unwrap_or(Value::Null)
}

fn resolve_ref<'a>(path: &str, frames: &[Frame<'a>]) -> Option<&'a Value> {
    let frame = frames.last()?;
    if path == "this" || path == "." {
        return Some(frame.this);
    }
    if let Some(rest) = path.strip_prefix("this.") {
        return lookup(frame.this, rest);
    }
    if let Some(rest) = path.strip_prefix("../") {
        return resolve_ref(rest, &frames[..frames.len() - 1]);
    }
    frames.iter().rev().find_map(|f| lookup(f.this, path))
}

/// Splits helper arguments on whitespace outside quotes.
fn split_args(expr: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;
    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                start.get_or_insert(i);
            }
            None if c.is_whitespace() => {
                if let Some(s) = start.take() {
                    args.push(&expr[s..i]);
                }
            }
            None => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        args.push(&expr[s..]);
    }
    args
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(template: &str, data: Value) -> String {
        MessageRenderer::new().render(template, &data)
    }

    #[test]
    fn renders_plain_variables() {
        assert_eq!(render("Bonjour {{name}}", json!({"name": "Awa"})), "Bonjour Awa");
        assert_eq!(render("Bonjour {{name}}", json!({})), "Bonjour ");
    }

    #[test]
    fn each_lists_items_with_index_helper() {
        let data = json!({"todos": [{"title": "Pain"}, {"title": "Lait"}]});
        let out = render(
            "Liste:\n{{#each todos}}{{add @index 1}}. {{this.title}}\n{{/each}}0. Retour",
            data,
        );
        assert_eq!(out, "Liste:\n1. Pain\n2. Lait\n0. Retour");
    }

    #[test]
    fn each_falls_back_to_else_when_empty() {
        let out = render(
            "{{#each todos}}{{title}}{{else}}Aucune tâche{{/each}}",
            json!({"todos": []}),
        );
        assert_eq!(out, "Aucune tâche");
    }

    #[test]
    fn each_reaches_parent_scope() {
        let out = render(
            "{{#each items}}{{this}} {{../unit}}{{#unless @last}}, {{/unless}}{{/each}}",
            json!({"items": [1, 2], "unit": "kg"}),
        );
        assert_eq!(out, "1 kg, 2 kg");
    }

    #[test]
    fn if_else_uses_truthiness() {
        let template = "{{#if balance}}Solde: {{currency balance}}{{else}}Compte vide{{/if}}";
        assert_eq!(render(template, json!({"balance": 1500})), "Solde: 1 500,00 FCFA");
        assert_eq!(render(template, json!({"balance": 0})), "Compte vide");
    }

    #[test]
    fn helpers_and_pipes_share_filters() {
        let data = json!({"name": "aminata diallo", "email": null});
        assert_eq!(render("{{truncate name 8}}", data.clone()), "amina...");
        assert_eq!(render("{{default email \"N/A\"}}", data.clone()), "N/A");
        assert_eq!(render("{{name | capitalize}}", data), "Aminata Diallo");
    }

    #[test]
    fn with_block_scopes_into_object() {
        let out = render(
            "{{#with account}}{{number}} ({{../owner}}){{/with}}",
            json!({"account": {"number": "CM-01"}, "owner": "Awa"}),
        );
        assert_eq!(out, "CM-01 (Awa)");
    }

    #[test]
    fn whitespace_control_and_comments() {
        let out = render("A  {{~! note ~}}  B", json!({}));
        assert_eq!(out, "AB");
    }

    #[test]
    fn malformed_templates_render_raw() {
        for template in [
            "{{#each items}}unterminated",
            "{{#loop items}}x{{/loop}}",
            "text {{/if}}",
            "open {{name",
        ] {
            assert_eq!(render(template, json!({"items": [1]})), template);
        }
    }
}
