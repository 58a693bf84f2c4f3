//! Chat text helpers
//!
//! Entity labels arrive as SNBT strings (`{text:"Hi",extra:[...]}`), as
//! typed NBT compounds or as plain strings. Everything is normalised into a
//! `serde_json::Value` chat component and then flattened into plain text.

use crate::error::EntityError;
use super::metadata::MetadataValue;
use serde_json::{Map, Number, Value};

/// Deepest list or compound nesting [`parse_snbt`] accepts
pub const MAX_SNBT_DEPTH: usize = 512;

/// Parse an SNBT string into simplified JSON.
///
/// JSON input is accepted as well since it is (almost) a subset of SNBT.
/// Input nested deeper than [`MAX_SNBT_DEPTH`] is rejected.
pub fn parse_snbt(input: &str) -> Result<Value, EntityError> {
    let mut parser = SnbtParser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct SnbtParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl SnbtParser {
    fn error(&self, message: &str) -> EntityError {
        EntityError::Label {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), EntityError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn parse_value(&mut self) -> Result<Value, EntityError> {
        self.skip_whitespace();
        match self.peek() {
            Some(open @ ('{' | '[')) => {
                if self.depth >= MAX_SNBT_DEPTH {
                    return Err(self.error("nesting too deep"));
                }
                self.depth += 1;
                let value = if open == '{' { self.parse_compound() } else { self.parse_list() };
                self.depth -= 1;
                value
            }
            Some('"' | '\'') => self.parse_quoted().map(Value::String),
            Some(_) => {
                let token = self.parse_unquoted()?;
                Ok(scalar_from_token(&token))
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_compound(&mut self) -> Result<Value, EntityError> {
        self.expect('{')?;
        let mut map = Map::new();
        self.skip_whitespace();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Value::Object(map));
        }
        loop {
            self.skip_whitespace();
            let key = match self.peek() {
                Some('"' | '\'') => self.parse_quoted()?,
                _ => self.parse_unquoted()?,
            };
            self.expect(':')?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn parse_list(&mut self) -> Result<Value, EntityError> {
        self.expect('[')?;
        self.skip_whitespace();
        // typed arrays: [B;1b,2b] [I;1,2] [L;1l]
        if matches!(self.peek(), Some('B' | 'I' | 'L')) && self.chars.get(self.pos + 1) == Some(&';') {
            self.pos += 2;
        }

        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(Value::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_quoted(&mut self) -> Result<String, EntityError> {
        let Some(quote) = self.peek() else {
            return Err(self.error("expected string"));
        };
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated escape"))?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    self.pos += 1;
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_unquoted(&mut self) -> Result<String, EntityError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '+'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected value"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }
}

fn scalar_from_token(token: &str) -> Value {
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(int) = token.parse::<i64>() {
        return Value::Number(int.into());
    }

    let (body, suffix) = token.split_at(token.len() - 1);
    match suffix {
        "b" | "B" | "s" | "S" | "l" | "L" => {
            if let Ok(int) = body.parse::<i64>() {
                return Value::Number(int.into());
            }
        }
        "f" | "F" | "d" | "D" => {
            if let Some(number) = body.parse::<f64>().ok().and_then(Number::from_f64) {
                return Value::Number(number);
            }
        }
        _ => {}
    }
    if let Some(number) = token.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(token.to_string())
}

/// Strip typed-NBT wrappers (`{type, value}`) down to plain JSON
pub fn simplify_nbt(value: &Value) -> Value {
    let Some(object) = value.as_object() else {
        return value.clone();
    };
    let (Some(kind), Some(inner)) = (object.get("type").and_then(Value::as_str), object.get("value")) else {
        return value.clone();
    };
    if object.len() != 2 {
        return value.clone();
    }
    match kind {
        "compound" => match inner.as_object() {
            Some(fields) => Value::Object(fields.iter().map(|(k, v)| (k.clone(), simplify_nbt(v))).collect()),
            None => inner.clone(),
        },
        "list" => {
            let items = inner.get("value").and_then(Value::as_array).cloned().unwrap_or_default();
            Value::Array(items.iter().map(|item| simplify_list_item(item, inner)).collect())
        }
        _ => inner.clone(),
    }
}

fn simplify_list_item(item: &Value, list: &Value) -> Value {
    // list items are untyped; rebuild the wrapper from the list's element type
    match list.get("type").and_then(Value::as_str) {
        Some(kind @ ("compound" | "list")) => simplify_nbt(&serde_json::json!({ "type": kind, "value": item })),
        _ => item.clone(),
    }
}

/// Flatten a chat component into its parts (`self`, then `extra` recursively)
pub fn flatten_component(component: &Value) -> Vec<&Value> {
    let mut parts = Vec::new();
    flatten_into(component, &mut parts);
    parts
}

fn flatten_into<'a>(component: &'a Value, out: &mut Vec<&'a Value>) {
    match component {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        _ => {
            out.push(component);
            if let Some(extra) = component.get("extra").and_then(Value::as_array) {
                for item in extra {
                    flatten_into(item, out);
                }
            }
        }
    }
}

fn text_of(part: &Value) -> String {
    match part {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(fields) => match fields.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

/// Concatenated text of a chat component
pub fn component_to_plain(component: &Value) -> String {
    flatten_component(component).into_iter().map(text_of).collect()
}

/// Turn a custom-name or text-display label into plain text.
///
/// Returns `None` for empty input. Unparseable SNBT yields the raw string.
pub fn parse_entity_label(raw: &MetadataValue) -> Option<String> {
    match raw {
        MetadataValue::String(s) if s.is_empty() => None,
        MetadataValue::String(s) => match parse_snbt(s) {
            Ok(component) => Some(component_to_plain(&component)),
            Err(err) => {
                log::debug!("Label '{}' is not SNBT: {}", s, err);
                Some(s.clone())
            }
        },
        MetadataValue::Nbt(value) => {
            if value.get("type").and_then(Value::as_str) == Some("string") {
                return value.get("value").and_then(Value::as_str).map(str::to_string);
            }
            Some(component_to_plain(&simplify_nbt(value)))
        }
        _ => None,
    }
}

/// Chat component for a raw label, used to lay out name tags
pub fn label_component(raw: &MetadataValue) -> Option<Value> {
    match raw {
        MetadataValue::String(s) if s.is_empty() => None,
        MetadataValue::String(s) => Some(parse_snbt(s).unwrap_or_else(|_| Value::String(s.clone()))),
        MetadataValue::Nbt(value) => Some(simplify_nbt(value)),
        _ => None,
    }
}

/// Remove `§x` formatting codes
pub fn strip_formatting(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snbt_compound_with_suffixes() {
        let value = parse_snbt("{text:'Boss',bold:1b,scale:1.5f,ids:[I;1,2,3],\"quoted key\":\"a\\\"b\"}").unwrap();
        assert_eq!(value["text"], "Boss");
        assert_eq!(value["bold"], 1);
        assert_eq!(value["scale"], 1.5);
        assert_eq!(value["ids"], json!([1, 2, 3]));
        assert_eq!(value["quoted key"], "a\"b");
    }

    #[test]
    fn test_snbt_accepts_json() {
        let value = parse_snbt(r#"{"text": "", "extra": [{"text": "Hello "}, "world"]}"#).unwrap();
        assert_eq!(component_to_plain(&value), "Hello world");
    }

    #[test]
    fn test_snbt_errors_report_offset() {
        let err = parse_snbt("{text:'open").unwrap_err();
        assert!(matches!(err, EntityError::Label { .. }));
        assert!(parse_snbt("{a:1} trailing").is_err());
    }

    #[test]
    fn test_label_plain_string_and_fallback() {
        let parsed = parse_entity_label(&MetadataValue::String("\"Dinnerbone\"".into()));
        assert_eq!(parsed.as_deref(), Some("Dinnerbone"));

        let raw = parse_entity_label(&MetadataValue::String("not {valid".into()));
        assert_eq!(raw.as_deref(), Some("not {valid"));

        assert_eq!(parse_entity_label(&MetadataValue::String(String::new())), None);
    }

    #[test]
    fn test_deeply_nested_label_falls_back_to_raw() {
        let deep = "[".repeat(200_000) + &"]".repeat(200_000);
        let err = parse_snbt(&deep).unwrap_err();
        assert!(matches!(err, EntityError::Label { offset, .. } if offset == MAX_SNBT_DEPTH));
        assert_eq!(parse_entity_label(&MetadataValue::String(deep.clone())).as_deref(), Some(deep.as_str()));

        let at_limit = "[".repeat(MAX_SNBT_DEPTH) + &"]".repeat(MAX_SNBT_DEPTH);
        assert!(parse_snbt(&at_limit).is_ok());
    }

    #[test]
    fn test_label_from_typed_nbt() {
        let string_tag = json!({ "type": "string", "value": "Shop" });
        assert_eq!(parse_entity_label(&MetadataValue::Nbt(string_tag)).as_deref(), Some("Shop"));

        let compound = json!({
            "type": "compound",
            "value": {
                "text": { "type": "string", "value": "A" },
                "extra": { "type": "list", "value": { "type": "compound", "value": [
                    { "text": { "type": "string", "value": "B" } }
                ] } }
            }
        });
        assert_eq!(parse_entity_label(&MetadataValue::Nbt(compound)).as_deref(), Some("AB"));
    }

    #[test]
    fn test_strip_formatting() {
        assert_eq!(strip_formatting("§c§lRed§r name"), "Red name");
        assert_eq!(strip_formatting("plain"), "plain");
    }
}
