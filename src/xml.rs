//! The `XML` helper surface (§6): `query`, `fromJson`, `toJson`. These are
//! plain functions returning a bounded `Result`, not bindings into an
//! embedded script engine — the original guards the equivalent calls with a
//! `setjmp`/`longjmp` pair (`zbx_es_init_xml`, `xml.c`); here that becomes
//! an ordinary error return (§9 Design Notes).

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde_json::{Map, Value};

use crate::errors::XmlError;

/// Evaluates a small, practically-useful subset of XPath against `xml`:
/// absolute element paths (`/a/b/c`) and the text-content axis
/// (`/a/b/text()`). This is intentionally narrower than full XPath — the
/// original delegates to a full libxml2 xpath evaluator, which is out of
/// scope here (§1 Non-goals: the embedded JS runtime/XML engine is
/// referenced by contract, not reimplemented) — but is enough to back the
/// variable-extraction use case in §4.5.
pub fn query(xml: &str, xpath: &str) -> Result<String, XmlError> {
    let wants_text = xpath.ends_with("/text()");
    let path = xpath.trim_start_matches('/').trim_end_matches("/text()");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(XmlError::XPath(format!("unsupported XPath expression: {xpath}")));
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth: Vec<String> = Vec::new();
    let mut buf = Vec::new();
    let mut matched_text = String::new();
    let mut at_target = false;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError::Parse(e.to_string()))?
        {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                depth.push(name);
                at_target = depth == segments;
            }
            Event::Text(e) => {
                if at_target {
                    matched_text.push_str(
                        &e.unescape()
                            .map_err(|err| XmlError::Parse(err.to_string()))?,
                    );
                }
            }
            Event::End(_) => {
                if at_target && !wants_text {
                    // Element match without text(): report it found, value is its text.
                    return Ok(matched_text);
                }
                depth.pop();
                at_target = false;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if matched_text.is_empty() {
        Err(XmlError::XPath(format!("no node matched XPath expression: {xpath}")))
    } else {
        Ok(matched_text)
    }
}

/// Converts a flat JSON object into XML, one element per key. Nested
/// objects/arrays recurse; scalars become element text.
pub fn from_json(json: &str) -> Result<String, XmlError> {
    let value: Value = serde_json::from_str(json)?;
    let mut out = String::new();
    write_value("root", &value, &mut out);
    Ok(out)
}

fn write_value(tag: &str, value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push_str(&format!("<{tag}>"));
            for (k, v) in map {
                write_value(k, v, out);
            }
            out.push_str(&format!("</{tag}>"));
        }
        Value::Array(items) => {
            for item in items {
                write_value(tag, item, out);
            }
        }
        Value::Null => {
            out.push_str(&format!("<{tag}/>"));
        }
        other => {
            let text = match other {
                Value::String(s) => s.clone(),
                _ => other.to_string(),
            };
            out.push_str(&format!(
                "<{tag}>{}</{tag}>",
                quick_xml::escape::escape(&text)
            ));
        }
    }
}

/// Converts XML back into a JSON object, one key per top-level child
/// element, text-only leaves becoming JSON strings.
pub fn to_json(xml: &str) -> Result<String, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<(String, Map<String, Value>, String)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| XmlError::Parse(e.to_string()))?
        {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                stack.push((name, Map::new(), String::new()));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                insert_child(&mut stack, &mut root, name, Value::Null);
            }
            Event::Text(e) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    text.push_str(
                        &e.unescape()
                            .map_err(|err| XmlError::Parse(err.to_string()))?,
                    );
                }
            }
            Event::End(_) => {
                let Some((name, map, text)) = stack.pop() else {
                    return Err(XmlError::Parse("unbalanced XML".to_string()));
                };
                let value = if map.is_empty() {
                    Value::String(text)
                } else {
                    Value::Object(map)
                };
                insert_child(&mut stack, &mut root, name, value);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let value = root.unwrap_or(Value::Object(Map::new()));
    serde_json::to_string(&value).map_err(XmlError::from)
}

fn insert_child(
    stack: &mut Vec<(String, Map<String, Value>, String)>,
    root: &mut Option<Value>,
    name: String,
    value: Value,
) {
    if let Some((_, parent_map, _)) = stack.last_mut() {
        parent_map.insert(name, value);
    } else {
        *root = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_absolute_path() {
        let xml = "<root><a><b>hello</b></a></root>";
        let v = query(xml, "/root/a/b").unwrap();
        assert_eq!(v, "hello");
    }

    #[test]
    fn query_no_match_errors() {
        let xml = "<root><a/></root>";
        assert!(query(xml, "/root/missing").is_err());
    }

    #[test]
    fn from_json_then_to_json_round_trips_leaf_values() {
        let json = r#"{"a":"1","b":"2"}"#;
        let xml = from_json(json).unwrap();
        let back = to_json(&xml).unwrap();
        let value: Value = serde_json::from_str(&back).unwrap();
        assert_eq!(value["a"], "1");
        assert_eq!(value["b"], "2");
    }

    #[test]
    fn to_json_invalid_xml_errors() {
        assert!(to_json("<unbalanced>").is_err());
    }
}
