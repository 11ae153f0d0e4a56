//! Variable extraction: the `http_process_variables` counterpart consumed
//! by the Response Evaluator (§4.5). Each variable's definition string
//! selects how it is extracted from the response body: a literal value, a
//! regex capture, an XPath expression, or a JSONPath expression.

use regex::Regex;
use serde_json_path::JsonPath;

use crate::errors::VariableError;
use crate::model::VariableScope;
use crate::xml;

/// How a variable's definition string is interpreted. The config store
/// does not distinguish these by a separate column; by convention the
/// definition is prefixed, mirroring how the original associates a
/// variable's substitution behavior with its value's shape.
#[derive(Debug, Clone)]
pub enum Extraction {
    Literal(String),
    Regex { pattern: String, group: usize },
    XPath(String),
    JsonPath(String),
}

/// Parses a variable definition string of the form `regex:<pattern>:<group>`,
/// `xpath:<expr>`, `jsonpath:<expr>`, or a bare literal.
pub fn parse_extraction(definition: &str) -> Extraction {
    if let Some(rest) = definition.strip_prefix("regex:") {
        let mut parts = rest.rsplitn(2, ':');
        let group_str = parts.next().unwrap_or("1");
        let pattern = parts.next();
        match (pattern, group_str.parse::<usize>()) {
            (Some(pattern), Ok(group)) => Extraction::Regex {
                pattern: pattern.to_string(),
                group,
            },
            _ => Extraction::Regex {
                pattern: rest.to_string(),
                group: 1,
            },
        }
    } else if let Some(rest) = definition.strip_prefix("xpath:") {
        Extraction::XPath(rest.to_string())
    } else if let Some(rest) = definition.strip_prefix("jsonpath:") {
        Extraction::JsonPath(rest.to_string())
    } else {
        Extraction::Literal(definition.to_string())
    }
}

/// Extracts a single value from `body` per `extraction`.
pub fn extract(extraction: &Extraction, body: &str) -> Result<String, VariableError> {
    match extraction {
        Extraction::Literal(v) => Ok(v.clone()),
        Extraction::Regex { pattern, group } => {
            let re = Regex::new(pattern)?;
            let caps = re.captures(body).ok_or(VariableError::RegexNoMatch)?;
            caps.get(*group)
                .map(|m| m.as_str().to_string())
                .ok_or(VariableError::RegexGroupNotFound(*group))
        }
        Extraction::XPath(expr) => {
            xml::query(body, expr).map_err(|e| VariableError::XPath(e.to_string()))
        }
        Extraction::JsonPath(expr) => {
            let json: serde_json::Value = serde_json::from_str(body)?;
            let path = JsonPath::parse(expr).map_err(|e| VariableError::XPath(e.to_string()))?;
            path.query(&json)
                .exactly_one()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .map_err(|_| VariableError::JsonPathNoMatch)
        }
    }
}

/// Runs every variable definition in `definitions` against `body`, writing
/// successfully-extracted values into `scope`. Stops and returns the first
/// failure, mirroring the original's one-error-per-scope-pass behavior
/// (§4.5 items 3/4): subsequent variables in the same scope are not
/// attempted once one fails.
pub fn process_variables(
    scope: &mut VariableScope,
    definitions: &[(String, String)],
    body: &str,
) -> Result<(), (String, VariableError)> {
    for (name, definition) in definitions {
        let extraction = parse_extraction(definition);
        let value = extract(&extraction, body).map_err(|e| (name.clone(), e))?;
        scope.set(name.clone(), value);
    }
    Ok(())
}
