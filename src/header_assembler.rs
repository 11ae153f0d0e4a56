//! Header Assembler (§4.3): turns the joined `Name: value` pair list from
//! the Field Loader into a header vector plus a separately-tracked cookie
//! value, exactly as `add_http_headers()` special-cases the `Cookie:`
//! prefix in the original implementation.

/// Joins a list of (name, value) header pairs into the `"Name: value"`
/// CRLF-delimited string the original implementation builds, preserving
/// insertion order (invariant 7, §3).
pub fn join_headers(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("\r\n")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledHeaders {
    pub headers: Vec<(String, String)>,
    pub cookie: Option<String>,
}

/// Parses a `Name: value`-per-line string, routing an exact-prefix
/// `Cookie:` line into `cookie` instead of the header list so the HTTP
/// driver can hand it to the cookie mechanism rather than send it as a
/// plain header (preserving cookie-jar semantics across redirects).
///
/// The `Cookie:` match is case-sensitive by design (§9 open question):
/// the original only special-cases the exact byte prefix, and this
/// implementation preserves that rather than "fixing" it to be
/// case-insensitive.
pub fn assemble_headers(raw: &str) -> AssembledHeaders {
    let mut out = AssembledHeaders::default();

    for line in raw.split("\r\n") {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();

        if name == "Cookie" {
            out.cookie = Some(value.to_string());
        } else {
            out.headers.push((name.to_string(), value.to_string()));
        }
    }

    out
}
