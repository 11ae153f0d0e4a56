//! URL Composer (§4.2): fragment stripping, query-field appending, and
//! punycode host encoding.

use tracing::debug;

use crate::errors::UrlComposeError;

/// Composes the final request URL from a macro/variable-expanded base URL
/// and an ordered list of query fields (already form-encoded by the
/// [`crate::field_loader`]).
pub fn compose_url(
    base_url: &str,
    query_fields: &[(String, String)],
) -> Result<String, UrlComposeError> {
    let stripped = match base_url.find('#') {
        Some(idx) => {
            debug!(url = base_url, "stripping URL fragment");
            &base_url[..idx]
        }
        None => base_url,
    };

    let mut composed = stripped.to_string();
    if !query_fields.is_empty() {
        let delim = if composed.contains('?') { '&' } else { '?' };
        composed.push(delim);
        let pairs: Vec<String> = query_fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        composed.push_str(&pairs.join("&"));
    }

    encode_host_punycode(&composed)
}

/// Applies IDNA/punycode encoding to the host component of `url`, leaving
/// everything else untouched. ASCII-only hosts pass through unchanged.
fn encode_host_punycode(url: &str) -> Result<String, UrlComposeError> {
    let mut parsed = url::Url::parse(url)?;
    let Some(host) = parsed.host_str() else {
        return Ok(url.to_string());
    };
    if host.is_ascii() {
        return Ok(url.to_string());
    }

    let encoded = idna::domain_to_ascii(host)
        .map_err(|e| UrlComposeError::Punycode(format!("{e:?}")))?;
    parsed
        .set_host(Some(&encoded))
        .map_err(|e| UrlComposeError::Punycode(e.to_string()))?;
    Ok(parsed.to_string())
}
