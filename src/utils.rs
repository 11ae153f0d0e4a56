use std::str::FromStr;
use tokio::time::Duration;

/// Parses a Zabbix-style time-suffix string ("30s", "5m", "2h", "1d", "1w",
/// or a bare number of seconds) into whole seconds, mirroring
/// `zbx_is_time_suffix` from the original implementation. Used for both
/// `HttpTest.delay` and `HttpStep.timeout` (§3); callers apply their own
/// range checks (delay has none, timeout requires 1-3600).
pub fn parse_time_suffix(s: &str) -> Result<u64, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("time value cannot be empty".to_string());
    }

    let last = s.chars().last().unwrap();
    let (value_str, multiplier) = if last.is_ascii_digit() {
        (s, 1)
    } else {
        let mult = match last {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            'w' => 7 * 24 * 60 * 60,
            other => return Err(format!("unknown time suffix '{other}'")),
        };
        (&s[..s.len() - 1], mult)
    };

    let value: u64 = value_str
        .parse()
        .map_err(|_| format!("invalid numeric value in time string: '{value_str}'"))?;

    Ok(value * multiplier)
}

/// Parses a duration string in the format "10m", "5h", "3d", used only by
/// the demonstration binary's own env-driven knobs (§10.3), not by the
/// scenario engine itself (which uses [`parse_time_suffix`]).
pub fn parse_duration_string(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration string cannot be empty".to_string());
    }

    let unit_char = s.chars().last().unwrap();
    let value_str = &s[0..s.len() - 1];

    let value = match u64::from_str(value_str) {
        Ok(v) => v,
        Err(_) => return Err(format!("Invalid numeric value in duration: '{}'", value_str)),
    };

    match unit_char {
        's' => Ok(Duration::from_secs(value)),
        'm' => Ok(Duration::from_secs(value * 60)),
        'h' => Ok(Duration::from_secs(value * 60 * 60)),
        'd' => Ok(Duration::from_secs(value * 24 * 60 * 60)),
        _ => Err(format!(
            "Unknown duration unit: '{}'. Use 's', 'm', 'h', or 'd'.",
            unit_char
        )),
    }
}
