//! Parses a comma/range status-code list like `"200,301-304"` and answers
//! membership queries for the Response Evaluator (§4.5).

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Single(i64),
    Range(i64, i64),
}

/// A parsed, reusable membership set. An empty list means "accept any
/// status code" per §4.5 item 1.
#[derive(Debug, Clone, Default)]
pub struct StatusCodeList {
    entries: Vec<Entry>,
}

impl StatusCodeList {
    /// Parses `spec`, e.g. `"200,301-304"`. Whitespace around entries is
    /// tolerated. An empty or all-whitespace string parses to an empty list.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let mut entries = Vec::new();
        for raw in spec.split(',') {
            let part = raw.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((lo, hi)) = part.split_once('-') {
                let lo: i64 = lo
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid status code range \"{part}\""))?;
                let hi: i64 = hi
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid status code range \"{part}\""))?;
                if lo > hi {
                    return Err(format!("invalid status code range \"{part}\""));
                }
                entries.push(Entry::Range(lo, hi));
            } else {
                let code: i64 = part
                    .parse()
                    .map_err(|_| format!("invalid status code \"{part}\""))?;
                entries.push(Entry::Single(code));
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, code: i64) -> bool {
        self.entries.iter().any(|e| match e {
            Entry::Single(c) => *c == code,
            Entry::Range(lo, hi) => code >= *lo && code <= *hi,
        })
    }
}
