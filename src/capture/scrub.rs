use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Header names whose values are never stored.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "api-token",
    "x-api-key",
];

/// Redacts credentials from recorded network traffic before it is buffered.
#[derive(Debug, Clone)]
pub struct Scrubber {
    patterns: Vec<Regex>,
    headers: Vec<String>,
}

impl Scrubber {
    pub fn new(patterns: Vec<Regex>, extra_headers: &[String]) -> Self {
        let headers = SENSITIVE_HEADERS
            .iter()
            .map(|h| h.to_string())
            .chain(extra_headers.iter().map(|h| h.to_ascii_lowercase()))
            .collect();
        Self { patterns, headers }
    }

    pub fn default_patterns() -> Vec<Regex> {
        // The `regex` crate has no look-behind, so the key name is part of the match.
        let raw = [
            r"sk-[A-Za-z0-9]{10,}",
            r"Bearer\s+[A-Za-z0-9._-]{10,}",
            r"(?i)(api[_-]?key|access[_-]?token|password)=[^&\s]+",
        ];
        raw.into_iter().filter_map(|p| Regex::new(p).ok()).collect()
    }

    pub fn with_extra_headers(extra_headers: &[String]) -> Self {
        Self::new(Self::default_patterns(), extra_headers)
    }

    pub fn is_sensitive_header(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.headers.iter().any(|h| *h == name)
    }

    pub fn scrub_string(&self, input: &str) -> String {
        let mut out = input.to_string();
        for re in &self.patterns {
            out = re.replace_all(&out, REDACTED).into_owned();
        }
        out
    }

    pub fn scrub_header(&self, name: &str, value: &str) -> String {
        if self.is_sensitive_header(name) {
            REDACTED.to_string()
        } else {
            self.scrub_string(value)
        }
    }
}

impl Default for Scrubber {
    fn default() -> Self {
        Self::new(Self::default_patterns(), &[])
    }
}
