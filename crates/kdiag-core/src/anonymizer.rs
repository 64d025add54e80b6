//! Anonymizer
//!
//! Masks cluster identifiers before text leaves the process and restores
//! them in generated output. Masks are stable for the lifetime of one
//! [`Anonymizer`]: the same original always maps to the same token.
//!
//! Masked categories:
//! - pod names with generated suffixes, plus the `pod_name` field
//! - non-system namespaces and container names
//! - image references other than common base images
//! - public IPv4 addresses, URLs and domains
//! - long token-like strings and explicit token/secret fields
//! - file paths outside common system directories

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::debug;
use uuid::Uuid;

const SYSTEM_NAMESPACES: &[&str] = &["default", "kube-system", "kube-public", "kube-node-lease"];
const BASE_IMAGES: &[&str] = &["nginx", "alpine", "ubuntu", "redis", "postgres"];
const SYSTEM_PATHS: &[&str] = &["/usr/", "/bin/", "/etc/", "/var/log/", "/tmp/"];
const MASK_DOMAIN: &str = "example.com";

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[a-zA-Z0-9.-]+(?::[0-9]+)?(?:/[^\s"']*)?"#)
        .expect("URL_RE is a compile-time constant")
});

static POD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z0-9-]+-[a-z0-9]{8,10}-[a-z0-9]{5}\b")
        .expect("POD_RE is a compile-time constant")
});

static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\b(?i:namespace)["\s:=]+|(?:^|\s)-n\s+|--namespace[=\s]+)([a-z0-9][a-z0-9-]*)"#)
        .expect("NAMESPACE_RE is a compile-time constant")
});

static CONTAINER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\b(?i:container)["\s:]+)([a-z0-9][a-z0-9-]*)"#)
        .expect("CONTAINER_RE is a compile-time constant")
});

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[a-z0-9.-]+/){0,2}[a-z][a-z0-9._-]*:[a-z0-9][a-z0-9._-]*\b")
        .expect("IMAGE_RE is a compile-time constant")
});

static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("IPV4_RE is a compile-time constant")
});

static SECRET_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\b(?i:token|secret|password)["\s:=]+)([A-Za-z0-9+/=_-]{10,})"#)
        .expect("SECRET_FIELD_RE is a compile-time constant")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9+/]{20,}={0,2}").expect("TOKEN_RE is a compile-time constant")
});

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:/[A-Za-z0-9._-]+)+/?").expect("PATH_RE is a compile-time constant")
});

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*\.(?:com|net|org|io|dev|cloud|internal|local|co|ai|app)\b",
    )
    .expect("DOMAIN_RE is a compile-time constant")
});

#[derive(Debug, Clone, Copy)]
enum Kind {
    Pod,
    Namespace,
    Container,
    Image,
    Ip,
    Url,
    Domain,
    Secret,
    Path,
}

/// Masked token to original value, for one anonymization call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreMap {
    entries: BTreeMap<String, String>,
}

impl RestoreMap {
    /// Empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, masked: &str, original: &str) {
        self.entries.insert(masked.to_string(), original.to_string());
    }

    /// Original value for a masked token
    #[must_use]
    pub fn get(&self, masked: &str) -> Option<&str> {
        self.entries.get(masked).map(String::as_str)
    }

    /// Number of masked values
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was masked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(masked, original)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Add every entry of `other`
    pub fn merge(&mut self, other: RestoreMap) {
        self.entries.extend(other.entries);
    }

    /// Replace masked tokens in `text` with their originals, longest first
    #[must_use]
    pub fn restore(&self, text: &str) -> String {
        let mut tokens: Vec<(&String, &String)> = self.entries.iter().collect();
        tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));
        tokens
            .into_iter()
            .fold(text.to_string(), |acc, (masked, original)| acc.replace(masked.as_str(), original))
    }

    /// Human-readable count of what was masked
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No sensitive data was anonymized.".to_string();
        }
        let count = |pred: fn(&str) -> bool| self.entries.keys().filter(|k| pred(k)).count();
        let groups = [
            ("pod name(s)", count(|k| k.starts_with("pod-"))),
            ("namespace(s)", count(|k| k.starts_with("namespace-"))),
            ("container name(s)", count(|k| k.starts_with("container-"))),
            ("image(s)", count(|k| k.starts_with("registry.example.com/"))),
            ("potential secret(s)", count(|k| k.contains("REDACTED-SECRET"))),
        ];

        let mut lines = vec!["The following data was anonymized:".to_string()];
        for (label, n) in groups {
            if n > 0 {
                lines.push(format!("- {} {}", n, label));
            }
        }
        lines.join("\n")
    }
}

/// Stateful identifier masker
#[derive(Debug)]
pub struct Anonymizer {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
    literals: Vec<String>,
    counter: usize,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Anonymizer {
    /// Empty anonymizer
    #[must_use]
    pub fn new() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            literals: Vec::new(),
            counter: 1,
        }
    }

    /// Mask every string leaf of `data`.
    ///
    /// Known metadata keys (`pod_name`, `namespace`, `container`,
    /// `container_name`, and `name` inside `containers`) are masked as
    /// identifiers first, so their values are also replaced wherever they
    /// appear in free text. Object keys are never changed.
    pub fn transform(&mut self, data: &Value) -> (Value, RestoreMap) {
        let mut map = RestoreMap::new();
        self.collect_identifiers(data, None, &mut map);
        let literals = self.literal_pattern();
        let masked = self.mask_value(data, literals.as_ref(), &mut map);
        debug!(masked = map.len(), "Anonymized structured data");
        (masked, map)
    }

    /// Mask free text, reusing identifiers learned by earlier calls
    pub fn anonymize_text(&mut self, text: &str) -> (String, RestoreMap) {
        let mut map = RestoreMap::new();
        let literals = self.literal_pattern();
        let masked = self.mask_text(text, literals.as_ref(), &mut map);
        (masked, map)
    }

    /// Replace masked tokens in `text` with their originals
    #[must_use]
    pub fn restore(text: &str, map: &RestoreMap) -> String {
        map.restore(text)
    }

    /// Number of distinct values masked so far
    #[must_use]
    pub fn mapping_count(&self) -> usize {
        self.forward.len()
    }

    /// Forget every mapping
    pub fn clear(&mut self) {
        self.forward.clear();
        self.reverse.clear();
        self.literals.clear();
        self.counter = 1;
    }

    fn token(&mut self, kind: Kind, original: &str, map: &mut RestoreMap) -> String {
        if self.reverse.contains_key(original) {
            return original.to_string();
        }
        if let Some(masked) = self.forward.get(original) {
            map.insert(masked, original);
            return masked.clone();
        }

        let n = self.counter;
        self.counter += 1;
        let masked = match kind {
            Kind::Pod => format!("pod-{:03}-{}", n, suffix()),
            Kind::Namespace => format!("namespace-{:02}", n),
            Kind::Container => format!("container-{:02}", n),
            Kind::Image => format!("registry.{}/app-{:02}:v1.0.0", MASK_DOMAIN, n),
            Kind::Ip => format!("10.0.{}.{}", n / 255, n % 255),
            Kind::Url => format!("https://app-{:02}.{}/api", n, MASK_DOMAIN),
            Kind::Domain => format!("app-{:02}.{}", n, MASK_DOMAIN),
            Kind::Secret => format!("***REDACTED-SECRET-{:02}***", n),
            Kind::Path => format!("/app/data/file-{:02}", n),
        };
        self.forward.insert(original.to_string(), masked.clone());
        self.reverse.insert(masked.clone(), original.to_string());
        map.insert(&masked, original);
        masked
    }

    fn remember_literal(&mut self, kind: Kind, original: &str, map: &mut RestoreMap) {
        if original.trim().is_empty() {
            return;
        }
        self.token(kind, original, map);
        if !self.literals.iter().any(|l| l == original) {
            self.literals.push(original.to_string());
        }
    }

    fn collect_identifiers(&mut self, value: &Value, parent: Option<&str>, map: &mut RestoreMap) {
        match value {
            Value::Object(fields) => {
                for (key, field) in fields {
                    if let Some(text) = field.as_str() {
                        match (key.as_str(), parent) {
                            ("pod_name", _) => self.remember_literal(Kind::Pod, text, map),
                            ("namespace", _) if !SYSTEM_NAMESPACES.contains(&text) => {
                                self.remember_literal(Kind::Namespace, text, map)
                            }
                            ("container" | "container_name", _) | ("name", Some("containers")) => {
                                self.remember_literal(Kind::Container, text, map)
                            }
                            _ => {}
                        }
                    } else {
                        self.collect_identifiers(field, Some(key.as_str()), map);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.collect_identifiers(item, parent, map);
                }
            }
            _ => {}
        }
    }

    fn literal_pattern(&self) -> Option<Regex> {
        if self.literals.is_empty() {
            return None;
        }
        let mut literals: Vec<&String> = self.literals.iter().collect();
        literals.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternatives: Vec<String> = literals.iter().map(|l| regex::escape(l)).collect();
        Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).ok()
    }

    fn mask_value(&mut self, value: &Value, literals: Option<&Regex>, map: &mut RestoreMap) -> Value {
        match value {
            Value::String(text) => Value::String(self.mask_text(text, literals, map)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.mask_value(item, literals, map))
                    .collect(),
            ),
            Value::Object(fields) => {
                let mut out = Map::new();
                for (key, field) in fields {
                    out.insert(key.clone(), self.mask_value(field, literals, map));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn mask_text(&mut self, text: &str, literals: Option<&Regex>, map: &mut RestoreMap) -> String {
        let mut out = text.to_string();

        if let Some(re) = literals {
            out = replace_matches(re, &out, |caps, _, _| {
                let original = &caps[0];
                self.forward.get(original).map(|masked| {
                    map.insert(masked, original);
                    masked.clone()
                })
            });
        }

        out = replace_matches(&URL_RE, &out, |caps, _, _| {
            let original = &caps[0];
            if original.contains(MASK_DOMAIN) {
                return None;
            }
            Some(self.token(Kind::Url, original, map))
        });

        out = replace_matches(&POD_RE, &out, |caps, _, _| {
            Some(self.token(Kind::Pod, &caps[0], map))
        });

        out = replace_matches(&NAMESPACE_RE, &out, |caps, _, _| {
            let name = &caps[2];
            if SYSTEM_NAMESPACES.contains(&name) {
                return None;
            }
            Some(format!("{}{}", &caps[1], self.token(Kind::Namespace, name, map)))
        });

        out = replace_matches(&CONTAINER_RE, &out, |caps, _, _| {
            Some(format!("{}{}", &caps[1], self.token(Kind::Container, &caps[2], map)))
        });

        out = replace_matches(&IMAGE_RE, &out, |caps, before, after| {
            let original = &caps[0];
            let chained = matches!(before, Some(':' | '/' | '=')) || after == Some(':');
            if chained
                || original.contains(MASK_DOMAIN)
                || BASE_IMAGES.iter().any(|base| original.contains(base))
            {
                return None;
            }
            Some(self.token(Kind::Image, original, map))
        });

        out = replace_matches(&IPV4_RE, &out, |caps, _, _| {
            let original = &caps[0];
            if is_private_ipv4(original) {
                return None;
            }
            Some(self.token(Kind::Ip, original, map))
        });

        out = replace_matches(&SECRET_FIELD_RE, &out, |caps, _, _| {
            Some(format!("{}{}", &caps[1], self.token(Kind::Secret, &caps[2], map)))
        });

        out = replace_matches(&TOKEN_RE, &out, |caps, before, _| {
            let original = &caps[0];
            if before == Some('/') || !looks_like_token(original) {
                return None;
            }
            Some(self.token(Kind::Secret, original, map))
        });

        out = replace_matches(&PATH_RE, &out, |caps, before, _| {
            let original = &caps[0];
            let embedded = before.is_some_and(|c| c.is_ascii_alphanumeric() || ".:/-*".contains(c));
            if embedded
                || original.len() < 2
                || original.starts_with("/app/data/file-")
                || SYSTEM_PATHS
                    .iter()
                    .any(|p| original.contains(p) || format!("{}/", original) == *p)
            {
                return None;
            }
            Some(self.token(Kind::Path, original, map))
        });

        replace_matches(&DOMAIN_RE, &out, |caps, before, _| {
            let original = &caps[0];
            if original.ends_with(MASK_DOMAIN) || matches!(before, Some('@' | '.')) {
                return None;
            }
            Some(self.token(Kind::Domain, original, map))
        })
    }
}

/// Rebuild `text`, letting `f` replace each match.
///
/// `f` sees the captures plus the characters immediately before and after
/// the match and returns `None` to keep the match unchanged.
fn replace_matches(
    re: &Regex,
    text: &str,
    mut f: impl FnMut(&Captures<'_>, Option<char>, Option<char>) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let before = text[..whole.start()].chars().next_back();
        let after = text[whole.end()..].chars().next();
        if let Some(replacement) = f(&caps, before, after) {
            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
        }
    }
    out.push_str(&text[last..]);
    out
}

/// Base64 or hex blobs mix letters and digits; plain long words do not
fn looks_like_token(candidate: &str) -> bool {
    candidate.chars().any(|c| c.is_ascii_digit())
        && candidate.chars().any(|c| c.is_ascii_alphabetic())
        && !candidate.contains("//")
}

fn suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(5).collect()
}

/// Loopback and RFC 1918 ranges stay readable
fn is_private_ipv4(ip: &str) -> bool {
    let octets: Vec<u8> = ip.split('.').filter_map(|o| o.parse().ok()).collect();
    match octets.as_slice() {
        [127, ..] | [10, ..] | [192, 168, ..] => true,
        [172, second, ..] => (16..=31).contains(second),
        _ => false,
    }
}
