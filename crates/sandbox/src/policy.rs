//! Per-tool content-security policy composition and HTML injection.
//!
//! The host never enforces the policy itself; it hands the platform's web
//! engine a `<meta http-equiv="Content-Security-Policy">` tag at the top of
//! every HTML document it serves.

use std::{collections::BTreeMap, fmt};

use {toolbay_common::Tool, tracing::warn};

/// An ordered list of directives, each with its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    directives: Vec<(String, Vec<String>)>,
}

impl Policy {
    /// Sources of `directive`, if present.
    #[must_use]
    pub fn directive(&self, directive: &str) -> Option<&[String]> {
        self.directives
            .iter()
            .find(|(name, _)| name == directive)
            .map(|(_, sources)| sources.as_slice())
    }

    /// Add `source` to `directive`, creating the directive seeded with
    /// `'self'` if it does not exist yet. Never removes anything.
    fn extend(&mut self, directive: &str, source: &str) {
        let idx = match self.directives.iter().position(|(name, _)| name == directive) {
            Some(idx) => idx,
            None => {
                self.directives
                    .push((directive.to_string(), vec!["'self'".to_string()]));
                self.directives.len() - 1
            },
        };
        let sources = &mut self.directives[idx].1;
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, sources)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(name)?;
            for source in sources {
                write!(f, " {source}")?;
            }
        }
        Ok(())
    }
}

/// Builds policies from a fixed baseline plus consent-gated exceptions.
#[derive(Debug, Clone)]
pub struct PolicyComposer {
    scheme: String,
}

impl PolicyComposer {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
        }
    }

    /// The policy every tool gets regardless of consent.
    #[must_use]
    pub fn baseline(&self) -> Policy {
        let d = |name: &str, sources: &[&str]| {
            (
                name.to_string(),
                sources.iter().map(|s| (*s).to_string()).collect::<Vec<_>>(),
            )
        };
        let scheme_source = format!("{}:", self.scheme);
        Policy {
            directives: vec![
                d("default-src", &["'self'"]),
                d("script-src", &["'self'", "'unsafe-inline'", scheme_source.as_str()]),
                d("style-src", &["'self'", "'unsafe-inline'"]),
                d("img-src", &["'self'", "data:", "https:"]),
                d("font-src", &["'self'", "data:"]),
                d("connect-src", &["'self'"]),
            ],
        }
    }

    /// Compose the policy for `tool`.
    ///
    /// Exceptions are only applied when `consent_granted`; without consent
    /// the result is exactly the baseline. Malformed directive names or
    /// sources are dropped rather than passed through, since they come from
    /// a third-party manifest.
    #[must_use]
    pub fn compose(
        &self,
        tool: &Tool,
        consent_granted: bool,
        exceptions: &BTreeMap<String, Vec<String>>,
    ) -> Policy {
        let mut policy = self.baseline();
        if !consent_granted {
            return policy;
        }
        for (directive, sources) in exceptions {
            if !is_valid_directive(directive) {
                warn!(tool_id = %tool.id, directive, "dropping malformed policy directive");
                continue;
            }
            for source in sources {
                if is_valid_source(source) {
                    policy.extend(directive, source);
                } else {
                    warn!(tool_id = %tool.id, directive, source, "dropping malformed policy source");
                }
            }
        }
        policy
    }

    /// [`compose`](Self::compose), rendered as policy text.
    #[must_use]
    pub fn build_policy(
        &self,
        tool: &Tool,
        consent_granted: bool,
        exceptions: &BTreeMap<String, Vec<String>>,
    ) -> String {
        self.compose(tool, consent_granted, exceptions).to_string()
    }
}

fn is_valid_directive(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase() || b == b'-')
}

/// A source token may not carry separators that would start another
/// directive or break out of the meta attribute. Quotes are allowed only as
/// the `'keyword'` / `'nonce-…'` wrapper.
fn is_valid_source(source: &str) -> bool {
    if source.is_empty()
        || source
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | ',' | '"' | '<' | '>'))
    {
        return false;
    }
    match source.strip_prefix('\'') {
        Some(rest) => rest
            .strip_suffix('\'')
            .is_some_and(|inner| !inner.is_empty() && !inner.contains('\'')),
        None => !source.contains('\''),
    }
}

// ── HTML injection ──────────────────────────────────────────────────────────

/// The `<meta>` tag carrying `policy`, attribute-escaped.
#[must_use]
pub fn meta_tag(policy: &str) -> String {
    let escaped = policy.replace('&', "&amp;").replace('"', "&quot;");
    format!(r#"<meta http-equiv="Content-Security-Policy" content="{escaped}">"#)
}

/// Insert the policy tag as early in the document as possible.
///
/// Preference order: before `</head>`, after `<head>`, after `<body>`,
/// inside a fresh `<head>` right after `<html>`, and finally wrapping the
/// whole fragment in a minimal document.
#[must_use]
pub fn inject_into_html(html: &str, policy: &str) -> String {
    let tag = meta_tag(policy);
    // ASCII lowercasing keeps byte offsets identical to `html`.
    let lower = html.to_ascii_lowercase();

    if let Some(pos) = lower.find("</head>") {
        return splice(html, pos, &tag);
    }
    if let Some(end) = find_open_tag_end(&lower, "head") {
        return splice(html, end, &tag);
    }
    if let Some(end) = find_open_tag_end(&lower, "body") {
        return splice(html, end, &tag);
    }
    if let Some(end) = find_open_tag_end(&lower, "html") {
        return splice(html, end, &format!("<head>{tag}</head>"));
    }
    format!("<!DOCTYPE html><html><head>{tag}</head><body>{html}</body></html>")
}

fn splice(html: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(html.len() + insert.len());
    out.push_str(&html[..at]);
    out.push_str(insert);
    out.push_str(&html[at..]);
    out
}

/// Byte offset just past the `>` of the first `<name …>` opening tag.
/// `<header>` does not count as `<head>`.
fn find_open_tag_end(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("<{name}");
    let mut from = 0;
    while let Some(rel) = lower[from..].find(&needle) {
        let after = from + rel + needle.len();
        match lower.as_bytes().get(after) {
            Some(b'>') => return Some(after + 1),
            Some(b) if b.is_ascii_whitespace() || *b == b'/' => {
                return lower[after..].find('>').map(|gt| after + gt + 1);
            },
            Some(_) => from = after,
            None => return None,
        }
    }
    None
}
