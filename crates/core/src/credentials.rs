//! Cookie credential translation.
//!
//! Callers hand us cookies in whatever shape they have: a raw `a=1; b=2`
//! string (optionally prefixed with `Cookie:`), a Netscape cookie-jar file,
//! or a header value. The jar is the canonical on-disk form because the
//! fetch tool only accepts cookies as a file path.

use std::path::{Path, PathBuf};

use tokio::fs;

pub const JAR_HEADER: &str = "# Netscape HTTP Cookie File";
pub const JAR_FILE_NAME: &str = "cookies.txt";

/// 2038-01-19, the largest expiry every jar reader accepts.
const FAR_FUTURE_EXPIRY: i64 = 2_147_483_647;
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";
const JAR_FIELD_COUNT: usize = 7;

/// Caller-supplied cookie material in any of the accepted textual forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input so "no cookies" and "empty cookies" are the same thing.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Jar text with raw cookies scoped to the host of `url`.
    pub fn to_jar(&self, url: &str) -> String {
        to_jar_format(&self.0, &cookie_domain(url))
    }

    /// `Cookie` header value, or `None` when no `name=value` pair survives translation.
    pub fn to_header(&self, url: &str) -> Option<String> {
        let header = jar_to_header(&self.to_jar(url));
        (!header.is_empty()).then_some(header)
    }
}

/// Catch-all domain for `url`: `https://www.youtube.com/watch` → `.youtube.com`.
pub fn cookie_domain(url: &str) -> String {
    let host = url::Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase));

    match host {
        Some(host) => {
            let bare = host
                .strip_prefix("www.")
                .or_else(|| host.strip_prefix("m."))
                .unwrap_or(&host);
            format!(".{bare}")
        }
        None => ".".to_string(),
    }
}

pub fn looks_like_jar(text: &str) -> bool {
    text.contains('\t')
        || text
            .lines()
            .any(|l| l.trim_start().starts_with(JAR_HEADER) || l.trim() == "# HTTP Cookie File")
}

/// `name=value` pairs of a raw cookie string, in input order.
///
/// Line breaks separate pairs like `;` does, so pasted multi-line text never
/// leaks a newline into a jar record.
pub fn parse_cookie_pairs(text: &str) -> Vec<(String, String)> {
    strip_cookie_label(text)
        .split([';', '\n', '\r'])
        .filter_map(|segment| segment.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn strip_cookie_label(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.get(..7) {
        Some(label) if label.eq_ignore_ascii_case("cookie:") => trimmed[7..].trim_start(),
        _ => trimmed,
    }
}

/// Converts raw cookie text into jar format. Jar input, and input without a
/// single `name=value` pair, is returned unchanged.
pub fn to_jar_format(cookie_text: &str, domain: &str) -> String {
    if looks_like_jar(cookie_text) {
        return cookie_text.to_string();
    }

    let pairs = parse_cookie_pairs(cookie_text);
    if pairs.is_empty() {
        return cookie_text.to_string();
    }

    let mut jar = String::from(JAR_HEADER);
    jar.push('\n');
    for (name, value) in pairs {
        jar.push_str(&format!(
            "{domain}\tTRUE\t/\tTRUE\t{FAR_FUTURE_EXPIRY}\t{name}\t{value}\n"
        ));
    }
    jar
}

/// Joins the name/value fields of every well-formed jar record as `a=1; b=2`.
pub fn jar_to_header(jar_text: &str) -> String {
    jar_text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .map(|line| line.strip_prefix(HTTP_ONLY_PREFIX).unwrap_or(line))
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            (fields.len() == JAR_FIELD_COUNT).then(|| format!("{}={}", fields[5], fields[6]))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Persists `jar_text` inside `dir` for tools that want a cookie file path.
pub async fn write_jar_file(dir: &Path, jar_text: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(JAR_FILE_NAME);
    fs::write(&path, jar_text).await?;
    Ok(path)
}
