//! Parse Module for the Octopus compiler
//!
//! Splits a raw `.oct` source into frontmatter, template, style and script.
//! Missing or unclosed sections are absent, never errors.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

pub type Frontmatter = Map<String, Value>;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE SECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedScript {
    pub content: String,
    /// Raw attribute text of the opening tag, passed through untouched.
    pub attributes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSource {
    pub frontmatter: Frontmatter,
    pub template: String,
    pub style: String,
    pub script: ParsedScript,
}

lazy_static! {
    /// Leading `---` block. The closing fence must sit on its own line.
    static ref FRONTMATTER_REGEX: Regex =
        Regex::new(r"^\s*---[ \t]*\r?\n(?s:(.*?))\r?\n---[ \t]*(?:\r?\n|$)").unwrap();

    static ref TEMPLATE_REGEX: Regex =
        Regex::new(r"(?is)<template\b([^>]*)>(.*?)</template\s*>").unwrap();

    static ref STYLE_REGEX: Regex =
        Regex::new(r"(?is)<style\b([^>]*)>(.*?)</style\s*>").unwrap();

    static ref SCRIPT_REGEX: Regex =
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").unwrap();

    /// Opening section tag, possibly cut off before its `>`.
    static ref SECTION_OPEN_REGEX: Regex =
        Regex::new(r"(?i)<(?:template|style|script)\b[^>]*>?").unwrap();

    static ref SECTION_CLOSE_REGEX: Regex =
        Regex::new(r"(?i)</(?:template|style|script)\s*>").unwrap();

    static ref STYLE_CLOSE_REGEX: Regex = Regex::new(r"(?i)</style\s*>").unwrap();

    static ref SCRIPT_CLOSE_REGEX: Regex = Regex::new(r"(?i)</script\s*>").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRONTMATTER
// ═══════════════════════════════════════════════════════════════════════════════

/// Split the frontmatter block off `source`.
///
/// Returns the parsed mapping and the remaining body. Invalid YAML, or YAML
/// that is not a mapping, yields an empty mapping and a warning.
pub fn split_frontmatter(source: &str) -> (Frontmatter, &str) {
    let Some(caps) = FRONTMATTER_REGEX.captures(source) else {
        return (Frontmatter::new(), source);
    };
    let whole = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let body = &source[whole..];
    let text = caps.get(1).map(|m| m.as_str()).unwrap_or("");

    (parse_frontmatter(text), body)
}

pub fn parse_frontmatter(text: &str) -> Frontmatter {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => Frontmatter::new(),
        Ok(other) => {
            warn!(
                kind = value_kind(&other),
                "frontmatter is not a key/value mapping, ignoring it"
            );
            Frontmatter::new()
        }
        Err(e) => {
            warn!(error = %e, "invalid frontmatter YAML, ignoring it");
            Frontmatter::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SECTION EXTRACTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract all four sections of a source document.
///
/// Only the first occurrence of each section tag counts. Without a
/// `<template>` wrapper the template is whatever body text remains once the
/// style and script blocks are removed.
pub fn parse_source(source: &str) -> ParsedSource {
    let (frontmatter, body) = split_frontmatter(source);

    let style_match = STYLE_REGEX.captures(body);
    let script_match = SCRIPT_REGEX.captures(body);

    let style = style_match
        .as_ref()
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let script = script_match
        .as_ref()
        .map(|caps| ParsedScript {
            attributes: caps.get(1).map(|m| m.as_str().trim()).unwrap_or("").to_string(),
            content: caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string(),
        })
        .unwrap_or_default();

    let template = match TEMPLATE_REGEX.captures(body) {
        Some(caps) => caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string(),
        None => {
            let mut removed: Vec<(usize, usize)> = style_match
                .iter()
                .chain(script_match.iter())
                .filter_map(|caps| caps.get(0))
                .map(|m| (m.start(), m.end()))
                .collect();
            removed.sort_unstable();
            strip_stray_sections(&strip_ranges(body, &removed))
                .trim()
                .to_string()
        }
    };

    ParsedSource {
        frontmatter,
        template,
        style,
        script,
    }
}

/// Remove byte ranges from `text`. Overlapping ranges (a style block inside a
/// script, say) are folded into the earlier one.
fn strip_ranges(text: &str, ranges: &[(usize, usize)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in ranges {
        if start >= cursor {
            out.push_str(&text[cursor..start]);
        }
        cursor = cursor.max(end);
    }
    out.push_str(&text[cursor..]);
    out
}

/// Drop section tags left in a wrapperless body: a `<template>` opener, a
/// `<style>`/`<script>` block with its content (up to the next section tag or
/// end of input when it is never closed), and stray closing tags.
fn strip_stray_sections(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(open) = SECTION_OPEN_REGEX.find_at(text, pos) {
        out.push_str(&text[pos..open.start()]);
        let tag = open.as_str()[1..].to_ascii_lowercase();
        pos = if tag.starts_with("template") {
            open.end()
        } else {
            let close: &Regex = if tag.starts_with("style") {
                &STYLE_CLOSE_REGEX
            } else {
                &SCRIPT_CLOSE_REGEX
            };
            match close.find_at(text, open.end()) {
                Some(end) => end.end(),
                None => {
                    warn!(section = %tag.trim_end_matches('>'), "unclosed section dropped");
                    SECTION_OPEN_REGEX
                        .find_at(text, open.end())
                        .map(|next| next.start())
                        .unwrap_or(text.len())
                }
            }
        };
    }
    out.push_str(&text[pos..]);
    SECTION_CLOSE_REGEX.replace_all(&out, "").into_owned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
