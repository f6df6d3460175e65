//! Page shell rendering.
//!
//! Drops a compiled bundle into an HTML shell, filling the head metadata from
//! frontmatter. Placeholders are `{{title}}`, `{{description}}`, `{{lang}}`,
//! `{{style}}` and `{{body}}`, matched case-insensitively. They are
//! substituted in a single pass, so text inserted for one placeholder is never
//! rescanned for another.
//!
//! When the shell has a `{{style}}` slot the stylesheet goes there and the
//! body gets HTML and script only. Otherwise the whole bundle goes to `{{body}}`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::attribute::escape_attr;
use crate::finalize::CompilationResult;

pub const DEFAULT_SHELL: &str = "<!doctype html>\n<html lang=\"{{lang}}\">\n<head>\n<meta charset=\"utf-8\">\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n{{style}}\n<title>{{title}}</title>\n<meta name=\"description\" content=\"{{description}}\">\n</head>\n<body>\n{{body}}\n</body>\n</html>\n";

const DEFAULT_LANG: &str = "en";

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex =
        Regex::new(r"(?i)\{\{\s*(title|description|lang|style|body)\s*\}\}").unwrap();
}

/// Render `result` into `shell`.
///
/// `fallback_title` is used when the frontmatter has no `title`.
pub fn render_page(shell: &str, result: &CompilationResult, fallback_title: &str) -> String {
    render_page_with_params(shell, result, fallback_title, &BTreeMap::new())
}

/// Like [`render_page`], and exposes route params to the page script as
/// `window.__OCTO_PARAMS__` when there are any.
pub fn render_page_with_params(
    shell: &str,
    result: &CompilationResult,
    fallback_title: &str,
    params: &BTreeMap<String, String>,
) -> String {
    let title = meta_text(result, "title").unwrap_or_else(|| fallback_title.to_string());
    let description = meta_text(result, "description").unwrap_or_default();
    let lang = meta_text(result, "lang").unwrap_or_else(|| DEFAULT_LANG.to_string());

    let mut has_style = false;
    let mut has_body = false;
    for caps in PLACEHOLDER_REGEX.captures_iter(shell) {
        match caps[1].to_ascii_lowercase().as_str() {
            "style" => has_style = true,
            "body" => has_body = true,
            _ => {}
        }
    }
    if !has_body {
        warn!("page shell has no {{{{body}}}} slot, the page will render empty");
    }

    let mut body = params_script(params);
    if has_style {
        body.push_str(&result.html);
        body.push_str(&result.js);
    } else {
        body.push_str(&result.bundle());
    }

    PLACEHOLDER_REGEX
        .replace_all(shell, |caps: &Captures| {
            match caps[1].to_ascii_lowercase().as_str() {
                "title" => escape_attr(&title),
                "description" => escape_attr(&description),
                "lang" => escape_attr(&lang),
                "style" => result.css.clone(),
                _ => body.clone(),
            }
        })
        .into_owned()
}

fn meta_text(result: &CompilationResult, key: &str) -> Option<String> {
    match result.frontmatter.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn params_script(params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return String::new();
    }
    let json = serde_json::to_string(params)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/");
    format!("<script>window.__OCTO_PARAMS__ = {}</script>", json)
}
