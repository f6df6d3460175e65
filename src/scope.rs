//! CSS scoping.
//!
//! Rewrites a stylesheet so that every selector also requires the component's
//! scope attribute. The stylesheet is split into top-level blocks by brace
//! matching; only selector preludes are rewritten, declaration bodies are
//! copied through untouched.
//!
//! - `@keyframes` blocks are emitted verbatim.
//! - Other block at-rules (`@media`, `@supports`, ...) are scoped recursively.
//! - `:global(sel)` opts a selector, or part of one, out of scoping.
//! - A selector that cannot be tokenized is emitted unscoped.
//! - At-rules nested deeper than [`MAX_AT_RULE_DEPTH`] are emitted verbatim.

use tracing::warn;

const GLOBAL_PREFIX: &str = ":global(";

/// Deepest at-rule nesting that is scoped.
pub const MAX_AT_RULE_DEPTH: usize = 32;

/// Scope every selector in `css` with the boolean attribute `attr`.
pub fn scope_css(css: &str, attr: &str) -> String {
    scope_blocks(css, attr, 0)
}

fn scope_blocks(css: &str, attr: &str, depth: usize) -> String {
    let mut out = String::with_capacity(css.len() + css.len() / 4);
    let mut pos = 0;

    while pos < css.len() {
        let (stop, is_block) = match find_block_start(css, pos) {
            Some(found) => found,
            None => {
                out.push_str(&css[pos..]);
                break;
            }
        };

        if !is_block {
            // statement at-rule or plain declaration: copy through the `;`
            out.push_str(&css[pos..=stop]);
            pos = stop + 1;
            continue;
        }

        let Some(close) = find_matching_brace(css, stop) else {
            out.push_str(&css[pos..]);
            break;
        };

        let (lead, prelude, trail) = split_prelude(&css[pos..stop]);
        let body = &css[stop + 1..close];
        out.push_str(lead);

        if prelude.starts_with('@') {
            out.push_str(prelude);
            out.push_str(trail);
            out.push('{');
            if is_keyframes(prelude) {
                out.push_str(body);
            } else if depth >= MAX_AT_RULE_DEPTH {
                warn!(prelude, depth, "at-rules nested too deeply, leaving body unscoped");
                out.push_str(body);
            } else {
                out.push_str(&scope_blocks(body, attr, depth + 1));
            }
            out.push('}');
        } else {
            out.push_str(&scope_selector_list(prelude, attr));
            out.push_str(trail);
            out.push('{');
            out.push_str(body);
            out.push('}');
        }

        pos = close + 1;
    }

    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// BLOCK SPLITTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte scanner that skips comments, strings and escapes.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos,
        }
    }

    /// Next significant byte and its offset.
    fn next(&mut self) -> Option<(usize, u8)> {
        while self.pos < self.bytes.len() {
            let i = self.pos;
            let b = self.bytes[i];
            match b {
                b'\\' => {
                    self.pos += 2;
                }
                b'/' if self.bytes.get(i + 1) == Some(&b'*') => {
                    self.pos = find_bytes(self.bytes, i + 2, b"*/")
                        .map(|end| end + 2)
                        .unwrap_or(self.bytes.len());
                }
                b'"' | b'\'' => {
                    self.pos = skip_string(self.bytes, i);
                }
                _ => {
                    self.pos += 1;
                    return Some((i, b));
                }
            }
        }
        None
    }
}

fn find_bytes(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Offset just past the string starting at `start`. An unterminated string
/// ends at the next newline.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    string_end(bytes, start).unwrap_or_else(|| {
        find_bytes(bytes, start + 1, b"\n").unwrap_or(bytes.len())
    })
}

/// Offset just past the closing quote, if the string is terminated on its line.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

/// First top-level `{` (block) or `;` (statement) at or after `pos`.
fn find_block_start(css: &str, pos: usize) -> Option<(usize, bool)> {
    let mut scanner = Scanner::new(css, pos);
    let mut parens = 0usize;
    while let Some((i, b)) = scanner.next() {
        match b {
            b'(' => parens += 1,
            b')' => parens = parens.saturating_sub(1),
            b'{' if parens == 0 => return Some((i, true)),
            b';' if parens == 0 => return Some((i, false)),
            _ => {}
        }
    }
    None
}

/// Offset of the `}` closing the `{` at `open`, counting nested braces.
fn find_matching_brace(css: &str, open: usize) -> Option<usize> {
    let mut scanner = Scanner::new(css, open + 1);
    let mut depth = 1usize;
    while let Some((i, b)) = scanner.next() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split raw prelude text into (leading whitespace + comments, prelude, trailing whitespace).
fn split_prelude(raw: &str) -> (&str, &str, &str) {
    let mut start = 0;
    loop {
        let rest = &raw[start..];
        let trimmed = rest.trim_start();
        start += rest.len() - trimmed.len();
        if trimmed.starts_with("/*") {
            match trimmed[2..].find("*/") {
                Some(end) => start += 2 + end + 2,
                None => break,
            }
        } else {
            break;
        }
    }
    let prelude = raw[start..].trim_end();
    let end = start + prelude.len();
    (&raw[..start], prelude, &raw[end..])
}

fn is_keyframes(prelude: &str) -> bool {
    prelude
        .split_whitespace()
        .next()
        .map(|name| name.to_ascii_lowercase().ends_with("keyframes"))
        .unwrap_or(false)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTOR REWRITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Scope each comma-separated selector and rejoin with `", "`.
pub fn scope_selector_list(prelude: &str, attr: &str) -> String {
    split_top_level(prelude, ',')
        .into_iter()
        .map(|selector| scope_selector(selector.trim(), attr))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn scope_selector(selector: &str, attr: &str) -> String {
    if let Some(inner) = whole_global(selector) {
        return inner.trim().to_string();
    }

    let tokens = match tokenize_selector(selector) {
        Ok(tokens) => tokens,
        Err(reason) => {
            warn!(selector, reason, "leaving selector unscoped");
            return selector.to_string();
        }
    };

    tokens
        .into_iter()
        .map(|token| match token {
            SelectorToken::Separator(sep) => sep.to_string(),
            SelectorToken::Compound(compound) => scope_compound(compound, attr),
        })
        .collect()
}

#[derive(Debug, PartialEq)]
enum SelectorToken<'a> {
    /// Whitespace or a `>`, `+`, `~` combinator, kept verbatim.
    Separator(&'a str),
    Compound(&'a str),
}

fn tokenize_selector(selector: &str) -> Result<Vec<SelectorToken<'_>>, &'static str> {
    let bytes = selector.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' | b'\'' => {
                i = string_end(bytes, i).ok_or("unterminated string")?;
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => {
                depth = depth.checked_sub(1).ok_or("unbalanced closing bracket")?;
            }
            b'>' | b'+' | b'~' if depth == 0 => {
                push_compound(&mut tokens, selector, start, i);
                tokens.push(SelectorToken::Separator(&selector[i..i + 1]));
                start = i + 1;
            }
            _ if depth == 0 && b.is_ascii_whitespace() => {
                push_compound(&mut tokens, selector, start, i);
                let mut end = i;
                while end < bytes.len() && bytes[end].is_ascii_whitespace() {
                    end += 1;
                }
                tokens.push(SelectorToken::Separator(&selector[i..end]));
                start = end;
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    if depth != 0 {
        return Err("unbalanced brackets");
    }
    push_compound(&mut tokens, selector, start, bytes.len().min(i));
    Ok(tokens)
}

fn push_compound<'a>(tokens: &mut Vec<SelectorToken<'a>>, selector: &'a str, from: usize, to: usize) {
    if to > from {
        tokens.push(SelectorToken::Compound(&selector[from..to]));
    }
}

/// Add the scope attribute after the base selector, before any pseudo suffix.
fn scope_compound(compound: &str, attr: &str) -> String {
    if compound == "*" {
        return compound.to_string();
    }
    if compound.starts_with(':') {
        return unwrap_globals(compound);
    }
    match find_pseudo_start(compound) {
        Some(idx) => format!(
            "{}[{}]{}",
            &compound[..idx],
            attr,
            unwrap_globals(&compound[idx..])
        ),
        None => format!("{}[{}]", compound, attr),
    }
}

/// Offset of the first `:` outside brackets, parentheses and escapes.
fn find_pseudo_start(compound: &str) -> Option<usize> {
    let bytes = compound.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Inner text when the whole selector is a single `:global(...)`.
fn whole_global(selector: &str) -> Option<&str> {
    let inner = selector.strip_prefix(GLOBAL_PREFIX)?;
    let close = matching_paren(inner)?;
    if close == inner.len() - 1 {
        Some(&inner[..close])
    } else {
        None
    }
}

/// Replace every `:global(x)` in `text` with `x`.
fn unwrap_globals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find(GLOBAL_PREFIX) {
        out.push_str(&rest[..idx]);
        let after = &rest[idx + GLOBAL_PREFIX.len()..];
        match matching_paren(after) {
            Some(close) => {
                out.push_str(after[..close].trim());
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[idx..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Offset of the `)` closing an already-opened parenthesis.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` outside parentheses, brackets and strings.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
