//! Validation tables and the compiler error taxonomy.
//!
//! Every fatal error carries a stable code and a guarantee sentence describing
//! the invariant it protects. Recoverable conditions (frontmatter, selectors,
//! image optimization) never reach this type; they are logged and degraded.

use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_DISALLOWED_TAG: &str = "OCT-ERR-TAG-001";
pub const ERR_UNKNOWN_COMPONENT: &str = "OCT-ERR-COMPONENT-001";
pub const ERR_UNRESOLVABLE_COMPONENT: &str = "OCT-ERR-COMPONENT-002";
pub const ERR_MALFORMED_MARKUP: &str = "OCT-ERR-PARSE-001";
pub const ERR_IO: &str = "OCT-ERR-IO-001";
pub const ERR_CONFIG: &str = "OCT-ERR-CONFIG-001";

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_DISALLOWED_TAG => "Only allow-listed plain tags reach the emitted HTML.",
        ERR_UNKNOWN_COMPONENT => "Every component reference is resolved at compile time.",
        ERR_UNRESOLVABLE_COMPONENT => {
            "Every component resolves to exactly one allow-listed concrete tag."
        }
        ERR_MALFORMED_MARKUP => "Templates form a single well-nested element tree.",
        ERR_IO => "Sources are read in full before compilation starts.",
        ERR_CONFIG => "Compiler options are validated before any source is compiled.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("disallowed tag <{tag}> at {line}:{column}")]
    DisallowedTag {
        tag: String,
        line: u32,
        column: u32,
    },

    #[error("unknown component <{name}> at {line}:{column}")]
    UnknownComponent {
        name: String,
        line: u32,
        column: u32,
    },

    #[error("cannot resolve component <{name}> at {line}:{column}: {reason}")]
    UnresolvableComponent {
        name: String,
        reason: String,
        line: u32,
        column: u32,
    },

    #[error("malformed markup at {line}:{column}: {message}")]
    MalformedMarkup {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid compiler options in {path}: {message}")]
    Config { path: PathBuf, message: String },
}

impl CompilerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::DisallowedTag { .. } => ERR_DISALLOWED_TAG,
            Self::UnknownComponent { .. } => ERR_UNKNOWN_COMPONENT,
            Self::UnresolvableComponent { .. } => ERR_UNRESOLVABLE_COMPONENT,
            Self::MalformedMarkup { .. } => ERR_MALFORMED_MARKUP,
            Self::Io { .. } => ERR_IO,
            Self::Config { .. } => ERR_CONFIG,
        }
    }

    pub fn guarantee(&self) -> &'static str {
        get_guarantee(self.code())
    }

    /// `[CODE] message`, the form errors take across the Node boundary.
    /// The message already carries the line and column.
    pub fn tagged_message(&self) -> String {
        format!("[{}] {}", self.code(), self)
    }

    /// Position inside the template text, when the error has one.
    pub fn location(&self) -> Option<(u32, u32)> {
        match self {
            Self::DisallowedTag { line, column, .. }
            | Self::UnknownComponent { line, column, .. }
            | Self::UnresolvableComponent { line, column, .. }
            | Self::MalformedMarkup { line, column, .. } => Some((*line, *column)),
            Self::Io { .. } | Self::Config { .. } => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG TABLES
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// Plain tags a template may use directly.
    pub static ref ALLOWED_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        // Headings
        for tag in ["h1", "h2", "h3", "h4", "h5", "h6"] {
            s.insert(tag);
        }
        // Lists
        for tag in ["ul", "ol", "li", "dl", "dt", "dd"] {
            s.insert(tag);
        }
        // Structure
        for tag in [
            "div", "section", "article", "header", "footer", "main", "nav", "aside",
            "figure", "figcaption", "table", "thead", "tbody", "tfoot", "tr", "th", "td",
            "picture", "video", "audio", "details", "summary",
        ] {
            s.insert(tag);
        }
        // Interactive
        for tag in ["a", "button", "form", "label", "select", "option", "textarea", "fieldset", "legend"] {
            s.insert(tag);
        }
        // Text-level semantics
        for tag in [
            "p", "span", "strong", "em", "b", "i", "u", "small", "mark", "code", "pre",
            "blockquote", "abbr", "cite", "q", "sub", "sup", "time",
        ] {
            s.insert(tag);
        }
        // Void
        for tag in VOID_TAGS.iter() {
            s.insert(*tag);
        }
        s
    };

    /// Tags that never take children or a closing tag.
    pub static ref VOID_TAGS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in [
            "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
            "source", "track", "wbr",
        ] {
            s.insert(tag);
        }
        s
    };
}

pub fn is_allowed_tag(tag: &str) -> bool {
    ALLOWED_TAGS.contains(tag)
}

pub fn is_void_tag(tag: &str) -> bool {
    VOID_TAGS.contains(tag)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_message_has_location_once() {
        let err = CompilerError::UnknownComponent {
            name: "Foo".to_string(),
            line: 3,
            column: 7,
        };
        assert_eq!(
            err.tagged_message(),
            "[OCT-ERR-COMPONENT-001] unknown component <Foo> at 3:7"
        );
    }

    #[test]
    fn test_allow_list() {
        assert!(is_allowed_tag("div"));
        assert!(is_allowed_tag("h3"));
        assert!(is_allowed_tag("br"));
        assert!(!is_allowed_tag("script"));
        assert!(!is_allowed_tag("iframe"));
    }

    #[test]
    fn test_void_tags_are_allowed() {
        for tag in VOID_TAGS.iter() {
            assert!(is_allowed_tag(tag), "{} should be allowed", tag);
        }
        assert!(!is_void_tag("div"));
    }

    #[test]
    fn test_error_codes_and_location() {
        let err = CompilerError::UnknownComponent {
            name: "Foo".to_string(),
            line: 2,
            column: 5,
        };
        assert_eq!(err.code(), ERR_UNKNOWN_COMPONENT);
        assert_eq!(err.location(), Some((2, 5)));
        assert!(err.to_string().contains("<Foo>"));
        assert!(err.guarantee().contains("resolved"));
    }
}
