//! Finalize Module for the Octopus compiler
//!
//! Derives the scope identifier from the template text, runs the template and
//! style stages against it and assembles the output bundle. The [`Compiler`]
//! facade is the entry point every collaborator goes through.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cache::CompileCache;
use crate::config::CompileOptions;
use crate::image::ImageOptimizer;
use crate::parse::{parse_source, Frontmatter, ParsedScript};
use crate::scope::scope_css;
use crate::transform::TemplateCompiler;
use crate::validate::CompilerError;

const SCOPE_ID_LEN: usize = 6;
const SCOPE_ATTR_PREFIX: &str = "data-v-";

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE IDENTIFIER
// ═══════════════════════════════════════════════════════════════════════════════

/// Six hex characters of the SHA-256 of the template text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn from_template(template: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(template.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        ScopeId(digest[..SCOPE_ID_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `data-v-xxxxxx`, used as a boolean HTML attribute and inside `[...]`
    /// attribute selectors.
    pub fn attribute_name(&self) -> String {
        format!("{}{}", SCOPE_ATTR_PREFIX, self.0)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub html: String,
    /// Scoped stylesheet wrapped in `<style>`, or empty.
    pub css: String,
    /// Script wrapped in `<script>` with its original attributes, or empty.
    pub js: String,
    pub frontmatter: Frontmatter,
    pub scope: String,
}

impl CompilationResult {
    /// HTML, CSS and script in page-body order.
    pub fn bundle(&self) -> String {
        let mut out = String::with_capacity(self.html.len() + self.css.len() + self.js.len());
        out.push_str(&self.html);
        out.push_str(&self.css);
        out.push_str(&self.js);
        out
    }

    /// String-valued frontmatter entry.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.frontmatter.get(key).and_then(|v| v.as_str())
    }
}

fn wrap_style(css: &str) -> String {
    if css.trim().is_empty() {
        String::new()
    } else {
        format!("<style>{}</style>", css)
    }
}

fn wrap_script(script: &ParsedScript) -> String {
    if script.content.is_empty() {
        return String::new();
    }
    if script.attributes.is_empty() {
        format!("\n<script>{}\n</script>", script.content)
    } else {
        format!(
            "\n<script {}>{}\n</script>",
            script.attributes, script.content
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles `.oct` sources.
///
/// Holds only read-only configuration, so one instance can serve any number
/// of concurrent compiles.
#[derive(Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
    image_optimizer: Option<Arc<dyn ImageOptimizer>>,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            image_optimizer: None,
        }
    }

    pub fn with_image_optimizer(mut self, optimizer: Arc<dyn ImageOptimizer>) -> Self {
        self.image_optimizer = Some(optimizer);
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub async fn compile(&self, source: &str) -> Result<CompilationResult, CompilerError> {
        let parsed = parse_source(source);
        let scope = ScopeId::from_template(&parsed.template);
        let attr = scope.attribute_name();
        debug!(scope = %scope, "compiling source");

        let mut templates =
            TemplateCompiler::new(&attr).with_image_quality(self.options.image_quality);
        if let Some(optimizer) = &self.image_optimizer {
            templates = templates.with_image_optimizer(optimizer.as_ref());
        }

        let html = templates.compile(&parsed.template).await?;
        let css = wrap_style(&scope_css(&parsed.style, &attr));
        let js = wrap_script(&parsed.script);

        Ok(CompilationResult {
            html,
            css,
            js,
            frontmatter: parsed.frontmatter,
            scope: scope.to_string(),
        })
    }

    /// [`Compiler::compile`] on the current thread.
    pub fn compile_blocking(&self, source: &str) -> Result<CompilationResult, CompilerError> {
        futures::executor::block_on(self.compile(source))
    }

    pub async fn compile_file(&self, path: &Path) -> Result<CompilationResult, CompilerError> {
        let source = read_source(path)?;
        self.compile(&source).await
    }

    /// Compile through `cache`, keyed by canonical path and modification time.
    ///
    /// Concurrent calls for the same file may both miss and compile; callers
    /// that need at most one compile in flight per file must serialize them.
    pub async fn compile_file_cached(
        &self,
        cache: &CompileCache,
        path: &Path,
    ) -> Result<Arc<CompilationResult>, CompilerError> {
        let io_err = |source| CompilerError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = fs::canonicalize(path).map_err(io_err)?;
        let modified = fs::metadata(&canonical)
            .and_then(|meta| meta.modified())
            .map_err(io_err)?;

        if let Some(hit) = cache.get(&canonical, modified) {
            return Ok(hit);
        }

        match self.compile_file(&canonical).await {
            Ok(result) => {
                let result = Arc::new(result);
                cache.put(&canonical, modified, Arc::clone(&result));
                Ok(result)
            }
            Err(e) => {
                cache.invalidate(&canonical);
                Err(e)
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String, CompilerError> {
    fs::read_to_string(path).map_err(|source| CompilerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Compile a source document with default options and no image optimizer.
pub fn compile(source: &str) -> Result<CompilationResult, CompilerError> {
    Compiler::default().compile_blocking(source)
}

/// Read `path` and compile it with default options.
pub fn compile_file(path: &Path) -> Result<CompilationResult, CompilerError> {
    let source = read_source(path)?;
    compile(&source)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_id_is_deterministic() {
        let a = ScopeId::from_template("<p>x</p>");
        let b = ScopeId::from_template("<p>x</p>");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 6);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, ScopeId::from_template("<p>y</p>"));
    }

    #[test]
    fn test_scope_id_of_empty_template() {
        // SHA-256("") = e3b0c442...
        assert_eq!(ScopeId::from_template("").as_str(), "e3b0c4");
        assert_eq!(
            ScopeId::from_template("").attribute_name(),
            "data-v-e3b0c4"
        );
    }

    #[test]
    fn test_wrap_style_skips_empty() {
        assert_eq!(wrap_style("  \n"), "");
        assert_eq!(wrap_style("a{}"), "<style>a{}</style>");
    }

    #[test]
    fn test_wrap_script_keeps_attributes() {
        let script = ParsedScript {
            content: "let x = 1;".to_string(),
            attributes: r#"type="module""#.to_string(),
        };
        assert_eq!(
            wrap_script(&script),
            "\n<script type=\"module\">let x = 1;\n</script>"
        );

        let bare = ParsedScript {
            content: "go()".to_string(),
            attributes: String::new(),
        };
        assert_eq!(wrap_script(&bare), "\n<script>go()\n</script>");
        assert_eq!(wrap_script(&ParsedScript::default()), "");
    }

    #[test]
    fn test_bundle_order() {
        let result = CompilationResult {
            html: "<p></p>".to_string(),
            css: "<style>p{}</style>".to_string(),
            js: "\n<script>x\n</script>".to_string(),
            frontmatter: Frontmatter::new(),
            scope: "abcdef".to_string(),
        };
        assert_eq!(
            result.bundle(),
            "<p></p><style>p{}</style>\n<script>x\n</script>"
        );
    }
}
