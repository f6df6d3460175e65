//! Template compilation.
//!
//! Walks the markup tree depth-first, left to right, resolving components,
//! normalizing attributes and stamping every emitted element with the scope
//! attribute. Image sources may be rewritten by the optimizer before the
//! attributes are serialized; sibling subtrees are compiled concurrently and
//! every pending optimization is awaited before the HTML is returned.

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::attribute::{AttrValue, Attributes};
use crate::component::{registry, ComponentSpec, ResolvedTag, IMAGE_COMPONENT};
use crate::config::DEFAULT_IMAGE_QUALITY;
use crate::image::{is_local_source, ImageOptimizer};
use crate::template::{parse_template, ElementNode, MarkupNode, TagKind};
use crate::validate::{is_allowed_tag, is_void_tag, CompilerError};

pub struct TemplateCompiler<'a> {
    scope_attr: &'a str,
    image_optimizer: Option<&'a dyn ImageOptimizer>,
    image_quality: u8,
}

impl<'a> TemplateCompiler<'a> {
    pub fn new(scope_attr: &'a str) -> Self {
        Self {
            scope_attr,
            image_optimizer: None,
            image_quality: DEFAULT_IMAGE_QUALITY,
        }
    }

    pub fn with_image_optimizer(mut self, optimizer: &'a dyn ImageOptimizer) -> Self {
        self.image_optimizer = Some(optimizer);
        self
    }

    pub fn with_image_quality(mut self, quality: u8) -> Self {
        self.image_quality = quality;
        self
    }

    /// Compile template text into scoped HTML.
    ///
    /// The whole tree is validated before anything is emitted, so a bad tag
    /// anywhere aborts the compile without calling the image optimizer.
    pub async fn compile(&self, template: &str) -> Result<String, CompilerError> {
        if template.trim().is_empty() {
            return Ok(String::new());
        }

        let nodes = parse_template(template)?;
        validate_nodes(&nodes)?;

        let parts = try_join_all(nodes.iter().map(|node| self.compile_node(node))).await?;
        Ok(parts.concat())
    }

    fn compile_node<'n>(&'n self, node: &'n MarkupNode) -> BoxFuture<'n, Result<String, CompilerError>> {
        async move {
            match node {
                MarkupNode::Text(text) => Ok(text.value.clone()),
                MarkupNode::Element(el) => self.compile_element(el).await,
            }
        }
        .boxed()
    }

    async fn compile_element(&self, el: &ElementNode) -> Result<String, CompilerError> {
        let mut attrs = el.attributes.clone();

        let resolved = match &el.kind {
            TagKind::Plain(name) => {
                ensure_allowed(el, name)?;
                ResolvedTag {
                    tag: name.clone(),
                    void: is_void_tag(name),
                }
            }
            TagKind::Component(name) => {
                let spec = lookup(el, name)?;
                if name == IMAGE_COMPONENT {
                    self.optimize_image_src(&mut attrs).await;
                }
                resolve(el, spec, &mut attrs)?
            }
        };

        attrs.set(self.scope_attr, AttrValue::Str(String::new()));

        let mut out = format!("<{}{}>", resolved.tag, attrs.to_html());
        if resolved.void {
            return Ok(out);
        }

        let children = try_join_all(el.children.iter().map(|child| self.compile_node(child))).await?;
        out.push_str(&children.concat());
        out.push_str("</");
        out.push_str(&resolved.tag);
        out.push('>');
        Ok(out)
    }

    /// Failures keep the original path.
    async fn optimize_image_src(&self, attrs: &mut Attributes) {
        let Some(optimizer) = self.image_optimizer else {
            return;
        };
        let Some(src) = attrs.get("src").and_then(AttrValue::as_str).map(str::to_string) else {
            return;
        };
        if !is_local_source(&src) {
            return;
        }

        let quality = attrs
            .get("quality")
            .and_then(AttrValue::as_number)
            .map(|q| q.clamp(1.0, 100.0) as u8)
            .unwrap_or(self.image_quality);

        match optimizer.optimize(&src, quality).await {
            Ok(optimized) => {
                debug!(src = %src, optimized = %optimized, quality, "image optimized");
                attrs.set("src", AttrValue::Str(optimized));
            }
            Err(e) => {
                warn!(error = %e, src = %src, "image optimization failed, keeping original path");
            }
        }
    }
}

/// Compile template text without an image optimizer.
pub fn compile_template(template: &str, scope_attr: &str) -> Result<String, CompilerError> {
    futures::executor::block_on(TemplateCompiler::new(scope_attr).compile(template))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

fn validate_nodes(nodes: &[MarkupNode]) -> Result<(), CompilerError> {
    for node in nodes {
        if let MarkupNode::Element(el) = node {
            match &el.kind {
                TagKind::Plain(name) => ensure_allowed(el, name)?,
                TagKind::Component(name) => {
                    let spec = lookup(el, name)?;
                    resolve(el, spec, &mut el.attributes.clone())?;
                }
            }
            validate_nodes(&el.children)?;
        }
    }
    Ok(())
}

fn ensure_allowed(el: &ElementNode, name: &str) -> Result<(), CompilerError> {
    if is_allowed_tag(name) {
        Ok(())
    } else {
        Err(CompilerError::DisallowedTag {
            tag: name.to_string(),
            line: el.location.line,
            column: el.location.column,
        })
    }
}

fn lookup(el: &ElementNode, name: &str) -> Result<&'static ComponentSpec, CompilerError> {
    registry()
        .get(name)
        .ok_or_else(|| CompilerError::UnknownComponent {
            name: name.to_string(),
            line: el.location.line,
            column: el.location.column,
        })
}

fn resolve(
    el: &ElementNode,
    spec: &ComponentSpec,
    attrs: &mut Attributes,
) -> Result<ResolvedTag, CompilerError> {
    let unresolvable = |reason: String| CompilerError::UnresolvableComponent {
        name: spec.name.to_string(),
        reason,
        line: el.location.line,
        column: el.location.column,
    };

    let resolved = spec.resolve(attrs).map_err(unresolvable)?;
    if !is_allowed_tag(&resolved.tag) {
        return Err(unresolvable(format!(
            "resolves to disallowed tag <{}>",
            resolved.tag
        )));
    }
    Ok(resolved)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
