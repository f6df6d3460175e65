//! # Octopus Compiler
//!
//! Compiles single-file `.oct` sources (frontmatter, template, style and
//! script) into a self-contained HTML bundle.
//!
//! ## Pipeline
//!
//! 1. **Split** (`parse`): frontmatter, first `<template>`, first `<style>`,
//!    first `<script>` plus its raw opening-tag attributes.
//! 2. **Scope id** (`finalize`): six hex characters of the SHA-256 of the
//!    template text, emitted as the boolean attribute `data-v-xxxxxx`.
//! 3. **Template** (`template`, `transform`): parse the markup, validate
//!    every tag, resolve components, stamp every element with the scope id.
//! 4. **Style** (`scope`): append `[data-v-xxxxxx]` to every selector
//!    outside `@keyframes` and `:global(...)`.
//! 5. **Assemble** (`finalize`): HTML, then `<style>`, then `<script>`.
//!
//! ## Invariants
//!
//! 1. **Scoping Coverage**: every element emitted by the template stage
//!    carries the scope attribute, plain or component-resolved, at any depth.
//!
//! 2. **Closed Tag Set**: lowercase tags must be in the allow-list
//!    (OCT-ERR-TAG-001); uppercase tags must name a registered component
//!    (OCT-ERR-COMPONENT-001) that resolves to an allowed tag
//!    (OCT-ERR-COMPONENT-002).
//!
//! 3. **No Partial Output**: a fatal error aborts the whole compile. The
//!    image optimizer is not called for a template that fails validation.
//!
//! 4. **Degrade, Don't Fail**: bad frontmatter, an unparsable selector and a
//!    failed image optimization are logged with `tracing` and compilation
//!    continues.
//!
//! 5. **Void Elements**: `br`, `img`, `input` and the other void tags never
//!    get a closing tag.

#[cfg(feature = "napi")]
mod napi_bridge;

mod attribute;
mod cache;
mod component;
mod config;
mod discovery;
mod document;
mod finalize;
mod image;
mod parse;
mod scope;
mod template;
mod transform;
mod validate;

#[cfg(test)]
mod pipeline_tests;

pub use attribute::{AttrValue, Attributes};
pub use cache::CompileCache;
pub use component::{registry, ComponentRegistry, ComponentSpec, ResolvedTag, TagRule};
pub use config::{CompileOptions, DEFAULT_IMAGE_QUALITY};
pub use discovery::{compile_dir, discover_sources, write_bundles, BatchFailure, BatchReport};
pub use document::{render_page, render_page_with_params, DEFAULT_SHELL};
pub use finalize::{compile, compile_file, CompilationResult, Compiler, ScopeId};
pub use image::{is_local_source, ImageError, ImageOptimizer};
pub use parse::{parse_source, split_frontmatter, Frontmatter, ParsedScript, ParsedSource};
pub use scope::{scope_css, scope_selector, scope_selector_list, MAX_AT_RULE_DEPTH};
pub use template::{
    parse_template, ElementNode, MarkupNode, SourceLocation, TagKind, TextNode, MAX_NESTING_DEPTH,
};
pub use transform::{compile_template, TemplateCompiler};
pub use validate::*;

#[cfg(feature = "napi")]
pub use napi_bridge::{compile_octopus_native, render_page_native};
