//! Pipeline Tests for the Octopus compiler
//!
//! End-to-end behaviour of `compile`:
//! - every emitted element carries the scope attribute
//! - keyframes stay unscoped while regular rules gain one clause per selector
//! - fatal errors produce no output

#[cfg(test)]
mod tests {
    use crate::cache::CompileCache;
    use crate::config::CompileOptions;
    use crate::document::{render_page, DEFAULT_SHELL};
    use crate::finalize::{compile, CompilationResult, Compiler, ScopeId};
    use crate::image::{ImageError, ImageOptimizer};
    use crate::validate::CompilerError;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::fs::{self, File};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    fn attr_for(template: &str) -> String {
        ScopeId::from_template(template).attribute_name()
    }

    /// Opening tags in `html`, without the leading `<`.
    fn opening_tags(html: &str) -> Vec<&str> {
        html.split('<')
            .skip(1)
            .filter(|chunk| !chunk.starts_with('/'))
            .filter_map(|chunk| chunk.split('>').next())
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // SCENARIOS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_row_with_title() {
        let template = r#"<Row><Title as="h2">Hi</Title></Row>"#;
        let result = compile(template).unwrap();
        let attr = attr_for(template);

        assert_eq!(
            result.html,
            format!(
                r#"<div class="row" style="display:flex" {attr}><h2 {attr}>Hi</h2></div>"#,
                attr = attr
            )
        );
        assert_eq!(result.css, "");
        assert_eq!(result.js, "");
        assert_eq!(result.scope.len(), 6);
    }

    #[test]
    fn test_style_scoping_with_keyframes() {
        let template = "<p class=\"a\">x</p>";
        let source = format!(
            "<template>{}</template><style>.a, .b:hover {{ color: red; }} @keyframes spin {{ from{{}} to{{}} }}</style>",
            template
        );
        let result = compile(&source).unwrap();
        let attr = attr_for(template);

        assert_eq!(
            result.css,
            format!(
                "<style>.a[{a}], .b[{a}]:hover {{ color: red; }} @keyframes spin {{ from{{}} to{{}} }}</style>",
                a = attr
            )
        );
    }

    #[test]
    fn test_unknown_component_produces_no_output() {
        let err = compile("<template><Foo/></template>").unwrap_err();
        match err {
            CompilerError::UnknownComponent { name, line, column } => {
                assert_eq!(name, "Foo");
                assert_eq!((line, column), (1, 1));
            }
            other => panic!("expected unknown component, got {:?}", other),
        }
    }

    #[test]
    fn test_disallowed_tag_reports_code() {
        let err = compile("<div><iframe src=\"x\"></iframe></div>").unwrap_err();
        assert_eq!(err.code(), crate::validate::ERR_DISALLOWED_TAG);
        assert!(err.to_string().contains("<iframe>"));
    }

    #[test]
    fn test_malformed_markup_is_fatal() {
        let err = compile("<div><p>x</div>").unwrap_err();
        assert!(matches!(err, CompilerError::MalformedMarkup { .. }));
    }

    #[test]
    fn test_unclosed_sections_still_compile() {
        let result = compile("<p>x</p>\n<style>p { color: red }").unwrap();
        assert_eq!(result.html, format!("<p {}>x</p>", attr_for("<p>x</p>")));
        assert_eq!(result.css, "");

        let result = compile("<template><p>x</p>").unwrap();
        assert_eq!(result.html, format!("<p {}>x</p>", attr_for("<p>x</p>")));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let depth = 10_000;
        let source = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let err = compile(&source).unwrap_err();
        assert!(matches!(err, CompilerError::MalformedMarkup { .. }));
        assert_eq!(err.code(), crate::validate::ERR_MALFORMED_MARKUP);
    }

    #[test]
    fn test_deep_component_nesting_is_an_error() {
        let depth = 5_000;
        let source = format!("{}x{}", "<Row>".repeat(depth), "</Row>".repeat(depth));
        assert!(matches!(
            compile(&source),
            Err(CompilerError::MalformedMarkup { .. })
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PROPERTIES
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_every_element_is_scoped() {
        let template = r#"<Center gap="16">
  <Title>Welcome</Title>
  <Column>
    <Text as="span">one</Text>
    <ul><li><Link href="/a">a</Link></li><li>b</li></ul>
    <Image src="https://cdn.example.com/x.png" alt="x"/>
    <p>line<br>break<hr/></p>
    <Row justify="center"><Button>Go</Button><Input name="q"></Row>
  </Column>
</Center>"#;
        let result = compile(template).unwrap();
        let attr = attr_for(template);

        let tags = opening_tags(&result.html);
        assert_eq!(tags.len(), 15);
        for tag in tags {
            assert!(tag.ends_with(&format!(" {}", attr)), "unscoped tag: <{}>", tag);
        }
    }

    #[test]
    fn test_void_elements_never_close() {
        let result = compile("<p>a<br>b<img src=\"https://x/y.png\"></img></p>").unwrap();
        assert!(!result.html.contains("</br>"));
        assert!(!result.html.contains("</img>"));
        assert!(result.html.ends_with("</p>"));
    }

    #[test]
    fn test_attribute_values_are_typed_and_escaped() {
        let result = compile(r#"<p title='say "hi"' hidden data-n="007" data-on=true data-off=false>x</p>"#).unwrap();
        assert!(result.html.contains(r#"title="say &quot;hi&quot;""#));
        assert!(result.html.contains(" hidden "));
        assert!(result.html.contains(r#"data-n="7""#));
        assert!(result.html.contains(" data-on "));
        assert!(result.html.contains(r#"data-off="false""#));
    }

    #[test]
    fn test_global_escape() {
        let template = "<p>x</p>";
        let source = format!(
            "{}<style>:global(body.dark) {{ color: white; }} :global(.theme) .card {{ margin: 0; }}</style>",
            template
        );
        let result = compile(&source).unwrap();
        let attr = attr_for(template);

        assert!(result.css.contains("body.dark { color: white; }"));
        assert!(!result.css.contains(&format!("body.dark[{}]", attr)));
        assert!(result.css.contains(&format!(".theme .card[{}] {{ margin: 0; }}", attr)));
    }

    #[test]
    fn test_scope_depends_on_template_only() {
        let a = compile("<template><p>same</p></template><style>p{color:red}</style>").unwrap();
        let b = compile("<template><p>same</p></template><style>p{color:blue}</style>").unwrap();
        let c = compile("<template><p>other</p></template>").unwrap();
        assert_eq!(a.scope, b.scope);
        assert_ne!(a.scope, c.scope);
    }

    #[test]
    fn test_script_passthrough_and_bundle() {
        let source = "---\ntitle: Home\n---\n<p>hi</p>\n<script type=\"module\">\nimport x from './x.js';\n</script>";
        let result = compile(source).unwrap();

        assert_eq!(
            result.js,
            "\n<script type=\"module\">import x from './x.js';\n</script>"
        );
        assert_eq!(result.meta("title"), Some("Home"));
        assert!(result.bundle().starts_with(&result.html));
        assert!(result.bundle().ends_with("</script>"));

        let page = render_page(DEFAULT_SHELL, &result, "index");
        assert!(page.contains("<title>Home</title>"));
        assert!(page.contains(&result.bundle()));
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = compile("<p>x</p>").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("html").is_some());
        assert!(json.get("frontmatter").unwrap().is_object());
        let back: CompilationResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // IMAGE OPTIMIZER
    // ═══════════════════════════════════════════════════════════════════════════════

    struct WebpOptimizer;

    impl ImageOptimizer for WebpOptimizer {
        fn optimize<'a>(
            &'a self,
            local_path: &'a str,
            quality: u8,
        ) -> BoxFuture<'a, Result<String, ImageError>> {
            async move {
                if local_path.contains("missing") {
                    return Err(ImageError::new(local_path, "no such file"));
                }
                Ok(format!("/_octo/{}.q{}.webp", local_path.trim_start_matches('/'), quality))
            }
            .boxed()
        }
    }

    #[test]
    fn test_compiler_uses_configured_quality() {
        let options = CompileOptions {
            image_quality: 50,
            ..CompileOptions::default()
        };
        let compiler = Compiler::new(options).with_image_optimizer(Arc::new(WebpOptimizer));

        let result = compiler
            .compile_blocking(r#"<Image src="/hero.png"/><Image src="/b.png" quality="90"/><Image src="/missing.png"/>"#)
            .unwrap();

        assert!(result.html.contains(r#"src="/_octo/hero.png.q50.webp""#));
        assert!(result.html.contains(r#"src="/_octo/b.png.q90.webp""#));
        assert!(result.html.contains(r#"src="/missing.png""#));
        assert!(!result.html.contains("quality"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // FILES & CACHE
    // ═══════════════════════════════════════════════════════════════════════════════

    fn touch(path: &std::path::Path, secs_from_now: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(secs_from_now))
            .unwrap();
    }

    #[test]
    fn test_compile_file_missing_is_io_error() {
        let err = crate::finalize::compile_file(std::path::Path::new("/nonexistent/page.oct"))
            .unwrap_err();
        assert!(matches!(err, CompilerError::Io { .. }));
    }

    #[test]
    fn test_cached_compile_hits_until_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.oct");
        fs::write(&path, "<p>one</p>").unwrap();

        let compiler = Compiler::default();
        let cache = CompileCache::new(compiler.options().cache_capacity);

        let first = futures::executor::block_on(compiler.compile_file_cached(&cache, &path)).unwrap();
        let second = futures::executor::block_on(compiler.compile_file_cached(&cache, &path)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        fs::write(&path, "<p>two</p>").unwrap();
        touch(&path, 60);
        let third = futures::executor::block_on(compiler.compile_file_cached(&cache, &path)).unwrap();
        assert!(third.html.starts_with("<p data-v-"));
        assert!(third.html.contains(">two</p>"));
    }

    #[test]
    fn test_failed_cached_compile_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.oct");
        fs::write(&path, "<p>ok</p>").unwrap();

        let compiler = Compiler::default();
        let cache = CompileCache::new(8);
        futures::executor::block_on(compiler.compile_file_cached(&cache, &path)).unwrap();
        assert_eq!(cache.len(), 1);

        fs::write(&path, "<Nope/>").unwrap();
        touch(&path, 120);
        let err = futures::executor::block_on(compiler.compile_file_cached(&cache, &path)).unwrap_err();
        assert!(matches!(err, CompilerError::UnknownComponent { .. }));
        assert!(cache.is_empty());
    }
}
