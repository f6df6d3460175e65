//! Node binding. Results cross the boundary as JSON strings.

use napi_derive::napi;
use std::collections::BTreeMap;

use crate::config::CompileOptions;
use crate::document::{render_page_with_params, DEFAULT_SHELL};
use crate::finalize::{CompilationResult, Compiler};
use crate::validate::CompilerError;

fn to_napi_error(e: CompilerError) -> napi::Error {
    napi::Error::from_reason(e.tagged_message())
}

fn compiler_from(options_json: Option<String>) -> napi::Result<Compiler> {
    let options = CompileOptions::from_inline_json(options_json.as_deref()).map_err(to_napi_error)?;
    Ok(Compiler::new(options))
}

/// Compile a source document and return the serialized result.
#[napi]
pub fn compile_octopus_native(source: String, options_json: Option<String>) -> napi::Result<String> {
    let result = compiler_from(options_json)?
        .compile_blocking(&source)
        .map_err(to_napi_error)?;
    serde_json::to_string(&result)
        .map_err(|e| napi::Error::from_reason(format!("Result serialize error: {}", e)))
}

/// Render a previously compiled result into an HTML page.
#[napi]
pub fn render_page_native(
    result_json: String,
    fallback_title: String,
    shell: Option<String>,
    params_json: Option<String>,
) -> napi::Result<String> {
    let result: CompilationResult = serde_json::from_str(&result_json)
        .map_err(|e| napi::Error::from_reason(format!("Result parse error: {}", e)))?;
    let params: BTreeMap<String, String> = match params_json {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| napi::Error::from_reason(format!("Params parse error: {}", e)))?,
        None => BTreeMap::new(),
    };
    let shell = shell.as_deref().unwrap_or(DEFAULT_SHELL);
    Ok(render_page_with_params(shell, &result, &fallback_title, &params))
}
