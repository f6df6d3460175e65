//! Image optimizer collaborator.
//!
//! Re-encoding lives outside the compiler. The compiler only asks an
//! [`ImageOptimizer`] for a new public path and falls back to the original
//! path when the request fails.

use futures::future::BoxFuture;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to optimize {path}: {reason}")]
pub struct ImageError {
    pub path: String,
    pub reason: String,
}

impl ImageError {
    pub fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rewrites a local image to a cached, size/quality-adjusted asset.
///
/// There is no timeout around this call; a future that never resolves stalls
/// the compile of the page that references the image.
pub trait ImageOptimizer: Send + Sync {
    fn optimize<'a>(&'a self, local_path: &'a str, quality: u8) -> BoxFuture<'a, Result<String, ImageError>>;
}

/// Whether `src` names a file the optimizer can read, as opposed to an
/// external or inline reference.
pub fn is_local_source(src: &str) -> bool {
    let lower = src.trim_start().to_ascii_lowercase();
    !(lower.is_empty()
        || lower.starts_with("http://")
        || lower.starts_with("https://")
        || lower.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("blob:"))
}
