use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::validate::CompilerError;

pub const DEFAULT_IMAGE_QUALITY: u8 = 75;

/// Path reported in errors for options that did not come from a file.
const INLINE_OPTIONS_ORIGIN: &str = "<inline options>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Quality handed to the image optimizer when `<Image>` has no `quality`.
    pub image_quality: u8,
    /// Extension of source files picked up by discovery, without the dot.
    pub source_extension: String,
    /// Extension of files written by a batch compile, without the dot.
    pub output_extension: String,
    pub cache_capacity: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            image_quality: DEFAULT_IMAGE_QUALITY,
            source_extension: "oct".to_string(),
            output_extension: "html".to_string(),
            cache_capacity: 200,
        }
    }
}

impl CompileOptions {
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self, CompilerError> {
        let options: CompileOptions =
            serde_json::from_str(json).map_err(|e| CompilerError::Config {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;
        options.validate(origin)?;
        Ok(options)
    }

    /// Options passed inline by a host (the Node binding), validated the
    /// same way as an options file. `None` means defaults.
    pub fn from_inline_json(json: Option<&str>) -> Result<Self, CompilerError> {
        match json {
            Some(json) => Self::from_json_str(json, Path::new(INLINE_OPTIONS_ORIGIN)),
            None => Ok(Self::default()),
        }
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CompilerError> {
        let json = fs::read_to_string(path).map_err(|source| CompilerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json, path)
    }

    fn validate(&self, origin: &Path) -> Result<(), CompilerError> {
        let problem = if self.image_quality == 0 || self.image_quality > 100 {
            Some(format!(
                "imageQuality must be between 1 and 100, got {}",
                self.image_quality
            ))
        } else if self.source_extension.is_empty() || self.source_extension.starts_with('.') {
            Some("sourceExtension must be a bare extension such as \"oct\"".to_string())
        } else if self.output_extension.is_empty() || self.output_extension.starts_with('.') {
            Some("outputExtension must be a bare extension such as \"html\"".to_string())
        } else if self.cache_capacity == 0 {
            Some("cacheCapacity must be at least 1".to_string())
        } else {
            None
        };

        match problem {
            Some(message) => Err(CompilerError::Config {
                path: origin.to_path_buf(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let options =
            CompileOptions::from_json_str(r#"{ "imageQuality": 60 }"#, Path::new("octopus.json"))
                .unwrap();
        assert_eq!(options.image_quality, 60);
        assert_eq!(options.source_extension, "oct");
        assert_eq!(options.cache_capacity, 200);
    }

    #[test]
    fn test_inline_options_are_validated() {
        let err = CompileOptions::from_inline_json(Some(r#"{ "imageQuality": 0 }"#)).unwrap_err();
        assert!(matches!(err, CompilerError::Config { ref path, .. } if path == Path::new("<inline options>")));
        assert!(err.tagged_message().starts_with("[OCT-ERR-CONFIG-001]"));

        let err = CompileOptions::from_inline_json(Some(r#"{ "sourceExtension": ".oct" }"#)).unwrap_err();
        assert!(matches!(err, CompilerError::Config { .. }));

        assert_eq!(
            CompileOptions::from_inline_json(None).unwrap(),
            CompileOptions::default()
        );
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let err =
            CompileOptions::from_json_str(r#"{ "imageQuality": 0 }"#, Path::new("octopus.json"))
                .unwrap_err();
        assert!(matches!(err, CompilerError::Config { .. }));
        assert!(err.to_string().contains("imageQuality"));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = CompileOptions::from_json_str("{", Path::new("octopus.json")).unwrap_err();
        assert_eq!(err.code(), crate::validate::ERR_CONFIG);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = CompileOptions::from_json_file(Path::new("/nonexistent/octopus.json")).unwrap_err();
        assert_eq!(err.code(), crate::validate::ERR_IO);
    }
}
