//! File-backed configuration layer.

use super::ConfigLayer;
use crate::error::{ConfigError, Result};
use config::{File, FileFormat};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Configuration layer read from a YAML, TOML or JSON file.
///
/// The file is read again on every composition load, so edits show up the
/// next time a periodic layer triggers a rebuild.
///
/// # Examples
///
/// ```rust,no_run
/// use periodic_config::layer::FileLayer;
///
/// let defaults = FileLayer::new("config/default.yaml");
/// let local = FileLayer::new("config/local.toml").optional().with_priority(110);
/// ```
pub struct FileLayer {
    path: PathBuf,
    priority: i32,
    required: bool,
}

impl FileLayer {
    /// Create a required file layer with the default priority (100).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            priority: 100,
            required: true,
        }
    }

    /// Set the priority for this layer.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat a missing file as an empty layer instead of an error.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn format(&self) -> Result<FileFormat> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Ok(FileFormat::Yaml),
            Some("toml") => Ok(FileFormat::Toml),
            Some("json") => Ok(FileFormat::Json),
            Some(other) => Err(ConfigError::LoadError(format!(
                "{}: unsupported extension '.{}' (expected .yaml, .yml, .toml or .json)",
                self.path.display(),
                other
            ))),
            None => Err(ConfigError::LoadError(format!(
                "{}: no extension to pick a format from",
                self.path.display()
            ))),
        }
    }
}

impl ConfigLayer for FileLayer {
    fn load(&self) -> Result<HashMap<String, config::Value>> {
        let format = self.format()?;

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound && !self.required => {
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };

        config::Config::builder()
            .add_source(File::from_str(&contents, format))
            .build()
            .and_then(|parsed| parsed.try_deserialize::<HashMap<String, config::Value>>())
            .map_err(|e| {
                ConfigError::DeserializationError(format!("{}: {}", self.path.display(), e))
            })
    }

    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_extension() {
        assert!(matches!(FileLayer::new("a.yml").format(), Ok(FileFormat::Yaml)));
        assert!(matches!(FileLayer::new("a.toml").format(), Ok(FileFormat::Toml)));
        assert!(matches!(FileLayer::new("a.json").format(), Ok(FileFormat::Json)));
        assert!(FileLayer::new("a.txt").format().is_err());
        assert!(FileLayer::new("a").format().is_err());
    }

    #[test]
    fn test_load_toml_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let values = FileLayer::new(&path).load().unwrap();
        let server = values["server"].clone().into_table().unwrap();
        assert_eq!(server["port"].clone().into_int().unwrap(), 8080);
    }

    #[test]
    fn test_missing_required_file_is_io_error() {
        let result = FileLayer::new("/nonexistent/config.yaml").load();
        match result {
            Err(ConfigError::IoError(e)) => assert_eq!(e.kind(), ErrorKind::NotFound),
            other => panic!("expected IoError, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_missing_optional_file_is_empty() {
        let values = FileLayer::new("/nonexistent/local.yaml")
            .optional()
            .load()
            .unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_invalid_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let result = FileLayer::new(&path).load();
        assert!(matches!(result, Err(ConfigError::DeserializationError(_))));
    }
}
