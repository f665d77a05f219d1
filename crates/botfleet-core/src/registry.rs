//! Bot registry loading.
//!
//! The registry is a JSON array of objects, each with at least a `name`
//! string field:
//!
//! ```json
//! [{ "name": "alpha" }, { "name": "My-Bot! 01", "owner": "ignored" }]
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// One bot entry from the registry. Extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BotDescriptor {
    pub name: String,
}

/// Parse registry content. `path` is only used for error reporting.
pub fn parse_registry(content: &str, path: &Path) -> Result<Vec<BotDescriptor>> {
    serde_json::from_str(content).map_err(|source| Error::ConfigMalformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the ordered list of bots from `path`.
pub fn load_registry(path: &Path) -> Result<Vec<BotDescriptor>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ConfigMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(Error::Io(e)),
    };
    let bots = parse_registry(&content, path)?;
    tracing::debug!(path = %path.display(), count = bots.len(), "loaded bot registry");
    Ok(bots)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_registry(content: &str) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bots.json");
        std::fs::write(&path, content).expect("write");
        (dir, path)
    }

    #[test]
    fn loads_names_in_order() {
        let (_dir, path) = write_registry(r#"[{"name":"beta"},{"name":"alpha"}]"#);
        let bots = load_registry(&path).expect("load");
        let names: Vec<_> = bots.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["beta", "alpha"]);
    }

    #[test]
    fn ignores_extra_fields() {
        let (_dir, path) = write_registry(r#"[{"name":"alpha","owner":"x","port":3000}]"#);
        let bots = load_registry(&path).expect("load");
        assert_eq!(bots, vec![BotDescriptor { name: "alpha".into() }]);
    }

    #[test]
    fn empty_array_is_valid() {
        let (_dir, path) = write_registry("[]");
        assert!(load_registry(&path).expect("load").is_empty());
    }

    #[test]
    fn missing_file_is_config_missing() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bots.json");
        let err = load_registry(&path).expect_err("should fail");
        assert!(matches!(err, Error::ConfigMissing { .. }), "got {err:?}");
        assert!(err.to_string().contains("bots.json"));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let (_dir, path) = write_registry("[{\"name\":");
        let err = load_registry(&path).expect_err("should fail");
        assert!(matches!(err, Error::ConfigMalformed { .. }), "got {err:?}");
    }

    #[test]
    fn missing_name_field_is_malformed() {
        let (_dir, path) = write_registry(r#"[{"title":"alpha"}]"#);
        let err = load_registry(&path).expect_err("should fail");
        assert!(matches!(err, Error::ConfigMalformed { .. }), "got {err:?}");
    }

    #[test]
    fn non_string_name_is_malformed() {
        let (_dir, path) = write_registry(r#"[{"name":42}]"#);
        assert!(matches!(
            load_registry(&path),
            Err(Error::ConfigMalformed { .. })
        ));
    }

    #[test]
    fn object_instead_of_array_is_malformed() {
        let (_dir, path) = write_registry(r#"{"name":"alpha"}"#);
        assert!(matches!(
            load_registry(&path),
            Err(Error::ConfigMalformed { .. })
        ));
    }
}
