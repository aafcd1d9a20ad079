//! Named collections of forms loaded from a directory.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{FormError, Result};
use crate::form::Form;

/// Forms keyed by name, usually the file stem of their template file.
///
/// # Example
///
/// ```no_run
/// use compform_core::FormCatalog;
///
/// let catalog = FormCatalog::from_directory("forms")?;
/// let mut summarize = catalog.form("summarize").expect("summarize.json is present");
/// summarize.put("text", "...")?;
/// # Ok::<(), compform_core::FormError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FormCatalog {
    forms: BTreeMap<String, Form>,
}

impl FormCatalog {
    /// An empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` and `*.toml` file in `dir`. Other files are ignored.
    ///
    /// # Errors
    ///
    /// [`FormError::FileNotFound`] if `dir` does not exist,
    /// [`FormError::EmptyCatalog`] if it holds no template files, or the
    /// error of the first template that fails to load.
    pub fn from_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FormError::FileNotFound(dir.to_path_buf()),
            _ => FormError::Io(e),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        let mut catalog = Self::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let form = match path.extension().and_then(|e| e.to_str()) {
                Some("json") => Form::from_json_file(&path)?,
                Some("toml") => Form::from_toml_file(&path)?,
                _ => {
                    debug!(path = %path.display(), "skipping non-template file");
                    continue;
                }
            };
            catalog.insert(name, form);
        }

        if catalog.is_empty() {
            return Err(FormError::EmptyCatalog(dir.to_path_buf()));
        }

        info!(path = %dir.display(), forms = catalog.len(), "form catalog loaded");
        Ok(catalog)
    }

    /// Add or replace a form.
    pub fn insert(&mut self, name: impl Into<String>, form: Form) {
        self.forms.insert(name.into(), form);
    }

    /// Borrow a form by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Form> {
        self.forms.get(name)
    }

    /// A fresh, unfilled copy of a form, ready for `put`.
    #[must_use]
    pub fn form(&self, name: &str) -> Option<Form> {
        self.forms.get(name).map(|form| {
            let mut form = form.clone();
            form.clear();
            form
        })
    }

    /// Form names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.forms.keys().map(String::as_str).collect()
    }

    /// Number of forms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forms.len()
    }

    /// Whether the catalog holds no forms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_not_found() {
        let result = FormCatalog::from_directory("/tmp/nonexistent_compform_catalog_dir");
        assert!(matches!(result, Err(FormError::FileNotFound(_))));
    }

    #[test]
    fn insert_and_fresh_copy() {
        let mut form = Form::from_json_str(
            r#"{"user": "{q}", "response": {"a": {"type": "text"}}}"#,
        )
        .expect("valid");
        form.put("q", "filled").expect("put");

        let mut catalog = FormCatalog::new();
        catalog.insert("ask", form);
        assert_eq!(catalog.names(), ["ask"]);

        let fresh = catalog.form("ask").expect("present");
        assert!(fresh.messages().is_err(), "copy should be unfilled");
        assert!(catalog.get("ask").expect("present").messages().is_ok());
        assert!(catalog.form("missing").is_none());
    }
}
