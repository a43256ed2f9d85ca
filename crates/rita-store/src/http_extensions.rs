//! HTTP-extensions lookup table: a static MIME-type → accepted-extensions map loaded once at
//! startup, used by the MIME-mismatch modifier.

use std::collections::HashMap;
use std::path::Path;

use rita_types::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExtensionRecord {
    mime_type: String,
    extension: String,
}

#[derive(Clone, Debug, Default)]
pub struct HttpExtensions {
    by_mime_type: HashMap<String, Vec<String>>,
}

impl HttpExtensions {
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| Error::InvalidConfig(format!("cannot open HTTP extensions CSV {}: {e}", path.display())))?;
        let mut by_mime_type: HashMap<String, Vec<String>> = HashMap::new();
        for record in reader.deserialize::<ExtensionRecord>() {
            let record = record
                .map_err(|e| Error::InvalidConfig(format!("malformed HTTP extensions CSV row: {e}")))?;
            by_mime_type
                .entry(record.mime_type.to_ascii_lowercase())
                .or_default()
                .push(record.extension.to_ascii_lowercase());
        }
        Ok(Self { by_mime_type })
    }

    /// `true` when `extension` is not among the extensions accepted for `mime_type` — the
    /// condition the MIME-mismatch modifier fires on.
    pub fn is_mismatch(&self, mime_type: &str, extension: &str) -> bool {
        match self.by_mime_type.get(&mime_type.to_ascii_lowercase()) {
            Some(extensions) => !extensions.iter().any(|e| e == &extension.to_ascii_lowercase()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn flags_unlisted_extension_as_mismatch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "mime_type,extension\nimage/png,png\nimage/png,apng\n").unwrap();

        let table = HttpExtensions::load(file.path()).unwrap();
        assert!(!table.is_mismatch("image/png", "png"));
        assert!(table.is_mismatch("image/png", "exe"));
        assert!(table.is_mismatch("application/unknown", "bin"));
    }
}
