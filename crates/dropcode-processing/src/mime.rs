//! Content type resolution
//!
//! Stages, each consulted only when the previous one has nothing to say:
//! magic bytes, the operating system's `mime.types` table, the static
//! extension table shipped with `mime_guess`, and finally
//! `application/octet-stream`.

use std::collections::HashMap;
use std::path::Path;

use crate::sanitizer::extension_of;

pub const OCTET_STREAM: &str = "application/octet-stream";

const SYSTEM_MIME_TYPES_PATH: &str = "/etc/mime.types";

/// Extension → MIME map parsed from a `mime.types` file
#[derive(Debug, Clone, Default)]
pub struct SystemMimeTable {
    by_extension: HashMap<String, String>,
}

impl SystemMimeTable {
    /// Load the table; `None` when the file is absent or unreadable
    pub fn load(path: &Path) -> Option<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Some(Self::parse(&contents)),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "No system MIME table");
                None
            }
        }
    }

    /// Lines look like `image/png    png` with `#` comments
    pub fn parse(contents: &str) -> Self {
        let mut by_extension = HashMap::new();
        for line in contents.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut fields = line.split_whitespace();
            let Some(mime) = fields.next() else {
                continue;
            };
            for ext in fields {
                by_extension
                    .entry(ext.to_lowercase())
                    .or_insert_with(|| mime.to_string());
            }
        }
        Self { by_extension }
    }

    pub fn lookup(&self, extension: &str) -> Option<&str> {
        self.by_extension.get(extension).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MimeResolver {
    system: Option<SystemMimeTable>,
}

impl MimeResolver {
    /// Resolver using the host's `/etc/mime.types` when present
    pub fn new() -> Self {
        Self::with_system_table(SystemMimeTable::load(Path::new(SYSTEM_MIME_TYPES_PATH)))
    }

    pub fn with_system_table(system: Option<SystemMimeTable>) -> Self {
        Self { system }
    }

    pub fn resolve(&self, data: &[u8], name: &str) -> String {
        if let Some(kind) = infer::get(data) {
            return kind.mime_type().to_string();
        }

        let extension = extension_of(name);
        if extension.is_empty() {
            return OCTET_STREAM.to_string();
        }

        if let Some(mime) = self.system.as_ref().and_then(|t| t.lookup(&extension)) {
            return mime.to_string();
        }

        mime_guess::from_ext(&extension)
            .first_raw()
            .unwrap_or(OCTET_STREAM)
            .to_string()
    }
}
