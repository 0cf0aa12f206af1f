use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// One file to pack: where it lives and the name it gets in the archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub display_name: String,
}

/// Base name only, so an entry can never extract outside its target
/// directory.
fn sanitize_archive_filename(filename: &str, fallback: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    Some(base.replace('\0', ""))
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .unwrap_or_else(|| fallback.to_string())
}

/// Reserve `name` in `used`, adding ` (n)` before the extension when it is
/// already taken.
pub fn unique_entry_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{} ({}){}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Pack the entries into an in-memory ZIP. Entries whose file has vanished
/// are skipped. Blocking; run it off the async runtime.
pub fn create_zip_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    use zip::write::{FileOptions, ZipWriter};
    use zip::CompressionMethod;

    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(std::io::Cursor::new(&mut buffer));
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let mut used = HashSet::new();
        for (index, entry) in entries.iter().enumerate() {
            let data = match std::fs::read(&entry.path) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(path = %entry.path.display(), "Skipping missing file in archive");
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to read file: {}", entry.path.display())
                    })
                }
            };

            let safe = sanitize_archive_filename(&entry.display_name, &format!("file_{}", index + 1));
            let name = unique_entry_name(&safe, &mut used);

            zip.start_file(name.as_str(), options)
                .with_context(|| format!("Failed to add file to ZIP: {}", name))?;
            zip.write_all(&data)
                .with_context(|| format!("Failed to write file data to ZIP: {}", name))?;
        }

        zip.finish().context("Failed to finalize ZIP archive")?;
    }

    Ok(buffer)
}
