//! Filename sanitization for on-disk storage
//!
//! Turns an uploader-supplied name into a storage name that is safe to join
//! onto a session directory and unique with overwhelming probability. The
//! function never touches the filesystem.

use chrono::Utc;
use dropcode_core::constants::{FALLBACK_STEM, MAX_STEM_LENGTH};

/// Script/executable suffixes removed from the stem of names such as
/// `shell.php.jpg`.
const DOUBLE_EXTENSION_SUFFIXES: &[&str] = &["php", "phtml", "phar", "exe", "bat", "cmd", "sh", "js"];

/// Last path component of `name`, treating both `/` and `\` as separators.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Lower-cased extension of an uploader-supplied name (text after the last
/// `.` of the base name), or an empty string.
pub fn extension_of(name: &str) -> String {
    split_name(base_name(name)).1.to_lowercase()
}

fn split_name(base: &str) -> (&str, &str) {
    match base.rfind('.') {
        Some(idx) => (&base[..idx], &base[idx + 1..]),
        None => (base, ""),
    }
}

fn strip_double_extension(stem: &str) -> &str {
    if let Some(idx) = stem.rfind('.') {
        let suffix = &stem[idx + 1..];
        if DOUBLE_EXTENSION_SUFFIXES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(suffix))
        {
            return &stem[..idx];
        }
    }
    stem
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`, collapse runs and
/// trim underscores at both ends.
fn clean_stem(stem: &str) -> String {
    let mut cleaned = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            c
        } else {
            '_'
        };
        if c == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(c);
    }
    cleaned.trim_matches('_').to_string()
}

/// Map an arbitrary client filename to a storage-safe, unique name.
///
/// The result looks like `{stem}_{unix_seconds}_{8 hex}.{ext}`; the extension
/// part is omitted when the original had none.
pub fn sanitize_filename(original: &str) -> String {
    let without_nul: String = base_name(original).chars().filter(|&c| c != '\0').collect();
    let (stem, ext) = split_name(&without_nul);

    let ext: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();

    let mut stem = clean_stem(strip_double_extension(stem));
    if stem.is_empty() {
        stem = FALLBACK_STEM.to_string();
    }
    // Only ASCII survives cleaning, so byte truncation is on a char boundary
    stem.truncate(MAX_STEM_LENGTH);

    let random: [u8; 4] = rand::random();
    let unique = format!("{}_{}", Utc::now().timestamp(), hex::encode(random));

    if ext.is_empty() {
        format!("{}_{}", stem, unique)
    } else {
        format!("{}_{}.{}", stem, unique, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drop the `_{secs}_{hex}` suffix so tests can compare the stem.
    fn stem_of(storage_name: &str) -> &str {
        let without_ext = storage_name.split('.').next().unwrap();
        let mut parts = without_ext.rsplitn(3, '_');
        parts.next();
        parts.next();
        parts.next().unwrap()
    }

    #[test]
    fn test_keeps_extension_lowercased() {
        let name = sanitize_filename("Holiday Photo.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(stem_of(&name), "Holiday_Photo");
    }

    #[test]
    fn test_strips_path_components() {
        let unix = sanitize_filename("../../etc/passwd");
        let windows = sanitize_filename("C:\\Users\\me\\notes.txt");

        assert_eq!(stem_of(&unix), "passwd");
        assert!(!unix.contains('/'));
        assert_eq!(stem_of(&windows), "notes");
        assert!(windows.ends_with(".txt"));
    }

    #[test]
    fn test_removes_nul_bytes() {
        let name = sanitize_filename("evil\0.png");
        assert!(!name.contains('\0'));
        assert_eq!(stem_of(&name), "evil");
    }

    #[test]
    fn test_strips_script_double_extension() {
        let name = sanitize_filename("shell.php.jpg");
        assert_eq!(stem_of(&name), "shell");
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn test_inner_dots_become_underscores() {
        let name = sanitize_filename("report.pdf.php");
        assert_eq!(stem_of(&name), "report_pdf");
        assert!(name.ends_with(".php"));
    }

    #[test]
    fn test_collapses_and_trims_underscores() {
        let name = sanitize_filename("__a   b!!c__.txt");
        assert_eq!(stem_of(&name), "a_b_c");
    }

    #[test]
    fn test_empty_stem_falls_back() {
        assert_eq!(stem_of(&sanitize_filename("???.png")), "file");
        let dotfile = sanitize_filename(".htaccess");
        assert_eq!(stem_of(&dotfile), "file");
        assert!(dotfile.ends_with(".htaccess"));
    }

    #[test]
    fn test_truncates_long_stem() {
        let long = format!("{}.txt", "a".repeat(200));
        let name = sanitize_filename(&long);
        assert_eq!(stem_of(&name).len(), MAX_STEM_LENGTH);
    }

    #[test]
    fn test_no_extension() {
        let name = sanitize_filename("README");
        assert!(!name.contains('.'));
        assert!(name.starts_with("README_"));
    }

    #[test]
    fn test_same_input_gives_distinct_names() {
        let a = sanitize_filename("photo.png");
        let b = sanitize_filename("photo.png");
        assert_ne!(a, b);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("dir/Archive.TAR.GZ"), "gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of(".htaccess"), "htaccess");
    }
}
