//! Application-wide constants.

/// Symbols a transfer code may contain. I, O, 0 and 1 are left out so codes
/// can be read aloud and typed without ambiguity.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in a transfer code.
pub const CODE_LENGTH: usize = 6;

/// Upper bound on generate-and-reserve attempts before giving up.
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// Longest stem kept by the filename sanitizer.
pub const MAX_STEM_LENGTH: usize = 50;

/// Stem used when nothing printable survives sanitization.
pub const FALLBACK_STEM: &str = "file";

/// How much of an upload is inspected for embedded server-side script tags.
pub const CONTENT_SNIFF_BYTES: usize = 1024;

/// Name of the metadata document inside the data directory.
pub const METADATA_FILE_NAME: &str = "transfers.json";

/// Directory (under the data directory) holding one sub-directory per session.
pub const UPLOADS_DIR_NAME: &str = "uploads";

/// Scratch directory used for atomic writes and staged deletes.
pub const STAGING_DIR_NAME: &str = "staging";

/// Default audit log file name.
pub const AUDIT_LOG_FILE_NAME: &str = "system.log";

pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    // Images
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "tiff", "tif",
    // Documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "txt", "rtf", "csv",
    // Archives
    "zip", "rar", "7z", "tar", "gz",
    // Audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a",
    // Video
    "mp4", "webm", "avi", "mov", "mkv", "wmv",
    // Code
    "html", "htm", "css", "js", "json", "xml", "md", "sql",
    // Fonts
    "ttf", "otf", "woff", "woff2",
    // Design
    "psd", "ai", "eps",
];

pub const DEFAULT_BLOCKED_EXTENSIONS: &[&str] = &[
    "php", "php3", "php4", "php5", "phtml", "phar",
    "exe", "msi", "bat", "cmd", "com", "scr",
    "sh", "bash", "zsh", "csh",
    "dll", "so", "dylib",
    "vbs", "vbe", "js", "jse", "ws", "wsf", "wsc", "wsh",
    "ps1", "ps1xml", "ps2", "ps2xml", "psc1", "psc2",
    "reg", "inf", "scf", "lnk", "hta",
    "cpl", "msc", "jar", "jnlp",
    "htaccess", "htpasswd",
];
