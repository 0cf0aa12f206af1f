//! File category and icon derived from the original file name.

use dropcode_core::FileCategory;

use crate::sanitizer::extension_of;

pub fn category_for(original_name: &str) -> FileCategory {
    match extension_of(original_name).as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" | "ico" | "tiff" | "tif"
        | "psd" | "ai" | "eps" => FileCategory::Image,
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp"
        | "txt" | "rtf" | "csv" | "md" => FileCategory::Document,
        "zip" | "rar" | "7z" | "tar" | "gz" => FileCategory::Archive,
        "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" => FileCategory::Audio,
        "mp4" | "webm" | "avi" | "mov" | "mkv" | "wmv" => FileCategory::Video,
        "html" | "htm" | "css" | "js" | "json" | "xml" | "sql" => FileCategory::Code,
        "ttf" | "otf" | "woff" | "woff2" => FileCategory::Font,
        _ => FileCategory::Other,
    }
}

/// Font Awesome icon class for the presentation layer
pub fn icon_for(original_name: &str) -> &'static str {
    match extension_of(original_name).as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" | "ico" | "tiff" | "tif"
        | "psd" => "fa-file-image",
        "pdf" => "fa-file-pdf",
        "doc" | "docx" => "fa-file-word",
        "xls" | "xlsx" | "csv" => "fa-file-excel",
        "ppt" | "pptx" => "fa-file-powerpoint",
        "txt" | "rtf" | "md" => "fa-file-lines",
        "zip" | "rar" | "7z" | "tar" | "gz" => "fa-file-zipper",
        "mp3" | "wav" | "ogg" | "flac" | "aac" | "m4a" => "fa-file-audio",
        "mp4" | "webm" | "avi" | "mov" | "mkv" | "wmv" => "fa-file-video",
        "html" | "htm" | "css" | "js" | "json" | "xml" => "fa-file-code",
        "sql" => "fa-database",
        "ttf" | "otf" | "woff" | "woff2" => "fa-font",
        "ai" | "eps" => "fa-bezier-curve",
        _ => "fa-file",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_is_case_insensitive() {
        assert_eq!(category_for("Scan.PDF"), FileCategory::Document);
        assert_eq!(category_for("song.Mp3"), FileCategory::Audio);
    }

    #[test]
    fn test_design_files_are_images_with_own_icon() {
        assert_eq!(category_for("logo.ai"), FileCategory::Image);
        assert_eq!(icon_for("logo.ai"), "fa-bezier-curve");
        assert_eq!(icon_for("mock.psd"), "fa-file-image");
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(category_for("thing.bin"), FileCategory::Other);
        assert_eq!(icon_for("thing"), "fa-file");
    }
}
