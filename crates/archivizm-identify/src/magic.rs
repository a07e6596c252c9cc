//! Magic-byte and extension heuristics.
//!
//! Used when the signature tool is unavailable, fails, or has no confident
//! match. Only the first [`SNIFF_LEN`] bytes of a file are ever read.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use archivizm_core::FormatResult;

/// Maximum number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

/// A fixed byte sequence at a fixed offset.
#[derive(Debug, Clone, Copy)]
struct Signature {
    label: &'static str,
    mime: &'static str,
    offset: usize,
    magic: &'static [u8],
}

impl Signature {
    const fn at(label: &'static str, mime: &'static str, offset: usize, magic: &'static [u8]) -> Self {
        Self {
            label,
            mime,
            offset,
            magic,
        }
    }

    fn matches(&self, header: &[u8]) -> bool {
        header
            .get(self.offset..self.offset + self.magic.len())
            .is_some_and(|window| window == self.magic)
    }
}

/// Signatures that need no further inspection. Longer magics come first
/// where a shorter one would shadow them.
const SIGNATURES: &[Signature] = &[
    // Images
    Signature::at("JPEG", "image/jpeg", 0, &[0xFF, 0xD8, 0xFF]),
    Signature::at("PNG", "image/png", 0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
    Signature::at("GIF", "image/gif", 0, b"GIF87a"),
    Signature::at("GIF", "image/gif", 0, b"GIF89a"),
    Signature::at("TIFF", "image/tiff", 0, &[0x49, 0x49, 0x2A, 0x00]),
    Signature::at("TIFF", "image/tiff", 0, &[0x4D, 0x4D, 0x00, 0x2A]),
    // Documents
    Signature::at("PDF", "application/pdf", 0, b"%PDF-"),
    Signature::at("PostScript", "application/postscript", 0, b"%!PS"),
    Signature::at("Rich Text Format", "application/rtf", 0, b"{\\rtf"),
    Signature::at(
        "SQLite Database",
        "application/vnd.sqlite3",
        0,
        b"SQLite format 3\0",
    ),
    // Archives
    Signature::at("GZIP Archive", "application/gzip", 0, &[0x1F, 0x8B]),
    Signature::at("BZIP2 Archive", "application/x-bzip2", 0, b"BZh"),
    Signature::at(
        "XZ Archive",
        "application/x-xz",
        0,
        &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00],
    ),
    Signature::at(
        "7-Zip Archive",
        "application/x-7z-compressed",
        0,
        &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C],
    ),
    Signature::at(
        "RAR Archive",
        "application/vnd.rar",
        0,
        &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07],
    ),
    Signature::at("TAR Archive", "application/x-tar", 257, b"ustar"),
    // Executables
    Signature::at("ELF Executable", "application/x-elf", 0, &[0x7F, 0x45, 0x4C, 0x46]),
    Signature::at("Mach-O Executable", "application/x-mach-binary", 0, &[0xFE, 0xED, 0xFA, 0xCE]),
    Signature::at("Mach-O Executable", "application/x-mach-binary", 0, &[0xFE, 0xED, 0xFA, 0xCF]),
    Signature::at("Mach-O Executable", "application/x-mach-binary", 0, &[0xCE, 0xFA, 0xED, 0xFE]),
    Signature::at("Mach-O Executable", "application/x-mach-binary", 0, &[0xCF, 0xFA, 0xED, 0xFE]),
    // Audio
    Signature::at("MP3", "audio/mpeg", 0, b"ID3"),
    Signature::at("MP3", "audio/mpeg", 0, &[0xFF, 0xFB]),
    Signature::at("MP3", "audio/mpeg", 0, &[0xFF, 0xF3]),
    Signature::at("MP3", "audio/mpeg", 0, &[0xFF, 0xF2]),
    Signature::at("FLAC", "audio/flac", 0, b"fLaC"),
    Signature::at("Ogg", "audio/ogg", 0, b"OggS"),
    // Weak two-byte magic last
    Signature::at("Bitmap Image", "image/bmp", 0, b"BM"),
];

const ZIP_LOCAL: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const ZIP_EMPTY: &[u8] = &[0x50, 0x4B, 0x05, 0x06];
const OLE2: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const EBML: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];

/// Read up to [`SNIFF_LEN`] leading bytes of a file.
pub fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}

/// Classify leading bytes, using the extension only to refine containers.
pub fn sniff(header: &[u8], extension: Option<&str>) -> Option<FormatResult> {
    let (label, mime) = sniff_container(header, extension)
        .or_else(|| {
            SIGNATURES
                .iter()
                .find(|sig| sig.matches(header))
                .map(|sig| (sig.label, sig.mime))
        })
        .or_else(|| sniff_markup(header))?;
    Some(FormatResult::heuristic(label, Some(mime)))
}

/// Classify by lowercase extension alone.
pub fn from_extension(extension: &str) -> Option<FormatResult> {
    let (label, mime) = extension_format(extension)?;
    Some(FormatResult::heuristic(label, Some(mime)))
}

/// Formats whose magic is shared by several concrete types.
fn sniff_container(header: &[u8], extension: Option<&str>) -> Option<(&'static str, &'static str)> {
    if header.starts_with(b"RIFF") {
        return Some(match header.get(8..12) {
            Some(b"WEBP") => ("WebP", "image/webp"),
            Some(b"WAVE") => ("WAV", "audio/wav"),
            Some(b"AVI ") => ("AVI", "video/x-msvideo"),
            _ => ("RIFF Container", "application/octet-stream"),
        });
    }

    if header.get(4..8) == Some(&b"ftyp"[..]) {
        return Some(match header.get(8..12) {
            Some(b"qt  ") => ("QuickTime", "video/quicktime"),
            Some(b"M4A ") => ("MPEG-4 Audio", "audio/mp4"),
            Some(b"heic" | b"heix" | b"mif1") => ("HEIF Image", "image/heif"),
            _ => ("MP4", "video/mp4"),
        });
    }

    if header.starts_with(ZIP_LOCAL) || header.starts_with(ZIP_EMPTY) {
        return Some(refine_zip(header, extension));
    }

    if header.starts_with(OLE2) {
        return Some(match extension {
            Some("doc") => ("Microsoft Word 97-2003 Document", "application/msword"),
            Some("xls") => ("Microsoft Excel 97-2003 Workbook", "application/vnd.ms-excel"),
            Some("ppt") => (
                "Microsoft PowerPoint 97-2003 Presentation",
                "application/vnd.ms-powerpoint",
            ),
            Some("msg") => ("Outlook Message", "application/vnd.ms-outlook"),
            _ => ("OLE2 Compound Document", "application/x-ole-storage"),
        });
    }

    if header.starts_with(EBML) {
        return Some(if contains(header, b"webm") {
            ("WebM", "video/webm")
        } else {
            ("Matroska", "video/x-matroska")
        });
    }

    if header.starts_with(b"MZ") {
        return Some(if has_pe_header(header) {
            ("Windows Portable Executable", "application/vnd.microsoft.portable-executable")
        } else {
            ("DOS/Windows Executable", "application/x-msdownload")
        });
    }

    None
}

/// Zip-based formats: an uncompressed `mimetype` member first, then the extension.
fn refine_zip(header: &[u8], extension: Option<&str>) -> (&'static str, &'static str) {
    if contains(header, b"mimetypeapplication/epub+zip") {
        return ("EPUB", "application/epub+zip");
    }
    if contains(header, b"mimetypeapplication/vnd.oasis.opendocument.text") {
        return ("OpenDocument Text", "application/vnd.oasis.opendocument.text");
    }
    if contains(header, b"mimetypeapplication/vnd.oasis.opendocument.spreadsheet") {
        return (
            "OpenDocument Spreadsheet",
            "application/vnd.oasis.opendocument.spreadsheet",
        );
    }
    if contains(header, b"mimetypeapplication/vnd.oasis.opendocument.presentation") {
        return (
            "OpenDocument Presentation",
            "application/vnd.oasis.opendocument.presentation",
        );
    }

    match extension {
        Some(ext @ ("docx" | "xlsx" | "pptx" | "odt" | "ods" | "odp" | "epub" | "jar")) => {
            extension_format(ext).unwrap_or(("ZIP Archive", "application/zip"))
        }
        _ => ("ZIP Archive", "application/zip"),
    }
}

/// Text markup, after an optional BOM and leading whitespace.
fn sniff_markup(header: &[u8]) -> Option<(&'static str, &'static str)> {
    let text = header.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(header);
    let start = text.iter().position(|b| !b.is_ascii_whitespace())?;
    let text = &text[start..];

    if starts_with_ignore_case(text, b"<?xml") {
        Some(("XML", "application/xml"))
    } else if starts_with_ignore_case(text, b"<!doctype html") || starts_with_ignore_case(text, b"<html") {
        Some(("HTML", "text/html"))
    } else {
        None
    }
}

fn has_pe_header(header: &[u8]) -> bool {
    let Some(offset) = header.get(0x3C..0x40) else {
        return false;
    };
    let Ok(offset) = usize::try_from(u32::from_le_bytes([offset[0], offset[1], offset[2], offset[3]])) else {
        return false;
    };
    let Some(end) = offset.checked_add(4) else {
        return false;
    };
    header.get(offset..end) == Some(&b"PE\0\0"[..])
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn starts_with_ignore_case(text: &[u8], prefix: &[u8]) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn extension_format(ext: &str) -> Option<(&'static str, &'static str)> {
    Some(match ext {
        // Documents
        "pdf" => ("PDF", "application/pdf"),
        "txt" | "text" => ("Plain Text", "text/plain"),
        "md" | "markdown" => ("Markdown", "text/markdown"),
        "csv" => ("CSV", "text/csv"),
        "tsv" => ("Tab-Separated Values", "text/tab-separated-values"),
        "rtf" => ("Rich Text Format", "application/rtf"),
        "doc" => ("Microsoft Word 97-2003 Document", "application/msword"),
        "docx" => (
            "Microsoft Word Document",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        "xls" => ("Microsoft Excel 97-2003 Workbook", "application/vnd.ms-excel"),
        "xlsx" => (
            "Microsoft Excel Workbook",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        "ppt" => (
            "Microsoft PowerPoint 97-2003 Presentation",
            "application/vnd.ms-powerpoint",
        ),
        "pptx" => (
            "Microsoft PowerPoint Presentation",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        "odt" => ("OpenDocument Text", "application/vnd.oasis.opendocument.text"),
        "ods" => (
            "OpenDocument Spreadsheet",
            "application/vnd.oasis.opendocument.spreadsheet",
        ),
        "odp" => (
            "OpenDocument Presentation",
            "application/vnd.oasis.opendocument.presentation",
        ),
        "epub" => ("EPUB", "application/epub+zip"),
        "ps" | "eps" => ("PostScript", "application/postscript"),
        // Markup and data
        "html" | "htm" => ("HTML", "text/html"),
        "xml" => ("XML", "application/xml"),
        "json" => ("JSON", "application/json"),
        "yaml" | "yml" => ("YAML", "application/yaml"),
        "toml" => ("TOML", "application/toml"),
        "css" => ("CSS", "text/css"),
        "js" => ("JavaScript", "text/javascript"),
        "svg" => ("SVG Image", "image/svg+xml"),
        // Images
        "jpg" | "jpeg" => ("JPEG", "image/jpeg"),
        "png" => ("PNG", "image/png"),
        "gif" => ("GIF", "image/gif"),
        "bmp" => ("Bitmap Image", "image/bmp"),
        "tif" | "tiff" => ("TIFF", "image/tiff"),
        "webp" => ("WebP", "image/webp"),
        "heic" | "heif" => ("HEIF Image", "image/heif"),
        "ico" => ("Windows Icon", "image/vnd.microsoft.icon"),
        "psd" => ("Photoshop Document", "image/vnd.adobe.photoshop"),
        // Audio and video
        "mp3" => ("MP3", "audio/mpeg"),
        "wav" => ("WAV", "audio/wav"),
        "flac" => ("FLAC", "audio/flac"),
        "ogg" | "oga" => ("Ogg", "audio/ogg"),
        "m4a" => ("MPEG-4 Audio", "audio/mp4"),
        "aac" => ("AAC Audio", "audio/aac"),
        "wma" => ("Windows Media Audio", "audio/x-ms-wma"),
        "mp4" | "m4v" => ("MP4", "video/mp4"),
        "mov" => ("QuickTime", "video/quicktime"),
        "avi" => ("AVI", "video/x-msvideo"),
        "mkv" => ("Matroska", "video/x-matroska"),
        "webm" => ("WebM", "video/webm"),
        "wmv" => ("Windows Media Video", "video/x-ms-wmv"),
        "mpg" | "mpeg" => ("MPEG Video", "video/mpeg"),
        // Archives
        "zip" => ("ZIP Archive", "application/zip"),
        "jar" => ("Java Archive", "application/java-archive"),
        "gz" | "tgz" => ("GZIP Archive", "application/gzip"),
        "bz2" => ("BZIP2 Archive", "application/x-bzip2"),
        "xz" => ("XZ Archive", "application/x-xz"),
        "7z" => ("7-Zip Archive", "application/x-7z-compressed"),
        "rar" => ("RAR Archive", "application/vnd.rar"),
        "tar" => ("TAR Archive", "application/x-tar"),
        "iso" => ("ISO Disc Image", "application/x-iso9660-image"),
        // Executables and databases
        "exe" | "dll" => ("Windows Portable Executable", "application/vnd.microsoft.portable-executable"),
        "sqlite" | "db" => ("SQLite Database", "application/vnd.sqlite3"),
        _ => return None,
    })
}
