//! Content classification of uploaded bytes.
//!
//! The declared name and content type of an upload are never trusted for
//! security decisions. The type is detected from the first [`SNIFF_LEN`]
//! bytes, then checked against static denylists, and markup is screened for
//! embedded scripts.

use coffer_core::constants::{FALLBACK_EXTENSION, SNIFF_LEN};
use coffer_core::validation::file_extension;
use coffer_core::AppError;

/// Extensions rejected regardless of content (lowercase, without dot).
const DENIED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "msi", "scr", "pif", "vbs", "vbe", "js", "jse", "ws", "wsf",
    "wsc", "wsh", "ps1", "ps2", "psc1", "psc2", "msc", "msp", "lnk", "inf", "reg", "dll", "cpl",
    "hta", "jar", "sh", "bash", "zsh", "php", "asp", "aspx", "jsp", "py", "pl", "rb", "cgi",
    "htaccess",
];

/// Detected types rejected regardless of name.
const DENIED_MIME_TYPES: &[&str] = &[
    "application/x-msdownload",
    "application/x-executable",
    "application/x-msdos-program",
    "application/x-mach-binary",
    "application/x-sh",
    "application/x-shellscript",
    "application/x-php",
    "application/x-httpd-php",
    "text/x-php",
    "application/x-perl",
    "application/x-python",
    "application/x-ruby",
    "application/java-archive",
    "application/x-java-class",
    "application/javascript",
    "text/javascript",
    "application/x-javascript",
    "text/vbscript",
    "application/x-powershell",
];

const SCRIPT_MARKERS: &[&str] = &["<script", "javascript:", "onerror=", "onload="];

/// Fixed-offset signatures checked after text and markup detection.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"ID3", "audio/mpeg"),
    (b"\xFF\xFB", "audio/mpeg"),
    (b"\xFF\xF3", "audio/mpeg"),
    (b"\xFF\xF2", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"Rar!\x1A\x07", "application/x-rar-compressed"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"\x00asm", "application/wasm"),
    (b"MZ", "application/x-msdownload"),
    (b"\x7FELF", "application/x-executable"),
    (b"\xCA\xFE\xBA\xBE", "application/x-java-class"),
    (b"\xFE\xED\xFA\xCE", "application/x-mach-binary"),
    (b"\xFE\xED\xFA\xCF", "application/x-mach-binary"),
    (b"\xCE\xFA\xED\xFE", "application/x-mach-binary"),
    (b"\xCF\xFA\xED\xFE", "application/x-mach-binary"),
];

/// Leading tags that mark a document as HTML when followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
];

/// Type of an upload as established from its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedType {
    pub mime_type: &'static str,
    /// Extension the object is stored under
    pub extension: &'static str,
}

/// Image formats accepted by the image upload path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }
}

fn has_prefix_ci(data: &[u8], sig: &[u8]) -> bool {
    data.len() >= sig.len() && data[..sig.len()].eq_ignore_ascii_case(sig)
}

/// `sig` at the start of `data`, followed by whitespace or `>`.
fn is_tag(data: &[u8], sig: &[u8]) -> bool {
    has_prefix_ci(data, sig)
        && matches!(
            data.get(sig.len()),
            Some(b' ' | b'>' | b'\t' | b'\n' | b'\r' | b'/')
        )
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn sniff_shebang(data: &[u8]) -> Option<&'static str> {
    let rest = data.strip_prefix(b"#!")?;
    let line_end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
    let line = String::from_utf8_lossy(&rest[..line_end]);

    let mut parts = line.split_whitespace();
    let program = parts.next().unwrap_or("");
    let mut interpreter = program.rsplit('/').next().unwrap_or("");
    if interpreter == "env" {
        interpreter = parts.find(|p| !p.starts_with('-')).unwrap_or("");
    }

    let mime = match interpreter {
        "sh" | "bash" | "zsh" | "dash" | "ksh" | "csh" | "tcsh" | "fish" => "application/x-sh",
        "node" | "nodejs" | "deno" | "bun" => "application/javascript",
        i if i.starts_with("python") => "application/x-python",
        i if i.starts_with("perl") => "application/x-perl",
        i if i.starts_with("ruby") => "application/x-ruby",
        i if i.starts_with("php") => "application/x-php",
        _ => "application/x-shellscript",
    };
    Some(mime)
}

fn sniff_container(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 12 && &data[..4] == b"RIFF" {
        return match &data[8..12] {
            b"WEBP" => Some("image/webp"),
            b"WAVE" => Some("audio/wave"),
            b"AVI " => Some("video/avi"),
            _ => None,
        };
    }
    if data.len() >= 12 && &data[..4] == b"FORM" && &data[8..12] == b"AIFF" {
        return Some("audio/aiff");
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return Some("video/mp4");
    }
    // BMP: reserved header bytes must be zero
    if data.len() >= 14 && &data[..2] == b"BM" && data[6..10].iter().all(|b| *b == 0) {
        return Some("image/bmp");
    }
    if data.starts_with(b"PK\x03\x04") {
        let is_jar = data.windows(9).any(|w| w == b"META-INF/");
        return Some(if is_jar {
            "application/java-archive"
        } else {
            "application/zip"
        });
    }
    None
}

/// Detect the MIME type of `data` from its first 512 bytes.
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if data.starts_with(b"\xFE\xFF") || data.starts_with(b"\xFF\xFE") {
        return "text/plain";
    }
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);

    if let Some(mime) = sniff_shebang(data) {
        return mime;
    }

    let markup = skip_whitespace(data);
    if has_prefix_ci(markup, b"<?php") {
        return "application/x-php";
    }
    if is_tag(markup, b"<svg") {
        return "image/svg+xml";
    }
    if has_prefix_ci(markup, b"<!--") || HTML_TAGS.iter().any(|sig| is_tag(markup, sig)) {
        return "text/html";
    }
    if has_prefix_ci(markup, b"<?xml") {
        return "text/xml";
    }

    if let Some(mime) = sniff_container(data) {
        return mime;
    }
    if let Some((_, mime)) = SIGNATURES.iter().find(|(sig, _)| data.starts_with(sig)) {
        return *mime;
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        "application/octet-stream"
    } else {
        "text/plain"
    }
}

fn is_markup(mime: &str, lowered_prefix: &str) -> bool {
    mime.contains("html")
        || mime.contains("svg")
        || (mime.contains("xml") && lowered_prefix.contains("<svg"))
}

/// Classify an upload, rejecting dangerous names, types and markup.
pub fn classify(data: &[u8], filename: &str) -> Result<VerifiedType, AppError> {
    if let Some(ext) = file_extension(filename) {
        if DENIED_EXTENSIONS.contains(&ext.as_str()) {
            tracing::warn!(extension = %ext, "Upload rejected by extension denylist");
            return Err(AppError::SecurityRejected(
                "file type not allowed".to_string(),
            ));
        }
    }

    let mime = sniff(data);
    if DENIED_MIME_TYPES.contains(&mime) {
        tracing::warn!(detected_type = mime, "Upload rejected by content type denylist");
        return Err(AppError::SecurityRejected(
            "file content type not allowed".to_string(),
        ));
    }

    let prefix = String::from_utf8_lossy(&data[..data.len().min(SNIFF_LEN)]).to_lowercase();
    if is_markup(mime, &prefix) {
        if let Some(marker) = SCRIPT_MARKERS.iter().find(|m| prefix.contains(*m)) {
            tracing::warn!(detected_type = mime, marker = *marker, "Upload rejected: script in markup");
            return Err(AppError::SecurityRejected(
                "file contains potentially dangerous content".to_string(),
            ));
        }
    }

    Ok(VerifiedType {
        mime_type: mime,
        extension: extension_for_mime(mime),
    })
}

/// Accept only JPEG, PNG and GIF, judged by magic bytes.
pub fn classify_image(data: &[u8]) -> Result<ImageKind, AppError> {
    match sniff(data) {
        "image/jpeg" => Ok(ImageKind::Jpeg),
        "image/png" => Ok(ImageKind::Png),
        "image/gif" => Ok(ImageKind::Gif),
        other => {
            tracing::warn!(detected_type = other, "Image upload rejected");
            Err(AppError::SecurityRejected(
                "only JPEG, PNG and GIF images are accepted".to_string(),
            ))
        }
    }
}

/// Extension an object of the given verified type is stored under.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "text/plain" => "txt",
        "text/html" => "html",
        "text/xml" | "application/xml" => "xml",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        "application/postscript" => "ps",
        "image/gif" => "gif",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "image/x-icon" => "ico",
        "audio/wave" => "wav",
        "audio/aiff" => "aiff",
        "audio/mpeg" => "mp3",
        "audio/midi" => "mid",
        "application/ogg" => "ogg",
        "video/avi" => "avi",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "application/zip" => "zip",
        "application/x-gzip" => "gz",
        "application/x-rar-compressed" => "rar",
        "application/x-7z-compressed" => "7z",
        "application/wasm" => "wasm",
        _ => FALLBACK_EXTENSION,
    }
}
