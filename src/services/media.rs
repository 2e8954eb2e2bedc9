// src/services/media.rs

//! Non-text resource detection.
//!
//! Saved links frequently point at images, PDFs or downloads. Those get a
//! short reference block instead of a text extraction attempt.

use url::Url;

/// Category of a binary resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Binary,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Image => "Image",
            MediaKind::Video => "Video",
            MediaKind::Audio => "Audio",
            MediaKind::Document => "Document",
            MediaKind::Archive => "Archive",
            MediaKind::Binary => "File",
        }
    }

    /// Classify a URL by the extension of its last path segment.
    pub fn from_url(raw: &str) -> Option<Self> {
        let path = match Url::parse(raw) {
            Ok(url) => url.path().to_string(),
            Err(_) => raw.split(['?', '#']).next().unwrap_or(raw).to_string(),
        };
        let file = path.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Self::from_extension(&ext.to_ascii_lowercase())
    }

    fn from_extension(ext: &str) -> Option<Self> {
        let kind = match ext {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "bmp" | "svg" | "ico" | "tif" | "tiff"
            | "heic" | "avif" => MediaKind::Image,
            "mp4" | "m4v" | "mov" | "avi" | "wmv" | "flv" | "mkv" | "webm" | "mpeg" | "mpg" => {
                MediaKind::Video
            }
            "mp3" | "wav" | "flac" | "aac" | "ogg" | "oga" | "m4a" | "wma" | "opus" => {
                MediaKind::Audio
            }
            "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" | "odt" | "ods" | "odp"
            | "rtf" | "epub" | "mobi" => MediaKind::Document,
            "zip" | "rar" | "7z" | "tar" | "gz" | "tgz" | "bz2" | "xz" => MediaKind::Archive,
            "exe" | "msi" | "dmg" | "pkg" | "apk" | "deb" | "rpm" | "iso" | "bin" => {
                MediaKind::Binary
            }
            _ => return None,
        };
        Some(kind)
    }

    /// Classify a response by its `Content-Type`; `None` means text.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime.is_empty()
            || mime.starts_with("text/")
            || mime == "application/xhtml+xml"
            || mime == "application/xml"
        {
            return None;
        }

        let kind = if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else if mime == "application/pdf"
            || mime.contains("msword")
            || mime.contains("officedocument")
            || mime.contains("opendocument")
            || mime == "application/epub+zip"
        {
            MediaKind::Document
        } else if mime.contains("zip") || mime.contains("tar") || mime.contains("compressed") {
            MediaKind::Archive
        } else {
            MediaKind::Binary
        };
        Some(kind)
    }
}

/// Short note body describing a binary resource.
pub fn reference_block(kind: MediaKind, url: &str) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| url.to_string());

    format!(
        "<div><p>{} file: {}</p><p><a href=\"{}\">{}</a></p></div>",
        kind.label(),
        html_escape::encode_text(&name),
        html_escape::encode_double_quoted_attribute(url),
        html_escape::encode_text(url),
    )
}
