//! Title images arrive inline as data URIs and are handed to the curator as
//! files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid image data: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Failed to write title image '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Decoded image bytes and the file extension they should be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// File extension for an image subtype, or `None` when unsupported.
pub fn image_extension(subtype: &str) -> Option<&'static str> {
    match subtype.to_ascii_lowercase().as_str() {
        "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        _ => None,
    }
}

/// Decodes `data:image/<type>;base64,<data>`.
///
/// Anything that is not an image data URI, and unsupported image types,
/// yield `Ok(None)`. Malformed base64 is an error.
pub fn decode_data_uri(uri: &str) -> Result<Option<ImageData>, ImageError> {
    if uri.trim().is_empty() || !uri.starts_with("data:image/") {
        return Ok(None);
    }

    let Ok(pattern) = Regex::new(r"data:image/(?P<type>[a-zA-Z]+);base64,(?P<data>.+)") else {
        return Ok(None);
    };
    let Some(captures) = pattern.captures(uri) else {
        return Ok(None);
    };
    let subtype = captures.name("type").map(|m| m.as_str()).unwrap_or_default();
    let data = captures.name("data").map(|m| m.as_str()).unwrap_or_default();

    let Some(extension) = image_extension(subtype) else {
        log::warn!("Unsupported image type: {}", subtype);
        return Ok(None);
    };

    let bytes = STANDARD.decode(data.trim())?;
    Ok(Some(ImageData { extension, bytes }))
}

/// A title image written to the temp directory, deleted on drop.
#[derive(Debug)]
pub struct TitleImage {
    path: PathBuf,
}

impl TitleImage {
    pub fn write(image: &ImageData) -> Result<Self, ImageError> {
        Self::write_in(&std::env::temp_dir(), image)
    }

    pub fn write_in(dir: &Path, image: &ImageData) -> Result<Self, ImageError> {
        let path = dir.join(format!("ua-image-{}.{}", Uuid::new_v4(), image.extension));
        fs::write(&path, &image.bytes).map_err(|e| ImageError::Write {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        crate::sanitize::file_name(&self.path)
    }
}

impl Drop for TitleImage {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to delete title image {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8/5+hHgAHggJ/PchI7wAAAABJRU5ErkJggg==";

    #[test]
    fn test_decode_png() {
        let image = decode_data_uri(PNG).unwrap().unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_decode_maps_extensions() {
        let jpeg = decode_data_uri("data:image/jpeg;base64,/9j/4AAQSkZJRgABAQEASABIAAD/2wBDAA==")
            .unwrap()
            .unwrap();
        assert_eq!(jpeg.extension, "jpg");
        assert_eq!(&jpeg.bytes[..2], &[0xff, 0xd8]);

        let gif = decode_data_uri("data:image/GIF;base64,R0lGODlhAQABAAAAACw=")
            .unwrap()
            .unwrap();
        assert_eq!(gif.extension, "gif");
    }

    #[test]
    fn test_decode_trims_trailing_whitespace() {
        let webp =
            decode_data_uri("data:image/webp;base64,UklGRhoAAABXRUJQVlA4TAYAAAAvAAAAAAfQ//73vQ== ")
                .unwrap()
                .unwrap();
        assert_eq!(webp.extension, "webp");
        assert_eq!(&webp.bytes[..4], b"RIFF");
    }

    #[test]
    fn test_decode_skips_non_images() {
        assert!(decode_data_uri("").unwrap().is_none());
        assert!(decode_data_uri("https://example.com/a.png").unwrap().is_none());
        assert!(decode_data_uri("data:image/svg+xml;base64,PHN2Zz4=").unwrap().is_none());
        assert!(decode_data_uri("data:image/bmp;base64,Qk0=").unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64,not base64!"),
            Err(ImageError::Decode(_))
        ));
    }

    #[test]
    fn test_title_image_removed_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let image = ImageData {
            extension: "png",
            bytes: vec![1, 2, 3],
        };

        let written = TitleImage::write_in(dir.path(), &image).unwrap();
        let path = written.path().to_path_buf();
        assert!(written.file_name().starts_with("ua-image-"));
        assert!(written.file_name().ends_with(".png"));
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        drop(written);
        assert!(!path.exists());
    }
}
