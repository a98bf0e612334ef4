use std::path::Path;
use thiserror::Error;

/// Default maximum photo size: 10 MB
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// Image subtypes the claim endpoints accept.
pub const ALLOWED_IMAGE_SUBTYPES: &[&str] = &["jpeg", "png", "gif", "webp", "bmp", "heic"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// An image that passed all local checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedImage {
    pub file_name: String,
    pub mime_type: String,
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::new("EMPTY_FILE", "File appears to be empty"));
    }
    if size > max_size {
        return Err(ValidationError::new(
            "FILE_TOO_LARGE",
            format!(
                "File size {} bytes exceeds maximum allowed {} bytes ({} MB)",
                size,
                max_size,
                max_size / 1024 / 1024
            ),
        ));
    }
    Ok(())
}

/// Normalizes a content type and checks it names an accepted image format.
pub fn validate_image_mime(content_type: &str) -> Result<String, ValidationError> {
    let parsed: mime::Mime = content_type.trim().parse().map_err(|_| {
        ValidationError::new(
            "INVALID_MIME_TYPE",
            format!("'{}' is not a valid content type", content_type),
        )
    })?;

    let subtype = parsed.subtype().as_str().to_lowercase();
    if parsed.type_().as_str().eq_ignore_ascii_case("image")
        && ALLOWED_IMAGE_SUBTYPES.contains(&subtype.as_str())
    {
        return Ok(parsed.essence_str().to_lowercase());
    }

    Err(ValidationError::new(
        "INVALID_MIME_TYPE",
        format!(
            "MIME type '{}' is not allowed. Only JPEG, PNG, GIF, WebP, BMP and HEIC photos are accepted.",
            content_type
        ),
    ))
}

/// Strips any directory part and replaces characters that are unsafe in a
/// multipart filename.
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "Filename cannot be empty",
        ));
    }

    if name.starts_with('.') {
        return Err(ValidationError::new(
            "HIDDEN_FILE",
            "Hidden files (starting with '.') are not allowed",
        ));
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';') {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        return Ok(sanitized[..end].to_string());
    }

    Ok(sanitized)
}

/// Best guess at a file's type: magic bytes first, extension second.
pub fn detect_mime(bytes: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }

    // ELF, PE/COFF, Mach-O
    header.starts_with(&[0x7F, 0x45, 0x4C, 0x46])
        || header.starts_with(&[0x4D, 0x5A])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
        || header.starts_with(b"#!")
}

/// Rejects content whose signature contradicts an image claim.
pub fn verify_image_bytes(bytes: &[u8]) -> Result<(), ValidationError> {
    if is_executable_content(bytes) {
        return Err(ValidationError::new(
            "EXECUTABLE_CONTENT",
            "File contains executable content which is not allowed",
        ));
    }

    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() != infer::MatcherType::Image => Err(ValidationError::new(
            "MIME_MISMATCH",
            format!("File content is {}, not an image", kind.mime_type()),
        )),
        _ => {
            // Unknown signatures are let through; the server re-checks.
            Ok(())
        }
    }
}

/// Full local check for a photo before it is staged or uploaded.
pub fn validate_image(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
    max_size: usize,
) -> Result<ValidatedImage, ValidationError> {
    validate_file_size(bytes.len(), max_size)?;

    let file_name = sanitize_filename(filename)?;

    let claimed = match content_type {
        Some(ct) if !ct.trim().is_empty() => ct.to_string(),
        _ => detect_mime(bytes, &file_name),
    };
    let mime_type = validate_image_mime(&claimed)?;

    verify_image_bytes(bytes)?;

    Ok(ValidatedImage {
        file_name,
        mime_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, MAX_IMAGE_SIZE).is_ok());
        assert!(validate_file_size(MAX_IMAGE_SIZE, MAX_IMAGE_SIZE).is_ok());
        assert_eq!(
            validate_file_size(MAX_IMAGE_SIZE + 1, MAX_IMAGE_SIZE)
                .unwrap_err()
                .code,
            "FILE_TOO_LARGE"
        );
        assert_eq!(validate_file_size(0, MAX_IMAGE_SIZE).unwrap_err().code, "EMPTY_FILE");
    }

    #[test]
    fn test_validate_image_mime() {
        assert_eq!(validate_image_mime("image/JPEG").unwrap(), "image/jpeg");
        assert_eq!(validate_image_mime("image/png; charset=binary").unwrap(), "image/png");
        assert!(validate_image_mime("application/pdf").is_err());
        assert!(validate_image_mime("image/svg+xml").is_err());
        assert!(validate_image_mime("not a mime").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("front.jpg").unwrap(), "front.jpg");
        assert_eq!(sanitize_filename("C:\\photos\\rear.png").unwrap(), "rear.png");
        assert_eq!(sanitize_filename("../../etc/car.jpg").unwrap(), "car.jpg");
        assert_eq!(sanitize_filename("a<b>.jpg").unwrap(), "a_b_.jpg");
        assert!(sanitize_filename(".hidden.jpg").is_err());
        assert!(sanitize_filename("photos/").is_err());
    }

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(PNG, "whatever.bin"), "image/png");
        assert_eq!(detect_mime(b"plain bytes", "left.jpeg"), "image/jpeg");
        assert_eq!(detect_mime(b"plain bytes", "notes"), "application/octet-stream");
    }

    #[test]
    fn test_validate_image() {
        let ok = validate_image("front.jpg", None, JPEG, MAX_IMAGE_SIZE).unwrap();
        assert_eq!(ok.mime_type, "image/jpeg");

        // Executable disguised as an image
        let err = validate_image("front.jpg", Some("image/jpeg"), &[0x4D, 0x5A, 0, 0, 1], MAX_IMAGE_SIZE)
            .unwrap_err();
        assert_eq!(err.code, "EXECUTABLE_CONTENT");

        // PDF labelled as a PNG
        let err = validate_image("scan.png", Some("image/png"), b"%PDF-1.5 rest", MAX_IMAGE_SIZE)
            .unwrap_err();
        assert_eq!(err.code, "MIME_MISMATCH");

        let err = validate_image("notes.txt", Some("text/plain"), b"hello", MAX_IMAGE_SIZE).unwrap_err();
        assert_eq!(err.code, "INVALID_MIME_TYPE");
    }
}
