//! Upload content-type validation and object-key derivation.
//!
//! Validation is on the declared content type only; decoding or sniffing
//! the image bytes is out of scope for the pipeline.

use crate::error::CoreError;
use crate::types::JobId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Content types accepted when no configuration overrides them.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// Key prefix under which uploaded shelf images are stored.
const OBJECT_KEY_PREFIX: &str = "shelves";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a declared content type against the allowed set.
///
/// Matching ignores any `;`-separated parameters (e.g. `image/png;
/// charset=binary` matches `image/png`) and is case-insensitive, per the
/// media-type grammar.
pub fn validate_content_type(content_type: &str, allowed: &[String]) -> Result<(), CoreError> {
    let essence = essence(content_type);
    if essence.is_empty() {
        return Err(CoreError::UnsupportedMediaType(
            "Missing content type".to_string(),
        ));
    }
    if allowed.iter().any(|a| a.eq_ignore_ascii_case(essence)) {
        Ok(())
    } else {
        Err(CoreError::UnsupportedMediaType(format!(
            "Invalid image format '{essence}'. Accepted formats: {}",
            allowed.join(", ")
        )))
    }
}

/// Strip media-type parameters and surrounding whitespace.
fn essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
}

// ---------------------------------------------------------------------------
// Object keys
// ---------------------------------------------------------------------------

/// Derive the object-store key for a job's uploaded image.
///
/// The extension comes from the (already validated) content type; unknown
/// subtypes fall back to `bin` so the key is always well-formed.
pub fn object_key(job_id: JobId, content_type: &str) -> String {
    let ext = match essence(content_type).to_ascii_lowercase().as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    };
    format!("{OBJECT_KEY_PREFIX}/{job_id}.{ext}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::CoreError;

    fn defaults() -> Vec<String> {
        DEFAULT_ALLOWED_CONTENT_TYPES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    // -- validate_content_type ------------------------------------------------

    #[test]
    fn jpeg_and_png_are_accepted_by_default() {
        assert!(validate_content_type("image/jpeg", &defaults()).is_ok());
        assert!(validate_content_type("image/png", &defaults()).is_ok());
    }

    #[test]
    fn text_plain_is_rejected() {
        let err = validate_content_type("text/plain", &defaults()).unwrap_err();
        assert_matches!(err, CoreError::UnsupportedMediaType(_));
    }

    #[test]
    fn parameters_and_case_are_ignored() {
        assert!(validate_content_type("IMAGE/PNG; charset=binary", &defaults()).is_ok());
    }

    #[test]
    fn empty_content_type_is_rejected() {
        let err = validate_content_type("", &defaults()).unwrap_err();
        assert_matches!(err, CoreError::UnsupportedMediaType(_));
    }

    #[test]
    fn configured_set_overrides_defaults() {
        let allowed = vec!["image/webp".to_string()];
        assert!(validate_content_type("image/webp", &allowed).is_ok());
        assert!(validate_content_type("image/jpeg", &allowed).is_err());
    }

    // -- object_key -----------------------------------------------------------

    #[test]
    fn object_key_uses_job_id_and_extension() {
        let id = JobId::new();
        assert_eq!(object_key(id, "image/jpeg"), format!("shelves/{id}.jpg"));
        assert_eq!(object_key(id, "image/png"), format!("shelves/{id}.png"));
    }

    #[test]
    fn unknown_subtype_falls_back_to_bin() {
        let id = JobId::new();
        assert_eq!(
            object_key(id, "application/octet-stream"),
            format!("shelves/{id}.bin")
        );
    }
}
