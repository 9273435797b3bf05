use std::collections::HashSet;
use thiserror::Error;

use super::models::ImportRequest;
use crate::config::ApiLimits;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportValidationError {
    #[error("names must contain between 1 and {0} entries")]
    InvalidNameCount(usize),
    #[error("file names must not be empty")]
    EmptyName,
    #[error("file name '{0}' exceeds {1} bytes")]
    NameTooLong(String, usize),
    #[error("file name '{0}' must not contain path separators or '..'")]
    InvalidName(String),
    #[error("file name '{0}' appears more than once")]
    DuplicateName(String),
    #[error("album_id must not be empty when present")]
    EmptyAlbumId,
}

pub fn validate_import(
    request: &ImportRequest,
    limits: &ApiLimits,
) -> Result<(), ImportValidationError> {
    if !(1..=limits.max_names_per_batch).contains(&request.names.len()) {
        return Err(ImportValidationError::InvalidNameCount(limits.max_names_per_batch));
    }

    if matches!(request.album_id.as_deref(), Some(id) if id.trim().is_empty()) {
        return Err(ImportValidationError::EmptyAlbumId);
    }

    let mut seen = HashSet::new();
    for name in &request.names {
        if name.trim().is_empty() {
            return Err(ImportValidationError::EmptyName);
        }

        if name.len() > limits.max_name_bytes {
            return Err(ImportValidationError::NameTooLong(
                name.clone(),
                limits.max_name_bytes,
            ));
        }

        if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
            return Err(ImportValidationError::InvalidName(name.clone()));
        }

        if !seen.insert(name.as_str()) {
            return Err(ImportValidationError::DuplicateName(name.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(names: &[&str]) -> ImportRequest {
        ImportRequest {
            names: names.iter().map(|n| n.to_string()).collect(),
            album_id: None,
        }
    }

    #[test]
    fn validate_import_accepts_plain_names() {
        let limits = ApiLimits::default();
        assert!(validate_import(&request(&["IMG_0001.jpg", "IMG_0002.JPG"]), &limits).is_ok());
    }

    #[test]
    fn validate_import_limits_name_count() {
        let limits = ApiLimits {
            max_names_per_batch: 2,
            ..Default::default()
        };
        assert_eq!(
            validate_import(&request(&[]), &limits),
            Err(ImportValidationError::InvalidNameCount(2))
        );
        assert_eq!(
            validate_import(&request(&["a", "b", "c"]), &limits),
            Err(ImportValidationError::InvalidNameCount(2))
        );
    }

    #[test]
    fn validate_import_rejects_bad_names() {
        let limits = ApiLimits::default();
        assert_eq!(
            validate_import(&request(&[" "]), &limits),
            Err(ImportValidationError::EmptyName)
        );
        for bad in ["../etc/passwd", "a/b.jpg", "a\\b.jpg", "..jpg"] {
            assert!(matches!(
                validate_import(&request(&[bad]), &limits),
                Err(ImportValidationError::InvalidName(_))
            ));
        }
        let long = "x".repeat(256);
        assert!(matches!(
            validate_import(&request(&[long.as_str()]), &limits),
            Err(ImportValidationError::NameTooLong(_, 255))
        ));
        assert_eq!(
            validate_import(&request(&["a.jpg", "a.jpg"]), &limits),
            Err(ImportValidationError::DuplicateName("a.jpg".to_string()))
        );
    }

    #[test]
    fn validate_import_rejects_blank_album() {
        let mut req = request(&["a.jpg"]);
        req.album_id = Some(String::new());
        assert_eq!(
            validate_import(&req, &ApiLimits::default()),
            Err(ImportValidationError::EmptyAlbumId)
        );
    }
}
