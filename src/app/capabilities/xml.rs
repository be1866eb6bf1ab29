//! Helpers shared by the capability parsers

use quick_xml::events::BytesStart;

use crate::constants::services;
use crate::errors::CapabilitiesError;

/// Element name without its namespace prefix
pub(super) fn local_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.local_name().as_ref()).into_owned()
}

/// Whether the open-element path ends with the given local names
pub(super) fn path_ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(open, expected)| open == expected)
}

pub(super) fn xml_error(position: u64, error: impl std::fmt::Display) -> CapabilitiesError {
    CapabilitiesError::Xml {
        position,
        reason: error.to_string(),
    }
}

pub(super) fn check_root(root: &str, accepted: &[&str], service: &str) -> Result<(), CapabilitiesError> {
    if accepted.contains(&root) {
        Ok(())
    } else {
        Err(CapabilitiesError::UnexpectedDocument {
            service: service.to_string(),
            root: root.to_string(),
        })
    }
}

/// Error for documents that contain no element at all
pub(super) fn missing_root(service: &str) -> CapabilitiesError {
    CapabilitiesError::UnexpectedDocument {
        service: service.to_string(),
        root: String::new(),
    }
}

/// PNG when advertised, else the first advertised format
pub(super) fn preferred_format(formats: &[String]) -> String {
    if formats.is_empty() || formats.iter().any(|f| f == services::PREFERRED_FORMAT) {
        services::PREFERRED_FORMAT.to_string()
    } else {
        formats[0].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_suffix_matching() {
        let path: Vec<String> = ["Capabilities", "Contents", "Layer", "Title"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(path_ends_with(&path, &["Layer", "Title"]));
        assert!(!path_ends_with(&path, &["Service", "Title"]));
        assert!(!path_ends_with(&path[..1], &["Layer", "Title"]));
    }

    #[test]
    fn test_preferred_format() {
        let formats = vec!["image/jpeg".to_string(), "image/png".to_string()];
        assert_eq!(preferred_format(&formats), "image/png");
        assert_eq!(preferred_format(&formats[..1]), "image/jpeg");
        assert_eq!(preferred_format(&[]), "image/png");
    }
}
