//! Artifact naming convention
//!
//! The pipeline type is encoded into the artifact file name so it can be
//! recovered from the name alone: `<pipeline-name>_<pipeline-type>`.

use thiserror::Error;

use crate::domain::pipeline::{PipelineType, UnknownPipelineType};

/// Separates the pipeline name from the type suffix
pub const TYPE_DELIMITER: &str = "_";

/// Longest accepted pipeline name
pub const MAX_NAME_LEN: usize = 255;

/// Errors returned when an artifact name cannot be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("artifact name '{0}' has no type suffix")]
    MissingDelimiter(String),

    #[error("artifact name '{0}' has an empty pipeline name")]
    EmptyName(String),

    #[error(transparent)]
    UnknownType(#[from] UnknownPipelineType),
}

/// Appends the type to the output binary name
pub fn append_type_to_name(name: &str, pipeline_type: PipelineType) -> String {
    format!("{}{}{}", name, TYPE_DELIMITER, pipeline_type)
}

/// Recovers the pipeline name and type from an artifact file name
pub fn parse_artifact_name(file_name: &str) -> Result<(String, PipelineType), NamingError> {
    let (name, suffix) = file_name
        .rsplit_once(TYPE_DELIMITER)
        .ok_or_else(|| NamingError::MissingDelimiter(file_name.to_string()))?;

    if name.is_empty() {
        return Err(NamingError::EmptyName(file_name.to_string()));
    }

    let pipeline_type = suffix.parse::<PipelineType>()?;
    Ok((name.to_string(), pipeline_type))
}

/// Checks that a name can be encoded into an artifact name and decoded back
///
/// The name must be non-empty, at most [`MAX_NAME_LEN`] characters, and must
/// not contain the type delimiter or a path separator.
pub fn is_valid_pipeline_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.chars().count() <= MAX_NAME_LEN
        && !name.contains(TYPE_DELIMITER)
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_type_to_name() {
        assert_eq!(append_type_to_name("demo", PipelineType::Golang), "demo_golang");
        assert_eq!(append_type_to_name("my-app", PipelineType::NodeJs), "my-app_nodejs");
    }

    #[test]
    fn test_encoding_is_invertible() {
        for name in ["demo", "build-42", "Release.Candidate", "x"] {
            for t in PipelineType::ALL {
                let encoded = append_type_to_name(name, t);
                assert_eq!(parse_artifact_name(&encoded), Ok((name.to_string(), t)));
            }
        }
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        assert_eq!(
            parse_artifact_name("demo"),
            Err(NamingError::MissingDelimiter("demo".to_string()))
        );
        assert_eq!(
            parse_artifact_name("_golang"),
            Err(NamingError::EmptyName("_golang".to_string()))
        );
        assert!(matches!(
            parse_artifact_name("demo_rust"),
            Err(NamingError::UnknownType(_))
        ));
    }

    #[test]
    fn test_valid_pipeline_names() {
        assert!(is_valid_pipeline_name("demo"));
        assert!(is_valid_pipeline_name("my-pipeline.v2"));

        assert!(!is_valid_pipeline_name(""));
        assert!(!is_valid_pipeline_name("   "));
        assert!(!is_valid_pipeline_name("has_underscore"));
        assert!(!is_valid_pipeline_name("nested/path"));
        assert!(!is_valid_pipeline_name(".."));
        assert!(!is_valid_pipeline_name(&"a".repeat(MAX_NAME_LEN + 1)));
    }
}
