//! Pipeline failure taxonomy

use linefeed_core::HttpError;

use crate::runner::Stage;

/// Fatal pipeline error. Each variant ends the run at the stage it names.
#[derive(Debug)]
pub enum PipelineError {
    /// Bad HTTP status, transport failure or undecodable feed body
    Extraction {
        status: Option<u16>,
        message: String,
    },
    /// The batch could not be written to, or loaded from, the staging artifact
    SchemaLoad(String),
    /// The warehouse rejected the upsert
    Merge(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction {
                status: Some(s),
                message,
            } => write!(f, "extraction failed with status code {s}: {message}"),
            Self::Extraction {
                status: None,
                message,
            } => write!(f, "extraction failed: {message}"),
            Self::SchemaLoad(msg) => write!(f, "staging load failed: {msg}"),
            Self::Merge(msg) => write!(f, "merge failed: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<HttpError> for PipelineError {
    fn from(e: HttpError) -> Self {
        Self::Extraction {
            status: e.status,
            message: e.message,
        }
    }
}

impl PipelineError {
    /// Stage at which the run failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Extraction { .. } => Stage::Extracting,
            Self::SchemaLoad(_) => Stage::Staging,
            Self::Merge(_) => Stage::Merging,
        }
    }

    /// HTTP status of an extraction failure, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Extraction { status, .. } => *status,
            _ => None,
        }
    }

    /// Wrap an error chain as a staging failure, keeping every cause.
    pub fn schema_load(e: &anyhow::Error) -> Self {
        Self::SchemaLoad(format!("{e:#}"))
    }

    pub fn merge(e: &anyhow::Error) -> Self {
        Self::Merge(format!("{e:#}"))
    }
}

/// Non-fatal cleanup finding: something expected to be removed was already gone,
/// or could not be removed. Logged, never changes the run outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning(pub String);

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_becomes_extraction_with_status() {
        let err: PipelineError = HttpError {
            status: Some(503),
            message: "Service Unavailable".to_string(),
        }
        .into();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.stage(), Stage::Extracting);
        assert_eq!(
            format!("{err}"),
            "extraction failed with status code 503: Service Unavailable"
        );
    }

    #[test]
    fn stages_per_variant() {
        assert_eq!(PipelineError::SchemaLoad("x".into()).stage(), Stage::Staging);
        assert_eq!(PipelineError::Merge("x".into()).stage(), Stage::Merging);
        assert_eq!(PipelineError::Merge("x".into()).status(), None);
    }

    #[test]
    fn error_chain_kept_in_message() {
        let inner = anyhow::anyhow!("Binder Error: column not found");
        let err = PipelineError::merge(&inner.context("Failed to update dw_test.lines"));
        let msg = format!("{err}");
        assert!(msg.contains("Failed to update dw_test.lines"));
        assert!(msg.contains("Binder Error"));
    }
}
