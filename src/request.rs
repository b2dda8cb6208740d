//! Trim requests: the loose argument bag and its validated form.

use crate::error::TrimError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use vidtrim_media::TimeWindow;

/// Arguments as a caller sends them. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub start_ms: Option<i64>,
    #[serde(default)]
    pub end_ms: Option<i64>,
    /// Rotation override in degrees; negative means none.
    #[serde(default)]
    pub rotation: Option<i32>,
}

impl TrimRequest {
    pub fn new(path: impl Into<String>, start_ms: i64, end_ms: i64) -> Self {
        Self {
            path: Some(path.into()),
            start_ms: Some(start_ms),
            end_ms: Some(end_ms),
            rotation: None,
        }
    }

    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation = Some(degrees);
        self
    }

    /// Check the arguments and produce a job the worker can run.
    pub fn validate(self) -> Result<TrimJob, TrimError> {
        let path = self
            .path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| TrimError::invalid_arguments("path is required"))?;
        let start_ms = self
            .start_ms
            .ok_or_else(|| TrimError::invalid_arguments("startMs is required"))?;
        let end_ms = self
            .end_ms
            .ok_or_else(|| TrimError::invalid_arguments("endMs is required"))?;

        let window = TimeWindow::new(start_ms, end_ms)
            .map_err(|e| TrimError::invalid_arguments(e.to_string()))?;

        Ok(TrimJob {
            source: PathBuf::from(path),
            window,
            rotation: self.rotation.filter(|r| *r >= 0),
            output: None,
        })
    }
}

/// A validated trim job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimJob {
    pub source: PathBuf,
    pub window: TimeWindow,
    pub rotation: Option<i32>,
    /// Explicit output path; a unique name is generated when absent.
    pub output: Option<PathBuf>,
}

impl TrimJob {
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrimErrorKind;

    #[test]
    fn test_valid_request() {
        let job = TrimRequest::new("/videos/clip.mp4", 2000, 5000)
            .with_rotation(90)
            .validate()
            .unwrap();
        assert_eq!(job.source, PathBuf::from("/videos/clip.mp4"));
        assert_eq!(job.window.start_ms(), 2000);
        assert_eq!(job.window.end_ms(), 5000);
        assert_eq!(job.rotation, Some(90));
        assert_eq!(job.output, None);
    }

    #[test]
    fn test_negative_rotation_means_none() {
        let job = TrimRequest::new("a.mp4", 0, 10)
            .with_rotation(-1)
            .validate()
            .unwrap();
        assert_eq!(job.rotation, None);
    }

    #[test]
    fn test_missing_fields() {
        let err = TrimRequest::default().validate().unwrap_err();
        assert_eq!(err.kind, TrimErrorKind::InvalidArguments);
        assert_eq!(err.detail.as_deref(), Some("path is required"));

        let request = TrimRequest {
            path: Some("a.mp4".into()),
            start_ms: Some(0),
            ..TrimRequest::default()
        };
        assert_eq!(
            request.validate().unwrap_err().detail.as_deref(),
            Some("endMs is required")
        );
    }

    #[test]
    fn test_bad_window() {
        for (start, end) in [(-1, 100), (3000, 3000), (5000, 2000)] {
            let err = TrimRequest::new("a.mp4", start, end).validate().unwrap_err();
            assert_eq!(err.kind, TrimErrorKind::InvalidArguments);
        }
    }

    #[test]
    fn test_from_json() {
        let request: TrimRequest =
            serde_json::from_str(r#"{"path": "/v/a.mp4", "startMs": 0, "endMs": 1500}"#).unwrap();
        let job = request.validate().unwrap();
        assert_eq!(job.window.duration_ms(), 1500);
    }
}
