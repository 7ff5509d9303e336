use thiserror::Error;

/// Failures that keep a session from entering or staying in `Running`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("video device unavailable: {0}")]
    Device(String),
    #[error("face mesh backend failed to initialize: {0}")]
    InferenceInit(String),
    #[error("face mesh worker exited unexpectedly")]
    WorkerExited,
}

impl SessionError {
    pub fn device(err: anyhow::Error) -> Self {
        SessionError::Device(format!("{err:#}"))
    }

    pub fn inference_init(err: anyhow::Error) -> Self {
        SessionError::InferenceInit(format!("{err:#}"))
    }

    pub fn is_device(&self) -> bool {
        matches!(self, SessionError::Device(_))
    }

    pub fn is_inference_init(&self) -> bool {
        matches!(self, SessionError::InferenceInit(_))
    }
}

/// A face reported by the backend that does not fit the expected topology.
/// Never propagated past the scheduler; the face is dropped instead.
#[derive(Debug, Error, PartialEq)]
pub enum MalformedResult {
    #[error("expected {expected} landmarks, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
    #[error("landmark {index} lies too far outside the frame")]
    OutOfRange { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn messages_keep_the_cause_chain() {
        let err = SessionError::device(anyhow!("permission denied"));
        assert_eq!(err.to_string(), "video device unavailable: permission denied");
        assert!(err.is_device());

        let err = SessionError::inference_init(anyhow!("model missing").context("loading model"));
        assert_eq!(
            err.to_string(),
            "face mesh backend failed to initialize: loading model: model missing"
        );
        assert!(err.is_inference_init());
    }
}
