//! Scripted camera and face comparator.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use garagepi_core::{
    Camera, CapabilityError, CaptureError, FaceComparator, FaceMatch, FaceReference,
};

/// Camera returning a fixed frame, or failing.
#[derive(Debug, Clone)]
pub struct StubCamera {
    frame: Option<Vec<u8>>,
    captures: Arc<AtomicUsize>,
}

impl StubCamera {
    /// Camera that always returns `frame`.
    pub fn returning(frame: impl Into<Vec<u8>>) -> Self {
        Self { frame: Some(frame.into()), captures: Arc::default() }
    }

    /// Camera whose capture always fails.
    pub fn broken() -> Self {
        Self { frame: None, captures: Arc::default() }
    }

    /// Number of captures requested so far.
    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for StubCamera {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.frame.clone().ok_or_else(|| CaptureError::Failed("camera not responding".to_string()))
    }
}

/// Comparator that reports fixed similarities, or is unreachable.
#[derive(Debug, Clone)]
pub struct StubComparator {
    similarities: Option<Vec<f32>>,
    calls: Arc<AtomicUsize>,
}

impl StubComparator {
    /// Comparator reporting one match per entry in `similarities`.
    pub fn matching(similarities: impl Into<Vec<f32>>) -> Self {
        Self { similarities: Some(similarities.into()), calls: Arc::default() }
    }

    /// Comparator that cannot be reached.
    pub fn unreachable() -> Self {
        Self { similarities: None, calls: Arc::default() }
    }

    /// Number of comparisons requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceComparator for StubComparator {
    async fn compare(
        &self,
        _source: &[u8],
        _reference: FaceReference<'_>,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let similarities = self
            .similarities
            .as_ref()
            .ok_or_else(|| CapabilityError::Unreachable("connection refused".to_string()))?;
        Ok(similarities
            .iter()
            .filter(|&&similarity| similarity >= threshold)
            .map(|&similarity| FaceMatch { similarity })
            .collect())
    }
}
