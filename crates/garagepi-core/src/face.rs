//! Camera-based facial verification.
//!
//! The strategy is chosen once at startup and never changes. Both variants
//! hand the captured frame to an external comparator and reduce its match
//! records to an outcome with a fixed similarity threshold.
//!
//! Fail-closed: a disabled or failing comparator, or a camera that produces
//! no frame, yields `Faulted`, which never opens the door and is logged apart
//! from a genuine mismatch (`Denied`).

use async_trait::async_trait;

use crate::{
    error::{CapabilityError, CaptureError},
    outcome::{FaultReason, VerificationOutcome},
};

/// Default minimum similarity, in percent.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 80.0;

/// One face match reported by a comparator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatch {
    /// Similarity in percent (0 to 100).
    pub similarity: f32,
}

/// What the captured frame is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceReference<'a> {
    /// Image bytes held locally.
    Image(&'a [u8]),
    /// Named object in the comparator's remote store.
    RemoteObject {
        /// Store or bucket holding the object.
        collection: &'a str,
        /// Object name.
        object: &'a str,
    },
}

/// External face-comparison capability.
#[async_trait]
pub trait FaceComparator: Send + Sync {
    /// Compare `source` against `reference`, returning matches at or above
    /// `threshold`.
    async fn compare(
        &self,
        source: &[u8],
        reference: FaceReference<'_>,
        threshold: f32,
    ) -> Result<Vec<FaceMatch>, CapabilityError>;
}

/// Still-image camera.
#[async_trait]
pub trait Camera: Send + Sync {
    /// Capture one frame.
    async fn capture(&self) -> Result<Vec<u8>, CaptureError>;
}

/// Comparator used when no backend is configured. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledComparator;

#[async_trait]
impl FaceComparator for DisabledComparator {
    async fn compare(
        &self,
        _source: &[u8],
        _reference: FaceReference<'_>,
        _threshold: f32,
    ) -> Result<Vec<FaceMatch>, CapabilityError> {
        Err(CapabilityError::Disabled)
    }
}

/// Camera used when no capture device is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCamera;

#[async_trait]
impl Camera for DisabledCamera {
    async fn capture(&self) -> Result<Vec<u8>, CaptureError> {
        Err(CaptureError::Failed("no camera configured".to_string()))
    }
}

/// Reference the captured frame is checked against.
#[derive(Clone, PartialEq, Eq)]
pub enum FaceStrategy {
    /// Compare against a locally loaded image.
    LocalReference {
        /// Reference image bytes.
        reference: Vec<u8>,
    },
    /// Compare against an object in the comparator's store.
    RemoteReference {
        /// Store or bucket name.
        collection: String,
        /// Object name.
        object: String,
    },
}

impl std::fmt::Debug for FaceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalReference { reference } => f
                .debug_struct("LocalReference")
                .field("reference_len", &reference.len())
                .finish(),
            Self::RemoteReference { collection, object } => f
                .debug_struct("RemoteReference")
                .field("collection", collection)
                .field("object", object)
                .finish(),
        }
    }
}

impl FaceStrategy {
    /// The reference as seen by a comparator.
    pub fn reference(&self) -> FaceReference<'_> {
        match self {
            Self::LocalReference { reference } => FaceReference::Image(reference),
            Self::RemoteReference { collection, object } => {
                FaceReference::RemoteObject { collection, object }
            },
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalReference { .. } => "local",
            Self::RemoteReference { .. } => "remote",
        }
    }

    /// Capture a frame and compare it against the reference.
    pub async fn verify(
        &self,
        camera: &dyn Camera,
        comparator: &dyn FaceComparator,
        threshold: f32,
    ) -> VerificationOutcome {
        let frame = match camera.capture().await {
            Ok(frame) if frame.is_empty() => {
                return VerificationOutcome::Faulted(FaultReason::Capture(
                    CaptureError::Empty.to_string(),
                ));
            },
            Ok(frame) => frame,
            Err(e) => return VerificationOutcome::Faulted(FaultReason::Capture(e.to_string())),
        };

        match comparator.compare(&frame, self.reference(), threshold).await {
            Ok(matches) => {
                let best = matches.iter().map(|m| m.similarity).reduce(f32::max);
                tracing::debug!(
                    strategy = self.name(),
                    matches = matches.len(),
                    ?best,
                    "face compared"
                );

                if matches.iter().any(|m| m.similarity >= threshold) {
                    VerificationOutcome::Granted
                } else {
                    VerificationOutcome::Denied
                }
            },
            Err(e) => {
                VerificationOutcome::Faulted(FaultReason::CapabilityUnavailable(e.to_string()))
            },
        }
    }
}

/// A strategy bundled with its collaborators, as owned by the dispatcher.
pub struct FaceVerifier {
    strategy: Option<FaceStrategy>,
    camera: Box<dyn Camera>,
    comparator: Box<dyn FaceComparator>,
    threshold: f32,
}

impl std::fmt::Debug for FaceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceVerifier")
            .field("strategy", &self.strategy)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl FaceVerifier {
    /// Verifier for `strategy` using the given collaborators.
    pub fn new(
        strategy: FaceStrategy,
        camera: Box<dyn Camera>,
        comparator: Box<dyn FaceComparator>,
    ) -> Self {
        Self {
            strategy: Some(strategy),
            camera,
            comparator,
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Verifier with no strategy. Every trigger faults as unavailable.
    pub fn disabled() -> Self {
        Self {
            strategy: None,
            camera: Box::new(DisabledCamera),
            comparator: Box::new(DisabledComparator),
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }

    /// Override the similarity threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Configured strategy, if any.
    pub fn strategy(&self) -> Option<&FaceStrategy> {
        self.strategy.as_ref()
    }

    /// Run one verification.
    pub async fn verify(&self) -> VerificationOutcome {
        let outcome = match &self.strategy {
            Some(strategy) => {
                let (camera, comparator) = (self.camera.as_ref(), self.comparator.as_ref());
                strategy.verify(camera, comparator, self.threshold).await
            },
            None => VerificationOutcome::Faulted(FaultReason::CapabilityUnavailable(
                CapabilityError::Disabled.to_string(),
            )),
        };

        match &outcome {
            VerificationOutcome::Granted => tracing::info!("face verified"),
            VerificationOutcome::Denied => tracing::info!("face not recognised"),
            VerificationOutcome::Faulted(reason) => {
                tracing::warn!(%reason, "face verification unavailable");
            },
        }
        outcome
    }
}
