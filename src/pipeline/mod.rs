//! Capture-to-entity pipeline
//!
//! Sequences the three collaborators (camera, text recognizer, entity
//! annotator) as strictly ordered awaited stages. Exactly one run is in
//! flight at a time; a run that fails reports a short notice, clears the
//! busy indicator, and stops. Teardown cancellation turns any pending
//! stage completion into a no-op.

use std::error::Error as _;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::{CameraError, StillCamera};
use crate::extract::{EntityAnnotation, EntityAnnotator, EntityItem, EntityKind, ExtractionError};
use crate::vision::{RecognitionError, TextRecognizer};

/// Stage the pipeline is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Capturing,
    Recognizing,
    AwaitingModel,
    Annotating,
    Done,
    Failed,
}

impl PipelineState {
    /// Whether a run is currently in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Capturing
                | PipelineState::Recognizing
                | PipelineState::AwaitingModel
                | PipelineState::Annotating
        )
    }
}

/// Error taxonomy for a pipeline run
#[derive(Debug, Error)]
pub enum ScanError {
    /// Access to the camera was denied; terminal for the whole flow
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    /// The camera failed to bind or produce a frame
    #[error("image capture failed")]
    Capture(#[source] CameraError),
    /// Text extraction from the frame failed
    #[error("text recognition failed")]
    Recognition(#[source] RecognitionError),
    /// The entity extraction model could not be made ready
    #[error("entity extraction model unavailable")]
    ModelUnavailable(#[source] ExtractionError),
    /// Entity annotation failed
    #[error("entity extraction failed")]
    Annotation(#[source] ExtractionError),
}

impl ScanError {
    /// Short user-facing notice for this error
    pub fn notice(&self) -> &'static str {
        match self {
            ScanError::PermissionDenied(_) => "Camera permission not granted",
            ScanError::Capture(_) => "Failed to capture image",
            ScanError::Recognition(_) => "Failed to recognize text",
            ScanError::ModelUnavailable(_) => "Failed to download entity extraction model",
            ScanError::Annotation(_) => "Failed to extract entities",
        }
    }
}

/// UI feedback surface: the busy indicator and transient notices
pub trait Feedback: Send + Sync {
    /// Show or clear the busy indicator
    fn set_busy(&self, busy: bool);
    /// Show a short transient notice
    fn notice(&self, message: &str);
}

/// The capture-to-entity pipeline
pub struct ScanPipeline {
    camera: Box<dyn StillCamera>,
    recognizer: Box<dyn TextRecognizer>,
    annotator: Box<dyn EntityAnnotator>,
    feedback: Arc<dyn Feedback>,
    cancel: CancellationToken,
    state: PipelineState,
    last_error: Option<ScanError>,
    access_granted: bool,
}

impl ScanPipeline {
    /// Create a new pipeline over the given collaborators
    pub fn new(
        camera: Box<dyn StillCamera>,
        recognizer: Box<dyn TextRecognizer>,
        annotator: Box<dyn EntityAnnotator>,
        feedback: Arc<dyn Feedback>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            camera,
            recognizer,
            annotator,
            feedback,
            cancel,
            state: PipelineState::Idle,
            last_error: None,
            access_granted: false,
        }
    }

    /// Current pipeline state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Error recorded by the last failed run, if any
    pub fn last_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    /// Open the capture session: request camera access once, bind the
    /// session, and prepare the recognition backend.
    ///
    /// Permission denial is terminal; the camera is never bound and the
    /// caller is expected to close the surrounding screen.
    pub async fn open(&mut self) -> Result<(), ScanError> {
        if !self.access_granted {
            if let Err(e) = self.camera.request_access().await {
                let err = ScanError::PermissionDenied(e.to_string());
                self.report(&err);
                self.state = PipelineState::Failed;
                return Err(err);
            }
            self.access_granted = true;
        }

        if let Err(e) = self.camera.bind().await {
            let err = ScanError::Capture(e);
            self.report(&err);
            self.state = PipelineState::Failed;
            return Err(err);
        }

        if let Err(e) = self.recognizer.ensure_ready().await {
            let err = ScanError::Recognition(e);
            self.report(&err);
            self.state = PipelineState::Failed;
            return Err(err);
        }

        info!("Capture session open");
        Ok(())
    }

    /// Run one capture-to-entity pass
    ///
    /// Returns the ordered item list on success (possibly empty), and
    /// `None` when the run failed or was cancelled; failures are reported
    /// through the feedback surface, not the return value.
    pub async fn run(&mut self) -> Option<Vec<EntityItem>> {
        // The trigger is disabled while a run is in flight
        if self.state.is_busy() {
            warn!("capture trigger ignored: a run is already in flight");
            self.feedback.notice("A capture is already in progress");
            return None;
        }

        self.last_error = None;
        self.feedback.set_busy(true);

        let outcome = self.run_stages().await;
        self.feedback.set_busy(false);

        match outcome {
            Ok(Some(items)) => {
                info!("Scan complete: {} entities", items.len());
                self.state = PipelineState::Done;
                Some(items)
            }
            Ok(None) => {
                debug!("scan cancelled before completion");
                self.state = PipelineState::Idle;
                None
            }
            Err(err) => {
                self.report(&err);
                self.state = PipelineState::Failed;
                self.last_error = Some(err);
                None
            }
        }
    }

    async fn run_stages(&mut self) -> Result<Option<Vec<EntityItem>>, ScanError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        self.state = PipelineState::Capturing;
        let frame = self
            .camera
            .capture_still()
            .await
            .map_err(ScanError::Capture)?;
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        self.state = PipelineState::Recognizing;
        let recognized = self
            .recognizer
            .recognize(frame)
            .await
            .map_err(ScanError::Recognition)?;
        debug!(
            "Recognized {} chars in {}ms",
            recognized.text.len(),
            recognized.processing_time_ms
        );
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        self.state = PipelineState::AwaitingModel;
        self.annotator
            .ensure_model()
            .await
            .map_err(ScanError::ModelUnavailable)?;
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        self.state = PipelineState::Annotating;
        let annotations = self
            .annotator
            .annotate(&recognized.text)
            .await
            .map_err(ScanError::Annotation)?;
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        Ok(Some(flatten(&recognized.text, &annotations)))
    }

    /// Log the failure and surface its notice
    fn report(&self, err: &ScanError) {
        match err.source() {
            Some(source) => error!("scan pipeline failed: {}: {}", err, source),
            None => error!("scan pipeline failed: {}", err),
        }
        self.feedback.notice(err.notice());
    }

    #[cfg(test)]
    fn set_state(&mut self, state: PipelineState) {
        self.state = state;
    }
}

/// Flatten annotations into items, preserving annotation order and then
/// entity order within each annotation
fn flatten(text: &str, annotations: &[EntityAnnotation]) -> Vec<EntityItem> {
    let mut items = Vec::new();

    for annotation in annotations {
        let Some(name) = text.get(annotation.start..annotation.end) else {
            warn!(
                "annotation span {}..{} out of bounds, skipping",
                annotation.start, annotation.end
            );
            continue;
        };
        if name.is_empty() {
            continue;
        }

        for entity in &annotation.entities {
            items.push(EntityItem::new(name, EntityKind::from_code(entity.code)));
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::capture::{CapturedFrame, Rotation};
    use crate::extract::DetectedEntity;
    use crate::vision::RecognizedText;

    type CallLog = Arc<Mutex<Vec<&'static str>>>;

    fn test_frame() -> CapturedFrame {
        CapturedFrame::new(vec![0; 16], 2, 2, Rotation::None)
    }

    struct MockCamera {
        deny_access: bool,
        fail_capture: bool,
        cancel_on_capture: Option<CancellationToken>,
        calls: CallLog,
    }

    impl MockCamera {
        fn ok(calls: CallLog) -> Self {
            Self {
                deny_access: false,
                fail_capture: false,
                cancel_on_capture: None,
                calls,
            }
        }
    }

    #[async_trait]
    impl StillCamera for MockCamera {
        async fn request_access(&self) -> Result<(), CameraError> {
            self.calls.lock().unwrap().push("access");
            if self.deny_access {
                Err(CameraError::AccessDenied("denied by user".to_string()))
            } else {
                Ok(())
            }
        }

        async fn bind(&mut self) -> Result<(), CameraError> {
            self.calls.lock().unwrap().push("bind");
            Ok(())
        }

        async fn capture_still(&mut self) -> Result<CapturedFrame, CameraError> {
            self.calls.lock().unwrap().push("capture");
            if let Some(token) = &self.cancel_on_capture {
                token.cancel();
            }
            if self.fail_capture {
                Err(CameraError::CaptureFailed("shutter jammed".to_string()))
            } else {
                Ok(test_frame())
            }
        }
    }

    struct MockRecognizer {
        text: String,
        fail: bool,
        calls: CallLog,
    }

    #[async_trait]
    impl TextRecognizer for MockRecognizer {
        async fn ensure_ready(&self) -> Result<(), RecognitionError> {
            self.calls.lock().unwrap().push("ensure_ready");
            Ok(())
        }

        async fn recognize(
            &self,
            _frame: CapturedFrame,
        ) -> Result<RecognizedText, RecognitionError> {
            self.calls.lock().unwrap().push("recognize");
            if self.fail {
                Err(RecognitionError::Failed("blurry".to_string()))
            } else {
                Ok(RecognizedText {
                    text: self.text.clone(),
                    processing_time_ms: 1,
                })
            }
        }
    }

    struct MockAnnotator {
        annotations: Vec<EntityAnnotation>,
        fail_gate: bool,
        fail_annotate: bool,
        calls: CallLog,
    }

    #[async_trait]
    impl EntityAnnotator for MockAnnotator {
        async fn ensure_model(&self) -> Result<(), ExtractionError> {
            self.calls.lock().unwrap().push("ensure_model");
            if self.fail_gate {
                Err(ExtractionError::ModelUnavailable(
                    "download failed".to_string(),
                ))
            } else {
                Ok(())
            }
        }

        async fn annotate(&self, _text: &str) -> Result<Vec<EntityAnnotation>, ExtractionError> {
            self.calls.lock().unwrap().push("annotate");
            if self.fail_annotate {
                Err(ExtractionError::Failed("model crashed".to_string()))
            } else {
                Ok(self.annotations.clone())
            }
        }
    }

    #[derive(Default)]
    struct TestFeedback {
        busy: Mutex<bool>,
        busy_transitions: Mutex<Vec<bool>>,
        notices: Mutex<Vec<String>>,
    }

    impl TestFeedback {
        fn is_busy(&self) -> bool {
            *self.busy.lock().unwrap()
        }

        fn notices(&self) -> Vec<String> {
            self.notices.lock().unwrap().clone()
        }

        fn transitions(&self) -> Vec<bool> {
            self.busy_transitions.lock().unwrap().clone()
        }
    }

    impl Feedback for TestFeedback {
        fn set_busy(&self, busy: bool) {
            *self.busy.lock().unwrap() = busy;
            self.busy_transitions.lock().unwrap().push(busy);
        }

        fn notice(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    struct Harness {
        pipeline: ScanPipeline,
        feedback: Arc<TestFeedback>,
        calls: CallLog,
    }

    fn harness(
        camera: impl FnOnce(CallLog) -> MockCamera,
        recognizer_text: &str,
        recognizer_fail: bool,
        annotator: impl FnOnce(CallLog) -> MockAnnotator,
        cancel: CancellationToken,
    ) -> Harness {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let feedback = Arc::new(TestFeedback::default());

        let pipeline = ScanPipeline::new(
            Box::new(camera(calls.clone())),
            Box::new(MockRecognizer {
                text: recognizer_text.to_string(),
                fail: recognizer_fail,
                calls: calls.clone(),
            }),
            Box::new(annotator(calls.clone())),
            feedback.clone(),
            cancel,
        );

        Harness {
            pipeline,
            feedback,
            calls,
        }
    }

    fn annotator_with(annotations: Vec<EntityAnnotation>) -> impl FnOnce(CallLog) -> MockAnnotator {
        move |calls| MockAnnotator {
            annotations,
            fail_gate: false,
            fail_annotate: false,
            calls,
        }
    }

    fn annotation(start: usize, end: usize, codes: &[u32]) -> EntityAnnotation {
        EntityAnnotation {
            start,
            end,
            entities: codes.iter().map(|&code| DetectedEntity { code }).collect(),
        }
    }

    #[tokio::test]
    async fn test_success_flow() {
        let text = "Call 555-1234 or visit example.com";
        let mut h = harness(
            MockCamera::ok,
            text,
            false,
            annotator_with(vec![annotation(5, 13, &[8]), annotation(23, 34, &[10])]),
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let items = h.pipeline.run().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "555-1234");
        assert_eq!(items[0].kind, "Phone");
        assert_eq!(items[0].description, "Type: Phone");
        assert_eq!(items[1].name, "example.com");
        assert_eq!(items[1].kind, "URL");

        assert_eq!(h.pipeline.state(), PipelineState::Done);
        assert!(!h.feedback.is_busy());
        assert_eq!(h.feedback.transitions(), vec![true, false]);
        assert_eq!(
            *h.calls.lock().unwrap(),
            vec![
                "access",
                "bind",
                "ensure_ready",
                "capture",
                "recognize",
                "ensure_model",
                "annotate"
            ]
        );
    }

    #[tokio::test]
    async fn test_multiple_entities_per_annotation_keep_order() {
        let text = "4111 1111 1111 1111";
        let mut h = harness(
            MockCamera::ok,
            text,
            false,
            annotator_with(vec![annotation(0, 19, &[7, 8])]),
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let items = h.pipeline.run().await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, "Payment Card");
        assert_eq!(items[1].kind, "Phone");
        assert!(items.iter().all(|i| i.name == text));
    }

    #[tokio::test]
    async fn test_empty_text_yields_empty_list() {
        let mut h = harness(
            MockCamera::ok,
            "",
            false,
            annotator_with(vec![]),
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let items = h.pipeline.run().await.unwrap();

        assert!(items.is_empty());
        assert_eq!(h.pipeline.state(), PipelineState::Done);
        assert!(!h.feedback.is_busy());
    }

    #[tokio::test]
    async fn test_capture_failure_stops_pipeline() {
        let mut h = harness(
            |calls| MockCamera {
                fail_capture: true,
                ..MockCamera::ok(calls)
            },
            "unused",
            false,
            annotator_with(vec![]),
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.pipeline.state(), PipelineState::Failed);
        assert!(matches!(
            h.pipeline.last_error(),
            Some(ScanError::Capture(_))
        ));
        assert!(!h.feedback.is_busy());
        assert_eq!(h.feedback.notices(), vec!["Failed to capture image"]);
        assert!(!h.calls.lock().unwrap().contains(&"recognize"));
    }

    #[tokio::test]
    async fn test_recognition_failure_stops_pipeline() {
        let mut h = harness(
            MockCamera::ok,
            "unused",
            true,
            annotator_with(vec![]),
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.feedback.notices(), vec!["Failed to recognize text"]);
        assert!(!h.calls.lock().unwrap().contains(&"ensure_model"));
        assert!(!h.feedback.is_busy());
    }

    #[tokio::test]
    async fn test_model_gate_failure_skips_annotation() {
        let mut h = harness(
            MockCamera::ok,
            "some text",
            false,
            |calls| MockAnnotator {
                annotations: vec![],
                fail_gate: true,
                fail_annotate: false,
                calls,
            },
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(
            h.feedback.notices(),
            vec!["Failed to download entity extraction model"]
        );
        assert!(!h.calls.lock().unwrap().contains(&"annotate"));
        assert!(!h.feedback.is_busy());
        assert!(matches!(
            h.pipeline.last_error(),
            Some(ScanError::ModelUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_annotation_failure_stops_pipeline() {
        let mut h = harness(
            MockCamera::ok,
            "some text",
            false,
            |calls| MockAnnotator {
                annotations: vec![],
                fail_gate: false,
                fail_annotate: true,
                calls,
            },
            CancellationToken::new(),
        );

        h.pipeline.open().await.unwrap();
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.feedback.notices(), vec!["Failed to extract entities"]);
        assert!(!h.feedback.is_busy());
    }

    #[tokio::test]
    async fn test_permission_denied_never_binds_camera() {
        let mut h = harness(
            |calls| MockCamera {
                deny_access: true,
                ..MockCamera::ok(calls)
            },
            "unused",
            false,
            annotator_with(vec![]),
            CancellationToken::new(),
        );

        let err = h.pipeline.open().await.unwrap_err();

        assert!(matches!(err, ScanError::PermissionDenied(_)));
        assert_eq!(h.pipeline.state(), PipelineState::Failed);
        assert_eq!(h.feedback.notices(), vec!["Camera permission not granted"]);
        assert_eq!(*h.calls.lock().unwrap(), vec!["access"]);
    }

    #[tokio::test]
    async fn test_trigger_rejected_while_busy() {
        let mut h = harness(
            MockCamera::ok,
            "unused",
            false,
            annotator_with(vec![]),
            CancellationToken::new(),
        );

        h.pipeline.set_state(PipelineState::Recognizing);
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.feedback.notices(), vec!["A capture is already in progress"]);
        assert!(h.calls.lock().unwrap().is_empty());
        assert_eq!(h.pipeline.state(), PipelineState::Recognizing);
    }

    #[tokio::test]
    async fn test_cancelled_before_run_is_noop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut h = harness(
            MockCamera::ok,
            "unused",
            false,
            annotator_with(vec![]),
            cancel,
        );

        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(h.calls.lock().unwrap().is_empty());
        // Busy indicator still goes through a set/clear cycle
        assert_eq!(h.feedback.transitions(), vec![true, false]);
        assert!(h.feedback.notices().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_mid_run_skips_later_stages() {
        let cancel = CancellationToken::new();
        let mut h = harness(
            |calls| MockCamera {
                cancel_on_capture: Some(cancel.clone()),
                ..MockCamera::ok(calls)
            },
            "unused",
            false,
            annotator_with(vec![]),
            cancel.clone(),
        );

        h.pipeline.open().await.unwrap();
        let result = h.pipeline.run().await;

        assert!(result.is_none());
        assert_eq!(h.pipeline.state(), PipelineState::Idle);
        assert!(h.calls.lock().unwrap().contains(&"capture"));
        assert!(!h.calls.lock().unwrap().contains(&"recognize"));
        assert!(!h.feedback.is_busy());
    }

    #[test]
    fn test_flatten_preserves_order_and_substrings() {
        let text = "Call 555-1234 or visit example.com";
        let annotations = vec![annotation(5, 13, &[8]), annotation(23, 34, &[10])];

        let items = flatten(text, &annotations);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, &text[5..13]);
        assert_eq!(items[1].name, &text[23..34]);
    }

    #[test]
    fn test_flatten_skips_invalid_spans() {
        let text = "short";
        let annotations = vec![
            annotation(0, 50, &[8]),
            annotation(2, 2, &[8]),
            annotation(0, 5, &[10]),
        ];

        let items = flatten(text, &annotations);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "short");
    }

    #[test]
    fn test_flatten_maps_unknown_codes() {
        let items = flatten("odd", &[annotation(0, 3, &[99])]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, "Unknown");
        assert_eq!(items[0].description, "Type: Unknown");
    }
}
