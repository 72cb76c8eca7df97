// THEORY:
// The `FrameQualityAnalyzer` is the per-frame judge of the capture engine. It is
// a stateless utility: given one frame and the detector capability it produces
// exactly one `FrameClassification`, and it remembers nothing between calls.
// Temporal smoothing is the debounce filter's job, not this one's.
//
// Algorithm (in order, first failing check wins):
// 1.  **Brightness gate**: Rec. 601 luma averaged over the full frame. Below the
//     darkness threshold the frame is `TooDark` and the detector is not run at
//     all, since face geometry is unreliable in the dark.
// 2.  **Face count**: one detector inference. Zero boxes is `NoFace`; more than
//     one is `MultipleFaces`, rejecting ambiguity instead of guessing the subject.
// 3.  **Geometry** on the single box, normalized to the frame:
//     - area ratio below the minimum is `TooFar`;
//     - a center outside the tolerance band on either axis is `NotCentered`
//       (the vertical band is wider to tolerate natural selfie angles);
//     - otherwise `Acceptable`.
//
// A maximum face size is measured and surfaced as `too_close`, but it never
// rejects a frame: very close faces are accepted on purpose.

use crate::core_modules::face::{DetectionError, FaceBox, FaceDetector, ModelState};
use crate::core_modules::frame::Frame;
use crate::core_modules::status::FrameClassification;

/// Tunable thresholds for the per-frame quality checks.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    /// Mean luma (0..255) below which a frame is considered too dark.
    pub darkness_threshold: f64,
    /// Smallest face-area / frame-area ratio accepted.
    pub min_face_area_ratio: f64,
    /// Face-area ratio above which `too_close` is flagged. Advisory only.
    pub max_face_area_ratio: f64,
    /// Accepted range for the face center as a fraction of frame width.
    pub horizontal_band: (f64, f64),
    /// Accepted range for the face center as a fraction of frame height.
    pub vertical_band: (f64, f64),
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            darkness_threshold: 40.0,
            min_face_area_ratio: 0.08,
            max_face_area_ratio: 0.65,
            horizontal_band: (0.30, 0.70),
            vertical_band: (0.25, 0.75),
        }
    }
}

/// The classification of one frame and the measurements behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub classification: FrameClassification,
    /// Mean luma; `None` when analysis was bypassed.
    pub brightness: Option<f64>,
    pub face_count: usize,
    pub face_area_ratio: Option<f64>,
    /// Face center as (x, y) fractions of the frame size.
    pub face_center: Option<(f64, f64)>,
    /// Face larger than `max_face_area_ratio`. Never affects `classification`.
    pub too_close: bool,
    /// Set when the detector was unavailable and the permissive verdict was used.
    pub bypassed: bool,
}

impl FrameReport {
    fn verdict(classification: FrameClassification, brightness: f64, face_count: usize) -> Self {
        Self {
            classification,
            brightness: Some(brightness),
            face_count,
            face_area_ratio: None,
            face_center: None,
            too_close: false,
            bypassed: false,
        }
    }

    fn permissive() -> Self {
        Self {
            classification: FrameClassification::Acceptable,
            brightness: None,
            face_count: 0,
            face_area_ratio: None,
            face_center: None,
            too_close: false,
            bypassed: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameQualityAnalyzer {
    config: AnalyzerConfig,
}

impl FrameQualityAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Consults the detector capability and classifies the frame.
    ///
    /// Returns `Ok(None)` while the model is still loading: no verdict can be
    /// trusted yet, so the caller should skip the tick. A failed model yields
    /// the permissive `Acceptable` verdict without inspecting the frame.
    pub fn analyze(&self, frame: &Frame, model: &ModelState) -> Result<Option<FrameReport>, DetectionError> {
        match model {
            ModelState::Loading => Ok(None),
            ModelState::Failed(_) => Ok(Some(FrameReport::permissive())),
            ModelState::Ready(detector) => self.classify(frame, detector.as_ref()).map(Some),
        }
    }

    /// Full classification with a ready detector.
    pub fn classify(&self, frame: &Frame, detector: &dyn FaceDetector) -> Result<FrameReport, DetectionError> {
        let brightness = frame.average_luminance();
        if frame.is_empty() || brightness < self.config.darkness_threshold {
            return Ok(FrameReport::verdict(FrameClassification::TooDark, brightness, 0));
        }

        let faces = detector.detect(frame)?;
        match faces.as_slice() {
            [] => Ok(FrameReport::verdict(FrameClassification::NoFace, brightness, 0)),
            [face] => Ok(self.classify_geometry(frame, face, brightness)),
            many => Ok(FrameReport::verdict(
                FrameClassification::MultipleFaces,
                brightness,
                many.len(),
            )),
        }
    }

    fn classify_geometry(&self, frame: &Frame, face: &FaceBox, brightness: f64) -> FrameReport {
        let frame_width = frame.width() as f64;
        let frame_height = frame.height() as f64;

        let area_ratio = face.area() / (frame_width * frame_height);
        let (center_x, center_y) = face.center();
        let center = (center_x / frame_width, center_y / frame_height);

        let classification = if area_ratio < self.config.min_face_area_ratio {
            FrameClassification::TooFar
        } else if !within(center.0, self.config.horizontal_band) || !within(center.1, self.config.vertical_band) {
            FrameClassification::NotCentered
        } else {
            FrameClassification::Acceptable
        };

        FrameReport {
            classification,
            brightness: Some(brightness),
            face_count: 1,
            face_area_ratio: Some(area_ratio),
            face_center: Some(center),
            too_close: area_ratio > self.config.max_face_area_ratio,
            bypassed: false,
        }
    }
}

fn within(value: f64, (low, high): (f64, f64)) -> bool {
    value >= low && value <= high
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::face::FixedDetector;
    use crate::core_modules::pixel::pixel::Pixel;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const W: u32 = 400;
    const H: u32 = 300;

    fn bright_frame() -> Frame {
        Frame::solid(W, H, Pixel::new(180, 150, 130, 255), 0)
    }

    fn classify_with(faces: Vec<FaceBox>) -> FrameReport {
        FrameQualityAnalyzer::default()
            .classify(&bright_frame(), &FixedDetector::new(faces))
            .unwrap()
    }

    struct CountingDetector(AtomicUsize);

    impl FaceDetector for CountingDetector {
        fn detect(&self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[test]
    fn dark_frames_skip_detection() {
        let detector = CountingDetector(AtomicUsize::new(0));
        let dark = Frame::solid(W, H, Pixel::new(20, 20, 20, 255), 0);
        let report = FrameQualityAnalyzer::default().classify(&dark, &detector).unwrap();
        assert_eq!(report.classification, FrameClassification::TooDark);
        assert_eq!(detector.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn counts_faces() {
        assert_eq!(classify_with(vec![]).classification, FrameClassification::NoFace);
        let two = vec![
            FaceBox::new(50.0, 50.0, 100.0, 100.0),
            FaceBox::new(250.0, 50.0, 100.0, 100.0),
        ];
        let report = classify_with(two);
        assert_eq!(report.classification, FrameClassification::MultipleFaces);
        assert_eq!(report.face_count, 2);
    }

    #[test]
    fn small_face_is_too_far() {
        // 60x60 over 400x300 = 0.03 of the frame.
        let report = classify_with(vec![FaceBox::new(170.0, 120.0, 60.0, 60.0)]);
        assert_eq!(report.classification, FrameClassification::TooFar);
    }

    #[test]
    fn off_center_face_is_rejected_on_either_axis() {
        // 120x120 = 0.12 of the frame; center x at 0.2.
        let left = classify_with(vec![FaceBox::new(20.0, 90.0, 120.0, 120.0)]);
        assert_eq!(left.classification, FrameClassification::NotCentered);

        // Center y at 0.8 of the height.
        let low = classify_with(vec![FaceBox::new(140.0, 180.0, 120.0, 120.0)]);
        assert_eq!(low.classification, FrameClassification::NotCentered);
    }

    #[test]
    fn vertical_band_is_wider_than_horizontal() {
        // Center at (0.5, 0.28): outside a 0.3-0.7 band, inside the vertical one.
        let report = classify_with(vec![FaceBox::new(140.0, 24.0, 120.0, 120.0)]);
        assert_eq!(report.classification, FrameClassification::Acceptable);
    }

    #[test]
    fn centered_face_is_acceptable() {
        let report = classify_with(vec![FaceBox::new(140.0, 90.0, 120.0, 120.0)]);
        assert_eq!(report.classification, FrameClassification::Acceptable);
        assert_eq!(report.face_center, Some((0.5, 0.5)));
        assert!(!report.too_close);
    }

    #[test]
    fn very_close_face_is_flagged_but_accepted() {
        let report = classify_with(vec![FaceBox::new(20.0, 0.0, 360.0, 300.0)]);
        assert_eq!(report.classification, FrameClassification::Acceptable);
        assert!(report.too_close);
    }

    #[test]
    fn model_state_drives_bypass() {
        let analyzer = FrameQualityAnalyzer::default();
        let frame = bright_frame();

        assert_eq!(analyzer.analyze(&frame, &ModelState::Loading).unwrap(), None);

        let failed = analyzer
            .analyze(&frame, &ModelState::Failed("no weights".into()))
            .unwrap()
            .unwrap();
        assert_eq!(failed.classification, FrameClassification::Acceptable);
        assert!(failed.bypassed);

        let ready = ModelState::Ready(Arc::new(FixedDetector::default()));
        let report = analyzer.analyze(&frame, &ready).unwrap().unwrap();
        assert_eq!(report.classification, FrameClassification::NoFace);
    }

    #[test]
    fn detector_errors_propagate_to_caller() {
        struct Broken;
        impl FaceDetector for Broken {
            fn detect(&self, _frame: &Frame) -> Result<Vec<FaceBox>, DetectionError> {
                Err(DetectionError::inference("tensor shape mismatch"))
            }
        }
        let err = FrameQualityAnalyzer::default()
            .classify(&bright_frame(), &Broken)
            .unwrap_err();
        assert!(matches!(err, DetectionError::Inference(_)));
    }
}
