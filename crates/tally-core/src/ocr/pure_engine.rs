//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use tracing::debug;

use crate::error::OcrError;

use super::engine::{RecognitionEngine, RecognitionSession};
use super::preprocessing::ProcessedImage;

const DETECTION_MODEL: &str = "det.onnx";
const RECOGNITION_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

/// Vertical distance (pixels) under which two regions share a text row.
const ROW_TOLERANCE: f32 = 20.0;

/// OCR engine backed by PaddleOCR models run through `pure-onnx-ocr`.
#[derive(Debug, Clone)]
pub struct OnnxEngine {
    model_dir: PathBuf,
    keep_unk: bool,
}

impl OnnxEngine {
    /// Create an engine reading models from `model_dir`.
    pub fn new(model_dir: &Path) -> Self {
        Self {
            model_dir: model_dir.to_path_buf(),
            keep_unk: false,
        }
    }

    /// Keep `[UNK]` tokens instead of replacing them with spaces.
    pub fn with_keep_unk(mut self, keep_unk: bool) -> Self {
        self.keep_unk = keep_unk;
        self
    }
}

impl RecognitionEngine for OnnxEngine {
    type Session = OnnxSession;

    fn name(&self) -> &'static str {
        "onnx"
    }

    async fn open_session(&self) -> Result<OnnxSession, OcrError> {
        let det_path = self.model_dir.join(DETECTION_MODEL);
        let rec_path = self.model_dir.join(RECOGNITION_MODEL);
        let dict_path = self.model_dir.join(DICTIONARY);

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.is_file() {
                return Err(OcrError::Init(format!(
                    "model file missing: {}",
                    path.display()
                )));
            }
        }

        debug!("Using ONNX models from {}", self.model_dir.display());

        Ok(OnnxSession {
            det_path,
            rec_path,
            dict_path,
            keep_unk: self.keep_unk,
        })
    }
}

/// One ONNX recognition run.
///
/// The model engine is built and dropped inside the blocking task, so no
/// inference state outlives the session.
#[derive(Debug)]
pub struct OnnxSession {
    det_path: PathBuf,
    rec_path: PathBuf,
    dict_path: PathBuf,
    keep_unk: bool,
}

impl RecognitionSession for OnnxSession {
    async fn recognize(&mut self, image: &ProcessedImage) -> Result<String, OcrError> {
        let image = DynamicImage::ImageLuma8(image.as_gray().clone());
        let det_path = self.det_path.clone();
        let rec_path = self.rec_path.clone();
        let dict_path = self.dict_path.clone();
        let keep_unk = self.keep_unk;

        tokio::task::spawn_blocking(move || -> Result<String, OcrError> {
            let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                .det_model_path(&det_path)
                .rec_model_path(&rec_path)
                .dictionary_path(&dict_path)
                .build()
                .map_err(|e| OcrError::Init(format!("pure-onnx-ocr: {}", e)))?;

            let results = engine
                .run_from_image(&image)
                .map_err(|e| OcrError::Engine(format!("pure-onnx-ocr: {}", e)))?;

            debug!("pure-onnx-ocr returned {} text regions", results.len());

            let lines = results
                .iter()
                .map(|r| {
                    let (left, top) = top_left(&r.bounding_box);
                    let text = if keep_unk {
                        r.text.clone()
                    } else {
                        r.text.replace("[UNK]", " ")
                    };
                    PlacedText { left, top, text }
                })
                .collect();

            Ok(join_in_reading_order(lines))
        })
        .await
        .map_err(|e| OcrError::Engine(format!("recognition task failed: {}", e)))?
    }
}

/// Recognized region text with its top-left corner.
#[derive(Debug, Clone)]
struct PlacedText {
    left: f32,
    top: f32,
    text: String,
}

/// Top-left corner of the region polygon's first four points.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f32, f32) {
    polygon
        .exterior()
        .coords()
        .take(4)
        .fold((f32::INFINITY, f32::INFINITY), |(x, y), c| {
            (x.min(c.x as f32), y.min(c.y as f32))
        })
}

/// Sort regions top-to-bottom, then left-to-right within a row, and join
/// them with newlines.
fn join_in_reading_order(mut lines: Vec<PlacedText>) -> String {
    lines.sort_by(|a, b| {
        let row_a = (a.top / ROW_TOLERANCE) as i32;
        let row_b = (b.top / ROW_TOLERANCE) as i32;
        row_a
            .cmp(&row_b)
            .then_with(|| a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal))
    });

    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(left: f32, top: f32, text: &str) -> PlacedText {
        PlacedText {
            left,
            top,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reading_order() {
        let lines = vec![
            placed(10.0, 95.0, "TOTAL $9.98"),
            placed(200.0, 4.0, "03/15/2024"),
            placed(10.0, 2.0, "WALMART"),
            placed(10.0, 50.0, "Milk $3.99"),
        ];

        assert_eq!(
            join_in_reading_order(lines),
            "WALMART\n03/15/2024\nMilk $3.99\nTOTAL $9.98"
        );
    }

    #[tokio::test]
    async fn test_missing_models_is_init_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OnnxEngine::new(dir.path());

        let err = engine.open_session().await.unwrap_err();
        assert!(matches!(err, OcrError::Init(msg) if msg.contains("det.onnx")));
    }
}
