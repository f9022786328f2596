//! OCR engine adapter.
//!
//! Every call opens a fresh recognition session and drops it before
//! returning, whether recognition succeeded, failed, or timed out. A
//! malformed image therefore never leaves state behind for the next
//! receipt.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::models::config::{EngineKind, OcrConfig};

use super::preprocessing::ProcessedImage;
use super::tesseract::{TesseractEngine, TesseractSession};

#[cfg(feature = "onnx")]
use super::pure_engine::{OnnxEngine, OnnxSession};

/// A recognition backend able to open independent sessions.
#[allow(async_fn_in_trait)]
pub trait RecognitionEngine {
    /// Session type. Dropping it releases everything it acquired.
    type Session: RecognitionSession;

    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Start a new session.
    async fn open_session(&self) -> Result<Self::Session, OcrError>;
}

/// A single-use recognition session.
#[allow(async_fn_in_trait)]
pub trait RecognitionSession {
    /// Transcribe the image, preserving the engine's line breaks.
    async fn recognize(&mut self, image: &ProcessedImage) -> Result<String, OcrError>;
}

/// Runs one session per call under a time bound.
#[derive(Debug, Clone)]
pub struct OcrAdapter<E> {
    engine: E,
    timeout: Duration,
}

impl<E: RecognitionEngine> OcrAdapter<E> {
    /// Create an adapter around an engine.
    pub fn new(engine: E, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Recognition time bound.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Recognize text in a processed image.
    ///
    /// Session start-up failures are reported as [`OcrError::Init`]; the
    /// time bound covers start-up and recognition together.
    pub async fn recognize(&self, image: &ProcessedImage) -> Result<String, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        info!(
            "Running {} OCR on {}x{} image",
            self.engine.name(),
            width,
            height
        );

        let run = async {
            let mut session = self.engine.open_session().await.map_err(|e| match e {
                OcrError::Init(_) => e,
                other => OcrError::Init(other.to_string()),
            })?;
            debug!("Opened {} session", self.engine.name());
            session.recognize(image).await
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(text)) => {
                info!(
                    "OCR complete: {} lines in {}ms",
                    text.lines().count(),
                    start.elapsed().as_millis()
                );
                Ok(text)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    "{} OCR exceeded {:?}, session dropped",
                    self.engine.name(),
                    self.timeout
                );
                Err(OcrError::Timeout(self.timeout))
            }
        }
    }
}

/// Engine chosen from configuration.
#[derive(Debug, Clone)]
pub enum AnyEngine {
    Tesseract(TesseractEngine),
    #[cfg(feature = "onnx")]
    Onnx(OnnxEngine),
}

/// Session of an [`AnyEngine`].
pub enum AnySession {
    Tesseract(TesseractSession),
    #[cfg(feature = "onnx")]
    Onnx(OnnxSession),
}

impl RecognitionEngine for AnyEngine {
    type Session = AnySession;

    fn name(&self) -> &'static str {
        match self {
            AnyEngine::Tesseract(engine) => engine.name(),
            #[cfg(feature = "onnx")]
            AnyEngine::Onnx(engine) => engine.name(),
        }
    }

    async fn open_session(&self) -> Result<AnySession, OcrError> {
        match self {
            AnyEngine::Tesseract(engine) => engine.open_session().await.map(AnySession::Tesseract),
            #[cfg(feature = "onnx")]
            AnyEngine::Onnx(engine) => engine.open_session().await.map(AnySession::Onnx),
        }
    }
}

impl RecognitionSession for AnySession {
    async fn recognize(&mut self, image: &ProcessedImage) -> Result<String, OcrError> {
        match self {
            AnySession::Tesseract(session) => session.recognize(image).await,
            #[cfg(feature = "onnx")]
            AnySession::Onnx(session) => session.recognize(image).await,
        }
    }
}

/// Build the OCR adapter described by the configuration.
pub fn create_engine(config: &OcrConfig) -> Result<OcrAdapter<AnyEngine>, OcrError> {
    let engine = match config.engine {
        EngineKind::Tesseract => {
            let mut engine = TesseractEngine::new(&config.tesseract_cmd, &config.language);
            if let Some(psm) = config.page_segmentation_mode {
                engine = engine.with_page_segmentation_mode(psm);
            }
            AnyEngine::Tesseract(engine)
        }
        #[cfg(feature = "onnx")]
        EngineKind::Onnx => {
            AnyEngine::Onnx(OnnxEngine::new(&config.model_dir).with_keep_unk(config.keep_unk))
        }
        #[cfg(not(feature = "onnx"))]
        EngineKind::Onnx => {
            return Err(OcrError::Init(
                "this build does not include the onnx engine".to_string(),
            ));
        }
    };

    debug!("Configured {} engine", engine.name());
    Ok(OcrAdapter::new(engine, config.timeout()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// What a [`FakeEngine`] session does.
    #[derive(Debug, Clone)]
    pub(crate) enum FakeBehavior {
        Text(String),
        FailInit,
        FailRecognition,
        Hang,
    }

    /// Scriptable engine that counts opened and dropped sessions.
    #[derive(Debug, Clone)]
    pub(crate) struct FakeEngine {
        pub behavior: FakeBehavior,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        pub fn new(behavior: FakeBehavior) -> Self {
            Self {
                behavior,
                opened: Arc::new(AtomicUsize::new(0)),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    pub(crate) struct FakeSession {
        behavior: FakeBehavior,
        closed: Arc<AtomicUsize>,
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RecognitionEngine for FakeEngine {
        type Session = FakeSession;

        fn name(&self) -> &'static str {
            "fake"
        }

        async fn open_session(&self) -> Result<FakeSession, OcrError> {
            if matches!(self.behavior, FakeBehavior::FailInit) {
                return Err(OcrError::Engine("no language data".to_string()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession {
                behavior: self.behavior.clone(),
                closed: Arc::clone(&self.closed),
            })
        }
    }

    impl RecognitionSession for FakeSession {
        async fn recognize(&mut self, _image: &ProcessedImage) -> Result<String, OcrError> {
            match &self.behavior {
                FakeBehavior::Text(text) => Ok(text.clone()),
                FakeBehavior::FailRecognition => Err(OcrError::Engine("bad image".to_string())),
                FakeBehavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(String::new())
                }
                FakeBehavior::FailInit => unreachable!(),
            }
        }
    }

    fn blank() -> ProcessedImage {
        ProcessedImage::new(GrayImage::from_pixel(8, 8, Luma([255])))
    }

    #[tokio::test]
    async fn test_text_passes_through_unmodified() {
        let text = "WALMART\n\n03/15/2024  \nTOTAL $9.98\n";
        let engine = FakeEngine::new(FakeBehavior::Text(text.to_string()));
        let adapter = OcrAdapter::new(engine.clone(), Duration::from_secs(5));

        assert_eq!(adapter.recognize(&blank()).await.unwrap(), text);
        assert_eq!(engine.opened.load(Ordering::SeqCst), 1);
        assert_eq!(engine.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_each_call_opens_a_fresh_session() {
        let engine = FakeEngine::new(FakeBehavior::Text("A".to_string()));
        let adapter = OcrAdapter::new(engine.clone(), Duration::from_secs(5));

        for _ in 0..3 {
            adapter.recognize(&blank()).await.unwrap();
        }

        assert_eq!(engine.opened.load(Ordering::SeqCst), 3);
        assert_eq!(engine.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_session_start_failure_is_init_error() {
        let adapter = OcrAdapter::new(FakeEngine::new(FakeBehavior::FailInit), Duration::from_secs(5));

        let err = adapter.recognize(&blank()).await.unwrap_err();
        assert!(matches!(err, OcrError::Init(_)));
    }

    #[tokio::test]
    async fn test_recognition_failure_still_closes_session() {
        let engine = FakeEngine::new(FakeBehavior::FailRecognition);
        let adapter = OcrAdapter::new(engine.clone(), Duration::from_secs(5));

        let err = adapter.recognize(&blank()).await.unwrap_err();
        assert!(matches!(err, OcrError::Engine(_)));
        assert_eq!(engine.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_drops_session() {
        let engine = FakeEngine::new(FakeBehavior::Hang);
        let adapter = OcrAdapter::new(engine.clone(), Duration::from_secs(30));

        let err = adapter.recognize(&blank()).await.unwrap_err();
        assert!(matches!(err, OcrError::Timeout(d) if d == Duration::from_secs(30)));
        assert_eq!(engine.opened.load(Ordering::SeqCst), 1);
        assert_eq!(engine.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_create_engine_from_config() {
        let adapter = create_engine(&OcrConfig::default()).unwrap();
        assert_eq!(adapter.engine().name(), "tesseract");
        assert_eq!(adapter.timeout(), Duration::from_secs(30));
    }
}
