//! Image preprocessing and text recognition.

mod engine;
mod preprocessing;
#[cfg(feature = "onnx")]
mod pure_engine;
mod runtime;
mod tesseract;

pub use engine::{
    create_engine, AnyEngine, AnySession, OcrAdapter, RecognitionEngine, RecognitionSession,
};
pub use preprocessing::{decode, preprocess_image, ImagePreprocessor, ProcessedImage};
#[cfg(feature = "onnx")]
pub use pure_engine::{OnnxEngine, OnnxSession};
pub use runtime::{
    ImagingKernels, ImagingRuntime, RuntimeState, MEDIAN_KERNEL_SIZE, THRESHOLD_BLOCK_SIZE,
    THRESHOLD_OFFSET,
};
pub use tesseract::{TesseractEngine, TesseractSession};

#[cfg(test)]
pub(crate) use engine::tests::{FakeBehavior, FakeEngine};
