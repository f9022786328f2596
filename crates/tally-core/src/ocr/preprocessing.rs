//! Image preprocessing for OCR.
//!
//! Receipt photos are lit unevenly along their length, so a single global
//! threshold loses text at one end or the other. The image is binarized
//! against a Gaussian-weighted local mean and then median filtered to drop
//! the speckles thresholding leaves behind.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, ImageFormat, Luma};
use imageproc::filter::{median_filter, separable_filter_equal};
use tracing::{debug, info};

use crate::error::PreprocessError;

use super::runtime::{ImagingKernels, ImagingRuntime};

/// A binarized, denoised image ready for recognition.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    image: GrayImage,
}

impl ProcessedImage {
    /// Wrap an already binarized image.
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    /// Image dimensions (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Borrow the underlying grayscale buffer.
    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    /// Encode the image as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| PreprocessError::Processing(format!("PNG encoding failed: {}", e)))?;
        Ok(buf)
    }
}

/// Image preprocessor for the receipt pipeline.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    runtime: Arc<ImagingRuntime>,
}

impl ImagePreprocessor {
    /// Create a preprocessor bound to an imaging runtime.
    pub fn new(runtime: Arc<ImagingRuntime>) -> Self {
        Self { runtime }
    }

    /// The runtime this preprocessor waits on.
    pub fn runtime(&self) -> &Arc<ImagingRuntime> {
        &self.runtime
    }

    /// Decode an uploaded file and binarize it.
    ///
    /// The filters run on the blocking thread pool.
    pub async fn preprocess(&self, bytes: &[u8]) -> Result<ProcessedImage, PreprocessError> {
        let kernels = self.runtime.ready().await?.clone();
        let bytes = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<ProcessedImage, PreprocessError> {
            let image = decode(&bytes)?;
            drop(bytes);
            Ok(preprocess_image(&image, &kernels))
        })
        .await
        .map_err(|e| PreprocessError::Processing(format!("preprocessing task failed: {}", e)))?
    }
}

/// Decode raw file bytes into an image at native resolution.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    image::load_from_memory(bytes).map_err(|e| PreprocessError::Decode(e.to_string()))
}

/// Grayscale, adaptive threshold, and median filter an image.
///
/// The output has the same dimensions as the input. Intermediate buffers
/// are owned by this call and freed before it returns.
pub fn preprocess_image(image: &DynamicImage, kernels: &ImagingKernels) -> ProcessedImage {
    let start = Instant::now();
    let (width, height) = image.dimensions();
    info!("Preprocessing image: {}x{}", width, height);

    let gray = image.to_luma8();
    let binary = adaptive_threshold_gaussian(&gray, kernels);
    drop(gray);

    let radius = kernels.median_radius;
    let denoised = if radius > 0 {
        median_filter(&binary, radius, radius)
    } else {
        binary
    };

    debug!(
        "Preprocessing finished in {}ms",
        start.elapsed().as_millis()
    );

    ProcessedImage::new(denoised)
}

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Binary threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes white when it is brighter than the weighted mean of its
/// neighborhood, rounded to the nearest level, minus the offset; black
/// otherwise. Borders replicate the edge pixels. The blur runs in `f32` so
/// neither pass truncates the mean.
fn adaptive_threshold_gaussian(image: &GrayImage, kernels: &ImagingKernels) -> GrayImage {
    let (width, height) = image.dimensions();
    let levels: FloatImage =
        ImageBuffer::from_fn(width, height, |x, y| Luma([image.get_pixel(x, y)[0] as f32]));
    let local_mean: FloatImage = separable_filter_equal(&levels, &kernels.gaussian);
    drop(levels);

    let mut result = GrayImage::new(width, height);
    for (x, y, out) in result.enumerate_pixels_mut() {
        let pixel = image.get_pixel(x, y)[0] as i32;
        let mean = local_mean.get_pixel(x, y)[0].round() as i32;
        let threshold = mean - kernels.threshold_offset;
        *out = Luma([if pixel > threshold { 255 } else { 0 }]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreprocessError;
    use image::{Rgb, RgbImage};

    fn kernels() -> ImagingKernels {
        ImagingKernels::build(11, 2, 3).unwrap()
    }

    fn encode_png(image: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// White receipt with a dark vertical stroke and a lighting gradient.
    fn receipt_like(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (10..13).contains(&x) {
                Rgb([20, 20, 20])
            } else {
                let shade = 255 - ((y * 60) / height.max(1)) as u8;
                Rgb([shade, shade, shade])
            }
        })
    }

    #[test]
    fn test_output_is_binary_and_same_size() {
        let image = DynamicImage::ImageRgb8(receipt_like(37, 23));
        let processed = preprocess_image(&image, &kernels());

        assert_eq!(processed.dimensions(), (37, 23));
        assert!(processed.as_gray().pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_dark_stroke_survives_and_background_clears() {
        let image = DynamicImage::ImageRgb8(receipt_like(40, 40));
        let processed = preprocess_image(&image, &kernels());
        let gray = processed.as_gray();

        assert_eq!(gray.get_pixel(11, 20)[0], 0);
        assert_eq!(gray.get_pixel(30, 20)[0], 255);
    }

    #[test]
    fn test_uniform_image_is_white() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([128])));
        let processed = preprocess_image(&image, &kernels());

        assert!(processed.as_gray().pixels().all(|p| p[0] == 255));
    }

    /// Rounded 11x11 Gaussian mean with replicated borders, in f64.
    ///
    /// Returns `None` where the exact mean sits on a rounding boundary, since
    /// f32 and f64 may round those either way.
    fn reference_mean(image: &GrayImage, x: u32, y: u32) -> Option<i32> {
        let sigma = 2.0f64;
        let weights: Vec<f64> = (-5i64..=5)
            .map(|d| (-((d * d) as f64) / (2.0 * sigma * sigma)).exp())
            .collect();
        let norm: f64 = weights.iter().sum();
        let (width, height) = image.dimensions();

        let mut mean = 0.0;
        for (j, wy) in weights.iter().enumerate() {
            for (i, wx) in weights.iter().enumerate() {
                let sx = (x as i64 + i as i64 - 5).clamp(0, width as i64 - 1) as u32;
                let sy = (y as i64 + j as i64 - 5).clamp(0, height as i64 - 1) as u32;
                mean += wx * wy * image.get_pixel(sx, sy)[0] as f64;
            }
        }
        mean /= norm * norm;

        if (mean.fract() - 0.5).abs() < 1e-3 {
            None
        } else {
            Some(mean.round() as i32)
        }
    }

    #[test]
    fn test_threshold_matches_rounded_gaussian_mean() {
        // Low-contrast noise around mid gray, where an offset error shows.
        let mut seed: u32 = 0x2545_f491;
        let image = GrayImage::from_fn(64, 64, |_, _| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            Luma([120 + ((seed >> 16) % 16) as u8])
        });
        let kernels = kernels();

        let binary = adaptive_threshold_gaussian(&image, &kernels);

        let mut checked = 0;
        for (x, y, out) in binary.enumerate_pixels() {
            let Some(mean) = reference_mean(&image, x, y) else {
                continue;
            };
            let expected = if image.get_pixel(x, y)[0] as i32 > mean - 2 { 255 } else { 0 };
            assert_eq!(out[0], expected, "pixel ({}, {})", x, y);
            checked += 1;
        }
        assert!(checked > 4000);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode(b"definitely not an image");
        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }

    #[tokio::test]
    async fn test_preprocess_roundtrips_png_dimensions() {
        let bytes = encode_png(DynamicImage::ImageRgb8(receipt_like(64, 120)));
        let preprocessor = ImagePreprocessor::new(Arc::new(ImagingRuntime::new()));

        let processed = preprocessor.preprocess(&bytes).await.unwrap();
        assert_eq!(processed.dimensions(), (64, 120));

        let png = processed.to_png_bytes().unwrap();
        let reloaded = decode(&png).unwrap();
        assert_eq!(reloaded.dimensions(), (64, 120));
    }

    #[tokio::test]
    async fn test_preprocess_reports_decode_error() {
        let preprocessor = ImagePreprocessor::new(Arc::new(ImagingRuntime::new()));
        let result = preprocessor.preprocess(&[0u8, 1, 2, 3]).await;

        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }
}
