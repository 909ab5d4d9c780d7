//! Screenshot capture.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::host::{RenderSurface, ScrollPosition, StyleHandle};

/// Hides the report widget and launcher while the page is rendered.
pub const CAPTURE_STYLE: &str = ".snapreport-widget, .snapreport-launcher { visibility: hidden !important; }";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("page content blocks capture: {0}")]
    Tainted(String),

    #[error("document could not be serialized: {0}")]
    Serialization(String),

    #[error("viewport has no visible area")]
    EmptyViewport,

    #[error("could not encode screenshot: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Pixel snapshot encoded as PNG
    #[default]
    Raster,
    /// Serialized document the collector can re-render
    Structured,
}

/// Reconstructable document snapshot sent as `screenshotData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredSnapshot {
    pub html: String,
    pub base_url: String,
    pub width: u32,
    pub height: u32,
    pub x: f64,
    pub y: f64,
    pub is_mobile: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screenshot {
    Image {
        data_url: String,
        width: u32,
        height: u32,
    },
    Structured(StructuredSnapshot),
    /// Image already uploaded by the capturer
    Hosted { url: String },
}

/// One-shot capture of the visible page.
#[async_trait]
pub trait ScreenshotCapturer: Send + Sync {
    async fn capture(
        &self,
        anchor: ScrollPosition,
        mode: RenderMode,
    ) -> Result<Screenshot, CaptureError>;
}

/// Removes the injected capture style when dropped.
struct StyleGuard<'a, S: RenderSurface + ?Sized> {
    surface: &'a S,
    handle: StyleHandle,
}

impl<'a, S: RenderSurface + ?Sized> StyleGuard<'a, S> {
    fn inject(surface: &'a S, css: &str) -> Self {
        let handle = surface.inject_style(css);
        Self { surface, handle }
    }
}

impl<S: RenderSurface + ?Sized> Drop for StyleGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.remove_style(self.handle);
    }
}

/// [`ScreenshotCapturer`] that renders through the host's [`RenderSurface`].
pub struct PageCapturer<S: RenderSurface + ?Sized> {
    surface: Arc<S>,
}

impl<S: RenderSurface + ?Sized> PageCapturer<S> {
    pub fn new(surface: Arc<S>) -> Self {
        Self { surface }
    }

    fn structured(&self, anchor: ScrollPosition) -> Result<Screenshot, CaptureError> {
        let _style = StyleGuard::inject(self.surface.as_ref(), CAPTURE_STYLE);
        let html = self.surface.serialize_document()?;
        let info = self.surface.page_info();
        Ok(Screenshot::Structured(StructuredSnapshot {
            html,
            base_url: info.url,
            width: info.viewport_width,
            height: info.viewport_height,
            x: anchor.x,
            y: anchor.y,
            is_mobile: info.is_mobile,
        }))
    }

    fn rasterize(&self, anchor: ScrollPosition) -> Result<RgbaImage, CaptureError> {
        let _style = StyleGuard::inject(self.surface.as_ref(), CAPTURE_STYLE);
        self.surface.rasterize(anchor)
    }
}

#[async_trait]
impl<S: RenderSurface + ?Sized + 'static> ScreenshotCapturer for PageCapturer<S> {
    async fn capture(
        &self,
        anchor: ScrollPosition,
        mode: RenderMode,
    ) -> Result<Screenshot, CaptureError> {
        match mode {
            RenderMode::Structured => self.structured(anchor),
            RenderMode::Raster => {
                let pixels = self.rasterize(anchor)?;
                let (width, height) = pixels.dimensions();
                let png = tokio::task::spawn_blocking(move || encode_png(pixels))
                    .await
                    .map_err(|e| CaptureError::Encode(e.to_string()))??;
                Ok(Screenshot::Image {
                    data_url: format!(
                        "data:image/png;base64,{}",
                        general_purpose::STANDARD.encode(png)
                    ),
                    width,
                    height,
                })
            }
        }
    }
}

fn encode_png(pixels: RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(pixels)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(png)
}
