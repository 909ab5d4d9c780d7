//! Capabilities the embedding host hands to the report pipeline.
//!
//! Nothing in the pipeline reaches into host state directly. Scroll locking,
//! launcher visibility, page rendering and time all go through the traits
//! defined here so hosts (and tests) can substitute their own implementations.

pub mod clock;
pub mod headless;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::capture::screenshot::CaptureError;

pub use clock::{Clock, SystemClock};
pub use headless::HeadlessPage;

/// Scroll offset of the host viewport, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub x: f64,
    pub y: f64,
}

impl ScrollPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Static facts about the page a report is filed from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub url: String,
    pub user_agent: String,
    pub language: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_pixel_ratio: f64,
    pub is_mobile: bool,
}

/// Page state an interactive report changes and cleanup puts back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub scroll_locked: bool,
    pub launcher_visible: bool,
}

/// Page-state operations the orchestrator may perform on the host.
///
/// Interactive reports lock scrolling and hide the launcher while the report
/// dialog is open; every mutation made here is undone by session cleanup.
pub trait HostPage: Send + Sync {
    fn scroll_position(&self) -> ScrollPosition;

    fn scroll_to(&self, position: ScrollPosition);

    /// Current scroll lock and launcher visibility
    fn page_state(&self) -> PageState;

    /// Prevent the page from scrolling underneath the report dialog
    fn lock_scroll(&self);

    /// Restore whatever scroll behaviour was active before `lock_scroll`
    fn unlock_scroll(&self);

    /// Show or hide the feedback launcher button
    fn set_launcher_visible(&self, visible: bool);

    fn page_info(&self) -> PageInfo;
}

/// Handle to a style injected into the page for the duration of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StyleHandle(pub u64);

/// Rendering access used by the page screenshot capturer.
pub trait RenderSurface: Send + Sync {
    fn inject_style(&self, css: &str) -> StyleHandle;

    fn remove_style(&self, handle: StyleHandle);

    /// Serialize the current document into reconstructable markup
    fn serialize_document(&self) -> Result<String, CaptureError>;

    /// Rasterize the viewport anchored at `anchor`
    fn rasterize(&self, anchor: ScrollPosition) -> Result<RgbaImage, CaptureError>;

    fn page_info(&self) -> PageInfo;
}
