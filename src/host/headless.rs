//! In-memory host used by the CLI and by tests.

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use super::{HostPage, PageInfo, PageState, RenderSurface, ScrollPosition, StyleHandle};
use crate::capture::screenshot::CaptureError;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug)]
struct HeadlessState {
    scroll: ScrollPosition,
    scroll_locked: bool,
    /// Lock state saved by the first `lock_scroll`, put back by `unlock_scroll`
    scroll_lock_saved: Option<bool>,
    launcher_visible: bool,
    styles: Vec<(StyleHandle, String)>,
    next_style: u64,
    document: Option<String>,
    tainted: bool,
}

/// A host page with no real renderer behind it.
///
/// Page mutations are tracked so callers can verify that a report session
/// left the page exactly as it found it.
#[derive(Debug)]
pub struct HeadlessPage {
    info: PageInfo,
    state: Mutex<HeadlessState>,
}

impl HeadlessPage {
    pub fn new(info: PageInfo) -> Self {
        Self {
            info,
            state: Mutex::new(HeadlessState {
                scroll: ScrollPosition::default(),
                scroll_locked: false,
                scroll_lock_saved: None,
                launcher_visible: true,
                styles: Vec::new(),
                next_style: 1,
                document: None,
                tainted: false,
            }),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.info.url = url.into();
        self
    }

    pub fn with_document(self, html: impl Into<String>) -> Self {
        self.state.lock().document = Some(html.into());
        self
    }

    pub fn with_scroll(self, position: ScrollPosition) -> Self {
        self.state.lock().scroll = position;
        self
    }

    /// Simulate cross-origin content that blocks pixel extraction
    pub fn tainted(self) -> Self {
        self.state.lock().tainted = true;
        self
    }

    pub fn is_scroll_locked(&self) -> bool {
        self.state.lock().scroll_locked
    }

    pub fn is_launcher_visible(&self) -> bool {
        self.state.lock().launcher_visible
    }

    /// Page-owned scroll lock, set outside of `lock_scroll`
    pub fn set_scroll_locked(&self, locked: bool) {
        self.state.lock().scroll_locked = locked;
    }

    /// Number of capture styles currently injected
    pub fn injected_styles(&self) -> usize {
        self.state.lock().styles.len()
    }
}

impl Default for HeadlessPage {
    fn default() -> Self {
        Self::new(PageInfo {
            url: "about:blank".to_string(),
            user_agent: format!("snapreport/{}", env!("CARGO_PKG_VERSION")),
            language: "en".to_string(),
            viewport_width: 1280,
            viewport_height: 800,
            device_pixel_ratio: 1.0,
            is_mobile: false,
        })
    }
}

impl HostPage for HeadlessPage {
    fn scroll_position(&self) -> ScrollPosition {
        self.state.lock().scroll
    }

    fn scroll_to(&self, position: ScrollPosition) {
        self.state.lock().scroll = position;
    }

    fn page_state(&self) -> PageState {
        let state = self.state.lock();
        PageState {
            scroll_locked: state.scroll_locked,
            launcher_visible: state.launcher_visible,
        }
    }

    fn lock_scroll(&self) {
        let mut state = self.state.lock();
        if state.scroll_lock_saved.is_none() {
            state.scroll_lock_saved = Some(state.scroll_locked);
        }
        state.scroll_locked = true;
    }

    fn unlock_scroll(&self) {
        let mut state = self.state.lock();
        state.scroll_locked = state.scroll_lock_saved.take().unwrap_or(false);
    }

    fn set_launcher_visible(&self, visible: bool) {
        self.state.lock().launcher_visible = visible;
    }

    fn page_info(&self) -> PageInfo {
        self.info.clone()
    }
}

impl RenderSurface for HeadlessPage {
    fn inject_style(&self, css: &str) -> StyleHandle {
        let mut state = self.state.lock();
        let handle = StyleHandle(state.next_style);
        state.next_style += 1;
        state.styles.push((handle, css.to_string()));
        handle
    }

    fn remove_style(&self, handle: StyleHandle) {
        self.state.lock().styles.retain(|(h, _)| *h != handle);
    }

    fn serialize_document(&self) -> Result<String, CaptureError> {
        self.state
            .lock()
            .document
            .clone()
            .ok_or_else(|| CaptureError::Serialization("no document loaded".to_string()))
    }

    fn rasterize(&self, _anchor: ScrollPosition) -> Result<RgbaImage, CaptureError> {
        if self.state.lock().tainted {
            return Err(CaptureError::Tainted(
                "cross-origin content blocks pixel extraction".to_string(),
            ));
        }
        let (width, height) = (self.info.viewport_width, self.info.viewport_height);
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyViewport);
        }
        Ok(RgbaImage::from_pixel(width, height, BACKGROUND))
    }

    fn page_info(&self) -> PageInfo {
        self.info.clone()
    }
}
