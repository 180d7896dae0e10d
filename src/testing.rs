//! Headless collaborators for driving a viewer without a display
//!
//! `RecordingSurface` logs every clear and draw, `StubBitmap` "decodes" any
//! non-empty payload, and `TestLoader` hands out channels the caller resolves
//! by hand, in whatever order a test needs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use egui::{Pos2, Rect, Vec2};

use crate::channel::{Progress, ProgressChannel};
use crate::error::LoadError;
use crate::loader::Loader;
use crate::surface::{Bitmap, Surface};

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCall {
    Clear(Rect),
    Image {
        /// Payload text of the drawn bitmap, `None` while undecoded
        label: Option<String>,
        rect: Rect,
    },
}

#[derive(Clone, Debug)]
pub struct RecordingSurface {
    size: Vec2,
    client_size: Vec2,
    calls: Vec<DrawCall>,
}

impl RecordingSurface {
    /// Surface whose backing size already matches its display size
    pub fn new(width: f32, height: f32) -> Self {
        let size = Vec2::new(width, height);
        Self { size, client_size: size, calls: Vec::new() }
    }

    /// Simulate the display being resized by layout
    pub fn set_client_size(&mut self, size: Vec2) {
        self.client_size = size;
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Drain the log, returning everything recorded so far
    pub fn take_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn image_draws(&self) -> Vec<(Option<&str>, Rect)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Image { label, rect } => Some((label.as_deref(), *rect)),
                DrawCall::Clear(_) => None,
            })
            .collect()
    }

    pub fn clear_count(&self) -> usize {
        self.calls.iter().filter(|c| matches!(c, DrawCall::Clear(_))).count()
    }
}

impl Surface for RecordingSurface {
    type Bitmap = StubBitmap;

    fn size(&self) -> Vec2 {
        self.size
    }

    fn client_size(&self) -> Vec2 {
        self.client_size
    }

    fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    fn clear_rect(&mut self, rect: Rect) {
        self.calls.push(DrawCall::Clear(rect));
    }

    fn draw_image(&mut self, bitmap: &StubBitmap, rect: Rect) {
        self.calls.push(DrawCall::Image { label: bitmap.label.clone(), rect });
    }
}

/// Bitmap whose natural size is whatever was declared for it
#[derive(Clone, Debug, PartialEq)]
pub struct StubBitmap {
    size: Vec2,
    label: Option<String>,
}

impl StubBitmap {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl Bitmap for StubBitmap {
    type Payload = Vec<u8>;

    fn with_size(size: Vec2) -> Self {
        Self { size, label: None }
    }

    fn natural_size(&self) -> Vec2 {
        self.size
    }

    fn assign(&mut self, payload: &Vec<u8>) -> Result<(), LoadError> {
        if payload.is_empty() {
            return Err(LoadError::Decode("empty payload".to_string()));
        }
        self.label = Some(String::from_utf8_lossy(payload).into_owned());
        Ok(())
    }

    fn is_decoded(&self) -> bool {
        self.label.is_some()
    }
}

#[derive(Default)]
struct LoaderState {
    channels: HashMap<String, ProgressChannel<Vec<u8>>>,
    opened: Vec<String>,
}

/// Loader whose channels are settled manually. Clones share channels.
#[derive(Clone, Default)]
pub struct TestLoader {
    state: Rc<RefCell<LoaderState>>,
}

impl TestLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for `source`, created on first use whether or not it was opened
    pub fn channel(&self, source: &str) -> ProgressChannel<Vec<u8>> {
        self.state
            .borrow_mut()
            .channels
            .entry(source.to_string())
            .or_default()
            .clone()
    }

    /// Sources in the order the viewer opened them
    pub fn opened(&self) -> Vec<String> {
        self.state.borrow().opened.clone()
    }

    pub fn progress(&self, source: &str, loaded: u64, total: u64) {
        self.channel(source).publish(Progress::tick(loaded, total));
    }

    /// Complete the load; the payload is the source text itself
    pub fn resolve(&self, source: &str) {
        let bytes = source.as_bytes().to_vec();
        self.channel(source).publish(Progress::complete(bytes.len() as u64, bytes));
    }

    pub fn reject(&self, source: &str, error: LoadError) {
        self.channel(source).fail(error);
    }
}

impl Loader<Vec<u8>> for TestLoader {
    fn open(&self, source: &str) -> ProgressChannel<Vec<u8>> {
        self.state.borrow_mut().opened.push(source.to_string());
        self.channel(source)
    }
}

/// Rectangle anchored at `pos` with `size`, for asserting draw geometry
pub fn rect_at(pos: Vec2, size: Vec2) -> Rect {
    Rect::from_min_size(Pos2::ZERO + pos, size)
}
