//! ImageItem - one managed image: source, bitmap, load state, and transform
//!
//! Items are shared as `Rc<RefCell<ImageItem>>` so that load callbacks can
//! reach them. An item removed from its viewer stays valid while a load is in
//! flight; the load simply finishes on the detached item.

use std::cell::RefCell;
use std::rc::Rc;

use egui::{Pos2, Rect, Vec2};

use crate::channel::{Completion, Progress};
use crate::config::ZoomConfig;
use crate::error::{LoadError, ViewerError};
use crate::loader::Loader;
use crate::surface::{Bitmap, Surface};
use crate::transform;

/// Load lifecycle of an item
#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Errored(LoadError),
}

/// Snapshot handed to loaded handlers
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedImage {
    pub source: String,
    pub natural_size: Vec2,
}

/// Called with every progress tick while the item loads
pub type LoadingHandler<P> = Rc<dyn Fn(&Progress<P>)>;

/// Called once when the item's bitmap has been decoded
pub type LoadedHandler = Rc<dyn Fn(&LoadedImage)>;

pub type SharedItem<B> = Rc<RefCell<ImageItem<B>>>;

pub struct ImageItem<B: Bitmap> {
    source: String,
    bitmap: B,
    state: LoadState,
    scale: f32,
    /// Offset of the bitmap's top-left corner from the surface's top-left
    position: Vec2,
    /// Extra multiplier on top of `scale`, set by fit-width / fit-height
    aspect_ratio: f32,
    zoom: Rc<ZoomConfig>,
    loading_handler: Option<LoadingHandler<B::Payload>>,
    loaded_handler: Option<LoadedHandler>,
}

impl<B: Bitmap> ImageItem<B> {
    pub fn new(source: impl Into<String>, declared_size: Vec2, zoom: Rc<ZoomConfig>) -> Self {
        Self {
            source: source.into(),
            bitmap: B::with_size(declared_size),
            state: LoadState::Unloaded,
            scale: 1.0,
            position: Vec2::ZERO,
            aspect_ratio: 1.0,
            zoom,
            loading_handler: None,
            loaded_handler: None,
        }
    }

    pub fn shared(self) -> SharedItem<B> {
        Rc::new(RefCell::new(self))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bitmap(&self) -> &B {
        &self.bitmap
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.aspect_ratio
    }

    pub fn natural_size(&self) -> Vec2 {
        self.bitmap.natural_size()
    }

    pub fn load_state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    pub fn has_error(&self) -> bool {
        matches!(self.state, LoadState::Errored(_))
    }

    /// Whether the item reached a terminal state (loaded or errored)
    pub fn is_settled(&self) -> bool {
        self.is_loaded() || self.has_error()
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            LoadState::Errored(e) => Some(e),
            _ => None,
        }
    }

    // =========================================================================
    // Transform
    // =========================================================================

    /// Back to the identity transform. Load state is untouched.
    pub fn reset(&mut self) {
        self.position = Vec2::ZERO;
        self.scale = 1.0;
    }

    pub fn zoom_in(&mut self) {
        self.scale = transform::step_zoom(self.scale, &self.zoom.steps, 1);
    }

    pub fn zoom_out(&mut self) {
        self.scale = transform::step_zoom(self.scale, &self.zoom.steps, -1);
    }

    pub fn zoom(&mut self, delta: f32) {
        self.scale = transform::free_zoom(self.scale, delta, self.zoom.min_scale, self.zoom.max_scale);
    }

    /// Move by `delta`. The stored position is not clamped until the next draw.
    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }

    /// Place the item at an absolute position (clamped on the next draw)
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_aspect_ratio(&mut self, ratio: f32) {
        self.aspect_ratio = ratio;
    }

    /// Clear the surface and draw the bitmap with the current transform.
    ///
    /// The position is clamped into bounds here and written back, so that
    /// later deltas compose from the corrected position.
    pub fn draw_on<S: Surface<Bitmap = B>>(&mut self, surface: &mut S) {
        surface.clear();
        let effective_scale = self.scale * self.aspect_ratio;
        let natural = self.bitmap.natural_size();
        let bounds = transform::bounds(effective_scale, surface.size(), natural);
        self.position = transform::clamp(self.position, &bounds);
        let rect = Rect::from_min_size(Pos2::ZERO + self.position, natural * effective_scale);
        surface.draw_image(&self.bitmap, rect);
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Install the progress handler, replacing any previous one
    pub fn on_loading(&mut self, handler: Option<LoadingHandler<B::Payload>>) -> Result<&mut Self, ViewerError> {
        let handler = handler.ok_or(ViewerError::InvalidArgument("onLoading expects a callable handler"))?;
        self.loading_handler = Some(handler);
        Ok(self)
    }

    /// Install the loaded handler, replacing any previous one
    pub fn on_loaded(&mut self, handler: Option<LoadedHandler>) -> Result<&mut Self, ViewerError> {
        let handler = handler.ok_or(ViewerError::InvalidArgument("onLoaded expects a callable handler"))?;
        self.loaded_handler = Some(handler);
        Ok(self)
    }

    /// Wire the handlers a viewer installs on the items it owns
    pub(crate) fn install_handlers(&mut self, loading: LoadingHandler<B::Payload>, loaded: Option<LoadedHandler>) {
        self.loading_handler = Some(loading);
        if loaded.is_some() {
            self.loaded_handler = loaded;
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Start loading the item through `loader`.
    ///
    /// Returns `None` when the item is already loading or loaded. Otherwise the
    /// returned channel resolves once with `()` after the bitmap is decoded, or
    /// fails with the load error.
    pub fn load(item: &SharedItem<B>, loader: &dyn Loader<B::Payload>) -> Option<Completion>
    where
        B: 'static,
    {
        let source = {
            let mut this = item.borrow_mut();
            if matches!(this.state, LoadState::Loading | LoadState::Loaded) {
                return None;
            }
            this.state = LoadState::Loading;
            this.source.clone()
        };
        log::debug!("loading {}", source);

        let completion = Completion::new();
        let progress = loader.open(&source);
        {
            let item = Rc::clone(item);
            let completion = completion.clone();
            progress.subscribe(move |tick| Self::handle_tick(&item, tick, &completion));
        }
        {
            let item = Rc::clone(item);
            let completion = completion.clone();
            progress.catch(move |error| Self::finish_errored(&item, error.clone(), &completion));
        }
        Some(completion)
    }

    fn handle_tick(item: &SharedItem<B>, tick: &Progress<B::Payload>, completion: &Completion) {
        let handler = {
            let this = item.borrow();
            if this.state != LoadState::Loading {
                return;
            }
            this.loading_handler.clone()
        };
        if let Some(handler) = handler {
            handler(tick);
        }

        let Some(data) = tick.data.as_ref().filter(|_| tick.is_complete()) else {
            return;
        };
        let decoded = item.borrow_mut().bitmap.assign(data);
        match decoded {
            Ok(()) => Self::finish_loaded(item, completion),
            Err(error) => Self::finish_errored(item, error, completion),
        }
    }

    fn finish_loaded(item: &SharedItem<B>, completion: &Completion) {
        let (handler, image) = {
            let mut this = item.borrow_mut();
            this.state = LoadState::Loaded;
            let image = LoadedImage {
                source: this.source.clone(),
                natural_size: this.bitmap.natural_size(),
            };
            (this.loaded_handler.clone(), image)
        };
        log::debug!("loaded {} ({}x{})", image.source, image.natural_size.x, image.natural_size.y);
        if let Some(handler) = handler {
            handler(&image);
        }
        completion.publish(());
    }

    fn finish_errored(item: &SharedItem<B>, error: LoadError, completion: &Completion) {
        {
            let mut this = item.borrow_mut();
            if this.state != LoadState::Loading {
                return;
            }
            log::warn!("failed to load {}: {}", this.source, error);
            this.state = LoadState::Errored(error.clone());
        }
        completion.fail(error);
    }
}
