//! Viewer - ordered images, sequential loading, selection, and render dispatch
//!
//! A `Viewer` owns one surface and a list of items. Items load strictly one at
//! a time in insertion order; exactly one item is selected once any exists.
//! Whatever is drawn on the surface is decided here: the selected item's
//! content when it is loaded, the error target when it failed, the placeholder
//! otherwise.
//!
//! `Viewer` is a cheap cloneable handle. Load callbacks hold weak references,
//! so dropping every handle drops the viewer even with loads in flight.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use egui::Vec2;

use crate::channel::Progress;
use crate::config::{ViewerConfig, ZoomConfig};
use crate::error::{LoadError, ViewerError};
use crate::item::{ImageItem, LoadState, LoadedHandler, LoadingHandler, SharedItem};
use crate::loader::Loader;
use crate::surface::{PayloadOf, Surface};

/// Render callback: receives the surface and an optional payload (a progress
/// tick for placeholders, the load error for error targets).
///
/// Runs while the viewer is borrowed; it must draw, not call back into the
/// viewer.
pub type RenderFn<S, A> = Rc<dyn Fn(&mut S, Option<&A>)>;

/// What to draw for the placeholder or error role
pub enum RenderTarget<S: Surface, A> {
    Drawable(SharedItem<S::Bitmap>),
    Callback(RenderFn<S, A>),
}

impl<S: Surface, A> Clone for RenderTarget<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Drawable(item) => Self::Drawable(Rc::clone(item)),
            Self::Callback(f) => Self::Callback(Rc::clone(f)),
        }
    }
}

impl<S: Surface, A> RenderTarget<S, A> {
    pub fn callback(f: impl Fn(&mut S, Option<&A>) + 'static) -> Self {
        Self::Callback(Rc::new(f))
    }

    fn render(&self, surface: &mut S, payload: Option<&A>) {
        match self {
            Self::Drawable(item) => item.borrow_mut().draw_on(surface),
            Self::Callback(f) => {
                surface.clear();
                f(surface, payload);
            }
        }
    }
}

pub type PlaceholderTarget<S> = RenderTarget<S, Progress<PayloadOf<S>>>;
pub type ErrorTarget<S> = RenderTarget<S, LoadError>;

struct ViewerState<S: Surface> {
    surface: S,
    items: Vec<SharedItem<S::Bitmap>>,
    current: Option<usize>,
    placeholder: Option<PlaceholderTarget<S>>,
    update_on_progress: bool,
    error_target: Option<ErrorTarget<S>>,
    on_loaded: Option<LoadedHandler>,
    loader: Rc<dyn Loader<PayloadOf<S>>>,
    config: Rc<ViewerConfig>,
    /// Zoom settings shared with every item this viewer creates
    zoom: Rc<ZoomConfig>,
    /// Next index for the sequential loader, drained by `load_from`
    pending_load: Option<usize>,
    pumping: bool,
}

impl<S: Surface> ViewerState<S> {
    fn selected(&self) -> Option<SharedItem<S::Bitmap>> {
        self.current.and_then(|i| self.items.get(i)).cloned()
    }

    fn is_current(&self, item: &Weak<RefCell<ImageItem<S::Bitmap>>>) -> bool {
        self.current
            .and_then(|i| self.items.get(i))
            .is_some_and(|selected| Rc::as_ptr(selected) == item.as_ptr())
    }
}

pub struct Viewer<S: Surface> {
    state: Rc<RefCell<ViewerState<S>>>,
}

impl<S: Surface> Clone for Viewer<S> {
    fn clone(&self) -> Self {
        Self { state: Rc::clone(&self.state) }
    }
}

impl<S: Surface + 'static> Viewer<S> {
    pub fn new(surface: S, loader: impl Loader<PayloadOf<S>> + 'static) -> Self {
        Self::build(surface, Rc::new(loader), ViewerConfig::default())
    }

    /// Build a viewer with a validated configuration
    pub fn with_config(
        surface: S,
        loader: impl Loader<PayloadOf<S>> + 'static,
        config: ViewerConfig,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        Ok(Self::build(surface, Rc::new(loader), config))
    }

    fn build(surface: S, loader: Rc<dyn Loader<PayloadOf<S>>>, config: ViewerConfig) -> Self {
        let viewer = Self {
            state: Rc::new(RefCell::new(ViewerState {
                surface,
                items: Vec::new(),
                current: None,
                placeholder: None,
                update_on_progress: false,
                error_target: None,
                on_loaded: None,
                loader,
                zoom: Rc::new(config.zoom.clone()),
                config: Rc::new(config),
                pending_load: None,
                pumping: false,
            })),
        };
        viewer.handle_resize();
        viewer
    }

    fn upgrade(weak: &Weak<RefCell<ViewerState<S>>>) -> Option<Self> {
        weak.upgrade().map(|state| Self { state })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    pub fn current(&self) -> Option<usize> {
        self.state.borrow().current
    }

    pub fn selected(&self) -> Option<SharedItem<S::Bitmap>> {
        self.state.borrow().selected()
    }

    pub fn item(&self, index: usize) -> Option<SharedItem<S::Bitmap>> {
        self.state.borrow().items.get(index).cloned()
    }

    pub fn items(&self) -> Vec<SharedItem<S::Bitmap>> {
        self.state.borrow().items.clone()
    }

    pub fn config(&self) -> Rc<ViewerConfig> {
        Rc::clone(&self.state.borrow().config)
    }

    /// Whether the loading frontier has reached the end of the list
    pub fn is_all_loaded(&self) -> bool {
        self.state
            .borrow()
            .items
            .last()
            .is_none_or(|last| last.borrow().is_settled())
    }

    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow().surface)
    }

    pub fn with_surface_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.state.borrow_mut().surface)
    }

    // =========================================================================
    // Items
    // =========================================================================

    /// Append an image. The first image added becomes the selection; loading
    /// starts right away if every earlier image has already settled.
    pub fn add_image(&self, source: impl Into<String>, width: f32, height: f32) -> &Self {
        let source = source.into();
        let frontier_at_end = self.is_all_loaded();

        let (item, index) = {
            let state = self.state.borrow();
            let item = ImageItem::new(source, Vec2::new(width, height), Rc::clone(&state.zoom))
                .shared();
            (item, state.items.len())
        };
        self.wire_item(&item);

        let first = {
            let mut state = self.state.borrow_mut();
            state.items.push(item);
            state.current.is_none()
        };
        log::debug!("added image {} (frontier at end: {})", index, frontier_at_end);

        if frontier_at_end {
            self.load_from(index);
        }
        if first {
            self.select(0);
        }
        self
    }

    fn wire_item(&self, item: &SharedItem<S::Bitmap>) {
        let weak_viewer = Rc::downgrade(&self.state);
        let weak_item = Rc::downgrade(item);
        let loading: LoadingHandler<PayloadOf<S>> = Rc::new(move |tick: &Progress<PayloadOf<S>>| {
            let Some(viewer) = Self::upgrade(&weak_viewer) else {
                return;
            };
            let wanted = match viewer.state.try_borrow() {
                Ok(state) => state.update_on_progress && state.is_current(&weak_item),
                Err(_) => false,
            };
            if wanted {
                viewer.draw_placeholder(Some(tick));
            }
        });
        let on_loaded = self.state.borrow().on_loaded.clone();

        item.borrow_mut().install_handlers(loading, on_loaded);
    }

    /// Remove the item at `index`. Out-of-range indices are ignored.
    ///
    /// The selection index is left as is, so it may now refer to a different
    /// item, or to none.
    pub fn remove_by_index(&self, index: usize) -> &Self {
        let mut state = self.state.borrow_mut();
        if index < state.items.len() {
            state.items.remove(index);
            log::debug!("removed image {}", index);
        }
        drop(state);
        self
    }

    // =========================================================================
    // Sequential loading
    // =========================================================================

    /// Run the sequential loader from `index`.
    ///
    /// A load that settles synchronously schedules its successor through
    /// `pending_load` instead of recursing, so long runs of cached images do
    /// not grow the stack.
    fn load_from(&self, index: usize) {
        {
            let mut state = self.state.borrow_mut();
            state.pending_load = Some(index);
            if state.pumping {
                return;
            }
            state.pumping = true;
        }
        loop {
            let next = self.state.borrow_mut().pending_load.take();
            let Some(index) = next else {
                break;
            };
            self.load_image(index);
        }
        self.state.borrow_mut().pumping = false;
    }

    fn load_image(&self, index: usize) {
        let (item, is_current, loader) = {
            let state = self.state.borrow();
            let Some(item) = state.items.get(index) else {
                log::debug!("sequential loader finished at {}", index);
                return;
            };
            (Rc::clone(item), state.current == Some(index), Rc::clone(&state.loader))
        };

        if item.borrow().is_settled() {
            self.load_from(index + 1);
            return;
        }
        if is_current {
            self.draw_placeholder(None);
        }

        // Already loading: whoever started it continues the sequence
        let Some(completion) = ImageItem::load(&item, loader.as_ref()) else {
            return;
        };

        let on_success = (Rc::downgrade(&self.state), Rc::downgrade(&item));
        let on_failure = on_success.clone();
        completion
            .subscribe(move |_| {
                if let Some(viewer) = Self::upgrade(&on_success.0) {
                    viewer.settle(&on_success.1, None);
                }
            })
            .catch(move |error| {
                if let Some(viewer) = Self::upgrade(&on_failure.0) {
                    viewer.settle(&on_failure.1, Some(error));
                }
            });
    }

    /// Continue the sequence after `item` settles. Removals may have shifted
    /// the item since its load started, so its index is looked up again.
    fn settle(&self, item: &Weak<RefCell<ImageItem<S::Bitmap>>>, error: Option<&LoadError>) {
        let (index, is_current) = {
            let state = self.state.borrow();
            let index = state.items.iter().position(|i| Rc::as_ptr(i) == item.as_ptr());
            (index, state.is_current(item))
        };
        let Some(index) = index else {
            log::debug!("settled image was removed; resuming at the first unsettled image");
            if let Some(next) = self.first_unsettled() {
                self.load_from(next);
            }
            return;
        };
        if is_current {
            match error {
                None => {
                    self.restore();
                }
                Some(error) => self.draw_error(error),
            }
        }
        self.load_from(index + 1);
    }

    fn first_unsettled(&self) -> Option<usize> {
        self.state
            .borrow()
            .items
            .iter()
            .position(|item| !item.borrow().is_settled())
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Select `index`. Out-of-range or already-selected indices are ignored.
    pub fn select(&self, index: usize) -> &Self {
        let item = {
            let mut state = self.state.borrow_mut();
            if index >= state.items.len() || state.current == Some(index) {
                return self;
            }
            state.current = Some(index);
            Rc::clone(&state.items[index])
        };
        log::debug!("selected image {}", index);

        let load_state = item.borrow().load_state().clone();
        match load_state {
            LoadState::Loaded => {
                self.restore();
            }
            LoadState::Errored(error) => self.draw_error(&error),
            LoadState::Unloaded | LoadState::Loading => self.draw_placeholder(None),
        }
        self
    }

    pub fn next(&self) -> &Self {
        match self.current() {
            Some(current) if current + 1 < self.len() => self.select(current + 1),
            _ => self,
        }
    }

    pub fn prev(&self) -> &Self {
        match self.current() {
            Some(current) if current > 0 => self.select(current - 1),
            _ => self,
        }
    }

    // =========================================================================
    // Transform of the selected item
    // =========================================================================

    /// Mutate the selected item and redraw it, only if it is loaded
    fn update_selected(&self, mutate: impl FnOnce(&mut ImageItem<S::Bitmap>)) -> &Self {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if let Some(item) = state.selected() {
            let mut item = item.borrow_mut();
            if item.is_loaded() {
                mutate(&mut item);
                item.draw_on(&mut state.surface);
            } else {
                log::trace!("ignoring transform on an unloaded image");
            }
        }
        drop(guard);
        self
    }

    pub fn zoom_in(&self) -> &Self {
        self.update_selected(|item| item.zoom_in())
    }

    pub fn zoom_out(&self) -> &Self {
        self.update_selected(|item| item.zoom_out())
    }

    pub fn zoom(&self, delta: f32) -> &Self {
        self.update_selected(|item| item.zoom(delta))
    }

    /// Pan the selected image by a raw pointer delta
    pub fn translate(&self, delta: Vec2) -> &Self {
        self.update_selected(|item| item.translate(delta))
    }

    /// Back to the identity transform and redraw
    pub fn restore(&self) -> &Self {
        self.update_selected(|item| item.reset())
    }

    /// Scale the selected image so its width fills the surface. Does not redraw.
    pub fn fill_width(&self) -> &Self {
        self.fill_axis(|surface, natural| surface.x / natural.x)
    }

    /// Scale the selected image so its height fills the surface. Does not redraw.
    pub fn fill_height(&self) -> &Self {
        self.fill_axis(|surface, natural| surface.y / natural.y)
    }

    fn fill_axis(&self, ratio: impl FnOnce(Vec2, Vec2) -> f32) -> &Self {
        let state = self.state.borrow();
        if let Some(item) = state.selected() {
            let mut item = item.borrow_mut();
            if item.is_loaded() {
                let ratio = ratio(state.surface.size(), item.natural_size());
                if ratio.is_finite() {
                    item.set_aspect_ratio(ratio);
                }
            }
        }
        drop(state);
        self
    }

    /// Sync the backing size to the display size, then restore
    pub fn handle_resize(&self) -> &Self {
        {
            let mut state = self.state.borrow_mut();
            let client = state.surface.client_size();
            if state.surface.size() != client {
                log::debug!("resizing surface to {}x{}", client.x, client.y);
                state.surface.set_size(client);
            }
        }
        self.restore()
    }

    // =========================================================================
    // Placeholder and error targets
    // =========================================================================

    /// Install the placeholder. With `update_on_progress`, the placeholder is
    /// redrawn on every progress tick of the selected item.
    pub fn set_placeholder(&self, target: PlaceholderTarget<S>, update_on_progress: bool) -> &Self {
        let mut state = self.state.borrow_mut();
        state.placeholder = Some(target);
        state.update_on_progress = update_on_progress;
        drop(state);
        self
    }

    /// Use an image as the placeholder. It is loaded through the viewer's
    /// loader, outside the sequential queue.
    pub fn set_placeholder_image(
        &self,
        source: impl Into<String>,
        size: Option<Vec2>,
        update_on_progress: bool,
    ) -> &Self {
        let item = self.detached_item(source.into(), None, size);
        self.set_placeholder(RenderTarget::Drawable(item), update_on_progress)
    }

    /// Use an image as the error target. The position is a starting offset;
    /// like any drawable it is clamped when drawn.
    pub fn set_error_image(&self, source: impl Into<String>, position: Option<Vec2>, size: Option<Vec2>) -> &Self {
        let item = self.detached_item(source.into(), position, size);
        self.set_error_target(RenderTarget::Drawable(item))
    }

    /// Install a render callback for load failures of the selected image
    pub fn on_error(&self, f: impl Fn(&mut S, Option<&LoadError>) + 'static) -> &Self {
        self.set_error_target(RenderTarget::callback(f))
    }

    pub fn set_error_target(&self, target: ErrorTarget<S>) -> &Self {
        self.state.borrow_mut().error_target = Some(target);
        self
    }

    /// Forward `handler` to every item added from now on
    pub fn on_loaded(&self, handler: Option<LoadedHandler>) -> Result<&Self, ViewerError> {
        let handler = handler.ok_or(ViewerError::InvalidArgument("onLoaded expects a callable handler"))?;
        self.state.borrow_mut().on_loaded = Some(handler);
        Ok(self)
    }

    fn detached_item(&self, source: String, position: Option<Vec2>, size: Option<Vec2>) -> SharedItem<S::Bitmap> {
        let (loader, zoom) = {
            let state = self.state.borrow();
            (Rc::clone(&state.loader), Rc::clone(&state.zoom))
        };
        let mut item = ImageItem::new(source, size.unwrap_or(Vec2::ZERO), zoom);
        if let Some(position) = position {
            item.set_position(position);
        }
        let item = item.shared();
        // Settles on its own; nothing waits for it
        let _ = ImageItem::load(&item, loader.as_ref());
        item
    }

    fn draw_placeholder(&self, tick: Option<&Progress<PayloadOf<S>>>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match &state.placeholder {
            Some(target) => target.render(&mut state.surface, tick),
            None => log::trace!("no placeholder installed"),
        }
    }

    fn draw_error(&self, error: &LoadError) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        match &state.error_target {
            Some(target) => target.render(&mut state.surface, Some(error)),
            None => log::trace!("no error target installed"),
        }
    }
}
