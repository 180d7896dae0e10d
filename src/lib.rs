//! canvas-viewer - An embeddable image viewer core using Rust, WASM, and egui
//!
//! Given a rendering surface and an ordered list of image sources, the viewer
//! loads bitmaps one at a time in order, shows exactly one selected image, and
//! lets it be panned and zoomed within clamped bounds. Navigation resets the
//! view.
//!
//! ## Architecture
//!
//! - `Viewer`: sequential loading, selection, and render dispatch over any `Surface`
//! - `ImageItem`: per-image load state and transform
//! - `PainterSurface` / `ViewerWidget`: egui rendering and input
//! - `ViewerApp`: Thin eframe App shell that hosts the widget
//! - `ViewerHandle`: WASM interface for JavaScript to control the viewer

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use web_sys::HtmlCanvasElement;

#[cfg(target_arch = "wasm32")]
mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod helpers;
pub mod item;
pub mod loader;
pub mod painter;
pub mod surface;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transform;
pub mod viewer;
pub mod widget;

pub use channel::{Channel, Completion, Progress, ProgressChannel};
pub use config::{ViewerConfig, ZoomConfig};
pub use error::{LoadError, ViewerError};
pub use item::{ImageItem, LoadState, LoadedImage, SharedItem};
pub use loader::Loader;
pub use painter::{PainterSurface, TextureBitmap};
pub use surface::{Bitmap, Surface};
pub use viewer::{RenderTarget, Viewer};
pub use widget::ViewerWidget;

#[cfg(target_arch = "wasm32")]
use app::ViewerApp;
#[cfg(target_arch = "wasm32")]
use loader::FetchLoader;

/// A handle to a viewer instance. Each handle manages its own canvas and state.
///
/// This struct is exposed to JavaScript. It shares the viewer with the widget
/// drawn by the eframe runner, and asks egui for a repaint after every call
/// that may change what is on screen.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub struct ViewerHandle {
    viewer: Viewer<PainterSurface>,
    ctx: egui::Context,
    /// The eframe runner (kept alive to maintain the render loop)
    runner: eframe::WebRunner,
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl ViewerHandle {
    /// Create a new viewer attached to the given canvas element.
    ///
    /// `config_json` optionally overrides zoom limits, the zoom step table, and
    /// the wheel step, e.g. `{"zoom": {"steps": [1, 1.5, 2]}}`.
    #[wasm_bindgen]
    pub async fn create(canvas: HtmlCanvasElement, config_json: Option<String>) -> Result<ViewerHandle, JsValue> {
        // Initialize logging for debug builds
        #[cfg(debug_assertions)]
        {
            eframe::WebLogger::init(log::LevelFilter::Debug).ok();
        }
        #[cfg(not(debug_assertions))]
        {
            eframe::WebLogger::init(log::LevelFilter::Warn).ok();
        }

        let config = match config_json {
            Some(json) => ViewerConfig::from_json(&json).map_err(to_js_error)?,
            None => ViewerConfig::default(),
        };
        let viewer = Viewer::with_config(PainterSurface::default(), FetchLoader, config).map_err(to_js_error)?;

        let widget = Rc::new(RefCell::new(ViewerWidget::new(viewer.clone())));
        let ctx_slot: Rc<RefCell<Option<egui::Context>>> = Rc::new(RefCell::new(None));
        let ctx_for_app = Rc::clone(&ctx_slot);

        let web_options = eframe::WebOptions::default();
        let runner = eframe::WebRunner::new();

        runner
            .start(
                canvas,
                web_options,
                Box::new(move |cc| {
                    *ctx_for_app.borrow_mut() = Some(cc.egui_ctx.clone());
                    Ok(Box::new(ViewerApp::new(cc, widget)))
                }),
            )
            .await?;

        let ctx = ctx_slot
            .borrow_mut()
            .take()
            .ok_or_else(|| JsValue::from_str("viewer app was not created"))?;

        Ok(ViewerHandle { viewer, ctx, runner })
    }

    /// End event loop and release resources
    #[wasm_bindgen(js_name = destroy)]
    pub fn destroy(&self) {
        self.runner.destroy();
    }

    // =========================================================================
    // Images and selection
    // =========================================================================

    /// Append an image. `width` and `height` are its declared size, used until
    /// the bitmap is decoded.
    #[wasm_bindgen(js_name = addImage)]
    pub fn add_image(&self, src: String, width: f32, height: f32) {
        self.viewer.add_image(src, width, height);
        self.changed();
    }

    #[wasm_bindgen(js_name = removeByIndex)]
    pub fn remove_by_index(&self, index: usize) {
        self.viewer.remove_by_index(index);
        self.changed();
    }

    #[wasm_bindgen(js_name = select)]
    pub fn select(&self, index: usize) {
        self.viewer.select(index);
        self.changed();
    }

    #[wasm_bindgen(js_name = next)]
    pub fn next(&self) {
        self.viewer.next();
        self.changed();
    }

    #[wasm_bindgen(js_name = prev)]
    pub fn prev(&self) {
        self.viewer.prev();
        self.changed();
    }

    /// Index of the selected image, or undefined before any image is added
    #[wasm_bindgen(getter)]
    pub fn current(&self) -> Option<u32> {
        self.viewer.current().map(|i| i as u32)
    }

    #[wasm_bindgen(getter)]
    pub fn length(&self) -> u32 {
        self.viewer.len() as u32
    }

    #[wasm_bindgen(js_name = isAllLoaded)]
    pub fn is_all_loaded(&self) -> bool {
        self.viewer.is_all_loaded()
    }

    // =========================================================================
    // Transform
    // =========================================================================

    /// Step forward through the zoom table
    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&self) {
        self.viewer.zoom_in();
        self.changed();
    }

    /// Step backward through the zoom table
    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&self) {
        self.viewer.zoom_out();
        self.changed();
    }

    /// Continuous zoom by `delta`, clamped to the configured limits
    #[wasm_bindgen(js_name = zoom)]
    pub fn zoom(&self, delta: f32) {
        self.viewer.zoom(delta);
        self.changed();
    }

    /// Pan the selected image by `(dx, dy)` pixels
    #[wasm_bindgen(js_name = moveTo)]
    pub fn move_to(&self, dx: f32, dy: f32) {
        self.viewer.translate(egui::vec2(dx, dy));
        self.changed();
    }

    #[wasm_bindgen(js_name = restore)]
    pub fn restore(&self) {
        self.viewer.restore();
        self.changed();
    }

    /// Fit the selected image's width. Takes effect on the next redraw, so
    /// call it from an `onLoaded` handler.
    #[wasm_bindgen(js_name = fillWidth)]
    pub fn fill_width(&self) {
        self.viewer.fill_width();
    }

    /// Fit the selected image's height. Takes effect on the next redraw.
    #[wasm_bindgen(js_name = fillHeight)]
    pub fn fill_height(&self) {
        self.viewer.fill_height();
    }

    // =========================================================================
    // Placeholder, error, and load callbacks
    // =========================================================================

    /// Show a progress ring while the selected image loads
    #[wasm_bindgen(js_name = setLoadingIndicator)]
    pub fn set_loading_indicator(&self, update_on_progress: bool) {
        self.viewer.set_placeholder(helpers::loading_ring(), update_on_progress);
        self.changed();
    }

    #[wasm_bindgen(js_name = setPlaceholderImage)]
    pub fn set_placeholder_image(
        &self,
        src: String,
        width: Option<f32>,
        height: Option<f32>,
        update_on_progress: Option<bool>,
    ) {
        let size = width.zip(height).map(|(w, h)| egui::vec2(w, h));
        self.viewer
            .set_placeholder_image(src, size, update_on_progress.unwrap_or(false));
        self.changed();
    }

    /// Draw an image when the selected image fails to load
    #[wasm_bindgen(js_name = setErrorImage)]
    pub fn set_error_image(&self, src: String, x: Option<f32>, y: Option<f32>, width: Option<f32>, height: Option<f32>) {
        let position = x.zip(y).map(|(x, y)| egui::vec2(x, y));
        let size = width.zip(height).map(|(w, h)| egui::vec2(w, h));
        self.viewer.set_error_image(src, position, size);
        self.changed();
    }

    /// Print `text` (or the load error when omitted) when the selected image
    /// fails to load
    #[wasm_bindgen(js_name = setErrorMessage)]
    pub fn set_error_message(&self, text: Option<String>) {
        let target = match text {
            Some(text) => helpers::centered_message(text),
            None => helpers::error_message(),
        };
        self.viewer.set_error_target(target);
        self.changed();
    }

    /// Register `callback(message)` for load failures of the selected image.
    /// Replaces any error image or message.
    #[wasm_bindgen(js_name = onError)]
    pub fn on_error(&self, callback: JsValue) -> Result<(), JsValue> {
        let callback = as_function(callback, "onError expects a function")?;
        self.viewer.on_error(move |_surface, error| {
            let message = JsValue::from_str(&error.map(ToString::to_string).unwrap_or_default());
            let callback = callback.clone();
            // Render callbacks run inside the viewer; let JS call back in later
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = callback.call1(&JsValue::NULL, &message) {
                    log::warn!("onError callback threw: {:?}", e);
                }
            });
        });
        Ok(())
    }

    /// Register `callback({src, width, height})`, called when each image added
    /// after this call finishes loading
    #[wasm_bindgen(js_name = onLoaded)]
    pub fn on_loaded(&self, callback: JsValue) -> Result<(), JsValue> {
        let callback = callback.dyn_into::<js_sys::Function>().ok();
        let handler: Option<item::LoadedHandler> = callback.map(|callback| {
            Rc::new(move |image: &LoadedImage| {
                let info = js_sys::Object::new();
                let _ = js_sys::Reflect::set(&info, &"src".into(), &image.source.as_str().into());
                let _ = js_sys::Reflect::set(&info, &"width".into(), &image.natural_size.x.into());
                let _ = js_sys::Reflect::set(&info, &"height".into(), &image.natural_size.y.into());
                if let Err(e) = callback.call1(&JsValue::NULL, &info) {
                    log::warn!("onLoaded callback threw: {:?}", e);
                }
            }) as item::LoadedHandler
        });
        self.viewer.on_loaded(handler).map_err(to_js_error)?;
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
impl ViewerHandle {
    fn changed(&self) {
        self.ctx.request_repaint();
    }
}

#[cfg(target_arch = "wasm32")]
fn as_function(value: JsValue, message: &'static str) -> Result<js_sys::Function, JsValue> {
    value
        .dyn_into::<js_sys::Function>()
        .map_err(|_| to_js_error(ViewerError::InvalidArgument(message)))
}

#[cfg(target_arch = "wasm32")]
fn to_js_error(err: ViewerError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}
