//! ViewerWidget - egui widget that displays a viewer's surface and feeds it input
//!
//! The widget owns no viewing state of its own. Each frame it syncs the
//! surface size to the space it was given, turns pointer and keyboard input
//! into viewer operations, and replays the surface's display list.

use std::collections::{HashMap, HashSet};

use egui::{Align2, Color32, FontId, Key, PointerButton, Rect, Response, Sense, TextureHandle, TextureOptions, Ui, Vec2};

use crate::painter::{DrawCommand, PainterSurface};
use crate::viewer::Viewer;

/// Texture coordinates covering a whole texture
const FULL_UV: Rect = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));

/// Horizontal release speed, in points per second, that turns a drag into a swipe
pub const SWIPE_MIN_SPEED: f32 = 300.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Swipe {
    Left,
    Right,
}

/// Classify the pointer velocity at the end of a drag. Mostly-vertical or
/// slow releases are plain pans.
fn swipe_direction(velocity: Vec2) -> Option<Swipe> {
    if velocity.x.abs() < SWIPE_MIN_SPEED || velocity.x.abs() < velocity.y.abs() {
        return None;
    }
    Some(if velocity.x < 0.0 { Swipe::Left } else { Swipe::Right })
}

pub struct ViewerWidget {
    viewer: Viewer<PainterSurface>,
    /// Uploaded textures keyed by bitmap id
    textures: HashMap<u64, TextureHandle>,
    /// Size the widget was last laid out at
    last_client_size: Option<Vec2>,
    /// Sub-pixel drag motion not yet forwarded to the viewer
    drag_remainder: Vec2,
}

impl ViewerWidget {
    pub fn new(viewer: Viewer<PainterSurface>) -> Self {
        Self {
            viewer,
            textures: HashMap::new(),
            last_client_size: None,
            drag_remainder: Vec2::ZERO,
        }
    }

    pub fn viewer(&self) -> &Viewer<PainterSurface> {
        &self.viewer
    }

    /// Show the widget at `container_size`, handling input and painting the
    /// current display list.
    pub fn show(&mut self, ui: &mut Ui, container_size: Vec2) -> Response {
        let ctx = ui.ctx().clone();

        self.handle_keyboard_input(&ctx);

        let (rect, response) = ui.allocate_exact_size(container_size, Sense::click_and_drag());

        let client_size = rect.size().round();
        if self.last_client_size != Some(client_size) {
            self.last_client_size = Some(client_size);
            self.viewer.with_surface_mut(|surface| surface.set_client_size(client_size));
            self.viewer.handle_resize();
        }

        self.handle_pointer_input(ui, &response);
        self.paint(ui, rect);

        // Progress ticks arrive outside egui's event loop
        if !self.viewer.is_all_loaded() {
            ctx.request_repaint();
        }

        response
    }

    fn handle_keyboard_input(&mut self, ctx: &egui::Context) {
        let (next, prev, zoom_in, zoom_out, restore) = ctx.input(|i| {
            (
                i.key_pressed(Key::ArrowRight),
                i.key_pressed(Key::ArrowLeft),
                i.key_pressed(Key::Equals) || i.key_pressed(Key::Plus),
                i.key_pressed(Key::Minus),
                i.key_pressed(Key::Num0),
            )
        });
        if next {
            self.viewer.next();
        }
        if prev {
            self.viewer.prev();
        }
        if zoom_in {
            self.viewer.zoom_in();
        }
        if zoom_out {
            self.viewer.zoom_out();
        }
        if restore {
            self.viewer.restore();
        }
    }

    fn handle_pointer_input(&mut self, ui: &Ui, response: &Response) {
        if response.dragged_by(PointerButton::Primary) {
            let motion = self.drag_remainder + response.drag_delta();
            let whole = Vec2::new(motion.x.trunc(), motion.y.trunc());
            self.drag_remainder = motion - whole;
            if whole != Vec2::ZERO {
                self.viewer.translate(whole);
            }
        } else {
            self.drag_remainder = Vec2::ZERO;
        }

        if response.drag_stopped_by(PointerButton::Primary) {
            let velocity = ui.input(|i| i.pointer.velocity());
            match swipe_direction(velocity) {
                Some(Swipe::Left) => {
                    self.viewer.prev();
                }
                Some(Swipe::Right) => {
                    self.viewer.next();
                }
                None => {}
            }
        }

        if response.double_clicked() {
            self.viewer.zoom_in();
        }

        if !response.hovered() {
            return;
        }

        // Pinch gesture (also ctrl + wheel)
        let zoom_delta = ui.input(|i| i.zoom_delta());
        if zoom_delta != 1.0 {
            self.viewer.zoom(zoom_delta - 1.0);
            return;
        }

        let scroll_delta = ui.input(|i| i.raw_scroll_delta);
        if scroll_delta.y != 0.0 {
            let wheel_step = self.viewer.config().wheel_step;
            self.viewer.zoom(scroll_delta.y / wheel_step);
        }
    }

    fn paint(&mut self, ui: &Ui, rect: Rect) {
        let commands = self.viewer.with_surface(|surface| surface.commands().to_vec());
        let painter = ui.painter_at(rect);
        let offset = rect.min.to_vec2();
        let mut live = HashSet::new();

        for command in commands {
            match command {
                DrawCommand::Image { bitmap_id, image, rect: target } => {
                    live.insert(bitmap_id);
                    let texture = self.textures.entry(bitmap_id).or_insert_with(|| {
                        ui.ctx().load_texture(format!("bitmap-{}", bitmap_id), (*image).clone(), TextureOptions::LINEAR)
                    });
                    painter.image(texture.id(), target.translate(offset), FULL_UV, Color32::WHITE);
                }
                DrawCommand::Shape(mut shape) => {
                    shape.translate(offset);
                    painter.add(shape);
                }
                DrawCommand::Text { pos, text, size, color } => {
                    painter.text(pos + offset, Align2::CENTER_CENTER, text, FontId::proportional(size), color);
                }
            }
        }

        self.textures.retain(|id, _| live.contains(id));
    }
}
