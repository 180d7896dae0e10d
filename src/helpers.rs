//! Ready-made placeholder and error renderers for `PainterSurface`

use std::f32::consts::TAU;

use egui::{Color32, Pos2, Stroke};

use crate::channel::Progress;
use crate::error::LoadError;
use crate::painter::PainterSurface;
use crate::surface::Surface;
use crate::viewer::{ErrorTarget, PlaceholderTarget, RenderTarget};

pub const RING_RADIUS: f32 = 50.0;
pub const RING_WIDTH: f32 = 5.0;
pub const RING_EMPTY_COLOR: Color32 = Color32::GRAY;
pub const RING_FILL_COLOR: Color32 = Color32::from_rgb(255, 165, 0);

/// Distance the message baseline sits above the surface centre
pub const MESSAGE_OFFSET: f32 = 15.0;
pub const MESSAGE_SIZE: f32 = 30.0;

/// Gray ring centred on the surface, with an orange arc showing the share of
/// the payload received so far.
pub fn loading_ring() -> PlaceholderTarget<PainterSurface> {
    RenderTarget::callback(draw_loading_ring)
}

pub fn draw_loading_ring(surface: &mut PainterSurface, tick: Option<&Progress<Vec<u8>>>) {
    let center = (surface.size() / 2.0).to_pos2();
    surface.stroke_circle(center, RING_RADIUS, Stroke::new(RING_WIDTH, RING_EMPTY_COLOR));
    if let Some(tick) = tick {
        let fraction = tick.fraction();
        if fraction > 0.0 {
            surface.stroke_arc(center, RING_RADIUS, 0.0, fraction * TAU, Stroke::new(RING_WIDTH, RING_FILL_COLOR));
        }
    }
}

/// Error target printing `message` near the middle of the surface
pub fn centered_message(message: impl Into<String>) -> ErrorTarget<PainterSurface> {
    let message = message.into();
    RenderTarget::callback(move |surface: &mut PainterSurface, _: Option<&LoadError>| {
        draw_centered_message(surface, &message)
    })
}

/// Error target printing the load error itself near the middle of the surface
pub fn error_message() -> ErrorTarget<PainterSurface> {
    RenderTarget::callback(|surface: &mut PainterSurface, error: Option<&LoadError>| {
        if let Some(error) = error {
            draw_centered_message(surface, &error.to_string());
        }
    })
}

pub fn draw_centered_message(surface: &mut PainterSurface, message: &str) {
    let size = surface.size();
    let pos = Pos2::new(size.x / 2.0, size.y / 2.0 - MESSAGE_OFFSET);
    surface.text(pos, message, MESSAGE_SIZE, Color32::BLACK);
}
