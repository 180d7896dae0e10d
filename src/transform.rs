//! Coordinate transformation logic for pan/zoom functionality
//!
//! This module contains pure transform math (pan bounds, clamping, stepped and
//! free zoom) that can be easily unit tested without a rendering surface.

use egui::Vec2;

/// Minimum scale reachable through free zoom (natural size)
pub const MIN_SCALE: f32 = 1.0;

/// Maximum scale reachable through free zoom (twice the natural size)
pub const MAX_SCALE: f32 = 2.0;

/// Scale table walked by double-click / zoom buttons
pub const DEFAULT_ZOOM_STEPS: [f32; 4] = [1.0, 1.4, 1.8, 2.0];

/// Legal range for the top-left corner of an image on a surface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

/// Compute the pan bounds for an image of `natural_size` drawn at `scale`.
///
/// The far edge of the image may never move inside the surface's near edge,
/// and the image may never be dragged past the top-left anchor.
pub fn bounds(scale: f32, surface_size: Vec2, natural_size: Vec2) -> Bounds {
    Bounds {
        min_x: surface_size.x - natural_size.x * scale,
        max_x: 0.0,
        min_y: surface_size.y - natural_size.y * scale,
        max_y: 0.0,
    }
}

/// Clamp a position into bounds, one axis at a time.
///
/// An image smaller than the surface yields `min > max`; the lower bound wins
/// in that case, so `f32::clamp` (which panics on an inverted range) is not used.
pub fn clamp(position: Vec2, bounds: &Bounds) -> Vec2 {
    Vec2::new(
        position.x.min(bounds.max_x).max(bounds.min_x),
        position.y.min(bounds.max_y).max(bounds.min_y),
    )
}

/// Advance `scale` through the step table by `direction` entries, wrapping at
/// both ends.
///
/// A scale that is not an exact table entry (e.g. one reached by free zoom)
/// has fallen off the table and restarts at the first entry.
pub fn step_zoom(scale: f32, steps: &[f32], direction: i32) -> f32 {
    let Some(&first) = steps.first() else {
        return scale;
    };
    match steps.iter().position(|&s| s == scale) {
        None => first,
        Some(index) => {
            let next = (index as i64 + direction as i64).rem_euclid(steps.len() as i64);
            steps[next as usize]
        }
    }
}

/// Continuous zoom: add `delta` and clamp into `[min_scale, max_scale]`
pub fn free_zoom(scale: f32, delta: f32, min_scale: f32, max_scale: f32) -> f32 {
    (scale + delta).min(max_scale).max(min_scale)
}
