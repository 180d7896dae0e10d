//! Rendering surface contract
//!
//! A `Surface` is the single drawing target a viewer owns: it has a backing
//! pixel size, a display size, and can clear rectangles and draw bitmaps.
//! A `Bitmap` is the surface-specific image resource an item owns.

use egui::{Rect, Vec2};

use crate::error::LoadError;

/// Decodable image resource owned by exactly one item.
pub trait Bitmap {
    /// Encoded data delivered by the final progress tick
    type Payload: 'static;

    /// Create an empty bitmap with a declared size (used until decoded)
    fn with_size(size: Vec2) -> Self;

    /// Intrinsic size in pixels
    fn natural_size(&self) -> Vec2;

    /// Assign the loaded payload. Returning `Ok` is the decode-complete signal.
    fn assign(&mut self, payload: &Self::Payload) -> Result<(), LoadError>;

    fn is_decoded(&self) -> bool;
}

pub trait Surface {
    type Bitmap: Bitmap + 'static;

    /// Backing store size in pixels
    fn size(&self) -> Vec2;

    /// Size the surface is displayed at
    fn client_size(&self) -> Vec2;

    /// Resize the backing store
    fn set_size(&mut self, size: Vec2);

    fn clear_rect(&mut self, rect: Rect);

    fn draw_image(&mut self, bitmap: &Self::Bitmap, rect: Rect);

    /// Clear the whole backing store
    fn clear(&mut self) {
        let rect = Rect::from_min_size(egui::Pos2::ZERO, self.size());
        self.clear_rect(rect);
    }
}

/// Payload type of the bitmaps a surface draws
pub type PayloadOf<S> = <<S as Surface>::Bitmap as Bitmap>::Payload;
