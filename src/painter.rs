//! egui-backed rendering surface
//!
//! `PainterSurface` keeps a retained display list instead of pixels: clearing
//! drops the commands it covers, drawing appends. The widget replays the list
//! through an `egui::Painter` every frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use egui::{Color32, ColorImage, Pos2, Rect, Shape, Stroke, Vec2};

use crate::error::LoadError;
use crate::surface::{Bitmap, Surface};

/// Segments used to approximate a full circle when stroking arcs
const ARC_SEGMENTS: usize = 64;

#[derive(Clone, Debug)]
pub enum DrawCommand {
    Image {
        /// Identifies the bitmap so the widget can reuse its texture
        bitmap_id: u64,
        image: Arc<ColorImage>,
        rect: Rect,
    },
    Shape(Shape),
    Text {
        /// Centre of the text
        pos: Pos2,
        text: String,
        size: f32,
        color: Color32,
    },
}

impl DrawCommand {
    fn bounds(&self) -> Rect {
        match self {
            Self::Image { rect, .. } => *rect,
            Self::Shape(shape) => shape.visual_bounding_rect(),
            // Rough extent; glyph metrics are only known to the painter
            Self::Text { pos, text, size, .. } => {
                Rect::from_center_size(*pos, Vec2::new(*size * 0.5 * text.chars().count() as f32, *size))
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PainterSurface {
    size: Vec2,
    client_size: Vec2,
    commands: Vec<DrawCommand>,
}

impl PainterSurface {
    pub fn new(client_size: Vec2) -> Self {
        Self { size: Vec2::ZERO, client_size, commands: Vec::new() }
    }

    /// Record the size the widget was laid out at
    pub fn set_client_size(&mut self, size: Vec2) {
        self.client_size = size;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn stroke_circle(&mut self, center: Pos2, radius: f32, stroke: Stroke) {
        self.commands.push(DrawCommand::Shape(Shape::circle_stroke(center, radius, stroke)));
    }

    /// Stroke the arc from `start` to `end` (radians, clockwise from +x)
    pub fn stroke_arc(&mut self, center: Pos2, radius: f32, start: f32, end: f32, stroke: Stroke) {
        let sweep = end - start;
        let segments = ((sweep.abs() / std::f32::consts::TAU) * ARC_SEGMENTS as f32).ceil().max(1.0) as usize;
        let points: Vec<Pos2> = (0..=segments)
            .map(|i| {
                let angle = start + sweep * i as f32 / segments as f32;
                center + radius * Vec2::angled(angle)
            })
            .collect();
        self.commands.push(DrawCommand::Shape(Shape::line(points, stroke)));
    }

    pub fn text(&mut self, pos: Pos2, text: impl Into<String>, size: f32, color: Color32) {
        self.commands.push(DrawCommand::Text { pos, text: text.into(), size, color });
    }
}

impl Surface for PainterSurface {
    type Bitmap = TextureBitmap;

    fn size(&self) -> Vec2 {
        self.size
    }

    fn client_size(&self) -> Vec2 {
        self.client_size
    }

    fn set_size(&mut self, size: Vec2) {
        self.size = size;
    }

    /// Drop every command whose visible part lies inside `rect`
    fn clear_rect(&mut self, rect: Rect) {
        let visible_area = Rect::from_min_size(Pos2::ZERO, self.size);
        self.commands.retain(|command| {
            let visible = command.bounds().intersect(visible_area);
            visible.is_positive() && !rect.contains_rect(visible)
        });
    }

    fn draw_image(&mut self, bitmap: &TextureBitmap, rect: Rect) {
        match &bitmap.image {
            Some(image) => self.commands.push(DrawCommand::Image {
                bitmap_id: bitmap.id,
                image: Arc::clone(image),
                rect,
            }),
            None => log::trace!("skipping draw of undecoded bitmap {}", bitmap.id),
        }
    }
}

static NEXT_BITMAP_ID: AtomicU64 = AtomicU64::new(1);

/// Bitmap decoded from encoded image bytes (PNG, JPEG, GIF, WebP)
#[derive(Clone, Debug)]
pub struct TextureBitmap {
    id: u64,
    declared_size: Vec2,
    image: Option<Arc<ColorImage>>,
}

impl TextureBitmap {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn image(&self) -> Option<&Arc<ColorImage>> {
        self.image.as_ref()
    }
}

impl Bitmap for TextureBitmap {
    type Payload = Vec<u8>;

    fn with_size(size: Vec2) -> Self {
        Self {
            id: NEXT_BITMAP_ID.fetch_add(1, Ordering::Relaxed),
            declared_size: size,
            image: None,
        }
    }

    /// Decoded size once available, the declared size before that
    fn natural_size(&self) -> Vec2 {
        match &self.image {
            Some(image) => Vec2::new(image.size[0] as f32, image.size[1] as f32),
            None => self.declared_size,
        }
    }

    fn assign(&mut self, payload: &Vec<u8>) -> Result<(), LoadError> {
        let decoded = image::load_from_memory(payload).map_err(|e| LoadError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        self.image = Some(Arc::new(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw())));
        Ok(())
    }

    fn is_decoded(&self) -> bool {
        self.image.is_some()
    }
}
