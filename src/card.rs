use anyhow::Context;
use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};
use image::{imageops, DynamicImage, Rgba, RgbaImage};

use crate::model::metrics::MetricSet;

/// Canvas edge length in pixels.
pub const CANVAS_SIZE: u32 = 640;
/// Avatar square edge length.
pub const AVATAR_SIZE: u32 = 128;
/// Top-left corner of the avatar slot.
pub const AVATAR_POS: (i64, i64) = (256, 135);
/// Right edge all metric text is aligned to.
pub const TEXT_RIGHT_EDGE: f32 = 620.0;
/// Metric text color.
pub const METRIC_COLOR: [u8; 3] = [0x6C, 0xC5, 0x9D];

/// One line of metric text: value, font size, baseline y.
struct MetricRow {
    value: u64,
    font_size: f32,
    baseline_y: f32,
}

/// Layout of the five metrics on the card. Order and anchors match the
/// printed template, so they are fixed.
fn metric_rows(metrics: &MetricSet) -> [MetricRow; 5] {
    [
        MetricRow {
            value: metrics.stars,
            font_size: 60.0,
            baseline_y: 310.0,
        },
        MetricRow {
            value: metrics.created,
            font_size: 60.0,
            baseline_y: 405.0,
        },
        MetricRow {
            value: metrics.created_completed,
            font_size: 50.0,
            baseline_y: 465.0,
        },
        MetricRow {
            value: metrics.assigned,
            font_size: 60.0,
            baseline_y: 545.0,
        },
        MetricRow {
            value: metrics.assigned_completed,
            font_size: 50.0,
            baseline_y: 605.0,
        },
    ]
}

/// Decode encoded raster bytes (PNG, JPEG, ...) into a `DynamicImage`.
pub fn decode_image(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    image::load_from_memory(bytes).context("decode image from memory")
}

/// Paint the full card: template at the origin, avatar in its slot, then
/// the five right-aligned metric values. Always paints onto a fresh
/// buffer, so a failed run can never leave a partial frame behind.
pub fn compose(template: &DynamicImage, avatar: &DynamicImage, metrics: &MetricSet) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([0, 0, 0, 0]));

    imageops::overlay(&mut canvas, &template.to_rgba8(), 0, 0);

    let avatar = imageops::resize(
        &avatar.to_rgba8(),
        AVATAR_SIZE,
        AVATAR_SIZE,
        imageops::FilterType::Triangle,
    );
    imageops::overlay(&mut canvas, &avatar, AVATAR_POS.0, AVATAR_POS.1);

    let mut painter = TextPainter::new();
    for row in metric_rows(metrics) {
        painter.draw_right_aligned(
            &mut canvas,
            &row.value.to_string(),
            row.font_size,
            TEXT_RIGHT_EDGE,
            row.baseline_y,
        );
    }

    canvas
}

/// Rasterizes bold sans-serif text onto the canvas with cosmic-text.
struct TextPainter {
    font_system: FontSystem,
    cache: SwashCache,
}

impl TextPainter {
    fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            cache: SwashCache::new(),
        }
    }

    /// Draw `text` so its right edge sits at `right_x` and its baseline at
    /// `baseline_y`, canvas `fillText` style.
    fn draw_right_aligned(
        &mut self,
        canvas: &mut RgbaImage,
        text: &str,
        font_size: f32,
        right_x: f32,
        baseline_y: f32,
    ) {
        let metrics = Metrics::new(font_size, font_size * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        buffer.set_size(
            &mut self.font_system,
            Some(CANVAS_SIZE as f32),
            Some(font_size * 2.0),
        );

        let attrs = Attrs::new().family(Family::SansSerif).weight(Weight::BOLD);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let width = buffer
            .layout_runs()
            .map(|run| run.line_w)
            .fold(0.0_f32, f32::max);

        // fillText anchors at the alphabetic baseline; cosmic-text draws
        // from the top of the line box. 0.8em approximates the ascent.
        let origin_x = right_x - width;
        let origin_y = baseline_y - font_size * 0.8;

        let fill = Color::rgba(METRIC_COLOR[0], METRIC_COLOR[1], METRIC_COLOR[2], 0xFF);
        buffer.draw(
            &mut self.font_system,
            &mut self.cache,
            fill,
            |x, y, w, h, color| {
                for dy in 0..h {
                    for dx in 0..w {
                        let px = origin_x as i32 + x + dx as i32;
                        let py = origin_y as i32 + y + dy as i32;
                        blend_pixel(canvas, px, py, color);
                    }
                }
            },
        );
    }
}

/// Source-over blend of a single text pixel.
fn blend_pixel(canvas: &mut RgbaImage, x: i32, y: i32, color: Color) {
    if x < 0 || y < 0 || x >= canvas.width() as i32 || y >= canvas.height() as i32 {
        return;
    }
    let a = u32::from(color.a());
    if a == 0 {
        return;
    }

    let dst = canvas.get_pixel_mut(x as u32, y as u32);
    let blend = |src: u8, bg: u8| -> u8 {
        ((u32::from(src) * a + u32::from(bg) * (255 - a)) / 255) as u8
    };
    *dst = Rgba([
        blend(color.r(), dst[0]),
        blend(color.g(), dst[1]),
        blend(color.b(), dst[2]),
        (a + (u32::from(dst[3]) * (255 - a)) / 255).min(255) as u8,
    ]);
}
