//! Time-series chart of the rolling window.
//!
//! Zero-rate samples are gaps, not data: they are dropped before plotting.
//! The remaining samples are drawn as one connected line in arrival order
//! onto a square canvas and encoded as PNG.

pub mod ticks;

use crate::core::StampedRate;
use ab_glyph::{FontRef, PxScale};
use chrono::{FixedOffset, Local, Offset};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect;

/// Canvas edge length in pixels (7in at 100 dpi).
pub const CHART_SIZE: u32 = 700;
/// Upper bound on major ticks per axis.
pub const MAX_TICKS: usize = 4;

/// DejaVu Sans, see `assets/fonts/LICENSE-DejaVu`.
const LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const MARGIN_LEFT: i32 = 90;
const MARGIN_RIGHT: i32 = 30;
const MARGIN_TOP: i32 = 30;
const MARGIN_BOTTOM: i32 = 70;
const TICK_LENGTH: u32 = 6;
const LABEL_SCALE: f32 = 18.0;
const LABEL_GAP: i32 = 6;
const LINE_WIDTH: i32 = 2;
const DATA_MARGIN: f64 = 0.05;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const FOREGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const SERIES: Rgb<u8> = Rgb([31, 119, 180]);

/// Chart rendering errors.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Label font could not be loaded: {0}")]
    Font(#[from] ab_glyph::InvalidFont),
}

/// Timezone used for the `HH:MM` x-axis labels.
#[derive(Debug, Clone, Copy, Default)]
pub enum LabelTimezone {
    /// The host's local time at the start of the plotted range
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl LabelTimezone {
    fn offset_at(&self, timestamp: f64) -> FixedOffset {
        match self {
            LabelTimezone::Fixed(offset) => *offset,
            LabelTimezone::Local => StampedRate::new(timestamp, 0)
                .datetime_in(&Local)
                .map(|dt| dt.offset().fix())
                .unwrap_or_else(|| Local::now().offset().fix()),
        }
    }
}

/// Renders a snapshot of the window into PNG bytes.
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    timezone: LabelTimezone,
}

/// Value range of one axis after padding.
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisRange {
    min: f64,
    max: f64,
}

impl AxisRange {
    fn padded(min: f64, max: f64, widen_by: f64) -> Self {
        let (min, max) = if max > min {
            (min, max)
        } else {
            (min - widen_by, max + widen_by)
        };
        let margin = (max - min) * DATA_MARGIN;
        Self {
            min: min - margin,
            max: max + margin,
        }
    }

    /// Fraction of the way from `min` to `max`.
    fn fraction(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }
}

/// Pixel rectangle the data is drawn into.
#[derive(Debug, Clone, Copy)]
struct PlotArea {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl PlotArea {
    fn for_canvas(size: u32) -> Self {
        let size = size as i32;
        Self {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            right: size - MARGIN_RIGHT,
            bottom: size - MARGIN_BOTTOM,
        }
    }

    fn width(&self) -> u32 {
        (self.right - self.left + 1) as u32
    }

    fn height(&self) -> u32 {
        (self.bottom - self.top + 1) as u32
    }

    fn x(&self, range: &AxisRange, value: f64) -> i32 {
        self.left + (range.fraction(value) * f64::from(self.right - self.left)).round() as i32
    }

    fn y(&self, range: &AxisRange, value: f64) -> i32 {
        self.bottom - (range.fraction(value) * f64::from(self.bottom - self.top)).round() as i32
    }
}

impl ChartRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the time axis in a fixed offset instead of local time.
    pub fn with_timezone(timezone: LabelTimezone) -> Self {
        Self { timezone }
    }

    /// The samples that end up on the chart, in arrival order.
    ///
    /// Zero rates are gaps; samples whose timestamp is not finite cannot be
    /// placed on the time axis and are dropped too.
    pub fn plotted_points(window: &[StampedRate]) -> Vec<StampedRate> {
        window
            .iter()
            .filter(|sample| sample.has_reading() && sample.timestamp.is_finite())
            .copied()
            .collect()
    }

    /// Render the window as PNG, or return an empty buffer when there is
    /// nothing to plot.
    pub fn build(&self, window: &[StampedRate]) -> Result<Vec<u8>, RenderError> {
        let points = Self::plotted_points(window);
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let image = self.draw(&points)?;

        let mut buf = Vec::new();
        PngEncoder::new(&mut buf).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )?;

        tracing::debug!(
            points = points.len(),
            bytes = buf.len(),
            "Rendered heart-rate chart"
        );
        Ok(buf)
    }

    fn draw(&self, points: &[StampedRate]) -> Result<RgbImage, RenderError> {
        let font = FontRef::try_from_slice(LABEL_FONT)?;
        let mut image = RgbImage::from_pixel(CHART_SIZE, CHART_SIZE, BACKGROUND);
        let area = PlotArea::for_canvas(CHART_SIZE);

        let (t_min, t_max) = min_max(points.iter().map(|p| p.timestamp));
        let (r_min, r_max) = min_max(points.iter().map(|p| f64::from(p.rate)));
        let x_range = AxisRange::padded(t_min, t_max, 60.0);
        let y_range = AxisRange::padded(r_min, r_max, 5.0);

        let offset = self.timezone.offset_at(t_min);
        draw_x_axis(&mut image, &font, &area, &x_range, offset);
        draw_y_axis(&mut image, &font, &area, &y_range);
        draw_frame(&mut image, &area);

        let pixels: Vec<(f32, f32)> = points
            .iter()
            .map(|p| {
                (
                    area.x(&x_range, p.timestamp) as f32,
                    area.y(&y_range, f64::from(p.rate)) as f32,
                )
            })
            .collect();

        match pixels.as_slice() {
            [(x, y)] => {
                draw_filled_circle_mut(&mut image, (*x as i32, *y as i32), LINE_WIDTH, SERIES)
            }
            _ => {
                for pair in pixels.windows(2) {
                    draw_series_segment(&mut image, pair[0], pair[1]);
                }
            }
        }

        Ok(image)
    }
}

fn draw_x_axis(
    image: &mut RgbImage,
    font: &FontRef<'_>,
    area: &PlotArea,
    range: &AxisRange,
    offset: FixedOffset,
) {
    let scale = PxScale::from(LABEL_SCALE);
    for tick in ticks::time_ticks(range.min, range.max, MAX_TICKS, offset.local_minus_utc()) {
        let x = area.x(range, tick);
        draw_filled_rect_mut(
            image,
            Rect::at(x, area.bottom).of_size(1, TICK_LENGTH),
            FOREGROUND,
        );

        let label = StampedRate::new(tick, 0)
            .datetime_in(&offset)
            .map(|dt| dt.format("%H:%M").to_string())
            .unwrap_or_default();
        let (w, _) = text_size(scale, font, &label);
        draw_text_mut(
            image,
            FOREGROUND,
            x - w as i32 / 2,
            area.bottom + TICK_LENGTH as i32 + LABEL_GAP,
            scale,
            font,
            &label,
        );
    }
}

fn draw_y_axis(image: &mut RgbImage, font: &FontRef<'_>, area: &PlotArea, range: &AxisRange) {
    let scale = PxScale::from(LABEL_SCALE);
    for tick in ticks::linear_ticks(range.min, range.max, MAX_TICKS) {
        let y = area.y(range, tick);
        draw_filled_rect_mut(
            image,
            Rect::at(area.left - TICK_LENGTH as i32, y).of_size(TICK_LENGTH, 1),
            FOREGROUND,
        );

        let label = format!("{}", tick.round() as i64);
        let (w, h) = text_size(scale, font, &label);
        draw_text_mut(
            image,
            FOREGROUND,
            area.left - TICK_LENGTH as i32 - LABEL_GAP - w as i32,
            y - h as i32 / 2,
            scale,
            font,
            &label,
        );
    }
}

fn draw_frame(image: &mut RgbImage, area: &PlotArea) {
    let (width, height) = (area.width(), area.height());
    for edge in [
        Rect::at(area.left, area.top).of_size(width, 1),
        Rect::at(area.left, area.bottom).of_size(width, 1),
        Rect::at(area.left, area.top).of_size(1, height),
        Rect::at(area.right, area.top).of_size(1, height),
    ] {
        draw_filled_rect_mut(image, edge, FOREGROUND);
    }
}

/// One leg of the series line, `LINE_WIDTH` pixels thick.
fn draw_series_segment(image: &mut RgbImage, from: (f32, f32), to: (f32, f32)) {
    for d in 0..LINE_WIDTH {
        let d = d as f32;
        draw_line_segment_mut(image, (from.0 + d, from.1), (to.0 + d, to.1), SERIES);
        draw_line_segment_mut(image, (from.0, from.1 + d), (to.0, to.1 + d), SERIES);
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn utc_renderer() -> ChartRenderer {
        ChartRenderer::with_timezone(LabelTimezone::Fixed(FixedOffset::east_opt(0).unwrap()))
    }

    fn has_ink(image: &RgbImage, xs: std::ops::Range<u32>, ys: std::ops::Range<u32>) -> bool {
        ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
            .any(|(x, y)| *image.get_pixel(x, y) != BACKGROUND)
    }

    #[test]
    fn test_empty_window_renders_nothing() {
        let bytes = utc_renderer().build(&[]).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_all_zero_window_renders_nothing() {
        let window: Vec<StampedRate> = (0..50).map(|i| StampedRate::new(i as f64, 0)).collect();
        assert!(utc_renderer().build(&window).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rates_are_excluded() {
        let window = vec![
            StampedRate::new(100.0, 70),
            StampedRate::new(101.0, 72),
            StampedRate::new(102.0, 0),
        ];
        let points = ChartRenderer::plotted_points(&window);
        assert_eq!(points.len(), 2);
        assert!(points.iter().all(|p| p.rate != 0));
    }

    #[test]
    fn test_label_font_loads() {
        assert!(FontRef::try_from_slice(LABEL_FONT).is_ok());
    }

    #[test]
    fn test_render_produces_png() {
        let window: Vec<StampedRate> = (0..120)
            .map(|i| StampedRate::new(1_700_000_000.0 + i as f64 * 5.0, 60 + (i % 30) as u32))
            .collect();
        let bytes = utc_renderer().build(&window).unwrap();

        assert!(bytes.len() > PNG_SIGNATURE.len());
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), CHART_SIZE);
        assert_eq!(decoded.height(), CHART_SIZE);
    }

    #[test]
    fn test_single_point_is_drawn() {
        let window = vec![StampedRate::new(1_700_000_000.0, 75)];
        let renderer = utc_renderer();
        let image = renderer.draw(&ChartRenderer::plotted_points(&window)).unwrap();

        // Zero-span axes are widened symmetrically, so the point sits mid-plot.
        let area = PlotArea::for_canvas(CHART_SIZE);
        let cx = (area.left + area.right) / 2;
        let cy = (area.top + area.bottom) / 2;
        assert_eq!(*image.get_pixel(cx as u32, cy as u32), SERIES);
    }

    #[test]
    fn test_line_connects_points() {
        let window = vec![
            StampedRate::new(1_700_000_000.0, 70),
            StampedRate::new(1_700_000_600.0, 70),
        ];
        let image = utc_renderer().draw(&window).unwrap();

        // Equal rates give a horizontal line through the middle of the plot.
        let area = PlotArea::for_canvas(CHART_SIZE);
        let x_range = AxisRange::padded(1_700_000_000.0, 1_700_000_600.0, 60.0);
        let start = area.x(&x_range, 1_700_000_000.0);
        let end = area.x(&x_range, 1_700_000_600.0);
        let y = (area.top + area.bottom) / 2;

        assert_eq!(*image.get_pixel(((start + end) / 2) as u32, y as u32), SERIES);
        assert_eq!(*image.get_pixel((start + 10) as u32, y as u32), SERIES);
        assert_ne!(*image.get_pixel(((start + end) / 2) as u32, (y - 40) as u32), SERIES);
    }

    #[test]
    fn test_axis_labels_are_drawn_outside_the_plot() {
        let window: Vec<StampedRate> = (0..60)
            .map(|i| StampedRate::new(36_000.0 + i as f64 * 5.0, 60 + i as u32))
            .collect();
        let image = utc_renderer().draw(&window).unwrap();
        let area = PlotArea::for_canvas(CHART_SIZE);

        // Time labels below the x axis.
        let below = (area.bottom as u32 + TICK_LENGTH + 1)..CHART_SIZE;
        assert!(has_ink(&image, area.left as u32..area.right as u32, below));

        // Rate labels left of the y axis.
        let left = 0..(area.left as u32 - TICK_LENGTH - 1);
        assert!(has_ink(&image, left, area.top as u32..area.bottom as u32));
    }

    #[test]
    fn test_axis_range_padding() {
        let range = AxisRange::padded(60.0, 100.0, 5.0);
        assert_eq!(range, AxisRange { min: 58.0, max: 102.0 });

        let flat = AxisRange::padded(70.0, 70.0, 5.0);
        assert_eq!(flat, AxisRange { min: 64.5, max: 75.5 });
    }
}
