//! Handles parsing of text component properties and rasterizing text into a
//! pixel buffer.
//!
//! This module resolves the raw string attributes of a [`TextBox`] (color,
//! size, position) into a `TextStyle` and `TextLayout`, substitutes dynamic
//! content (`{datetime}`, date/time formats, countdowns) from the surface's
//! clock, and draws the result with a small built-in bitmap font. The font
//! covers digits and common clock punctuation exactly; any other printable
//! character is drawn as a box so that text still occupies its space.

use chrono::{DateTime, Local};
use log::{debug, trace, warn};

use crate::model::{Color, ComponentKind, Rect, TextBox};
use crate::pixel_buffer::PixelBuffer;

const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
/// A glyph cell is the glyph plus one dot of spacing on the right and two
/// below, so a line is seven dots tall.
const CELL_DOTS_X: u32 = GLYPH_WIDTH + 1;
const LINE_DOTS: u32 = GLYPH_HEIGHT + 2;

// --- Text Properties Structs ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Min,
    Center,
    Max,
}

/// Defines the visual style of a piece of text to be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// Line height in slide units.
    pub line_height: f32,
    pub color: Color,
    pub background_color: Option<Color>,
}

/// Defines the layout and content of a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub h_align: Align,
    pub v_align: Align,
    /// Padding around the text within the component bounds, in slide units.
    pub padding: f32,
    /// The text to draw, after dynamic substitution.
    pub text_content: String,
}

// --- Parsing Functions ---

/// Resolves the string attributes of a text box into style and layout.
///
/// Unknown or malformed attributes fall back to defaults with a warning:
/// white text, no background, medium size, bottom-center.
pub fn parse_text_properties(component_id: &str, text: &TextBox, text_content: String) -> (TextStyle, TextLayout) {
    let text_size = text.text_size.as_deref().unwrap_or("medium");
    let line_height = match text_size {
        "small" => 14.0,
        "medium" => 24.0,
        "large" => 36.0,
        other => {
            warn!("Invalid text_size '{}' for component '{}', defaulting to medium.", other, component_id);
            24.0
        }
    };

    let color_hex = text.text_color.as_deref().unwrap_or("#FFFFFF");
    let color = Color::from_hex(color_hex).unwrap_or_else(|e| {
        warn!("Invalid text_color '{}' for component '{}', defaulting to white: {}", color_hex, component_id, e);
        Color::WHITE
    });

    let background_color = text.text_background_color.as_deref().and_then(|hex| {
        if hex.trim().is_empty() {
            None
        } else {
            Color::from_hex(hex)
                .map_err(|e| {
                    warn!("Invalid text_background_color '{}' for component '{}', ignoring: {}", hex, component_id, e);
                })
                .ok()
        }
    });

    let text_position = text.text_position.as_deref().unwrap_or("bottom-center");
    let (h_align, v_align) = match text_position {
        "top-left" => (Align::Min, Align::Min),
        "top-center" => (Align::Center, Align::Min),
        "top-right" => (Align::Max, Align::Min),
        "center-left" => (Align::Min, Align::Center),
        "center" | "center-center" => (Align::Center, Align::Center),
        "center-right" => (Align::Max, Align::Center),
        "bottom-left" => (Align::Min, Align::Max),
        "bottom-center" => (Align::Center, Align::Max),
        "bottom-right" => (Align::Max, Align::Max),
        invalid => {
            warn!("Invalid text_position '{}' for component '{}', defaulting to bottom-center.", invalid, component_id);
            (Align::Center, Align::Max)
        }
    };

    let style = TextStyle { line_height, color, background_color };
    let layout = TextLayout { h_align, v_align, padding: 10.0, text_content };
    trace!("Parsed text for component '{}': {:?} {:?}", component_id, style, layout);
    (style, layout)
}

/// Produces the text a component shows at wall-clock time `now`, or `None`
/// for component kinds that carry no text.
pub fn resolve_text(kind: &ComponentKind, now: DateTime<Local>) -> Option<(&TextBox, String)> {
    match kind {
        ComponentKind::Text(text) => {
            let mut content = text.text.clone();
            if content.contains("{datetime}") {
                let formatted = now.format("%Y-%m-%d %H:%M:%S").to_string();
                content = content.replace("{datetime}", &formatted);
            }
            Some((text, content))
        }
        ComponentKind::DateTime(dt) => Some((&dt.style, now.format(&dt.format).to_string())),
        ComponentKind::Countdown(countdown) => Some((&countdown.style, format_countdown(countdown.target - now))),
        _ => None,
    }
}

/// Formats a remaining duration as `HH:MM:SS`, clamped at zero. Hours are
/// not wrapped, so a countdown more than a day out shows e.g. `49:00:00`.
pub fn format_countdown(remaining: chrono::Duration) -> String {
    let total = remaining.num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

// --- Rasterizing ---

/// Pixel size of a text run at the given dot size.
pub fn measure(text: &str, dot: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    if chars == 0 {
        return (0, 0);
    }
    // no trailing spacing after the last glyph
    (chars * CELL_DOTS_X * dot - dot, GLYPH_HEIGHT * dot)
}

/// Draws text into `area` (already in surface pixels). `scale` maps slide
/// units to surface pixels for the line height and padding.
pub fn draw_text(
    buffer: &mut PixelBuffer,
    area: Rect,
    style: &TextStyle,
    layout: &TextLayout,
    scale: f32,
    opacity: f32,
) {
    if layout.text_content.trim().is_empty() || area.is_empty() {
        return;
    }
    let dot = ((style.line_height * scale) / LINE_DOTS as f32).round().max(1.0) as u32;
    let padding = (layout.padding * scale).round() as i64;
    let (text_w, text_h) = measure(&layout.text_content, dot);

    let x = match layout.h_align {
        Align::Min => area.x as i64 + padding,
        Align::Center => area.x as i64 + (area.width as i64 - text_w as i64) / 2,
        Align::Max => area.right() - text_w as i64 - padding,
    };
    let y = match layout.v_align {
        Align::Min => area.y as i64 + padding,
        Align::Center => area.y as i64 + (area.height as i64 - text_h as i64) / 2,
        Align::Max => area.bottom() - text_h as i64 - padding,
    };

    if let Some(bg) = style.background_color {
        let half = (padding / 2).max(1);
        let bg_rect = Rect::new(
            (x - half) as i32,
            (y - half) as i32,
            (text_w as i64 + 2 * half) as u32,
            (text_h as i64 + 2 * half) as u32,
        );
        fill_clipped(buffer, bg_rect, area, bg, opacity);
    }

    let mut pen_x = x;
    for ch in layout.text_content.chars() {
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b100 >> col) == 0 {
                    continue;
                }
                let dot_rect = Rect::new(
                    (pen_x + (col * dot) as i64) as i32,
                    (y + row as i64 * dot as i64) as i32,
                    dot,
                    dot,
                );
                fill_clipped(buffer, dot_rect, area, style.color, opacity);
            }
        }
        pen_x += (CELL_DOTS_X * dot) as i64;
    }
    debug!("Drew text '{}' at ({}, {}) dot={}", layout.text_content, x, y, dot);
}

fn fill_clipped(buffer: &mut PixelBuffer, rect: Rect, clip: Rect, color: Color, opacity: f32) {
    let x0 = (rect.x as i64).max(clip.x as i64);
    let y0 = (rect.y as i64).max(clip.y as i64);
    let x1 = rect.right().min(clip.right());
    let y1 = rect.bottom().min(clip.bottom());
    if x0 < x1 && y0 < y1 {
        buffer.fill_rect(Rect::new(x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32), color, opacity);
    }
}

/// 3x5 glyph rows, most significant of the low three bits is the left column.
fn glyph(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b010, 0b010, 0b010],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        c if c.is_whitespace() => [0; 5],
        _ => [0b111, 0b101, 0b101, 0b101, 0b111],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CountdownText, DateTimeText, Dimensions};
    use chrono::TimeZone;

    fn text_box(text: &str) -> TextBox {
        TextBox { text: text.to_string(), ..TextBox::default() }
    }

    #[test]
    fn defaults_apply_for_missing_and_invalid_attributes() {
        let mut tb = text_box("hi");
        tb.text_color = Some("not-a-color".into());
        tb.text_position = Some("somewhere".into());
        let (style, layout) = parse_text_properties("t", &tb, "hi".into());
        assert_eq!(style.color, Color::WHITE);
        assert_eq!(style.line_height, 24.0);
        assert_eq!((layout.h_align, layout.v_align), (Align::Center, Align::Max));
    }

    #[test]
    fn position_and_size_are_parsed() {
        let mut tb = text_box("hi");
        tb.text_position = Some("top-right".into());
        tb.text_size = Some("large".into());
        tb.text_background_color = Some("#00000080".into());
        let (style, layout) = parse_text_properties("t", &tb, "hi".into());
        assert_eq!((layout.h_align, layout.v_align), (Align::Max, Align::Min));
        assert_eq!(style.line_height, 36.0);
        assert_eq!(style.background_color, Some(Color::rgba(0, 0, 0, 128)));
    }

    #[test]
    fn countdown_is_clamped_and_formatted() {
        assert_eq!(format_countdown(chrono::Duration::seconds(3_725)), "01:02:05");
        assert_eq!(format_countdown(chrono::Duration::seconds(-5)), "00:00:00");
        assert_eq!(format_countdown(chrono::Duration::hours(49)), "49:00:00");
    }

    #[test]
    fn dynamic_text_follows_the_clock() {
        let now = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().expect("valid local time");
        let datetime = ComponentKind::DateTime(DateTimeText { format: "%H:%M".into(), style: TextBox::default() });
        assert_eq!(resolve_text(&datetime, now).map(|(_, s)| s), Some("12:00".to_string()));

        let countdown = ComponentKind::Countdown(CountdownText {
            target: now + chrono::Duration::seconds(90),
            style: TextBox::default(),
        });
        assert_eq!(resolve_text(&countdown, now).map(|(_, s)| s), Some("00:01:30".to_string()));

        let text = ComponentKind::Text(text_box("at {datetime}"));
        assert_eq!(resolve_text(&text, now).map(|(_, s)| s), Some("at 2024-03-01 12:00:00".to_string()));
    }

    #[test]
    fn different_digits_produce_different_pixels() {
        let area = Rect::new(0, 0, 64, 16);
        let draw = |content: &str| {
            let mut buffer = PixelBuffer::new(Dimensions::new(64, 16));
            let (style, layout) = parse_text_properties("t", &text_box(content), content.to_string());
            draw_text(&mut buffer, area, &style, &layout, 0.5, 1.0);
            buffer
        };
        let a = draw("00:01");
        let b = draw("00:02");
        assert!(!a.is_blank());
        assert_ne!(a, b);
    }

    #[test]
    fn text_is_clipped_to_its_area() {
        let mut buffer = PixelBuffer::new(Dimensions::new(40, 40));
        let (style, layout) = parse_text_properties("t", &text_box("88888888"), "88888888".into());
        draw_text(&mut buffer, Rect::new(0, 0, 10, 40), &style, &layout, 1.0, 1.0);
        for y in 0..40 {
            for x in 10..40 {
                assert_eq!(buffer.pixel(x, y)[3], 0);
            }
        }
    }
}
