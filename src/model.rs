//! Defines the core data structures used by the presentation engine.
//!
//! A [`Slide`] is an immutable composition of an optional background component
//! plus an ordered list of foreground components. Slides are deserialized from
//! JSON decks (see the demo binary) or built directly in code, then handed to
//! the surface behind an `Arc` so the surface never mutates what it displays.

use std::fmt;

use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::errors::PresentationError;
use crate::media_player::PlayerConfig;

/// Target pixel size of a surface or slide.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either side is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in slide (or surface) pixel coordinates.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle anchored at the origin covering `dimensions`.
    pub const fn covering(dimensions: Dimensions) -> Self {
        Self::new(0, 0, dimensions.width, dimensions.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && (self.x as i64) < other.right()
            && (other.x as i64) < self.right()
            && (self.y as i64) < other.bottom()
            && (other.y as i64) < self.bottom()
    }

    /// Scales the rectangle from slide space into surface space.
    pub fn scaled(&self, sx: f32, sy: f32) -> Rect {
        let x0 = (self.x as f32 * sx).round();
        let y0 = (self.y as f32 * sy).round();
        let x1 = ((self.x as f32 + self.width as f32) * sx).round();
        let y1 = ((self.y as f32 + self.height as f32) * sy).round();
        Rect {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0).max(0.0) as u32,
            height: (y1 - y0).max(0.0) as u32,
        }
    }
}

/// A straight-alpha RGBA color. Deserializes from `#RRGGBB` or `#RRGGBBAA`.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses a hex color string such as `#FFFFFF` or `#00000080`.
    pub fn from_hex(hex: &str) -> Result<Self, String> {
        let digits = hex.trim().trim_start_matches('#');
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return Err(format!("expected #RRGGBB or #RRGGBBAA, got '{}'", hex));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("bad hex channel in '{}': {}", hex, e))
        };
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Ok(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a })
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value)
    }
}

/// Identifies a media resource (file path or synthetic source URI).
///
/// Two components reference "the same media" exactly when their `MediaRef`s
/// are equal; this is what background continuity keys on.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of playback session a component needs. Images are static and
/// never get a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Text content and its raw styling attributes.
///
/// Styling values are kept as strings and resolved by the text renderer, which
/// falls back to defaults (with a warning) for anything it cannot parse.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TextBox {
    /// The text to draw. `{datetime}` is replaced with the current local time.
    #[serde(default)]
    pub text: String,
    /// Hex color for the glyphs (e.g. `#FFFFFF`).
    pub text_color: Option<String>,
    /// `small`, `medium` or `large`.
    pub text_size: Option<String>,
    /// Anchor inside the component bounds, e.g. `bottom-center`, `top-left`.
    pub text_position: Option<String>,
    /// Hex color for a box drawn behind the text.
    pub text_background_color: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ShapeFill {
    pub fill: Color,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ImageSource {
    pub source: MediaRef,
}

/// A playable media reference plus its playback configuration.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct MediaSource {
    pub source: MediaRef,
    #[serde(default, rename = "loop")]
    pub looped: bool,
    #[serde(default)]
    pub muted: bool,
    /// Drawn when no decoded frame is available (player missing or starved).
    pub poster: Option<Color>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct DateTimeText {
    /// A chrono `strftime` pattern.
    #[serde(default = "default_datetime_format")]
    pub format: String,
    #[serde(flatten)]
    pub style: TextBox,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct CountdownText {
    /// The instant the countdown reaches zero.
    pub target: DateTime<Local>,
    #[serde(flatten)]
    pub style: TextBox,
}

fn default_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_opacity() -> f32 {
    1.0
}

/// The closed set of component kinds the renderer knows how to draw.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    Shape(ShapeFill),
    Text(TextBox),
    Image(ImageSource),
    Video(MediaSource),
    Audio(MediaSource),
    DateTime(DateTimeText),
    Countdown(CountdownText),
}

/// One renderable element of a slide.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Component {
    pub id: String,
    pub bounds: Rect,
    /// Stacking order; higher is drawn later. Ties keep declaration order.
    #[serde(default)]
    pub z: i32,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(flatten)]
    pub kind: ComponentKind,
}

impl Component {
    pub fn new(id: impl Into<String>, bounds: Rect, kind: ComponentKind) -> Self {
        Self { id: id.into(), bounds, z: 0, opacity: 1.0, kind }
    }

    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// The playback session kind this component needs, if any.
    pub fn media_kind(&self) -> Option<MediaKind> {
        match &self.kind {
            ComponentKind::Video(_) => Some(MediaKind::Video),
            ComponentKind::Audio(_) => Some(MediaKind::Audio),
            _ => None,
        }
    }

    /// The playable source and its configuration, for video and audio components.
    pub fn media_source(&self) -> Option<&MediaSource> {
        match &self.kind {
            ComponentKind::Video(m) | ComponentKind::Audio(m) => Some(m),
            _ => None,
        }
    }

    pub fn player_config(&self) -> Option<PlayerConfig> {
        self.media_source().map(|m| PlayerConfig { looped: m.looped, muted: m.muted })
    }

    /// True if the component's pixels change over time without a new slide
    /// (clocks, countdowns, `{datetime}` text).
    pub fn is_auto_updating(&self) -> bool {
        match &self.kind {
            ComponentKind::DateTime(_) | ComponentKind::Countdown(_) => true,
            ComponentKind::Text(t) => t.text.contains("{datetime}"),
            _ => false,
        }
    }

    /// True if this component and `other` show the same media resource with
    /// the same kind (video/video or image/image).
    pub fn shares_media_with(&self, other: &Component) -> bool {
        match (&self.kind, &other.kind) {
            (ComponentKind::Video(a), ComponentKind::Video(b)) => a.source == b.source,
            (ComponentKind::Image(a), ComponentKind::Image(b)) => a.source == b.source,
            _ => false,
        }
    }
}

/// An immutable composition of a background plus ordered components.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Slide {
    pub name: String,
    /// Design width; components are positioned in this coordinate space.
    pub width: u32,
    /// Design height.
    pub height: u32,
    #[serde(default)]
    pub background: Option<Component>,
    #[serde(default)]
    pub components: Vec<Component>,
}

impl Slide {
    pub fn new(name: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            name: name.into(),
            width: dimensions.width,
            height: dimensions.height,
            background: None,
            components: Vec::new(),
        }
    }

    pub fn with_background(mut self, background: Component) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Rejects slides that cannot be rendered at all.
    #[must_use = "slide validation can fail; the Result must be handled"]
    pub fn validate(&self) -> Result<(), PresentationError> {
        if self.dimensions().is_empty() {
            return Err(PresentationError::InvalidSlide(format!(
                "slide '{}' has empty design size {}",
                self.name,
                self.dimensions()
            )));
        }
        Ok(())
    }

    /// Foreground components sorted by `z`, declaration order breaking ties.
    pub fn ordered_components(&self) -> Vec<&Component> {
        let mut ordered: Vec<&Component> = self.components.iter().collect();
        ordered.sort_by_key(|c| c.z);
        ordered
    }

    pub fn has_auto_updating(&self) -> bool {
        self.background.iter().chain(self.components.iter()).any(Component::is_auto_updating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Color::from_hex("#FF0080").unwrap(), Color::rgb(255, 0, 128));
        assert_eq!(Color::from_hex("00000080").unwrap(), Color::rgba(0, 0, 0, 128));
        assert!(Color::from_hex("#FFF").is_err());
        assert!(Color::from_hex("#GG0000").is_err());
    }

    #[test]
    fn rect_intersection_and_scaling() {
        let a = Rect::new(0, 0, 10, 10);
        assert!(a.intersects(&Rect::new(9, 9, 5, 5)));
        assert!(!a.intersects(&Rect::new(10, 0, 5, 5)));
        assert!(!a.intersects(&Rect::new(0, 0, 0, 5)));
        assert_eq!(Rect::new(10, 20, 30, 40).scaled(2.0, 0.5), Rect::new(20, 10, 60, 20));
    }

    #[test]
    fn deserializes_slide_from_json() {
        let json = r##"{
            "name": "welcome",
            "width": 1920,
            "height": 1080,
            "background": {
                "id": "bg", "type": "video",
                "bounds": {"x": 0, "y": 0, "width": 1920, "height": 1080},
                "source": "synthetic:waves", "loop": true, "muted": true
            },
            "components": [
                {"id": "title", "type": "text", "z": 2,
                 "bounds": {"x": 100, "y": 100, "width": 800, "height": 200},
                 "text": "Welcome {datetime}", "text_color": "#FFFFFF"},
                {"id": "box", "type": "shape", "opacity": 0.5,
                 "bounds": {"x": 0, "y": 900, "width": 1920, "height": 180},
                 "fill": "#00000080"}
            ]
        }"##;
        let slide: Slide = serde_json::from_str(json).expect("deck json should parse");
        assert_eq!(slide.dimensions(), Dimensions::new(1920, 1080));
        let bg = slide.background.as_ref().expect("background present");
        assert_eq!(bg.media_kind(), Some(MediaKind::Video));
        assert_eq!(bg.player_config(), Some(PlayerConfig { looped: true, muted: true }));
        assert!(slide.has_auto_updating());
        let ordered: Vec<&str> = slide.ordered_components().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ordered, vec!["box", "title"]);
    }

    #[test]
    fn media_sharing_requires_same_kind_and_source() {
        let video = |src: &str| {
            Component::new(
                "v",
                Rect::new(0, 0, 1, 1),
                ComponentKind::Video(MediaSource {
                    source: MediaRef::new(src),
                    looped: false,
                    muted: false,
                    poster: None,
                }),
            )
        };
        let image = Component::new(
            "i",
            Rect::new(0, 0, 1, 1),
            ComponentKind::Image(ImageSource { source: MediaRef::new("a.mp4") }),
        );
        assert!(video("a.mp4").shares_media_with(&video("a.mp4")));
        assert!(!video("a.mp4").shares_media_with(&video("b.mp4")));
        assert!(!video("a.mp4").shares_media_with(&image));
    }

    #[test]
    fn empty_slide_is_rejected() {
        let slide = Slide::new("empty", Dimensions::new(0, 1080));
        assert!(matches!(slide.validate(), Err(PresentationError::InvalidSlide(_))));
    }
}
