//! Draws a [`Slide`] into an off-screen [`PixelBuffer`].
//!
//! Slides are authored in their own design coordinate space; the renderer
//! scales every component's bounds to the target buffer's dimensions. Each
//! component is drawn independently: a missing image or a video without a
//! decoded frame degrades to a fallback for that component only and never
//! aborts the rest of the slide.

use std::sync::Arc;

use chrono::{DateTime, Local};
use image::RgbaImage;
use log::{trace, warn};

use crate::errors::MediaError;
use crate::media_cache::MediaCache;
use crate::model::{Component, ComponentKind, MediaKind, Rect, Slide};
use crate::pixel_buffer::PixelBuffer;
use crate::text_renderer;

/// Supplies the most recent decoded frame for a video component.
pub trait FrameSource {
    fn frame_for(&self, component_id: &str) -> Option<Arc<RgbaImage>>;
}

/// No playing media; video components fall back to their poster.
pub struct NoFrames;

impl FrameSource for NoFrames {
    fn frame_for(&self, _component_id: &str) -> Option<Arc<RgbaImage>> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Draw the slide's background layer. Off while a continuing background
    /// is drawn separately underneath the transition.
    pub include_background: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { include_background: true }
    }
}

#[derive(Debug)]
pub struct SlideRenderer {
    cache: MediaCache,
}

impl SlideRenderer {
    pub fn new(cache: MediaCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut MediaCache {
        &mut self.cache
    }

    /// Blanks `buffer` and draws `slide` into it.
    pub fn render(
        &mut self,
        slide: &Slide,
        buffer: &mut PixelBuffer,
        options: RenderOptions,
        frames: &dyn FrameSource,
        now: DateTime<Local>,
    ) {
        buffer.clear();
        trace!(
            "Rendering slide '{}' into {} (background: {})",
            slide.name,
            buffer.dimensions(),
            options.include_background
        );
        if options.include_background {
            self.draw_background(slide, buffer, frames, now);
        }
        for component in slide.ordered_components() {
            if is_visible(slide, component) {
                self.draw_component(slide, component, buffer, frames, now);
            }
        }
    }

    /// Draws only the background layer of `slide` over `buffer`'s content.
    pub fn draw_background(
        &mut self,
        slide: &Slide,
        buffer: &mut PixelBuffer,
        frames: &dyn FrameSource,
        now: DateTime<Local>,
    ) {
        if let Some(background) = &slide.background {
            if is_visible(slide, background) {
                self.draw_component(slide, background, buffer, frames, now);
            }
        }
    }

    fn draw_component(
        &mut self,
        slide: &Slide,
        component: &Component,
        buffer: &mut PixelBuffer,
        frames: &dyn FrameSource,
        now: DateTime<Local>,
    ) {
        let sx = buffer.width() as f32 / slide.width as f32;
        let sy = buffer.height() as f32 / slide.height as f32;
        let area = component.bounds.scaled(sx, sy);
        if area.is_empty() {
            return;
        }
        let opacity = component.opacity.clamp(0.0, 1.0);
        match &component.kind {
            ComponentKind::Shape(shape) => buffer.fill_rect(area, shape.fill, opacity),
            ComponentKind::Text(_) | ComponentKind::DateTime(_) | ComponentKind::Countdown(_) => {
                if let Some((text_box, content)) = text_renderer::resolve_text(&component.kind, now) {
                    let (style, layout) = text_renderer::parse_text_properties(&component.id, text_box, content);
                    text_renderer::draw_text(buffer, area, &style, &layout, sy, opacity);
                }
            }
            ComponentKind::Image(image) => match self.cache.get_or_load(&image.source) {
                Ok(still) => buffer.draw_image(&still, calculate_draw_rect(still.width(), still.height(), area), opacity),
                Err(e @ MediaError::Unavailable(_)) => trace!("Image component '{}' not drawn: {}", component.id, e),
                Err(e) => warn!("Image component '{}' not drawn: {}", component.id, e),
            },
            ComponentKind::Video(video) => match frames.frame_for(&component.id) {
                Some(frame) => {
                    buffer.draw_image(&frame, calculate_draw_rect(frame.width(), frame.height(), area), opacity)
                }
                None => {
                    if let Some(poster) = video.poster {
                        buffer.fill_rect(area, poster, opacity);
                    }
                    trace!("No frame yet for video component '{}'", component.id);
                }
            },
            ComponentKind::Audio(_) => {}
        }
    }
}

/// True if any pixel of `component` can end up on screen.
pub fn is_visible(slide: &Slide, component: &Component) -> bool {
    component.opacity > 0.0
        && !component.bounds.is_empty()
        && component.bounds.intersects(&Rect::covering(slide.dimensions()))
}

/// True if the component needs a playback session while its slide is shown.
/// Audio has no visual footprint and always plays.
pub fn should_play(slide: &Slide, component: &Component) -> bool {
    match component.media_kind() {
        Some(MediaKind::Audio) => true,
        Some(MediaKind::Video) => is_visible(slide, component),
        None => false,
    }
}

/// Fits media of the given size into `area`, preserving aspect ratio and
/// centering the result.
fn calculate_draw_rect(media_width: u32, media_height: u32, area: Rect) -> Rect {
    if media_width == 0 || media_height == 0 {
        return area;
    }
    let aspect_ratio = media_width as f32 / media_height as f32;
    let mut draw_width = area.width as f32;
    let mut draw_height = area.width as f32 / aspect_ratio;
    if draw_height > area.height as f32 {
        draw_height = area.height as f32;
        draw_width = area.height as f32 * aspect_ratio;
    }
    let w = draw_width.round() as u32;
    let h = draw_height.round() as u32;
    Rect::new(area.x + ((area.width - w.min(area.width)) / 2) as i32, area.y + ((area.height - h.min(area.height)) / 2) as i32, w, h)
}
