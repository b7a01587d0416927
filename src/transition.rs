//! The transition contract and a minimal set of built-in transitions.
//!
//! A [`Transition`] is a stateless compositing function: given the outgoing
//! frame, the incoming frame and an eased progress fraction, it blends the
//! result *over* a destination buffer. The destination is either transparent
//! or already holds a continuing background layer.
//!
//! Easing curves live here too; every curve is monotone on `[0, 1]` so the
//! progress a transition observes never moves backwards.

use std::f32::consts::FRAC_PI_2;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::pixel_buffer::{mix, PixelBuffer};

/// Whether a transition brings content in or takes it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

pub trait Transition: Send + Sync + fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    fn direction(&self) -> Direction;

    /// Composites `from` and `to` at progress `t` (0..=1) over `dst`.
    ///
    /// All three buffers have the surface's dimensions. At `t = 0` the result
    /// must equal `from`, at `t = 1` it must equal `to`.
    fn composite(&self, from: &PixelBuffer, to: &PixelBuffer, t: f32, dst: &mut PixelBuffer);
}

/// An instantaneous cut: shows `from` until the end, then `to`.
#[derive(Debug, Clone, Copy)]
pub struct Swap {
    direction: Direction,
}

impl Swap {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl Transition for Swap {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn composite(&self, from: &PixelBuffer, to: &PixelBuffer, t: f32, dst: &mut PixelBuffer) {
        if t >= 1.0 {
            dst.draw_over(to, 1.0);
        } else {
            dst.draw_over(from, 1.0);
        }
    }
}

/// Cross-fade in premultiplied space.
#[derive(Debug, Clone, Copy)]
pub struct Fade {
    direction: Direction,
}

impl Fade {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl Transition for Fade {
    fn name(&self) -> &'static str {
        "fade"
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn composite(&self, from: &PixelBuffer, to: &PixelBuffer, t: f32, dst: &mut PixelBuffer) {
        let (w, h) = (dst.width(), dst.height());
        for y in 0..h {
            for x in 0..w {
                let px = mix(from.pixel(x, y), to.pixel(x, y), t);
                dst.blend_pixel(x, y, px, 1.0);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WipeEdge {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

/// A hard-edged wipe revealing `to` from one side.
#[derive(Debug, Clone, Copy)]
pub struct Wipe {
    direction: Direction,
    edge: WipeEdge,
}

impl Wipe {
    pub fn new(direction: Direction, edge: WipeEdge) -> Self {
        Self { direction, edge }
    }
}

impl Transition for Wipe {
    fn name(&self) -> &'static str {
        "wipe"
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn composite(&self, from: &PixelBuffer, to: &PixelBuffer, t: f32, dst: &mut PixelBuffer) {
        let (w, h) = (dst.width(), dst.height());
        let t = t.clamp(0.0, 1.0);
        let reach_x = (t * w as f32).round() as u32;
        let reach_y = (t * h as f32).round() as u32;
        for y in 0..h {
            for x in 0..w {
                let revealed = match self.edge {
                    WipeEdge::LeftToRight => x < reach_x,
                    WipeEdge::RightToLeft => x >= w - reach_x,
                    WipeEdge::TopToBottom => y < reach_y,
                    WipeEdge::BottomToTop => y >= h - reach_y,
                };
                let src = if revealed { to.pixel(x, y) } else { from.pixel(x, y) };
                dst.blend_pixel(x, y, src, 1.0);
            }
        }
    }
}

/// Horizontal push. Incoming content enters from the right; on an `Out`
/// transition the outgoing content leaves to the left.
#[derive(Debug, Clone, Copy)]
pub struct Push {
    direction: Direction,
}

impl Push {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl Transition for Push {
    fn name(&self) -> &'static str {
        "push"
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn composite(&self, from: &PixelBuffer, to: &PixelBuffer, t: f32, dst: &mut PixelBuffer) {
        let (w, h) = (dst.width(), dst.height());
        let shift = (t.clamp(0.0, 1.0) * w as f32).round() as u32;
        for y in 0..h {
            for x in 0..w {
                // `from` occupies [0 - shift, w - shift); `to` occupies [w - shift, 2w - shift).
                let src = if x + shift < w {
                    from.pixel(x + shift, y)
                } else {
                    to.pixel(x + shift - w, y)
                };
                dst.blend_pixel(x, y, src, 1.0);
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingType {
    In,
    Out,
    InOut,
}

/// Progress curves. All are monotone non-decreasing on `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Easing {
    #[default]
    Linear,
    Quadratic(EasingType),
    Cubic(EasingType),
    Sinusoidal(EasingType),
    Exponential(EasingType),
}

impl Easing {
    pub fn apply(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        let eased = match *self {
            Easing::Linear => t,
            Easing::Quadratic(kind) => shape(kind, t, |x| x * x),
            Easing::Cubic(kind) => shape(kind, t, |x| x * x * x),
            Easing::Sinusoidal(kind) => shape(kind, t, |x| 1.0 - (x * FRAC_PI_2).cos()),
            Easing::Exponential(kind) => shape(kind, t, |x| {
                if x <= 0.0 {
                    0.0
                } else {
                    2f32.powf(10.0 * (x - 1.0))
                }
            }),
        };
        // endpoints are exact so completion always observes 1.0
        if t >= 1.0 {
            1.0
        } else if t <= 0.0 {
            0.0
        } else {
            eased.clamp(0.0, 1.0)
        }
    }
}

/// Derives the out and in-out variants from an ease-in curve.
fn shape(kind: EasingType, t: f32, ease_in: impl Fn(f32) -> f32) -> f32 {
    match kind {
        EasingType::In => ease_in(t),
        EasingType::Out => 1.0 - ease_in(1.0 - t),
        EasingType::InOut => {
            if t < 0.5 {
                ease_in(t * 2.0) / 2.0
            } else {
                1.0 - ease_in((1.0 - t) * 2.0) / 2.0
            }
        }
    }
}

impl FromStr for Easing {
    type Err = String;

    /// Parses `linear`, or `<curve>` / `<curve>-<in|out|in-out>`, e.g. `cubic-in-out`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "linear" {
            return Ok(Easing::Linear);
        }
        let (curve, kind) = match s.split_once('-') {
            Some((curve, rest)) => (curve, rest),
            None => (s.as_str(), "in-out"),
        };
        let kind = match kind {
            "in" => EasingType::In,
            "out" => EasingType::Out,
            "in-out" => EasingType::InOut,
            other => return Err(format!("unknown easing type '{}'", other)),
        };
        match curve {
            "quadratic" => Ok(Easing::Quadratic(kind)),
            "cubic" => Ok(Easing::Cubic(kind)),
            "sinusoidal" => Ok(Easing::Sinusoidal(kind)),
            "exponential" => Ok(Easing::Exponential(kind)),
            other => Err(format!("unknown easing curve '{}'", other)),
        }
    }
}

/// Names of the built-in transitions, as used in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    Swap,
    Fade,
    Wipe,
    Push,
}

impl TransitionKind {
    pub fn build(self, direction: Direction) -> std::sync::Arc<dyn Transition> {
        match self {
            TransitionKind::Swap => std::sync::Arc::new(Swap::new(direction)),
            TransitionKind::Fade => std::sync::Arc::new(Fade::new(direction)),
            TransitionKind::Wipe => std::sync::Arc::new(Wipe::new(direction, WipeEdge::LeftToRight)),
            TransitionKind::Push => std::sync::Arc::new(Push::new(direction)),
        }
    }
}

impl FromStr for TransitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "swap" | "cut" => Ok(TransitionKind::Swap),
            "fade" => Ok(TransitionKind::Fade),
            "wipe" => Ok(TransitionKind::Wipe),
            "push" => Ok(TransitionKind::Push),
            other => Err(format!("unknown transition '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Dimensions};

    fn solid(color: Color) -> PixelBuffer {
        let mut buf = PixelBuffer::new(Dimensions::new(4, 2));
        buf.fill(color);
        buf
    }

    fn all_transitions() -> Vec<Box<dyn Transition>> {
        vec![
            Box::new(Swap::new(Direction::In)),
            Box::new(Fade::new(Direction::In)),
            Box::new(Wipe::new(Direction::In, WipeEdge::RightToLeft)),
            Box::new(Push::new(Direction::Out)),
        ]
    }

    #[test]
    fn endpoints_match_from_and_to() {
        let from = solid(Color::rgb(255, 0, 0));
        let to = solid(Color::rgb(0, 0, 255));
        for transition in all_transitions() {
            let mut start = PixelBuffer::new(from.dimensions());
            transition.composite(&from, &to, 0.0, &mut start);
            assert_eq!(start, from, "{} at t=0", transition.name());
            let mut end = PixelBuffer::new(from.dimensions());
            transition.composite(&from, &to, 1.0, &mut end);
            assert_eq!(end, to, "{} at t=1", transition.name());
        }
    }

    #[test]
    fn fade_to_transparent_keeps_underlying_background() {
        let from = solid(Color::rgb(255, 255, 255));
        let to = PixelBuffer::new(from.dimensions());
        let mut dst = solid(Color::rgb(0, 0, 0));
        Fade::new(Direction::Out).composite(&from, &to, 1.0, &mut dst);
        assert_eq!(dst.pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn wipe_reveals_from_left() {
        let from = solid(Color::rgb(255, 0, 0));
        let to = solid(Color::rgb(0, 0, 255));
        let mut dst = PixelBuffer::new(from.dimensions());
        Wipe::new(Direction::In, WipeEdge::LeftToRight).composite(&from, &to, 0.5, &mut dst);
        assert_eq!(dst.pixel(0, 0), [0, 0, 255, 255]);
        assert_eq!(dst.pixel(3, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn easings_are_monotone_with_exact_endpoints() {
        let curves = [
            Easing::Linear,
            Easing::Quadratic(EasingType::InOut),
            Easing::Cubic(EasingType::Out),
            Easing::Sinusoidal(EasingType::In),
            Easing::Exponential(EasingType::InOut),
        ];
        for easing in curves {
            assert_eq!(easing.apply(0.0), 0.0);
            assert_eq!(easing.apply(1.0), 1.0);
            let mut last = 0.0;
            for i in 0..=100 {
                let v = easing.apply(i as f32 / 100.0);
                assert!(v >= last, "{:?} decreased at {}", easing, i);
                last = v;
            }
        }
    }

    #[test]
    fn parses_names() {
        assert_eq!("cubic-in-out".parse::<Easing>(), Ok(Easing::Cubic(EasingType::InOut)));
        assert_eq!("quadratic-in".parse::<Easing>(), Ok(Easing::Quadratic(EasingType::In)));
        assert_eq!("sinusoidal".parse::<Easing>(), Ok(Easing::Sinusoidal(EasingType::InOut)));
        assert!("bounce".parse::<Easing>().is_err());
        assert_eq!("cut".parse::<TransitionKind>(), Ok(TransitionKind::Swap));
    }
}
