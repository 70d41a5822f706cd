//! 2D affine transforms and their flat six-number storage form.
//!
//! Components follow the cairo layout `[xx, yx, xy, yy, x0, y0]`:
//! `x' = xx * x + xy * y + x0` and `y' = yx * x + yy * y + y0`.

use serde::{Deserialize, Serialize};

use crate::{Bounds, Point, Result, TimelineError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine { xx: 1.0, yx: 0.0, xy: 0.0, yy: 1.0, x0: 0.0, y0: 0.0 };

    pub const fn new(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self { Self { xx, yx, xy, yy, x0, y0 } }

    pub const fn translation(dx: f64, dy: f64) -> Self { Self::new(1.0, 0.0, 0.0, 1.0, dx, dy) }

    /// Rotation by `degrees` (clockwise in screen space) around `center`.
    pub fn rotation_about(degrees: f64, center: Point) -> Self {
        let (s, c) = degrees.to_radians().sin_cos();
        Self::translation(-center.x, -center.y)
            .then(&Self::new(c, s, -s, c, 0.0, 0.0))
            .then(&Self::translation(center.x, center.y))
    }

    /// Mirror across the vertical line `x = cx`.
    pub fn horizontal_flip_about(cx: f64) -> Self { Self::new(-1.0, 0.0, 0.0, 1.0, 2.0 * cx, 0.0) }

    /// Transform that applies `self` first, then `next`.
    pub fn then(&self, next: &Affine) -> Affine {
        Affine {
            xx: self.xx * next.xx + self.yx * next.xy,
            yx: self.xx * next.yx + self.yx * next.yy,
            xy: self.xy * next.xx + self.yy * next.xy,
            yy: self.xy * next.yx + self.yy * next.yy,
            x0: self.x0 * next.xx + self.y0 * next.xy + next.x0,
            y0: self.x0 * next.yx + self.y0 * next.yy + next.y0,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(self.xx * p.x + self.xy * p.y + self.x0, self.yx * p.x + self.yy * p.y + self.y0)
    }

    /// Axis aligned box enclosing the transformed corners of `b`.
    pub fn map_bounds(&self, b: &Bounds) -> Bounds {
        let corners = [
            self.apply(Point::new(b.x1, b.y1)),
            self.apply(Point::new(b.x2, b.y1)),
            self.apply(Point::new(b.x2, b.y2)),
            self.apply(Point::new(b.x1, b.y2)),
        ];
        let (mut out_x1, mut out_y1) = (f64::INFINITY, f64::INFINITY);
        let (mut out_x2, mut out_y2) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for c in corners {
            out_x1 = out_x1.min(c.x);
            out_y1 = out_y1.min(c.y);
            out_x2 = out_x2.max(c.x);
            out_y2 = out_y2.max(c.y);
        }
        Bounds { x1: out_x1, y1: out_y1, x2: out_x2, y2: out_y2 }
    }

    pub fn is_identity(&self) -> bool { *self == Self::IDENTITY }

    pub fn to_array(&self) -> [f64; 6] { [self.xx, self.yx, self.xy, self.yy, self.x0, self.y0] }

    pub fn from_slice(m: &[f64]) -> Result<Self> {
        match *m {
            [xx, yx, xy, yy, x0, y0] => Ok(Self::new(xx, yx, xy, yy, x0, y0)),
            _ => Err(TimelineError::TransformArity(m.len())),
        }
    }
}

impl Default for Affine {
    fn default() -> Self { Self::IDENTITY }
}

impl Serialize for Affine {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> { self.to_array().serialize(s) }
}

impl<'de> Deserialize<'de> for Affine {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<f64>::deserialize(d)?;
        Affine::from_slice(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for an optional transform stored as `null` or six numbers.
pub mod codec {
    use super::Affine;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(t: &Option<Affine>, s: S) -> Result<S::Ok, S::Error> {
        t.map(|m| m.to_array()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Affine>, D::Error> {
        let raw: Option<Vec<f64>> = Option::deserialize(d)?;
        raw.map(|m| Affine::from_slice(&m).map_err(serde::de::Error::custom)).transpose()
    }
}
