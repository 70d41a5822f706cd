use serde::{Deserialize, Serialize};

use crate::{PropertyBag, PropertyValue, Result, Rgba, TimelineError};

pub const MIN_TEXT_SIZE: u32 = 4;
pub const MAX_TEXT_SIZE: u32 = 40;
pub const MAX_TEXT_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Bounds {
    /// Normalized box spanning two arbitrary corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self { x1: a.x.min(b.x), y1: a.y.min(b.y), x2: a.x.max(b.x), y2: a.y.max(b.y) }
    }

    pub fn width(&self) -> f64 { self.x2 - self.x1 }

    pub fn height(&self) -> f64 { self.y2 - self.y1 }

    pub fn center(&self) -> Point { Point::new(self.x1 + self.width() / 2.0, self.y1 + self.height() / 2.0) }
}

/// Kind-specific geometry and style of a drawable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rect { x: f64, y: f64, width: f64, height: f64, fill: Option<Rgba>, stroke: Rgba, line_width: f64 },
    Ellipse { center_x: f64, center_y: f64, radius_x: f64, radius_y: f64, fill: Option<Rgba>, stroke: Rgba, line_width: f64 },
    Line { start: Point, end: Point, stroke: Rgba, line_width: f64 },
    Pixmap { image: String, x: f64, y: f64, width: f64, height: f64 },
    Text { x: f64, y: f64, text: String, color: Rgba, size: u32 },
}

impl Shape {
    pub fn rect(at: Point, fill: Option<Rgba>, stroke: Rgba, line_width: f64) -> Self {
        Shape::Rect { x: at.x, y: at.y, width: 0.0, height: 0.0, fill, stroke, line_width }
    }

    pub fn ellipse(center: Point, fill: Option<Rgba>, stroke: Rgba, line_width: f64) -> Self {
        Shape::Ellipse { center_x: center.x, center_y: center.y, radius_x: 0.0, radius_y: 0.0, fill, stroke, line_width }
    }

    pub fn line(at: Point, stroke: Rgba, line_width: f64) -> Self { Shape::Line { start: at, end: at, stroke, line_width } }

    pub fn pixmap(image: impl Into<String>, at: Point, width: f64, height: f64) -> Self {
        Shape::Pixmap { image: image.into(), x: at.x, y: at.y, width, height }
    }

    pub fn text(at: Point, color: Rgba) -> Self { Shape::Text { x: at.x, y: at.y, text: "?".into(), color, size: 10 } }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Rect { .. } => "rect",
            Shape::Ellipse { .. } => "ellipse",
            Shape::Line { .. } => "line",
            Shape::Pixmap { .. } => "pixmap",
            Shape::Text { .. } => "text",
        }
    }

    /// The time-varying part of the shape, as recorded in snapshots.
    pub fn properties(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        let mut put = |name: &str, v: PropertyValue| {
            bag.insert(name.to_string(), v);
        };
        match self {
            Shape::Rect { x, y, width, height, fill, stroke, line_width } => {
                put("x", (*x).into());
                put("y", (*y).into());
                put("width", (*width).into());
                put("height", (*height).into());
                if let Some(fill) = fill {
                    put("fill_color", (*fill).into());
                }
                put("stroke_color", (*stroke).into());
                put("line_width", (*line_width).into());
            }
            Shape::Ellipse { center_x, center_y, radius_x, radius_y, fill, stroke, line_width } => {
                put("center_x", (*center_x).into());
                put("center_y", (*center_y).into());
                put("radius_x", (*radius_x).into());
                put("radius_y", (*radius_y).into());
                if let Some(fill) = fill {
                    put("fill_color", (*fill).into());
                }
                put("stroke_color", (*stroke).into());
                put("line_width", (*line_width).into());
            }
            Shape::Line { start, end, stroke, line_width } => {
                put("x1", start.x.into());
                put("y1", start.y.into());
                put("x2", end.x.into());
                put("y2", end.y.into());
                put("stroke_color", (*stroke).into());
                put("line_width", (*line_width).into());
            }
            Shape::Pixmap { x, y, width, height, .. } => {
                put("x", (*x).into());
                put("y", (*y).into());
                put("width", (*width).into());
                put("height", (*height).into());
            }
            Shape::Text { x, y, text, color, size } => {
                put("x", (*x).into());
                put("y", (*y).into());
                put("fill_color", (*color).into());
                put("text", text.clone().into());
                put("size", (*size as f64).into());
            }
        }
        bag
    }

    /// Inverse of [`Shape::properties`]. Keys the shape does not know are ignored.
    pub fn apply_properties(&mut self, bag: &PropertyBag) -> Result<()> {
        for (name, value) in bag {
            match (&mut *self, name.as_str()) {
                (Shape::Rect { x, .. } | Shape::Pixmap { x, .. } | Shape::Text { x, .. }, "x") => *x = number(name, value)?,
                (Shape::Rect { y, .. } | Shape::Pixmap { y, .. } | Shape::Text { y, .. }, "y") => *y = number(name, value)?,
                (Shape::Rect { width, .. } | Shape::Pixmap { width, .. }, "width") => *width = number(name, value)?,
                (Shape::Rect { height, .. } | Shape::Pixmap { height, .. }, "height") => *height = number(name, value)?,
                (Shape::Ellipse { center_x, .. }, "center_x") => *center_x = number(name, value)?,
                (Shape::Ellipse { center_y, .. }, "center_y") => *center_y = number(name, value)?,
                (Shape::Ellipse { radius_x, .. }, "radius_x") => *radius_x = number(name, value)?,
                (Shape::Ellipse { radius_y, .. }, "radius_y") => *radius_y = number(name, value)?,
                (Shape::Line { start, .. }, "x1") => start.x = number(name, value)?,
                (Shape::Line { start, .. }, "y1") => start.y = number(name, value)?,
                (Shape::Line { end, .. }, "x2") => end.x = number(name, value)?,
                (Shape::Line { end, .. }, "y2") => end.y = number(name, value)?,
                (Shape::Rect { fill, .. } | Shape::Ellipse { fill, .. }, "fill_color") => *fill = Some(color(name, value)?),
                (Shape::Text { color: c, .. }, "fill_color") => *c = color(name, value)?,
                (Shape::Rect { stroke, .. } | Shape::Ellipse { stroke, .. } | Shape::Line { stroke, .. }, "stroke_color") => {
                    *stroke = color(name, value)?
                }
                (Shape::Rect { line_width, .. } | Shape::Ellipse { line_width, .. } | Shape::Line { line_width, .. }, "line_width") => {
                    *line_width = number(name, value)?
                }
                (Shape::Text { text, .. }, "text") => match value {
                    PropertyValue::Text(t) => *text = t.clone(),
                    _ => return Err(mistyped(name, "string")),
                },
                (Shape::Text { size, .. }, "size") => *size = (number(name, value)? as u32).clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE),
                _ => {}
            }
        }
        Ok(())
    }

    /// Untransformed bounding box.
    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Rect { x, y, width, height, .. } | Shape::Pixmap { x, y, width, height, .. } => {
                Bounds { x1: *x, y1: *y, x2: x + width, y2: y + height }
            }
            Shape::Ellipse { center_x, center_y, radius_x, radius_y, .. } => Bounds {
                x1: center_x - radius_x,
                y1: center_y - radius_y,
                x2: center_x + radius_x,
                y2: center_y + radius_y,
            },
            Shape::Line { start, end, .. } => Bounds::from_corners(*start, *end),
            Shape::Text { x, y, text, size, .. } => {
                // No font metrics here; approximate a centered sans block.
                let columns = text.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1) as f64;
                let rows = text.lines().count().max(1) as f64;
                let (w, h) = (columns * *size as f64 * 0.6, rows * *size as f64 * 1.2);
                Bounds { x1: x - w / 2.0, y1: y - h / 2.0, x2: x + w / 2.0, y2: y + h / 2.0 }
            }
        }
    }

    /// Reshape from a drag between `p1` (the reference point) and `p2`.
    /// Callers snap the points first.
    pub fn set_bounds(&mut self, p1: Point, p2: Point) {
        match self {
            Shape::Rect { x, y, width, height, .. } | Shape::Pixmap { x, y, width, height, .. } => {
                let b = Bounds::from_corners(p1, p2);
                (*x, *y, *width, *height) = (b.x1, b.y1, b.width(), b.height());
            }
            Shape::Ellipse { center_x, center_y, radius_x, radius_y, .. } => {
                let b = Bounds::from_corners(p1, p2);
                (*radius_x, *radius_y) = (b.width() / 2.0, b.height() / 2.0);
                (*center_x, *center_y) = (b.x1 + *radius_x, b.y1 + *radius_y);
            }
            Shape::Line { start, end, .. } => {
                // The endpoint matching the reference point stays; the other follows p2.
                if *start == p1 {
                    *end = p2;
                } else if *end == p1 {
                    *start = p2;
                } else {
                    (*start, *end) = (p1, p2);
                }
            }
            Shape::Text { x, y, .. } => (*x, *y) = (p2.x, p2.y),
        }
    }

    /// Moves the untransformed geometry by `(dx, dy)`.
    pub fn offset(&mut self, dx: f64, dy: f64) {
        match self {
            Shape::Rect { x, y, .. } | Shape::Pixmap { x, y, .. } | Shape::Text { x, y, .. } => {
                *x += dx;
                *y += dy;
            }
            Shape::Ellipse { center_x, center_y, .. } => {
                *center_x += dx;
                *center_y += dy;
            }
            Shape::Line { start, end, .. } => {
                for p in [start, end] {
                    p.x += dx;
                    p.y += dy;
                }
            }
        }
    }

    /// Recolors the shape. Returns `false` for kinds that cannot be painted.
    pub fn fill(&mut self, new_fill: Rgba, new_stroke: Rgba) -> bool {
        match self {
            Shape::Rect { fill, stroke, .. } | Shape::Ellipse { fill, stroke, .. } => {
                if fill.is_some() {
                    *fill = Some(new_fill);
                }
                *stroke = new_stroke;
                true
            }
            Shape::Line { stroke, .. } => {
                *stroke = new_stroke;
                true
            }
            Shape::Text { color, .. } => {
                *color = new_stroke;
                true
            }
            Shape::Pixmap { .. } => false,
        }
    }

    /// Replaces the text of a text shape. Empty text shows a `?` placeholder.
    pub fn set_text(&mut self, new_text: &str) -> Result<()> {
        match self {
            Shape::Text { text, .. } => {
                *text = match new_text.chars().take(MAX_TEXT_CHARS).collect::<String>() {
                    t if t.is_empty() => "?".to_string(),
                    t => t,
                };
                Ok(())
            }
            other => Err(TimelineError::InvalidOp(format!("{} has no text", other.kind_name()))),
        }
    }

    /// Changes the font size of a text shape, clamped to the supported range.
    pub fn set_text_size(&mut self, new_size: u32) -> Result<u32> {
        match self {
            Shape::Text { size, .. } => {
                *size = new_size.clamp(MIN_TEXT_SIZE, MAX_TEXT_SIZE);
                Ok(*size)
            }
            other => Err(TimelineError::InvalidOp(format!("{} has no text size", other.kind_name()))),
        }
    }
}

fn number(name: &str, value: &PropertyValue) -> Result<f64> {
    match value {
        PropertyValue::Number(n) => Ok(*n),
        _ => Err(mistyped(name, "number")),
    }
}

fn color(name: &str, value: &PropertyValue) -> Result<Rgba> {
    match value {
        PropertyValue::Color(c) => Ok(*c),
        _ => Err(mistyped(name, "color")),
    }
}

fn mistyped(name: &str, expected: &'static str) -> TimelineError {
    TimelineError::PropertyType { name: name.to_string(), expected }
}
