use serde::{Deserialize, Serialize};

use crate::{Bounds, Point, Result, TimelineError};

/// Drawing area and snapping step of an animation canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GridFile")]
pub struct Grid {
    area: Bounds,
    step: f64,
}

#[derive(Deserialize)]
struct GridFile {
    area: Bounds,
    step: f64,
}

impl TryFrom<GridFile> for Grid {
    type Error = TimelineError;

    fn try_from(file: GridFile) -> Result<Self> { Grid::new(file.area, file.step) }
}

impl Grid {
    /// The area must be finite with `x1 < x2` and `y1 < y2`; the step must
    /// be finite and positive.
    pub fn new(area: Bounds, step: f64) -> Result<Self> {
        let coords = [area.x1, area.y1, area.x2, area.y2];
        if coords.iter().any(|v| !v.is_finite()) || area.x1 >= area.x2 || area.y1 >= area.y2 {
            return Err(TimelineError::InvalidGrid(format!(
                "drawing area ({}, {})-({}, {}) is empty or not finite",
                area.x1, area.y1, area.x2, area.y2
            )));
        }
        if !step.is_finite() || step <= 0.0 {
            return Err(TimelineError::InvalidGrid(format!("step {step} must be positive")));
        }
        Ok(Self { area, step })
    }

    pub fn area(&self) -> Bounds { self.area }

    pub fn step(&self) -> f64 { self.step }

    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.area.x1, self.area.x2), p.y.clamp(self.area.y1, self.area.y2))
    }

    /// Rounds `p` to the nearest grid line inside the drawing area.
    pub fn snap(&self, p: Point) -> Point {
        let p = self.clamp(p);
        let snap_axis = |v: f64, origin: f64| origin + ((v - origin) / self.step).round() * self.step;
        // rounding up can overshoot the far edge when the area is not a whole number of steps
        self.clamp(Point::new(snap_axis(p.x, self.area.x1), snap_axis(p.y, self.area.y1)))
    }

    /// Snaps the box spanned by two corners; the result is normalized.
    pub fn snap_box(&self, p1: Point, p2: Point) -> Bounds {
        let b = Bounds::from_corners(p1, p2);
        Bounds::from_corners(self.snap(Point::new(b.x1, b.y1)), self.snap(Point::new(b.x2, b.y2)))
    }

    /// Snaps both points, keeping their order.
    pub fn snap_pair(&self, p1: Point, p2: Point) -> (Point, Point) { (self.snap(p1), self.snap(p2)) }
}

impl Default for Grid {
    fn default() -> Self { Self { area: Bounds { x1: 0.0, y1: 0.0, x2: 800.0, y2: 520.0 }, step: 1.0 } }
}
