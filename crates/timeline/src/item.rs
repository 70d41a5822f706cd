use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{transform, Affine, Bounds, Grid, IntervalSet, Point, Result, Rgba, Shape, Snapshot, SnapshotStore, Time, TimelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// Hands out drawable ids for one document.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self { Self::default() }

    pub fn allocate(&mut self) -> ItemId {
        let id = ItemId(self.next);
        self.next += 1;
        id
    }

    /// Makes sure `id` is never handed out again, e.g. after a restore.
    pub fn observe(&mut self, id: ItemId) {
        if self.next <= id.0 {
            self.next = id.0 + 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Created,
    Edited,
    Truncated,
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState<'a> {
    Hidden,
    /// `time` is the recorded time the snapshot was taken at.
    Visible { time: Time, snapshot: &'a Snapshot },
}

/// A shape placed on the animation canvas together with its visibility
/// intervals and the states recorded for it over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawable {
    id: ItemId,
    shape: Shape,
    #[serde(with = "transform::codec", default)]
    transform: Option<Affine>,
    visible: IntervalSet,
    timeline: SnapshotStore,
    #[serde(default)]
    lifecycle: Lifecycle,
}

impl Drawable {
    /// New drawable shown from `time` to the end of the recording.
    pub fn create(id: ItemId, shape: Shape, time: Time) -> Self {
        let mut d = Self {
            id,
            shape,
            transform: None,
            visible: IntervalSet::new(),
            timeline: SnapshotStore::new(),
            lifecycle: Lifecycle::Created,
        };
        d.timeline.record(time, d.capture());
        d.visible.add_to_end(time);
        d
    }

    pub fn id(&self) -> ItemId { self.id }

    pub fn shape(&self) -> &Shape { &self.shape }

    pub fn transform(&self) -> Option<&Affine> { self.transform.as_ref() }

    pub fn visibility(&self) -> &IntervalSet { &self.visible }

    pub fn timeline(&self) -> &SnapshotStore { &self.timeline }

    pub fn lifecycle(&self) -> Lifecycle { self.lifecycle }

    /// Current properties and transform of the live shape.
    pub fn capture(&self) -> Snapshot { Snapshot::new(self.shape.properties(), self.transform) }

    pub fn save_at_time(&mut self, time: Time) -> Result<()> {
        self.ensure_live()?;
        self.timeline.record(time, self.capture());
        self.lifecycle = Lifecycle::Edited;
        Ok(())
    }

    pub fn set_visible(&mut self, from: Time, to: Time) -> Result<()> {
        self.ensure_live()?;
        self.visible.add_range(from, to);
        Ok(())
    }

    pub fn set_visible_to_end(&mut self, from: Time) -> Result<()> {
        self.ensure_live()?;
        self.visible.add_to_end(from);
        Ok(())
    }

    pub fn is_visible_at(&self, time: Time) -> bool { self.visible.contains(time) }

    pub fn render_state_at(&self, time: Time) -> Result<RenderState<'_>> {
        if !self.is_visible_at(time) {
            return Ok(RenderState::Hidden);
        }
        if let Some(snapshot) = self.timeline.query_exact(time) {
            return Ok(RenderState::Visible { time, snapshot });
        }
        if self.timeline.is_empty() {
            return Err(TimelineError::Uninitialized(self.id));
        }
        match self.timeline.query_nearest_before_or_at(time) {
            Some((time, snapshot)) => Ok(RenderState::Visible { time, snapshot }),
            None => Err(TimelineError::NoSnapshotBefore { id: self.id, time }),
        }
    }

    /// Loads the state resolved for `time` into the live shape.
    /// Returns whether the drawable is shown at that time.
    pub fn display_at_time(&mut self, time: Time) -> Result<bool> {
        let (properties, transform) = match self.render_state_at(time)? {
            RenderState::Hidden => return Ok(false),
            RenderState::Visible { snapshot, .. } => (snapshot.properties.clone(), snapshot.transform),
        };
        self.shape.apply_properties(&properties)?;
        self.transform = transform;
        Ok(true)
    }

    /// Hides the drawable from `time` on. Returns `true` once no
    /// visibility is left and the drawable is discarded.
    pub fn mark_deleted_at(&mut self, time: Time) -> bool {
        if self.lifecycle == Lifecycle::Discarded {
            return true;
        }
        self.visible.truncate_at(time);
        if self.visible.is_empty() {
            debug!(id = %self.id, time, "drawable discarded");
            self.lifecycle = Lifecycle::Discarded;
            true
        } else {
            self.lifecycle = Lifecycle::Truncated;
            false
        }
    }

    /// Bounding box on the canvas, after the transform.
    pub fn canvas_bounds(&self) -> Bounds {
        let b = self.shape.bounds();
        self.transform.map_or(b, |m| m.map_bounds(&b))
    }

    pub fn set_bounds(&mut self, grid: &Grid, p1: Point, p2: Point, time: Time) -> Result<()> {
        self.seek(time)?;
        let (a, b) = match self.shape {
            Shape::Line { .. } | Shape::Text { .. } => grid.snap_pair(p1, p2),
            _ => {
                let b = grid.snap_box(p1, p2);
                (Point::new(b.x1, b.y1), Point::new(b.x2, b.y2))
            }
        };
        self.shape.set_bounds(a, b);
        self.save_at_time(time)
    }

    /// Moves by `(dx, dy)` without leaving the drawing area. Returns the
    /// offset actually applied.
    pub fn translate(&mut self, grid: &Grid, dx: f64, dy: f64, time: Time) -> Result<(f64, f64)> {
        self.seek(time)?;
        let applied = self.shift_within(grid, dx, dy);
        self.save_at_time(time)?;
        Ok(applied)
    }

    /// Mirrors horizontally around the drawable's center.
    pub fn flip(&mut self, time: Time) -> Result<()> {
        self.seek(time)?;
        let cx = self.canvas_bounds().center().x;
        self.compose(Affine::horizontal_flip_about(cx));
        self.save_at_time(time)
    }

    pub fn rotate(&mut self, degrees: f64, time: Time) -> Result<()> {
        self.seek(time)?;
        let center = self.canvas_bounds().center();
        self.compose(Affine::rotation_about(degrees, center));
        self.save_at_time(time)
    }

    /// Returns `false` when the shape cannot be painted; nothing is recorded then.
    pub fn fill(&mut self, fill: Rgba, stroke: Rgba, time: Time) -> Result<bool> {
        self.seek(time)?;
        if !self.shape.fill(fill, stroke) {
            return Ok(false);
        }
        self.save_at_time(time)?;
        Ok(true)
    }

    /// Replaces the text, then pulls the drawable back inside the drawing area.
    pub fn set_text(&mut self, grid: &Grid, text: &str, time: Time) -> Result<()> {
        self.seek(time)?;
        self.shape.set_text(text)?;
        self.shift_within(grid, 0.0, 0.0);
        self.save_at_time(time)
    }

    pub fn set_text_size(&mut self, grid: &Grid, size: u32, time: Time) -> Result<u32> {
        self.seek(time)?;
        let size = self.shape.set_text_size(size)?;
        self.shift_within(grid, 0.0, 0.0);
        self.save_at_time(time)?;
        Ok(size)
    }

    // Loads the state in effect at `time` so an edit starts from it. A hidden
    // drawable starts from the last state before `time`, or its first one.
    fn seek(&mut self, time: Time) -> Result<()> {
        self.ensure_live()?;
        match self.display_at_time(time) {
            Ok(true) => return Ok(()),
            Ok(false) | Err(TimelineError::NoSnapshotBefore { .. }) => {}
            Err(e) => return Err(e),
        }
        let (properties, transform) = self
            .timeline
            .query_nearest_before_or_at(time)
            .or_else(|| self.timeline.earliest())
            .map(|(_, snapshot)| (snapshot.properties.clone(), snapshot.transform))
            .ok_or(TimelineError::Uninitialized(self.id))?;
        self.shape.apply_properties(&properties)?;
        self.transform = transform;
        Ok(())
    }

    // Applies as much of `(dx, dy)` as keeps the canvas bounds inside the area.
    fn shift_within(&mut self, grid: &Grid, dx: f64, dy: f64) -> (f64, f64) {
        let (b, area) = (self.canvas_bounds(), grid.area());
        let dx = clamp_offset(dx, b.x1, b.x2, area.x1, area.x2);
        let dy = clamp_offset(dy, b.y1, b.y2, area.y1, area.y2);
        if dx != 0.0 || dy != 0.0 {
            match self.transform {
                Some(m) => self.transform = Some(m.then(&Affine::translation(dx, dy))),
                None => self.shape.offset(dx, dy),
            }
        }
        (dx, dy)
    }

    fn compose(&mut self, next: Affine) {
        let current = self.transform.unwrap_or_default();
        self.transform = Some(current.then(&next));
    }

    fn ensure_live(&self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Discarded => Err(TimelineError::Discarded(self.id)),
            _ => Ok(()),
        }
    }
}

// Shrinks `d` so that [lo + d, hi + d] stays inside [min, max] where possible.
fn clamp_offset(d: f64, lo: f64, hi: f64, min: f64, max: f64) -> f64 {
    if lo + d < min {
        min - lo
    } else if hi + d > max {
        max - hi
    } else {
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PropertyValue, OPEN_END};

    fn grid() -> Grid { Grid::new(Bounds { x1: 0.0, y1: 0.0, x2: 100.0, y2: 100.0 }, 1.0).unwrap() }

    fn square(time: Time) -> Drawable {
        let mut d = Drawable::create(ItemId(1), Shape::rect(Point::new(0.0, 0.0), None, Rgba::BLACK, 1.0), time);
        d.set_bounds(&grid(), Point::new(5.0, 5.0), Point::new(15.0, 15.0), time).unwrap();
        d
    }

    fn x_at(d: &Drawable, time: Time) -> f64 {
        match d.render_state_at(time).unwrap() {
            RenderState::Visible { snapshot, .. } => match snapshot.properties["x"] {
                PropertyValue::Number(x) => x,
                ref other => panic!("x is {other:?}"),
            },
            RenderState::Hidden => panic!("hidden at {time}"),
        }
    }

    #[test]
    fn creation_opens_visibility_to_the_end() {
        let d = Drawable::create(ItemId(3), Shape::text(Point::new(1.0, 1.0), Rgba::BLACK), 4);
        assert_eq!(d.lifecycle(), Lifecycle::Created);
        assert_eq!(d.visibility().iter().map(|r| (r.from, r.to)).collect::<Vec<_>>(), vec![(4, OPEN_END)]);
        assert_eq!(d.timeline().times().collect::<Vec<_>>(), vec![4]);
        assert!(!d.is_visible_at(3));
        assert!(d.is_visible_at(4));
    }

    #[test]
    fn state_between_edits_holds_the_earlier_one() {
        let mut d = square(0);
        d.translate(&grid(), 45.0, 0.0, 10).unwrap();
        assert_eq!(x_at(&d, 0), 5.0);
        assert_eq!(x_at(&d, 7), 5.0);
        assert_eq!(x_at(&d, 10), 50.0);
        assert_eq!(x_at(&d, 99), 50.0);
        assert_eq!(d.lifecycle(), Lifecycle::Edited);
    }

    #[test]
    fn hidden_outside_visibility() {
        let d = square(5);
        assert_eq!(d.render_state_at(2).unwrap(), RenderState::Hidden);
    }

    #[test]
    fn visible_before_first_snapshot_fails() {
        let mut d = square(5);
        d.set_visible(0, 4).unwrap();
        assert!(matches!(d.render_state_at(2), Err(TimelineError::NoSnapshotBefore { time: 2, .. })));
    }

    #[test]
    fn missing_timeline_is_uninitialized() {
        let d: Drawable = serde_json::from_value(serde_json::json!({
            "id": 9,
            "shape": { "type": "line", "start": { "x": 0.0, "y": 0.0 }, "end": { "x": 1.0, "y": 1.0 },
                       "stroke": 255, "line_width": 1.0 },
            "visible": [[0, 10]],
            "timeline": {}
        }))
        .unwrap();
        assert!(matches!(d.render_state_at(3), Err(TimelineError::Uninitialized(ItemId(9)))));
    }

    #[test]
    fn display_restores_live_shape() {
        let mut d = square(0);
        d.translate(&grid(), 20.0, 0.0, 10).unwrap();
        d.rotate(90.0, 10).unwrap();
        assert!(d.display_at_time(3).unwrap());
        assert_eq!(d.shape().bounds().x1, 5.0);
        assert_eq!(d.transform(), None);
        assert!(d.display_at_time(12).unwrap());
        assert_eq!(d.shape().bounds().x1, 25.0);
        assert!(d.transform().is_some());
    }

    fn recorded_x(d: &Drawable, time: Time) -> f64 {
        match d.timeline().query_exact(time).map(|s| &s.properties["x"]) {
            Some(PropertyValue::Number(x)) => *x,
            other => panic!("no x recorded at {time}: {other:?}"),
        }
    }

    #[test]
    fn editing_an_earlier_time_starts_from_that_state() {
        let mut d = square(0);
        d.translate(&grid(), 30.0, 0.0, 10).unwrap();
        d.translate(&grid(), 5.0, 0.0, 3).unwrap();
        assert_eq!(x_at(&d, 0), 5.0);
        assert_eq!(x_at(&d, 3), 10.0);
        assert_eq!(x_at(&d, 7), 10.0);
        assert_eq!(x_at(&d, 10), 35.0);
    }

    #[test]
    fn editing_a_hidden_time_starts_from_the_last_state_before_it() {
        let mut d = square(0);
        d.translate(&grid(), 30.0, 0.0, 8).unwrap();
        d.translate(&grid(), 1.0, 0.0, 2).unwrap();
        assert!(!d.mark_deleted_at(10));
        d.translate(&grid(), 2.0, 0.0, 12).unwrap();
        assert_eq!(recorded_x(&d, 12), 37.0);
        assert_eq!(d.render_state_at(12).unwrap(), RenderState::Hidden);
    }

    #[test]
    fn editing_before_the_first_snapshot_starts_from_it() {
        let mut d = square(5);
        d.translate(&grid(), 20.0, 0.0, 9).unwrap();
        d.set_visible(0, 4).unwrap();
        d.translate(&grid(), 10.0, 0.0, 2).unwrap();
        assert_eq!(x_at(&d, 2), 15.0);
        assert_eq!(x_at(&d, 5), 5.0);
        assert_eq!(x_at(&d, 9), 25.0);
    }

    #[test]
    fn text_edits_stay_in_drawing_area() {
        let mut d = Drawable::create(ItemId(4), Shape::text(Point::new(90.0, 50.0), Rgba::BLACK), 0);
        d.set_text(&grid(), "abcdefghij", 1).unwrap();
        assert!(d.canvas_bounds().x2 <= 100.0 + 1e-9);
        assert!((d.canvas_bounds().x2 - 100.0).abs() < 1e-9);

        let mut d = Drawable::create(ItemId(5), Shape::text(Point::new(98.0, 50.0), Rgba::BLACK), 0);
        assert_eq!(d.set_text_size(&grid(), 40, 1).unwrap(), 40);
        assert!(d.canvas_bounds().x2 <= 100.0 + 1e-9);
        assert!(recorded_x(&d, 1) < 98.0);
    }

    #[test]
    fn translate_stays_in_drawing_area() {
        let mut d = square(0);
        assert_eq!(d.translate(&grid(), -50.0, 200.0, 1).unwrap(), (-5.0, 85.0));
        assert_eq!(d.canvas_bounds(), Bounds { x1: 0.0, y1: 90.0, x2: 10.0, y2: 100.0 });
    }

    #[test]
    fn flip_composes_into_the_transform() {
        let mut d = square(0);
        d.flip(2).unwrap();
        assert_eq!(d.canvas_bounds(), Bounds { x1: 5.0, y1: 5.0, x2: 15.0, y2: 15.0 });
        let m = d.timeline().query_exact(2).unwrap().transform.unwrap();
        assert_eq!(m.xx, -1.0);
        d.flip(3).unwrap();
        assert!(d.transform().unwrap().is_identity());
    }

    #[test]
    fn deletion_truncates_then_discards() {
        let mut d = square(5);
        assert!(!d.mark_deleted_at(10));
        assert_eq!(d.lifecycle(), Lifecycle::Truncated);
        assert!(d.is_visible_at(9));
        assert!(!d.is_visible_at(10));
        assert!(d.mark_deleted_at(5));
        assert_eq!(d.lifecycle(), Lifecycle::Discarded);
        assert!(matches!(d.save_at_time(6), Err(TimelineError::Discarded(ItemId(1)))));
        assert!(d.mark_deleted_at(0));
    }

    #[test]
    fn unpaintable_fill_records_nothing() {
        let mut d = Drawable::create(ItemId(2), Shape::pixmap("tux.png", Point::default(), 10.0, 10.0), 0);
        assert!(!d.fill(Rgba::BLACK, Rgba::BLACK, 4).unwrap());
        assert_eq!(d.timeline().len(), 1);
    }

    #[test]
    fn restore_is_lossless() {
        let mut d = square(0);
        d.flip(4).unwrap();
        d.fill(Rgba(0x1122_33ff), Rgba(0x4455_66ff), 8).unwrap();
        d.mark_deleted_at(20);
        let json = serde_json::to_string(&d).unwrap();
        let back: Drawable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn allocator_skips_observed_ids() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.allocate(), ItemId(0));
        ids.observe(ItemId(7));
        ids.observe(ItemId(3));
        assert_eq!(ids.allocate(), ItemId(8));
    }
}
