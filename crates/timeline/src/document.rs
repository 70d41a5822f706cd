use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Drawable, Fps, Grid, IdAllocator, ItemId, Point, RenderState, Result, Rgba, Shape, Snapshot, Time, TimelineError};

/// One drawable as it appears in a rendered frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameEntry<'a> {
    pub id: ItemId,
    pub kind: &'static str,
    /// Time of the snapshot the state comes from.
    pub keyframe: Time,
    pub snapshot: &'a Snapshot,
}

/// An animation: drawables over a shared time axis. Item order is the
/// stacking order, bottom first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "AnimationFile")]
pub struct Animation {
    pub name: String,
    pub fps: Fps,
    pub grid: Grid,
    items: Vec<Drawable>,
    #[serde(skip)]
    ids: IdAllocator,
}

#[derive(Deserialize)]
struct AnimationFile {
    name: String,
    #[serde(default)]
    fps: Fps,
    #[serde(default)]
    grid: Grid,
    #[serde(default)]
    items: Vec<Drawable>,
}

impl TryFrom<AnimationFile> for Animation {
    type Error = TimelineError;

    fn try_from(file: AnimationFile) -> std::result::Result<Self, Self::Error> {
        let mut ids = IdAllocator::new();
        let mut seen = HashSet::new();
        for item in &file.items {
            if !seen.insert(item.id()) {
                return Err(TimelineError::DuplicateItem(item.id()));
            }
            ids.observe(item.id());
        }
        Ok(Self { name: file.name, fps: file.fps, grid: file.grid, items: file.items, ids })
    }
}

impl Animation {
    pub fn new(name: impl Into<String>, grid: Grid, fps: Fps) -> Self {
        Self { name: name.into(), fps, grid, items: Vec::new(), ids: IdAllocator::new() }
    }

    pub fn items(&self) -> &[Drawable] { &self.items }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn item(&self, id: ItemId) -> Result<&Drawable> {
        self.items.iter().find(|d| d.id() == id).ok_or(TimelineError::UnknownItem(id))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Drawable> {
        self.items.iter_mut().find(|d| d.id() == id).ok_or(TimelineError::UnknownItem(id))
    }

    /// Places `shape` on top of the stack, visible from `time` on.
    pub fn add(&mut self, shape: Shape, time: Time) -> ItemId {
        let id = self.ids.allocate();
        debug!(%id, kind = shape.kind_name(), time, "add drawable");
        self.items.push(Drawable::create(id, shape, time));
        id
    }

    /// Adds a shape dragged out between two points.
    pub fn add_dragged(&mut self, shape: Shape, p1: Point, p2: Point, time: Time) -> Result<ItemId> {
        let id = self.add(shape, time);
        self.resize(id, p1, p2, time)?;
        Ok(id)
    }

    pub fn resize(&mut self, id: ItemId, p1: Point, p2: Point, time: Time) -> Result<()> {
        let grid = self.grid;
        self.item_mut(id)?.set_bounds(&grid, p1, p2, time)
    }

    pub fn translate(&mut self, id: ItemId, dx: f64, dy: f64, time: Time) -> Result<(f64, f64)> {
        let grid = self.grid;
        self.item_mut(id)?.translate(&grid, dx, dy, time)
    }

    pub fn flip(&mut self, id: ItemId, time: Time) -> Result<()> { self.item_mut(id)?.flip(time) }

    pub fn rotate(&mut self, id: ItemId, degrees: f64, time: Time) -> Result<()> { self.item_mut(id)?.rotate(degrees, time) }

    pub fn fill(&mut self, id: ItemId, fill: Rgba, stroke: Rgba, time: Time) -> Result<bool> {
        self.item_mut(id)?.fill(fill, stroke, time)
    }

    pub fn set_text(&mut self, id: ItemId, text: &str, time: Time) -> Result<()> {
        let grid = self.grid;
        self.item_mut(id)?.set_text(&grid, text, time)
    }

    pub fn set_text_size(&mut self, id: ItemId, size: u32, time: Time) -> Result<u32> {
        let grid = self.grid;
        self.item_mut(id)?.set_text_size(&grid, size, time)
    }

    /// Shows `id` again from `from` through `to`, or to the end when `to` is `None`.
    pub fn reveal(&mut self, id: ItemId, from: Time, to: Option<Time>) -> Result<()> {
        let item = self.item_mut(id)?;
        match to {
            Some(to) if to < from => Err(TimelineError::InvalidInterval { from, to }),
            Some(to) => item.set_visible(from, to),
            None => item.set_visible_to_end(from),
        }
    }

    /// Deletes `id` from `time` on. Returns `true` when the drawable had no
    /// visibility left and was dropped from the document.
    pub fn delete_at(&mut self, id: ItemId, time: Time) -> Result<bool> {
        let idx = self.index_of(id)?;
        if !self.items[idx].mark_deleted_at(time) {
            return Ok(false);
        }
        self.items.remove(idx);
        debug!(%id, time, "drawable removed from document");
        Ok(true)
    }

    /// Moves `id` one step up the stack. Returns `false` if already on top.
    pub fn raise(&mut self, id: ItemId) -> Result<bool> {
        let idx = self.index_of(id)?;
        if idx + 1 >= self.items.len() {
            return Ok(false);
        }
        self.items.swap(idx, idx + 1);
        Ok(true)
    }

    /// Moves `id` one step down the stack. Returns `false` if already at the bottom.
    pub fn lower(&mut self, id: ItemId) -> Result<bool> {
        let idx = self.index_of(id)?;
        if idx == 0 {
            return Ok(false);
        }
        self.items.swap(idx, idx - 1);
        Ok(true)
    }

    /// Drawables shown at `time`, bottom first, with their resolved state.
    pub fn frame_at(&self, time: Time) -> Result<Vec<FrameEntry<'_>>> {
        let mut frame = Vec::new();
        for item in &self.items {
            if let RenderState::Visible { time: keyframe, snapshot } = item.render_state_at(time)? {
                frame.push(FrameEntry { id: item.id(), kind: item.shape().kind_name(), keyframe, snapshot });
            }
        }
        Ok(frame)
    }

    /// Last time at which anything is recorded or changes visibility.
    pub fn end_time(&self) -> Time {
        self.items
            .iter()
            .flat_map(|d| d.timeline().latest_time().into_iter().chain(d.visibility().last_finite_time()))
            .max()
            .unwrap_or(0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> { serde_json::to_string_pretty(self) }

    pub fn from_json(s: &str) -> serde_json::Result<Self> { serde_json::from_str(s) }

    fn index_of(&self, id: ItemId) -> Result<usize> {
        self.items.iter().position(|d| d.id() == id).ok_or(TimelineError::UnknownItem(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, PropertyValue};

    const RED: Rgba = Rgba(0xff00_00ff);

    fn anim() -> Animation {
        let grid = Grid::new(Bounds { x1: 0.0, y1: 0.0, x2: 200.0, y2: 200.0 }, 1.0).unwrap();
        Animation::new("demo", grid, Fps::default())
    }

    fn rect(a: &mut Animation, time: Time) -> ItemId {
        a.add_dragged(Shape::rect(Point::default(), Some(RED), Rgba::BLACK, 1.0), Point::new(10.0, 10.0), Point::new(20.0, 20.0), time)
            .unwrap()
    }

    #[test]
    fn ids_are_allocated_per_document() {
        let mut a = anim();
        let mut b = anim();
        assert_eq!(rect(&mut a, 0), ItemId(0));
        assert_eq!(rect(&mut a, 0), ItemId(1));
        assert_eq!(rect(&mut b, 0), ItemId(0));
    }

    #[test]
    fn frame_lists_visible_items_in_stack_order() {
        let mut a = anim();
        let first = rect(&mut a, 0);
        let second = rect(&mut a, 5);
        let ids = |t| a.frame_at(t).unwrap().iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids(2), vec![first]);
        assert_eq!(ids(5), vec![first, second]);

        let mut a = a.clone();
        assert!(a.lower(second).unwrap());
        assert!(!a.lower(second).unwrap());
        assert_eq!(a.frame_at(9).unwrap().iter().map(|e| e.id).collect::<Vec<_>>(), vec![second, first]);
        assert!(a.raise(second).unwrap());
        assert!(!a.raise(second).unwrap());
    }

    #[test]
    fn frame_reports_keyframe_time() {
        let mut a = anim();
        let id = rect(&mut a, 0);
        a.translate(id, 30.0, 0.0, 10).unwrap();
        let frame = a.frame_at(7).unwrap();
        assert_eq!(frame[0].keyframe, 0);
        assert_eq!(frame[0].snapshot.properties["x"], PropertyValue::Number(10.0));
        assert_eq!(a.frame_at(12).unwrap()[0].snapshot.properties["x"], PropertyValue::Number(40.0));
    }

    #[test]
    fn deleting_everywhere_drops_the_item() {
        let mut a = anim();
        let id = rect(&mut a, 3);
        assert!(!a.delete_at(id, 8).unwrap());
        assert_eq!(a.len(), 1);
        assert!(a.delete_at(id, 3).unwrap());
        assert!(a.is_empty());
        assert!(matches!(a.delete_at(id, 3), Err(TimelineError::UnknownItem(_))));
    }

    #[test]
    fn restore_continues_ids_after_the_highest() {
        let mut a = anim();
        rect(&mut a, 0);
        let doomed = rect(&mut a, 0);
        rect(&mut a, 0);
        a.delete_at(doomed, 0).unwrap();
        let mut b = Animation::from_json(&a.to_json().unwrap()).unwrap();
        assert_eq!(b.items(), a.items());
        assert_eq!(b.add(Shape::text(Point::default(), RED), 0), ItemId(3));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut a = anim();
        rect(&mut a, 0);
        let mut json: serde_json::Value = serde_json::from_str(&a.to_json().unwrap()).unwrap();
        let dup = json["items"][0].clone();
        json["items"].as_array_mut().unwrap().push(dup);
        let err = serde_json::from_value::<Animation>(json).unwrap_err();
        assert!(err.to_string().contains("duplicate item id #0"));
    }

    #[test]
    fn end_time_covers_edits_and_deletions() {
        let mut a = anim();
        assert_eq!(a.end_time(), 0);
        let id = rect(&mut a, 2);
        a.translate(id, 5.0, 5.0, 14).unwrap();
        assert_eq!(a.end_time(), 14);
        a.delete_at(id, 20).unwrap();
        assert_eq!(a.end_time(), 19);
    }

    #[test]
    fn resize_at_an_earlier_time_keeps_the_later_keyframe() {
        let mut a = anim();
        let id = rect(&mut a, 0);
        a.translate(id, 30.0, 0.0, 10).unwrap();
        a.resize(id, Point::new(10.0, 10.0), Point::new(30.0, 30.0), 4).unwrap();
        let width = |t| a.frame_at(t).unwrap()[0].snapshot.properties["width"].clone();
        assert_eq!(width(4), PropertyValue::Number(20.0));
        assert_eq!(width(10), PropertyValue::Number(10.0));
        assert_eq!(a.frame_at(10).unwrap()[0].snapshot.properties["x"], PropertyValue::Number(40.0));
    }

    #[test]
    fn reveal_restores_visibility() {
        let mut a = anim();
        let id = rect(&mut a, 0);
        a.delete_at(id, 5).unwrap();
        a.reveal(id, 8, Some(12)).unwrap();
        let visible = |a: &Animation, t| a.item(id).unwrap().is_visible_at(t);
        assert!(!visible(&a, 6));
        assert!(visible(&a, 8) && visible(&a, 12));
        assert!(!visible(&a, 13));
        a.reveal(id, 13, None).unwrap();
        assert!(visible(&a, 500));
        assert!(matches!(a.reveal(id, 9, Some(3)), Err(TimelineError::InvalidInterval { from: 9, to: 3 })));
    }

    #[test]
    fn malformed_grid_is_rejected_on_load() {
        let mut json: serde_json::Value = serde_json::from_str(&anim().to_json().unwrap()).unwrap();
        json["grid"]["area"]["x2"] = serde_json::json!(-5.0);
        assert!(serde_json::from_value::<Animation>(json.clone()).is_err());
        json["grid"]["area"]["x2"] = serde_json::json!(50.0);
        json["grid"]["step"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<Animation>(json).is_err());
    }
}
