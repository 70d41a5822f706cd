use thiserror::Error;

mod document;
mod grid;
mod interval;
mod item;
mod shape;
mod snapshot;
pub mod transform;

pub use document::{Animation, FrameEntry};
pub use grid::Grid;
pub use interval::{Interval, IntervalSet, OPEN_END};
pub use item::{Drawable, IdAllocator, ItemId, Lifecycle, RenderState};
pub use shape::{Bounds, Point, Shape, MAX_TEXT_CHARS, MAX_TEXT_SIZE, MIN_TEXT_SIZE};
pub use snapshot::{PropertyBag, PropertyValue, Rgba, Snapshot, SnapshotStore};
pub use transform::Affine;

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid operation: {0}")]
    InvalidOp(String),

    #[error("invalid interval: from {from} is after to {to}")]
    InvalidInterval { from: Time, to: Time },

    #[error("item {0} has no recorded state")]
    Uninitialized(ItemId),

    #[error("item {id} has no recorded state at or before time {time}")]
    NoSnapshotBefore { id: ItemId, time: Time },

    #[error("item {0} has been discarded")]
    Discarded(ItemId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),

    #[error("duplicate item id {0}")]
    DuplicateItem(ItemId),

    #[error("a transform needs 6 components, got {0}")]
    TransformArity(usize),

    #[error("property `{name}` expects a {expected}")]
    PropertyType { name: String, expected: &'static str },

    #[error("invalid color `{0}`")]
    InvalidColor(String),

    #[error("invalid grid: {0}")]
    InvalidGrid(String),
}

pub type Result<T> = std::result::Result<T, TimelineError>;

pub type Time = u32; // discrete animation step, 0-based

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32,
}

impl Fps {
    pub const fn new(num: u32, den: u32) -> Self { Self { num, den } }

    /// Wall-clock position of `time`, in seconds.
    pub fn seconds(&self, time: Time) -> f64 {
        if self.num == 0 { return 0.0; }
        time as f64 * self.den as f64 / self.num as f64
    }
}

impl Default for Fps {
    fn default() -> Self { Self::new(10, 1) }
}
