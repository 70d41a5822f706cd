use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{transform, Affine, Time, TimelineError};

/// Packed `0xRRGGBBAA` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const BLACK: Rgba = Rgba(0x0000_00ff);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self((r as u32) << 24 | (g as u32) << 16 | (b as u32) << 8 | a as u32)
    }

    pub const fn alpha(&self) -> u8 { (self.0 & 0xff) as u8 }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{:08x}", self.0) }
}

impl FromStr for Rgba {
    type Err = TimelineError;

    /// Accepts `#rrggbb` (opaque) or `#rrggbbaa`, with or without the `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let bad = || TimelineError::InvalidColor(s.to_string());
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(bad());
        }
        let v = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
        match hex.len() {
            6 => Ok(Rgba(v << 8 | 0xff)),
            8 => Ok(Rgba(v)),
            _ => Err(bad()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Number(f64),
    Color(Rgba),
    Text(String),
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self { PropertyValue::Number(v) }
}

impl From<Rgba> for PropertyValue {
    fn from(v: Rgba) -> Self { PropertyValue::Color(v) }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self { PropertyValue::Text(v) }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Number(n) => write!(f, "{n}"),
            PropertyValue::Color(c) => write!(f, "{c}"),
            PropertyValue::Text(t) => write!(f, "{t:?}"),
        }
    }
}

pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// State of one drawable captured at one time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub properties: PropertyBag,
    #[serde(with = "transform::codec", default)]
    pub transform: Option<Affine>,
}

impl Snapshot {
    pub fn new(properties: PropertyBag, transform: Option<Affine>) -> Self { Self { properties, transform } }
}

/// Per-drawable map from time to captured state. Behaves as a step
/// function: between two recorded times the earlier state holds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotStore {
    entries: BTreeMap<Time, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self { Self::default() }

    pub fn record(&mut self, time: Time, snapshot: Snapshot) { self.entries.insert(time, snapshot); }

    pub fn query_exact(&self, time: Time) -> Option<&Snapshot> { self.entries.get(&time) }

    /// Latest snapshot recorded at or before `time`.
    pub fn query_nearest_before_or_at(&self, time: Time) -> Option<(Time, &Snapshot)> {
        self.entries.range(..=time).next_back().map(|(t, s)| (*t, s))
    }

    pub fn times(&self) -> impl Iterator<Item = Time> + '_ { self.entries.keys().copied() }

    pub fn earliest(&self) -> Option<(Time, &Snapshot)> { self.entries.iter().next().map(|(t, s)| (*t, s)) }

    pub fn latest_time(&self) -> Option<Time> { self.entries.keys().next_back().copied() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}
