use anyhow::{bail, Context, Result};
use project::ProjectDb;
use serde::Serialize;
use std::io::Write;
use std::time::Duration;
use timeline::{Animation, Bounds, Fps, FrameEntry, Grid, ItemId, Point, PropertyBag, Shape, Time};

use crate::{Command, Corners, ShapeArgs};

#[derive(Serialize)]
struct FrameOut<'a> {
    time: Time,
    seconds: f64,
    items: Vec<ItemOut<'a>>,
}

#[derive(Serialize)]
struct ItemOut<'a> {
    id: u64,
    kind: &'static str,
    keyframe: Time,
    properties: &'a PropertyBag,
    transform: Option<[f64; 6]>,
}

impl<'a> From<&FrameEntry<'a>> for ItemOut<'a> {
    fn from(e: &FrameEntry<'a>) -> Self {
        Self {
            id: e.id.0,
            kind: e.kind,
            keyframe: e.keyframe,
            properties: &e.snapshot.properties,
            transform: e.snapshot.transform.map(|m| m.to_array()),
        }
    }
}

pub(crate) fn execute(db: &ProjectDb, command: Command, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::New { name, width, height, step, fps } => {
            if db.load(&name)?.is_some() {
                bail!("animation `{name}` already exists");
            }
            let grid = Grid::new(Bounds { x1: 0.0, y1: 0.0, x2: width, y2: height }, step)?;
            db.save(&Animation::new(name.clone(), grid, Fps::new(fps, 1)))?;
            writeln!(out, "created {name}")?;
        }
        Command::List => {
            for row in db.list()? {
                let updated = chrono::DateTime::from_timestamp(row.updated_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                writeln!(out, "{}\t{} items\tends at {}\t{}", row.name, row.item_count, row.end_time, updated)?;
            }
        }
        Command::Rm { name } => {
            if !db.delete(&name)? {
                bail!("animation `{name}` not found");
            }
            writeln!(out, "removed {name}")?;
        }
        Command::Add { anim, at, shape } => edit(db, &anim, out, |a| {
            let id = match shape {
                ShapeArgs::Rect { corners, style } => {
                    let (p1, p2) = points(corners);
                    a.add_dragged(Shape::rect(p1, style.fill, style.stroke, style.line_width), p1, p2, at)?
                }
                ShapeArgs::Ellipse { corners, style } => {
                    let (p1, p2) = points(corners);
                    a.add_dragged(Shape::ellipse(p1, style.fill, style.stroke, style.line_width), p1, p2, at)?
                }
                ShapeArgs::Line { corners, stroke, line_width } => {
                    let (p1, p2) = points(corners);
                    a.add_dragged(Shape::line(p1, stroke, line_width), p1, p2, at)?
                }
                ShapeArgs::Pixmap { image, x, y, width, height } => {
                    let at_point = a.grid.snap(Point::new(x, y));
                    a.add(Shape::pixmap(image, at_point, width, height), at)
                }
                ShapeArgs::Text { x, y, text, color, size } => {
                    let at_point = a.grid.snap(Point::new(x, y));
                    let id = a.add(Shape::text(at_point, color), at);
                    a.set_text(id, &text, at)?;
                    a.set_text_size(id, size, at)?;
                    id
                }
            };
            Ok(format!("added {id}"))
        })?,
        Command::Resize { anim, id, corners, at } => edit(db, &anim, out, |a| {
            let (p1, p2) = points(corners);
            a.resize(ItemId(id), p1, p2, at)?;
            Ok(format!("resized {} at {at}", ItemId(id)))
        })?,
        Command::Move { anim, id, dx, dy, at } => edit(db, &anim, out, |a| {
            let (dx, dy) = a.translate(ItemId(id), dx, dy, at)?;
            Ok(format!("moved {} by ({dx}, {dy}) at {at}", ItemId(id)))
        })?,
        Command::Flip { anim, id, at } => edit(db, &anim, out, |a| {
            a.flip(ItemId(id), at)?;
            Ok(format!("flipped {} at {at}", ItemId(id)))
        })?,
        Command::Rotate { anim, id, degrees, at } => edit(db, &anim, out, |a| {
            a.rotate(ItemId(id), degrees, at)?;
            Ok(format!("rotated {} by {degrees} at {at}", ItemId(id)))
        })?,
        Command::Fill { anim, id, fill, stroke, at } => edit(db, &anim, out, |a| {
            if !a.fill(ItemId(id), fill, stroke, at)? {
                bail!("{} cannot be painted", ItemId(id));
            }
            Ok(format!("painted {} at {at}", ItemId(id)))
        })?,
        Command::Text { anim, id, text, at } => edit(db, &anim, out, |a| {
            a.set_text(ItemId(id), &text, at)?;
            Ok(format!("retyped {} at {at}", ItemId(id)))
        })?,
        Command::TextSize { anim, id, size, at } => edit(db, &anim, out, |a| {
            let size = a.set_text_size(ItemId(id), size, at)?;
            Ok(format!("{} is now size {size} at {at}", ItemId(id)))
        })?,
        Command::Raise { anim, id } => edit(db, &anim, out, |a| {
            let moved = a.raise(ItemId(id))?;
            Ok(if moved { format!("raised {}", ItemId(id)) } else { format!("{} is already on top", ItemId(id)) })
        })?,
        Command::Lower { anim, id } => edit(db, &anim, out, |a| {
            let moved = a.lower(ItemId(id))?;
            Ok(if moved { format!("lowered {}", ItemId(id)) } else { format!("{} is already at the bottom", ItemId(id)) })
        })?,
        Command::Delete { anim, id, at } => edit(db, &anim, out, |a| {
            Ok(if a.delete_at(ItemId(id), at)? {
                format!("discarded {}", ItemId(id))
            } else {
                format!("{} hidden from {at}", ItemId(id))
            })
        })?,
        Command::Reveal { anim, id, from, to } => edit(db, &anim, out, |a| {
            a.reveal(ItemId(id), from, to)?;
            let ranges = a
                .item(ItemId(id))?
                .visibility()
                .iter()
                .map(|r| if r.is_open() { format!("{}..", r.from) } else { format!("{}..={}", r.from, r.to) })
                .collect::<Vec<_>>();
            Ok(format!("{} visible {}", ItemId(id), ranges.join(", ")))
        })?,
        Command::Show { anim, at, json } => {
            let a = db.load_required(&anim)?;
            if json {
                let frame = frame_out(&a, at)?;
                writeln!(out, "{}", serde_json::to_string_pretty(&frame)?)?;
            } else {
                write_frame(&a, at, out)?;
            }
        }
        Command::Play { anim, from, to, realtime } => {
            let a = db.load_required(&anim)?;
            let to = to.unwrap_or_else(|| a.end_time());
            if from > to {
                bail!("nothing to play: --from {from} is after {to}");
            }
            let period = Duration::from_secs_f64(a.fps.seconds(1));
            for t in from..=to {
                write_frame(&a, t, out)?;
                if realtime && t < to {
                    std::thread::sleep(period);
                }
            }
        }
        Command::Export { anim, path } => {
            let a = db.load_required(&anim)?;
            std::fs::write(&path, a.to_json()?).with_context(|| format!("writing {}", path.display()))?;
            writeln!(out, "exported {anim} to {}", path.display())?;
        }
        Command::Import { path, name } => {
            let body = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let mut a = Animation::from_json(&body).with_context(|| format!("parsing {}", path.display()))?;
            if let Some(name) = name {
                a.name = name;
            }
            db.save(&a)?;
            writeln!(out, "imported {} ({} items)", a.name, a.len())?;
        }
    }
    Ok(())
}

/// Loads `name`, applies `f`, stores the result and reports `f`'s message.
fn edit(db: &ProjectDb, name: &str, out: &mut dyn Write, f: impl FnOnce(&mut Animation) -> Result<String>) -> Result<()> {
    let mut anim = db.load_required(name)?;
    let msg = f(&mut anim)?;
    db.save(&anim)?;
    writeln!(out, "{msg}")?;
    Ok(())
}

fn points(c: Corners) -> (Point, Point) { (Point::new(c.x1, c.y1), Point::new(c.x2, c.y2)) }

fn frame_out(a: &Animation, time: Time) -> Result<FrameOut<'_>> {
    let items = a.frame_at(time)?.iter().map(ItemOut::from).collect();
    Ok(FrameOut { time, seconds: a.fps.seconds(time), items })
}

fn write_frame(a: &Animation, time: Time, out: &mut dyn Write) -> Result<()> {
    let frame = a.frame_at(time)?;
    writeln!(out, "t={time} ({:.2}s) {} visible", a.fps.seconds(time), frame.len())?;
    for e in &frame {
        let props = e.snapshot.properties.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        let transform = match e.snapshot.transform {
            Some(m) => format!(" transform={:?}", m.to_array()),
            None => String::new(),
        };
        writeln!(out, "  {} {} @{}: {props}{transform}", e.id, e.kind, e.keyframe)?;
    }
    Ok(())
}
