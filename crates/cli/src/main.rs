use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use project::ProjectDb;
use std::path::PathBuf;
use timeline::{Rgba, Time};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "flipbook", version, about = "Step-by-step shape animations on a shared timeline")]
struct Cli {
    /// SQLite file holding the animations (defaults to the app data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty animation
    New {
        name: String,
        #[arg(long, default_value_t = 800.0)]
        width: f64,
        #[arg(long, default_value_t = 520.0)]
        height: f64,
        /// Grid step used to snap coordinates
        #[arg(long, default_value_t = 1.0)]
        step: f64,
        #[arg(long, default_value_t = 10)]
        fps: u32,
    },
    /// List stored animations
    List,
    /// Remove a stored animation
    Rm { name: String },
    /// Add a drawable, visible from `--at` to the end
    Add {
        anim: String,
        #[arg(long, default_value_t = 0)]
        at: Time,
        #[command(subcommand)]
        shape: ShapeArgs,
    },
    /// Reshape a drawable from a drag between two points
    Resize {
        anim: String,
        id: u64,
        #[command(flatten)]
        corners: Corners,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Move a drawable, staying inside the drawing area
    Move {
        anim: String,
        id: u64,
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        dx: f64,
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        dy: f64,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Mirror a drawable horizontally
    Flip {
        anim: String,
        id: u64,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Rotate a drawable around its center
    Rotate {
        anim: String,
        id: u64,
        #[arg(allow_negative_numbers = true)]
        degrees: f64,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Recolor a drawable
    Fill {
        anim: String,
        id: u64,
        #[arg(long)]
        fill: Rgba,
        #[arg(long)]
        stroke: Rgba,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Replace the content of a text drawable
    Text {
        anim: String,
        id: u64,
        text: String,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Change the font size of a text drawable
    TextSize {
        anim: String,
        id: u64,
        size: u32,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Move a drawable one step up the stack
    Raise { anim: String, id: u64 },
    /// Move a drawable one step down the stack
    Lower { anim: String, id: u64 },
    /// Hide a drawable from `--at` on; drops it once it is never visible
    Delete {
        anim: String,
        id: u64,
        #[arg(long, default_value_t = 0)]
        at: Time,
    },
    /// Show a drawable again over a time range
    Reveal {
        anim: String,
        id: u64,
        #[arg(long)]
        from: Time,
        /// Last visible time (defaults to the end of the recording)
        #[arg(long)]
        to: Option<Time>,
    },
    /// Print the frame at one time
    Show {
        anim: String,
        #[arg(long, default_value_t = 0)]
        at: Time,
        #[arg(long)]
        json: bool,
    },
    /// Print consecutive frames
    Play {
        anim: String,
        #[arg(long, default_value_t = 0)]
        from: Time,
        /// Last frame (defaults to the animation's end)
        #[arg(long)]
        to: Option<Time>,
        /// Wait one frame period between frames
        #[arg(long)]
        realtime: bool,
    },
    /// Write an animation to a JSON file
    Export { anim: String, path: PathBuf },
    /// Read an animation from a JSON file
    Import {
        path: PathBuf,
        /// Store under this name instead of the one in the file
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ShapeArgs {
    Rect {
        #[command(flatten)]
        corners: Corners,
        #[command(flatten)]
        style: Style,
    },
    Ellipse {
        #[command(flatten)]
        corners: Corners,
        #[command(flatten)]
        style: Style,
    },
    Line {
        #[command(flatten)]
        corners: Corners,
        #[arg(long, default_value = "#000000")]
        stroke: Rgba,
        #[arg(long, default_value_t = 2.0)]
        line_width: f64,
    },
    Pixmap {
        image: String,
        x: f64,
        y: f64,
        #[arg(long, default_value_t = 64.0)]
        width: f64,
        #[arg(long, default_value_t = 64.0)]
        height: f64,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        #[arg(long, default_value = "#000000")]
        color: Rgba,
        #[arg(long, default_value_t = 10)]
        size: u32,
    },
}

#[derive(Debug, Clone, Copy, Args)]
struct Corners {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

#[derive(Debug, Clone, Copy, Args)]
struct Style {
    /// Fill color; the shape is outlined only when absent
    #[arg(long)]
    fill: Option<Rgba>,
    #[arg(long, default_value = "#000000")]
    stroke: Rgba,
    #[arg(long, default_value_t = 2.0)]
    line_width: f64,
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
    let cli = Cli::parse();
    let db_path = cli.db.unwrap_or_else(project::default_db_path);
    let db = ProjectDb::open_or_create(&db_path)?;
    tracing::debug!(path = %db.path().display(), "opened store");
    commands::execute(&db, cli.command, &mut std::io::stdout().lock())
}
