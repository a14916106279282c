use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand};

use worldstitch::contour::{
    Contour, ContourError, JoinMethod, Method, MethodSet, SelectOperation,
};
use worldstitch::filter::FilterKind;
use worldstitch::merge::{MergeError, Merger};
use worldstitch::shaper::ShaperParams;
use worldstitch::shift::{Relighter, Shifter};
use worldstitch::world::{MemoryWorld, WorldAccess, WorldError};

#[derive(Parser, Debug)]
#[command(name = "worldstitch", version)]
#[command(about = "Stitches together existing map regions with newly generated areas \
by smoothing the boundary or separating the two sides with a river")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record the contour of the original world before new areas are added
    Trace(TraceArgs),
    /// Mark the map for vertical shifting, or shift it immediately
    Shift(ShiftArgs),
    /// Merge and smooth old and new areas along the recorded contour
    Merge(MergeArgs),
    /// Relight all chunks in the world without doing anything else
    Relight(RelightArgs),
}

#[derive(Args, Debug)]
struct TraceArgs {
    /// World directory
    world_dir: PathBuf,

    /// Type of merge between traced edge chunks; several may be given
    #[arg(short = 't', long = "type", value_parser = Method::from_str,
          default_values = ["river"])]
    types: Vec<Method>,

    /// How the new edge combines with the old one (union, intersect, difference)
    #[arg(short, long, value_parser = SelectOperation::from_str,
          default_value = "union")]
    select: SelectOperation,

    /// How old and new merge types join (add, replace, transition)
    #[arg(short, long, value_parser = JoinMethod::from_str,
          default_value = "replace")]
    join: JoinMethod,

    /// Keep unselected old contour entries instead of discarding them
    #[arg(short = 'b', long)]
    combine: bool,

    /// Discard unselected old contour entries (the default)
    #[arg(short = 'd', long, conflicts_with = "combine")]
    discard: bool,

    /// Ring width marked for seam smoothing by a transition join
    #[arg(long, default_value_t = 1)]
    tidy_radius: i32,

    /// Ignore any pre-existing contour file
    #[arg(short, long)]
    reset: bool,

    /// Contour file name inside the world directory
    #[arg(short, long, default_value = "contour.dat")]
    contour: String,
}

#[derive(Args, Debug)]
struct ShiftArgs {
    /// World directory
    world_dir: PathBuf,

    /// Number of blocks to shift the map down by (may be negative)
    #[arg(short, long, default_value_t = 1)]
    down: i32,

    /// Number of blocks to shift the map up by (overrides --down)
    #[arg(short, long)]
    up: Option<i32>,

    /// Shift now instead of marking chunks in the contour file
    #[arg(short, long)]
    immediate: bool,

    /// Ignore any pre-existing contour file
    #[arg(short, long)]
    reset: bool,

    /// Contour file name inside the world directory
    #[arg(short, long, default_value = "contour.dat")]
    contour: String,

    /// Skip relighting; faster but leaves dark areas
    #[arg(long)]
    no_relight: bool,
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// World directory
    world_dir: PathBuf,

    /// Smoothing filter factor for all cases
    #[arg(short, long)]
    smooth_factor: Option<f64>,

    /// River smoothing factor
    #[arg(long, default_value_t = 1.7)]
    factor_river: f64,

    /// Even smoothing factor
    #[arg(long, default_value_t = 1.0)]
    factor_even: f64,

    /// Filter to use in all cases (smooth, gauss)
    #[arg(short, long, value_parser = FilterKind::from_str)]
    filter: Option<FilterKind>,

    /// River filter to use
    #[arg(long, value_parser = FilterKind::from_str, default_value = "smooth")]
    filter_river: FilterKind,

    /// Even filter to use
    #[arg(long, value_parser = FilterKind::from_str, default_value = "smooth")]
    filter_even: FilterKind,

    /// Depth of surface blocks moved down to the carved valley bottom
    #[arg(long, default_value_t = 3)]
    cover_depth: usize,

    /// Y coordinate of sea level
    #[arg(long, default_value_t = 62)]
    sea_level: i32,

    /// Width of the river
    #[arg(short, long, default_value_t = 4)]
    river_width: i32,

    /// Width of the valley
    #[arg(short, long, default_value_t = 8)]
    valley_width: i32,

    /// Y coordinate of the river bottom
    #[arg(long, default_value_t = 58)]
    river_height: i32,

    /// Y coordinate of the valley bottom
    #[arg(long, default_value_t = 65)]
    valley_height: i32,

    /// Lower and upper bound on river centre deviation
    #[arg(long, value_parser = parse_bounds, default_value = "-2,2")]
    river_centre_deviation: (i32, i32),

    /// Lower and upper bound on river width deviation
    #[arg(long, value_parser = parse_bounds, default_value = "-1,1")]
    river_width_deviation: (i32, i32),

    /// Distance between river centre bends
    #[arg(long, default_value_t = 5.0)]
    river_centre_bend: f64,

    /// Distance between river width bends
    #[arg(long, default_value_t = 3.0)]
    river_width_bend: f64,

    /// Narrowing applied when a river or valley runs on both sides of a chunk
    #[arg(long, default_value_t = 1.5)]
    narrow_factor: f64,

    /// Skip the shifting phase
    #[arg(long)]
    no_shift: bool,

    /// Skip the merging phase
    #[arg(long)]
    no_merge: bool,

    /// Contour file name inside the world directory
    #[arg(short, long, default_value = "contour.dat")]
    contour: String,

    /// Skip relighting; faster but leaves dark areas
    #[arg(long)]
    no_relight: bool,
}

#[derive(Args, Debug)]
struct RelightArgs {
    /// World directory
    world_dir: PathBuf,
}

fn parse_bounds(raw: &str) -> Result<(i32, i32), String> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err("expected two comma separated integers".to_string());
    }
    let low = parts[0].trim().parse().map_err(|_| "bounds must be integers".to_string())?;
    let high = parts[1].trim().parse().map_err(|_| "bounds must be integers".to_string())?;
    if low > high {
        return Err("lower bound exceeds upper bound".to_string());
    }
    Ok((low, high))
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("could not read contour data: {0}")]
    Contour(#[from] ContourError),
    #[error("could not read world data: {0}")]
    World(#[from] WorldError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("{0}")]
    Message(String),
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Trace(args) => run_trace(args),
        Command::Shift(args) => run_shift(args),
        Command::Merge(args) => run_merge(args),
        Command::Relight(args) => run_relight(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the contour file, treating an absent file as an empty contour.
fn get_contour(path: &Path, reset: bool) -> Result<Contour, AppError> {
    let mut contour = Contour::new();
    if reset {
        return Ok(contour);
    }
    match contour.read(path) {
        Ok(()) => Ok(contour),
        Err(e) if e.is_not_found() => Ok(contour),
        Err(e) => Err(e.into()),
    }
}

/// Rewrite the contour file, deleting it once the contour empties.
fn save_contour(contour: &Contour, path: &Path) -> Result<(), AppError> {
    if contour.is_empty() {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Contour(e.into())),
        }
    } else {
        contour.write(path).map_err(AppError::from)
    }
}

fn run_trace(args: TraceArgs) -> Result<(), AppError> {
    let contour_path = args.world_dir.join(&args.contour);

    println!("Getting existing world contour...");
    let mut contour = get_contour(&contour_path, args.reset)?;
    contour.tidy_radius = args.tidy_radius;

    println!("Tracing world contour...");
    let world = MemoryWorld::load(&args.world_dir)?;
    let existing: HashSet<_> = world.coords().into_iter().collect();
    let traced = Contour::trace(&existing, MethodSet::of(&args.types));
    contour.combine(traced, args.select, args.join, args.combine);

    println!("Recording world contour data...");
    save_contour(&contour, &contour_path)?;

    println!("World contour detection complete");
    Ok(())
}

fn run_shift(args: ShiftArgs) -> Result<(), AppError> {
    let distance = -args.up.map(|up| -up).unwrap_or(args.down);
    let shifter = Shifter {
        relight: !args.no_relight,
    };

    if !args.immediate {
        let contour_path = args.world_dir.join(&args.contour);
        let mut contour = get_contour(&contour_path, args.reset)?;

        println!("Loading world...");
        let world = MemoryWorld::load(&args.world_dir)?;

        println!("Marking chunks for shifting...");
        shifter.mark(&world, &mut contour, distance);

        println!("Recording world shift data...");
        save_contour(&contour, &contour_path)?;

        println!("World shift marking complete");
    } else {
        println!("Loading world...");
        let mut world = MemoryWorld::load(&args.world_dir)?;

        println!("Shifting chunks...");
        let shifted = shifter.shift_all(&mut world, distance);

        println!("Relighting and saving...");
        shifter.commit(&mut world)?;

        println!("Finished shifting, shifted: {} chunks", shifted);
    }
    Ok(())
}

fn run_merge(args: MergeArgs) -> Result<(), AppError> {
    let contour_path = args.world_dir.join(&args.contour);

    println!("Getting saved world contour...");
    let mut contour = Contour::new();
    if let Err(e) = contour.read(&contour_path) {
        if e.is_not_found() {
            return Err(AppError::Message(
                "no contour data to merge with (use trace mode to generate)".to_string(),
            ));
        }
        return Err(e.into());
    }

    let params = shaper_params(&args);

    if !contour.shift.is_empty() && !args.no_shift {
        println!("Loading world...");
        let mut world = MemoryWorld::load(&args.world_dir)?;

        println!("Shifting chunks...");
        let shifter = Shifter {
            relight: !args.no_relight,
        };
        let shifted = shifter.shift_marked(&mut world, &contour);

        println!("Relighting and saving...");
        shifter.commit(&mut world)?;
        println!("Finished shifting, shifted: {} chunks", shifted);

        println!("Updating contour data");
        contour.shift.clear();
        save_contour(&contour, &contour_path)?;
    }

    if !contour.edges.is_empty() && !args.no_merge {
        println!("Loading world...");
        let mut world = MemoryWorld::load(&args.world_dir)?;

        println!("Merging chunks...");
        let total = contour.edges.len();
        let merger = Merger::new(world.materials(), params)?;
        let report = merger.erode(&mut world, &contour)?;

        println!("Relighting and saving...");
        if !args.no_relight {
            world.relight();
        }
        world.save()?;
        println!(
            "Finished merging, merged: {}/{} chunks",
            report.completed.len(),
            total
        );

        println!("Updating contour data");
        for coord in &report.completed {
            contour.edges.remove(coord);
        }
        save_contour(&contour, &contour_path)?;
    }

    Ok(())
}

fn run_relight(args: RelightArgs) -> Result<(), AppError> {
    println!("Loading world...");
    let mut world = MemoryWorld::load(&args.world_dir)?;

    println!("Marking and relighting chunks...");
    let relit = Relighter::relight(&mut world);

    println!("Saving...");
    Relighter::commit(&mut world)?;

    println!("Finished relighting, relit: {} chunks", relit);
    Ok(())
}

/// Fold the command line tunables into shaper parameters. Command line
/// widths are full widths; internally half-widths are used, rounding up.
fn shaper_params(args: &MergeArgs) -> ShaperParams {
    let mut params = ShaperParams::default();
    params.river_width = args.river_width / 2 + args.river_width % 2;
    params.valley_width = args.valley_width / 2 + args.valley_width % 2;
    params.river_height = args.river_height;
    params.valley_height = args.valley_height;
    params.sea_level = args.sea_level;
    params.cover_depth = args.cover_depth;
    params.filter_river = args.filter.unwrap_or(args.filter_river);
    params.filter_even = args.filter.unwrap_or(args.filter_even);
    params.filter_factor_river = args.smooth_factor.unwrap_or(args.factor_river);
    params.filter_factor_even = args.smooth_factor.unwrap_or(args.factor_even);
    params.mask.narrowing_factor = args.narrow_factor;
    params.meander.centre_range = args.river_centre_deviation;
    params.meander.width_range = args.river_width_deviation;
    params.meander.centre_step = args.river_centre_bend;
    params.meander.width_step = args.river_width_bend;
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_discard_is_the_default() {
        let cli = Cli::try_parse_from(["worldstitch", "trace", "w", "--discard"]).unwrap();
        let Command::Trace(args) = cli.command else {
            panic!("expected trace");
        };
        assert!(args.discard);
        assert!(!args.combine);
        // Discard and combine are opposites and cannot be given together.
        assert!(Cli::try_parse_from(["worldstitch", "trace", "w", "-d", "-b"]).is_err());
    }

    #[test]
    fn test_parse_bounds() {
        assert_eq!(parse_bounds("-2, 2").unwrap(), (-2, 2));
        assert!(parse_bounds("3,1").is_err());
        assert!(parse_bounds("1").is_err());
    }
}
