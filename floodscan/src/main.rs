mod input;
mod options;

use anyhow::{bail, Result};
use clap::Parser;
use demtile::Tile;
use indicatif::ProgressBar;
use inundation::{AnalysisEvent, AnalysisParams, AnalysisTask, FloodError};
use log::info;
use options::Cli;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.points.is_none() && cli.polygons.is_none() {
        bail!("at least one village layer (--points or --polygons) is required");
    }

    let dem = if cli.memmap {
        Tile::memmap(&cli.dem)
    } else {
        Tile::load(&cli.dem)
    }
    .map_err(FloodError::InvalidRaster)?;
    info!("loaded DEM {}", cli.dem.display());

    let points = cli.points.as_deref().map(input::load_points).transpose()?;
    let polygons = cli.polygons.as_deref().map(input::load_polygons).transpose()?;

    let task = AnalysisTask::new(AnalysisParams {
        dem,
        water_level: cli.water_level,
        points,
        polygons,
        output_path: cli.out,
        mask_dir: None,
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Running flood analysis...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let event = task.start().wait();
    spinner.finish_and_clear();

    match event {
        AnalysisEvent::Completed(summary) => {
            println!("Flooded village points: {}", summary.flooded_points);
            println!("Flooded village polygons: {}", summary.flooded_polygons);
            println!("Results saved to: {}", summary.output_path.display());
            Ok(())
        }
        AnalysisEvent::Cancelled(summary) => {
            println!(
                "Analysis cancelled; partial results saved to: {}",
                summary.output_path.display()
            );
            Ok(())
        }
        AnalysisEvent::Failed(message) => bail!("analysis failed: {message}"),
    }
}
