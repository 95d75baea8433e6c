use clap::Parser;
use std::path::PathBuf;

/// Classify village features against a simulated flood extent and
/// export the flooded features to CSV.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// DEM raster (SRTM .hgt).
    #[arg(short, long)]
    pub dem: PathBuf,

    /// Village points (GeoJSON FeatureCollection).
    #[arg(long)]
    pub points: Option<PathBuf>,

    /// Village polygons (GeoJSON FeatureCollection).
    #[arg(long)]
    pub polygons: Option<PathBuf>,

    /// Flood water level in meters.
    #[arg(short, long)]
    pub water_level: f64,

    /// Output CSV file.
    #[arg(short, long, default_value = "flooded_villages.csv")]
    pub out: PathBuf,

    /// Memory-map the DEM instead of reading it into memory.
    #[arg(long)]
    pub memmap: bool,
}
