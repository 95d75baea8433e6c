use demtile::DemError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FloodError {
    #[error("no village features provided for analysis")]
    NoInputFeatures,

    #[error("invalid DEM raster: {0}")]
    InvalidRaster(#[from] DemError),

    #[error("failed to build flood mask: {0}")]
    MaskConstruction(#[source] std::io::Error),

    #[error("failed to write report: {0}")]
    Report(#[source] csv::Error),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
