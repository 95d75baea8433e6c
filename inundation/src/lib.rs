//! Flood extent classification for village features.
//!
//! Given a DEM tile and a water level, this crate builds a
//! materialized flood mask, classifies point and polygon features as
//! flooded by sampling the mask at each feature's representative
//! location, and writes the flooded features to a CSV report. The
//! whole procedure can run as a cancellable background task.

mod cancel;
mod classify;
mod error;
mod features;
mod mask;
mod report;
mod retry;
mod task;

pub use crate::{
    cancel::{Cancel, CancelToken, NeverCancel},
    classify::{Classification, Classify, FeatureKind, Flooded},
    error::FloodError,
    features::{FeatureId, PointFeature, PolygonFeature},
    mask::FloodMask,
    report::write_csv,
    retry::with_retries,
    task::{AnalysisEvent, AnalysisParams, AnalysisSummary, AnalysisTask, RunningAnalysis},
};
