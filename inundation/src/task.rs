//! Background execution of a flood analysis.
//!
//! A task moves `Pending -> Running -> {Completed, Failed, Cancelled}`:
//! [`AnalysisTask::new`] is the pending state, [`AnalysisTask::start`]
//! dispatches a worker thread, and the terminal state arrives as an
//! [`AnalysisEvent`] on the handle's channel. Cancellation is
//! cooperative: the worker polls the task's [`CancelToken`] before
//! each feature, and a cancelled run still writes whatever partial
//! report had accumulated.

use crate::{
    cancel::CancelToken,
    classify::Classify,
    features::{PointFeature, PolygonFeature},
    report,
};
use crossbeam_channel::{bounded, Receiver};
use demtile::Tile;
use log::{info, warn};
use std::{
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    thread::{self, JoinHandle},
};

/// Inputs for one analysis run; immutable once the task is built.
pub struct AnalysisParams {
    pub dem: Tile,
    pub water_level: f64,
    pub points: Option<Vec<PointFeature>>,
    pub polygons: Option<Vec<PolygonFeature>>,
    pub output_path: PathBuf,
    /// Directory for the mask's temporary backing file; the system
    /// temp directory when `None`.
    pub mask_dir: Option<PathBuf>,
}

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub flooded_points: usize,
    pub flooded_polygons: usize,
    pub output_path: PathBuf,
}

/// Terminal notification for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisEvent {
    /// All requested feature sets processed and the report written.
    Completed(AnalysisSummary),
    /// Stopped at a cancellation checkpoint; the summary reflects the
    /// partial report that was still written.
    Cancelled(AnalysisSummary),
    /// The run failed; the report was not written unless the failure
    /// occurred while writing it.
    Failed(String),
}

/// A flood analysis that has not started yet.
pub struct AnalysisTask {
    params: AnalysisParams,
    token: CancelToken,
}

impl AnalysisTask {
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            params,
            token: CancelToken::new(),
        }
    }

    /// Returns the task's cancellation token. Cancelling before
    /// `start` makes the run stop at its first checkpoint.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Dispatches the analysis onto a worker thread.
    pub fn start(self) -> RunningAnalysis {
        let Self { params, token } = self;
        let (tx, events) = bounded(1);
        let worker_token = token.clone();
        let thread = thread::spawn(move || {
            let event = panic::catch_unwind(AssertUnwindSafe(|| run(&params, &worker_token)))
                .unwrap_or_else(|_| {
                    warn!("analysis worker panicked");
                    AnalysisEvent::Failed("unexpected error during analysis".to_owned())
                });
            let _ = tx.send(event);
        });
        RunningAnalysis {
            token,
            events,
            thread,
        }
    }
}

/// Handle to a dispatched analysis.
pub struct RunningAnalysis {
    token: CancelToken,
    events: Receiver<AnalysisEvent>,
    thread: JoinHandle<()>,
}

impl RunningAnalysis {
    /// Requests cooperative cancellation; the worker stops before the
    /// next feature.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Returns the terminal event without blocking, if the run has
    /// finished.
    pub fn try_event(&self) -> Option<AnalysisEvent> {
        self.events.try_recv().ok()
    }

    /// Blocks until the run reaches a terminal state.
    pub fn wait(self) -> AnalysisEvent {
        let event = self
            .events
            .recv()
            .unwrap_or_else(|_| AnalysisEvent::Failed("analysis worker went away".to_owned()));
        let _ = self.thread.join();
        event
    }
}

fn run(params: &AnalysisParams, token: &CancelToken) -> AnalysisEvent {
    info!(
        "starting flood analysis: water level {}, {} points, {} polygons, output {}",
        params.water_level,
        params.points.as_ref().map_or(0, Vec::len),
        params.polygons.as_ref().map_or(0, Vec::len),
        params.output_path.display(),
    );

    let mut job = Classify::new(&params.dem, params.water_level);
    if let Some(points) = &params.points {
        job = job.points(points);
    }
    if let Some(polygons) = &params.polygons {
        job = job.polygons(polygons);
    }
    if let Some(dir) = &params.mask_dir {
        job = job.mask_dir(dir);
    }

    let classification = match job.run(token) {
        Ok(classification) => classification,
        Err(e) => return AnalysisEvent::Failed(e.to_string()),
    };

    // A cancelled run still gets its partial report.
    if let Err(e) = report::write_csv(
        &params.output_path,
        &classification.flooded_points,
        &classification.flooded_polygons,
    ) {
        return AnalysisEvent::Failed(e.to_string());
    }

    let summary = AnalysisSummary {
        flooded_points: classification.flooded_points.len(),
        flooded_polygons: classification.flooded_polygons.len(),
        output_path: params.output_path.clone(),
    };

    if classification.interrupted {
        info!("flood analysis cancelled after {} results", {
            summary.flooded_points + summary.flooded_polygons
        });
        AnalysisEvent::Cancelled(summary)
    } else {
        info!(
            "flood analysis completed: {} flooded points, {} flooded polygons",
            summary.flooded_points, summary.flooded_polygons
        );
        AnalysisEvent::Completed(summary)
    }
}
