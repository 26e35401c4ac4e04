//! Session-side orchestration of one analysis run against the stage handlers.

pub mod backend;
pub mod controller;
pub mod steps;

pub use backend::{BackendError, HttpBackend, StageBackend};
pub use controller::{ControllerOptions, PipelineController, ResearchCache, RunOutcome};
pub use steps::{AnalysisStep, StepBoard, StepId, StepStatus};
