//! chart-flow: declarative charting core.
//!
//! A chart is described by a JSON option tree. [`ChartEngine`] merges it into
//! a [`model::GlobalModel`], runs the registered stage handlers through a
//! dirty-tracked, optionally progressive [`pipeline::Scheduler`], and keeps
//! one [`view::View`] per model alive across updates. Rendering goes through
//! the [`render::Renderer`] trait so hosts can plug their own backend.

pub mod api;
pub mod coord;
pub mod core;
pub mod error;
pub mod extensions;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod telemetry;
pub mod view;

pub use api::{
    ChartEngine, ChartEngineConfig, ChartEvent, ChartRegistry, DispatchOpts, ResizeOpts,
    SetOptionOpts,
};
pub use error::{ChartError, ChartResult};
pub use model::Payload;
