//! Lennard-Jones molecular dynamics of a single species in a cubic periodic
//! cell, with block-averaged thermodynamics.

pub mod block_average;
pub mod config;
pub mod error;
pub mod interaction;
pub mod lattice;
pub mod observables;
pub mod rdf;
pub mod simulation;

pub use block_average::{block_error_curve, block_statistics, BlockErrorPoint, BlockStatistics};
pub use config::Config;
pub use error::{Result, SimError};
pub use interaction::{ForceEngine, ForceFieldParams, Interaction, PairResult};
pub use lattice::initialize;
pub use observables::{Estimate, System, Thermodynamics};
pub use rdf::{correlation_function, RdfHistogram};
pub use simulation::{simulate, RunOutput, RunSettings, SimulationState, StepRecord, Trajectory};
