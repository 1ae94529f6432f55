pub mod math;
pub mod model;
pub mod io;
pub mod params;
pub mod results;

pub use model::phases::{PhaseModel, PhaseState, RunConfig, VectorPopulation};
pub use params::{ParameterSet, RawValue, ValidationIssue};
pub use results::{DerivedMetrics, SimulationResult};
