//! Projective measurement in the computational basis of every target space.

mod projective;
mod result;

pub use projective::{
    MEASUREMENT, PROJECTIVE_MEASUREMENT, ProjectiveMeasure, ProjectiveMeasurement,
    outcome_probabilities,
};
pub use result::MeasurementResult;
