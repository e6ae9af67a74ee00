//! Validation of coordinates and geometries
//!
//! Validators never fail on bad input values. They return a
//! [`ValidationReport`] listing every problem found, since invalid input is
//! an expected outcome.

pub mod coordinates;
pub mod geometry;
mod topology;

pub use coordinates::CoordinateValidator;
pub use geometry::{GeometryValidator, TopologyFix};

/// Outcome of a validation: a verdict plus human-readable reasons
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// A report with no problems
    pub fn ok() -> Self {
        ValidationReport { valid: true, errors: Vec::new() }
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.valid = false;
        self.errors.push(error.into());
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
    }

    /// `(valid, errors)` pair
    pub fn into_parts(self) -> (bool, Vec<String>) {
        (self.valid, self.errors)
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::ok()
    }
}
