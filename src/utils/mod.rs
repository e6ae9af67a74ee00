//! Utility modules for common functionality
//!
//! This module provides various utility functions and types used throughout the application.

pub mod logger;
pub mod progress;
pub mod units;

pub use progress::ProgressTracker;
pub use units::{bbox_around, degrees_to_meters, feet_to_meters, haversine_distance, meters_to_degrees, meters_to_feet};
