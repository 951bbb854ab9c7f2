//! # esda-core
//!
//! Core types for exploratory spatial data analysis:
//! - `GeometrySet`: point/polygon observation geometries
//! - `KdTree`: 2D spatial index for neighbor queries
//! - `WeightsGraph`: immutable spatial weights (contiguity, distance band,
//!   kNN, kernel, GAL/GWT file load) with eagerly cached summary statistics
//! - `AttributeVector`: numeric columns with undefined masks, plus scaling
//!   transforms and attribute-space distance metrics
//!
//! Statistic computations live in the `esda-algorithms` crate; this crate is
//! the shared substrate they all consume.

pub mod data;
pub mod distance;
pub mod error;
pub mod geometry;
pub mod kdtree;
pub mod weights;

pub use data::{AttributeVector, DistanceMetric, ScaleMethod};
pub use distance::GeoDistance;
pub use error::{Error, Result};
pub use geometry::GeometrySet;
pub use kdtree::KdTree;
pub use weights::{WeightsGraph, WeightsKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{AttributeVector, DistanceMetric, ScaleMethod};
    pub use crate::error::{Error, Result};
    pub use crate::geometry::GeometrySet;
    pub use crate::weights::{
        distance_weights, kernel_bandwidth_weights, kernel_knn_weights, knn_weights,
        min_threshold, queen_weights, rook_weights, ContiguityParams, DistanceBandParams,
        KernelType, WeightsGraph,
    };
}
