//! # esda-algorithms
//!
//! Exploratory spatial data analysis on top of `esda-core`:
//! - `lisa`: local indicators of spatial association (local Moran, Geary,
//!   join count, Getis-Ord G/G*, quantile LISA) with conditional-permutation
//!   inference
//! - `regionalization`: spatially constrained clustering (SKATER, REDCAP,
//!   SCHC, AZP, max-p) with the sum-of-squares decomposition
//! - `validation`: partition diagnostics (fragmentation, join-count ratio,
//!   compactness, diameter) and `make_spatial`
//!
//! All stochastic computations are seeded and deterministic regardless of
//! thread count; the `parallel` feature (default on) enables rayon.

mod maybe_rayon;

pub mod lisa;
pub mod regionalization;
pub mod validation;

pub use lisa::{
    batch_local_moran, local_bijoincount, local_bimoran, local_g, local_geary, local_gstar,
    local_joincount, local_moran, local_moran_eb, local_multigeary, local_multijoincount,
    local_multiquantilelisa, local_quantilelisa, BatchLisaResult, LisaConfig, LisaResult,
};
pub use regionalization::{
    azp_greedy, azp_sa, azp_tabu, between_ss, maxp_greedy, maxp_sa, maxp_tabu, redcap, schc,
    skater, total_ss, within_ss, AzpParams, ClusteringResult, Linkage, MaxpParams, MinBound,
    RedcapMethod, RegionalizationConfig,
};
pub use validation::{make_spatial, spatial_validation, ValidationResult};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::lisa::{LisaConfig, LisaResult};
    pub use crate::regionalization::{
        ClusteringResult, Linkage, MinBound, RedcapMethod, RegionalizationConfig,
    };
    pub use crate::validation::{make_spatial, spatial_validation, ValidationResult};
    pub use esda_core::prelude::*;
}
