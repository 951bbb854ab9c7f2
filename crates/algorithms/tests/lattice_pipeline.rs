//! End-to-end pipeline on a synthetic lattice: contiguity weights, LISA
//! statistics, regionalization and validation diagnostics working together.

use esda_algorithms::{
    local_joincount, local_moran, maxp_greedy, redcap, skater, spatial_validation, LisaConfig,
    MaxpParams, MinBound, RedcapMethod, RegionalizationConfig,
};
use esda_core::geometry::unit_lattice;
use esda_core::weights::{knn_weights, queen_weights};
use esda_core::AttributeVector;

const SIDE: usize = 8;

/// Four homogeneous quadrants with distinct levels.
fn quadrant_values() -> Vec<f64> {
    let mut v = Vec::with_capacity(SIDE * SIDE);
    for r in 0..SIDE {
        for c in 0..SIDE {
            let q = (r >= SIDE / 2) as usize * 2 + (c >= SIDE / 2) as usize;
            v.push((q * 8) as f64 + ((r * 3 + c) % 2) as f64 * 0.25);
        }
    }
    v
}

#[test]
fn test_weights_to_lisa_to_regions() {
    let geoms = unit_lattice(SIDE, SIDE);
    let w = queen_weights(&geoms, &Default::default()).unwrap();
    assert!(w.is_symmetric());
    assert!(!w.has_isolates());

    let data = AttributeVector::new(quadrant_values());

    // Strong quadrant structure shows up as local clustering.
    let moran = local_moran(&w, &data, &LisaConfig::default()).unwrap();
    let hh = moran
        .clusters()
        .iter()
        .filter(|&&c| c == 1 || c == 2)
        .count();
    assert!(hh > 0, "expected significant same-sign cells");
    for p in moran.pvalues() {
        assert!(p.is_nan() || (*p > 0.0 && *p <= 1.0));
    }

    // The same structure is recoverable as 4 contiguous regions.
    let cfg = RegionalizationConfig::default();
    let regions = skater(&w, &[data.clone()], 4, None, &cfg).unwrap();
    assert_eq!(regions.num_clusters(), 4);
    assert!(regions.ratio() > 0.95, "ratio {}", regions.ratio());

    let diag = spatial_validation(regions.clusters(), &w, Some(&geoms)).unwrap();
    assert!(diag.spatially_constrained);
    let dia = diag.diameter.unwrap();
    assert_eq!(dia.len(), 4);
    // Each 4x4 quadrant has queen diameter 3.
    for d in &dia {
        assert!(d.steps <= 4);
    }
    // All intra-cluster links dominate: high join-count ratio.
    assert!(diag.all_joincount_ratio.ratio > 0.7);
}

#[test]
fn test_redcap_agrees_with_skater_on_clean_structure() {
    let geoms = unit_lattice(SIDE, SIDE);
    let w = queen_weights(&geoms, &Default::default()).unwrap();
    let data = vec![AttributeVector::new(quadrant_values())];
    let cfg = RegionalizationConfig::default();

    let a = skater(&w, &data, 4, None, &cfg).unwrap();
    let b = redcap(&w, &data, 4, RedcapMethod::FullOrderWardLinkage, None, &cfg).unwrap();
    // Both should carve out the quadrants almost perfectly.
    assert!(a.ratio() > 0.95);
    assert!(b.ratio() > 0.95);
}

#[test]
fn test_maxp_on_lattice_respects_population_bound() {
    let geoms = unit_lattice(SIDE, SIDE);
    let w = queen_weights(&geoms, &Default::default()).unwrap();
    let data = vec![AttributeVector::new(quadrant_values())];
    // Uniform "population" of 1 per cell, regions of at least 10.
    let bound = MinBound::new(vec![1.0; SIDE * SIDE], 10.0);
    let r = maxp_greedy(
        &w,
        &data,
        &bound,
        &MaxpParams {
            initial: 25,
            ..Default::default()
        },
        &RegionalizationConfig::default(),
    )
    .unwrap();
    assert!(r.num_clusters() >= 2);
    for c in 0..r.num_clusters() {
        let size = r.clusters().iter().filter(|&&x| x == c).count();
        assert!(size >= 10, "region {c} has {size} members");
    }
}

#[test]
fn test_point_pipeline_knn_joincount() {
    // Points on a jittered grid; events concentrated in one corner.
    let coords: Vec<(f64, f64)> = (0..36)
        .map(|i| {
            let (r, c) = (i / 6, i % 6);
            (c as f64 + 0.01 * r as f64, r as f64)
        })
        .collect();
    let geoms = esda_core::GeometrySet::from_coords(&coords);
    let w = knn_weights(&geoms, 4, &Default::default()).unwrap();
    for i in 0..36 {
        assert_eq!(w.neighbors(i).len(), 4);
    }

    let mut events = vec![0.0; 36];
    for &i in &[0, 1, 6, 7, 12] {
        events[i] = 1.0;
    }
    let jc = local_joincount(&w, &AttributeVector::new(events), &LisaConfig::default()).unwrap();
    // The corner event cell sees mostly event neighbors.
    assert!(jc.values()[0] >= 2.0);
    assert!(jc.pvalues()[0] < 0.05);
}
