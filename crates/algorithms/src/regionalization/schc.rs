//! SCHC: spatially constrained hierarchical clustering. The dendrogram from
//! contiguity-constrained agglomeration is cut at `k` clusters.

use esda_core::{AttributeVector, Result, WeightsGraph};

use super::linkage::{constrained_agglomeration, Linkage};
use super::{build_matrix, check_k, ClusteringResult, RegionalizationConfig};

pub fn schc(
    w: &WeightsGraph,
    data: &[AttributeVector],
    k: usize,
    linkage: Linkage,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    let n = w.num_obs();
    check_k(k, n)?;
    let matrix = build_matrix(data, cfg.scale_method)?;

    let agg = constrained_agglomeration(w, &matrix, cfg.distance_metric, linkage)?;
    let clusters = agg.labels(k);
    Ok(ClusteringResult::evaluate(clusters, &matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::queen_weights;

    use crate::regionalization::tree::label_components;

    #[test]
    fn test_ward_recovers_halves() {
        let w = queen_weights(&unit_lattice(4, 4), &Default::default()).unwrap();
        // Left half low, right half high.
        let vals: Vec<f64> = (0..16).map(|i| if i % 4 < 2 { 0.0 } else { 50.0 }).collect();
        let data = vec![AttributeVector::new(vals)];
        let r = schc(&w, &data, 2, Linkage::Ward, &RegionalizationConfig::default()).unwrap();
        assert_eq!(r.num_clusters(), 2);
        assert!(r.ratio() > 0.99);
        assert_eq!(r.clusters()[0], r.clusters()[1]);
        assert_ne!(r.clusters()[0], r.clusters()[2]);
    }

    #[test]
    fn test_regions_connected_for_all_linkages() {
        let w = queen_weights(&unit_lattice(5, 5), &Default::default()).unwrap();
        let data = vec![AttributeVector::new(
            (0..25).map(|i| ((i * 13) % 7) as f64 + (i / 5) as f64).collect(),
        )];
        let cfg = RegionalizationConfig::default();
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let r = schc(&w, &data, 3, linkage, &cfg).unwrap();
            for c in 0..3 {
                assert_eq!(
                    label_components(&w, r.clusters(), c).len(),
                    1,
                    "{linkage:?} cluster {c}"
                );
            }
        }
    }

    #[test]
    fn test_k_equals_n_is_singletons() {
        let w = queen_weights(&unit_lattice(2, 2), &Default::default()).unwrap();
        let data = vec![AttributeVector::new(vec![1.0, 2.0, 3.0, 4.0])];
        let r = schc(&w, &data, 4, Linkage::Average, &RegionalizationConfig::default()).unwrap();
        let mut labels = r.clusters().to_vec();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2, 3]);
    }
}
