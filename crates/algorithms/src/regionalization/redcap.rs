//! REDCAP: regionalization with dynamically constrained agglomerative
//! clustering and partitioning.
//!
//! A spanning structure is grown by contiguity-constrained agglomeration
//! under the chosen linkage, then partitioned with the same greedy tree-cut
//! used by SKATER. The first-order single-linkage variant reduces to the
//! minimum spanning tree.

use std::str::FromStr;

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::linkage::{constrained_agglomeration, Linkage};
use super::tree::{attribute_edges, minimum_spanning_tree, tree_partition};
use super::{build_matrix, check_k, ClusteringResult, MinBound, RegionalizationConfig};

/// The five REDCAP spanning-structure methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedcapMethod {
    FirstOrderSingleLinkage,
    FullOrderSingleLinkage,
    FullOrderAverageLinkage,
    FullOrderCompleteLinkage,
    FullOrderWardLinkage,
}

impl FromStr for RedcapMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "firstorder-singlelinkage" => Ok(RedcapMethod::FirstOrderSingleLinkage),
            "fullorder-singlelinkage" => Ok(RedcapMethod::FullOrderSingleLinkage),
            "fullorder-averagelinkage" => Ok(RedcapMethod::FullOrderAverageLinkage),
            "fullorder-completelinkage" => Ok(RedcapMethod::FullOrderCompleteLinkage),
            "fullorder-wardlinkage" => Ok(RedcapMethod::FullOrderWardLinkage),
            other => Err(Error::invalid_parameter(
                "method",
                other,
                "expected one of firstorder-singlelinkage, fullorder-singlelinkage, \
                 fullorder-averagelinkage, fullorder-completelinkage, fullorder-wardlinkage",
            )),
        }
    }
}

/// Partition the observations into `k` contiguous regions with REDCAP.
pub fn redcap(
    w: &WeightsGraph,
    data: &[AttributeVector],
    k: usize,
    method: RedcapMethod,
    bound: Option<&MinBound>,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    let n = w.num_obs();
    check_k(k, n)?;
    if let Some(b) = bound {
        b.validate(n)?;
    }
    let matrix = build_matrix(data, cfg.scale_method)?;

    let tree = match method {
        RedcapMethod::FirstOrderSingleLinkage => {
            let edges = attribute_edges(w, &matrix, cfg.distance_metric);
            minimum_spanning_tree(n, edges)?
        }
        _ => {
            let linkage = match method {
                RedcapMethod::FullOrderSingleLinkage => Linkage::Single,
                RedcapMethod::FullOrderAverageLinkage => Linkage::Average,
                RedcapMethod::FullOrderCompleteLinkage => Linkage::Complete,
                RedcapMethod::FullOrderWardLinkage => Linkage::Ward,
                RedcapMethod::FirstOrderSingleLinkage => unreachable!(),
            };
            constrained_agglomeration(w, &matrix, cfg.distance_metric, linkage)?.spanning_tree()?
        }
    };

    let clusters = tree_partition(&tree, &matrix, k, bound)?;
    Ok(ClusteringResult::evaluate(clusters, &matrix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::queen_weights;

    use crate::regionalization::skater::skater;
    use crate::regionalization::tree::label_components;

    #[test]
    fn test_method_names() {
        assert_eq!(
            "fullorder-wardlinkage".parse::<RedcapMethod>().unwrap(),
            RedcapMethod::FullOrderWardLinkage
        );
        assert!("fullorder-medianlinkage".parse::<RedcapMethod>().is_err());
    }

    #[test]
    fn test_firstorder_single_matches_skater() {
        let w = queen_weights(&unit_lattice(5, 5), &Default::default()).unwrap();
        let data = vec![AttributeVector::new(
            (0..25).map(|i| ((i * 31) % 11) as f64).collect(),
        )];
        let cfg = RegionalizationConfig::default();
        let a = redcap(
            &w,
            &data,
            4,
            RedcapMethod::FirstOrderSingleLinkage,
            None,
            &cfg,
        )
        .unwrap();
        let b = skater(&w, &data, 4, None, &cfg).unwrap();
        assert_eq!(a.clusters(), b.clusters());
    }

    #[test]
    fn test_all_methods_give_connected_regions() {
        let w = queen_weights(&unit_lattice(6, 6), &Default::default()).unwrap();
        let data = vec![AttributeVector::new(
            (0..36).map(|i| ((i / 6) as f64) * 2.0 + ((i * 17) % 5) as f64 * 0.1).collect(),
        )];
        let cfg = RegionalizationConfig::default();
        for method in [
            RedcapMethod::FirstOrderSingleLinkage,
            RedcapMethod::FullOrderSingleLinkage,
            RedcapMethod::FullOrderAverageLinkage,
            RedcapMethod::FullOrderCompleteLinkage,
            RedcapMethod::FullOrderWardLinkage,
        ] {
            let r = redcap(&w, &data, 4, method, None, &cfg).unwrap();
            assert_eq!(r.num_clusters(), 4, "{method:?}");
            for c in 0..4 {
                assert_eq!(
                    label_components(&w, r.clusters(), c).len(),
                    1,
                    "{method:?} cluster {c}"
                );
            }
            let within: f64 = r.within_ss().iter().sum();
            assert!(
                (within + r.between_ss() - r.total_ss()).abs() < 1e-6 * r.total_ss(),
                "{method:?}"
            );
        }
    }
}
