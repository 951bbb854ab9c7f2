//! Loading weights graphs from sparse neighbor-list serializations.
//!
//! Two text layouts are supported, covering the three common record formats:
//! GAL (neighbor-list records) and GWT/KWT (one edge-with-weight record per
//! line; KWT is the kernel-weights variant of the same layout). Both start
//! with a whitespace-delimited header `<flag> <num_obs> ...` and key records
//! by external ids, which are remapped to internal `0..n-1` indices through
//! the caller-supplied id vector.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use std::collections::HashMap;

use crate::{Error, Result};

use super::{WeightsGraph, WeightsKind};

/// Load a GAL file.
pub fn read_gal(path: impl AsRef<Path>, id_vec: &[i64]) -> Result<WeightsGraph> {
    read_gal_records(BufReader::new(File::open(path)?), id_vec)
}

/// Load a GWT (or KWT) file.
pub fn read_gwt(path: impl AsRef<Path>, id_vec: &[i64]) -> Result<WeightsGraph> {
    read_gwt_records(BufReader::new(File::open(path)?), id_vec)
}

/// Parse GAL records: per observation, a `<id> <count>` line followed by a
/// line of `count` neighbor ids.
pub fn read_gal_records<R: BufRead>(reader: R, id_vec: &[i64]) -> Result<WeightsGraph> {
    let mut lines = reader.lines().enumerate();

    let (id_map, _) = parse_header(&mut lines, id_vec)?;
    let n = id_vec.len();
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];

    while let Some((lineno, line)) = lines.next() {
        let line = line?;
        let mut items = line.split_whitespace();
        let Some(first) = items.next() else { continue };

        let i = lookup(&id_map, first, lineno)?;
        let count: usize = items
            .next()
            .ok_or_else(|| format_err(lineno, "missing neighbor count"))?
            .parse()
            .map_err(|_| format_err(lineno, "neighbor count is not an integer"))?;

        let (nbr_lineno, nbr_line) = lines
            .next()
            .ok_or_else(|| format_err(lineno, "missing neighbor record line"))?;
        let nbr_line = nbr_line?;
        let ids: Vec<&str> = nbr_line.split_whitespace().collect();
        if ids.len() != count {
            return Err(format_err(
                nbr_lineno,
                format!("expected {count} neighbor ids, found {}", ids.len()),
            ));
        }
        for tok in ids {
            let j = lookup(&id_map, tok, nbr_lineno)?;
            if j != i {
                neighbors[i].push(j);
            }
        }
    }

    Ok(WeightsGraph::from_parts(neighbors, None, WeightsKind::File))
}

/// Parse GWT/KWT records: one `<id_i> <id_j> <weight>` line per edge.
pub fn read_gwt_records<R: BufRead>(reader: R, id_vec: &[i64]) -> Result<WeightsGraph> {
    let mut lines = reader.lines().enumerate();

    let (id_map, _) = parse_header(&mut lines, id_vec)?;
    let n = id_vec.len();
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut weights: Vec<Vec<f64>> = vec![Vec::new(); n];

    for (lineno, line) in lines {
        let line = line?;
        let items: Vec<&str> = line.split_whitespace().collect();
        if items.is_empty() {
            continue;
        }
        if items.len() != 3 {
            return Err(format_err(
                lineno,
                format!("expected `<id> <id> <weight>`, found {} fields", items.len()),
            ));
        }
        let i = lookup(&id_map, items[0], lineno)?;
        let j = lookup(&id_map, items[1], lineno)?;
        let w: f64 = items[2]
            .parse()
            .map_err(|_| format_err(lineno, "weight is not numeric"))?;
        if i != j {
            neighbors[i].push(j);
            weights[i].push(w);
        }
    }

    Ok(WeightsGraph::from_parts(
        neighbors,
        Some(weights),
        WeightsKind::File,
    ))
}

type NumberedLines<R> = std::iter::Enumerate<std::io::Lines<R>>;

/// Read the `<flag> <num_obs> ...` header, check it against the id vector,
/// and build the external-to-internal id map.
fn parse_header<R: BufRead>(
    lines: &mut NumberedLines<R>,
    id_vec: &[i64],
) -> Result<(HashMap<i64, usize>, usize)> {
    let (lineno, header) = lines
        .next()
        .ok_or_else(|| format_err(0, "empty weights file"))?;
    let header = header?;
    let items: Vec<&str> = header.split_whitespace().collect();
    if items.is_empty() {
        return Err(format_err(lineno, "empty header line"));
    }

    // Single-token headers carry the observation count directly.
    let num_obs_tok = if items.len() == 1 { items[0] } else { items[1] };
    let num_obs: usize = num_obs_tok
        .parse()
        .map_err(|_| format_err(lineno, "header observation count is not an integer"))?;

    if num_obs != id_vec.len() {
        return Err(Error::SizeMismatch {
            what: "weights file observation count",
            expected: id_vec.len(),
            actual: num_obs,
        });
    }

    let mut id_map = HashMap::with_capacity(id_vec.len());
    for (internal, &ext) in id_vec.iter().enumerate() {
        if id_map.insert(ext, internal).is_some() {
            return Err(Error::invalid_parameter(
                "id_vec",
                ext,
                "external ids must be unique",
            ));
        }
    }
    Ok((id_map, num_obs))
}

fn lookup(id_map: &HashMap<i64, usize>, tok: &str, lineno: usize) -> Result<usize> {
    let ext: i64 = tok
        .parse()
        .map_err(|_| format_err(lineno, format!("`{tok}` is not an integer id")))?;
    id_map
        .get(&ext)
        .copied()
        .ok_or_else(|| format_err(lineno, format!("unknown external id {ext}")))
}

fn format_err(lineno: usize, reason: impl Into<String>) -> Error {
    Error::WeightsFormat {
        line: lineno + 1,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const GAL: &str = "0 4 lattice id\n\
                       10 2\n11 12\n\
                       11 2\n10 13\n\
                       12 2\n10 13\n\
                       13 2\n11 12\n";

    #[test]
    fn test_read_gal() {
        let w = read_gal_records(Cursor::new(GAL), &[10, 11, 12, 13]).unwrap();
        assert_eq!(w.num_obs(), 4);
        assert_eq!(w.neighbors(0), &[1, 2]);
        assert_eq!(w.neighbors(3), &[1, 2]);
        assert!(w.is_symmetric());
        assert!(w.neighbor_weights(0).is_none());
    }

    #[test]
    fn test_gal_id_count_mismatch() {
        let err = read_gal_records(Cursor::new(GAL), &[10, 11, 12]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn test_gal_unknown_id() {
        let bad = "0 2\n1 1\n99\n";
        let err = read_gal_records(Cursor::new(bad), &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::WeightsFormat { line: 3, .. }), "got {err:?}");
    }

    #[test]
    fn test_read_gwt() {
        let gwt = "0 3 file id\n1 2 1.5\n2 1 1.5\n2 3 2.0\n";
        let w = read_gwt_records(Cursor::new(gwt), &[1, 2, 3]).unwrap();
        assert_eq!(w.neighbors(0), &[1]);
        assert_eq!(w.neighbor_weights(0).unwrap(), &[1.5]);
        assert_eq!(w.neighbors(1), &[0, 2]);
        // Edge 2->3 has no mirror: asymmetric.
        assert!(!w.is_symmetric());
    }

    #[test]
    fn test_gwt_malformed_record() {
        let gwt = "0 2\n1 2\n";
        let err = read_gwt_records(Cursor::new(gwt), &[1, 2]).unwrap_err();
        assert!(matches!(err, Error::WeightsFormat { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn test_single_token_header() {
        let gal = "2\n1 1\n2\n2 1\n1\n";
        let w = read_gal_records(Cursor::new(gal), &[1, 2]).unwrap();
        assert_eq!(w.neighbors(0), &[1]);
        assert!(w.is_symmetric());
    }

    #[test]
    fn test_duplicate_external_ids() {
        let err = read_gal_records(Cursor::new("0 2\n"), &[7, 7]).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }), "got {err:?}");
    }
}
