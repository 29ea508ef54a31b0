//! Core types for the distributed skyline: point tables, the dominance
//! predicate, block partitioning and the local dominance pass.

use serde::{Deserialize, Serialize};

pub mod dominance;
pub mod format;
pub mod local;
pub mod partition;

pub use dominance::dominates;
pub use format::{parse_points, read_points, write_skyline, InputError, MIN_DIMS};
pub use local::{local_pass, skyline, LocalPass, Membership};
pub use partition::{block_size, partitions, Partition, PartitionError};

pub type PointIndex = usize;
pub type Rank = usize;

/// Problem dimensions agreed on by every worker before any data moves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Shape {
    pub dims: usize,
    pub len: usize,
}

impl Shape {
    /// Number of coordinates in a table of this shape, `None` on overflow.
    pub fn values(&self) -> Option<usize> {
        self.dims.checked_mul(self.len)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("a point table needs at least one dimension")]
    ZeroDimensions,
    #[error("{values} coordinates do not split into points of {dims} dimensions")]
    Ragged { values: usize, dims: usize },
    #[error("coordinate {coord} of point {point} is not finite")]
    NonFinite { point: PointIndex, coord: usize },
}

/// Row-major table of `len` points with `dims` coordinates each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointTable {
    dims: usize,
    coords: Vec<f64>,
}

impl PointTable {
    pub fn new(dims: usize, coords: Vec<f64>) -> Result<Self, TableError> {
        if dims == 0 {
            return Err(TableError::ZeroDimensions);
        }
        if coords.len() % dims != 0 {
            return Err(TableError::Ragged { values: coords.len(), dims });
        }
        // Dominance is only transitive over finite values.
        if let Some(at) = coords.iter().position(|value| !value.is_finite()) {
            return Err(TableError::NonFinite {
                point: at / dims,
                coord: at % dims,
            });
        }
        Ok(Self { dims, coords })
    }

    /// Build a table from equally sized rows.
    pub fn from_rows<R: AsRef<[f64]>>(dims: usize, rows: &[R]) -> Result<Self, TableError> {
        let mut coords = Vec::with_capacity(rows.len() * dims);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dims {
                return Err(TableError::Ragged { values: row.len(), dims });
            }
            coords.extend_from_slice(row);
        }
        Self::new(dims, coords)
    }

    pub fn shape(&self) -> Shape {
        Shape { dims: self.dims, len: self.len() }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.coords.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn point(&self, index: PointIndex) -> &[f64] {
        let start = index * self.dims;
        &self.coords[start..start + self.dims]
    }

    pub fn points(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.coords.chunks_exact(self.dims)
    }

    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Copy of the points whose membership bit is set, in index order.
    pub fn select(&self, membership: &Membership) -> PointTable {
        let coords = membership
            .survivors()
            .flat_map(|index| self.point(index).iter().copied())
            .collect();
        PointTable { dims: self.dims, coords }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_coordinates_are_rejected() {
        assert_eq!(
            PointTable::new(2, vec![1.0, 2.0, 3.0]),
            Err(TableError::Ragged { values: 3, dims: 2 })
        );
        assert_eq!(PointTable::new(0, Vec::new()), Err(TableError::ZeroDimensions));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        assert_eq!(
            PointTable::new(2, vec![3.0, 2.0, f64::NAN, 1.0]),
            Err(TableError::NonFinite { point: 1, coord: 0 })
        );
        assert_eq!(
            PointTable::from_rows(3, &[[0.0, 1.0, f64::NEG_INFINITY]]),
            Err(TableError::NonFinite { point: 0, coord: 2 })
        );
    }

    #[test]
    fn rows_are_stored_row_major() {
        let table = PointTable::from_rows(3, &[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(table.shape(), Shape { dims: 3, len: 2 });
        assert_eq!(table.point(1), &[4.0, 5.0, 6.0]);
        assert_eq!(table.points().count(), 2);
    }

    #[test]
    fn empty_table_keeps_its_dimensions() {
        let table = PointTable::new(4, Vec::new()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.shape(), Shape { dims: 4, len: 0 });
    }

    #[test]
    fn select_keeps_survivors_in_order() {
        let table = PointTable::from_rows(2, &[[1.0, 1.0], [2.0, 2.0], [3.0, 1.0]]).unwrap();
        let membership = Membership::from_bits(vec![false, true, true]);
        let selected = table.select(&membership);
        assert_eq!(selected.coords(), &[2.0, 2.0, 3.0, 1.0]);
    }
}
