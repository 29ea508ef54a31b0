//! Membership vectors and the per-worker dominance pass.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::dominance::dominates;
use crate::partition::Partition;
use crate::{PointIndex, PointTable};

/// One skyline bit per point; `true` means the point survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Membership {
    bits: Vec<bool>,
}

impl Membership {
    /// Every point assumed to be in the skyline.
    pub fn all(len: usize) -> Self {
        Self { bits: vec![true; len] }
    }

    pub fn from_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn contains(&self, index: PointIndex) -> bool {
        self.bits.get(index).copied().unwrap_or(false)
    }

    /// Number of surviving points.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    /// Indices of surviving points in ascending order.
    pub fn survivors(&self) -> impl Iterator<Item = PointIndex> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub fn into_bits(self) -> Vec<bool> {
        self.bits
    }
}

/// Outcome of one worker's pass over its own partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPass {
    pub partition: Partition,
    /// Membership of `partition.start..partition.end`.
    pub bits: Vec<bool>,
    /// Zero minus the number of points this pass excluded.
    pub delta: i64,
}

impl LocalPass {
    pub fn excluded(&self) -> u64 {
        self.delta.unsigned_abs()
    }
}

/// Decide membership for every point of `partition` against the whole table.
///
/// Every point of the table is a candidate dominator. Local candidates that
/// are already excluded are skipped: whatever dominated them was itself a
/// candidate earlier and dominates everything they would.
pub fn local_pass(table: &PointTable, partition: Partition) -> LocalPass {
    let owned = partition.range();
    let mut bits = vec![true; partition.len()];
    let mut delta = 0i64;

    for candidate in 0..table.len() {
        if owned.contains(&candidate) && !bits[candidate - owned.start] {
            continue;
        }
        let dominator = table.point(candidate);
        for (offset, alive) in bits.iter_mut().enumerate() {
            if *alive && dominates(dominator, table.point(owned.start + offset)) {
                *alive = false;
                delta -= 1;
            }
        }
    }

    trace!(
        rank = partition.rank,
        start = partition.start,
        end = partition.end,
        excluded = delta.unsigned_abs(),
        "local pass finished"
    );
    LocalPass { partition, bits, delta }
}

/// Skyline of the whole table computed by a single worker.
pub fn skyline(table: &PointTable) -> Membership {
    let pass = local_pass(table, Partition::whole(table.len()));
    Membership::from_bits(pass.bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partitions;

    fn table(rows: &[[f64; 2]]) -> PointTable {
        PointTable::from_rows(2, rows).unwrap()
    }

    #[test]
    fn corner_point_is_dominated() {
        let points = table(&[[1.0, 1.0], [2.0, 2.0], [3.0, 1.0], [1.0, 3.0]]);
        let membership = skyline(&points);
        assert_eq!(membership.as_slice(), &[false, true, true, true]);
        assert_eq!(membership.count(), 3);
    }

    #[test]
    fn single_dominator_removes_the_other() {
        let membership = skyline(&table(&[[5.0, 5.0], [1.0, 1.0]]));
        assert_eq!(membership.survivors().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn identical_points_all_survive() {
        let membership = skyline(&table(&[[2.0, 2.0]; 5]));
        assert_eq!(membership.count(), 5);
    }

    #[test]
    fn empty_and_single_tables() {
        assert!(skyline(&PointTable::new(3, Vec::new()).unwrap()).is_empty());
        assert_eq!(skyline(&table(&[[0.0, 0.0]])).count(), 1);
    }

    #[test]
    fn chain_is_reduced_to_its_top() {
        let rows: Vec<[f64; 2]> = (0..20).map(|i| [i as f64, i as f64]).collect();
        let membership = skyline(&table(&rows));
        assert_eq!(membership.survivors().collect::<Vec<_>>(), vec![19]);
    }

    #[test]
    fn remote_dominators_exclude_local_points() {
        // The only dominator of index 3 lives in the first partition.
        let points = table(&[[9.0, 9.0], [0.0, 5.0], [5.0, 0.0], [4.0, 4.0]]);
        let parts = partitions(points.len(), 2).unwrap();
        let second = local_pass(&points, parts[1]);
        assert_eq!(second.bits, vec![false, false]);
        assert_eq!(second.delta, -2);
        assert_eq!(second.excluded(), 2);
    }

    #[test]
    fn partial_deltas_add_up_to_the_skyline() {
        let rows: Vec<[f64; 2]> = (0..17)
            .map(|i| [((i * 7) % 11) as f64, ((i * 5) % 13) as f64])
            .collect();
        let points = table(&rows);
        let reference = skyline(&points);

        for peers in 1..6 {
            let mut bits = Vec::new();
            let mut delta = 0;
            for part in partitions(points.len(), peers).unwrap() {
                let pass = local_pass(&points, part);
                bits.extend(pass.bits);
                delta += pass.delta;
            }
            assert_eq!(bits, reference.as_slice(), "peers={peers}");
            assert_eq!(points.len() as i64 + delta, reference.count() as i64);
        }
    }
}
