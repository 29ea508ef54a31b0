/// Returns true iff `p` dominates `q`: no coordinate of `p` is smaller than
/// the matching one of `q` and at least one is strictly larger.
///
/// Equal points never dominate each other, so a point cannot exclude itself.
/// A NaN coordinate compares neither smaller nor larger.
pub fn dominates(p: &[f64], q: &[f64]) -> bool {
    debug_assert_eq!(p.len(), q.len());
    let mut strictly_better = false;
    for (a, b) in p.iter().zip(q) {
        if a < b {
            return false;
        }
        if a > b {
            strictly_better = true;
        }
    }
    strictly_better
}
