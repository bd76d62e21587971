//! Pareto dominance, non-dominated sorting and crowding distance.
//!
//! All objective vectors are "higher is better" (see `ObjectiveScorer`).

/// A dominates B iff A is at least as good on every objective and strictly
/// better on at least one
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x < y {
            return false;
        }
        if x > y {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Partition indices of `scores` into fronts; front 0 is non-dominated
pub fn non_dominated_sort(scores: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = scores.len();
    let mut dominated_by_me: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&scores[i], &scores[j]) {
                dominated_by_me[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&scores[j], &scores[i]) {
                dominated_by_me[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by_me[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Crowding distance of each member of `front` (same order as `front`).
///
/// Per objective the front is sorted by value; the two boundary points get
/// infinite distance and interior points accumulate the gap between their
/// neighbours normalized by that objective's span.
pub fn crowding_distance(scores: &[Vec<f64>], front: &[usize]) -> Vec<f64> {
    let size = front.len();
    let mut distance = vec![0.0; size];
    if size <= 2 {
        return vec![f64::INFINITY; size];
    }
    let objectives = front.first().map(|&i| scores[i].len()).unwrap_or(0);

    for m in 0..objectives {
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by(|&a, &b| {
            scores[front[a]][m]
                .partial_cmp(&scores[front[b]][m])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let min = scores[front[order[0]]][m];
        let max = scores[front[order[size - 1]]][m];
        distance[order[0]] = f64::INFINITY;
        distance[order[size - 1]] = f64::INFINITY;

        let span = max - min;
        if span <= 0.0 || !span.is_finite() {
            continue;
        }
        for k in 1..size - 1 {
            let gap = scores[front[order[k + 1]]][m] - scores[front[order[k - 1]]][m];
            distance[order[k]] += gap / span;
        }
    }
    distance
}
