//! Dominance utilities for the multi-objective selection path (SMS-EMOA):
//! pairwise dominance honoring per-measure optimization direction and fast
//! non-dominated sorting.

use crate::evaluator::Measure;

/// Check if fitness vector A dominates fitness vector B: A is no worse than B
/// in all measures and strictly better in at least one, each measure compared
/// in its own direction.
pub fn dominates(a: &[Measure], b: &[Measure]) -> bool {
    if a.len() != b.len() || a.is_empty() {
        return false;
    }

    let mut at_least_one_better = false;

    for (ma, mb) in a.iter().zip(b) {
        let (a_better, b_better) = if ma.minimize {
            (ma.value < mb.value, mb.value < ma.value)
        } else {
            (ma.value > mb.value, mb.value > ma.value)
        };

        if b_better {
            return false;
        }
        if a_better {
            at_least_one_better = true;
        }
    }

    at_least_one_better
}

/// Fast non-dominated sorting over a pool of fitness vectors. Returns the
/// pool indices grouped by front (front 0 = non-dominated).
pub fn fast_non_dominated_sort(pool: &[&[Measure]]) -> Vec<Vec<usize>> {
    let n = pool.len();
    let mut domination_count = vec![0usize; n];
    let mut dominated_solutions: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();

    let mut first_front = Vec::new();
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(pool[i], pool[j]) {
                dominated_solutions[i].push(j);
            } else if dominates(pool[j], pool[i]) {
                domination_count[i] += 1;
            }
        }
        if domination_count[i] == 0 {
            first_front.push(i);
        }
    }
    fronts.push(first_front);

    let mut front_index = 0;
    while front_index < fronts.len() && !fronts[front_index].is_empty() {
        let mut next_front = Vec::new();
        for &i in &fronts[front_index] {
            for &j in &dominated_solutions[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next_front.push(j);
                }
            }
        }
        if !next_front.is_empty() {
            fronts.push(next_front);
        }
        front_index += 1;
    }

    fronts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Measure;

    fn point(a: f64, b: f64) -> Vec<Measure> {
        vec![Measure::minimizing("f1", a), Measure::minimizing("f2", b)]
    }

    #[test]
    fn dominance_requires_strict_improvement_somewhere() {
        assert!(dominates(&point(1.0, 1.0), &point(2.0, 2.0)));
        assert!(dominates(&point(1.0, 2.0), &point(2.0, 2.0)));
        assert!(!dominates(&point(1.0, 1.0), &point(1.0, 1.0)));
        assert!(!dominates(&point(1.0, 3.0), &point(2.0, 2.0)));
    }

    #[test]
    fn dominance_honors_direction() {
        let a = vec![Measure::maximizing("accuracy", 0.9)];
        let b = vec![Measure::maximizing("accuracy", 0.7)];
        assert!(dominates(&a, &b));
        assert!(!dominates(&b, &a));
    }

    #[test]
    fn sorting_separates_fronts() {
        let p0 = point(1.0, 4.0);
        let p1 = point(2.0, 2.0);
        let p2 = point(4.0, 1.0);
        let p3 = point(3.0, 3.0); // dominated by p1
        let pool: Vec<&[Measure]> = vec![&p0, &p1, &p2, &p3];
        let fronts = fast_non_dominated_sort(&pool);
        assert_eq!(fronts.len(), 2);
        assert_eq!(fronts[0], vec![0, 1, 2]);
        assert_eq!(fronts[1], vec![3]);
    }
}
