//! Selection, crossover and mutation shared by the genetic strategies.

use crate::domain::optimization::{ParameterAssignment, ParameterSpace};
use rand::Rng;

/// Mutation step as a fraction of each parameter's range
pub const MUTATION_SCALE: f64 = 0.1;

/// Draw `size` indices uniformly (with replacement) and return the one that
/// wins under `beats(a, b)`.
pub fn tournament<R, F>(len: usize, size: usize, rng: &mut R, beats: F) -> usize
where
    R: Rng + ?Sized,
    F: Fn(usize, usize) -> bool,
{
    let mut winner = rng.random_range(0..len);
    for _ in 1..size.max(1) {
        let challenger = rng.random_range(0..len);
        if beats(challenger, winner) {
            winner = challenger;
        }
    }
    winner
}

/// With probability `rate`, single-point crossover over the ordered key list.
/// Otherwise the children are copies of their parents.
pub fn crossover<R: Rng + ?Sized>(
    space: &ParameterSpace,
    a: &ParameterAssignment,
    b: &ParameterAssignment,
    rate: f64,
    rng: &mut R,
) -> (ParameterAssignment, ParameterAssignment) {
    let a = space.clamp(a);
    let b = space.clamp(b);
    let n = space.len();
    if n == 0 || !rng.random_bool(rate.clamp(0.0, 1.0)) {
        return (a, b);
    }

    // A single key has no interior cut point; swapping it is the only exchange
    let point = if n == 1 { 0 } else { rng.random_range(1..n) };
    let mut first = ParameterAssignment::new();
    let mut second = ParameterAssignment::new();
    for (i, spec) in space.specs().iter().enumerate() {
        let key = spec.key();
        let (from_a, from_b) = match (a.get(&key), b.get(&key)) {
            (Some(x), Some(y)) => (x.clone(), y.clone()),
            _ => (spec.default_value(), spec.default_value()),
        };
        if i < point {
            first.set(key.clone(), from_a);
            second.set(key, from_b);
        } else {
            first.set(key.clone(), from_b);
            second.set(key, from_a);
        }
    }
    (first, second)
}

/// Per-key Gaussian mutation with probability `rate`, clamped to bounds
pub fn mutate<R: Rng + ?Sized>(
    space: &ParameterSpace,
    assignment: &ParameterAssignment,
    rate: f64,
    rng: &mut R,
) -> ParameterAssignment {
    let mut mutated = space.clamp(assignment);
    let rate = rate.clamp(0.0, 1.0);
    for spec in space.specs() {
        if rng.random_bool(rate) {
            let key = spec.key();
            let current = mutated
                .get(&key)
                .cloned()
                .unwrap_or_else(|| spec.default_value());
            mutated.set(key, spec.perturb(&current, rng, MUTATION_SCALE));
        }
    }
    mutated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{ParamKey, ParamValue, ParameterSpec};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterSpec::discrete("a", "x", 0.0, 10.0, 1.0),
            ParameterSpec::discrete("b", "y", 0.0, 10.0, 1.0),
            ParameterSpec::discrete("c", "z", 0.0, 10.0, 1.0),
        ])
        .unwrap()
    }

    fn uniform(value: f64) -> ParameterAssignment {
        ["a/x", "b/y", "c/z"].iter().fold(ParameterAssignment::new(), |acc, k| {
            let key = ParamKey::try_from(k.to_string()).unwrap();
            acc.with(key, ParamValue::Number(value))
        })
    }

    #[test]
    fn test_tournament_picks_best_of_full_draw() {
        let mut rng = StdRng::seed_from_u64(1);
        let fitness = [0.1, 0.9, 0.5, 0.3];
        // A huge tournament almost surely samples index 1
        let winner = tournament(4, 64, &mut rng, |a, b| fitness[a] > fitness[b]);
        assert_eq!(winner, 1);
    }

    #[test]
    fn test_crossover_exchanges_tails() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(3);
        let (first, second) = crossover(&space, &uniform(0.0), &uniform(10.0), 1.0, &mut rng);

        let first_values: Vec<f64> = first.iter().filter_map(|(_, v)| v.as_f64()).collect();
        let second_values: Vec<f64> = second.iter().filter_map(|(_, v)| v.as_f64()).collect();
        // Head from one parent, tail from the other, complementary children
        assert_eq!(first_values[0], 0.0);
        assert_eq!(*first_values.last().unwrap(), 10.0);
        for (x, y) in first_values.iter().zip(&second_values) {
            assert_eq!(x + y, 10.0);
        }
    }

    #[test]
    fn test_no_crossover_copies_parents() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(3);
        let (first, second) = crossover(&space, &uniform(2.0), &uniform(7.0), 0.0, &mut rng);
        assert_eq!(first, uniform(2.0));
        assert_eq!(second, uniform(7.0));
    }

    #[test]
    fn test_mutation_stays_in_domain() {
        let space = space();
        let mut rng = StdRng::seed_from_u64(9);
        let mut current = uniform(10.0);
        for _ in 0..200 {
            current = mutate(&space, &current, 1.0, &mut rng);
            assert!(space.contains(&current));
        }
        assert_eq!(mutate(&space, &uniform(4.0), 0.0, &mut rng), uniform(4.0));
    }
}
