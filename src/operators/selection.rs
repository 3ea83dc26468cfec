use crate::error::EvostratError;
use crate::evaluator::Measure;
use crate::individual::Individual;
use crate::operators::pareto;
use std::cmp::Ordering;

/// Survivor selection: replaces the parent population from the candidate pool
/// and reports how many parents were replaced by offspring.
pub trait Selection: Send {
    fn replace_parent_population(
        &self,
        population: &mut Vec<Individual>,
        offspring: &[Individual],
        minimize: bool,
    ) -> Result<usize, EvostratError>;
}

fn primary_of(individual: &Individual, role: &str, index: usize) -> Result<f64, EvostratError> {
    individual.primary_fitness().ok_or_else(|| {
        EvostratError::Engine(format!(
            "selection reached {} individual {} without a fitness value",
            role, index
        ))
    })
}

fn fitness_of<'a>(
    individual: &'a Individual,
    role: &str,
    index: usize,
) -> Result<&'a [Measure], EvostratError> {
    individual
        .fitness()
        .map(|f| f.as_slice())
        .ok_or_else(|| {
            EvostratError::Engine(format!(
                "selection reached {} individual {} without a fitness value",
                role, index
            ))
        })
}

fn rank(values: &mut [(usize, f64)], minimize: bool) {
    values.sort_by(|a, b| {
        let ordering = a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal);
        if minimize {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

/// (+)-strategy: the new parents are the best `pop_size` individuals of the
/// union of parent and offspring population, by the primary fitness measure.
pub struct PlusSelection;

impl Selection for PlusSelection {
    fn replace_parent_population(
        &self,
        population: &mut Vec<Individual>,
        offspring: &[Individual],
        minimize: bool,
    ) -> Result<usize, EvostratError> {
        let pop_size = population.len();

        // Pool indices: 0..pop_size are parents, the rest are offspring.
        let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(pop_size + offspring.len());
        for (i, individual) in population.iter().enumerate() {
            ranked.push((i, primary_of(individual, "parent", i)?));
        }
        for (i, individual) in offspring.iter().enumerate() {
            ranked.push((pop_size + i, primary_of(individual, "offspring", i)?));
        }
        rank(&mut ranked, minimize);

        let mut new_population = Vec::with_capacity(pop_size);
        let mut success_counter = 0;
        for &(index, _) in ranked.iter().take(pop_size) {
            if index < pop_size {
                new_population.push(population[index].clone_with_fitness());
            } else {
                new_population.push(offspring[index - pop_size].clone_with_fitness());
                success_counter += 1;
            }
        }
        *population = new_population;
        Ok(success_counter)
    }
}

/// (,)-strategy: the new parents are the best `pop_size` offspring; the old
/// parent population is discarded entirely. Configuration validation
/// guarantees the offspring pool is large enough.
pub struct CommaSelection;

impl Selection for CommaSelection {
    fn replace_parent_population(
        &self,
        population: &mut Vec<Individual>,
        offspring: &[Individual],
        minimize: bool,
    ) -> Result<usize, EvostratError> {
        let pop_size = population.len();
        if offspring.len() < pop_size {
            return Err(EvostratError::Engine(format!(
                "comma selection needs at least {} offspring, got {}",
                pop_size,
                offspring.len()
            )));
        }

        let mut ranked: Vec<(usize, f64)> = Vec::with_capacity(offspring.len());
        for (i, individual) in offspring.iter().enumerate() {
            ranked.push((i, primary_of(individual, "offspring", i)?));
        }
        rank(&mut ranked, minimize);

        *population = ranked
            .iter()
            .take(pop_size)
            .map(|&(index, _)| offspring[index].clone_with_fitness())
            .collect();
        Ok(pop_size)
    }
}

/// SMS-EMOA survivor selection: from parents plus the single offspring, drop
/// the individual contributing least hypervolume to the worst non-dominated
/// front (delta-S, two-objective formula; boundary points are kept).
///
/// See Emmerich, Beume, Naujoks: "An EMO algorithm using the hypervolume
/// measure as selection criterion", EMO 2005.
pub struct HypervolumeSelection;

impl HypervolumeSelection {
    /// Delta-S of every individual on the worst front, keyed by pool index.
    fn delta_s(
        worst_front: &[usize],
        pool: &[&[Measure]],
    ) -> Vec<(usize, f64)> {
        if worst_front.len() <= 2 {
            return worst_front.iter().map(|&i| (i, f64::INFINITY)).collect();
        }

        let mut by_first: Vec<usize> = worst_front.to_vec();
        by_first.sort_by(|&a, &b| {
            pool[a][0]
                .value
                .partial_cmp(&pool[b][0].value)
                .unwrap_or(Ordering::Equal)
        });

        let mut contributions = Vec::with_capacity(by_first.len());
        contributions.push((by_first[0], f64::INFINITY));
        for window in 0..by_first.len().saturating_sub(2) {
            let prev = by_first[window];
            let current = by_first[window + 1];
            let next = by_first[window + 2];
            let delta = (pool[next][0].value - pool[current][0].value).abs()
                * (pool[prev][1].value - pool[current][1].value).abs();
            contributions.push((current, delta));
        }
        contributions.push((by_first[by_first.len() - 1], f64::INFINITY));
        contributions
    }
}

impl Selection for HypervolumeSelection {
    fn replace_parent_population(
        &self,
        population: &mut Vec<Individual>,
        offspring: &[Individual],
        minimize: bool,
    ) -> Result<usize, EvostratError> {
        let pop_size = population.len();
        let child = offspring.first().ok_or_else(|| {
            EvostratError::Engine("hypervolume selection needs one offspring".to_string())
        })?;

        let mut pool: Vec<&[Measure]> = Vec::with_capacity(pop_size + 1);
        for (i, individual) in population.iter().enumerate() {
            pool.push(fitness_of(individual, "parent", i)?);
        }
        pool.push(fitness_of(child, "offspring", 0)?);

        let worst_index = if pool[0].len() < 2 {
            // Degenerate single-objective pool: drop the worst by the primary
            // measure.
            let mut ranked: Vec<(usize, f64)> = pool
                .iter()
                .enumerate()
                .map(|(i, f)| (i, f[0].value))
                .collect();
            rank(&mut ranked, minimize);
            ranked.last().map(|&(i, _)| i).unwrap_or(pop_size)
        } else {
            let fronts = pareto::fast_non_dominated_sort(&pool);
            let worst_front = &fronts[fronts.len() - 1];
            Self::delta_s(worst_front, &pool)
                .into_iter()
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
                .map(|(i, _)| i)
                .unwrap_or(pop_size)
        };

        // Only replace a parent; dropping the offspring leaves the population
        // untouched.
        if worst_index < pop_size {
            population[worst_index] = child.clone_with_fitness();
            Ok(1)
        } else {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Measure;
    use crate::individual::Individual;
    use crate::representation::IntegerValue;

    fn individual_with_fitness(measures: Vec<Measure>) -> Individual {
        let mut individual =
            Individual::from_representations(vec![Box::new(IntegerValue::new(0, 0, 10))]);
        individual.set_fitness(measures);
        individual
    }

    fn scalar(value: f64) -> Individual {
        individual_with_fitness(vec![Measure::minimizing("error", value)])
    }

    fn pair(a: f64, b: f64) -> Individual {
        individual_with_fitness(vec![
            Measure::minimizing("f1", a),
            Measure::minimizing("f2", b),
        ])
    }

    fn primaries(population: &[Individual]) -> Vec<f64> {
        population
            .iter()
            .map(|i| i.primary_fitness().unwrap())
            .collect()
    }

    #[test]
    fn plus_selection_keeps_the_best_of_the_union() {
        let mut population = vec![scalar(5.0), scalar(1.0), scalar(4.0)];
        let offspring = vec![scalar(2.0), scalar(6.0)];
        let replaced = PlusSelection
            .replace_parent_population(&mut population, &offspring, true)
            .unwrap();
        let mut values = primaries(&population);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![1.0, 2.0, 4.0]);
        assert_eq!(replaced, 1);
    }

    #[test]
    fn plus_selection_honors_maximization() {
        let mut population = vec![scalar(5.0), scalar(1.0)];
        let offspring = vec![scalar(9.0)];
        PlusSelection
            .replace_parent_population(&mut population, &offspring, false)
            .unwrap();
        let mut values = primaries(&population);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(values, vec![5.0, 9.0]);
    }

    #[test]
    fn comma_selection_uses_offspring_only() {
        let mut population = vec![scalar(0.1), scalar(0.2)];
        let offspring = vec![scalar(3.0), scalar(1.0), scalar(2.0)];
        let replaced = CommaSelection
            .replace_parent_population(&mut population, &offspring, true)
            .unwrap();
        let mut values = primaries(&population);
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        // The good parents are gone; only offspring survive.
        assert_eq!(values, vec![1.0, 2.0]);
        assert_eq!(replaced, 2);
    }

    #[test]
    fn hypervolume_selection_drops_least_contributor() {
        // Parents span the front; the middle parent at (3.0, 3.0) is
        // dominated and must be the one replaced by the offspring.
        let mut population = vec![pair(1.0, 4.0), pair(3.0, 3.0), pair(4.0, 1.0)];
        let offspring = vec![pair(2.0, 2.0)];
        let replaced = HypervolumeSelection
            .replace_parent_population(&mut population, &offspring, true)
            .unwrap();
        assert_eq!(replaced, 1);
        assert!(population
            .iter()
            .any(|i| i.fitness().unwrap()[0].value == 2.0));
        assert!(!population
            .iter()
            .any(|i| i.fitness().unwrap()[0].value == 3.0));
    }

    #[test]
    fn hypervolume_selection_can_reject_the_offspring() {
        let mut population = vec![pair(1.0, 4.0), pair(2.0, 2.0), pair(4.0, 1.0)];
        let offspring = vec![pair(5.0, 5.0)];
        let replaced = HypervolumeSelection
            .replace_parent_population(&mut population, &offspring, true)
            .unwrap();
        assert_eq!(replaced, 0);
        assert!(!population
            .iter()
            .any(|i| i.fitness().unwrap()[0].value == 5.0));
    }

    #[test]
    fn missing_fitness_is_an_engine_error() {
        let mut population =
            vec![Individual::from_representations(vec![Box::new(IntegerValue::new(0, 0, 1))])];
        let offspring = vec![scalar(1.0)];
        assert!(PlusSelection
            .replace_parent_population(&mut population, &offspring, true)
            .is_err());
    }
}
