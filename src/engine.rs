use crate::config::{
    EngineSettings, ParameterNode, ParameterStore, SelectionVariant, SubtreeKind,
};
use crate::error::{ConfigError, EvaluationError, EvostratError, LogError, ResumeError, Result};
use crate::evaluator::{FitnessEvaluator, FitnessVector, Measure};
use crate::individual::{DeclaredParameter, Individual};
use crate::operators::{
    CommaSelection, Crossover, HypervolumeSelection, Mutation, MutationContext, OperatorRegistry,
    PlusSelection, Selection,
};
use crate::representation::RepresentationRegistry;
use crate::runlog::{self, RunLog};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Mutable counters of one optimization run. Shared with the adaptive
/// mutation operators through [`MutationContext`].
#[derive(Debug)]
pub struct RunState {
    pub current_generation: usize,
    /// Starts at `-pop_size` so that the initial population evaluation brings
    /// it to zero; afterwards it counts offspring and local-search
    /// evaluations.
    pub current_evaluation: i64,
    /// Offspring that improved on the fitness of their source parent.
    /// Adaptive operators may reset it after consuming a success rate.
    pub current_success_counter: u64,
    pub run_time_limit_achieved: bool,
}

impl RunState {
    pub fn fresh(pop_size: usize) -> Self {
        Self {
            current_generation: 0,
            current_evaluation: -(pop_size as i64),
            current_success_counter: 0,
            run_time_limit_achieved: false,
        }
    }

    /// Continues the counters of an interrupted run. The restored population
    /// carries no fitness caches, so its re-evaluation adds `pop_size` back
    /// onto the evaluation counter.
    pub fn resumed(last_generation: i64, last_evaluation: i64, pop_size: usize) -> Self {
        Self {
            current_generation: (last_generation + 1) as usize,
            current_evaluation: last_evaluation - pop_size as i64,
            current_success_counter: 0,
            run_time_limit_achieved: false,
        }
    }
}

/// Operators bound to one representation slot, in configured order.
#[derive(Default)]
struct SlotOperators {
    crossover: Option<Box<dyn Crossover>>,
    mutations: Vec<Box<dyn Mutation>>,
    vns: Vec<Box<dyn Mutation>>,
}

/// Final counters of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generations: usize,
    pub evaluations: i64,
    pub successes: u64,
    pub run_time_limit_achieved: bool,
    pub log_path: PathBuf,
    pub best_primary_fitness: Option<f64>,
}

/// Generational (mu+lambda) / (mu,lambda) / SMS-EMOA search over individuals
/// whose genome layout is declared in the parameter store. Single-threaded;
/// the expensive work happens inside the [`FitnessEvaluator`] collaborator.
pub struct EvolutionaryStrategyEngine {
    settings: EngineSettings,
    declared: Vec<DeclaredParameter>,
    representations: RepresentationRegistry,
    slots: Vec<SlotOperators>,
    selection: Box<dyn Selection>,
    evaluator: Box<dyn FitnessEvaluator>,
    rng: StdRng,
    population: Vec<Individual>,
    state: RunState,
    initialized: bool,
}

impl EvolutionaryStrategyEngine {
    /// Builds a configured engine: parses the settings, collects the declared
    /// optimization parameters and binds the configured operators to their
    /// representation slots. Fails fast on any unknown type tag or operator.
    pub fn configure(
        store: &ParameterStore,
        representations: RepresentationRegistry,
        operators: &OperatorRegistry,
        evaluator: Box<dyn FitnessEvaluator>,
    ) -> Result<Self> {
        let settings = EngineSettings::from_store(store)?;

        let declared =
            DeclaredParameter::collect(store.subtree(SubtreeKind::ParametersToOptimize));
        if declared.is_empty() {
            return Err(ConfigError::Invalid(
                "No optimization parameters are declared".to_string(),
            )
            .into());
        }
        for parameter in &declared {
            if !representations.contains(&parameter.type_tag) {
                return Err(
                    ConfigError::UnknownRepresentationType(parameter.type_tag.clone()).into(),
                );
            }
        }

        let mut slots: Vec<SlotOperators> = Vec::with_capacity(declared.len());
        slots.resize_with(declared.len(), SlotOperators::default);
        let es = store.subtree(SubtreeKind::AlgorithmParameters);
        bind_operators(es, "List with crossover operators", &declared, |slot, node| {
            let tag = operator_tag(node)?;
            if slots[slot].crossover.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "Parameter '{}' has more than one crossover operator",
                    declared[slot].name
                )));
            }
            slots[slot].crossover = Some(operators.build_crossover(&tag, node)?);
            Ok(())
        })?;
        bind_operators(es, "List with mutation operators", &declared, |slot, node| {
            let tag = operator_tag(node)?;
            slots[slot].mutations.push(operators.build_mutation(&tag, node)?);
            Ok(())
        })?;
        bind_operators(es, "List with VNS operators", &declared, |slot, node| {
            let tag = operator_tag(node)?;
            slots[slot].vns.push(operators.build_mutation(&tag, node)?);
            Ok(())
        })?;

        let pop_size = settings.strategy.pop_size;
        for (slot, bound) in slots.iter().enumerate() {
            if let Some(crossover) = &bound.crossover {
                if crossover.parent_count() > pop_size {
                    return Err(ConfigError::Invalid(format!(
                        "Crossover for parameter '{}' needs {} parents but the population \
                         holds only {}",
                        declared[slot].name,
                        crossover.parent_count(),
                        pop_size
                    ))
                    .into());
                }
            }
            // The local search alternates between exactly two neighborhoods.
            if !bound.vns.is_empty() && bound.vns.len() != 2 {
                return Err(ConfigError::Invalid(format!(
                    "Parameter '{}' binds {} VNS operators, expected exactly 2",
                    declared[slot].name,
                    bound.vns.len()
                ))
                .into());
            }
        }

        if settings.continue_from.is_none() && settings.results_folder.is_none() {
            return Err(
                ConfigError::MissingParameter("Optimization results folder".to_string()).into(),
            );
        }

        let selection: Box<dyn Selection> = match settings.strategy.variant {
            SelectionVariant::Plus => Box::new(PlusSelection),
            SelectionVariant::Comma => Box::new(CommaSelection),
            SelectionVariant::Hypervolume => Box::new(HypervolumeSelection),
        };

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let state = RunState::fresh(pop_size);

        Ok(Self {
            settings,
            declared,
            representations,
            slots,
            selection,
            evaluator,
            rng,
            population: Vec::new(),
            state,
            initialized: false,
        })
    }

    /// Initializes the evaluator and builds the start population, either
    /// freshly randomized or reconstructed from the last row of a previous
    /// run's log.
    pub fn initialize(&mut self) -> Result<()> {
        let pop_size = self.settings.strategy.pop_size;
        self.evaluator
            .initialize(self.settings.use_independent_test_set)
            .map_err(|failure| EvaluationError {
                generation: self.state.current_generation,
                evaluation: self.state.current_evaluation,
                message: failure.to_string(),
            })?;

        match &self.settings.continue_from {
            Some(path) => {
                let row = runlog::read_last_row(path)?;
                let last_generation = row.get_i64("Generation number")?;
                let last_evaluation = row.get_i64("Evaluation number")?;
                if last_generation < 0 {
                    return Err(ResumeError::MalformedLog {
                        path: path.clone(),
                        reason: format!("negative generation number {}", last_generation),
                    }
                    .into());
                }
                self.state = RunState::resumed(last_generation, last_evaluation, pop_size);

                let mut population = Vec::with_capacity(pop_size);
                for index in 0..pop_size {
                    population.push(Individual::from_log(
                        &self.declared,
                        &self.representations,
                        &row,
                        index,
                    )?);
                }
                self.population = population;
                log::info!(
                    "Resuming from {} at generation {}, evaluation {}",
                    path.display(),
                    self.state.current_generation,
                    last_evaluation
                );
            }
            None => {
                self.state = RunState::fresh(pop_size);
                let mut population = Vec::with_capacity(pop_size);
                for _ in 0..pop_size {
                    population.push(Individual::fresh(
                        &self.declared,
                        &self.representations,
                        &mut self.rng,
                    )?);
                }
                self.population = population;
            }
        }
        self.initialized = true;
        Ok(())
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs the generation loop until the generation, evaluation or wall
    /// clock limit is reached, whichever comes first.
    pub fn run(&mut self) -> Result<RunSummary> {
        if !self.initialized {
            return Err(EvostratError::Engine(
                "run() called before initialize()".to_string(),
            ));
        }
        let started = Instant::now();
        let resuming = self.settings.continue_from.is_some();

        let Self {
            settings,
            declared,
            slots,
            selection,
            evaluator,
            rng,
            population,
            state,
            ..
        } = self;
        let pop_size = settings.strategy.pop_size;
        let offspring_pop_size = settings.strategy.offspring_pop_size;

        for individual in population.iter_mut() {
            evaluate_individual(
                evaluator.as_mut(),
                state,
                individual,
                settings.use_independent_test_set,
            )?;
        }
        // The direction of the primary measure steers single-objective
        // selection and the local search acceptance.
        let minimize = population[0]
            .fitness()
            .and_then(|f| f.first())
            .map(|m| m.minimize)
            .unwrap_or(true);
        let measure_names: Vec<String> = population[0]
            .fitness()
            .map(|f| f.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default();

        let mut log = match &settings.continue_from {
            Some(path) => RunLog::open(path, settings.logging.delay)?,
            None => {
                let folder = settings.results_folder.as_ref().ok_or_else(|| {
                    ConfigError::MissingParameter("Optimization results folder".to_string())
                })?;
                RunLog::create_numbered(folder, settings.logging.delay)?
            }
        };
        if !resuming {
            write_header(
                &mut log,
                settings,
                declared,
                pop_size,
                offspring_pop_size,
                &measure_names,
            )?;
        }
        log::info!(
            "Starting {:?} run: population {}, offspring {}, generation limit {}, \
             evaluation limit {}",
            settings.strategy.variant,
            pop_size,
            offspring_pop_size,
            settings.generation_limit,
            settings.evaluation_limit
        );

        let mut offspring: Vec<Individual> = Vec::new();
        let mut origins: Vec<Option<FitnessVector>> = Vec::new();

        while state.current_generation < settings.generation_limit
            && budget_left(state, pop_size, settings.evaluation_limit)
        {
            // 1. Offspring creation: crossover rounds, or plain clones of
            // shuffled parents when no crossover is bound.
            offspring.clear();
            origins.clear();
            let lead = slots.iter().position(|s| s.crossover.is_some());
            match lead {
                None => {
                    let mut candidates: Vec<usize> = (0..pop_size).collect();
                    candidates.shuffle(rng);
                    for i in 0..offspring_pop_size {
                        let parent = &population[candidates[i % pop_size]];
                        offspring.push(parent.clone());
                        origins.push(parent.fitness().cloned());
                    }
                }
                Some(lead) => {
                    let children_per_round = slots[lead]
                        .crossover
                        .as_ref()
                        .map(|c| c.offspring_count())
                        .unwrap_or(1);
                    let max_parents = slots
                        .iter()
                        .filter_map(|s| s.crossover.as_ref())
                        .map(|c| c.parent_count())
                        .max()
                        .unwrap_or(2);
                    let rounds =
                        (offspring_pop_size + children_per_round - 1) / children_per_round;

                    for _ in 0..rounds {
                        let mut candidates: Vec<usize> = (0..pop_size).collect();
                        candidates.shuffle(rng);
                        let parents: Vec<&Individual> = candidates[..max_parents]
                            .iter()
                            .map(|&i| &population[i])
                            .collect();

                        // Per slot: recombined children for bound slots, the
                        // first parent's representation passed through for
                        // the rest.
                        let mut children_by_slot: HashMap<usize, Vec<_>> = HashMap::new();
                        for (slot, bound) in slots.iter().enumerate() {
                            if let Some(crossover) = &bound.crossover {
                                let slot_parents: Vec<&dyn crate::representation::Representation> =
                                    parents[..crossover.parent_count()]
                                        .iter()
                                        .map(|p| p.representations()[slot].as_ref())
                                        .collect();
                                children_by_slot
                                    .insert(slot, crossover.crossover(&slot_parents, rng)?);
                            }
                        }

                        for k in 0..children_per_round {
                            if offspring.len() >= offspring_pop_size {
                                // Overflow children of the last round are
                                // discarded.
                                break;
                            }
                            let mut representations = Vec::with_capacity(declared.len());
                            for slot in 0..declared.len() {
                                match children_by_slot.get(&slot) {
                                    Some(children) => representations
                                        .push(children[k % children.len()].clone()),
                                    None => representations
                                        .push(parents[0].representations()[slot].clone()),
                                }
                            }
                            offspring.push(Individual::from_representations(representations));
                            origins.push(parents[0].fitness().cloned());
                        }
                    }
                }
            }

            // 2./3. Mutation, evaluation and one log row per offspring.
            for index in 0..offspring.len() {
                for (slot, bound) in slots.iter_mut().enumerate() {
                    for mutation in bound.mutations.iter_mut() {
                        let mut ctx = MutationContext {
                            state: &mut *state,
                            offspring_pop_size,
                            generation_limit: settings.generation_limit,
                            rng: &mut *rng,
                        };
                        mutation.mutate(offspring[index].representation_mut(slot), &mut ctx)?;
                    }
                }
                evaluate_individual(
                    evaluator.as_mut(),
                    state,
                    &mut offspring[index],
                    settings.use_independent_test_set,
                )?;
                append_row(&mut log, settings, population, &offspring, state, &measure_names)?;
            }

            // 4. Variable neighborhood search on each offspring.
            for index in 0..offspring.len() {
                let gate = !settings.apply_vns_only_after_success
                    || improved_on(&offspring[index], origins[index].as_deref(), minimize);
                if !gate {
                    continue;
                }
                for slot in 0..slots.len() {
                    if slots[slot].vns.is_empty() {
                        continue;
                    }
                    run_vns(
                        &mut log,
                        settings,
                        population,
                        &mut offspring,
                        index,
                        slot,
                        slots,
                        evaluator.as_mut(),
                        state,
                        rng,
                        minimize,
                        &measure_names,
                    )?;
                }
            }

            // 5. Success bookkeeping and survivor selection.
            for (index, child) in offspring.iter().enumerate() {
                if improved_on(child, origins[index].as_deref(), minimize) {
                    state.current_success_counter += 1;
                }
            }
            let replaced =
                selection.replace_parent_population(population, &offspring, minimize)?;
            log::debug!(
                "Generation {}: {} offspring entered the population",
                state.current_generation,
                replaced
            );

            // 6. Wall clock check. Reaching the limit ends the run
            // gracefully.
            if let Some(limit) = settings.runtime_limit {
                if started.elapsed() >= limit {
                    state.run_time_limit_achieved = true;
                    log::info!(
                        "Runtime limit reached after generation {}",
                        state.current_generation
                    );
                    break;
                }
            }

            // 7. Generation advance.
            state.current_generation += 1;
        }

        if settings.logging.final_generation_only {
            let first_offspring = if state.run_time_limit_achieved {
                offspring.first()
            } else {
                None
            };
            write_final_log(log.path(), declared, population, first_offspring)?;
        }
        let log_path = log.path().to_path_buf();
        log.finalize()?;

        self.evaluator.close().map_err(|failure| EvaluationError {
            generation: self.state.current_generation,
            evaluation: self.state.current_evaluation,
            message: failure.to_string(),
        })?;

        let best_primary_fitness = self
            .population
            .iter()
            .filter_map(|i| i.primary_fitness())
            .reduce(|best, value| {
                if minimize == (value < best) {
                    value
                } else {
                    best
                }
            });
        Ok(RunSummary {
            generations: self.state.current_generation,
            evaluations: self.state.current_evaluation,
            successes: self.state.current_success_counter,
            run_time_limit_achieved: self.state.run_time_limit_achieved,
            log_path,
            best_primary_fitness,
        })
    }
}

/// True while another full offspring batch fits into the evaluation budget.
/// The limit bounds total evaluator invocations including the initial
/// population evaluation.
fn budget_left(state: &RunState, pop_size: usize, evaluation_limit: i64) -> bool {
    state.current_evaluation + (pop_size as i64) < evaluation_limit
}

fn operator_tag(node: &ParameterNode) -> Result<String, ConfigError> {
    node.class_value.clone().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "Operator entry '{}' carries no classValue tag",
            node.name
        ))
    })
}

/// Walks one operator list (`List with crossover operators` etc.): each child
/// names a declared optimization parameter and holds the operator nodes bound
/// to it.
fn bind_operators(
    es: &ParameterNode,
    list_name: &str,
    declared: &[DeclaredParameter],
    mut bind: impl FnMut(usize, &ParameterNode) -> Result<(), ConfigError>,
) -> Result<(), ConfigError> {
    let list = match es.find(list_name) {
        Some(list) => list,
        None => return Ok(()),
    };
    for entry in &list.children {
        let slot = declared
            .iter()
            .position(|d| d.name == entry.name)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "'{}' binds operators to unknown parameter '{}'",
                    list_name, entry.name
                ))
            })?;
        for node in &entry.children {
            bind(slot, node)?;
        }
    }
    Ok(())
}

/// Fills the fitness caches of one individual, invoking the evaluator only
/// for missing vectors. The training-set call advances the evaluation
/// counter, the test-set call does not.
fn evaluate_individual(
    evaluator: &mut dyn FitnessEvaluator,
    state: &mut RunState,
    individual: &mut Individual,
    use_independent_test_set: bool,
) -> Result<()> {
    let context = |state: &RunState, message: String| EvaluationError {
        generation: state.current_generation,
        evaluation: state.current_evaluation,
        message,
    };
    if individual.fitness().is_none() {
        let fitness = evaluator
            .evaluate(individual, false)
            .map_err(|failure| context(state, failure.to_string()))?;
        state.current_evaluation += 1;
        individual.set_fitness(fitness);
    }
    if use_independent_test_set && individual.fitness_on_test_set().is_none() {
        let fitness = evaluator
            .evaluate(individual, true)
            .map_err(|failure| context(state, failure.to_string()))?;
        individual.set_fitness_on_test_set(fitness);
    }
    Ok(())
}

/// Strict improvement of the primary measure over the source parent's
/// fitness.
fn improved_on(child: &Individual, origin: Option<&[Measure]>, minimize: bool) -> bool {
    match (child.primary_fitness(), origin.and_then(|f| f.first())) {
        (Some(value), Some(reference)) => {
            if minimize {
                value < reference.value
            } else {
                value > reference.value
            }
        }
        _ => false,
    }
}

fn fitness_attribute(measure_index: usize, name: &str, who: &str, test_set: bool) -> String {
    let suffix = if test_set {
        " on the independent test set"
    } else {
        ""
    };
    if measure_index == 0 {
        format!(
            "@ATTRIBUTE 'Fitness value used for optimization ({}) of {}{}' NUMERIC",
            name, who, suffix
        )
    } else {
        format!(
            "@ATTRIBUTE 'Further fitness value ({}) of {}{}' NUMERIC",
            name, who, suffix
        )
    }
}

fn write_header(
    log: &mut RunLog,
    settings: &EngineSettings,
    declared: &[DeclaredParameter],
    pop_size: usize,
    offspring_pop_size: usize,
    measure_names: &[String],
) -> Result<(), LogError> {
    let logging = &settings.logging;
    log.write_line("@RELATION 'Optimization results'")?;
    log.write_line("")?;
    if logging.log_generation {
        log.write_line("@ATTRIBUTE 'Generation number' NUMERIC")?;
    }

    let sections = [
        (
            "individual",
            pop_size,
            logging.log_population_representations,
            logging.log_population_fitness,
            logging.log_population_fitness_on_test_set,
        ),
        (
            "offspring individual",
            offspring_pop_size,
            logging.log_offspring_representations,
            logging.log_offspring_fitness,
            logging.log_offspring_fitness_on_test_set,
        ),
    ];
    for (role, count, reps, fitness, test_set) in sections {
        for i in 0..count {
            let who = format!("{} {}", role, i);
            if reps {
                for parameter in declared {
                    log.write_line(&format!(
                        "@ATTRIBUTE 'Representation {} of {}' STRING",
                        parameter.type_tag, who
                    ))?;
                }
            }
            if fitness {
                for (k, name) in measure_names.iter().enumerate() {
                    log.write_line(&fitness_attribute(k, name, &who, false))?;
                }
            }
            if test_set && settings.use_independent_test_set {
                for (k, name) in measure_names.iter().enumerate() {
                    log.write_line(&fitness_attribute(k, name, &who, true))?;
                }
            }
        }
    }

    log.write_line("@ATTRIBUTE 'Timestamp' STRING")?;
    if logging.log_evaluation {
        log.write_line("@ATTRIBUTE 'Evaluation number' NUMERIC")?;
    }
    log.write_line("")?;
    log.write_line("@DATA")
}

/// Pushes the fitness columns of one individual, `?` for missing vectors.
fn push_fitness(
    values: &mut Vec<String>,
    fitness: Option<&FitnessVector>,
    measure_count: usize,
) {
    for k in 0..measure_count {
        match fitness.and_then(|f| f.get(k)) {
            Some(measure) => values.push(measure.value.to_string()),
            None => values.push("?".to_string()),
        }
    }
}

/// Appends one data row in header column order. Rows outside the logging
/// interval, and all intermediate rows in final-generation-only mode, are
/// skipped.
fn append_row(
    log: &mut RunLog,
    settings: &EngineSettings,
    population: &[Individual],
    offspring: &[Individual],
    state: &RunState,
    measure_names: &[String],
) -> Result<(), LogError> {
    let logging = &settings.logging;
    if logging.final_generation_only || state.current_generation % logging.interval != 0 {
        return Ok(());
    }
    let measure_count = measure_names.len();
    let slot_count = population.first().map(|i| i.representations().len()).unwrap_or(0);

    let mut values: Vec<String> = Vec::new();
    if logging.log_generation {
        values.push(state.current_generation.to_string());
    }
    for individual in population {
        if logging.log_population_representations {
            for representation in individual.representations() {
                values.push(representation.encode());
            }
        }
        if logging.log_population_fitness {
            push_fitness(&mut values, individual.fitness(), measure_count);
        }
        if logging.log_population_fitness_on_test_set && settings.use_independent_test_set {
            push_fitness(&mut values, individual.fitness_on_test_set(), measure_count);
        }
    }
    for i in 0..settings.strategy.offspring_pop_size {
        let individual = offspring.get(i);
        if logging.log_offspring_representations {
            match individual {
                Some(individual) => {
                    for representation in individual.representations() {
                        values.push(representation.encode());
                    }
                }
                None => values.extend(std::iter::repeat("?".to_string()).take(slot_count)),
            }
        }
        if logging.log_offspring_fitness {
            push_fitness(&mut values, individual.and_then(|i| i.fitness()), measure_count);
        }
        if logging.log_offspring_fitness_on_test_set && settings.use_independent_test_set {
            push_fitness(
                &mut values,
                individual.and_then(|i| i.fitness_on_test_set()),
                measure_count,
            );
        }
    }
    values.push(
        chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S%.3f")
            .to_string(),
    );
    if logging.log_evaluation {
        values.push(state.current_evaluation.to_string());
    }
    log.write_line(&values.join(","))
}

/// Local search on one representation slot of one offspring: alternates
/// between the two bound neighborhood operators, accepts strict improvements
/// and stops after two consecutive failures or when the evaluation budget is
/// exhausted. Every trial is logged with the candidate's fitness shown in
/// the offspring's columns.
#[allow(clippy::too_many_arguments)]
fn run_vns(
    log: &mut RunLog,
    settings: &EngineSettings,
    population: &[Individual],
    offspring: &mut [Individual],
    index: usize,
    slot: usize,
    slots: &mut [SlotOperators],
    evaluator: &mut dyn FitnessEvaluator,
    state: &mut RunState,
    rng: &mut StdRng,
    minimize: bool,
    measure_names: &[String],
) -> Result<()> {
    let pop_size = settings.strategy.pop_size;
    let mut use_first = rng.gen_bool(0.5);
    let mut previous_failed = false;
    let mut candidate = offspring[index].clone();

    while budget_left(state, pop_size, settings.evaluation_limit) {
        {
            let ops = &mut slots[slot].vns;
            let op = if use_first { &mut ops[0] } else { &mut ops[1] };
            let mut ctx = MutationContext {
                state: &mut *state,
                offspring_pop_size: settings.strategy.offspring_pop_size,
                generation_limit: settings.generation_limit,
                rng: &mut *rng,
            };
            op.mutate(candidate.representation_mut(slot), &mut ctx)?;
        }
        evaluate_individual(
            evaluator,
            state,
            &mut candidate,
            settings.use_independent_test_set,
        )?;

        // Show the trial in the log, then restore the incumbent's fitness.
        let incumbent = offspring[index].clone_with_fitness();
        if let Some(fitness) = candidate.fitness() {
            offspring[index].set_fitness(fitness.clone());
        }
        if let Some(fitness) = candidate.fitness_on_test_set() {
            offspring[index].set_fitness_on_test_set(fitness.clone());
        }
        append_row(log, settings, population, offspring, state, measure_names)?;
        offspring[index] = incumbent;

        let accepted = match (candidate.primary_fitness(), offspring[index].primary_fitness()) {
            (Some(new), Some(old)) => {
                if minimize {
                    new < old
                } else {
                    new > old
                }
            }
            _ => false,
        };
        if accepted {
            offspring[index] = candidate.clone_with_fitness();
            candidate = offspring[index].clone();
            previous_failed = false;
        } else {
            candidate = offspring[index].clone();
            if previous_failed {
                break;
            }
            previous_failed = true;
            use_first = !use_first;
        }
    }
    Ok(())
}

/// Writes the compact final-generation log next to the main one:
/// `optimization_<n>_final.arff` holding the representation strings of the
/// final population, plus the first offspring's when the run stopped on the
/// runtime limit.
fn write_final_log(
    main_log: &Path,
    declared: &[DeclaredParameter],
    population: &[Individual],
    first_offspring: Option<&Individual>,
) -> Result<(), LogError> {
    let stem = main_log
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("optimization");
    let path = main_log.with_file_name(format!("{}_final.arff", stem));

    let mut log = RunLog::open(&path, None)?;
    log.write_line("@RELATION 'Final population'")?;
    log.write_line("")?;
    for (i, individual) in population.iter().enumerate() {
        debug_assert_eq!(individual.representations().len(), declared.len());
        for parameter in declared {
            log.write_line(&format!(
                "@ATTRIBUTE 'Representation {} of individual {}' STRING",
                parameter.type_tag, i
            ))?;
        }
    }
    if first_offspring.is_some() {
        for parameter in declared {
            log.write_line(&format!(
                "@ATTRIBUTE 'Representation {} of first offspring' STRING",
                parameter.type_tag
            ))?;
        }
    }
    log.write_line("")?;
    log.write_line("@DATA")?;

    let mut values: Vec<String> = Vec::new();
    for individual in population {
        for representation in individual.representations() {
            values.push(representation.encode());
        }
    }
    if let Some(individual) = first_offspring {
        for representation in individual.representations() {
            values.push(representation.encode());
        }
    }
    log.write_line(&values.join(","))?;
    log.finalize()
}
