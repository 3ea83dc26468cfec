use evostrat::config::{ParamValue, ParameterNode, ParameterStore};
use evostrat::engine::EvolutionaryStrategyEngine;
use evostrat::error::{ConfigError, EvostratError};
use evostrat::evaluator::{EvaluatorFailure, FitnessEvaluator, FitnessVector, Measure};
use evostrat::individual::Individual;
use evostrat::{OperatorRegistry, RepresentationRegistry};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

/// Maximizing toy problem: fitness is the number of set bits of the first
/// representation slot.
struct OneMax {
    calls: Rc<Cell<i64>>,
}

impl FitnessEvaluator for OneMax {
    fn initialize(&mut self, _use_independent_test_set: bool) -> Result<(), EvaluatorFailure> {
        Ok(())
    }

    fn evaluate(
        &mut self,
        individual: &Individual,
        _on_test_set: bool,
    ) -> Result<FitnessVector, EvaluatorFailure> {
        self.calls.set(self.calls.get() + 1);
        let ones = individual.representations()[0]
            .encode()
            .chars()
            .filter(|c| *c == '1')
            .count();
        Ok(vec![Measure::maximizing("Accuracy", ones as f64)])
    }

    fn close(&mut self) -> Result<(), EvaluatorFailure> {
        Ok(())
    }
}

/// Minimizing evaluator whose result improves by 1 on every call, making the
/// evaluation order the only thing that matters.
struct Descending {
    calls: Rc<Cell<i64>>,
}

impl FitnessEvaluator for Descending {
    fn initialize(&mut self, _use_independent_test_set: bool) -> Result<(), EvaluatorFailure> {
        Ok(())
    }

    fn evaluate(
        &mut self,
        _individual: &Individual,
        _on_test_set: bool,
    ) -> Result<FitnessVector, EvaluatorFailure> {
        let value = 100.0 - self.calls.get() as f64;
        self.calls.set(self.calls.get() + 1);
        Ok(vec![Measure::minimizing("Error", value)])
    }

    fn close(&mut self) -> Result<(), EvaluatorFailure> {
        Ok(())
    }
}

fn base_store(strategy: &str, generations: i64, evaluations: i64, folder: &Path) -> ParameterStore {
    ParameterStore {
        parameters_to_optimize: ParameterNode::group(
            "problemParametersToOptimize",
            vec![ParameterNode::group(
                "Selected features",
                vec![ParameterNode::leaf("Length", ParamValue::Int(8))],
            )
            .with_class("BinaryVector")],
        ),
        parameters_constant: ParameterNode::group("problemParametersConstant", vec![]),
        es_parameters: ParameterNode::group(
            "esParameters",
            vec![
                ParameterNode::leaf("Population strategy", ParamValue::Str(strategy.to_string())),
                ParameterNode::leaf("Number of generations", ParamValue::Int(generations)),
                ParameterNode::leaf("Number of evaluations", ParamValue::Int(evaluations)),
                ParameterNode::leaf("Random seed", ParamValue::Int(42)),
            ],
        ),
        output: ParameterNode::group(
            "output",
            vec![
                ParameterNode::leaf(
                    "Optimization results folder",
                    ParamValue::File(folder.to_path_buf()),
                ),
                ParameterNode::leaf("Logging interval", ParamValue::Int(1)),
                ParameterNode::leaf("Generation number", ParamValue::Bool(true)),
                ParameterNode::leaf("Evaluation number", ParamValue::Bool(true)),
                ParameterNode::leaf(
                    "Complete population representations",
                    ParamValue::Bool(true),
                ),
                ParameterNode::leaf("Complete population fitness values", ParamValue::Bool(true)),
                ParameterNode::leaf(
                    "Complete offspring population representations",
                    ParamValue::Bool(true),
                ),
                ParameterNode::leaf(
                    "Complete offspring population fitness values",
                    ParamValue::Bool(true),
                ),
            ],
        ),
    }
}

fn bit_flip_node() -> ParameterNode {
    ParameterNode::group(
        "operator",
        vec![ParameterNode::leaf("gamma", ParamValue::Double(1.0))],
    )
    .with_class("RandomBitFlip")
}

fn with_mutation(mut store: ParameterStore) -> ParameterStore {
    store.es_parameters.children.push(ParameterNode::group(
        "List with mutation operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![bit_flip_node()],
        )],
    ));
    store
}

fn engine_for(
    store: &ParameterStore,
    evaluator: Box<dyn FitnessEvaluator>,
) -> EvolutionaryStrategyEngine {
    EvolutionaryStrategyEngine::configure(
        store,
        RepresentationRegistry::with_builtins(),
        &OperatorRegistry::with_builtins(),
        evaluator,
    )
    .unwrap()
}

fn sorted_primaries(engine: &EvolutionaryStrategyEngine) -> Vec<f64> {
    let mut values: Vec<f64> = engine
        .population()
        .iter()
        .filter_map(|i| i.primary_fitness())
        .collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values
}

#[test]
fn evaluation_limit_equal_to_population_stops_before_first_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = with_mutation(base_store("4+4", 10, 4, dir.path()));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(Descending { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.generations, 0);
    assert_eq!(summary.evaluations, 0);
    assert_eq!(calls.get(), 4);
    // The log holds the header only.
    let path = dir.path().join("optimization_0.arff");
    assert!(evostrat::runlog::read_last_row(&path).is_err());
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("@DATA"));
}

#[test]
fn plus_selection_keeps_the_best_of_parents_and_offspring() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let store = base_store("4+4", 3, 100, dir.path());
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(Descending { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    // 4 initial evaluations plus 4 offspring in each of the 3 generations.
    assert_eq!(calls.get(), 16);
    assert_eq!(summary.generations, 3);
    assert_eq!(summary.evaluations, 12);
    // Every call improves on the last, so every offspring beats its source
    // parent and survives selection.
    assert_eq!(summary.successes, 12);
    assert_eq!(sorted_primaries(&engine), vec![85.0, 86.0, 87.0, 88.0]);
    assert_eq!(summary.best_primary_fitness, Some(85.0));
}

#[test]
fn comma_selection_discards_the_parent_population() {
    let dir = tempfile::tempdir().unwrap();
    let store = base_store("2,4", 1, 100, dir.path());
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(Descending { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    // The new parents are the two best of the four offspring (calls 2..=5,
    // values 98 down to 95), never the old parents.
    assert_eq!(sorted_primaries(&engine), vec![95.0, 96.0]);
    assert_eq!(summary.successes, 4);
}

#[test]
fn crossover_rounds_produce_exactly_the_offspring_population() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = base_store("4+4", 1, 100, dir.path());
    // 2 parents and 3 children per round: two rounds, overflow discarded.
    store.es_parameters.children.push(ParameterNode::group(
        "List with crossover operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![ParameterNode::group(
                "operator",
                vec![
                    ParameterNode::leaf("parentNumber", ParamValue::Int(2)),
                    ParameterNode::leaf("offspringNumber", ParamValue::Int(3)),
                ],
            )
            .with_class("UniformBitstringCrossover")],
        )],
    ));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(OneMax { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.generations, 1);
    assert_eq!(summary.evaluations, 4);
    assert_eq!(calls.get(), 8);
    assert_eq!(engine.population().len(), 4);
}

#[test]
fn runtime_limit_zero_ends_after_one_generation() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = with_mutation(base_store("4+4", 10, 100, dir.path()));
    store
        .es_parameters
        .children
        .push(ParameterNode::leaf("Runtime limit", ParamValue::Int(0)));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(OneMax { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    assert!(summary.run_time_limit_achieved);
    assert_eq!(summary.evaluations, 4);
    assert_eq!(calls.get(), 8);
}

#[test]
fn success_counter_is_bounded_by_offspring_per_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = with_mutation(base_store("4+4", 5, 1000, dir.path()));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(OneMax { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    assert!(summary.successes <= 4 * summary.generations as u64);
}

#[test]
fn independent_test_set_doubles_the_evaluator_calls() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = with_mutation(base_store("2+2", 1, 100, dir.path()));
    store.parameters_constant.children.push(ParameterNode::leaf(
        "Use independent test set",
        ParamValue::Bool(true),
    ));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(OneMax { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    // Test-set evaluations do not advance the evaluation counter.
    assert_eq!(summary.evaluations, 2);
    assert_eq!(calls.get(), 8);
    assert!(engine.population()[0].fitness_on_test_set().is_some());
}

#[test]
fn vns_spends_extra_evaluations_within_the_budget() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = with_mutation(base_store("2+2", 2, 30, dir.path()));
    store.es_parameters.children.push(ParameterNode::group(
        "List with VNS operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![bit_flip_node(), bit_flip_node()],
        )],
    ));
    let calls = Rc::new(Cell::new(0));
    let mut engine = engine_for(&store, Box::new(OneMax { calls: calls.clone() }));

    engine.initialize().unwrap();
    let summary = engine.run().unwrap();

    // The local search adds trials on top of the per-generation offspring.
    assert!(summary.evaluations > 4);
    // The limit bounds total evaluator calls, initial population included.
    assert_eq!(calls.get(), summary.evaluations + 2);
    assert!(calls.get() <= 30);
}

#[test]
fn seeded_runs_reproduce_the_final_population() {
    let encodes = |dir: &Path| {
        let store = with_mutation(base_store("4+4", 3, 100, dir));
        let calls = Rc::new(Cell::new(0));
        let mut engine = engine_for(&store, Box::new(OneMax { calls }));
        engine.initialize().unwrap();
        engine.run().unwrap();
        engine
            .population()
            .iter()
            .map(|i| i.representations()[0].encode())
            .collect::<Vec<_>>()
    };
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    assert_eq!(encodes(first.path()), encodes(second.path()));
}

#[test]
fn binding_an_unknown_operator_fails_the_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = base_store("4+4", 1, 100, dir.path());
    store.es_parameters.children.push(ParameterNode::group(
        "List with mutation operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![ParameterNode::group("operator", vec![]).with_class("SimulatedAnnealing")],
        )],
    ));
    let result = EvolutionaryStrategyEngine::configure(
        &store,
        RepresentationRegistry::with_builtins(),
        &OperatorRegistry::with_builtins(),
        Box::new(OneMax {
            calls: Rc::new(Cell::new(0)),
        }),
    );
    assert!(matches!(
        result.err(),
        Some(EvostratError::Config(ConfigError::UnknownOperator(tag))) if tag == "SimulatedAnnealing"
    ));
}

#[test]
fn a_single_vns_operator_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = base_store("4+4", 1, 100, dir.path());
    store.es_parameters.children.push(ParameterNode::group(
        "List with VNS operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![bit_flip_node()],
        )],
    ));
    let result = EvolutionaryStrategyEngine::configure(
        &store,
        RepresentationRegistry::with_builtins(),
        &OperatorRegistry::with_builtins(),
        Box::new(OneMax {
            calls: Rc::new(Cell::new(0)),
        }),
    );
    assert!(matches!(
        result.err(),
        Some(EvostratError::Config(ConfigError::Invalid(_)))
    ));
}

#[test]
fn crossover_needing_more_parents_than_the_population_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = base_store("2+2", 1, 100, dir.path());
    store.es_parameters.children.push(ParameterNode::group(
        "List with crossover operators",
        vec![ParameterNode::group(
            "Selected features",
            vec![ParameterNode::group(
                "operator",
                vec![
                    ParameterNode::leaf("parentNumber", ParamValue::Int(3)),
                    ParameterNode::leaf("offspringNumber", ParamValue::Int(1)),
                ],
            )
            .with_class("UniformBitstringCrossover")],
        )],
    ));
    let result = EvolutionaryStrategyEngine::configure(
        &store,
        RepresentationRegistry::with_builtins(),
        &OperatorRegistry::with_builtins(),
        Box::new(OneMax {
            calls: Rc::new(Cell::new(0)),
        }),
    );
    assert!(matches!(
        result.err(),
        Some(EvostratError::Config(ConfigError::Invalid(_)))
    ));
}
