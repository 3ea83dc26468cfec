use crate::config::store::{ParameterNode, ParameterStore, SubtreeKind};
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

/// Selection scheme fixed by the population strategy descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionVariant {
    Plus,
    Comma,
    Hypervolume,
}

/// Parsed form of the compact strategy string: `"mu+lambda"`, `"mu,lambda"`
/// or `"sms-emoa(mu)"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyDescriptor {
    pub pop_size: usize,
    pub offspring_pop_size: usize,
    pub variant: SelectionVariant,
}

impl StrategyDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ConfigError> {
        let malformed = || ConfigError::MalformedStrategy(descriptor.to_string());
        let descriptor = descriptor.trim();

        let parsed = if let Some(rest) = descriptor.strip_prefix("sms-emoa(") {
            let mu = rest.strip_suffix(')').ok_or_else(malformed)?;
            Self {
                pop_size: mu.trim().parse().map_err(|_| malformed())?,
                offspring_pop_size: 1,
                variant: SelectionVariant::Hypervolume,
            }
        } else if let Some((mu, lambda)) = descriptor.split_once('+') {
            Self {
                pop_size: mu.trim().parse().map_err(|_| malformed())?,
                offspring_pop_size: lambda.trim().parse().map_err(|_| malformed())?,
                variant: SelectionVariant::Plus,
            }
        } else if let Some((mu, lambda)) = descriptor.split_once(',') {
            Self {
                pop_size: mu.trim().parse().map_err(|_| malformed())?,
                offspring_pop_size: lambda.trim().parse().map_err(|_| malformed())?,
                variant: SelectionVariant::Comma,
            }
        } else {
            return Err(malformed());
        };

        if parsed.pop_size == 0 {
            return Err(ConfigError::Invalid(
                "Population size must be greater than zero".to_string(),
            ));
        }
        if parsed.offspring_pop_size == 0 {
            return Err(ConfigError::Invalid(
                "Offspring population size must be greater than zero".to_string(),
            ));
        }
        // With fewer offspring than parents the comma scheme would have to
        // pad the new population from an undersized candidate pool.
        if parsed.variant == SelectionVariant::Comma && parsed.offspring_pop_size < parsed.pop_size
        {
            return Err(ConfigError::Invalid(format!(
                "Comma selection requires offspring population size >= population size \
                 (got {} < {})",
                parsed.offspring_pop_size, parsed.pop_size
            )));
        }
        Ok(parsed)
    }
}

/// What the run log records and how often.
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub interval: usize,
    pub delay: Option<Duration>,
    pub log_generation: bool,
    pub log_evaluation: bool,
    pub log_population_representations: bool,
    pub log_population_fitness: bool,
    pub log_population_fitness_on_test_set: bool,
    pub log_offspring_representations: bool,
    pub log_offspring_fitness: bool,
    pub log_offspring_fitness_on_test_set: bool,
    pub final_generation_only: bool,
}

/// Engine parameters read once from the [`ParameterStore`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub strategy: StrategyDescriptor,
    pub generation_limit: usize,
    pub evaluation_limit: i64,
    pub runtime_limit: Option<Duration>,
    pub apply_vns_only_after_success: bool,
    pub use_independent_test_set: bool,
    pub seed: Option<u64>,
    pub continue_from: Option<PathBuf>,
    pub results_folder: Option<PathBuf>,
    pub logging: LogSettings,
}

fn opt_bool(subtree: &ParameterNode, name: &str, default: bool) -> Result<bool, ConfigError> {
    match subtree.find(name) {
        Some(_) => subtree.bool_param(name),
        None => Ok(default),
    }
}

fn opt_int(subtree: &ParameterNode, name: &str) -> Result<Option<i64>, ConfigError> {
    match subtree.find(name) {
        Some(_) => Ok(Some(subtree.int_param(name)?)),
        None => Ok(None),
    }
}

impl EngineSettings {
    pub fn from_store(store: &ParameterStore) -> Result<Self, ConfigError> {
        let es = store.subtree(SubtreeKind::AlgorithmParameters);
        let constant = store.subtree(SubtreeKind::ParametersConstant);
        let output = store.subtree(SubtreeKind::Output);

        let strategy = StrategyDescriptor::parse(es.str_param("Population strategy")?)?;

        let generation_limit = es.int_param("Number of generations")?;
        if generation_limit < 0 {
            return Err(ConfigError::Invalid(
                "Number of generations must not be negative".to_string(),
            ));
        }
        let evaluation_limit = es.int_param("Number of evaluations")?;

        // A negative runtime limit means no limit, matching the other limits'
        // "whichever is reached first" contract.
        let runtime_limit = opt_int(es, "Runtime limit")?
            .filter(|ms| *ms >= 0)
            .map(|ms| Duration::from_millis(ms as u64));

        let seed = opt_int(es, "Random seed")?.map(|s| s as u64);

        let continue_from = es
            .find("Continue old experiment from")
            .and_then(|n| n.value.as_ref())
            .and_then(|v| v.as_file())
            .map(PathBuf::from);

        let results_folder = output
            .find("Optimization results folder")
            .and_then(|n| n.value.as_ref())
            .and_then(|v| v.as_file())
            .map(PathBuf::from);

        let interval = output.int_param("Logging interval")?;
        if interval <= 0 {
            return Err(ConfigError::Invalid(
                "Logging interval must be greater than zero".to_string(),
            ));
        }

        let logging = LogSettings {
            interval: interval as usize,
            delay: opt_int(output, "Logging delay")?
                .filter(|ms| *ms > 0)
                .map(|ms| Duration::from_millis(ms as u64)),
            log_generation: output.bool_param("Generation number")?,
            log_evaluation: output.bool_param("Evaluation number")?,
            log_population_representations: output
                .bool_param("Complete population representations")?,
            log_population_fitness: output.bool_param("Complete population fitness values")?,
            log_population_fitness_on_test_set: opt_bool(
                output,
                "Complete population fitness values on test set",
                false,
            )?,
            log_offspring_representations: output
                .bool_param("Complete offspring population representations")?,
            log_offspring_fitness: output
                .bool_param("Complete offspring population fitness values")?,
            log_offspring_fitness_on_test_set: opt_bool(
                output,
                "Complete offspring population fitness values on test set",
                false,
            )?,
            final_generation_only: opt_bool(output, "Log only final generation", false)?,
        };

        Ok(Self {
            strategy,
            generation_limit: generation_limit as usize,
            evaluation_limit,
            runtime_limit,
            apply_vns_only_after_success: opt_bool(
                es,
                "Apply VNS only after successful mutations",
                false,
            )?,
            use_independent_test_set: opt_bool(constant, "Use independent test set", false)?,
            seed,
            continue_from,
            results_folder,
            logging,
        })
    }
}
