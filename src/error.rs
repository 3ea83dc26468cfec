use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems detected before the generation loop starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Parameter '{name}' has the wrong kind: expected {expected}")]
    WrongParameterKind { name: String, expected: &'static str },

    #[error("Unknown representation type '{0}'")]
    UnknownRepresentationType(String),

    #[error("Unknown operator type '{0}'")]
    UnknownOperator(String),

    #[error("Could not parse the population strategy description '{0}'")]
    MalformedStrategy(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Problems while reconstructing a run from a previous experiment's log.
#[derive(Error, Debug)]
pub enum ResumeError {
    #[error("Attribute '{attribute}' is missing in log file {path}")]
    AttributeMissing { attribute: String, path: PathBuf },

    #[error("Malformed log file {path}: {reason}")]
    MalformedLog { path: PathBuf, reason: String },

    #[error("Could not read log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The external fitness evaluator failed. Aborts the run; no retry.
#[derive(Error, Debug)]
#[error("Fitness evaluation failed at generation {generation}, evaluation {evaluation}: {message}")]
pub struct EvaluationError {
    pub generation: usize,
    pub evaluation: i64,
    pub message: String,
}

/// The run log sink could not be created, written or closed.
#[derive(Error, Debug)]
#[error("Could not write the optimization log {path}: {source}")]
pub struct LogError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug)]
pub enum EvostratError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resume(#[from] ResumeError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("Engine invariant violated: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T, E = EvostratError> = std::result::Result<T, E>;
