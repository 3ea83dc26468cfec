pub mod settings;
pub mod store;

pub use settings::{EngineSettings, LogSettings, SelectionVariant, StrategyDescriptor};
pub use store::{ParamValue, ParameterNode, ParameterStore, SubtreeKind};
