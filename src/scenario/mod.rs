pub mod loader;
pub mod types;

pub use loader::{load_all, load_file, parse_scenarios, resolve};
pub use types::{DefinitionResult, Scenario, ScenarioError, Step};
