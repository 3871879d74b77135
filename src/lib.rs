pub mod agent;
pub mod brain;
pub mod config;
pub mod hands;
pub mod mcp;
pub mod serialize;
pub mod types;

pub use agent::Agent;
pub use brain::{Brain, GeminiReasoner, Reasoner};
pub use config::AgentConfig;
pub use hands::{Hands, ToolConnector, ToolSession};
pub use types::{AgentState, NextStep, RunResult, StepRecord};
