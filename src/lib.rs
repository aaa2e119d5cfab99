pub mod budget;
pub mod config;
pub mod engine;
pub mod generic;
pub mod heuristic;
pub mod native;
pub mod result;
pub mod routes;
pub mod stdin;
pub mod web_server;

pub use engine::{Engine, EngineConfig, ExecutionRequest, execute};
pub use result::{ExecutionResult, Status};
