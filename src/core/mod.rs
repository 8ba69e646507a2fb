//! Core logic: parse a definition, plan an invocation, execute the plan.

pub mod binder;
pub mod error;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod resolver;
pub mod template;
pub mod types;
