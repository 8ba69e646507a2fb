//! jig: a recipe-based task runner.
//!
//! A definition file declares named recipes: parameters, prerequisites, and
//! shell command lines. Invoking a recipe resolves its prerequisites
//! depth-first, binds trailing arguments, and runs every line in order,
//! stopping at the first failure.

pub mod cli;
pub mod core;
pub mod journal;
pub mod transport;
