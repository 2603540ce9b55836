//! Concrete pipeline applications.

pub mod solver;

pub use solver::SolverApp;
