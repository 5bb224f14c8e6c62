pub mod runner;
pub mod scenario_model;
pub mod source;
pub mod suite;
