pub mod assembler;
pub mod catalog;
pub mod distribution;
pub mod error;
pub mod job;
pub mod naming;
pub mod planner;
pub mod settings;
pub mod sheet;
pub mod timestamps;
pub mod transition;
pub mod types;
