//! Shell data model: parsed command lines and tracked jobs.

pub mod job;
pub mod parser;
