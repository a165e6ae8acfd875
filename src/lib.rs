pub mod config;
pub mod db;
pub mod deck;
pub mod domain;
pub mod error;
pub mod mistakes;
pub mod practice;
pub mod session;
pub mod srs;
pub mod sync;
pub mod validation;

#[cfg(test)]
pub mod testing;

pub use error::EngineError;
pub use practice::PracticeEngine;
