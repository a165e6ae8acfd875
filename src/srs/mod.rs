pub mod scheduler;
pub mod sm2;

pub use scheduler::{PriorityTier, SrsScheduler, SrsStats};
pub use sm2::{calculate_sm2, Sm2Result};
