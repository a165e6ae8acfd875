pub mod completion;
pub mod item;
pub mod mistake;
pub mod review;

pub use completion::{CompletionDraft, CompletionEvent};
pub use item::{Category, Direction, PracticeItem};
pub use mistake::{Mistake, MistakeRecord};
pub use review::{ReviewRecord, StudyMode};
