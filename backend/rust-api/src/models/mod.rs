pub mod activity;
pub mod answer;
pub mod evaluation;
pub mod interruption;
pub mod results;
pub mod session;

pub use activity::{ArtExploration, ImageRef, MemoryReconstruction, Section};
pub use evaluation::{Evaluation, Step};
pub use session::{Session, SessionMode, SessionStatus};
