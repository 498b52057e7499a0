pub mod orchestrator;
pub mod state;

pub use orchestrator::{GeneratedPrompt, GenerationOrchestrator};
pub use state::{Attempt, AttemptState};
