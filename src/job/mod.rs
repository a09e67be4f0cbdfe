mod model;
mod state;

pub use model::{Job, Resolution};
pub use state::JobState;
