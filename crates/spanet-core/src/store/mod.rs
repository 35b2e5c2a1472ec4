// Reactive state cache for one spa.

mod refresh;
mod state;

pub use state::StateStore;
