pub mod engine;
pub mod events;
pub mod state;

pub use engine::Watcher;
pub use state::{JsonFileStore, RedisStateStore, StateStore};
