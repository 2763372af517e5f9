pub mod novelty;

pub use novelty::{debug_pick, detect_new, stamp};
