pub mod score;
pub mod snapshot;
