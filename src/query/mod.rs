pub mod engine;
pub mod scorer;

pub use engine::{FindResult, NameMatch, Searcher};
pub use scorer::{NameScorer, NameWeights};
