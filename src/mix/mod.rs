//! Loudness matching and mixdown

pub mod loudness;
pub mod mixer;

pub use loudness::match_loudness;
pub use mixer::mix;
