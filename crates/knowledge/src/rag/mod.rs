//! Answer generation over retrieved units.
//!
//! The synthesizer turns reranked units into a plain-text answer; the
//! citation helpers derive and render the source list appended to it.

pub mod citations;
pub mod synthesizer;

pub use citations::{collect_sources, render};
pub use synthesizer::{AnswerSynthesizer, SynthesisSettings};
