//! Synthetic user journeys for exercising the analysis pipeline.
//!
//! All randomness comes from the RNG passed to [`JourneyGenerator::generate`];
//! nothing here touches a thread-local or global generator, so two runs with
//! equally seeded RNGs produce identical tables.

pub mod generator;

pub use generator::{ChannelProfile, GeneratorConfig, JourneyGenerator};
