pub mod catalog;
pub mod generation;

pub use catalog::{AgeGroup, Technique, Theme};
pub use generation::{GeneratedSheet, GenerationRequest, SheetMetadata};
