pub mod cache;
pub mod credit_gate;
pub mod image_model;
pub mod image_processor;
pub mod kv_store;
pub mod object_store;
pub mod prompt_builder;
pub mod sheet_generator;

#[cfg(test)]
pub mod testing;
