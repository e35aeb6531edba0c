pub mod dataset_store;
pub mod engine;
pub mod report;
pub mod sheet;
