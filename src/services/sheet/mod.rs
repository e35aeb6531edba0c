pub mod analyzer;
pub mod columns;
pub mod reader;
pub mod types;
pub mod utils;

pub use analyzer::SheetAnalyzer;
pub use columns::suggest_mapping;
pub use reader::SheetReader;
