pub use super::processed_files::Entity as ProcessedFiles;
