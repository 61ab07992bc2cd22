pub mod prelude;

pub mod processed_files;
