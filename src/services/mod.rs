pub mod artifact_store;
pub mod lifecycle;
pub mod pdf;
pub mod storage;
pub mod worker;
