mod repository;
mod schema;

pub use repository::{Repository, STAGE_FILTERED, STAGE_PROCESSED, STAGE_RAW};
