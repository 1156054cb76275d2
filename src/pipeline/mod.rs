pub mod cursor;
pub mod dedup;
pub mod fetch;
pub mod filter;
pub mod metadata;
