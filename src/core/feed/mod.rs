pub mod dedup;
pub mod fetcher;
pub mod parser;
pub mod serializer;
pub mod types;
