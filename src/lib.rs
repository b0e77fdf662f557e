pub mod batch;
pub mod config;
pub mod fetch;
pub mod report;
pub mod store;
pub mod table;
