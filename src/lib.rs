pub mod api;
pub mod catalog;
pub mod config;
pub mod exif;
pub mod imaging;
pub mod import;
pub mod observability;
pub mod processor;
pub mod proto;
pub mod queue;
pub mod storage;
pub mod worker;
