pub mod config;
pub mod destination;
pub mod encoder;
pub mod error;
pub mod generate;
pub mod handlers;
pub mod request;
pub mod startup;
pub mod state;
pub mod storage;
