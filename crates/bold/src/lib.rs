pub mod backend;
pub mod chapters;
pub mod consumer;
pub mod errors;
pub mod framing;
pub mod models;
pub mod search;
pub mod session;
pub mod time;
pub mod transcript;
