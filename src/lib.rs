//! object-drive: a file manager over an S3-style bucket.
//!
//! The gateway side (`services`, `handlers`, `routes`, `server`) stores
//! objects and issues signed URLs; the client side (`client`) uploads through
//! those URLs, aggregates folder sizes and builds directory views.

pub mod cli;
pub mod client;
pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
