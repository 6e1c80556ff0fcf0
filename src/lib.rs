// src/lib.rs
pub mod config;
pub mod entity;
pub mod error;
pub mod import;
pub mod notify;
pub mod parse;
pub mod remote;
pub mod store;
