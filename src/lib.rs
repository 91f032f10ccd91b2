//! Sayings - A service for quotes and proverbs
//!
//! Readers browse approved sayings; registered users submit new ones, which
//! an administrator approves or rejects, and keep favorites and likes.

pub mod api;
pub mod config;
pub mod db;
pub mod hooks;
pub mod models;
pub mod services;
