//! Typespeed - typing-speed practice backend.
//!
//! Users sign up, take typing tests and submit the results. Each
//! submission is appended to the test history and folded into the user's
//! running aggregate (average speed, accuracy and performance, best
//! speed), which feeds the leaderboard and dashboard endpoints.

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod service;
pub mod stats;
pub mod store;
