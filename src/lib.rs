//! Procurement backend: tenders, bids and the accounts that act on them.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod persistence;
pub mod routes;
pub mod services;
