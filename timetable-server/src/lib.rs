//! MRT timetable server.
//!
//! Scrapes the published departure timetable once a day, stages it as CSV,
//! loads it into SQLite and serves it over a cached JSON API.

pub mod cache;
pub mod config;
pub mod domain;
pub mod refresh;
pub mod scrape;
pub mod staging;
pub mod store;
pub mod timetable;
pub mod web;
