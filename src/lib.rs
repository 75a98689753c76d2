//! Listing scraper and catalog ingester for AI tool directories.
//!
//! A job fetches listing pages ([`paginator`]), extracts tool candidates
//! ([`extract`]), enriches them ([`enrich`]) and saves the new ones into the
//! catalog ([`persist`], [`store`]). [`job::run`] ties the stages together.

pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod job;
pub mod paginator;
pub mod persist;
pub mod store;
