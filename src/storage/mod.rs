//! SQLite storage module for recorded race data
//!
//! The persistence boundary for the statistics engine: race cards with
//! payout pools, trend snapshots and pick lists, plus the per-horse scoring
//! inputs and manual adjustments.

pub mod repository;
pub mod schema;

pub use repository::RaceRepository;
pub use schema::create_tables;
