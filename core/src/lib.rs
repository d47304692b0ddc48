//! tierledger-core: tier, rank and revenue rollup engine.
//!
//! Turns subject activity into scores, tiers and rank positions, and rolls
//! payments up into monthly financial reports with agent salaries.

pub mod action;
pub mod aggregate;
pub mod clock;
pub mod cohort;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod facade;
pub mod job;
pub mod ranking;
pub mod report;
pub mod rng;
pub mod rollup;
pub mod salary;
pub mod store;
pub mod tier;
pub mod types;
pub mod workload;
