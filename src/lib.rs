//! Tax Computation Engine for individual income tax returns
//!
//! This crate turns the raw figures captured by a tax return wizard into a
//! full computation: per-category income totals, deductions, progressive,
//! final and capital-gain taxes, surcharge, reductions, credits, the minimum
//! tax floor and withholding reconciliation, with an audit trace of every
//! step. Slabs, rates and adjustment caps come from per-year YAML rate tables.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
