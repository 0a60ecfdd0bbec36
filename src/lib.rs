//! fincore
//!
//! Personal-finance automation core: a staged investment-discipline engine
//! that turns cash-reserve policy into dated action instructions, and a
//! statement import pipeline that maps raw rows to canonical categories and
//! flags probable duplicates for human review.

pub mod core;
pub mod discipline;
pub mod import;
