//! Engine tests, grouped by topic:
//! - `distributions`: sampling, deterministic values, percentiles, serde
//! - `model`: graph mutation, validation, ordering, serde
//! - `calculator`: projection, NPV/IRR, terminal values, Monte-Carlo
//! - `sensitivity`: uncertain parameter discovery and tornado analysis
//! - `breakeven`: parameter solving

mod model;
mod sensitivity;
