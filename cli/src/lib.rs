//! strata CLI library.

pub mod commands;
