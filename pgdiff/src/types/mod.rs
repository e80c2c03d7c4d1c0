//! Common types shared by catalog producers and comparators.

mod row;

pub use row::*;
