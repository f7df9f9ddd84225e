//! Database module for the student tracker
//!
//! This module owns the SQLite schema and every query the web
//! and console surfaces run against it.

pub mod models;
pub mod operations;

pub use models::{format_score, parse_score, Grade, Student, StudentReport, SubjectTopper};
pub use operations::{DbOperations, DbPoolStatus};
