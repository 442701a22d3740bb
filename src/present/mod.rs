//! Thin adapters rendering cubes for people: string-driven filters in the
//! style of template helpers, and plain-text tables.

pub mod filters;
pub mod text;

pub use text::{render_measure_list, render_table};
