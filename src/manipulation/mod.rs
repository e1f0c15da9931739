//! Knot-structure editing of curves and surfaces.
//!
//! - [knot insertion][insert]
//! - [knot removal][remove]
//! - [reversing][reverse]
//! - [splitting][split]
//! - [combining][combine]
//! - [compatibility refinement][compatible]

pub mod combine;
pub mod compatible;
pub mod insert;
pub mod remove;
pub mod reverse;
pub mod split;
