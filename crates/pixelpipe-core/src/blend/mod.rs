//! Blend modes and the registry that names them.
//!
//! - **color**: Porter-Duff alpha and the shared compositing arithmetic
//! - **modes**: the built-in mode formulas
//! - **registry**: name lookup and whole-image blending

pub mod color;
pub mod modes;
pub mod registry;

pub use color::porter_duff_alpha;
pub use registry::{BlendFn, BlendMode, BlendRegistry};
