//! Page renderers.

pub mod html;
pub mod terminal;
