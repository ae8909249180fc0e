//! Rendering back end of the `lineage` binary.

pub mod render;

pub use render::{render, render_dot, render_html, render_json, render_svg, RenderFormat};
