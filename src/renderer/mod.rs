//! WebGPU rendering module
//!
//! The board is drawn as plain coloured triangles in canvas pixels; the
//! pipeline maps them to the viewport.

pub mod pipeline;
pub mod scene;
pub mod shapes;
pub mod vertex;

pub use pipeline::{RenderError, RenderState};
pub use scene::{board_vertices, recorder_vertices};
pub use vertex::Vertex;
