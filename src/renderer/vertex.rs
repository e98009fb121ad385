//! Vertex types for 2D rendering

use bytemuck::{Pod, Zeroable};

/// Simple 2D vertex with position and color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Colors for board elements
pub mod colors {
    pub const BACKGROUND: [f32; 4] = [0.0, 0.0, 0.0, 1.0];
    pub const PEG: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
    pub const PEG_HALO: [f32; 4] = [1.0, 1.0, 1.0, 0.35];
    pub const WALL: [f32; 4] = [0.25, 0.25, 0.3, 1.0];
    pub const BALL: [f32; 4] = [0.8, 0.0, 0.0, 1.0];
    pub const BALL_HIGHLIGHT: [f32; 4] = [1.0, 0.27, 0.27, 1.0];
    /// Balls dropped by the visual recorder
    pub const RECORDER_BALL: [f32; 4] = [1.0, 0.08, 0.58, 1.0];
    /// Bucket paying less than the stake
    pub const BUCKET_LOSS: [f32; 4] = [0.86, 0.15, 0.15, 1.0];
    /// Bucket colour ramp for multipliers of 1x and above
    pub const BUCKET_LOW: [f32; 4] = [0.92, 0.70, 0.03, 1.0];
    pub const BUCKET_HIGH: [f32; 4] = [0.13, 0.77, 0.37, 1.0];
    /// Recorder progress bar under each bucket
    pub const PROGRESS_EMPTY: [f32; 4] = [0.2, 0.2, 0.25, 1.0];
    pub const PROGRESS_FULL: [f32; 4] = [0.86, 0.15, 0.47, 1.0];
}
