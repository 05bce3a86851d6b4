/// CommandStream trait - the command recording surface draws are issued on

use glam::Mat4;
use crate::error::Result;
use crate::shader::{ShaderStage, StageFlags, ShaderObjectHandle, DeviceLayoutId};
use crate::draw::FixedFunctionValue;

/// A model to draw
///
/// Geometry itself is owned by the caller; the stream backend knows how to
/// source vertices for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawModel {
    /// Model name (diagnostics)
    pub name: String,
    /// Number of vertices to draw
    pub vertex_count: u32,
    /// Index of first vertex
    pub first_vertex: u32,
    /// Number of instances
    pub instance_count: u32,
    /// Model transform pushed as push constants when the layout has room for it
    pub transform: Option<Mat4>,
}

impl DrawModel {
    pub fn new(name: &str, vertex_count: u32) -> Self {
        Self {
            name: name.to_string(),
            vertex_count,
            first_vertex: 0,
            instance_count: 1,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Command stream for recording state, binding and draw commands
///
/// Commands are issued in call order. Implemented by backend command
/// buffers (e.g., the Vulkan command stream).
pub trait CommandStream {
    /// Set one fixed-function value
    fn set_fixed_function(&mut self, value: FixedFunctionValue) -> Result<()>;

    /// Bind shader objects to stages
    ///
    /// `shaders[i]` is bound to `stages[i]`; `None` binds a null shader,
    /// which marks the stage as explicitly unbound.
    fn bind_stages(&mut self, stages: &[ShaderStage], shaders: &[Option<ShaderObjectHandle>]) -> Result<()>;

    /// Update push constants
    ///
    /// # Arguments
    ///
    /// * `layout` - Layout the bound shaders were created against
    /// * `stages` - Stages that read the range
    /// * `offset` - Offset in bytes into the push constant range
    /// * `data` - Data to push
    fn push_constants(&mut self, layout: DeviceLayoutId, stages: StageFlags, offset: u32, data: &[u8]) -> Result<()>;

    /// Draw a model with the current bindings and state
    fn draw(&mut self, model: &DrawModel) -> Result<()>;
}
