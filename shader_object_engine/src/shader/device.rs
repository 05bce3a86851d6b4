/// ShaderDevice trait - the GPU device surface used to create and destroy
/// shader objects and resource layouts

use std::num::NonZeroU64;
use crate::error::{Error, Result};
use crate::shader::{ShaderStage, StageFlags, ResourceLayoutDesc};

/// Opaque GPU shader object handle
///
/// Owned by exactly one ShaderUnit. Backends store their native handle's raw
/// value; a null native handle is never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderObjectHandle(NonZeroU64);

impl ShaderObjectHandle {
    /// Wrap a raw native handle value (None for a null handle)
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Raw native handle value
    pub fn as_raw(self) -> u64 {
        self.0.get()
    }
}

/// Identifier of a device-side resource layout (descriptor set layouts +
/// push constant ranges)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceLayoutId(pub u64);

/// Parameters for one shader object within a creation call
#[derive(Debug, Clone)]
pub struct ShaderCreateDesc<'a> {
    /// Unit name (diagnostics, debug names)
    pub name: &'a str,
    /// Shader stage
    pub stage: ShaderStage,
    /// Stages allowed to follow this one
    pub next_stages: StageFlags,
    /// Compiled bytecode
    pub code: &'a [u8],
    /// Entry point function name
    pub entry_point: &'a str,
    /// Device layout the shader is created against
    pub layout: DeviceLayoutId,
    /// Create with the link flag (all descs of the call are linked together)
    pub link: bool,
}

/// Failed creation call
///
/// `partial` holds whatever the driver produced before failing, in desc
/// order; the caller destroys every `Some` entry.
#[derive(Debug)]
pub struct ShaderCreateFailure {
    /// Handles produced before the failure (None where nothing was created)
    pub partial: Vec<Option<ShaderObjectHandle>>,
    /// Cause reported by the device
    pub error: Error,
}

/// GPU device operations needed by the shader object engine
///
/// Implemented by backend devices (e.g., the Vulkan shader object device).
/// Creation is expected once up front; calls are serialized by the caller.
pub trait ShaderDevice: Send {
    /// Stages the device exposes (e.g., without tessellation when the feature is off)
    fn enabled_stages(&self) -> StageFlags;

    /// Create a device layout from a descriptor
    fn create_layout(&mut self, desc: &ResourceLayoutDesc) -> Result<DeviceLayoutId>;

    /// Destroy a device layout
    fn destroy_layout(&mut self, layout: DeviceLayoutId);

    /// Create shader objects in a single call
    ///
    /// On success returns exactly one handle per desc, in desc order.
    fn create_shaders(
        &mut self,
        descs: &[ShaderCreateDesc<'_>],
    ) -> std::result::Result<Vec<ShaderObjectHandle>, ShaderCreateFailure>;

    /// Destroy a shader object
    fn destroy_shader(&mut self, handle: ShaderObjectHandle);
}
