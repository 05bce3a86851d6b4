/// Shader stages and stage sets

use bitflags::bitflags;

/// Number of shader stages tracked per stream
pub const STAGE_COUNT: usize = 6;

/// One phase of the GPU pipeline that executes a shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Tessellation control (hull) shader
    TessellationControl,
    /// Tessellation evaluation (domain) shader
    TessellationEvaluation,
    /// Geometry shader
    Geometry,
    /// Fragment/Pixel shader
    Fragment,
    /// Compute shader
    Compute,
}

bitflags! {
    /// Set of shader stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StageFlags: u32 {
        const VERTEX = 1 << 0;
        const TESSELLATION_CONTROL = 1 << 1;
        const TESSELLATION_EVALUATION = 1 << 2;
        const GEOMETRY = 1 << 3;
        const FRAGMENT = 1 << 4;
        const COMPUTE = 1 << 5;

        /// Every stage that takes part in a draw
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::TESSELLATION_CONTROL.bits()
            | Self::TESSELLATION_EVALUATION.bits()
            | Self::GEOMETRY.bits()
            | Self::FRAGMENT.bits();
    }
}

impl ShaderStage {
    /// All stages, in pipeline order
    pub const ALL: [ShaderStage; STAGE_COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::TessellationControl,
        ShaderStage::TessellationEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// Dense index, usable for per-stage arrays
    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::TessellationControl => 1,
            ShaderStage::TessellationEvaluation => 2,
            ShaderStage::Geometry => 3,
            ShaderStage::Fragment => 4,
            ShaderStage::Compute => 5,
        }
    }

    /// Single-stage flag
    pub fn flag(self) -> StageFlags {
        match self {
            ShaderStage::Vertex => StageFlags::VERTEX,
            ShaderStage::TessellationControl => StageFlags::TESSELLATION_CONTROL,
            ShaderStage::TessellationEvaluation => StageFlags::TESSELLATION_EVALUATION,
            ShaderStage::Geometry => StageFlags::GEOMETRY,
            ShaderStage::Fragment => StageFlags::FRAGMENT,
            ShaderStage::Compute => StageFlags::COMPUTE,
        }
    }

    /// Whether this stage participates in draws
    pub fn is_graphics(self) -> bool {
        self != ShaderStage::Compute
    }

    /// Stages that may legally follow this one
    pub fn legal_next_stages(self) -> StageFlags {
        match self {
            ShaderStage::Vertex => {
                StageFlags::TESSELLATION_CONTROL | StageFlags::GEOMETRY | StageFlags::FRAGMENT
            }
            ShaderStage::TessellationControl => StageFlags::TESSELLATION_EVALUATION,
            ShaderStage::TessellationEvaluation => StageFlags::GEOMETRY | StageFlags::FRAGMENT,
            ShaderStage::Geometry => StageFlags::FRAGMENT,
            ShaderStage::Fragment | ShaderStage::Compute => StageFlags::empty(),
        }
    }
}

impl StageFlags {
    /// Iterate over the stages contained in this set, in pipeline order
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL.into_iter().filter(move |s| self.contains(s.flag()))
    }
}

impl From<ShaderStage> for StageFlags {
    fn from(stage: ShaderStage) -> Self {
        stage.flag()
    }
}
