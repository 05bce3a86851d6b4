/// Fixed-function draw state and the per-stream snapshot of it
///
/// Every value here is dynamic state: it is set on the command stream
/// independently of shader binding.

// ===== RASTERIZATION ENUMS =====

/// Face culling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    Back,
    /// Cull both faces
    FrontAndBack,
}

/// Front face winding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrontFace {
    /// Counter-clockwise vertices define front face
    CounterClockwise,
    /// Clockwise vertices define front face
    Clockwise,
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolygonMode {
    /// Fill polygons
    Fill,
    /// Draw edges only (wireframe)
    Line,
    /// Draw vertices only
    Point,
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    /// Patches for tessellation (control point count is its own state value)
    PatchList,
}

/// Comparison operator for depth tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

// ===== ATTACHMENT FORMATS =====

/// Color attachment format
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    A2B10G10R10_UNORM,
    R16G16B16A16_SFLOAT,
    R32G32B32A32_SFLOAT,
}

/// Depth attachment format
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFormat {
    D16_UNORM,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

/// Output attachment formats of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentFormats {
    pub color: ColorFormat,
    pub depth: Option<DepthFormat>,
}

// ===== STATE =====

/// One settable fixed-function value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedFunctionValue {
    AttachmentFormats(AttachmentFormats),
    CullMode(CullMode),
    FrontFace(FrontFace),
    PolygonMode(PolygonMode),
    Topology(PrimitiveTopology),
    PatchControlPoints(u32),
    DepthTestEnable(bool),
    DepthWriteEnable(bool),
    DepthCompareOp(CompareOp),
}

/// Number of values in a FixedFunctionState
pub const FIXED_FUNCTION_VALUE_COUNT: usize = 9;

/// Complete fixed-function state of a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedFunctionState {
    pub attachment_formats: AttachmentFormats,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub topology: PrimitiveTopology,
    pub patch_control_points: u32,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
}

impl Default for FixedFunctionState {
    fn default() -> Self {
        Self {
            attachment_formats: AttachmentFormats {
                color: ColorFormat::B8G8R8A8_SRGB,
                depth: Some(DepthFormat::D32_SFLOAT),
            },
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            topology: PrimitiveTopology::TriangleList,
            patch_control_points: 3,
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::LessOrEqual,
        }
    }
}

impl FixedFunctionState {
    /// All values in emission order (attachment formats first)
    pub fn values(&self) -> [FixedFunctionValue; FIXED_FUNCTION_VALUE_COUNT] {
        [
            FixedFunctionValue::AttachmentFormats(self.attachment_formats),
            FixedFunctionValue::CullMode(self.cull_mode),
            FixedFunctionValue::FrontFace(self.front_face),
            FixedFunctionValue::PolygonMode(self.polygon_mode),
            FixedFunctionValue::Topology(self.topology),
            FixedFunctionValue::PatchControlPoints(self.patch_control_points),
            FixedFunctionValue::DepthTestEnable(self.depth_test_enable),
            FixedFunctionValue::DepthWriteEnable(self.depth_write_enable),
            FixedFunctionValue::DepthCompareOp(self.depth_compare_op),
        ]
    }

    /// Values that differ from `previous` (every value when there is none)
    pub fn diff(&self, previous: Option<&FixedFunctionState>) -> Vec<FixedFunctionValue> {
        let current = self.values();
        match previous {
            None => current.to_vec(),
            Some(previous) => current.into_iter()
                .zip(previous.values())
                .filter(|(new, old)| new != old)
                .map(|(new, _)| new)
                .collect(),
        }
    }
}

/// Per-draw changes layered on a stream's initial state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FixedFunctionOverrides {
    pub attachment_formats: Option<AttachmentFormats>,
    pub cull_mode: Option<CullMode>,
    pub front_face: Option<FrontFace>,
    pub polygon_mode: Option<PolygonMode>,
    pub topology: Option<PrimitiveTopology>,
    pub patch_control_points: Option<u32>,
    pub depth_test_enable: Option<bool>,
    pub depth_write_enable: Option<bool>,
    pub depth_compare_op: Option<CompareOp>,
}

impl FixedFunctionOverrides {
    /// No overrides
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = Some(cull_mode);
        self
    }

    pub fn with_depth_write(mut self, enable: bool) -> Self {
        self.depth_write_enable = Some(enable);
        self
    }

    pub fn with_polygon_mode(mut self, polygon_mode: PolygonMode) -> Self {
        self.polygon_mode = Some(polygon_mode);
        self
    }

    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = Some(topology);
        self
    }

    pub fn with_attachment_formats(mut self, formats: AttachmentFormats) -> Self {
        self.attachment_formats = Some(formats);
        self
    }

    /// Resolve against a base state
    pub fn apply(&self, base: &FixedFunctionState) -> FixedFunctionState {
        FixedFunctionState {
            attachment_formats: self.attachment_formats.unwrap_or(base.attachment_formats),
            cull_mode: self.cull_mode.unwrap_or(base.cull_mode),
            front_face: self.front_face.unwrap_or(base.front_face),
            polygon_mode: self.polygon_mode.unwrap_or(base.polygon_mode),
            topology: self.topology.unwrap_or(base.topology),
            patch_control_points: self.patch_control_points.unwrap_or(base.patch_control_points),
            depth_test_enable: self.depth_test_enable.unwrap_or(base.depth_test_enable),
            depth_write_enable: self.depth_write_enable.unwrap_or(base.depth_write_enable),
            depth_compare_op: self.depth_compare_op.unwrap_or(base.depth_compare_op),
        }
    }
}

/// Fixed-function values last issued on one command stream
///
/// Empty after a stream reset, in which case the next draw emits every value.
#[derive(Debug, Clone, Default)]
pub struct DrawStateSnapshot {
    state: Option<FixedFunctionState>,
}

impl DrawStateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last issued state, if any draw has been emitted since reset
    pub fn state(&self) -> Option<&FixedFunctionState> {
        self.state.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_none()
    }

    pub(crate) fn record(&mut self, state: FixedFunctionState) {
        self.state = Some(state);
    }

    pub(crate) fn clear(&mut self) {
        self.state = None;
    }
}
