/// ShaderRegistry - owns every shader unit, its layouts and the device handle
///
/// Units are addressed by `ShaderUnitKey` and by their unique name. Shader
/// sets (the combinations actually drawn with) are validated when formed:
/// stages in pipeline order, one shared layout, each unit allowing the next
/// stage, and linked units only alongside their exact link partners.
///
/// Startup failures (compilation, creation, layout) are logged and collected;
/// they exclude the affected permutation without stopping the process.

use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::shader::{
    ShaderDevice, ShaderCompiler, ShaderBuilder, ShaderUnit, ShaderUnitDesc,
    ShaderStage, StageFlags, LayoutRegistry, ResourceLayout, ResourceLayoutDesc,
};
use crate::draw::{
    CommandStream, RecordingStream, DrawModel, DrawRequest, DrawEmission,
    StageRequirements, PushConstantData, FixedFunctionOverrides,
};

new_key_type! {
    /// Stable key for a shader unit
    pub struct ShaderUnitKey;
}

/// Size of the per-model transform pushed before each draw
const TRANSFORM_PUSH_SIZE: u32 = std::mem::size_of::<glam::Mat4>() as u32;

// ===== SHADER SET =====

/// Units bound together for a draw
///
/// Stages not present are explicitly unbound by the draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderSet {
    pub vertex: ShaderUnitKey,
    /// Tessellation control + evaluation pair
    pub tessellation: Option<(ShaderUnitKey, ShaderUnitKey)>,
    pub geometry: Option<ShaderUnitKey>,
    pub fragment: ShaderUnitKey,
}

impl ShaderSet {
    pub fn new(vertex: ShaderUnitKey, fragment: ShaderUnitKey) -> Self {
        Self {
            vertex,
            tessellation: None,
            geometry: None,
            fragment,
        }
    }

    pub fn with_geometry(mut self, geometry: ShaderUnitKey) -> Self {
        self.geometry = Some(geometry);
        self
    }

    pub fn with_tessellation(mut self, control: ShaderUnitKey, evaluation: ShaderUnitKey) -> Self {
        self.tessellation = Some((control, evaluation));
        self
    }

    /// (key, expected stage) pairs in pipeline order
    pub fn entries(&self) -> Vec<(ShaderUnitKey, ShaderStage)> {
        let mut entries = vec![(self.vertex, ShaderStage::Vertex)];
        if let Some((control, evaluation)) = self.tessellation {
            entries.push((control, ShaderStage::TessellationControl));
            entries.push((evaluation, ShaderStage::TessellationEvaluation));
        }
        if let Some(geometry) = self.geometry {
            entries.push((geometry, ShaderStage::Geometry));
        }
        entries.push((self.fragment, ShaderStage::Fragment));
        entries
    }
}

/// Named, validated shader set available for rotation
#[derive(Debug, Clone)]
pub struct Permutation {
    name: String,
    set: ShaderSet,
}

impl Permutation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self) -> &ShaderSet {
        &self.set
    }
}

// ===== SHADER REGISTRY =====

pub struct ShaderRegistry {
    device: Arc<Mutex<dyn ShaderDevice>>,
    compiler: Box<dyn ShaderCompiler>,
    config: Config,
    layouts: LayoutRegistry,
    units: SlotMap<ShaderUnitKey, ShaderUnit>,
    names: FxHashMap<String, ShaderUnitKey>,
    permutations: Vec<Permutation>,
    failures: Vec<Error>,
}

impl ShaderRegistry {
    /// Create an empty registry
    ///
    /// # Arguments
    ///
    /// * `device` - Device shader objects and layouts are created on
    /// * `compiler` - Compiler for source-text units
    /// * `config` - Stage tracking and recording configuration
    pub fn new(
        device: Arc<Mutex<dyn ShaderDevice>>,
        compiler: Box<dyn ShaderCompiler>,
        config: Config,
    ) -> Self {
        Self {
            device,
            compiler,
            config,
            layouts: LayoutRegistry::new(),
            units: SlotMap::with_key(),
            names: FxHashMap::default(),
            permutations: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn lock_device<'a>(device: &'a Mutex<dyn ShaderDevice + 'static>) -> Result<MutexGuard<'a, dyn ShaderDevice + 'static>> {
        device.lock().map_err(|_| crate::engine_err!("shobj::ShaderRegistry",
            "Shader device lock poisoned"))
    }

    fn record_failure<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.failures.push(error.clone());
        }
        result
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ===== LAYOUTS =====

    /// Register the resource layout of a model/material category
    pub fn register_layout(&mut self, category: &str, desc: ResourceLayoutDesc) -> Result<Arc<ResourceLayout>> {
        let result = match Self::lock_device(&self.device) {
            Ok(mut device) => self.layouts.register(&mut *device, category, desc),
            Err(error) => Err(error),
        };
        self.record_failure(result)
    }

    pub fn layout(&self, category: &str) -> Option<Arc<ResourceLayout>> {
        self.layouts.get(category)
    }

    // ===== UNITS =====

    /// Compile and register a shader unit
    ///
    /// # Errors
    ///
    /// `InvalidResource` for a duplicate name or unknown layout category,
    /// `CompilationFailure` if the source does not compile. Failures are
    /// also collected in `startup_failures`.
    pub fn create(&mut self, desc: ShaderUnitDesc) -> Result<ShaderUnitKey> {
        if self.names.contains_key(&desc.name) {
            let error = Error::InvalidResource(format!("Shader unit '{}' already exists", desc.name));
            crate::engine_error!("shobj::ShaderRegistry", "{}", error);
            return self.record_failure(Err(error));
        }

        let name = desc.name.clone();
        let unit = ShaderUnit::new(desc, self.compiler.as_mut(), &self.layouts);
        let unit = self.record_failure(unit)?;
        let key = self.units.insert(unit);
        self.names.insert(name, key);
        Ok(key)
    }

    /// Build a vertex + fragment pair as one linked creation call
    pub fn link(&mut self, vertex: ShaderUnitKey, fragment: ShaderUnitKey) -> Result<()> {
        let result = self.link_units(vertex, fragment);
        self.record_failure(result)
    }

    fn link_units(&mut self, vertex: ShaderUnitKey, fragment: ShaderUnitKey) -> Result<()> {
        let [vertex_unit, fragment_unit] = match self.units.get_disjoint_mut([vertex, fragment]) {
            Some(units) => units,
            None => {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::InvalidResource(
                        "link() needs two distinct, registered shader units".to_string()));
            }
        };
        let mut device = Self::lock_device(&self.device)?;
        let mut builder = ShaderBuilder::new(&mut *device);
        builder.build_linked(vertex_unit, fragment_unit)
    }

    /// Build one unit as an unlinked shader object
    pub fn build(&mut self, key: ShaderUnitKey) -> Result<()> {
        let result = self.build_unit(key);
        self.record_failure(result)
    }

    fn build_unit(&mut self, key: ShaderUnitKey) -> Result<()> {
        let unit = match self.units.get_mut(key) {
            Some(unit) => unit,
            None => {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::InvalidResource(format!("Unknown shader unit key {:?}", key)));
            }
        };
        let mut device = Self::lock_device(&self.device)?;
        let mut builder = ShaderBuilder::new(&mut *device);
        builder.build_single(unit)
    }

    pub fn unit(&self, key: ShaderUnitKey) -> Option<&ShaderUnit> {
        self.units.get(key)
    }

    /// Look up a unit key by name
    pub fn find(&self, name: &str) -> Option<ShaderUnitKey> {
        self.names.get(name).copied()
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Errors collected while creating layouts, units and shader objects
    pub fn startup_failures(&self) -> &[Error] {
        &self.failures
    }

    // ===== SHADER SETS =====

    /// Check that a combination of units can be drawn with together
    ///
    /// # Errors
    ///
    /// - `InvalidResource`: unknown key, unit in the wrong slot, or a unit
    ///   that does not allow the following unit's stage
    /// - `LayoutMismatch`: units reference different resource layouts
    /// - `LinkViolation`: a linked unit without its exact partners
    pub fn validate_set(&self, set: &ShaderSet) -> Result<()> {
        let mut units = Vec::new();
        for (key, stage) in set.entries() {
            let unit = match self.units.get(key) {
                Some(unit) => unit,
                None => {
                    crate::engine_bail!("shobj::ShaderRegistry",
                        error = Error::InvalidResource(format!(
                            "Shader set references unknown unit {:?} for {:?}", key, stage)));
                }
            };
            if unit.stage() != stage {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::InvalidResource(format!(
                        "Unit '{}' is a {:?} shader but was placed in the {:?} slot",
                        unit.name(), unit.stage(), stage)));
            }
            units.push(unit);
        }

        let vertex = units[0];
        for unit in &units[1..] {
            if !ResourceLayout::same(vertex.layout(), unit.layout()) {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::LayoutMismatch(format!(
                        "'{}' uses layout '{}' but '{}' uses layout '{}'",
                        vertex.name(), vertex.layout().category(),
                        unit.name(), unit.layout().category())));
            }
        }

        for pair in units.windows(2) {
            if !pair[0].next_stages().contains(pair[1].stage().flag()) {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::InvalidResource(format!(
                        "'{}' ({:?}) does not allow {:?} as next stage",
                        pair[0].name(), pair[0].stage(), pair[1].stage())));
            }
        }

        for unit in &units {
            let missing: Vec<&str> = unit.link_partners().iter()
                .map(|p| p.as_str())
                .filter(|p| !units.iter().any(|u| u.name() == *p))
                .collect();
            if !missing.is_empty() {
                crate::engine_bail!("shobj::ShaderRegistry",
                    error = Error::LinkViolation(format!(
                        "'{}' was linked with [{}] which are missing from the set",
                        unit.name(), missing.join(", "))));
            }
        }
        Ok(())
    }

    // ===== PERMUTATIONS =====

    /// Register a validated, fully built shader set for rotation
    ///
    /// A set that fails validation, or uses a unit without a shader object,
    /// is excluded: the error is collected in `startup_failures` and returned.
    pub fn register_permutation(&mut self, name: &str, set: ShaderSet) -> Result<usize> {
        let result = self.check_permutation(name, &set);
        if let Err(error) = result {
            crate::engine_warn!("shobj::ShaderRegistry", "Permutation '{}' excluded: {}", name, error);
            return self.record_failure(Err(error));
        }
        self.permutations.push(Permutation { name: name.to_string(), set });
        crate::engine_debug!("shobj::ShaderRegistry", "Permutation '{}' registered", name);
        Ok(self.permutations.len() - 1)
    }

    fn check_permutation(&self, name: &str, set: &ShaderSet) -> Result<()> {
        if self.permutation(name).is_some() {
            return Err(Error::InvalidResource(format!("Permutation '{}' already registered", name)));
        }
        self.validate_set(set)?;
        for (key, _) in set.entries() {
            if let Some(unit) = self.units.get(key) {
                if !unit.is_built() {
                    return Err(Error::InvalidResource(format!(
                        "Permutation '{}' uses '{}' which has no shader object", name, unit.name())));
                }
            }
        }
        Ok(())
    }

    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    pub fn permutation(&self, name: &str) -> Option<&Permutation> {
        self.permutations.iter().find(|p| p.name == name)
    }

    /// Index of the permutation following `current`, wrapping around
    pub fn next_permutation(&self, current: usize) -> Option<usize> {
        if self.permutations.is_empty() {
            return None;
        }
        Some((current + 1) % self.permutations.len())
    }

    // ===== RECORDING =====

    /// Wrap a command stream and start its recording with the configured initial state
    ///
    /// The stream tracks every stage the device enables, so no enabled stage
    /// is ever left with an unknown binding. A configuration that does not
    /// cover all of the device's graphics stages is rejected.
    pub fn begin_stream<C: CommandStream>(&self, stream: C) -> Result<RecordingStream<C>> {
        let device_stages = Self::lock_device(&self.device)?.enabled_stages();
        let uncovered = (device_stages & StageFlags::ALL_GRAPHICS) - self.config.enabled_stages;
        if !uncovered.is_empty() {
            crate::engine_bail!("shobj::ShaderRegistry", error = Error::InvalidResource(format!(
                "Configured stages {:?} do not cover device stages {:?}",
                self.config.enabled_stages, uncovered
            )));
        }

        let mut recording = RecordingStream::new(stream, device_stages, self.config.batch_stage_binds);
        recording.begin(self.config.initial_state)?;
        Ok(recording)
    }

    /// Bind `set`, apply `overrides` and draw `model`
    ///
    /// A set that fails validation is rejected without touching the stream.
    /// A unit without a shader object, or any binding contract violation,
    /// aborts the stream's recording.
    pub fn draw_with<C: CommandStream>(
        &self,
        recording: &mut RecordingStream<C>,
        model: &DrawModel,
        set: &ShaderSet,
        overrides: FixedFunctionOverrides,
    ) -> Result<DrawEmission> {
        self.validate_set(set)?;

        let mut stages = StageRequirements::new();
        for (key, stage) in set.entries() {
            let handle = self.units.get(key).map(|unit| unit.require_handle());
            match handle {
                Some(Ok(handle)) => stages.set(stage, Some(handle)),
                Some(Err(error)) => {
                    recording.sequencer_mut().abort(&error);
                    return Err(error);
                }
                None => {}
            }
        }

        let layout = match self.units.get(set.vertex) {
            Some(vertex) => vertex.layout().clone(),
            None => crate::engine_bail!("shobj::ShaderRegistry",
                error = Error::InvalidResource(format!("Unknown vertex unit {:?}", set.vertex))),
        };
        let transform = model.transform;
        let push_constants = match (transform.as_ref(), layout.push_constant_range_for(TRANSFORM_PUSH_SIZE)) {
            (Some(matrix), Some(range)) => Some(PushConstantData {
                layout: layout.device_layout(),
                stages: range.stages,
                offset: 0,
                data: bytemuck::bytes_of(matrix),
            }),
            _ => None,
        };

        recording.draw(&DrawRequest {
            model,
            stages,
            overrides,
            push_constants,
        })
    }

    // ===== TEARDOWN =====

    /// Destroy every shader object, then every device layout
    ///
    /// Units stay registered without handles; drawing with them afterwards
    /// is a binding contract violation.
    pub fn destroy_all(&mut self) {
        let mut device = match self.device.lock() {
            Ok(device) => device,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut destroyed = 0;
        for unit in self.units.values_mut() {
            if let Some(handle) = unit.take_handle() {
                device.destroy_shader(handle);
                destroyed += 1;
            }
        }
        let layouts = self.layouts.len();
        self.layouts.destroy_all(&mut *device);

        crate::engine_info!("shobj::ShaderRegistry",
            "Destroyed {} shader object(s) and {} layout(s)", destroyed, layouts);
    }
}

impl Drop for ShaderRegistry {
    fn drop(&mut self) {
        if self.units.values().any(|u| u.is_built()) || !self.layouts.is_empty() {
            self.destroy_all();
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
