/// ShaderBuilder - turns shader units into live shader objects
///
/// Two explicit entry points with different contracts:
/// - `build_single`: one unit, no link flag
/// - `build_linked` / `build_linked_group`: permanently coupled stages created
///   in one call with the link flag, all-or-nothing
///
/// Linking is declared by the caller, never inferred.

use crate::error::{Error, Result};
use crate::shader::{
    ShaderDevice, ShaderUnit, ShaderStage, ShaderCreateDesc, ShaderCreateFailure,
    ShaderObjectHandle, ResourceLayout,
};

/// Builds shader objects on a device
pub struct ShaderBuilder<'a> {
    device: &'a mut dyn ShaderDevice,
}

impl<'a> ShaderBuilder<'a> {
    pub fn new(device: &'a mut dyn ShaderDevice) -> Self {
        Self { device }
    }

    /// Create one unlinked shader object for `unit`
    ///
    /// # Errors
    ///
    /// - `BindingContractViolation` if the unit already holds a handle
    /// - `InvalidResource` if the unit's stage is not enabled on the device
    /// - `CreationFailure` if the device rejects the shader; the unit stays handle-less
    pub fn build_single(&mut self, unit: &mut ShaderUnit) -> Result<()> {
        Self::check_unbuilt(unit)?;
        self.check_stage_enabled(unit)?;

        let desc = Self::create_desc(unit, false);
        let names = vec![unit.name().to_string()];
        let handle = match self.device.create_shaders(&[desc]) {
            Ok(handles) => self.expect_handles(handles, &names)?.remove(0),
            Err(failure) => return Err(self.discard_failed(failure, names)),
        };

        unit.set_handle(handle)?;
        crate::engine_debug!("shobj::ShaderBuilder", "Built '{}' ({:?})", unit.name(), unit.stage());
        Ok(())
    }

    /// Create a linked vertex + fragment pair in one creation call
    ///
    /// # Errors
    ///
    /// - `CreationFailure` naming both units if the pair violates the linked
    ///   group invariants (layouts differ, fragment not an allowed next stage,
    ///   wrong stages) or if the device rejects creation. Neither unit holds a
    ///   handle afterwards.
    /// - `BindingContractViolation` if either unit already holds a handle
    pub fn build_linked(&mut self, vertex: &mut ShaderUnit, fragment: &mut ShaderUnit) -> Result<()> {
        if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
            crate::engine_bail!("shobj::ShaderBuilder",
                error = Error::CreationFailure {
                    units: vec![vertex.name().to_string(), fragment.name().to_string()],
                    message: format!("Linked pair must be Vertex + Fragment, got {:?} + {:?}",
                        vertex.stage(), fragment.stage()),
                });
        }
        self.build_linked_group(&mut [vertex, fragment])
    }

    /// Create an ordered chain of permanently coupled stages in one call
    ///
    /// Each unit must share the first unit's layout and allow the following
    /// unit's stage as a next stage.
    pub fn build_linked_group(&mut self, units: &mut [&mut ShaderUnit]) -> Result<()> {
        let names: Vec<String> = units.iter().map(|u| u.name().to_string()).collect();

        Self::validate_link(units.iter().map(|u| &**u), &names)?;
        for unit in units.iter() {
            Self::check_unbuilt(unit)?;
            self.check_stage_enabled(unit)?;
        }

        let descs: Vec<ShaderCreateDesc<'_>> = units.iter()
            .map(|u| Self::create_desc(u, true))
            .collect();
        let handles = match self.device.create_shaders(&descs) {
            Ok(handles) => self.expect_handles(handles, &names)?,
            Err(failure) => return Err(self.discard_failed(failure, names)),
        };
        drop(descs);

        for (unit, handle) in units.iter_mut().zip(handles) {
            unit.set_handle(handle)?;
            let partners = names.iter().filter(|n| n.as_str() != unit.name()).cloned().collect();
            unit.set_link_partners(partners);
        }

        crate::engine_debug!("shobj::ShaderBuilder", "Built linked group [{}]", names.join(", "));
        Ok(())
    }

    /// Check linked group invariants without creating anything
    ///
    /// Layout references must be identical and each unit must declare the
    /// next unit's stage as allowed.
    pub fn validate_link<'u>(
        units: impl Iterator<Item = &'u ShaderUnit> + Clone,
        names: &[String],
    ) -> Result<()> {
        let reject = |message: String| -> Error {
            let error = Error::CreationFailure { units: names.to_vec(), message };
            crate::engine_error!("shobj::ShaderBuilder", "{}", error);
            error
        };

        let mut iter = units.clone();
        let first = match iter.next() {
            Some(first) => first,
            None => return Err(reject("Empty linked group".to_string())),
        };
        if units.clone().count() < 2 {
            return Err(reject("A linked group needs at least two units".to_string()));
        }

        let mut previous = first;
        for unit in iter {
            if !ResourceLayout::same(first.layout(), unit.layout()) {
                return Err(reject(format!(
                    "'{}' uses layout '{}' but '{}' uses layout '{}'",
                    first.name(), first.layout().category(), unit.name(), unit.layout().category())));
            }
            if !previous.next_stages().contains(unit.stage().flag()) {
                return Err(reject(format!(
                    "'{}' ({:?}) does not allow {:?} as next stage",
                    previous.name(), previous.stage(), unit.stage())));
            }
            previous = unit;
        }
        Ok(())
    }

    fn create_desc(unit: &ShaderUnit, link: bool) -> ShaderCreateDesc<'_> {
        ShaderCreateDesc {
            name: unit.name(),
            stage: unit.stage(),
            next_stages: unit.next_stages(),
            code: unit.code(),
            entry_point: unit.entry_point(),
            layout: unit.layout().device_layout(),
            link,
        }
    }

    fn check_unbuilt(unit: &ShaderUnit) -> Result<()> {
        if unit.is_built() {
            crate::engine_bail!("shobj::ShaderBuilder",
                error = Error::BindingContractViolation(format!(
                    "Unit '{}' already holds a shader object", unit.name())));
        }
        Ok(())
    }

    fn check_stage_enabled(&self, unit: &ShaderUnit) -> Result<()> {
        if !self.device.enabled_stages().contains(unit.stage().flag()) {
            crate::engine_bail!("shobj::ShaderBuilder",
                error = Error::InvalidResource(format!(
                    "Unit '{}': stage {:?} is not enabled on this device", unit.name(), unit.stage())));
        }
        Ok(())
    }

    /// A successful call must return one handle per desc; anything else is
    /// treated as a failed call and cleaned up.
    fn expect_handles(
        &mut self,
        handles: Vec<ShaderObjectHandle>,
        names: &[String],
    ) -> Result<Vec<ShaderObjectHandle>> {
        if handles.len() == names.len() {
            return Ok(handles);
        }
        let count = handles.len();
        for handle in handles {
            self.device.destroy_shader(handle);
        }
        let error = Error::CreationFailure {
            units: names.to_vec(),
            message: format!("Device returned {} shader objects for {} units", count, names.len()),
        };
        crate::engine_error!("shobj::ShaderBuilder", "{}", error);
        Err(error)
    }

    /// Destroy whatever a failed call produced and build the reported error
    fn discard_failed(&mut self, failure: ShaderCreateFailure, names: Vec<String>) -> Error {
        let mut destroyed = 0;
        for handle in failure.partial.into_iter().flatten() {
            self.device.destroy_shader(handle);
            destroyed += 1;
        }
        if destroyed > 0 {
            crate::engine_warn!("shobj::ShaderBuilder",
                "Destroyed {} partially created shader object(s) for [{}]", destroyed, names.join(", "));
        }

        let error = match failure.error {
            Error::OutOfMemory => Error::OutOfMemory,
            Error::CreationFailure { message, .. } => Error::CreationFailure { units: names, message },
            other => Error::CreationFailure { units: names, message: other.to_string() },
        };
        crate::engine_error!("shobj::ShaderBuilder", "{}", error);
        error
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
