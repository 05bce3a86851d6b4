/// DrawList - draws collected for one stream, recorded in state-key order
///
/// Sorting groups draws by vertex, tessellation, geometry and fragment unit,
/// then by fixed-function overrides, so the sequencer's delta between
/// consecutive draws stays small.

use rdst::RadixSort;
use rustc_hash::FxHashMap;
use slotmap::Key;
use crate::error::Result;
use crate::registry::{ShaderRegistry, ShaderSet, ShaderUnitKey};
use crate::draw::{CommandStream, RecordingStream, DrawModel, FixedFunctionOverrides};

/// One queued draw
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub model: DrawModel,
    pub set: ShaderSet,
    pub overrides: FixedFunctionOverrides,
}

/// Outcome of recording a draw list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawListReport {
    /// Draws issued on the stream
    pub recorded: u32,
    /// Draws skipped because their shader set was rejected
    pub rejected: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DrawList {
    items: Vec<DrawItem>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, model: DrawModel, set: ShaderSet, overrides: FixedFunctionOverrides) {
        self.items.push(DrawItem { model, set, overrides });
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Item indices ordered by state key (stable for equal keys)
    ///
    /// Key layout, most significant first: 16 bits per stage slot
    /// (vertex, tess control, tess eval, geometry, fragment), 16 bits of
    /// override rank, 32 bits of item index.
    pub fn sorted_order(&self) -> Vec<usize> {
        let mut override_ranks: FxHashMap<FixedFunctionOverrides, u128> = FxHashMap::default();
        let mut keys: Vec<u128> = Vec::with_capacity(self.items.len());

        for (index, item) in self.items.iter().enumerate() {
            let next_rank = override_ranks.len() as u128;
            let rank = *override_ranks.entry(item.overrides).or_insert(next_rank);

            let (control, evaluation) = match item.set.tessellation {
                Some((control, evaluation)) => (Some(control), Some(evaluation)),
                None => (None, None),
            };
            let slots = [
                Some(item.set.vertex),
                control,
                evaluation,
                item.set.geometry,
                Some(item.set.fragment),
            ];

            let mut key = 0u128;
            for slot in slots {
                key = (key << 16) | slot_bits(slot);
            }
            key = (key << 16) | (rank & 0xFFFF);
            key = (key << 32) | (index as u128 & 0xFFFF_FFFF);
            keys.push(key);
        }

        keys.radix_sort_unstable();
        keys.into_iter().map(|key| (key & 0xFFFF_FFFF) as usize).collect()
    }

    /// Record every draw on `recording`
    ///
    /// Draws with a rejected shader set are skipped (already logged). A
    /// draw that aborts the recording stops the list and returns its error.
    pub fn record<C: CommandStream>(
        &self,
        registry: &ShaderRegistry,
        recording: &mut RecordingStream<C>,
        sort: bool,
    ) -> Result<DrawListReport> {
        let order: Vec<usize> = if sort {
            self.sorted_order()
        } else {
            (0..self.items.len()).collect()
        };

        let mut report = DrawListReport::default();
        for index in order {
            let item = &self.items[index];
            match registry.draw_with(recording, &item.model, &item.set, item.overrides) {
                Ok(_) => report.recorded += 1,
                Err(error) if recording.is_aborted() => return Err(error),
                Err(_) => report.rejected += 1,
            }
        }

        crate::engine_debug!("shobj::DrawList", "Recorded {} draw(s), rejected {}",
            report.recorded, report.rejected);
        Ok(report)
    }
}

/// Slot index + 1 of a unit key (0 for an absent stage)
fn slot_bits(key: Option<ShaderUnitKey>) -> u128 {
    match key {
        Some(key) => ((key.data().as_ffi() & 0xFFFF_FFFF) as u128 + 1) & 0xFFFF,
        None => 0,
    }
}

#[cfg(test)]
#[path = "draw_list_tests.rs"]
mod tests;
