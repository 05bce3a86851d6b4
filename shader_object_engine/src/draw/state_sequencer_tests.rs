//! Unit tests for state_sequencer.rs
//!
//! Covers minimal-delta emission (idempotence, single-stage rebinds,
//! explicit unbinds), the sequencer state machine and recording aborts.

use crate::draw::{
    StateSequencer, SequencerState, StageRequirements, DrawRequest, DrawModel,
    FixedFunctionOverrides, FixedFunctionState, FixedFunctionValue, CullMode,
    PushConstantData, FIXED_FUNCTION_VALUE_COUNT,
};
use crate::error::Error;
use crate::mock_backend::{MockCommandStream, StreamCommand, handle};
use crate::shader::{ShaderStage, StageFlags, DeviceLayoutId};

fn configured(enabled: StageFlags) -> StateSequencer {
    let mut sequencer = StateSequencer::new(enabled, false);
    sequencer.set_initial_state(FixedFunctionState::default()).unwrap();
    sequencer
}

fn request<'a>(model: &'a DrawModel, stages: StageRequirements) -> DrawRequest<'a> {
    DrawRequest {
        model,
        stages,
        overrides: FixedFunctionOverrides::none(),
        push_constants: None,
    }
}

fn vertex_fragment(vertex: u64, fragment: u64) -> StageRequirements {
    StageRequirements::new()
        .with(ShaderStage::Vertex, handle(vertex))
        .with(ShaderStage::Fragment, handle(fragment))
}

// ============================================================================
// DELTA EMISSION TESTS
// ============================================================================

#[test]
fn test_first_draw_emits_every_value_and_one_bind_per_stage() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);

    let emission = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();

    assert_eq!(emission.fixed_function_calls as usize, FIXED_FUNCTION_VALUE_COUNT);
    assert_eq!(emission.bind_calls, 2);
    assert_eq!(emission.draw_calls, 1);
    assert_eq!(stream.bind_calls(), vec![
        &vec![(ShaderStage::Vertex, Some(handle(1)))],
        &vec![(ShaderStage::Fragment, Some(handle(2)))],
    ]);
    assert_eq!(stream.draw_calls(), 1);
    assert_eq!(sequencer.state(), SequencerState::Drawing);
}

#[test]
fn test_identical_draw_emits_only_the_draw() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let req = request(&model, vertex_fragment(1, 2));

    sequencer.draw(&mut stream, &req).unwrap();
    stream.clear();
    let emission = sequencer.draw(&mut stream, &req).unwrap();

    assert_eq!(stream.commands, vec![StreamCommand::Draw("cube".to_string())]);
    assert_eq!(emission.fixed_function_calls, 0);
    assert_eq!(emission.bind_calls, 0);
    assert!(emission.stages_rebound.is_empty());
}

#[test]
fn test_fragment_only_change_rebinds_only_fragment() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::ALL_GRAPHICS);
    let model = DrawModel::new("teapot", 1024);

    sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();
    stream.clear();
    let emission = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 3))).unwrap();

    assert_eq!(emission.stages_rebound, StageFlags::FRAGMENT);
    assert_eq!(stream.commands, vec![
        StreamCommand::BindStages(vec![(ShaderStage::Fragment, Some(handle(3)))]),
        StreamCommand::Draw("teapot".to_string()),
    ]);
}

#[test]
fn test_dropping_geometry_emits_explicit_unbind() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::ALL_GRAPHICS);
    let model = DrawModel::new("hair", 500);

    let with_geometry = vertex_fragment(1, 2).with(ShaderStage::Geometry, handle(9));
    sequencer.draw(&mut stream, &request(&model, with_geometry)).unwrap();
    stream.clear();
    sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();

    assert_eq!(stream.commands, vec![
        StreamCommand::BindStages(vec![(ShaderStage::Geometry, None)]),
        StreamCommand::Draw("hair".to_string()),
    ]);
}

#[test]
fn test_overrides_emit_only_changed_values() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("quad", 6);

    sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();
    stream.clear();

    let mut req = request(&model, vertex_fragment(1, 2));
    req.overrides = FixedFunctionOverrides::none().with_cull_mode(CullMode::None);
    sequencer.draw(&mut stream, &req).unwrap();

    assert_eq!(stream.commands, vec![
        StreamCommand::SetFixedFunction(FixedFunctionValue::CullMode(CullMode::None)),
        StreamCommand::Draw("quad".to_string()),
    ]);
    assert_eq!(
        sequencer.snapshot().state().map(|s| s.cull_mode),
        Some(CullMode::None)
    );
}

#[test]
fn test_batched_binds_use_one_call_per_draw() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = StateSequencer::new(StageFlags::ALL_GRAPHICS, true);
    sequencer.set_initial_state(FixedFunctionState::default()).unwrap();
    let model = DrawModel::new("cube", 36);

    let emission = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();

    assert_eq!(emission.bind_calls, 1);
    assert_eq!(stream.bind_calls().len(), 1);
    assert_eq!(stream.bind_calls()[0].len(), 5);
    assert!(sequencer.tracker().is_fully_bound());
}

#[test]
fn test_push_constants_precede_draw() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let data = [0u8; 64];

    let mut req = request(&model, vertex_fragment(1, 2));
    req.push_constants = Some(PushConstantData {
        layout: DeviceLayoutId(100),
        stages: StageFlags::VERTEX,
        offset: 0,
        data: &data,
    });
    let emission = sequencer.draw(&mut stream, &req).unwrap();

    assert_eq!(emission.push_constant_calls, 1);
    let n = stream.commands.len();
    assert_eq!(stream.commands[n - 2], StreamCommand::PushConstants {
        layout: DeviceLayoutId(100),
        stages: StageFlags::VERTEX,
        offset: 0,
        size: 64,
    });
    assert_eq!(stream.commands[n - 1], StreamCommand::Draw("cube".to_string()));
}

fn transform_push(data: &[u8]) -> PushConstantData<'_> {
    PushConstantData { layout: DeviceLayoutId(100), stages: StageFlags::VERTEX, offset: 0, data }
}

#[test]
fn test_identical_push_constants_are_not_re_emitted() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let data = [7u8; 64];

    let mut req = request(&model, vertex_fragment(1, 2));
    req.push_constants = Some(transform_push(&data));
    sequencer.draw(&mut stream, &req).unwrap();
    stream.clear();
    let emission = sequencer.draw(&mut stream, &req).unwrap();

    assert_eq!(emission.push_constant_calls, 0);
    assert_eq!(stream.commands, vec![StreamCommand::Draw("cube".to_string())]);
    assert_eq!(sequencer.stats().redundant_pushes_skipped, 1);
}

#[test]
fn test_changed_push_constants_are_emitted() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let first = [1u8; 64];
    let moved = [2u8; 64];

    let mut req = request(&model, vertex_fragment(1, 2));
    req.push_constants = Some(transform_push(&first));
    sequencer.draw(&mut stream, &req).unwrap();

    req.push_constants = Some(transform_push(&moved));
    assert_eq!(sequencer.draw(&mut stream, &req).unwrap().push_constant_calls, 1);

    // Same bytes under another layout still need a push
    req.push_constants = Some(PushConstantData { layout: DeviceLayoutId(101), ..transform_push(&moved) });
    assert_eq!(sequencer.draw(&mut stream, &req).unwrap().push_constant_calls, 1);
    assert_eq!(sequencer.stats().redundant_pushes_skipped, 0);
}

#[test]
fn test_reset_forgets_last_push_constants() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let data = [7u8; 64];

    let mut req = request(&model, vertex_fragment(1, 2));
    req.push_constants = Some(transform_push(&data));
    sequencer.draw(&mut stream, &req).unwrap();

    sequencer.reset();
    sequencer.set_initial_state(FixedFunctionState::default()).unwrap();
    let emission = sequencer.draw(&mut stream, &req).unwrap();

    assert_eq!(emission.push_constant_calls, 1);
}

#[test]
fn test_stats_count_skipped_work() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);
    let req = request(&model, vertex_fragment(1, 2));

    sequencer.draw(&mut stream, &req).unwrap();
    sequencer.draw(&mut stream, &req).unwrap();

    let stats = sequencer.stats();
    assert_eq!(stats.draws, 2);
    assert_eq!(stats.bind_calls, 2);
    assert_eq!(stats.redundant_binds_skipped, 2);
    assert_eq!(stats.redundant_values_skipped as usize, FIXED_FUNCTION_VALUE_COUNT);
}

// ============================================================================
// STATE MACHINE TESTS
// ============================================================================

#[test]
fn test_draw_before_initial_state_aborts() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = StateSequencer::new(StageFlags::VERTEX | StageFlags::FRAGMENT, false);
    let model = DrawModel::new("cube", 36);

    let result = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2)));
    assert!(matches!(result, Err(Error::BindingContractViolation(_))));
    assert_eq!(sequencer.state(), SequencerState::Aborted);
    assert!(stream.commands.is_empty());
}

#[test]
fn test_initial_state_only_on_reset_stream() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    assert_eq!(sequencer.state(), SequencerState::Configured);

    // Re-configuring before the first draw is allowed
    sequencer.set_initial_state(FixedFunctionState::default()).unwrap();

    let model = DrawModel::new("cube", 36);
    sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).unwrap();
    assert!(sequencer.set_initial_state(FixedFunctionState::default()).is_err());

    sequencer.reset();
    assert_eq!(sequencer.state(), SequencerState::Empty);
    assert!(sequencer.snapshot().is_empty());
    assert!(sequencer.set_initial_state(FixedFunctionState::default()).is_ok());
}

#[test]
fn test_missing_vertex_shader_aborts_recording() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);

    let stages = StageRequirements::new().with(ShaderStage::Fragment, handle(2));
    let result = sequencer.draw(&mut stream, &request(&model, stages));

    assert!(matches!(result, Err(Error::BindingContractViolation(_))));
    assert_eq!(sequencer.state(), SequencerState::Aborted);

    // Refused until reset
    let again = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2)));
    assert!(again.is_err());
    assert_eq!(stream.draw_calls(), 0);

    sequencer.reset();
    sequencer.set_initial_state(FixedFunctionState::default()).unwrap();
    assert!(sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2))).is_ok());
}

#[test]
fn test_stage_not_enabled_aborts_recording() {
    let mut stream = MockCommandStream::new();
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);

    let stages = vertex_fragment(1, 2).with(ShaderStage::Geometry, handle(3));
    let result = sequencer.draw(&mut stream, &request(&model, stages));

    assert!(matches!(result, Err(Error::BindingContractViolation(_))));
    assert_eq!(sequencer.state(), SequencerState::Aborted);
}

#[test]
fn test_stream_error_aborts_recording() {
    let mut stream = MockCommandStream::new();
    stream.fail_next_draw = true;
    let mut sequencer = configured(StageFlags::VERTEX | StageFlags::FRAGMENT);
    let model = DrawModel::new("cube", 36);

    let result = sequencer.draw(&mut stream, &request(&model, vertex_fragment(1, 2)));
    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(sequencer.state(), SequencerState::Aborted);
}
