//! Integration tests for the ShaderRegistry workflow
//!
//! create -> link/build -> permutations -> draw lists -> destroy_all, through
//! the public API only. No GPU required.
//!
//! Run with: cargo test --test registry_integration_tests


use mock_backend::{registry, transform_layout, desc, CaptureStream, Command};
use shader_object_engine::glam::Mat4;
use shader_object_engine::shobj::{Config, Error, ShaderSet};
use shader_object_engine::shobj::shader::{ShaderStage, StageFlags, ResourceLayoutDesc};
use shader_object_engine::shobj::draw::{
    DrawList, DrawModel, FixedFunctionOverrides, FixedFunctionState, PolygonMode, CullMode,
    SequencerState,
};

const VERT: &str = "#version 450\nvoid main() { gl_Position = vec4(0.0); }";
const FRAG: &str = "#version 450\nlayout(location = 0) out vec4 color;\nvoid main() { color = vec4(1.0); }";

// ============================================================================
// END-TO-END WORKFLOW
// ============================================================================

#[test]
fn test_integration_linked_pair_first_draw() {
    let (mut registry, device) = registry(StageFlags::ALL_GRAPHICS, Config::default());
    registry.register_layout("basic", transform_layout()).unwrap();

    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    registry.link(v, f).unwrap();
    assert_eq!(device.lock().unwrap().live.len(), 2);
    assert_eq!(device.lock().unwrap().linked_calls, 1);

    let mut recording = registry.begin_stream(CaptureStream::default()).unwrap();
    registry
        .draw_with(&mut recording, &DrawModel::new("cube", 36), &ShaderSet::new(v, f), FixedFunctionOverrides::none())
        .unwrap();

    // Vertex and fragment bound, the three stages the set leaves empty unbound
    let stream = recording.stream();
    assert_eq!(stream.binds(), 5);
    assert_eq!(stream.draws(), 1);
    assert_eq!(stream.commands.last(), Some(&Command::Draw("cube".to_string())));

    registry.destroy_all();
    assert!(device.lock().unwrap().live.is_empty());
    assert_eq!(device.lock().unwrap().layouts, 0);
}

#[test]
fn test_integration_stream_rejects_config_missing_device_stages() {
    let config = Config {
        enabled_stages: StageFlags::VERTEX | StageFlags::FRAGMENT,
        ..Config::default()
    };
    let (registry, _device) = registry(StageFlags::ALL_GRAPHICS, config);

    assert!(matches!(registry.begin_stream(CaptureStream::default()), Err(Error::InvalidResource(_))));
}

#[test]
fn test_integration_second_frame_starts_from_empty_snapshot() {
    let (mut registry, _device) = registry(StageFlags::VERTEX | StageFlags::FRAGMENT, Config::default());
    registry.register_layout("basic", transform_layout()).unwrap();
    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    registry.link(v, f).unwrap();
    let set = ShaderSet::new(v, f);
    let model = DrawModel::new("cube", 36).with_transform(Mat4::from_rotation_y(0.5));

    let mut recording = registry.begin_stream(CaptureStream::default()).unwrap();
    registry.draw_with(&mut recording, &model, &set, FixedFunctionOverrides::none()).unwrap();
    registry.draw_with(&mut recording, &model, &set, FixedFunctionOverrides::none()).unwrap();
    let first_frame = recording.stream().commands.len();

    // New frame on the same stream: everything is emitted again
    recording.restart(FixedFunctionState::default(), |stream| {
        stream.commands.clear();
        Ok(())
    }).unwrap();
    registry.draw_with(&mut recording, &model, &set, FixedFunctionOverrides::none()).unwrap();

    let state_calls = recording.stream().commands.iter().filter(|c| matches!(c, Command::State(_))).count();
    assert!(state_calls > 0);
    assert_eq!(recording.stream().binds(), 2);
    assert!(recording.stream().commands.contains(&Command::Push(64)));
    // Second draw of the first frame had the same transform: it only drew
    assert_eq!(first_frame, recording.stream().commands.len() + 1);
}

#[test]
fn test_integration_transform_pushed_only_when_it_changes() {
    let (mut registry, _device) = registry(StageFlags::VERTEX | StageFlags::FRAGMENT, Config::default());
    registry.register_layout("basic", transform_layout()).unwrap();
    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    registry.link(v, f).unwrap();
    let set = ShaderSet::new(v, f);
    let still = DrawModel::new("cube", 36).with_transform(Mat4::from_rotation_y(0.5));
    let moved = DrawModel::new("cube", 36).with_transform(Mat4::from_rotation_y(1.0));

    let mut recording = registry.begin_stream(CaptureStream::default()).unwrap();
    let pushes: Vec<u32> = [&still, &still, &moved]
        .into_iter()
        .map(|model| registry.draw_with(&mut recording, model, &set, FixedFunctionOverrides::none()).unwrap().push_constant_calls)
        .collect();

    assert_eq!(pushes, vec![1, 0, 1]);
    assert_eq!(recording.stream().commands.iter().filter(|c| matches!(c, Command::Push(64))).count(), 2);
    assert_eq!(recording.sequencer().stats().redundant_pushes_skipped, 1);
}

#[test]
fn test_integration_wireframe_override_round_trip() {
    let (mut registry, _device) = registry(StageFlags::VERTEX | StageFlags::FRAGMENT, Config::default());
    registry.register_layout("basic", ResourceLayoutDesc::default()).unwrap();
    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    registry.build(v).unwrap();
    registry.build(f).unwrap();
    let set = ShaderSet::new(v, f);

    let mut recording = registry.begin_stream(CaptureStream::default()).unwrap();
    registry.draw_with(&mut recording, &DrawModel::new("a", 3), &set, FixedFunctionOverrides::none()).unwrap();

    let wire = FixedFunctionOverrides::none()
        .with_polygon_mode(PolygonMode::Line)
        .with_cull_mode(CullMode::None);
    let emission = registry.draw_with(&mut recording, &DrawModel::new("b", 3), &set, wire).unwrap();
    assert_eq!(emission.fixed_function_calls, 2);
    assert_eq!(emission.bind_calls, 0);

    // Back to the base state: the same two values are restored
    let emission = registry.draw_with(&mut recording, &DrawModel::new("c", 3), &set, FixedFunctionOverrides::none()).unwrap();
    assert_eq!(emission.fixed_function_calls, 2);
    assert_eq!(recording.sequencer().stats().draws, 3);
}

// ============================================================================
// STARTUP FAILURES
// ============================================================================

#[test]
fn test_integration_failures_exclude_permutations_only() {
    let (mut registry, device) = registry(StageFlags::VERTEX | StageFlags::FRAGMENT, Config::default());
    registry.register_layout("basic", transform_layout()).unwrap();
    device.lock().unwrap().reject = Some("glitch.frag".to_string());

    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    let glitch = registry.create(desc("glitch.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    let broken = registry.create(desc("broken.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", "#error"));
    assert!(broken.is_err());

    registry.build(v).unwrap();
    registry.build(f).unwrap();
    assert!(matches!(registry.build(glitch), Err(Error::CreationFailure { .. })));

    registry.register_permutation("basic", ShaderSet::new(v, f)).unwrap();
    assert!(registry.register_permutation("glitch", ShaderSet::new(v, glitch)).is_err());

    assert_eq!(registry.permutations().len(), 1);
    assert_eq!(registry.next_permutation(0), Some(0));
    assert_eq!(registry.startup_failures().len(), 3);
}

#[test]
fn test_integration_draw_list_with_mixed_sets() {
    let (mut registry, _device) = registry(StageFlags::ALL_GRAPHICS, Config::default());
    registry.register_layout("basic", transform_layout()).unwrap();
    let v = registry.create(desc("basic.vert", ShaderStage::Vertex, StageFlags::FRAGMENT | StageFlags::GEOMETRY, "basic", VERT)).unwrap();
    let g = registry.create(desc("fur.geom", ShaderStage::Geometry, StageFlags::FRAGMENT, "basic", VERT)).unwrap();
    let f = registry.create(desc("basic.frag", ShaderStage::Fragment, StageFlags::empty(), "basic", FRAG)).unwrap();
    for key in [v, g, f] {
        registry.build(key).unwrap();
    }

    let mut list = DrawList::new();
    list.push(DrawModel::new("body", 300), ShaderSet::new(v, f), FixedFunctionOverrides::none());
    list.push(DrawModel::new("fur", 900), ShaderSet::new(v, f).with_geometry(g), FixedFunctionOverrides::none());
    list.push(DrawModel::new("eyes", 60), ShaderSet::new(v, f), FixedFunctionOverrides::none());

    let mut recording = registry.begin_stream(CaptureStream::default()).unwrap();
    let report = list.record(&registry, &mut recording, registry.config().sort_draws).unwrap();

    assert_eq!(report.recorded, 3);
    assert_eq!(recording.sequencer().state(), SequencerState::Drawing);
    // body and eyes are recorded back to back, fur last
    let draws: Vec<&Command> = recording.stream().commands.iter()
        .filter(|c| matches!(c, Command::Draw(_)))
        .collect();
    assert_eq!(draws, vec![
        &Command::Draw("body".to_string()),
        &Command::Draw("eyes".to_string()),
        &Command::Draw("fur".to_string()),
    ]);
}
