//! Tests for reconstruction bookkeeping and replay ordering

#![cfg(test)]

use super::Reconstruction;
use crate::config::ViolationPolicy;
use crate::error::TrackerError;
use crate::handle::{ActionId, Handle, HandleState, NodeKey, NodeRef, ObjectType};
use crate::lifecycle::ModifyMode;
use crate::trace::CallId;

fn lenient() -> Reconstruction {
    Reconstruction::new(ViolationPolicy::Log)
}

/// Record a call that creates `handle`, optionally depending on `parent`
fn create(recon: &mut Reconstruction, handle: u64, ty: ObjectType, parent: Option<u64>) -> CallId {
    let call = recon.create_api_call_info();
    recon.set_api_trace(call, "vkCreate", &handle.to_le_bytes()).unwrap();
    recon.add_handles(&[Handle(handle)], ty).unwrap();
    recon
        .for_each_handle_add_api(&[Handle(handle)], call, Some(HandleState::Created))
        .unwrap();
    recon.set_created_handles_for_api(call, &[Handle(handle)]).unwrap();
    if let Some(parent) = parent {
        recon
            .add_handle_dependency(&[Handle(handle)], Handle(parent), HandleState::Created, HandleState::Created)
            .unwrap();
    }
    recon.destroy_api_call_info_if_unused(call);
    call
}

fn modify(recon: &mut Reconstruction, handle: u64, mode: ModifyMode) -> CallId {
    let call = recon.create_api_call_info();
    recon.set_api_trace(call, "vkModify", &[]).unwrap();
    recon
        .for_each_handle_add_modify_api(&[Handle(handle)], call, mode)
        .unwrap();
    recon.destroy_api_call_info_if_unused(call);
    call
}

fn key(raw: u64) -> NodeKey {
    NodeKey::Object(Handle(raw))
}

#[test]
fn test_replay_keeps_only_latest_modify() {
    let mut recon = lenient();
    let d1 = create(&mut recon, 1, ObjectType::Device, None);
    let d2 = create(&mut recon, 2, ObjectType::DeviceMemory, Some(1));
    let first = modify(&mut recon, 2, ModifyMode::Replace);
    let second = modify(&mut recon, 2, ModifyMode::Replace);

    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![d1, d2, second]);
    assert_eq!(replay.handles, vec![Handle(1), Handle(2)]);
    assert!(!recon.trace().contains(first));
}

#[test]
fn test_append_modifies_accumulate_until_cleared() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::CommandBuffer, None);
    let begin = modify(&mut recon, 1, ModifyMode::Append);
    let draw = modify(&mut recon, 1, ModifyMode::Append);

    let replay = recon.compute_replay_buffer();
    assert_eq!(&replay.calls[1..], &[begin, draw]);

    recon.for_each_handle_clear_modify_api(&[Handle(1)]).unwrap();
    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.len(), 1);
    assert!(!recon.trace().contains(begin));
    assert!(!recon.trace().contains(draw));
}

#[test]
fn test_dependency_orders_before_sequence() {
    let mut recon = lenient();
    // memory is created after the image but the image is bound to it, so the
    // bind must come after the allocation
    let image = create(&mut recon, 10, ObjectType::Image, None);
    let memory = create(&mut recon, 20, ObjectType::DeviceMemory, None);
    let bind = recon.create_api_call_info();
    recon
        .add_handle_dependency(&[Handle(10)], Handle(20), HandleState::BoundMemory, HandleState::Created)
        .unwrap();
    recon
        .for_each_handle_add_api(&[Handle(10)], bind, Some(HandleState::BoundMemory))
        .unwrap();
    recon.destroy_api_call_info_if_unused(bind);

    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![image, memory, bind]);
    assert_eq!(recon.registry().get(key(10)).unwrap().state(), HandleState::BoundMemory);
}

#[test]
fn test_creation_waits_for_later_parent_call() {
    let mut recon = lenient();
    let child = recon.create_api_call_info();
    recon.begin_batch();
    recon.add_handles(&[Handle(5)], ObjectType::ImageView).unwrap();
    recon
        .for_each_handle_add_api(&[Handle(5)], child, Some(HandleState::Created))
        .unwrap();
    // target does not exist yet; resolved when the batch closes
    recon
        .add_handle_dependency(&[Handle(5)], Handle(4), HandleState::Created, HandleState::Created)
        .unwrap();
    recon.add_handles(&[Handle(4)], ObjectType::Image).unwrap();
    recon.end_batch().unwrap();
    recon.destroy_api_call_info_if_unused(child);

    assert!(recon.graph().has_edge(
        NodeRef::object(Handle(5), HandleState::Created),
        NodeRef::object(Handle(4), HandleState::Created),
    ));
}

#[test]
fn test_deferred_edge_without_target_is_violation() {
    let mut recon = lenient();
    recon.begin_batch();
    recon.add_handles(&[Handle(5)], ObjectType::ImageView).unwrap();
    recon
        .add_handle_dependency(&[Handle(5)], Handle(4), HandleState::Created, HandleState::Created)
        .unwrap();
    let err = recon.end_batch().unwrap_err();
    assert!(matches!(err, TrackerError::MissingDependency { .. }));
    assert_eq!(recon.graph().edge_count(), 0);
}

#[test]
fn test_edges_are_idempotent() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    create(&mut recon, 2, ObjectType::Buffer, Some(1));
    recon
        .add_handle_dependency(&[Handle(2)], Handle(1), HandleState::Created, HandleState::Created)
        .unwrap();
    recon
        .add_handle_dependency(&[Handle(2)], Handle(1), HandleState::Created, HandleState::Created)
        .unwrap();
    assert_eq!(recon.graph().edge_count(), 1);
}

#[test]
fn test_recursive_remove_cascades() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    let pool = create(&mut recon, 2, ObjectType::CommandPool, Some(1));
    let buffer = create(&mut recon, 3, ObjectType::CommandBuffer, Some(2));
    create(&mut recon, 4, ObjectType::Fence, Some(1));

    recon.remove_handles(&[Handle(2)], true).unwrap();

    assert!(!recon.registry().contains(key(2)));
    assert!(!recon.registry().contains(key(3)));
    assert!(recon.registry().contains(key(1)));
    assert!(recon.registry().contains(key(4)));
    assert!(!recon.trace().contains(pool));
    assert!(!recon.trace().contains(buffer));
    assert!(recon.graph().is_acyclic());
    assert_eq!(recon.graph().edge_count(), 1);
}

#[test]
fn test_non_recursive_remove_with_dependents_is_delayed() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    create(&mut recon, 2, ObjectType::ShaderModule, Some(1));
    create(&mut recon, 3, ObjectType::Pipeline, Some(2));

    recon.remove_handles(&[Handle(2)], false).unwrap();
    assert!(!recon.registry().contains(key(2)));
    let retired = recon.registry().retired(Handle(2));
    assert_eq!(retired.len(), 1);
    assert!(recon.registry().get(retired[0]).unwrap().delayed_destroy);
    assert_eq!(recon.graph().dependent_keys(retired[0]), vec![key(3)]);

    // destroyed-but-pending handles can't gain new dependents
    recon.add_handles(&[Handle(9)], ObjectType::Pipeline).unwrap();
    let err = recon
        .add_handle_dependency(&[Handle(9)], Handle(2), HandleState::Created, HandleState::Created)
        .unwrap_err();
    assert!(err.is_violation());

    recon.remove_handles(&[Handle(3)], false).unwrap();
    assert!(recon.registry().retired(Handle(2)).is_empty());
    assert!(recon.registry().contains(key(1)));
}

#[test]
fn test_delayed_destroyed_value_can_be_created_again() {
    let mut recon = lenient();
    let device = create(&mut recon, 1, ObjectType::Device, None);
    let old_module = create(&mut recon, 0x10, ObjectType::ShaderModule, Some(1));
    let render_pass = create(&mut recon, 0x20, ObjectType::RenderPass, Some(1));
    let pipeline = create(&mut recon, 0x30, ObjectType::Pipeline, Some(0x10));
    recon
        .add_handle_dependency(&[Handle(0x30)], Handle(0x20), HandleState::Created, HandleState::Created)
        .unwrap();

    recon.remove_handles(&[Handle(0x10)], false).unwrap();
    let new_module = create(&mut recon, 0x10, ObjectType::ShaderModule, Some(1));

    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![device, old_module, render_pass, pipeline, new_module]);
    assert_eq!(
        replay.handles,
        vec![Handle(1), Handle(0x10), Handle(0x20), Handle(0x30), Handle(0x10)]
    );
    assert_eq!(recon.registry().get(key(0x10)).unwrap().state_calls(HandleState::Created), &[new_module]);

    // the old module leaves with the pipeline, the new one stays
    recon.remove_handles(&[Handle(0x30)], false).unwrap();
    assert!(recon.registry().retired(Handle(0x10)).is_empty());
    assert!(!recon.trace().contains(old_module));
    assert!(recon.registry().contains(key(0x10)));
    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![device, render_pass, new_module]);
    assert!(recon.graph().is_acyclic());
}

#[test]
fn test_recursive_destroy_reaches_retired_records() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    let module = create(&mut recon, 2, ObjectType::ShaderModule, Some(1));
    create(&mut recon, 3, ObjectType::Pipeline, Some(2));

    recon.remove_handles(&[Handle(2)], false).unwrap();
    recon.remove_handles(&[Handle(1)], true).unwrap();
    assert!(recon.registry().is_empty());
    assert!(!recon.trace().contains(module));
    assert_eq!(recon.graph().edge_count(), 0);
}

#[test]
fn test_second_delayed_destroy_is_violation() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::ShaderModule, None);
    create(&mut recon, 2, ObjectType::Pipeline, Some(1));

    recon.remove_handles(&[Handle(1)], false).unwrap();
    let err = recon.remove_handles(&[Handle(1)], false).unwrap_err();
    assert_eq!(err, TrackerError::UnknownHandle(key(1)));
}

#[test]
fn test_leaf_remove_is_immediate() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    let fence = create(&mut recon, 2, ObjectType::Fence, Some(1));

    recon.remove_handles(&[Handle(2)], false).unwrap();
    assert!(!recon.registry().contains(key(2)));
    assert!(!recon.trace().contains(fence));
    assert_eq!(recon.graph().edge_count(), 0);
}

#[test]
fn test_destroyed_handles_excluded_from_replay() {
    let mut recon = lenient();
    let device = create(&mut recon, 1, ObjectType::Device, None);
    let buffer = create(&mut recon, 2, ObjectType::Buffer, Some(1));
    modify(&mut recon, 2, ModifyMode::Replace);

    recon.remove_handles(&[Handle(2)], false).unwrap();

    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![device]);
    assert_eq!(replay.handles, vec![Handle(1)]);
    assert!(!recon.trace().contains(buffer));
    assert_eq!(recon.trace().len(), 1);
}

#[test]
fn test_unknown_and_duplicate_handles_report_first_error() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);

    let err = recon
        .add_handles(&[Handle(1), Handle(2)], ObjectType::Device)
        .unwrap_err();
    assert_eq!(err, TrackerError::DuplicateHandle(key(1)));
    // the rest of the batch still went through
    assert!(recon.registry().contains(key(2)));

    let err = recon.remove_handles(&[Handle(77), Handle(2)], true).unwrap_err();
    assert_eq!(err, TrackerError::UnknownHandle(key(77)));
    assert!(!recon.registry().contains(key(2)));
}

#[test]
fn test_null_handles_are_skipped() {
    let mut recon = lenient();
    recon.add_handles(&[Handle::NULL], ObjectType::Buffer).unwrap();
    assert!(recon.registry().is_empty());

    create(&mut recon, 1, ObjectType::Buffer, None);
    recon
        .add_handle_dependency(&[Handle(1)], Handle::NULL, HandleState::Created, HandleState::Created)
        .unwrap();
    recon.remove_handles(&[Handle::NULL], true).unwrap();
    assert_eq!(recon.graph().edge_count(), 0);
}

#[test]
fn test_unused_call_info_is_dropped() {
    let mut recon = lenient();
    let call = recon.create_api_call_info();
    assert!(recon.trace().contains(call));
    recon.destroy_api_call_info_if_unused(call);
    assert!(!recon.trace().contains(call));

    recon.add_handles(&[Handle(1)], ObjectType::Buffer).unwrap();
    let err = recon.for_each_handle_add_api(&[Handle(1)], call, None).unwrap_err();
    assert_eq!(err, TrackerError::UnknownCall(call));
}

#[test]
fn test_action_node_replays_after_targets() {
    let mut recon = lenient();
    let set = create(&mut recon, 1, ObjectType::DescriptorSet, None);
    let sampler = create(&mut recon, 2, ObjectType::Sampler, None);

    let update = recon.create_api_call_info();
    let action = ActionId(update.0);
    let node = NodeKey::Action(action);
    recon.add_action(action).unwrap();
    recon.add_dependency(node, Handle(1), HandleState::Created, HandleState::Created).unwrap();
    recon.add_dependency(node, Handle(2), HandleState::Created, HandleState::Created).unwrap();
    recon.add_api(node, update, Some(HandleState::Created)).unwrap();
    recon.destroy_api_call_info_if_unused(update);

    let replay = recon.compute_replay_buffer();
    assert_eq!(replay.calls, vec![set, sampler, update]);
    // action nodes don't contribute handles
    assert_eq!(replay.handles, vec![Handle(1), Handle(2)]);

    // destroying the sampler takes the update with it
    recon.remove_handles(&[Handle(2)], true).unwrap();
    assert!(!recon.registry().contains(node));
    assert!(!recon.trace().contains(update));
}

#[test]
fn test_clear_resets_everything() {
    let mut recon = lenient();
    create(&mut recon, 1, ObjectType::Device, None);
    let before = create(&mut recon, 2, ObjectType::Buffer, Some(1));
    recon.clear();

    assert!(recon.registry().is_empty());
    assert!(recon.trace().is_empty());
    assert_eq!(recon.graph().edge_count(), 0);
    assert!(recon.compute_replay_buffer().is_empty());

    // sequence ids keep increasing
    let after = recon.create_api_call_info();
    assert!(after > before);
}

#[test]
#[should_panic(expected = "contract violation")]
fn test_panic_policy_aborts_on_missing_dependency() {
    let mut recon = Reconstruction::new(ViolationPolicy::Panic);
    recon.add_handles(&[Handle(1)], ObjectType::Buffer).unwrap();
    let _ = recon.add_handle_dependency(&[Handle(1)], Handle(2), HandleState::Created, HandleState::Created);
}
