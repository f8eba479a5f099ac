//! Tests for the dependency graph

#![cfg(test)]

use super::DependencyGraph;
use crate::handle::{Handle, HandleState, NodeKey, NodeRef};

fn created(raw: u64) -> NodeRef {
    NodeRef::object(Handle(raw), HandleState::Created)
}

fn bound(raw: u64) -> NodeRef {
    NodeRef::object(Handle(raw), HandleState::BoundMemory)
}

fn key(raw: u64) -> NodeKey {
    NodeKey::Object(Handle(raw))
}

#[test]
fn test_edge_insertion_is_idempotent() {
    let mut graph = DependencyGraph::new();
    assert!(graph.add_edge(created(2), created(1)));
    assert!(!graph.add_edge(created(2), created(1)));
    assert_eq!(graph.edge_count(), 1);
    assert_eq!(graph.parents(created(2)), &[created(1)]);
    assert_eq!(graph.children(created(1)).count(), 1);
}

#[test]
fn test_fan_in_and_fan_out() {
    let mut graph = DependencyGraph::new();
    graph.add_edge(created(3), created(1));
    graph.add_edge(created(3), created(2));
    graph.add_edge(created(4), created(1));

    assert_eq!(graph.dependency_keys(key(3)), vec![key(1), key(2)]);
    assert_eq!(graph.dependent_keys(key(1)), vec![key(3), key(4)]);
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_self_state_edges_are_not_dependents() {
    let mut graph = DependencyGraph::new();
    // bound image depends on its own created node and on memory
    graph.add_edge(bound(5), created(5));
    graph.add_edge(bound(5), created(6));

    assert!(!graph.has_dependents(key(5)));
    assert!(graph.has_dependents(key(6)));
    assert_eq!(graph.dependency_keys(key(5)), vec![key(6)]);
}

#[test]
fn test_transitive_dependents() {
    let mut graph = DependencyGraph::new();
    graph.add_edge(created(2), created(1));
    graph.add_edge(created(3), created(2));
    graph.add_edge(created(4), bound(3));
    graph.add_edge(created(9), created(8));

    let mut found = graph.transitive_dependents(&[key(1)]);
    found.sort();
    assert_eq!(found, vec![key(2), key(3), key(4)]);
}

#[test]
fn test_remove_key_drops_incident_edges() {
    let mut graph = DependencyGraph::new();
    graph.add_edge(created(2), created(1));
    graph.add_edge(created(3), created(2));
    graph.add_edge(bound(2), created(2));

    graph.remove_key(key(2));
    assert_eq!(graph.edge_count(), 0);
    assert!(graph.parents(created(3)).is_empty());
    assert_eq!(graph.children(created(1)).count(), 0);
    assert!(graph.edges().is_empty());
}

#[test]
fn test_cycle_detection() {
    let mut graph = DependencyGraph::new();
    graph.add_edge(created(2), created(1));
    graph.add_edge(created(3), created(2));
    assert!(graph.is_acyclic());

    graph.add_edge(created(1), created(3));
    assert!(!graph.is_acyclic());
}

#[test]
fn test_rekey_moves_every_edge() {
    let mut graph = DependencyGraph::new();
    graph.add_edge(created(2), created(1));
    graph.add_edge(bound(2), created(2));
    graph.add_edge(created(3), bound(2));

    let retired = NodeKey::Retired(Handle(2), 1);
    graph.rekey(key(2), retired);

    assert_eq!(graph.edge_count(), 3);
    assert!(graph.dependent_keys(key(2)).is_empty());
    assert_eq!(graph.dependent_keys(retired), vec![key(3)]);
    assert_eq!(graph.dependency_keys(retired), vec![key(1)]);
    assert!(graph.has_edge(
        NodeRef::new(retired, HandleState::BoundMemory),
        NodeRef::new(retired, HandleState::Created),
    ));
    assert!(graph.has_edge(created(3), NodeRef::new(retired, HandleState::BoundMemory)));
}
