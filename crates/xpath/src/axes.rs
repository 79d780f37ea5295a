//! Contains pure functions for collecting nodes along each XPath axis.
//!
//! Forward axes yield nodes in document order, reverse axes in reverse document order,
//! which is the order predicates number them in.

use crate::ast::Axis;
use crate::datasource::{DataSourceNode, NodeType};

/// Collects the nodes on `axis` relative to a single context node.
pub fn collect<'a, N: DataSourceNode<'a>>(axis: Axis, node: N) -> Vec<N> {
    let mut results = Vec::new();
    match axis {
        Axis::SelfAxis => results.push(node),
        Axis::Child => results.extend(node.children()),
        Axis::Attribute => results.extend(node.attributes()),
        Axis::Descendant => collect_descendants(node, &mut results),
        Axis::DescendantOrSelf => {
            results.push(node);
            collect_descendants(node, &mut results);
        }
        Axis::Parent => results.extend(node.parent()),
        Axis::Ancestor => collect_ancestors(node, &mut results),
        Axis::AncestorOrSelf => {
            results.push(node);
            collect_ancestors(node, &mut results);
        }
        Axis::FollowingSibling => collect_following_siblings(node, &mut results),
        Axis::PrecedingSibling => collect_preceding_siblings(node, &mut results),
        Axis::Following => collect_following(node, &mut results),
        Axis::Preceding => collect_preceding(node, &mut results),
    }
    results
}

fn collect_descendants<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    for child in node.children() {
        results.push(child);
        collect_descendants(child, results);
    }
}

fn collect_ancestors<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let mut current = node.parent();
    while let Some(p) = current {
        results.push(p);
        current = p.parent();
    }
}

fn is_attribute<'a, N: DataSourceNode<'a>>(node: N) -> bool {
    node.node_type() == NodeType::Attribute
}

fn collect_following_siblings<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if is_attribute(node) {
        return;
    }
    if let Some(parent) = node.parent() {
        results.extend(parent.children().skip_while(|s| *s != node).skip(1));
    }
}

fn collect_preceding_siblings<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    if is_attribute(node) {
        return;
    }
    if let Some(parent) = node.parent() {
        let mut siblings: Vec<N> = parent.children().take_while(|s| *s != node).collect();
        siblings.reverse();
        results.extend(siblings);
    }
}

fn collect_following<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    // The following axis of an attribute starts after its owner element's start tag.
    let mut current = if is_attribute(node) {
        if let Some(owner) = node.parent() {
            collect_descendants(owner, results);
        }
        node.parent()
    } else {
        Some(node)
    };
    while let Some(c) = current {
        let parent = c.parent();
        if let Some(p) = parent {
            for sibling in p.children().skip_while(|s| *s != c).skip(1) {
                results.push(sibling);
                collect_descendants(sibling, results);
            }
        }
        current = parent;
    }
}

fn collect_preceding<'a, N: DataSourceNode<'a>>(node: N, results: &mut Vec<N>) {
    let mut forward = Vec::new();
    let mut current = if is_attribute(node) { node.parent() } else { Some(node) };
    while let Some(c) = current {
        let parent = c.parent();
        if let Some(p) = parent {
            let mut chunk = Vec::new();
            for sibling in p.children().take_while(|s| *s != c) {
                chunk.push(sibling);
                collect_descendants(sibling, &mut chunk);
            }
            chunk.extend(forward);
            forward = chunk;
        }
        current = parent;
    }
    forward.reverse();
    results.extend(forward);
}
