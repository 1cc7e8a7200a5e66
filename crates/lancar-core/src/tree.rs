//! Pure walks over the chart-of-accounts tree. Every function builds new
//! vectors and leaves its input untouched; ordering is always the
//! directory's code order.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::StructureViolation;
use crate::models::AccountNode;

/// Prune the tree to the nodes matching `query` (case-insensitive substring
/// of code or name) plus every ancestor of a match. A matching node keeps
/// only its matching descendants. An empty or whitespace query returns the
/// tree as-is without a filter pass.
pub fn filter_tree(roots: &[AccountNode], query: &str) -> Vec<AccountNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return roots.to_vec();
    }

    roots
        .iter()
        .filter_map(|root| filter_node(root, &needle))
        .collect()
}

// Children are decided first: a node stays if it matches or if anything
// below it survived.
fn filter_node(node: &AccountNode, needle: &str) -> Option<AccountNode> {
    let children: Vec<AccountNode> = node
        .children
        .iter()
        .filter_map(|child| filter_node(child, needle))
        .collect();

    if node.matches(needle) || !children.is_empty() {
        let mut kept = node.clone();
        kept.children = children;
        Some(kept)
    } else {
        None
    }
}

/// Pre-order flatten: each node immediately followed by its own subtree,
/// siblings in order, no interleaving.
pub fn flatten_tree(roots: &[AccountNode]) -> Vec<&AccountNode> {
    let mut out = Vec::with_capacity(node_count(roots));
    for root in roots {
        push_subtree(root, &mut out);
    }
    out
}

fn push_subtree<'a>(node: &'a AccountNode, out: &mut Vec<&'a AccountNode>) {
    out.push(node);
    for child in &node.children {
        push_subtree(child, out);
    }
}

/// Pre-order flatten carrying nesting depth, for indented pickers.
pub fn flatten_with_depth(roots: &[AccountNode]) -> Vec<(usize, &AccountNode)> {
    let mut out = Vec::with_capacity(node_count(roots));
    for root in roots {
        push_subtree_depth(root, 0, &mut out);
    }
    out
}

fn push_subtree_depth<'a>(
    node: &'a AccountNode,
    depth: usize,
    out: &mut Vec<(usize, &'a AccountNode)>,
) {
    out.push((depth, node));
    for child in &node.children {
        push_subtree_depth(child, depth + 1, out);
    }
}

pub fn node_count(roots: &[AccountNode]) -> usize {
    roots
        .iter()
        .map(|node| 1 + node_count(&node.children))
        .sum()
}

pub fn find_node(roots: &[AccountNode], id: Uuid) -> Option<&AccountNode> {
    for node in roots {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_node(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Ids of `node` and everything below it, pre-order.
pub fn subtree_ids(node: &AccountNode) -> Vec<Uuid> {
    let mut ids = vec![node.id];
    for child in &node.children {
        ids.extend(subtree_ids(child));
    }
    ids
}

/// Header accounts eligible as a parent, pre-order. When `exclude` names a
/// node, that node and its entire subtree are skipped: an account can never
/// be offered as its own parent, directly or through a descendant.
pub fn parent_candidates(roots: &[AccountNode], exclude: Option<Uuid>) -> Vec<&AccountNode> {
    let mut out = Vec::new();
    collect_headers(roots, exclude, &mut out);
    out
}

fn collect_headers<'a>(
    nodes: &'a [AccountNode],
    exclude: Option<Uuid>,
    out: &mut Vec<&'a AccountNode>,
) {
    for node in nodes {
        if exclude == Some(node.id) {
            continue;
        }
        if node.is_header {
            out.push(node);
        }
        collect_headers(&node.children, exclude, out);
    }
}

/// Check the invariants the directory guarantees for a fetched tree:
/// unique codes, headers-only parents, parent back-references, and
/// sub-accounts sharing their header's type.
pub fn verify_structure(roots: &[AccountNode]) -> Result<(), StructureViolation> {
    let mut codes = HashSet::new();
    for root in roots {
        verify_node(root, &mut codes)?;
    }
    Ok(())
}

fn verify_node<'a>(
    node: &'a AccountNode,
    codes: &mut HashSet<&'a str>,
) -> Result<(), StructureViolation> {
    if !codes.insert(node.code.as_str()) {
        return Err(StructureViolation::DuplicateCode {
            code: node.code.clone(),
        });
    }
    if !node.is_header && !node.children.is_empty() {
        return Err(StructureViolation::LeafWithChildren {
            code: node.code.clone(),
        });
    }
    for child in &node.children {
        if child.parent_id != Some(node.id) {
            return Err(StructureViolation::ParentMismatch {
                code: child.code.clone(),
            });
        }
        if child.account_type != node.account_type {
            return Err(StructureViolation::TypeMismatch {
                code: child.code.clone(),
            });
        }
        verify_node(child, codes)?;
    }
    Ok(())
}
