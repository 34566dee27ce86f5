// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subtree aggregates and relation checks computed before the main walk.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::DrawPropertiesError;
use crate::geometry;
use crate::layer::{ChildIndices, INVALID, LayerStore};

enum Frame {
    Enter { idx: u32, depth: u32 },
    Exit { idx: u32 },
}

/// Runs the pre-pass over the subtree of `root`.
///
/// Fills the aggregate fields of [`DrawProperties`](super::DrawProperties),
/// records tree depth and computes scroll-parent-first child orders into the
/// store's sorted-children buffer. Subtrees below a non-invertible,
/// non-animated transform are not descended into and contribute nothing.
///
/// Relation checks run for every layer reached, so that malformed clip and
/// scroll parents are reported before the walk writes any output.
pub(crate) fn run(
    store: &mut LayerStore,
    root: u32,
    max_depth: usize,
) -> Result<(), DrawPropertiesError> {
    store.sorted_children.clear();
    let mut stack = vec![Frame::Enter { idx: root, depth: 0 }];
    let mut chain = Vec::new();

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter { idx, depth } => {
                if depth as usize > max_depth {
                    return Err(DrawPropertiesError::TreeTooDeep { limit: max_depth });
                }
                check_relations(store, idx)?;
                let i = idx as usize;
                store.draw[i].depth = depth;

                let transform = &store.local_transform[i];
                if !transform.is_invertible() && !store.animation[i].transform_is_animating {
                    store.draw[i].singular_subtree = true;
                    continue;
                }

                stack.push(Frame::Exit { idx });
                let mark = stack.len();
                for child in ChildIndices::new(store, idx) {
                    stack.push(Frame::Enter {
                        idx: child,
                        depth: depth + 1,
                    });
                }
                // Children pop in tree order.
                stack[mark..].reverse();
            }
            Frame::Exit { idx } => {
                aggregate(store, idx);
                if store.draw[idx as usize].has_child_with_a_scroll_parent {
                    sort_children(store, idx, &mut chain)?;
                }
            }
        }
    }
    Ok(())
}

/// Clip parents must be proper ancestors. Scroll parents must sit strictly
/// below the layer's parent and outside the layer's own subtree.
fn check_relations(store: &LayerStore, idx: u32) -> Result<(), DrawPropertiesError> {
    let i = idx as usize;
    let parent = store.parent[i];

    let clip_parent = store.clip_parent[i];
    if clip_parent != INVALID
        && (parent == INVALID || !store.has_ancestor_or_self(parent, clip_parent))
    {
        return Err(DrawPropertiesError::ClipParentNotAncestor { layer: idx });
    }

    let scroll_parent = store.scroll_parent[i];
    if scroll_parent != INVALID {
        if store.has_ancestor_or_self(scroll_parent, idx) {
            return Err(DrawPropertiesError::ScrollParentCycle { layer: idx });
        }
        if parent == INVALID
            || scroll_parent == parent
            || !store.has_ancestor_or_self(scroll_parent, parent)
        {
            return Err(DrawPropertiesError::ScrollParentNotInParentSubtree { layer: idx });
        }
    }
    Ok(())
}

fn aggregate(store: &mut LayerStore, idx: u32) {
    let i = idx as usize;

    let mut unclipped: u32 = 0;
    if store.clip_parent[i] != INVALID {
        unclipped += 1;
        store.draw[i].counted_as_unclipped = true;
    }
    let mut has_copy_request = store.copy_requests[i] > 0;
    let mut has_input_handler =
        !geometry::is_empty(store.touch_region[i]) || store.flags[i].has_wheel_handlers;
    let mut drawing_descendants = 0;
    let mut has_scroll_child = false;

    for child in ChildIndices::new(store, idx) {
        let c = child as usize;
        has_scroll_child |= store.scroll_parent[c] != INVALID;
        let data = &store.draw[c];
        if data.singular_subtree {
            continue;
        }
        unclipped += data.num_unclipped_descendants;
        has_copy_request |= data.layer_or_descendant_has_copy_request;
        has_input_handler |= data.layer_or_descendant_has_input_handler;
        drawing_descendants +=
            data.num_descendants_that_draw_content + u32::from(store.flags[c].draws_content);
    }

    // Clip children below this layer stop being unclipped here.
    let counted_clip_children = store.clip_children[i]
        .iter()
        .filter(|&&c| store.draw[c as usize].counted_as_unclipped)
        .count();
    let counted_clip_children = u32::try_from(counted_clip_children).unwrap_or(u32::MAX);
    debug_assert!(
        unclipped >= counted_clip_children,
        "clip children of layer {idx} were not counted below it"
    );

    let data = &mut store.draw[i];
    data.num_unclipped_descendants = unclipped.saturating_sub(counted_clip_children);
    data.layer_or_descendant_has_copy_request = has_copy_request;
    data.layer_or_descendant_has_input_handler = has_input_handler;
    data.num_descendants_that_draw_content = drawing_descendants;
    data.has_child_with_a_scroll_parent = has_scroll_child;
}

/// Orders the children of `parent` so that every child containing a scroll
/// parent comes before the child naming it, keeping tree order otherwise.
fn sort_children(
    store: &mut LayerStore,
    parent: u32,
    chain: &mut Vec<u32>,
) -> Result<(), DrawPropertiesError> {
    let generation = store.pass_generation;
    let start = store.sorted_children.len();
    let mut order_changed = false;

    let mut child = store.first_child[parent as usize];
    while child != INVALID {
        if store.sorted_for_recursion[child as usize] == generation {
            order_changed = true;
        } else {
            // Walk the scroll-parent chain until a sorted child or a child
            // without a scroll parent, then emit the chain back to front.
            chain.clear();
            let mut current = child;
            loop {
                if store.sorted_for_recursion[current as usize] == generation {
                    break;
                }
                if chain.contains(&current) {
                    return Err(DrawPropertiesError::ScrollParentCycle { layer: current });
                }
                chain.push(current);
                let scroll_parent = store.scroll_parent[current as usize];
                if scroll_parent == INVALID {
                    break;
                }
                current = child_containing(store, parent, scroll_parent);
            }
            for &sorted in chain.iter().rev() {
                store.sorted_for_recursion[sorted as usize] = generation;
                store.sorted_children.push(sorted);
            }
        }
        child = store.next_sibling[child as usize];
    }

    let end = store.sorted_children.len();
    let data = &mut store.draw[parent as usize];
    data.sorted_children = (
        u32::try_from(start).unwrap_or(u32::MAX),
        u32::try_from(end).unwrap_or(u32::MAX),
    );
    data.child_order_changed = order_changed;
    Ok(())
}

/// The child of `parent` whose subtree holds `layer`.
fn child_containing(store: &LayerStore, parent: u32, mut layer: u32) -> u32 {
    while store.parent[layer as usize] != parent {
        layer = store.parent[layer as usize];
        debug_assert!(layer != INVALID, "layer is not below the parent");
    }
    layer
}

#[cfg(test)]
mod tests {
    use kurbo::{Rect, Size};

    use super::*;
    use crate::layer::{LayerFlags, LayerId};
    use crate::transform::Transform3d;

    fn prepare(store: &mut LayerStore, root: LayerId) -> Result<(), DrawPropertiesError> {
        store.pass_generation += 1;
        for d in &mut store.draw {
            d.reset();
        }
        run(store, root.index(), 256)
    }

    fn drawing(store: &mut LayerStore, parent: LayerId) -> LayerId {
        let id = store.create_layer();
        store.add_child(parent, id);
        store.set_bounds(id, Size::new(10.0, 10.0));
        store.set_flags(
            id,
            LayerFlags {
                draws_content: true,
                ..LayerFlags::default()
            },
        );
        id
    }

    #[test]
    fn counts_drawing_descendants() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = drawing(&mut store, root);
        let _b = drawing(&mut store, a);
        let _c = drawing(&mut store, root);
        prepare(&mut store, root).unwrap();
        assert_eq!(store.draw[root.index() as usize].num_descendants_that_draw_content, 3);
        assert_eq!(store.draw[a.index() as usize].num_descendants_that_draw_content, 1);
        assert_eq!(store.draw[a.index() as usize].depth, 1);
    }

    #[test]
    fn singular_subtree_contributes_nothing() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let singular = drawing(&mut store, root);
        let below = drawing(&mut store, singular);
        store.set_transform(singular, Transform3d::from_scale(0.0, 1.0, 1.0));
        store.request_copy(below);
        prepare(&mut store, root).unwrap();
        assert!(store.draw[singular.index() as usize].singular_subtree);
        let root_data = &store.draw[root.index() as usize];
        assert_eq!(root_data.num_descendants_that_draw_content, 0);
        assert!(!root_data.layer_or_descendant_has_copy_request);
    }

    #[test]
    fn unclipped_descendants_stop_at_clip_parent() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let clip_parent = store.create_layer();
        let middle = store.create_layer();
        let clip_child = store.create_layer();
        store.add_child(root, clip_parent);
        store.add_child(clip_parent, middle);
        store.add_child(middle, clip_child);
        store.set_clip_parent(clip_child, Some(clip_parent));
        prepare(&mut store, root).unwrap();

        assert_eq!(store.draw[middle.index() as usize].num_unclipped_descendants, 1);
        assert_eq!(
            store.draw[clip_parent.index() as usize].num_unclipped_descendants,
            0
        );
        assert_eq!(store.draw[root.index() as usize].num_unclipped_descendants, 0);
    }

    #[test]
    fn input_handlers_and_copy_requests_propagate() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(root, a);
        store.add_child(a, b);
        store.set_touch_region(b, Rect::new(0.0, 0.0, 5.0, 5.0));
        store.request_copy(a);
        prepare(&mut store, root).unwrap();
        assert!(store.draw[root.index() as usize].layer_or_descendant_has_input_handler);
        assert!(store.draw[root.index() as usize].layer_or_descendant_has_copy_request);
        assert!(!store.draw[b.index() as usize].layer_or_descendant_has_copy_request);
    }

    #[test]
    fn scroll_parent_is_ordered_first() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let scroll_child = store.create_layer();
        let sibling = store.create_layer();
        let scroller = store.create_layer();
        store.add_child(root, scroll_child);
        store.add_child(root, sibling);
        store.add_child(sibling, scroller);
        store.set_scroll_parent(scroll_child, Some(scroller));
        prepare(&mut store, root).unwrap();

        let data = &store.draw[root.index() as usize];
        assert!(data.has_child_with_a_scroll_parent);
        assert!(data.child_order_changed);
        let (start, end) = data.sorted_children;
        assert_eq!(
            &store.sorted_children[start as usize..end as usize],
            &[sibling.index(), scroll_child.index()]
        );
    }

    #[test]
    fn scroll_parent_cycle_between_siblings() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        let a_inner = store.create_layer();
        let b_inner = store.create_layer();
        store.add_child(root, a);
        store.add_child(root, b);
        store.add_child(a, a_inner);
        store.add_child(b, b_inner);
        store.set_scroll_parent(a, Some(b_inner));
        store.set_scroll_parent(b, Some(a_inner));
        assert!(matches!(
            prepare(&mut store, root),
            Err(DrawPropertiesError::ScrollParentCycle { .. })
        ));
    }

    #[test]
    fn rejects_bad_relations_and_depth() {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        let a = store.create_layer();
        let b = store.create_layer();
        store.add_child(root, a);
        store.add_child(root, b);
        store.set_clip_parent(a, Some(b));
        assert_eq!(
            prepare(&mut store, root),
            Err(DrawPropertiesError::ClipParentNotAncestor { layer: a.index() })
        );
        store.set_clip_parent(a, None);

        store.set_scroll_parent(a, Some(root));
        assert_eq!(
            prepare(&mut store, root),
            Err(DrawPropertiesError::ScrollParentNotInParentSubtree { layer: a.index() })
        );
        store.set_scroll_parent(a, None);

        store.pass_generation += 1;
        assert_eq!(
            run(&mut store, root.index(), 0),
            Err(DrawPropertiesError::TreeTooDeep { limit: 0 })
        );
    }
}
