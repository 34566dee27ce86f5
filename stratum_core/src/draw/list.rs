// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-target bookkeeping shared by the walker: clip changes of basis,
//! accumulation of drawable content into enclosing surfaces, retraction of
//! empty surfaces and restoration of tree order after out-of-order visits.

use alloc::vec::Vec;

use kurbo::{Rect, Vec2};

use crate::error::DrawPropertiesError;
use crate::geometry;
use crate::layer::{ChildIndices, INVALID, LayerStore};

/// A surface currently being filled, with the union of everything drawn into
/// it so far (in that surface's space).
#[derive(Clone, Copy, Debug)]
pub(crate) struct AccumulatedSurfaceState {
    pub(crate) render_target: u32,
    pub(crate) drawable_content_rect: Rect,
}

/// Which way a rect crosses the render targets between two layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    /// From the descendant's target space into the ancestor's.
    ToAncestor,
    /// From the ancestor's target space into the descendant's.
    ToDescendant,
}

/// Which per-child range [`sort_contributions`] restores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Contributions {
    /// Entries in the enclosing target's layer list.
    LayerList,
    /// Entries in the render-surface list.
    SurfaceList,
}

/// Sum of the surface translations between the render target of
/// `descendant` and that of `ancestor`, on behalf of the clip or scroll
/// child `layer`.
///
/// # Errors
///
/// Returns [`DrawPropertiesError::ClipRelationCrossesTransformedSurface`] if
/// a crossed surface is not a pure 2D translation.
///
/// # Panics
///
/// Panics if the descendant's target chain never reaches the ancestor's
/// target.
pub(crate) fn change_of_basis_translation(
    store: &LayerStore,
    layer: u32,
    ancestor: u32,
    descendant: u32,
) -> Result<Vec2, DrawPropertiesError> {
    let ancestor_target = store.draw[ancestor as usize].render_target;
    let mut target = store.draw[descendant as usize].render_target;
    let mut translation = Vec2::ZERO;
    while target != ancestor_target {
        assert!(
            target != INVALID,
            "render target chain of layer {descendant} does not reach the target of layer {ancestor}"
        );
        let t = &store.surface[target as usize].draw_transform;
        if !t.is_identity_or_translation() || t.get(2, 3) != 0.0 {
            return Err(DrawPropertiesError::ClipRelationCrossesTransformedSurface {
                layer,
                surface: target,
            });
        }
        translation += t.translation_2d();
        let parent = store.parent[target as usize];
        assert!(parent != INVALID, "render target chain passed the root");
        target = store.draw[parent as usize].render_target;
    }
    Ok(translation)
}

/// Moves `rect` between the target spaces of `ancestor` and `descendant`,
/// rounding outward.
pub(crate) fn translate_rect_to_target_space(
    store: &LayerStore,
    layer: u32,
    ancestor: u32,
    descendant: u32,
    rect: Rect,
    direction: Direction,
) -> Result<Rect, DrawPropertiesError> {
    let mut translation = change_of_basis_translation(store, layer, ancestor, descendant)?;
    if direction == Direction::ToDescendant {
        translation = -translation;
    }
    Ok(geometry::enclosing(rect + translation))
}

/// Whether `idx` got past pruning in the current pass and so carries clip,
/// target and scroll state.
pub(crate) fn was_reached(store: &LayerStore, idx: u32, generation: u64) -> bool {
    let i = idx as usize;
    store.visited[i] == generation && store.draw[i].render_target != INVALID
}

/// Replaces the inherited clip with the cached clip of the layer's scroll
/// parent (preferred) or clip parent, expressed in the space of the layer's
/// parent's target.
///
/// A source pruned earlier in the pass leaves the inherited clip alone.
pub(crate) fn apply_clip_override(
    store: &LayerStore,
    idx: u32,
    generation: u64,
    clip_rect: &mut Rect,
    clips_subtree: &mut bool,
) -> Result<(), DrawPropertiesError> {
    let i = idx as usize;
    let parent = store.parent[i];
    let scroll_parent = store.scroll_parent[i];
    let source = if scroll_parent != INVALID {
        scroll_parent
    } else {
        store.clip_parent[i]
    };
    if source == INVALID || source == parent || parent == INVALID {
        return Ok(());
    }
    if !was_reached(store, source, generation) {
        return Ok(());
    }

    let cached = &store.draw[source as usize];
    let rect = if source == store.clip_parent[i] {
        translate_rect_to_target_space(
            store,
            idx,
            source,
            parent,
            cached.clip_rect,
            Direction::ToDescendant,
        )?
    } else {
        // Scroll parents share the layer's parent as common ancestor.
        translate_rect_to_target_space(
            store,
            idx,
            parent,
            source,
            cached.clip_rect,
            Direction::ToAncestor,
        )?
    };
    *clips_subtree = cached.is_clipped;
    *clip_rect = rect;
    Ok(())
}

/// Adds a finished layer's drawable content to every surface between it and
/// the target it accumulates into (its clip parent's target if it has one,
/// its parent's otherwise).
///
/// # Errors
///
/// Fails if the clip parent's clip must cross a transformed surface.
pub(crate) fn update_accumulated_surface_state(
    store: &LayerStore,
    stack: &mut [AccumulatedSurfaceState],
    idx: u32,
    drawable_content_rect: Rect,
) -> Result<(), DrawPropertiesError> {
    let i = idx as usize;
    let parent = store.parent[i];
    if parent == INVALID {
        return Ok(());
    }
    let clip_parent = store.clip_parent[i];
    let render_target = if clip_parent != INVALID {
        store.draw[clip_parent as usize].render_target
    } else {
        store.draw[parent as usize].render_target
    };

    // A surface owner contributes its surface's footprint in the target.
    let mut target_rect = if store.draw[i].has_render_surface {
        geometry::enclosed(store.surface[i].drawable_content_rect())
    } else {
        drawable_content_rect
    };

    let target_props = &store.draw[render_target as usize];
    if target_props.is_clipped {
        let mut clip = target_props.clip_rect;
        if clip_parent != INVALID {
            clip = translate_rect_to_target_space(
                store,
                idx,
                clip_parent,
                parent,
                clip,
                Direction::ToDescendant,
            )?;
        }
        target_rect = geometry::intersect(target_rect, clip);
    }

    assert!(!stack.is_empty(), "surface stack is empty");
    let mut found = false;
    for state in stack.iter_mut().rev() {
        state.drawable_content_rect = geometry::union(state.drawable_content_rect, target_rect);
        if state.render_target == render_target {
            found = true;
            break;
        }
        let t = &store.surface[state.render_target as usize].draw_transform;
        target_rect = geometry::enclosing(geometry::map_clipped_rect(t, target_rect));
    }
    debug_assert!(
        found,
        "target of layer {idx} is not on the surface stack"
    );
    Ok(())
}

/// Retracts the surface owned by `idx` from the render-surface list, along
/// with every surface appended after it, and clears their layer lists.
pub(crate) fn remove_surface_for_early_exit(store: &mut LayerStore, list: &mut Vec<u32>, idx: u32) {
    assert!(
        list.contains(&idx),
        "surface of layer {idx} is not in the render-surface list"
    );
    while let Some(last) = list.pop() {
        store.surface[last as usize].layer_list.clear();
        if last == idx {
            break;
        }
    }
}

/// Restores tree order among the contributions of `parent`'s children from
/// `start` on, after the children were visited in scroll-parent order.
pub(crate) fn sort_contributions(
    store: &LayerStore,
    parent: u32,
    list: &mut Vec<u32>,
    start: usize,
    kind: Contributions,
) {
    if start == list.len() {
        return;
    }
    let mut buffer = Vec::with_capacity(list.len() - start);
    for child in ChildIndices::new(store, parent) {
        let d = &store.draw[child as usize];
        let (first, count) = match kind {
            Contributions::LayerList => (d.first_layer_list_addition, d.num_layer_list_additions),
            Contributions::SurfaceList => {
                (d.first_surface_list_addition, d.num_surface_list_additions)
            }
        };
        buffer.extend_from_slice(&list[first..first + count]);
    }
    debug_assert_eq!(
        buffer.len(),
        list.len() - start,
        "children of layer {parent} do not account for every contribution"
    );
    list.truncate(start);
    list.extend(buffer);
}
