// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render-surface decision and the per-layer predicates the walker shares
//! with it.

use crate::layer::{BlendMode, INVALID, LayerStore};

/// Why a layer owns a render surface.
///
/// Variants are listed in the order [`surface_reason`] checks them; the
/// first one that applies is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceReason {
    /// The layer has a mask layer.
    Mask,
    /// The layer has a replica layer.
    Replica,
    /// The layer has filters or background filters.
    Filters,
    /// A filter animation has not produced its first value.
    FilterAnimationPending,
    /// The layer flattens a 3D rendering context it is part of, and
    /// something below it draws.
    FlattensExisting3dContext,
    /// The layer blends with something other than source-over.
    BlendMode,
    /// The layer clips drawing descendants while not axis aligned with its
    /// parent.
    NonAxisAlignedClip,
    /// The layer is translucent, flattens, and two or more layers in its
    /// subtree draw.
    GroupOpacity,
    /// The pass root.
    Root,
    /// The layer isolates blending below it.
    IsolatedGroup,
    /// The layer asked for a surface.
    Forced,
    /// The layer has a pending copy request.
    CopyRequest,
}

/// Decides whether `idx` needs its own render surface.
///
/// `axis_aligned` is whether the layer's transform into its parent's target
/// keeps rectangles axis aligned. Depends on the pre-pass count of
/// descendants that draw content.
pub(crate) fn surface_reason(
    store: &LayerStore,
    idx: u32,
    is_root: bool,
    axis_aligned: bool,
) -> Option<SurfaceReason> {
    let i = idx as usize;
    let flags = store.flags[i];
    let drawing_descendants = store.draw[i].num_descendants_that_draw_content;

    if store.mask_layer[i] != INVALID {
        return Some(SurfaceReason::Mask);
    }
    if store.replica_layer[i] != INVALID {
        return Some(SurfaceReason::Replica);
    }
    if !store.filters[i].is_empty() || !store.background_filters[i].is_empty() {
        return Some(SurfaceReason::Filters);
    }
    if store.animation[i].filter_animation_pending {
        return Some(SurfaceReason::FilterAnimationPending);
    }
    if in_existing_3d_context(store, idx)
        && flags.should_flatten_transform
        && drawing_descendants > 0
    {
        return Some(SurfaceReason::FlattensExisting3dContext);
    }
    if store.blend_mode[i] != BlendMode::SourceOver {
        return Some(SurfaceReason::BlendMode);
    }
    let clips_external_content = clips_subtree(store, idx) || flags.has_delegated_content;
    if clips_external_content && !axis_aligned && drawing_descendants > 0 {
        return Some(SurfaceReason::NonAxisAlignedClip);
    }
    let at_least_two_draw =
        drawing_descendants > 0 && (flags.draws_content || drawing_descendants > 1);
    if store.opacity[i] != 1.0 && flags.should_flatten_transform && at_least_two_draw {
        return Some(SurfaceReason::GroupOpacity);
    }
    if is_root {
        return Some(SurfaceReason::Root);
    }
    if flags.is_root_for_isolated_group {
        return Some(SurfaceReason::IsolatedGroup);
    }
    if flags.force_render_surface {
        return Some(SurfaceReason::Forced);
    }
    if store.copy_requests[i] > 0 {
        return Some(SurfaceReason::CopyRequest);
    }
    None
}

/// The layer clips its subtree to its bounds.
pub(crate) fn clips_subtree(store: &LayerStore, idx: u32) -> bool {
    store.flags[idx as usize].masks_to_bounds || store.mask_layer[idx as usize] != INVALID
}

/// The layer is 3D sorted together with its parent.
pub(crate) fn in_existing_3d_context(store: &LayerStore, idx: u32) -> bool {
    let context = store.sorting_context_id[idx as usize];
    let parent = store.parent[idx as usize];
    context != 0 && parent != INVALID && store.sorting_context_id[parent as usize] == context
}

/// The layer starts a 3D rendering context.
fn is_new_3d_context_root(store: &LayerStore, idx: u32) -> bool {
    let sorted = store.sorting_context_id[idx as usize] != 0;
    let parent = store.parent[idx as usize];
    if parent == INVALID {
        sorted
    } else {
        sorted && store.sorting_context_id[parent as usize] == 0
    }
}

/// Whether the back of a surface with the given draw transform faces the
/// viewer.
pub(crate) fn is_surface_back_face_visible(
    store: &LayerStore,
    idx: u32,
    draw_transform_back_face_visible: bool,
) -> bool {
    if in_existing_3d_context(store, idx) {
        draw_transform_back_face_visible
    } else if is_new_3d_context_root(store, idx) {
        store.local_transform[idx as usize].is_back_face_visible()
    } else {
        false
    }
}

/// Whether the back of the layer faces the viewer. Uses the draw transform
/// computed earlier in this pass when the layer shares its parent's 3D
/// context.
pub(crate) fn is_layer_back_face_visible(store: &LayerStore, idx: u32) -> bool {
    if in_existing_3d_context(store, idx) {
        store.draw[idx as usize]
            .target_space_transform
            .is_back_face_visible()
    } else {
        store.local_transform[idx as usize].is_back_face_visible()
    }
}

/// Whether the layer is left out of its target's layer list. Its subtree is
/// still walked.
pub(crate) fn layer_should_be_skipped(store: &LayerStore, idx: u32, layer_is_drawn: bool) -> bool {
    let i = idx as usize;
    if !layer_is_drawn {
        return true;
    }
    let bounds = store.bounds[i];
    if !store.flags[i].draws_content || bounds.width <= 0.0 || bounds.height <= 0.0 {
        return true;
    }
    let mut test = idx;
    if store.flags[i].use_parent_backface_visibility && store.parent[i] != INVALID {
        test = store.parent[i];
    }
    !store.flags[test as usize].double_sided && is_layer_back_face_visible(store, test)
}
