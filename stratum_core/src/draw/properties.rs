// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer outputs of a draw-property pass.

use alloc::vec::Vec;

use kurbo::{Rect, Vec2};

use crate::geometry;
use crate::layer::{BlendMode, INVALID};
use crate::transform::Transform3d;

/// Everything the compositor needs to draw one layer.
///
/// Written only by [`calculate_draw_properties`]; every field is reset at the
/// start of a pass. Coordinate spaces: `visible_layer_rect` is in layer
/// space, `clip_rect` and `drawable_content_rect` are in the space of the
/// layer's render target.
///
/// [`calculate_draw_properties`]: crate::layer::LayerStore::calculate_draw_properties
#[derive(Clone, Debug)]
pub struct DrawProperties {
    /// Layer space to render-target space.
    pub target_space_transform: Transform3d,
    /// Layer space to screen space.
    pub screen_space_transform: Transform3d,
    /// `target_space_transform` depends on a running animation.
    pub target_space_transform_is_animating: bool,
    /// `screen_space_transform` depends on a running animation.
    pub screen_space_transform_is_animating: bool,
    /// Opacity to draw the layer's own content with.
    ///
    /// For a layer that owns a render surface this is `1.0`; its opacity
    /// moves to [`RenderSurface::draw_opacity`].
    pub opacity: f32,
    /// `opacity` depends on a running animation up to the render target.
    pub opacity_is_animating: bool,
    /// Opacity up to the screen depends on a running animation.
    pub screen_space_opacity_is_animating: bool,
    /// Blend mode used when drawing the layer's content.
    pub blend_mode: BlendMode,
    /// Text may be rendered with subpixel antialiasing.
    pub can_use_lcd_text: bool,
    /// `clip_rect` applies when drawing.
    pub is_clipped: bool,
    /// Clip in render-target space.
    pub clip_rect: Rect,
    /// Part of the layer's bounds that can be seen, in layer space.
    pub visible_layer_rect: Rect,
    /// The layer's bounds in render-target space, clipped if `is_clipped`.
    pub drawable_content_rect: Rect,
    /// The layer owns a render surface this pass.
    pub has_render_surface: bool,
    /// Slot index of the layer owning the render surface this layer draws
    /// into, or [`INVALID`] if the layer was not reached.
    pub render_target: u32,
    /// Largest scale a running animation may reach, `0.0` if unknown.
    pub maximum_animation_contents_scale: f32,
    /// Scale at the start of a running animation, `0.0` if unknown.
    pub starting_animation_contents_scale: f32,
    /// The layer is visible or must be drawn for a copy request.
    pub is_drawn: bool,
    /// The layer or something in its subtree ended up drawn.
    pub layer_or_descendant_is_drawn: bool,
    /// The layer is 3D sorted together with its parent.
    pub in_existing_3d_context: bool,
    /// Depth below the pass root.
    pub depth: u32,

    // -- Pre-pass aggregates --
    /// Clip children in this subtree whose clip parent lies above it.
    pub num_unclipped_descendants: u32,
    /// The layer or a descendant has a pending copy request.
    pub layer_or_descendant_has_copy_request: bool,
    /// The layer or a descendant handles touch or wheel input.
    pub layer_or_descendant_has_input_handler: bool,
    /// Number of descendants that draw content.
    pub num_descendants_that_draw_content: u32,
    /// Some child names a scroll parent.
    pub has_child_with_a_scroll_parent: bool,

    // -- Pass bookkeeping --
    /// Scroll delta fixed-position descendants compensate for, including the
    /// pixel-snapping residual.
    pub(crate) scroll_delta: Vec2,
    /// The pre-pass stopped at this layer's singular transform.
    pub(crate) singular_subtree: bool,
    /// Counted toward an ancestor's unclipped descendants.
    pub(crate) counted_as_unclipped: bool,
    /// Children in scroll-parent-first order, as a range into the store's
    /// sorted-children buffer.
    pub(crate) sorted_children: (u32, u32),
    /// Sorting moved at least one child out of tree order.
    pub(crate) child_order_changed: bool,
    pub(crate) first_layer_list_addition: usize,
    pub(crate) num_layer_list_additions: usize,
    pub(crate) first_surface_list_addition: usize,
    pub(crate) num_surface_list_additions: usize,
}

impl Default for DrawProperties {
    fn default() -> Self {
        Self {
            target_space_transform: Transform3d::IDENTITY,
            screen_space_transform: Transform3d::IDENTITY,
            target_space_transform_is_animating: false,
            screen_space_transform_is_animating: false,
            opacity: 0.0,
            opacity_is_animating: false,
            screen_space_opacity_is_animating: false,
            blend_mode: BlendMode::SourceOver,
            can_use_lcd_text: false,
            is_clipped: false,
            clip_rect: Rect::ZERO,
            visible_layer_rect: Rect::ZERO,
            drawable_content_rect: Rect::ZERO,
            has_render_surface: false,
            render_target: INVALID,
            maximum_animation_contents_scale: 0.0,
            starting_animation_contents_scale: 0.0,
            is_drawn: false,
            layer_or_descendant_is_drawn: false,
            in_existing_3d_context: false,
            depth: 0,
            num_unclipped_descendants: 0,
            layer_or_descendant_has_copy_request: false,
            layer_or_descendant_has_input_handler: false,
            num_descendants_that_draw_content: 0,
            has_child_with_a_scroll_parent: false,
            scroll_delta: Vec2::ZERO,
            singular_subtree: false,
            counted_as_unclipped: false,
            sorted_children: (0, 0),
            child_order_changed: false,
            first_layer_list_addition: 0,
            num_layer_list_additions: 0,
            first_surface_list_addition: 0,
            num_surface_list_additions: 0,
        }
    }
}

impl DrawProperties {
    /// Resets for a new pass.
    ///
    /// LCD-text eligibility survives the reset: it is only recomputed while
    /// nothing above the layer animates, so flipping text rendering mode
    /// mid-animation is avoided.
    pub(crate) fn reset(&mut self) {
        let can_use_lcd_text = self.can_use_lcd_text;
        *self = Self {
            can_use_lcd_text,
            ..Self::default()
        };
    }
}

/// An off-screen surface a subtree is drawn into before being composited
/// into its own render target.
///
/// Meaningful only when the owning layer's
/// [`has_render_surface`](DrawProperties::has_render_surface) is set.
#[derive(Clone, Debug, Default)]
pub struct RenderSurface {
    /// Surface space to the target's space.
    pub draw_transform: Transform3d,
    /// Surface space to screen space.
    pub screen_space_transform: Transform3d,
    /// Surface space to the target's space for the replica copy.
    pub replica_draw_transform: Transform3d,
    /// Surface space to screen space for the replica copy.
    pub replica_screen_space_transform: Transform3d,
    /// Opacity the surface is composited with.
    pub draw_opacity: f32,
    /// `draw_opacity` depends on a running animation.
    pub draw_opacity_is_animating: bool,
    /// `draw_transform` depends on a running animation.
    pub target_surface_transforms_are_animating: bool,
    /// `screen_space_transform` depends on a running animation.
    pub screen_space_transforms_are_animating: bool,
    /// `clip_rect` applies when compositing the surface.
    pub is_clipped: bool,
    /// Clip in the target's space.
    pub clip_rect: Rect,
    /// Extent of the surface's contents in surface space.
    pub content_rect: Rect,
    /// Scale from the owning layer's space into surface pixels.
    pub sublayer_scale: Vec2,
    /// The composited surface is visible in its target.
    pub contributes_to_drawn_surface: bool,
    /// The owning layer has a replica.
    pub has_replica: bool,
    /// Slot indices drawing into this surface, back to front.
    ///
    /// A contributing child surface appears as its owning layer.
    pub layer_list: Vec<u32>,
}

impl RenderSurface {
    /// The surface's footprint in its target's space, including the replica
    /// and clipped to `clip_rect` when `is_clipped`.
    #[must_use]
    pub fn drawable_content_rect(&self) -> Rect {
        let mut rect = geometry::map_clipped_rect(&self.draw_transform, self.content_rect);
        if self.has_replica {
            rect = geometry::union(
                rect,
                geometry::map_clipped_rect(&self.replica_draw_transform, self.content_rect),
            );
        }
        if self.is_clipped {
            rect = geometry::intersect(rect, self.clip_rect);
        }
        rect
    }

    /// Resets for a new pass, keeping the layer-list allocation.
    pub(crate) fn reset(&mut self) {
        let mut layer_list = core::mem::take(&mut self.layer_list);
        layer_list.clear();
        *self = Self {
            layer_list,
            ..Self::default()
        };
    }
}
