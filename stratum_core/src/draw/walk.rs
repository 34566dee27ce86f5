// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The main draw-property walk.
//!
//! A single depth-first traversal from the pass root computes, per layer, the
//! transforms into its render target and into screen space, the clip it is
//! drawn with, accumulated opacity, LCD-text eligibility and animation raster
//! scales; decides which layers own render surfaces; and builds the
//! render-surface list together with each surface's layer list.
//!
//! State flows down through [`SubtreeData`] and back up through the surface
//! stack (accumulated drawable content) and the per-child list ranges.
//! Recursion depth is bounded by the pre-pass depth check.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

use super::config::{DrawConfig, LcdTextPolicy};
use super::list::{self, AccumulatedSurfaceState, Contributions};
use super::surface;
use crate::error::DrawPropertiesError;
use crate::geometry;
use crate::layer::{BlendMode, INVALID, LayerStore, ScaleAnimation};
use crate::trace::{
    SkipReason, SubtreeSkippedEvent, SurfaceCreatedEvent, SurfaceRemovedEvent, SurfaceRemoval,
    Tracer,
};
use crate::transform::Transform3d;

/// Clip used below a surface whose own content is not clipped.
const UNBOUNDED: Rect = Rect::new(-1.0e9, -1.0e9, 1.0e9, 1.0e9);

/// Pass-wide values resolved once from the [`DrawConfig`].
#[derive(Clone, Copy, Debug)]
struct Globals {
    root: u32,
    generation: u64,
    device_scale_factor: f64,
    page_scale_layer: u32,
    page_scale_factor: f64,
    elastic_overscroll_layer: u32,
    elastic_overscroll: Vec2,
    inner_viewport_container: u32,
    outer_viewport_container: u32,
    max_texture_size: f64,
    can_render_to_separate_surface: bool,
    can_adjust_raster_scales: bool,
    lcd_text: LcdTextPolicy,
    is_pending_tree: bool,
}

/// State handed from a layer to each of its children.
#[derive(Clone, Copy, Debug)]
struct SubtreeData {
    /// Maps the parent's content space into the current render target.
    parent_matrix: Transform3d,
    /// Maps the current render target into screen space.
    full_hierarchy_matrix: Transform3d,
    /// Undoes scrolling between the nearest fixed container and here, in
    /// target space.
    scroll_compensation_matrix: Transform3d,
    fixed_container: u32,
    clip_rect_of_target_surface_in_target_space: Rect,
    clip_rect_in_target_space: Rect,
    ancestor_clips_subtree: bool,
    in_subtree_of_page_scale_layer: bool,
    subtree_can_use_lcd_text: bool,
    subtree_is_visible_from_ancestor: bool,
    maximum_animation_contents_scale: f32,
    starting_animation_contents_scale: f32,
    ancestor_is_animating_scale: bool,
}

/// Animation raster scales for one layer.
#[derive(Clone, Copy, Debug, PartialEq)]
struct AnimationScale {
    is_animating: bool,
    maximum: f32,
    starting: f32,
}

impl AnimationScale {
    const NONE: Self = Self {
        is_animating: false,
        maximum: 0.0,
        starting: 0.0,
    };
    const UNKNOWN: Self = Self {
        is_animating: true,
        maximum: 0.0,
        starting: 0.0,
    };
}

/// Counters reported in the pass summary.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct WalkStats {
    pub(crate) layers_visited: u32,
}

/// Walks the subtree of `root` and returns the render-surface list.
///
/// The pre-pass must have run for this generation.
///
/// # Errors
///
/// Fails if a clip or scroll relation crosses a render surface that does more
/// than translate. Outputs are left partially written in that case.
pub(crate) fn run(
    store: &mut LayerStore,
    root: u32,
    config: &DrawConfig,
    tracer: &mut Tracer<'_>,
) -> Result<(Vec<u32>, WalkStats), DrawPropertiesError> {
    let viewport_container = |layer| {
        let slot = DrawConfig::slot(layer);
        if slot == INVALID {
            INVALID
        } else {
            store.parent[slot as usize]
        }
    };
    let globals = Globals {
        root,
        generation: store.pass_generation,
        device_scale_factor: config.device_scale_factor,
        page_scale_layer: DrawConfig::slot(config.page_scale_layer),
        page_scale_factor: config.page_scale_factor,
        elastic_overscroll_layer: DrawConfig::slot(config.elastic_overscroll_layer),
        elastic_overscroll: config.elastic_overscroll,
        inner_viewport_container: viewport_container(config.inner_viewport_scroll_layer),
        outer_viewport_container: viewport_container(config.outer_viewport_scroll_layer),
        max_texture_size: f64::from(config.max_texture_size),
        can_render_to_separate_surface: config.can_render_to_separate_surface,
        can_adjust_raster_scales: config.can_adjust_raster_scales,
        lcd_text: config.lcd_text,
        is_pending_tree: config.is_pending_tree,
    };

    let viewport = Rect::from_origin_size(Point::ORIGIN, config.viewport);
    let root_data = SubtreeData {
        parent_matrix: config.device_transform.pre_scale(
            config.device_scale_factor,
            config.device_scale_factor,
            1.0,
        ),
        full_hierarchy_matrix: Transform3d::IDENTITY,
        scroll_compensation_matrix: Transform3d::IDENTITY,
        fixed_container: root,
        clip_rect_of_target_surface_in_target_space: viewport,
        clip_rect_in_target_space: viewport,
        ancestor_clips_subtree: true,
        in_subtree_of_page_scale_layer: false,
        subtree_can_use_lcd_text: config.lcd_text != LcdTextPolicy::Disabled,
        subtree_is_visible_from_ancestor: true,
        maximum_animation_contents_scale: 0.0,
        starting_animation_contents_scale: 0.0,
        ancestor_is_animating_scale: false,
    };

    let mut walker = Walker {
        store,
        globals,
        surface_list: Vec::new(),
        accumulated: Vec::new(),
        tracer,
        stats: WalkStats::default(),
    };
    walker.visit(root, &root_data)?;
    debug_assert!(
        walker.accumulated.is_empty(),
        "surface stack not unwound after the walk"
    );
    Ok((walker.surface_list, walker.stats))
}

struct Walker<'a, 't> {
    store: &'a mut LayerStore,
    globals: Globals,
    surface_list: Vec<u32>,
    accumulated: Vec<AccumulatedSurfaceState>,
    tracer: &'a mut Tracer<'t>,
    stats: WalkStats,
}

impl Walker<'_, '_> {
    #[expect(
        clippy::too_many_lines,
        reason = "the per-layer steps share most of their locals"
    )]
    fn visit(&mut self, idx: u32, data: &SubtreeData) -> Result<(), DrawPropertiesError> {
        let i = idx as usize;
        let generation = self.globals.generation;
        assert!(
            self.store.visited[i] != generation,
            "layer {idx} reached twice in one pass"
        );
        self.store.visited[i] = generation;
        self.stats.layers_visited += 1;

        let is_root = idx == self.globals.root;
        let parent = self.store.parent[i];
        let flags = self.store.flags[i];
        let animation = self.store.animation[i];

        let layer_is_visible = data.subtree_is_visible_from_ancestor && !flags.hidden;
        let layer_is_drawn = layer_is_visible || self.store.copy_requests[i] > 0;

        if !is_root && let Some(reason) = self.subtree_skip_reason(idx, layer_is_drawn) {
            self.tracer.subtree_skipped(&SubtreeSkippedEvent { layer: idx, reason });
            return Ok(());
        }

        let in_existing_3d_context = surface::in_existing_3d_context(self.store, idx);
        {
            let d = &mut self.store.draw[i];
            d.is_drawn = layer_is_drawn;
            d.in_existing_3d_context = in_existing_3d_context;
        }

        let mut ancestor_clip_rect = data.clip_rect_in_target_space;
        let mut ancestor_clips_subtree = data.ancestor_clips_subtree;
        if !is_root {
            list::apply_clip_override(
                self.store,
                idx,
                generation,
                &mut ancestor_clip_rect,
                &mut ancestor_clips_subtree,
            )?;
        }

        let mut accumulated_opacity = self.store.opacity[i];
        let mut animating_opacity_to_target = animation.opacity_is_animating;
        let mut animating_opacity_to_screen = animating_opacity_to_target;
        let mut animating_transform_to_target = animation.transform_is_animating;
        let mut animating_transform_to_screen = animating_transform_to_target;
        if parent != INVALID {
            let p = &self.store.draw[parent as usize];
            accumulated_opacity *= p.opacity;
            animating_opacity_to_target |= p.opacity_is_animating;
            animating_opacity_to_screen |= p.screen_space_opacity_is_animating;
            animating_transform_to_target |= p.target_space_transform_is_animating;
            animating_transform_to_screen |= p.screen_space_transform_is_animating;
        }

        // Local transform, scroll and position into the parent's target.
        let scroll = self.effective_scroll(idx);
        let position = self.store.position[i] - scroll;
        let local = self.store.local_transform[i];
        let origin = self.store.transform_origin[i];
        let mut combined = if local.is_identity() {
            data.parent_matrix.pre_translate(position.x, position.y, 0.0)
        } else {
            (data.parent_matrix.pre_translate(
                position.x + origin[0],
                position.y + origin[1],
                origin[2],
            ) * local)
                .pre_translate(-origin[0], -origin[1], -origin[2])
        };

        // Snap scrolled layers to whole pixels; fixed-position descendants
        // must undo the snap too.
        let mut scroll_delta = scroll;
        if !animating_transform_to_target
            && self.store.scroll_clip[i] != INVALID
            && combined.is_scale_or_translation()
        {
            let previous = combined.translation_2d();
            combined = combined.round_translation();
            let snap = combined.translation_2d() - previous;
            let parent_scales = data.parent_matrix.scale_components_2d(1.0);
            scroll_delta -= Vec2::new(
                divide_or_zero(snap.x, parent_scales.x),
                divide_or_zero(snap.y, parent_scales.y),
            );
        }
        self.store.draw[i].scroll_delta = scroll_delta;

        combined = self.apply_position_constraint(idx, data, combined);

        let animation_scale = if self.globals.can_adjust_raster_scales {
            animation_contents_scale(
                &local,
                animation.scale,
                data,
                &combined,
            )
        } else {
            AnimationScale::NONE
        };
        {
            let d = &mut self.store.draw[i];
            d.maximum_animation_contents_scale = animation_scale.maximum;
            d.starting_animation_contents_scale = animation_scale.starting;
        }

        let mut layer_scale_factor = self.globals.device_scale_factor;
        if data.in_subtree_of_page_scale_layer {
            layer_scale_factor *= self.globals.page_scale_factor;
        }
        let combined_scales = combined.scale_components_2d(layer_scale_factor);

        let screen_space_transform = data.full_hierarchy_matrix * combined;
        {
            let d = &mut self.store.draw[i];
            d.target_space_transform = combined;
            d.screen_space_transform = screen_space_transform;
        }

        let (layer_can_use_lcd_text, subtree_can_use_lcd_text) = match self.globals.lcd_text {
            LcdTextPolicy::AlwaysAllowed => (true, true),
            LcdTextPolicy::Disabled | LcdTextPolicy::Enabled => {
                let subtree = data.subtree_can_use_lcd_text
                    && accumulated_opacity == 1.0
                    && combined.is_identity_or_integer_translation();
                (subtree && flags.contents_opaque, subtree)
            }
        };
        // Eligibility is frozen while anything up to the screen animates.
        if !animating_opacity_to_screen && !animating_transform_to_screen {
            self.store.draw[i].can_use_lcd_text = layer_can_use_lcd_text;
        }

        let mut data_for_children = SubtreeData {
            parent_matrix: combined,
            full_hierarchy_matrix: data.full_hierarchy_matrix,
            scroll_compensation_matrix: data.scroll_compensation_matrix,
            fixed_container: data.fixed_container,
            clip_rect_of_target_surface_in_target_space: data
                .clip_rect_of_target_surface_in_target_space,
            clip_rect_in_target_space: Rect::ZERO,
            ancestor_clips_subtree: false,
            in_subtree_of_page_scale_layer: data.in_subtree_of_page_scale_layer,
            subtree_can_use_lcd_text,
            subtree_is_visible_from_ancestor: layer_is_drawn,
            maximum_animation_contents_scale: animation_scale.maximum,
            starting_animation_contents_scale: animation_scale.starting,
            ancestor_is_animating_scale: animation_scale.is_animating,
        };

        let surface_reason = if is_root || self.globals.can_render_to_separate_surface {
            surface::surface_reason(
                self.store,
                idx,
                is_root,
                combined.preserves_2d_axis_alignment(),
            )
        } else {
            None
        };
        let render_to_separate_surface = surface_reason.is_some();
        let sublayer_scale = if is_root {
            Vec2::new(1.0, 1.0)
        } else {
            Vec2::new(
                usable_scale(combined_scales.x),
                usable_scale(combined_scales.y),
            )
        };

        let mut clip_rect_in_target_space = Rect::ZERO;
        let mut layer_or_ancestor_clips_descendants = false;
        let render_target;

        if let Some(reason) = surface_reason {
            self.store.draw[i].has_render_surface = true;
            self.store.draw[i].render_target = idx;
            if !flags.double_sided
                && surface::is_surface_back_face_visible(
                    self.store,
                    idx,
                    combined.is_back_face_visible(),
                )
            {
                self.tracer.subtree_skipped(&SubtreeSkippedEvent {
                    layer: idx,
                    reason: SkipReason::BackFacingSurface,
                });
                return Ok(());
            }
            self.tracer
                .surface_created(&SurfaceCreatedEvent { layer: idx, reason });
            render_target = idx;

            let surface_draw_transform = if is_root {
                Transform3d::IDENTITY
            } else {
                // The surface rasterizes at the layer's scale; the layer draws
                // into it through that scale alone.
                let own_scale = Transform3d::from_scale(sublayer_scale.x, sublayer_scale.y, 1.0);
                self.store.draw[i].target_space_transform = own_scale;
                data_for_children.parent_matrix = own_scale;
                combined.pre_scale(1.0 / sublayer_scale.x, 1.0 / sublayer_scale.y, 1.0)
            };

            {
                let has_replica = self.store.replica_layer[i] != INVALID;
                let s = &mut self.store.surface[i];
                s.draw_transform = surface_draw_transform;
                s.sublayer_scale = sublayer_scale;
                s.contributes_to_drawn_surface = !is_root && layer_is_visible;
                s.draw_opacity = accumulated_opacity;
                s.draw_opacity_is_animating = animating_opacity_to_target;
                s.target_surface_transforms_are_animating = animating_transform_to_target;
                s.screen_space_transforms_are_animating = animating_transform_to_screen;
                s.has_replica = has_replica;
            }
            {
                // Opacity and blending move to the surface.
                let d = &mut self.store.draw[i];
                d.opacity = 1.0;
                d.blend_mode = BlendMode::SourceOver;
                d.opacity_is_animating = false;
                d.screen_space_opacity_is_animating = animating_opacity_to_screen;
                d.target_space_transform_is_animating = false;
                d.screen_space_transform_is_animating = animating_transform_to_screen;
            }

            data_for_children.full_hierarchy_matrix =
                (data.full_hierarchy_matrix * surface_draw_transform).flattened();

            self.attach_surface_layers(idx, animation_scale);

            if ancestor_clips_subtree {
                let target_to_surface = surface_draw_transform
                    .inverse()
                    .unwrap_or(Transform3d::IDENTITY);
                let clip_in_target = geometry::intersect(
                    data.clip_rect_of_target_surface_in_target_space,
                    ancestor_clip_rect,
                );
                let projected =
                    geometry::project_enclosing_clipped_rect(&target_to_surface, clip_in_target);
                let s = &mut self.store.surface[i];
                if self.store.draw[i].num_unclipped_descendants > 0 {
                    // Unclipped descendants must escape the surface clip, so
                    // the clip moves onto the layer instead.
                    layer_or_ancestor_clips_descendants = true;
                    clip_rect_in_target_space = projected;
                    s.is_clipped = false;
                    s.clip_rect = Rect::ZERO;
                    data_for_children.clip_rect_of_target_surface_in_target_space = UNBOUNDED;
                } else {
                    s.is_clipped = true;
                    s.clip_rect = ancestor_clip_rect;
                    data_for_children.clip_rect_of_target_surface_in_target_space = projected;
                }
            } else {
                let s = &mut self.store.surface[i];
                s.is_clipped = false;
                s.clip_rect = Rect::ZERO;
                data_for_children.clip_rect_of_target_surface_in_target_space = UNBOUNDED;
            }

            self.accumulated.push(AccumulatedSurfaceState {
                render_target: idx,
                drawable_content_rect: Rect::ZERO,
            });
            self.surface_list.push(idx);
        } else {
            render_target = self.store.draw[parent as usize].render_target;
            let d = &mut self.store.draw[i];
            d.render_target = render_target;
            d.target_space_transform_is_animating = animating_transform_to_target;
            d.screen_space_transform_is_animating = animating_transform_to_screen;
            d.opacity = accumulated_opacity;
            d.opacity_is_animating = animating_opacity_to_target;
            d.screen_space_opacity_is_animating = animating_opacity_to_screen;
            d.blend_mode = self.store.blend_mode[i];
            layer_or_ancestor_clips_descendants = ancestor_clips_subtree;
            if ancestor_clips_subtree {
                clip_rect_in_target_space = ancestor_clip_rect;
            }
        }

        let bounds_rect = Rect::from_origin_size(Point::ORIGIN, self.store.bounds[i]);
        let target_space_transform = self.store.draw[i].target_space_transform;
        let rect_in_target_space =
            geometry::map_enclosing_clipped_rect(&target_space_transform, bounds_rect);

        if surface::clips_subtree(self.store, idx) {
            layer_or_ancestor_clips_descendants = true;
            clip_rect_in_target_space = if ancestor_clips_subtree && !render_to_separate_surface {
                geometry::intersect(ancestor_clip_rect, rect_in_target_space)
            } else {
                rect_in_target_space
            };
        }
        {
            let d = &mut self.store.draw[i];
            d.is_clipped = layer_or_ancestor_clips_descendants;
            d.clip_rect = if layer_or_ancestor_clips_descendants {
                clip_rect_in_target_space
            } else {
                rect_in_target_space
            };
        }

        let target = render_target as usize;
        if !surface::layer_should_be_skipped(self.store, idx, layer_is_drawn) {
            self.store.surface[target].layer_list.push(idx);
        }
        let surface_list_child_start = self.surface_list.len();
        let layer_list_child_start = self.store.surface[target].layer_list.len();

        if self.store.first_child[i] != INVALID {
            self.prepare_children_data(
                idx,
                data,
                &mut data_for_children,
                scroll_delta,
                render_to_separate_surface,
            );
            data_for_children.clip_rect_in_target_space = clip_rect_in_target_space;
            data_for_children.ancestor_clips_subtree = layer_or_ancestor_clips_descendants;
        }

        let mut descendant_is_drawn = false;
        let (sorted_start, sorted_end) = self.store.draw[i].sorted_children;
        let use_sorted = self.store.draw[i].has_child_with_a_scroll_parent;
        let mut sorted_cursor = sorted_start as usize;
        let mut next_sibling = self.store.first_child[i];
        loop {
            let child = if use_sorted {
                if sorted_cursor >= sorted_end as usize {
                    break;
                }
                let child = self.store.sorted_children[sorted_cursor];
                sorted_cursor += 1;
                child
            } else {
                if next_sibling == INVALID {
                    break;
                }
                let child = next_sibling;
                next_sibling = self.store.next_sibling[child as usize];
                child
            };
            self.visit_child(child, render_target, &data_for_children)?;
            descendant_is_drawn |= self.store.draw[child as usize].layer_or_descendant_is_drawn;
        }

        if self.store.draw[i].child_order_changed {
            list::sort_contributions(
                self.store,
                idx,
                &mut self.surface_list,
                surface_list_child_start,
                Contributions::SurfaceList,
            );
            let mut layer_list = core::mem::take(&mut self.store.surface[target].layer_list);
            list::sort_contributions(
                self.store,
                idx,
                &mut layer_list,
                layer_list_child_start,
                Contributions::LayerList,
            );
            self.store.surface[target].layer_list = layer_list;
        }

        self.store.draw[i].layer_or_descendant_is_drawn = layer_is_drawn || descendant_is_drawn;

        let mut local_drawable_content_rect_of_subtree = if render_to_separate_surface {
            let state = self.accumulated.pop();
            assert!(
                state.is_some_and(|s| s.render_target == idx),
                "surface stack out of balance at layer {idx}"
            );
            state.map_or(Rect::ZERO, |s| s.drawable_content_rect)
        } else {
            self.accumulated
                .last()
                .map_or(Rect::ZERO, |s| s.drawable_content_rect)
        };

        if render_to_separate_surface && !is_root && self.store.surface[i].layer_list.is_empty() {
            list::remove_surface_for_early_exit(self.store, &mut self.surface_list, idx);
            self.tracer.surface_removed(&SurfaceRemovedEvent {
                layer: idx,
                reason: SurfaceRemoval::EmptyLayerList,
            });
            return Ok(());
        }

        let drawable_content_rect = if layer_or_ancestor_clips_descendants {
            geometry::intersect(rect_in_target_space, clip_rect_in_target_space)
        } else {
            rect_in_target_space
        };
        self.store.draw[i].drawable_content_rect = drawable_content_rect;
        if flags.draws_content {
            local_drawable_content_rect_of_subtree =
                geometry::union(local_drawable_content_rect_of_subtree, drawable_content_rect);
        }

        let clip_of_target_surface = if render_to_separate_surface {
            data_for_children.clip_rect_of_target_surface_in_target_space
        } else {
            data.clip_rect_of_target_surface_in_target_space
        };
        self.store.draw[i].visible_layer_rect = self.visible_layer_rect(
            idx,
            render_target,
            clip_of_target_surface,
            bounds_rect,
            rect_in_target_space,
        );

        if is_root {
            self.store.surface[i].content_rect = ancestor_clip_rect;
        } else if render_to_separate_surface
            && !self.finish_surface(idx, local_drawable_content_rect_of_subtree)
        {
            return Ok(());
        }

        if !is_root {
            list::update_accumulated_surface_state(
                self.store,
                &mut self.accumulated,
                idx,
                local_drawable_content_rect_of_subtree,
            )?;
        }
        Ok(())
    }

    fn visit_child(
        &mut self,
        child: u32,
        render_target: u32,
        data: &SubtreeData,
    ) -> Result<(), DrawPropertiesError> {
        let target = render_target as usize;
        let first_layer = self.store.surface[target].layer_list.len();
        let first_surface = self.surface_list.len();

        self.visit(child, data)?;

        let c = child as usize;
        let child_props = &self.store.draw[c];
        let child_surface = &self.store.surface[c];
        if child_props.render_target == child
            && child_props.has_render_surface
            && !child_surface.layer_list.is_empty()
            && !geometry::is_empty(child_surface.content_rect)
        {
            self.store.surface[target].layer_list.push(child);
        }

        let d = &mut self.store.draw[c];
        d.first_layer_list_addition = first_layer;
        d.num_layer_list_additions = self.store.surface[target].layer_list.len() - first_layer;
        d.first_surface_list_addition = first_surface;
        d.num_surface_list_additions = self.surface_list.len() - first_surface;
        Ok(())
    }

    /// Why the subtree of a non-root layer can be pruned, if it can.
    fn subtree_skip_reason(&self, idx: u32, layer_is_drawn: bool) -> Option<SkipReason> {
        let i = idx as usize;
        let animation = &self.store.animation[i];
        let data = &self.store.draw[i];

        if !self.store.local_transform[i].is_invertible() && !animation.transform_is_animating {
            return Some(SkipReason::SingularTransform);
        }
        // Copy requests and input handlers keep the subtree alive even when
        // nothing in it is visible.
        if data.layer_or_descendant_has_copy_request
            || data.layer_or_descendant_has_input_handler
        {
            return None;
        }
        if !layer_is_drawn {
            return Some(SkipReason::NotDrawn);
        }
        if self.globals.is_pending_tree && animation.opacity_can_animate {
            return None;
        }
        if self.store.opacity[i] == 0.0 {
            return Some(SkipReason::ZeroOpacity);
        }
        None
    }

    /// Scroll applied to the layer's position, including the scroll of its
    /// scroll parent.
    fn effective_scroll(&self, idx: u32) -> Vec2 {
        let i = idx as usize;
        let mut scroll = self.store.scroll_offset[i] - self.store.scroll_compensation_adjustment[i];
        let scroll_parent = self.store.scroll_parent[i];
        if scroll_parent != INVALID {
            let sp = scroll_parent as usize;
            scroll += if list::was_reached(self.store, scroll_parent, self.globals.generation) {
                self.store.draw[sp].scroll_delta
            } else {
                self.store.scroll_offset[sp] - self.store.scroll_compensation_adjustment[sp]
            };
        }
        scroll
    }

    /// Holds a fixed-position layer in place relative to its container and
    /// follows the container's edges when anchored to them.
    fn apply_position_constraint(
        &self,
        idx: u32,
        data: &SubtreeData,
        combined: Transform3d,
    ) -> Transform3d {
        let constraint = self.store.position_constraint[idx as usize];
        if !constraint.is_fixed_position {
            return combined;
        }
        let mut combined = data.scroll_compensation_matrix * combined;
        if data.fixed_container != INVALID {
            let delta = self.store.fixed_container_size_delta[data.fixed_container as usize];
            let dx = if constraint.anchored_right { delta.x } else { 0.0 };
            let dy = if constraint.anchored_bottom { delta.y } else { 0.0 };
            if dx != 0.0 || dy != 0.0 {
                combined = combined.pre_translate(dx, dy, 0.0);
            }
        }
        combined
    }

    fn is_fixed_container(&self, idx: u32) -> bool {
        self.store.flags[idx as usize].is_container_for_fixed_position
            || idx == self.globals.inner_viewport_container
            || idx == self.globals.outer_viewport_container
    }

    /// Fills the transform-related parts of the children's data.
    fn prepare_children_data(
        &self,
        idx: u32,
        data: &SubtreeData,
        children: &mut SubtreeData,
        scroll_delta: Vec2,
        render_to_separate_surface: bool,
    ) {
        let i = idx as usize;
        if idx == self.globals.page_scale_layer {
            let scale = self.globals.page_scale_factor;
            children.parent_matrix = children.parent_matrix.pre_scale(scale, scale, 1.0);
            children.in_subtree_of_page_scale_layer = true;
        }
        if idx == self.globals.elastic_overscroll_layer {
            let overscroll = self.globals.elastic_overscroll;
            children.parent_matrix =
                children
                    .parent_matrix
                    .pre_translate(-overscroll.x, -overscroll.y, 0.0);
        }
        if self.store.flags[i].should_flatten_transform {
            children.parent_matrix = children.parent_matrix.flattened();
        }

        let is_container = self.is_fixed_container(idx);
        children.scroll_compensation_matrix = self.scroll_compensation_for_children(
            idx,
            is_container,
            data,
            scroll_delta,
            render_to_separate_surface,
        );
        children.fixed_container = if is_container {
            idx
        } else {
            data.fixed_container
        };
    }

    /// Scroll compensation handed to the children of `idx`.
    ///
    /// Accumulates the layer's own scroll delta on top of what its ancestors
    /// (up to the nearest fixed container) scrolled, and re-expresses the
    /// result in a new surface's space when the layer owns one.
    fn scroll_compensation_for_children(
        &self,
        idx: u32,
        is_container: bool,
        data: &SubtreeData,
        scroll_delta: Vec2,
        render_to_separate_surface: bool,
    ) -> Transform3d {
        let has_delta = scroll_delta != Vec2::ZERO;
        if !is_container && !has_delta && !render_to_separate_surface {
            return data.scroll_compensation_matrix;
        }

        let mut compensation = if is_container {
            Transform3d::IDENTITY
        } else {
            data.scroll_compensation_matrix
        };
        if has_delta {
            let parent_matrix = data.parent_matrix;
            if let Some(inverse) = parent_matrix.inverse() {
                let for_this_layer =
                    parent_matrix.pre_translate(scroll_delta.x, scroll_delta.y, 0.0) * inverse;
                compensation = compensation * for_this_layer;
            }
        }
        if render_to_separate_surface && !compensation.is_identity() {
            let surface_draw = self.store.surface[idx as usize].draw_transform;
            if let Some(inverse) = surface_draw.inverse() {
                compensation = inverse * compensation * surface_draw;
            }
        }
        compensation
    }

    /// Points the mask and replica layers of a surface owner at its surface.
    fn attach_surface_layers(&mut self, owner: u32, scale: AnimationScale) {
        let o = owner as usize;
        let replica = self.store.replica_layer[o];
        let replica_mask = if replica == INVALID {
            INVALID
        } else {
            self.store.mask_layer[replica as usize]
        };
        for attached in [self.store.mask_layer[o], replica, replica_mask] {
            if attached == INVALID {
                continue;
            }
            let a = attached as usize;
            let bounds = Rect::from_origin_size(Point::ORIGIN, self.store.bounds[a]);
            let d = &mut self.store.draw[a];
            d.render_target = owner;
            d.visible_layer_rect = bounds;
            d.maximum_animation_contents_scale = scale.maximum;
            d.starting_animation_contents_scale = scale.starting;
        }
    }

    fn visible_layer_rect(
        &self,
        idx: u32,
        render_target: u32,
        clip_of_target_surface: Rect,
        bounds_rect: Rect,
        rect_in_target_space: Rect,
    ) -> Rect {
        let i = idx as usize;
        let drawable = self.store.draw[i].drawable_content_rect;
        if !self.store.flags[i].draws_content
            || geometry::is_empty(bounds_rect)
            || geometry::is_empty(drawable)
        {
            return Rect::ZERO;
        }
        let mut visible_in_target = drawable;
        if self.store.surface[render_target as usize].is_clipped {
            visible_in_target = geometry::intersect(visible_in_target, clip_of_target_surface);
        }
        if geometry::is_empty(visible_in_target) {
            return Rect::ZERO;
        }
        geometry::visible_rect_with_cached_layer_rect(
            visible_in_target,
            bounds_rect,
            rect_in_target_space,
            &self.store.draw[i].target_space_transform,
        )
    }

    /// Finalizes a non-root surface after its subtree was walked.
    ///
    /// Returns `false` if the surface turned out empty and was retracted.
    fn finish_surface(&mut self, idx: u32, drawable_content_of_subtree: Rect) -> bool {
        let i = idx as usize;
        let replica = self.store.replica_layer[i];
        let s = &self.store.surface[i];
        let scale = s.sublayer_scale;

        let mut content_rect = drawable_content_of_subtree;
        if replica == INVALID && s.is_clipped && !geometry::is_empty(content_rect) {
            let surface_clip = geometry::visible_rect(s.clip_rect, content_rect, &s.draw_transform);
            content_rect = geometry::intersect(content_rect, surface_clip);
        }
        let max = self.globals.max_texture_size;
        if !geometry::is_empty(content_rect) {
            content_rect = Rect::new(
                content_rect.x0,
                content_rect.y0,
                content_rect.x0 + content_rect.width().min(max),
                content_rect.y0 + content_rect.height().min(max),
            );
        }
        if geometry::is_empty(content_rect) {
            list::remove_surface_for_early_exit(self.store, &mut self.surface_list, idx);
            self.tracer.surface_removed(&SurfaceRemovedEvent {
                layer: idx,
                reason: SurfaceRemoval::EmptyContentRect,
            });
            return false;
        }

        let screen_space_transform = self.store.draw[i]
            .screen_space_transform
            .pre_scale(1.0 / scale.x, 1.0 / scale.y, 1.0);

        let replica_transform = (replica != INVALID).then(|| {
            let r = replica as usize;
            let position = self.store.position[r];
            let origin = self.store.transform_origin[r];
            (Transform3d::from_scale(scale.x, scale.y, 1.0).pre_translate(
                position.x + origin[0],
                position.y + origin[1],
                0.0,
            ) * self.store.local_transform[r])
                .pre_translate(-origin[0], -origin[1], 0.0)
                .pre_scale(1.0 / scale.x, 1.0 / scale.y, 1.0)
        });

        let s = &mut self.store.surface[i];
        s.content_rect = content_rect;
        s.screen_space_transform = screen_space_transform;
        if let Some(to_replica) = replica_transform {
            s.replica_draw_transform = s.draw_transform * to_replica;
            s.replica_screen_space_transform = screen_space_transform * to_replica;
        }
        true
    }
}

/// Raster scales for a layer whose own or inherited transform may be
/// animating a scale.
///
/// When both the layer and an ancestor animate scale, the combined maximum
/// is not known and `0.0` is reported.
fn animation_contents_scale(
    local: &Transform3d,
    layer_animation: Option<ScaleAnimation>,
    data: &SubtreeData,
    combined: &Transform3d,
) -> AnimationScale {
    let ancestor_is_animating = data.ancestor_is_animating_scale;
    if ancestor_is_animating && data.maximum_animation_contents_scale == 0.0 {
        return AnimationScale::UNKNOWN;
    }
    match (layer_animation, ancestor_is_animating) {
        (None, false) => AnimationScale::NONE,
        (Some(_), true) => AnimationScale::UNKNOWN,
        _ if !combined.is_scale_or_translation() => AnimationScale::UNKNOWN,
        (None, true) => {
            let scales = local.scale_components_2d(0.0);
            let factor = narrow(scales.x.max(scales.y));
            AnimationScale {
                is_animating: true,
                maximum: data.maximum_animation_contents_scale * factor,
                starting: data.starting_animation_contents_scale * factor,
            }
        }
        (Some(animation), false) => {
            let scales = data.parent_matrix.scale_components_2d(0.0);
            let factor = narrow(scales.x.max(scales.y));
            AnimationScale {
                is_animating: true,
                maximum: animation.maximum_target_scale.map_or(0.0, |m| m * factor),
                starting: animation.starting_scale.map_or(0.0, |s| s * factor),
            }
        }
    }
}

/// A scale component usable as a surface's raster scale.
fn usable_scale(component: f64) -> f64 {
    if component.is_finite() && component != 0.0 {
        component
    } else {
        1.0
    }
}

fn divide_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "raster scales are stored in single precision"
)]
fn narrow(value: f64) -> f32 {
    value as f32
}
