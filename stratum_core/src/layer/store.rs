// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays layer storage with allocation, topology, and property management.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Size, Vec2};
use understory_dirty::{Channel, CycleHandling, DirtyTracker, EagerPolicy};

use crate::dirty;
use crate::draw::{DrawProperties, RenderSurface};
use crate::transform::Transform3d;

use super::id::{INVALID, LayerId};
use super::props::{
    AnimationState, BlendMode, FilterOperation, LayerFlags, PositionConstraint,
};
use super::traverse::Children;

/// Struct-of-arrays storage for all layers.
///
/// Layers are addressed by [`LayerId`] handles. Internally, each layer occupies
/// a slot in parallel arrays. Destroyed layers are recycled via a free list,
/// and generation counters prevent stale handle access.
///
/// Besides the caller-owned inputs, every slot carries the outputs of the
/// last draw-property pass ([`DrawProperties`] and [`RenderSurface`]); those
/// are written only by
/// [`calculate_draw_properties`](Self::calculate_draw_properties).
#[derive(Debug)]
pub struct LayerStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Geometry --
    pub(crate) bounds: Vec<Size>,
    pub(crate) position: Vec<Point>,
    pub(crate) local_transform: Vec<Transform3d>,
    pub(crate) transform_origin: Vec<[f64; 3]>,
    pub(crate) sorting_context_id: Vec<i32>,

    // -- Effects --
    pub(crate) opacity: Vec<f32>,
    pub(crate) blend_mode: Vec<BlendMode>,
    pub(crate) filters: Vec<Vec<FilterOperation>>,
    pub(crate) background_filters: Vec<Vec<FilterOperation>>,
    pub(crate) flags: Vec<LayerFlags>,
    pub(crate) animation: Vec<AnimationState>,

    // -- Scrolling and position constraints --
    pub(crate) scroll_offset: Vec<Vec2>,
    pub(crate) scroll_compensation_adjustment: Vec<Vec2>,
    pub(crate) scroll_clip: Vec<u32>,
    pub(crate) fixed_container_size_delta: Vec<Vec2>,
    pub(crate) position_constraint: Vec<PositionConstraint>,

    // -- Input and readback --
    pub(crate) touch_region: Vec<Rect>,
    pub(crate) copy_requests: Vec<u32>,

    // -- Relations (see `relations.rs`) --
    pub(crate) scroll_parent: Vec<u32>,
    pub(crate) scroll_children: Vec<Vec<u32>>,
    pub(crate) clip_parent: Vec<u32>,
    pub(crate) clip_children: Vec<Vec<u32>>,
    pub(crate) mask_layer: Vec<u32>,
    pub(crate) replica_layer: Vec<u32>,
    pub(crate) attached_to: Vec<u32>,

    // -- Computed (written by draw passes) --
    pub(crate) draw: Vec<DrawProperties>,
    pub(crate) surface: Vec<RenderSurface>,
    pub(crate) visited: Vec<u64>,
    pub(crate) sorted_for_recursion: Vec<u64>,
    pub(crate) sorted_children: Vec<u32>,
    pub(crate) pass_generation: u64,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
    pub(crate) needs_update: bool,
}

impl Default for LayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerStore {
    /// Creates an empty layer store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            bounds: Vec::new(),
            position: Vec::new(),
            local_transform: Vec::new(),
            transform_origin: Vec::new(),
            sorting_context_id: Vec::new(),
            opacity: Vec::new(),
            blend_mode: Vec::new(),
            filters: Vec::new(),
            background_filters: Vec::new(),
            flags: Vec::new(),
            animation: Vec::new(),
            scroll_offset: Vec::new(),
            scroll_compensation_adjustment: Vec::new(),
            scroll_clip: Vec::new(),
            fixed_container_size_delta: Vec::new(),
            position_constraint: Vec::new(),
            touch_region: Vec::new(),
            copy_requests: Vec::new(),
            scroll_parent: Vec::new(),
            scroll_children: Vec::new(),
            clip_parent: Vec::new(),
            clip_children: Vec::new(),
            mask_layer: Vec::new(),
            replica_layer: Vec::new(),
            attached_to: Vec::new(),
            draw: Vec::new(),
            surface: Vec::new(),
            visited: Vec::new(),
            sorted_for_recursion: Vec::new(),
            sorted_children: Vec::new(),
            pass_generation: 0,
            generation: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            needs_update: true,
        }
    }

    // -- Allocation API --

    /// Creates a new layer and returns its handle.
    ///
    /// The layer starts with empty bounds at the origin, an identity
    /// transform, full opacity, default [`LayerFlags`], no relations and no
    /// parent.
    pub fn create_layer(&mut self) -> LayerId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.generation[i] += 1;
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.bounds[i] = Size::ZERO;
            self.position[i] = Point::ORIGIN;
            self.local_transform[i] = Transform3d::IDENTITY;
            self.transform_origin[i] = [0.0; 3];
            self.sorting_context_id[i] = 0;
            self.opacity[i] = 1.0;
            self.blend_mode[i] = BlendMode::SourceOver;
            self.filters[i].clear();
            self.background_filters[i].clear();
            self.flags[i] = LayerFlags::default();
            self.animation[i] = AnimationState::default();
            self.scroll_offset[i] = Vec2::ZERO;
            self.scroll_compensation_adjustment[i] = Vec2::ZERO;
            self.scroll_clip[i] = INVALID;
            self.fixed_container_size_delta[i] = Vec2::ZERO;
            self.position_constraint[i] = PositionConstraint::default();
            self.touch_region[i] = Rect::ZERO;
            self.copy_requests[i] = 0;
            self.scroll_parent[i] = INVALID;
            self.scroll_children[i].clear();
            self.clip_parent[i] = INVALID;
            self.clip_children[i].clear();
            self.mask_layer[i] = INVALID;
            self.replica_layer[i] = INVALID;
            self.attached_to[i] = INVALID;
            self.draw[i] = DrawProperties::default();
            self.surface[i].reset();
            self.visited[i] = 0;
            self.sorted_for_recursion[i] = 0;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.bounds.push(Size::ZERO);
            self.position.push(Point::ORIGIN);
            self.local_transform.push(Transform3d::IDENTITY);
            self.transform_origin.push([0.0; 3]);
            self.sorting_context_id.push(0);
            self.opacity.push(1.0);
            self.blend_mode.push(BlendMode::SourceOver);
            self.filters.push(Vec::new());
            self.background_filters.push(Vec::new());
            self.flags.push(LayerFlags::default());
            self.animation.push(AnimationState::default());
            self.scroll_offset.push(Vec2::ZERO);
            self.scroll_compensation_adjustment.push(Vec2::ZERO);
            self.scroll_clip.push(INVALID);
            self.fixed_container_size_delta.push(Vec2::ZERO);
            self.position_constraint.push(PositionConstraint::default());
            self.touch_region.push(Rect::ZERO);
            self.copy_requests.push(0);
            self.scroll_parent.push(INVALID);
            self.scroll_children.push(Vec::new());
            self.clip_parent.push(INVALID);
            self.clip_children.push(Vec::new());
            self.mask_layer.push(INVALID);
            self.replica_layer.push(INVALID);
            self.attached_to.push(INVALID);
            self.draw.push(DrawProperties::default());
            self.surface.push(RenderSurface::default());
            self.visited.push(0);
            self.sorted_for_recursion.push(0);
            self.generation.push(0);
            idx
        };

        self.needs_update = true;
        self.dirty.mark(idx, dirty::TOPOLOGY);

        LayerId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Destroys a layer, freeing its slot for reuse.
    ///
    /// Every relation naming the layer (scroll parent, clip parent, mask,
    /// replica, scroll clip) is cleared on both ends.
    ///
    /// # Panics
    ///
    /// Panics if the layer has children (remove them first) or if the handle
    /// is stale.
    pub fn destroy_layer(&mut self, id: LayerId) {
        self.validate(id);
        let idx = id.idx;
        assert!(
            self.first_child[idx as usize] == INVALID,
            "cannot destroy layer with children"
        );

        // Remove from parent's child list if attached.
        if self.parent[idx as usize] != INVALID {
            self.unlink_from_parent(idx);
        }

        self.detach_relations(idx);
        for slot in 0..self.len {
            if self.scroll_clip[slot as usize] == idx {
                self.scroll_clip[slot as usize] = INVALID;
                self.touch(slot, dirty::GEOMETRY, true);
            }
        }

        // Remove dirty tracking dependencies.
        self.dirty.remove_key(idx);

        // Bump generation so old handles immediately fail validation.
        self.generation[idx as usize] += 1;

        self.free_list.push(idx);
        self.needs_update = true;
        self.dirty.mark(idx, dirty::TOPOLOGY);
    }

    /// Returns whether the given handle refers to a live layer.
    #[must_use]
    pub fn is_alive(&self, id: LayerId) -> bool {
        (id.idx < self.len)
            && self.generation[id.idx as usize] == id.generation
            && !self.free_list.contains(&id.idx)
    }

    /// Returns the handle for a live slot index, as found in a
    /// [`DrawPass`](crate::draw::DrawPass) or a surface layer list.
    #[must_use]
    pub fn layer_at(&self, idx: u32) -> Option<LayerId> {
        (idx < self.len && !self.free_list.contains(&idx)).then(|| LayerId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    /// Returns `true` when a mutation happened since the last pass, or
    /// [`set_needs_update`](Self::set_needs_update) was called.
    ///
    /// Outputs of a previous pass must not be reused while this is set.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Requests recomputation, e.g. after the animation system produced new
    /// values through a channel the store cannot observe.
    pub fn set_needs_update(&mut self) {
        self.needs_update = true;
    }

    // -- Topology API --

    /// Adds `child` as the last child of `parent`.
    ///
    /// Marks inherited channels for `child`'s subtree.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale, or if `child` already has a parent.
    pub fn add_child(&mut self, parent: LayerId, child: LayerId) {
        self.validate(parent);
        self.validate(child);
        let p = parent.idx;
        let c = child.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        self.link_last_child(p, c);
    }

    /// Removes `child` from its current parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale or the layer has no parent.
    pub fn remove_from_parent(&mut self, child: LayerId) {
        self.validate(child);
        let c = child.idx;
        assert!(self.parent[c as usize] != INVALID, "layer has no parent");

        let p = self.parent[c as usize];
        self.unlink_from_parent(c);
        self.dirty.remove_dependency(c, p, dirty::GEOMETRY);
        self.dirty.remove_dependency(c, p, dirty::EFFECTS);

        self.mark_subtree_inherited_dirty(c);
        self.needs_update = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Moves `child` to be the last child of `new_parent`.
    ///
    /// If `child` already has a parent, it is removed first.
    ///
    /// # Panics
    ///
    /// Panics if either handle is stale.
    pub fn reparent(&mut self, child: LayerId, new_parent: LayerId) {
        self.validate(child);
        self.validate(new_parent);

        let c = child.idx;
        if self.parent[c as usize] != INVALID {
            let old_p = self.parent[c as usize];
            self.unlink_from_parent(c);
            self.dirty.remove_dependency(c, old_p, dirty::GEOMETRY);
            self.dirty.remove_dependency(c, old_p, dirty::EFFECTS);
            self.dirty.mark(old_p, dirty::TOPOLOGY);
        }
        self.link_last_child(new_parent.idx, c);
    }

    /// Inserts `child` before `sibling` in the sibling list.
    ///
    /// `child` must not already have a parent. `sibling` must have a parent.
    ///
    /// # Panics
    ///
    /// Panics if handles are stale, `child` already has a parent, or `sibling`
    /// has no parent.
    pub fn insert_before(&mut self, child: LayerId, sibling: LayerId) {
        self.validate(child);
        self.validate(sibling);
        let c = child.idx;
        let s = sibling.idx;
        assert!(
            self.parent[c as usize] == INVALID,
            "child already has a parent"
        );
        let p = self.parent[s as usize];
        assert!(p != INVALID, "sibling has no parent");

        self.parent[c as usize] = p;
        self.next_sibling[c as usize] = s;
        self.prev_sibling[c as usize] = self.prev_sibling[s as usize];

        if self.prev_sibling[s as usize] != INVALID {
            self.next_sibling[self.prev_sibling[s as usize] as usize] = c;
        } else {
            // `sibling` was the first child.
            self.first_child[p as usize] = c;
        }
        self.prev_sibling[s as usize] = c;

        let _ = self.dirty.add_dependency(c, p, dirty::GEOMETRY);
        let _ = self.dirty.add_dependency(c, p, dirty::EFFECTS);

        self.mark_subtree_inherited_dirty(c);
        self.needs_update = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Returns the parent of a layer, if any.
    #[must_use]
    pub fn parent(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.parent[id.idx as usize])
    }

    /// Returns an iterator over the direct children of a layer.
    #[must_use]
    pub fn children(&self, id: LayerId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the root layers (those with no parent).
    #[must_use]
    pub fn roots(&self) -> Vec<LayerId> {
        let mut roots = Vec::new();
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID && !self.free_list.contains(&idx) {
                roots.push(LayerId {
                    idx,
                    generation: self.generation[idx as usize],
                });
            }
        }
        roots
    }

    /// Returns `true` if `ancestor` is `id` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: LayerId, id: LayerId) -> bool {
        self.validate(ancestor);
        self.validate(id);
        self.has_ancestor_or_self(id.idx, ancestor.idx)
    }

    // -- Property getters (read-only, no dirty marking) --

    /// Returns the layer's bounds.
    #[must_use]
    pub fn bounds(&self, id: LayerId) -> Size {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns the layer's position in its parent's space.
    #[must_use]
    pub fn position(&self, id: LayerId) -> Point {
        self.validate(id);
        self.position[id.idx as usize]
    }

    /// Returns the local transform of a layer.
    #[must_use]
    pub fn local_transform(&self, id: LayerId) -> Transform3d {
        self.validate(id);
        self.local_transform[id.idx as usize]
    }

    /// Returns the point the local transform is applied about.
    #[must_use]
    pub fn transform_origin(&self, id: LayerId) -> [f64; 3] {
        self.validate(id);
        self.transform_origin[id.idx as usize]
    }

    /// Returns the 3D sorting context id (`0` when not 3D sorted).
    #[must_use]
    pub fn sorting_context_id(&self, id: LayerId) -> i32 {
        self.validate(id);
        self.sorting_context_id[id.idx as usize]
    }

    /// Returns the opacity of a layer.
    #[must_use]
    pub fn opacity(&self, id: LayerId) -> f32 {
        self.validate(id);
        self.opacity[id.idx as usize]
    }

    /// Returns the blend mode of a layer.
    #[must_use]
    pub fn blend_mode(&self, id: LayerId) -> BlendMode {
        self.validate(id);
        self.blend_mode[id.idx as usize]
    }

    /// Returns the filter list of a layer.
    #[must_use]
    pub fn filters(&self, id: LayerId) -> &[FilterOperation] {
        self.validate(id);
        &self.filters[id.idx as usize]
    }

    /// Returns the background-filter list of a layer.
    #[must_use]
    pub fn background_filters(&self, id: LayerId) -> &[FilterOperation] {
        self.validate(id);
        &self.background_filters[id.idx as usize]
    }

    /// Returns the flags of a layer.
    #[must_use]
    pub fn flags(&self, id: LayerId) -> LayerFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the animation state of a layer.
    #[must_use]
    pub fn animation(&self, id: LayerId) -> AnimationState {
        self.validate(id);
        self.animation[id.idx as usize]
    }

    /// Returns the scroll offset of a layer.
    #[must_use]
    pub fn scroll_offset(&self, id: LayerId) -> Vec2 {
        self.validate(id);
        self.scroll_offset[id.idx as usize]
    }

    /// Returns the sub-pixel scroll compensation adjustment of a layer.
    #[must_use]
    pub fn scroll_compensation_adjustment(&self, id: LayerId) -> Vec2 {
        self.validate(id);
        self.scroll_compensation_adjustment[id.idx as usize]
    }

    /// Returns the layer bounding this layer's scrolling, if it scrolls.
    #[must_use]
    pub fn scroll_clip(&self, id: LayerId) -> Option<LayerId> {
        self.validate(id);
        self.handle(self.scroll_clip[id.idx as usize])
    }

    /// Returns `true` if the layer has a scroll clip layer.
    #[must_use]
    pub fn is_scrollable(&self, id: LayerId) -> bool {
        self.validate(id);
        self.scroll_clip[id.idx as usize] != INVALID
    }

    /// Returns how much this fixed-position container changed size.
    #[must_use]
    pub fn fixed_container_size_delta(&self, id: LayerId) -> Vec2 {
        self.validate(id);
        self.fixed_container_size_delta[id.idx as usize]
    }

    /// Returns the fixed-position constraint of a layer.
    #[must_use]
    pub fn position_constraint(&self, id: LayerId) -> PositionConstraint {
        self.validate(id);
        self.position_constraint[id.idx as usize]
    }

    /// Returns the touch-handler region in layer space.
    #[must_use]
    pub fn touch_region(&self, id: LayerId) -> Rect {
        self.validate(id);
        self.touch_region[id.idx as usize]
    }

    /// Returns the number of pending copy requests.
    #[must_use]
    pub fn copy_request_count(&self, id: LayerId) -> u32 {
        self.validate(id);
        self.copy_requests[id.idx as usize]
    }

    // -- Mutation API (auto-marks dirty) --

    /// Sets the layer's bounds.
    pub fn set_bounds(&mut self, id: LayerId, bounds: Size) {
        self.validate(id);
        self.bounds[id.idx as usize] = bounds;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the layer's position in its parent's space.
    pub fn set_position(&mut self, id: LayerId, position: Point) {
        self.validate(id);
        self.position[id.idx as usize] = position;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the local transform of a layer.
    ///
    /// Marks the GEOMETRY channel dirty with eager propagation to descendants.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform3d) {
        self.validate(id);
        self.local_transform[id.idx as usize] = transform;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the point the local transform is applied about.
    pub fn set_transform_origin(&mut self, id: LayerId, origin: [f64; 3]) {
        self.validate(id);
        self.transform_origin[id.idx as usize] = origin;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the 3D sorting context id (`0` = not 3D sorted).
    pub fn set_sorting_context_id(&mut self, id: LayerId, context: i32) {
        self.validate(id);
        self.sorting_context_id[id.idx as usize] = context;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the opacity of a layer.
    ///
    /// Marks the EFFECTS channel dirty with eager propagation to descendants.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) {
        self.validate(id);
        self.opacity[id.idx as usize] = opacity;
        self.touch(id.idx, dirty::EFFECTS, true);
    }

    /// Sets the blend mode of a layer.
    pub fn set_blend_mode(&mut self, id: LayerId, mode: BlendMode) {
        self.validate(id);
        self.blend_mode[id.idx as usize] = mode;
        self.touch(id.idx, dirty::EFFECTS, true);
    }

    /// Replaces the filter list of a layer.
    pub fn set_filters(&mut self, id: LayerId, filters: Vec<FilterOperation>) {
        self.validate(id);
        self.filters[id.idx as usize] = filters;
        self.touch(id.idx, dirty::EFFECTS, true);
    }

    /// Replaces the background-filter list of a layer.
    pub fn set_background_filters(&mut self, id: LayerId, filters: Vec<FilterOperation>) {
        self.validate(id);
        self.background_filters[id.idx as usize] = filters;
        self.touch(id.idx, dirty::EFFECTS, true);
    }

    /// Sets the flags of a layer.
    ///
    /// Flags affect both geometry (flattening, fixed containers) and effects
    /// (visibility, surfaces), so both channels are marked.
    pub fn set_flags(&mut self, id: LayerId, flags: LayerFlags) {
        self.validate(id);
        self.flags[id.idx as usize] = flags;
        self.mark_subtree_inherited_dirty(id.idx);
        self.needs_update = true;
    }

    /// Sets the animation state resolved by the animation system.
    pub fn set_animation(&mut self, id: LayerId, animation: AnimationState) {
        self.validate(id);
        self.animation[id.idx as usize] = animation;
        self.mark_subtree_inherited_dirty(id.idx);
        self.needs_update = true;
    }

    /// Sets the scroll offset of a layer.
    pub fn set_scroll_offset(&mut self, id: LayerId, offset: Vec2) {
        self.validate(id);
        self.scroll_offset[id.idx as usize] = offset;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the sub-pixel scroll compensation adjustment of a layer.
    pub fn set_scroll_compensation_adjustment(&mut self, id: LayerId, adjustment: Vec2) {
        self.validate(id);
        self.scroll_compensation_adjustment[id.idx as usize] = adjustment;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the layer bounding this layer's scrolling; `Some` makes the
    /// layer scrollable.
    pub fn set_scroll_clip(&mut self, id: LayerId, clip: Option<LayerId>) {
        self.validate(id);
        let clip = clip.map_or(INVALID, |c| {
            self.validate(c);
            c.idx
        });
        self.scroll_clip[id.idx as usize] = clip;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets how much this fixed-position container changed size.
    pub fn set_fixed_container_size_delta(&mut self, id: LayerId, delta: Vec2) {
        self.validate(id);
        self.fixed_container_size_delta[id.idx as usize] = delta;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the fixed-position constraint of a layer.
    pub fn set_position_constraint(&mut self, id: LayerId, constraint: PositionConstraint) {
        self.validate(id);
        self.position_constraint[id.idx as usize] = constraint;
        self.touch(id.idx, dirty::GEOMETRY, true);
    }

    /// Sets the touch-handler region in layer space.
    pub fn set_touch_region(&mut self, id: LayerId, region: Rect) {
        self.validate(id);
        self.touch_region[id.idx as usize] = region;
        self.touch(id.idx, dirty::EFFECTS, false);
    }

    /// Adds a pending copy (readback) request.
    pub fn request_copy(&mut self, id: LayerId) {
        self.validate(id);
        self.copy_requests[id.idx as usize] += 1;
        self.touch(id.idx, dirty::EFFECTS, false);
    }

    /// Takes all pending copy requests, returning how many there were.
    pub fn take_copy_requests(&mut self, id: LayerId) -> u32 {
        self.validate(id);
        let count = core::mem::take(&mut self.copy_requests[id.idx as usize]);
        if count > 0 {
            self.touch(id.idx, dirty::EFFECTS, false);
        }
        count
    }

    // -- Internal helpers --

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: LayerId) {
        assert!(
            id.idx < self.len && self.generation[id.idx as usize] == id.generation,
            "stale LayerId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Converts a raw index field into a handle.
    pub(crate) fn handle(&self, idx: u32) -> Option<LayerId> {
        (idx != INVALID).then(|| LayerId {
            idx,
            generation: self.generation[idx as usize],
        })
    }

    /// Returns `true` if `ancestor` is `idx` or one of its ancestors.
    pub(crate) fn has_ancestor_or_self(&self, mut idx: u32, ancestor: u32) -> bool {
        while idx != INVALID {
            if idx == ancestor {
                return true;
            }
            idx = self.parent[idx as usize];
        }
        false
    }

    /// Marks `channel` for `idx` and flags the store for recomputation.
    pub(crate) fn touch(&mut self, idx: u32, channel: Channel, propagate: bool) {
        if propagate {
            self.dirty.mark_with(idx, channel, &EagerPolicy);
        } else {
            self.dirty.mark(idx, channel);
        }
        self.needs_update = true;
    }

    /// Appends `c` to `p`'s child list and wires up dirty dependencies.
    fn link_last_child(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        // Child depends on parent for inherited channels.
        let _ = self.dirty.add_dependency(c, p, dirty::GEOMETRY);
        let _ = self.dirty.add_dependency(c, p, dirty::EFFECTS);

        self.mark_subtree_inherited_dirty(c);
        self.needs_update = true;
        self.dirty.mark(p, dirty::TOPOLOGY);
    }

    /// Removes `idx` from its parent's child list without touching dirty state.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }

        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;
    }

    /// Marks the subtree rooted at `idx` dirty for inherited channels.
    fn mark_subtree_inherited_dirty(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::GEOMETRY, &EagerPolicy);
        self.dirty.mark_with(idx, dirty::EFFECTS, &EagerPolicy);
    }
}
