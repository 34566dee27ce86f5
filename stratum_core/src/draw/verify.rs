// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-checks a completed pass against an independent recomputation.
//!
//! The reference composes each layer's local transform up its parent chain
//! directly, instead of carrying matrices down the walk, and derives draw
//! transforms, draw opacities, clips, drawable content rects, surface
//! content rects and visible rects from that. Clips are rebuilt from the
//! bounds of the clipping layers between a layer and its render target,
//! following clip parents. Layers are checked only if they appear in some
//! surface's layer list.
//!
//! Differences within the tolerances below are expected: the walk snaps
//! scrolled layers to whole pixels and rounds rectangles outward. Visible
//! rects and surface content rects are only checked for containment, since
//! the walk may keep a conservatively larger rect.

use alloc::vec::Vec;

use kurbo::{Point, Rect, Vec2};

use super::config::DrawConfig;
use super::surface;
use crate::geometry;
use crate::layer::{INVALID, LayerId, LayerStore};
use crate::transform::Transform3d;

/// Tolerance for translation entries and rectangle edges, in device pixels.
pub const TRANSLATION_TOLERANCE: f64 = 1.0;

/// Tolerance for the other transform entries.
pub const MATRIX_TOLERANCE: f64 = 0.1;

/// Tolerance for draw opacities.
pub const OPACITY_TOLERANCE: f64 = 0.001;

/// The output a [`Mismatch`] concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerifiedProperty {
    /// [`DrawProperties::screen_space_transform`](super::DrawProperties::screen_space_transform).
    ScreenSpaceTransform,
    /// [`DrawProperties::target_space_transform`](super::DrawProperties::target_space_transform).
    DrawTransform,
    /// [`DrawProperties::opacity`](super::DrawProperties::opacity).
    DrawOpacity,
    /// [`RenderSurface::draw_opacity`](super::RenderSurface::draw_opacity).
    SurfaceOpacity,
    /// [`DrawProperties::visible_layer_rect`](super::DrawProperties::visible_layer_rect)
    /// misses part of what is visible.
    VisibleLayerRect,
    /// [`DrawProperties::clip_rect`](super::DrawProperties::clip_rect) or
    /// [`DrawProperties::is_clipped`](super::DrawProperties::is_clipped).
    ClipRect,
    /// [`DrawProperties::drawable_content_rect`](super::DrawProperties::drawable_content_rect).
    DrawableContentRect,
    /// [`RenderSurface::content_rect`](super::RenderSurface::content_rect)
    /// misses part of a layer drawn into the surface.
    ContentRect,
}

/// One disagreement beyond tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mismatch {
    /// Slot index of the layer.
    pub layer: u32,
    /// Which output disagrees.
    pub property: VerifiedProperty,
    /// Largest deviation found. Infinite when the layer is clipped on one
    /// side only.
    pub deviation: f64,
}

/// A layer's clip in its render target's space, as rebuilt by the
/// reference.
#[derive(Clone, Copy, Debug, PartialEq)]
enum ExpectedClip {
    Unclipped,
    Clipped(Rect),
}

/// Recomputes the main outputs of the last pass over `root` and returns
/// every disagreement.
///
/// # Panics
///
/// Panics if `root` is stale.
#[must_use]
pub fn verify_draw_properties(
    store: &LayerStore,
    root: LayerId,
    config: &DrawConfig,
) -> Vec<Mismatch> {
    store.validate(root);
    let reference = Reference::new(store, root.idx, config);
    let generation = store.pass_generation;
    let mut mismatches = Vec::new();

    for owner in 0..store.len {
        let o = owner as usize;
        if store.visited[o] != generation || !store.draw[o].has_render_surface {
            continue;
        }
        for &layer in &store.surface[o].layer_list {
            if layer != owner && store.draw[layer as usize].render_target == layer {
                reference.check_surface(layer, &mut mismatches);
            } else {
                reference.check_layer(layer, &mut mismatches);
            }
        }
    }
    mismatches
}

struct Reference<'a> {
    store: &'a LayerStore,
    root: u32,
    config: &'a DrawConfig,
    page_scale_layer: u32,
    elastic_overscroll_layer: u32,
    inner_viewport_container: u32,
    outer_viewport_container: u32,
}

impl<'a> Reference<'a> {
    fn new(store: &'a LayerStore, root: u32, config: &'a DrawConfig) -> Self {
        let container = |layer: Option<LayerId>| {
            layer.map_or(INVALID, |l| store.parent[l.idx as usize])
        };
        Self {
            store,
            root,
            config,
            page_scale_layer: DrawConfig::slot(config.page_scale_layer),
            elastic_overscroll_layer: DrawConfig::slot(config.elastic_overscroll_layer),
            inner_viewport_container: container(config.inner_viewport_scroll_layer),
            outer_viewport_container: container(config.outer_viewport_scroll_layer),
        }
    }

    fn check_layer(&self, layer: u32, out: &mut Vec<Mismatch>) {
        let Some(screen) = self.screen_space_transform(layer) else {
            return;
        };
        let l = layer as usize;
        let props = &self.store.draw[l];
        compare_transforms(
            layer,
            VerifiedProperty::ScreenSpaceTransform,
            &props.screen_space_transform,
            &screen,
            out,
        );

        let target = props.render_target;
        let owns_surface = layer == target && layer != self.root;
        if !owns_surface && let Some(expected_draw) = self.draw_transform(layer, &screen) {
            compare_transforms(
                layer,
                VerifiedProperty::DrawTransform,
                &props.target_space_transform,
                &expected_draw,
                out,
            );
        }

        if let Some(expected_clip) = self.expected_clip(layer) {
            let deviation = match expected_clip {
                ExpectedClip::Unclipped if props.is_clipped => f64::INFINITY,
                ExpectedClip::Clipped(_) if !props.is_clipped => f64::INFINITY,
                ExpectedClip::Unclipped => 0.0,
                ExpectedClip::Clipped(rect) => rect_deviation(props.clip_rect, rect),
            };
            if deviation > TRANSLATION_TOLERANCE {
                out.push(Mismatch {
                    layer,
                    property: VerifiedProperty::ClipRect,
                    deviation,
                });
            }
        }

        if let Some(expected) = self.drawable_content_rect(layer, &screen) {
            let deviation = rect_deviation(props.drawable_content_rect, expected);
            if deviation > TRANSLATION_TOLERANCE {
                out.push(Mismatch {
                    layer,
                    property: VerifiedProperty::DrawableContentRect,
                    deviation,
                });
            }
        }

        let expected_opacity = if layer == target {
            1.0
        } else {
            self.opacity_up_to(layer, target)
        };
        compare_opacity(
            layer,
            VerifiedProperty::DrawOpacity,
            props.opacity,
            expected_opacity,
            out,
        );

        if let Some(expected) = self.visible_layer_rect(layer, &screen) {
            let actual = props.visible_layer_rect;
            let overshoot = overshoot(actual, expected);
            if geometry::is_empty(actual) || overshoot > TRANSLATION_TOLERANCE {
                out.push(Mismatch {
                    layer,
                    property: VerifiedProperty::VisibleLayerRect,
                    deviation: overshoot.max(expected.width().max(expected.height())),
                });
            }
        }
    }

    /// Checks a contributing child surface: its owner's screen transform, the
    /// surface's opacity and that its content rect covers every layer drawn
    /// into it.
    fn check_surface(&self, owner: u32, out: &mut Vec<Mismatch>) {
        let o = owner as usize;
        if let Some(screen) = self.screen_space_transform(owner) {
            compare_transforms(
                owner,
                VerifiedProperty::ScreenSpaceTransform,
                &self.store.draw[o].screen_space_transform,
                &screen,
                out,
            );
        }
        self.check_content_rect(owner, out);
        let parent = self.store.parent[o];
        if parent == INVALID {
            return;
        }
        let target = self.store.draw[parent as usize].render_target;
        compare_opacity(
            owner,
            VerifiedProperty::SurfaceOpacity,
            self.store.surface[o].draw_opacity,
            self.opacity_up_to(owner, target),
            out,
        );
    }

    /// Surfaces clipped by their target or limited by the texture size may
    /// legitimately cut their layers off, and are not checked.
    fn check_content_rect(&self, owner: u32, out: &mut Vec<Mismatch>) {
        let s = &self.store.surface[owner as usize];
        let max = f64::from(self.config.max_texture_size);
        if s.is_clipped || s.content_rect.width() >= max || s.content_rect.height() >= max {
            return;
        }
        for &layer in &s.layer_list {
            let l = layer as usize;
            if layer == owner || self.store.draw[l].render_target == layer {
                continue;
            }
            let Some(screen) = self.screen_space_transform(layer) else {
                continue;
            };
            let Some(drawable) = self.drawable_content_rect(layer, &screen) else {
                continue;
            };
            if geometry::is_empty(drawable) {
                continue;
            }
            let overshoot = overshoot(s.content_rect, drawable);
            if overshoot > TRANSLATION_TOLERANCE {
                out.push(Mismatch {
                    layer: owner,
                    property: VerifiedProperty::ContentRect,
                    deviation: overshoot,
                });
            }
        }
    }

    /// Layer space to target space, from the screen transforms of the layer
    /// and of its target surface.
    fn draw_transform(&self, layer: u32, screen: &Transform3d) -> Option<Transform3d> {
        let target = self.store.draw[layer as usize].render_target;
        let screen_to_target = self
            .surface_screen_space_transform(target)?
            .flattened()
            .inverse()?;
        Some(screen_to_target * *screen)
    }

    /// Clip of a layer that does not own its target, rebuilt from the
    /// clipping layers on its clip chain up to and including the target.
    ///
    /// Returns `None` when the chain leaves axis alignment, involves a scroll
    /// parent, jumps over the target through a clip parent, or when the
    /// target has unclipped descendants (the surface clip then moves onto
    /// layers).
    fn expected_clip(&self, layer: u32) -> Option<ExpectedClip> {
        let target = self.store.draw[layer as usize].render_target;
        if target == INVALID
            || target == layer
            || self.store.draw[target as usize].num_unclipped_descendants > 0
        {
            return None;
        }

        let mut clip: Option<Rect> = None;
        let mut current = layer;
        loop {
            let c = current as usize;
            if self.store.scroll_parent[c] != INVALID {
                return None;
            }
            if surface::clips_subtree(self.store, current) {
                let screen = self.screen_space_transform(current)?;
                if !screen.is_scale_or_translation() {
                    return None;
                }
                let bounds = Rect::from_origin_size(Point::ORIGIN, self.store.bounds[c]);
                let rect = geometry::map_clipped_rect(&screen, bounds);
                clip = Some(clip.map_or(rect, |r| geometry::intersect(r, rect)));
            }
            if current == target {
                break;
            }
            let parent = self.store.parent[c];
            let clip_parent = self.store.clip_parent[c];
            let next = if clip_parent == INVALID {
                parent
            } else {
                if parent != INVALID
                    && self.store.has_ancestor_or_self(parent, target)
                    && !self.store.has_ancestor_or_self(clip_parent, target)
                {
                    return None;
                }
                clip_parent
            };
            if next == INVALID {
                return None;
            }
            current = next;
        }

        let Some(screen_clip) = clip else {
            return Some(ExpectedClip::Unclipped);
        };
        let target_screen = self.surface_screen_space_transform(target)?.flattened();
        if !target_screen.is_scale_or_translation() {
            return None;
        }
        let to_target = target_screen.inverse()?;
        Some(ExpectedClip::Clipped(geometry::enclosing(
            geometry::map_clipped_rect(&to_target, screen_clip),
        )))
    }

    /// Bounds in target space, clipped when the layer is.
    fn drawable_content_rect(&self, layer: u32, screen: &Transform3d) -> Option<Rect> {
        let clip = self.expected_clip(layer)?;
        let draw = self.draw_transform(layer, screen)?;
        if !draw.is_scale_or_translation() {
            return None;
        }
        let bounds = Rect::from_origin_size(Point::ORIGIN, self.store.bounds[layer as usize]);
        let rect = geometry::enclosing(geometry::map_clipped_rect(&draw, bounds));
        Some(match clip {
            ExpectedClip::Unclipped => rect,
            ExpectedClip::Clipped(clip) => geometry::intersect(rect, clip),
        })
    }

    /// Product of opacities from `layer` up to, not including, `target`.
    fn opacity_up_to(&self, layer: u32, target: u32) -> f64 {
        let mut opacity = 1.0;
        let mut current = layer;
        while current != INVALID && current != target {
            opacity *= f64::from(self.store.opacity[current as usize]);
            current = self.store.parent[current as usize];
        }
        opacity
    }

    fn is_fixed_container(&self, idx: u32) -> bool {
        idx == self.root
            || self.store.flags[idx as usize].is_container_for_fixed_position
            || idx == self.inner_viewport_container
            || idx == self.outer_viewport_container
    }

    /// Scroll applied to a layer's position, following scroll parents.
    fn scroll(&self, idx: u32) -> Vec2 {
        let mut total = Vec2::ZERO;
        let mut current = idx;
        for _ in 0..self.store.len {
            if current == INVALID {
                break;
            }
            let c = current as usize;
            total += self.store.scroll_offset[c] - self.store.scroll_compensation_adjustment[c];
            current = self.store.scroll_parent[c];
        }
        total
    }

    fn local_to_parent(&self, idx: u32, scroll: Vec2) -> Transform3d {
        let i = idx as usize;
        let position = self.store.position[i] - scroll;
        let origin = self.store.transform_origin[i];
        let local = self.store.local_transform[i];
        Transform3d::from_translation(
            position.x + origin[0],
            position.y + origin[1],
            origin[2],
        ) * local
            * Transform3d::from_translation(-origin[0], -origin[1], -origin[2])
    }

    /// Layer space to screen space, composed from the root down.
    ///
    /// Returns `None` for layers below more than one fixed-position layer,
    /// whose placement depends on nested compensation.
    fn screen_space_transform(&self, idx: u32) -> Option<Transform3d> {
        let mut chain = Vec::new();
        let mut current = idx;
        while current != INVALID {
            chain.push(current);
            if current == self.root {
                break;
            }
            current = self.store.parent[current as usize];
        }
        chain.reverse();

        let mut fixed = chain
            .iter()
            .enumerate()
            .filter(|&(_, &l)| self.store.position_constraint[l as usize].is_fixed_position)
            .map(|(pos, _)| pos);
        let fixed_at = fixed.next();
        if fixed.next().is_some() {
            return None;
        }
        // Ancestors from the fixed layer's container down to its parent do
        // not move it when they scroll.
        let unscrolled = fixed_at.map(|f| {
            let container = (0..f)
                .rev()
                .find(|&p| self.is_fixed_container(chain[p]))
                .unwrap_or(0);
            container..f
        });

        let dsf = self.config.device_scale_factor;
        let mut m = self.config.device_transform * Transform3d::from_scale(dsf, dsf, 1.0);
        for (pos, &layer) in chain.iter().enumerate() {
            let scroll = if unscrolled.as_ref().is_some_and(|r| r.contains(&pos)) {
                Vec2::ZERO
            } else {
                self.scroll(layer)
            };
            m = m * self.local_to_parent(layer, scroll);
            if fixed_at == Some(pos) {
                m = m * self.anchoring_translation(&chain, pos);
            }
            if layer == idx {
                break;
            }

            if layer == self.page_scale_layer {
                let s = self.config.page_scale_factor;
                m = m * Transform3d::from_scale(s, s, 1.0);
            }
            if layer == self.elastic_overscroll_layer {
                let o = self.config.elastic_overscroll;
                m = m * Transform3d::from_translation(-o.x, -o.y, 0.0);
            }
            let l = layer as usize;
            let owns_surface = layer != self.root && self.store.draw[l].has_render_surface;
            if self.store.flags[l].should_flatten_transform || owns_surface {
                m = m.flattened();
            }
        }
        Some(m)
    }

    /// Translation following the container's size change for a fixed layer
    /// anchored to its right or bottom edge.
    fn anchoring_translation(&self, chain: &[u32], fixed_at: usize) -> Transform3d {
        let constraint = self.store.position_constraint[chain[fixed_at] as usize];
        let container = (0..fixed_at)
            .rev()
            .map(|p| chain[p])
            .find(|&l| self.is_fixed_container(l))
            .unwrap_or(self.root);
        let delta = self.store.fixed_container_size_delta[container as usize];
        Transform3d::from_translation(
            if constraint.anchored_right { delta.x } else { 0.0 },
            if constraint.anchored_bottom { delta.y } else { 0.0 },
            0.0,
        )
    }

    fn surface_screen_space_transform(&self, owner: u32) -> Option<Transform3d> {
        if owner == self.root {
            return Some(Transform3d::IDENTITY);
        }
        let screen = self.screen_space_transform(owner)?;
        let scale = self.store.surface[owner as usize].sublayer_scale;
        Some(screen.pre_scale(1.0 / scale.x, 1.0 / scale.y, 1.0))
    }

    /// The part of the layer that is provably visible on screen, for layers
    /// whose screen transform and clipping ancestors stay axis aligned and
    /// that have no scroll parent in their ancestry.
    fn visible_layer_rect(&self, idx: u32, screen: &Transform3d) -> Option<Rect> {
        let i = idx as usize;
        if !self.store.flags[i].draws_content || !screen.is_scale_or_translation() {
            return None;
        }
        let bounds = Rect::from_origin_size(Point::ORIGIN, self.store.bounds[i]);
        let mut visible = geometry::intersect(
            geometry::map_clipped_rect(screen, bounds),
            Rect::from_origin_size(Point::ORIGIN, self.config.viewport),
        );

        // Scroll children take their clip from outside their ancestry.
        if self.store.scroll_parent[i] != INVALID {
            return None;
        }
        let mut ancestor = self.store.parent[i];
        while ancestor != INVALID {
            if self.store.scroll_parent[ancestor as usize] != INVALID {
                return None;
            }
            if surface::clips_subtree(self.store, ancestor) {
                let ancestor_screen = self.screen_space_transform(ancestor)?;
                if !ancestor_screen.is_scale_or_translation() {
                    return None;
                }
                let ancestor_bounds =
                    Rect::from_origin_size(Point::ORIGIN, self.store.bounds[ancestor as usize]);
                visible = geometry::intersect(
                    visible,
                    geometry::map_clipped_rect(&ancestor_screen, ancestor_bounds),
                );
            }
            if ancestor == self.root {
                break;
            }
            ancestor = self.store.parent[ancestor as usize];
        }

        let to_layer = screen.inverse()?;
        let expected = geometry::intersect(geometry::map_clipped_rect(&to_layer, visible), bounds);
        (!geometry::is_empty(expected)).then_some(expected)
    }
}

/// How far `inner` reaches outside `outer`.
fn overshoot(outer: Rect, inner: Rect) -> f64 {
    [
        outer.x0 - inner.x0,
        outer.y0 - inner.y0,
        inner.x1 - outer.x1,
        inner.y1 - outer.y1,
    ]
    .into_iter()
    .fold(0.0_f64, f64::max)
}

/// Largest difference between corresponding edges.
fn rect_deviation(actual: Rect, expected: Rect) -> f64 {
    [
        actual.x0 - expected.x0,
        actual.y0 - expected.y0,
        actual.x1 - expected.x1,
        actual.y1 - expected.y1,
    ]
    .into_iter()
    .map(f64::abs)
    .fold(0.0_f64, f64::max)
}

fn compare_transforms(
    layer: u32,
    property: VerifiedProperty,
    actual: &Transform3d,
    expected: &Transform3d,
    out: &mut Vec<Mismatch>,
) {
    let mut worst = 0.0_f64;
    let mut exceeded = false;
    for row in 0..4 {
        for col in 0..4 {
            let deviation = (actual.get(row, col) - expected.get(row, col)).abs();
            let tolerance = if col == 3 && row < 2 {
                TRANSLATION_TOLERANCE
            } else {
                MATRIX_TOLERANCE
            };
            exceeded |= deviation > tolerance || deviation.is_nan();
            worst = worst.max(deviation);
        }
    }
    if exceeded {
        out.push(Mismatch {
            layer,
            property,
            deviation: worst,
        });
    }
}

fn compare_opacity(
    layer: u32,
    property: VerifiedProperty,
    actual: f32,
    expected: f64,
    out: &mut Vec<Mismatch>,
) {
    let deviation = (f64::from(actual) - expected).abs();
    if deviation > OPACITY_TOLERANCE {
        out.push(Mismatch {
            layer,
            property,
            deviation,
        });
    }
}
