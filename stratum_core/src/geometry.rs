// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle helpers for draw-property computation.
//!
//! Clip, visible, drawable-content and surface content rectangles are kept on
//! the integer pixel grid: every rectangle produced here is either empty
//! ([`Rect::ZERO`]) or has integer edges. Mapping through a transform that
//! places part of a rectangle behind the viewer clips the mapped quad against
//! the `w = ε` plane in homogeneous space before taking the bounding box, so
//! results never contain NaN.

use kurbo::Rect;
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use crate::transform::Transform3d;

/// Homogeneous `w` that mapped points are clipped to.
const CLIP_W: f64 = 0.00001;

/// Largest magnitude an integer rectangle edge may have.
const MAX_COORD: f64 = i32::MAX as f64;

/// Returns `true` if `r` has no area.
#[inline]
#[must_use]
pub fn is_empty(r: Rect) -> bool {
    !(r.width() > 0.0 && r.height() > 0.0)
}

/// Intersection of two rectangles, or [`Rect::ZERO`] if they do not overlap.
#[must_use]
pub fn intersect(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if is_empty(r) { Rect::ZERO } else { r }
}

/// Smallest rectangle containing both inputs; empty inputs are ignored.
#[must_use]
pub fn union(a: Rect, b: Rect) -> Rect {
    match (is_empty(a), is_empty(b)) {
        (true, true) => Rect::ZERO,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.union(b),
    }
}

/// Returns `true` if `inner` lies entirely within `outer`.
///
/// An empty `inner` is contained in everything.
#[must_use]
pub fn contains(outer: Rect, inner: Rect) -> bool {
    if is_empty(inner) {
        return true;
    }
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Smallest integer rectangle containing `r`.
#[must_use]
pub fn enclosing(r: Rect) -> Rect {
    if is_empty(r) || r.x0.is_nan() || r.y0.is_nan() || r.x1.is_nan() || r.y1.is_nan() {
        return Rect::ZERO;
    }
    let out = Rect::new(
        r.x0.floor().clamp(-MAX_COORD, MAX_COORD),
        r.y0.floor().clamp(-MAX_COORD, MAX_COORD),
        r.x1.ceil().clamp(-MAX_COORD, MAX_COORD),
        r.y1.ceil().clamp(-MAX_COORD, MAX_COORD),
    );
    if is_empty(out) { Rect::ZERO } else { out }
}

/// Largest integer rectangle contained in `r`.
#[must_use]
pub fn enclosed(r: Rect) -> Rect {
    if is_empty(r) || r.x0.is_nan() || r.y0.is_nan() || r.x1.is_nan() || r.y1.is_nan() {
        return Rect::ZERO;
    }
    let out = Rect::new(
        r.x0.ceil().clamp(-MAX_COORD, MAX_COORD),
        r.y0.ceil().clamp(-MAX_COORD, MAX_COORD),
        r.x1.floor().clamp(-MAX_COORD, MAX_COORD),
        r.y1.floor().clamp(-MAX_COORD, MAX_COORD),
    );
    if is_empty(out) { Rect::ZERO } else { out }
}

/// Offsets `r` by `(dx, dy)` and rounds outward to the pixel grid.
#[must_use]
pub fn offset_enclosing(r: Rect, dx: f64, dy: f64) -> Rect {
    if is_empty(r) {
        return Rect::ZERO;
    }
    enclosing(r + kurbo::Vec2::new(dx, dy))
}

/// Maps `r` through `t`, clipping against the viewer plane, and returns the
/// bounding box of the result (not rounded).
#[must_use]
pub fn map_clipped_rect(t: &Transform3d, r: Rect) -> Rect {
    if t.is_identity_or_translation() {
        return r + t.translation_2d();
    }
    let h = [
        t.map_homogeneous(r.x0, r.y0, 0.0),
        t.map_homogeneous(r.x1, r.y0, 0.0),
        t.map_homogeneous(r.x1, r.y1, 0.0),
        t.map_homogeneous(r.x0, r.y1, 0.0),
    ];
    enclosing_clipped_bounds(&h)
}

/// Projects `r` along the z axis onto the destination plane of `t`, clipping
/// against the viewer plane, and returns the bounding box (not rounded).
#[must_use]
pub fn project_clipped_rect(t: &Transform3d, r: Rect) -> Rect {
    if t.is_identity_or_translation() {
        return r + t.translation_2d();
    }
    let h = [
        t.project_homogeneous(r.x0, r.y0),
        t.project_homogeneous(r.x1, r.y0),
        t.project_homogeneous(r.x1, r.y1),
        t.project_homogeneous(r.x0, r.y1),
    ];
    enclosing_clipped_bounds(&h)
}

/// [`map_clipped_rect`] rounded outward to the pixel grid.
#[must_use]
pub fn map_enclosing_clipped_rect(t: &Transform3d, r: Rect) -> Rect {
    if t.is_identity_or_integer_translation() {
        let d = t.translation_2d();
        return offset_enclosing(r, d.x, d.y);
    }
    enclosing(map_clipped_rect(t, r))
}

/// [`project_clipped_rect`] rounded outward to the pixel grid.
#[must_use]
pub fn project_enclosing_clipped_rect(t: &Transform3d, r: Rect) -> Rect {
    if t.is_identity_or_integer_translation() {
        let d = t.translation_2d();
        return offset_enclosing(r, d.x, d.y);
    }
    enclosing(project_clipped_rect(t, r))
}

/// The part of `layer_bounds` (layer space) that is visible through
/// `target_rect` (target space), given the layer's draw `transform`.
///
/// `layer_in_target` is `layer_bounds` already mapped into target space. When
/// the transform cannot be inverted the whole layer is reported visible.
#[must_use]
pub fn visible_rect_with_cached_layer_rect(
    target_rect: Rect,
    layer_bounds: Rect,
    layer_in_target: Rect,
    transform: &Transform3d,
) -> Rect {
    if is_empty(layer_in_target) {
        return Rect::ZERO;
    }
    if contains(target_rect, layer_in_target) {
        return layer_bounds;
    }
    // Only project the part of the target rect the layer can cover; this keeps
    // the projected corners away from the viewer plane.
    let minimal = intersect(target_rect, layer_in_target);
    if is_empty(minimal) {
        return Rect::ZERO;
    }
    let Some(target_to_layer) = transform.inverse() else {
        return layer_bounds;
    };
    intersect(
        project_enclosing_clipped_rect(&target_to_layer, minimal),
        layer_bounds,
    )
}

/// Like [`visible_rect_with_cached_layer_rect`], mapping `layer_bounds` first.
#[must_use]
pub fn visible_rect(target_rect: Rect, layer_bounds: Rect, transform: &Transform3d) -> Rect {
    let layer_in_target = map_enclosing_clipped_rect(transform, layer_bounds);
    visible_rect_with_cached_layer_rect(target_rect, layer_bounds, layer_in_target, transform)
}

fn clipped(h: &[f64; 4]) -> bool {
    h[3] <= 0.0
}

fn cartesian(h: &[f64; 4]) -> (f64, f64) {
    if h[3] == 1.0 {
        (h[0], h[1])
    } else {
        let inv_w = 1.0 / h[3];
        (h[0] * inv_w, h[1] * inv_w)
    }
}

/// Point on the segment `h1`–`h2` whose `w` equals [`CLIP_W`].
fn clipped_point_for_edge(h1: &[f64; 4], h2: &[f64; 4]) -> [f64; 4] {
    let t = (CLIP_W - h1[3]) / (h2[3] - h1[3]);
    let lerp = |a: f64, b: f64| (1.0 - t) * a + t * b;
    [lerp(h1[0], h2[0]), lerp(h1[1], h2[1]), lerp(h1[2], h2[2]), CLIP_W]
}

fn enclosing_clipped_bounds(h: &[[f64; 4]; 4]) -> Rect {
    if h.iter().all(clipped) {
        return Rect::ZERO;
    }
    let mut bounds: Option<Rect> = None;
    let mut include = |(x, y): (f64, f64)| {
        if x.is_nan() || y.is_nan() {
            return;
        }
        let (x, y) = (x.clamp(-MAX_COORD, MAX_COORD), y.clamp(-MAX_COORD, MAX_COORD));
        bounds = Some(match bounds {
            Some(b) => Rect::new(b.x0.min(x), b.y0.min(y), b.x1.max(x), b.y1.max(y)),
            None => Rect::new(x, y, x, y),
        });
    };
    for i in 0..4 {
        let (a, b) = (&h[i], &h[(i + 1) % 4]);
        if !clipped(a) {
            include(cartesian(a));
        }
        if clipped(a) != clipped(b) {
            include(cartesian(&clipped_point_for_edge(a, b)));
        }
    }
    bounds.unwrap_or(Rect::ZERO)
}
