// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end tests of whole draw-property passes.

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::PI;

use kurbo::{Point, Rect, Size, Vec2};

use super::verify::verify_draw_properties;
use super::*;
use crate::error::DrawPropertiesError;
use crate::geometry;
use crate::layer::{
    AnimationState, FilterOperation, LayerFlags, LayerId, PositionConstraint, ScaleAnimation,
};
use crate::trace::Tracer;
use crate::transform::Transform3d;

const VIEWPORT: Size = Size::new(800.0, 600.0);

struct Scene {
    store: LayerStore,
    root: LayerId,
}

impl Scene {
    fn new() -> Self {
        let mut store = LayerStore::new();
        let root = store.create_layer();
        store.set_bounds(root, VIEWPORT);
        store.set_flags(root, drawing_flags());
        Self { store, root }
    }

    /// Adds a layer that draws content.
    fn add(&mut self, parent: LayerId, position: (f64, f64), size: (f64, f64)) -> LayerId {
        let id = self.add_group(parent, position, size);
        self.store.set_flags(id, drawing_flags());
        id
    }

    /// Adds a layer that draws nothing itself.
    fn add_group(&mut self, parent: LayerId, position: (f64, f64), size: (f64, f64)) -> LayerId {
        let id = self.store.create_layer();
        self.store.add_child(parent, id);
        self.store
            .set_position(id, Point::new(position.0, position.1));
        self.store.set_bounds(id, Size::new(size.0, size.1));
        id
    }

    fn update_flags(&mut self, id: LayerId, f: impl FnOnce(&mut LayerFlags)) {
        let mut flags = self.store.flags(id);
        f(&mut flags);
        self.store.set_flags(id, flags);
    }

    fn run(&mut self) -> DrawPass {
        self.run_with(&DrawConfig::new(VIEWPORT))
    }

    fn run_with(&mut self, config: &DrawConfig) -> DrawPass {
        self.store
            .calculate_draw_properties(self.root, config, &mut Tracer::none())
            .unwrap()
    }

    fn props(&self, id: LayerId) -> &DrawProperties {
        self.store.draw_properties(id)
    }

    fn surface(&self, id: LayerId) -> &RenderSurface {
        self.store
            .render_surface(id)
            .expect("layer should own a render surface")
    }

    fn list(&self, owner: LayerId) -> Vec<u32> {
        self.surface(owner).layer_list.clone()
    }
}

fn drawing_flags() -> LayerFlags {
    LayerFlags {
        draws_content: true,
        ..LayerFlags::default()
    }
}

fn idx(ids: &[LayerId]) -> Vec<u32> {
    ids.iter().map(|id| id.index()).collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_root_draws_into_viewport_sized_surface() {
    let mut scene = Scene::new();
    let pass = scene.run_with(&DrawConfig::new(VIEWPORT).with_verify(true));

    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root]));
    let surface = scene.surface(scene.root);
    assert_eq!(surface.content_rect, Rect::new(0.0, 0.0, 800.0, 600.0));
    assert_eq!(surface.layer_list, idx(&[scene.root]));
    assert!(!surface.contributes_to_drawn_surface);
    assert_eq!(scene.store.render_target(scene.root), Some(scene.root));
}

#[test]
fn transparent_child_is_pruned() {
    let mut scene = Scene::new();
    let child = scene.add(scene.root, (50.0, 50.0), (100.0, 100.0));
    scene.store.set_opacity(child, 0.0);
    let pass = scene.run();

    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root]));
    assert_eq!(scene.list(scene.root), idx(&[scene.root]));
    assert_eq!(scene.store.render_target(child), None);
    assert!(!scene.props(child).layer_or_descendant_is_drawn);
}

#[test]
fn filtered_child_accumulates_in_target_space() {
    let mut scene = Scene::new();
    let wrapper = scene.add_group(scene.root, (10.0, 10.0), (0.0, 0.0));
    scene.update_flags(wrapper, |f| f.force_render_surface = true);
    let filtered = scene.add(wrapper, (50.0, 50.0), (100.0, 100.0));
    scene
        .store
        .set_filters(filtered, vec![FilterOperation::Blur(3.0)]);
    let pass = scene.run();

    assert!(scene.props(filtered).has_render_surface);
    assert_eq!(
        pass.render_surface_layer_list,
        idx(&[scene.root, wrapper, filtered])
    );

    let own = scene.surface(filtered);
    assert_eq!(own.content_rect, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(own.draw_transform.translation_2d(), Vec2::new(50.0, 50.0));
    assert_eq!(
        own.drawable_content_rect(),
        Rect::new(50.0, 50.0, 150.0, 150.0)
    );

    // The wrapper's content is the filtered surface's footprint in the
    // wrapper's space, not the surface's own content rect.
    assert_eq!(
        scene.surface(wrapper).content_rect,
        Rect::new(50.0, 50.0, 150.0, 150.0)
    );
    assert_eq!(scene.list(wrapper), idx(&[filtered]));
    assert_eq!(scene.list(scene.root), idx(&[scene.root, wrapper]));
}

/// Builds a scroller surface at (10, 10) clipping to 100x100, its scrolled
/// contents, and a sibling `follower` whose scroll parent is the contents.
fn scroll_parent_scene(follower_first: bool) -> (Scene, LayerId, LayerId, LayerId, LayerId) {
    let mut scene = Scene::new();
    let root = scene.root;
    let mut follower = None;
    if follower_first {
        follower = Some(scene.add(root, (0.0, 0.0), (300.0, 300.0)));
    }
    let scroller = scene.add_group(root, (10.0, 10.0), (100.0, 100.0));
    scene.update_flags(scroller, |f| {
        f.masks_to_bounds = true;
        f.force_render_surface = true;
    });
    let contents = scene.add(scroller, (0.0, 0.0), (200.0, 200.0));
    let follower = follower.unwrap_or_else(|| scene.add(root, (0.0, 0.0), (300.0, 300.0)));
    let follower_child = scene.add(follower, (0.0, 0.0), (300.0, 300.0));
    scene.store.set_scroll_parent(follower, Some(contents));
    (scene, scroller, contents, follower, follower_child)
}

#[test]
fn scroll_child_takes_translated_clip_of_scroll_parent() {
    let (mut scene, scroller, contents, follower, follower_child) = scroll_parent_scene(false);
    scene.run();

    assert_eq!(scene.store.render_target(contents), Some(scroller));
    assert!(scene.props(contents).is_clipped);
    assert_eq!(
        scene.props(contents).clip_rect,
        Rect::new(0.0, 0.0, 100.0, 100.0)
    );

    // The scroller's surface sits at (10, 10) in the root target.
    let expected = Rect::new(10.0, 10.0, 110.0, 110.0);
    let f = scene.props(follower);
    assert!(f.is_clipped);
    assert_eq!(f.clip_rect, expected);
    assert_eq!(f.drawable_content_rect, expected);
    let c = scene.props(follower_child);
    assert!(c.is_clipped);
    assert_eq!(c.clip_rect, expected);
}

#[test]
fn singular_transform_removes_subtree() {
    let mut scene = Scene::new();
    let singular = scene.add(scene.root, (0.0, 0.0), (100.0, 100.0));
    let below = scene.add(singular, (0.0, 0.0), (100.0, 100.0));
    scene
        .store
        .set_transform(singular, Transform3d::from_scale(0.0, 1.0, 1.0));
    scene.store.set_filters(below, vec![FilterOperation::Grayscale(1.0)]);
    let pass = scene.run();

    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root]));
    assert_eq!(scene.list(scene.root), idx(&[scene.root]));
    assert!(!scene.props(singular).layer_or_descendant_is_drawn);
    assert_eq!(scene.store.render_target(singular), None);
    assert_eq!(scene.store.render_target(below), None);
}

#[test]
fn transparent_scroll_parent_leaves_follower_clip_alone() {
    let (mut scene, scroller, contents, follower, follower_child) = scroll_parent_scene(false);
    scene.store.set_opacity(contents, 0.0);
    let pass = scene.run();

    assert_eq!(scene.store.render_target(contents), None);
    assert_eq!(scene.store.render_target(follower), Some(scene.root));
    let f = scene.props(follower);
    assert!(!f.is_clipped);
    assert_eq!(f.drawable_content_rect, Rect::new(0.0, 0.0, 300.0, 300.0));
    assert!(!scene.props(follower_child).is_clipped);
    assert!(!pass.render_surface_layer_list.contains(&scroller.index()));
    assert_eq!(
        scene.list(scene.root),
        idx(&[scene.root, follower, follower_child])
    );
}

#[test]
fn hidden_scroll_parent_leaves_follower_clip_alone() {
    let (mut scene, _, contents, follower, follower_child) = scroll_parent_scene(false);
    scene.update_flags(contents, |f| f.hidden = true);
    scene.run();

    assert_eq!(scene.store.render_target(contents), None);
    assert!(!scene.props(follower).is_clipped);
    assert_eq!(
        scene.props(follower_child).drawable_content_rect,
        Rect::new(0.0, 0.0, 300.0, 300.0)
    );
}

#[test]
fn scroll_parent_behind_rotated_clip_is_an_error() {
    let mut scene = Scene::new();
    let root = scene.root;
    let scroller = scene.add_group(root, (100.0, 100.0), (100.0, 100.0));
    scene.update_flags(scroller, |f| f.masks_to_bounds = true);
    scene
        .store
        .set_transform(scroller, Transform3d::from_rotation_z(PI / 6.0));
    let contents = scene.add(scroller, (0.0, 0.0), (200.0, 200.0));
    let follower = scene.add(root, (0.0, 0.0), (300.0, 300.0));
    scene.store.set_scroll_parent(follower, Some(contents));

    let result =
        scene
            .store
            .calculate_draw_properties(root, &DrawConfig::new(VIEWPORT), &mut Tracer::none());
    assert_eq!(
        result.err(),
        Some(DrawPropertiesError::ClipRelationCrossesTransformedSurface {
            layer: follower.index(),
            surface: scroller.index(),
        })
    );
    // Nothing from the aborted walk is left behind.
    assert_eq!(scene.store.render_target(root), None);
    assert_eq!(scene.store.render_target(contents), None);
    assert!(!scene.props(scroller).has_render_surface);
}

#[test]
fn animated_singular_transform_keeps_full_bounds_visible() {
    let mut scene = Scene::new();
    let flat = scene.add(scene.root, (750.0, 550.0), (100.0, 100.0));
    scene
        .store
        .set_transform(flat, Transform3d::from_scale(1.0, 1.0, 0.0));
    scene.store.set_animation(
        flat,
        AnimationState {
            transform_is_animating: true,
            ..AnimationState::default()
        },
    );
    scene.run();

    let p = scene.props(flat);
    assert_eq!(scene.store.render_target(flat), Some(scene.root));
    assert!(p.layer_or_descendant_is_drawn);
    // The layer reaches past the viewport, but its draw transform cannot be
    // inverted to find the visible part.
    assert_eq!(p.visible_layer_rect, Rect::new(0.0, 0.0, 100.0, 100.0));
    assert_eq!(p.drawable_content_rect, Rect::new(750.0, 550.0, 850.0, 650.0));
    for t in [p.target_space_transform, p.screen_space_transform] {
        assert!(
            t.to_cols_array_2d().iter().flatten().all(|v| v.is_finite()),
            "{t:?}"
        );
    }
}

#[test]
fn single_surface_mode_draws_everything_into_the_root() {
    let mut scene = Scene::new();
    let group = scene.add(scene.root, (10.0, 10.0), (100.0, 100.0));
    scene.store.set_opacity(group, 0.5);
    let inner = scene.add(group, (5.0, 5.0), (20.0, 20.0));
    let filtered = scene.add(scene.root, (200.0, 200.0), (50.0, 50.0));
    scene
        .store
        .set_filters(filtered, vec![FilterOperation::Blur(2.0)]);
    let pass = scene.run_with(&DrawConfig::new(VIEWPORT).with_separate_surfaces(false));

    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root]));
    assert_eq!(
        scene.list(scene.root),
        idx(&[scene.root, group, inner, filtered])
    );
    assert!(!scene.props(group).has_render_surface);
    assert!(!scene.props(filtered).has_render_surface);
    assert_eq!(scene.store.render_target(filtered), Some(scene.root));
    // Without a group surface the opacity folds into each layer.
    assert_eq!(scene.props(inner).opacity, 0.5);
    assert_eq!(
        scene.props(inner).target_space_transform.translation_2d(),
        Vec2::new(15.0, 15.0)
    );
}

#[test]
fn elastic_overscroll_shifts_children() {
    let mut scene = Scene::new();
    let overscrolled = scene.add_group(scene.root, (0.0, 0.0), (800.0, 600.0));
    let child = scene.add(overscrolled, (10.0, 10.0), (50.0, 50.0));
    scene.run_with(
        &DrawConfig::new(VIEWPORT).with_elastic_overscroll(overscrolled, Vec2::new(0.0, -20.0)),
    );

    assert_eq!(
        scene.props(overscrolled).screen_space_transform.translation_2d(),
        Vec2::ZERO
    );
    assert_eq!(
        scene.props(child).screen_space_transform.translation_2d(),
        Vec2::new(10.0, 30.0)
    );
    assert_eq!(
        scene.props(child).drawable_content_rect,
        Rect::new(10.0, 30.0, 60.0, 80.0)
    );
}

#[test]
fn isolated_group_gets_its_own_surface() {
    let mut scene = Scene::new();
    let group = scene.add_group(scene.root, (20.0, 20.0), (100.0, 100.0));
    scene.update_flags(group, |f| f.is_root_for_isolated_group = true);
    let child = scene.add(group, (0.0, 0.0), (40.0, 40.0));
    let pass = scene.run();

    assert!(scene.props(group).has_render_surface);
    assert_eq!(
        surface::surface_reason(&scene.store, group.index(), false, true),
        Some(SurfaceReason::IsolatedGroup)
    );
    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root, group]));
    assert_eq!(scene.list(group), idx(&[child]));
    assert_eq!(
        scene.surface(group).content_rect,
        Rect::new(0.0, 0.0, 40.0, 40.0)
    );
}

#[test]
fn rotated_delegated_content_gets_its_own_surface() {
    let mut scene = Scene::new();
    let delegated = scene.add(scene.root, (100.0, 100.0), (100.0, 100.0));
    scene.update_flags(delegated, |f| f.has_delegated_content = true);
    scene
        .store
        .set_transform(delegated, Transform3d::from_rotation_z(PI / 4.0));
    let child = scene.add(delegated, (0.0, 0.0), (50.0, 50.0));

    let upright = scene.add(scene.root, (300.0, 300.0), (100.0, 100.0));
    scene.update_flags(upright, |f| f.has_delegated_content = true);
    let _upright_child = scene.add(upright, (0.0, 0.0), (50.0, 50.0));
    scene.run();

    assert!(scene.props(delegated).has_render_surface);
    assert_eq!(
        surface::surface_reason(&scene.store, delegated.index(), false, false),
        Some(SurfaceReason::NonAxisAlignedClip)
    );
    assert_eq!(scene.list(delegated), idx(&[delegated, child]));
    assert!(!scene.props(upright).has_render_surface);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

/// A tree mixing nested surfaces, clips, opacity and transforms.
fn mixed_scene() -> (Scene, Vec<LayerId>) {
    let mut scene = Scene::new();
    let root = scene.root;
    let clip = scene.add(root, (20.0, 20.0), (400.0, 300.0));
    scene.update_flags(clip, |f| f.masks_to_bounds = true);

    let group = scene.add(clip, (30.0, 40.0), (100.0, 100.0));
    scene.store.set_opacity(group, 0.5);
    let group_child = scene.add(group, (10.0, 10.0), (50.0, 50.0));

    let rotated = scene.add(root, (300.0, 200.0), (80.0, 60.0));
    scene
        .store
        .set_transform(rotated, Transform3d::from_rotation_z(PI / 6.0));
    scene.update_flags(rotated, |f| f.masks_to_bounds = true);
    let rotated_child = scene.add(rotated, (5.0, 5.0), (200.0, 200.0));

    let filtered = scene.add(group_child, (0.0, 0.0), (20.0, 20.0));
    scene
        .store
        .set_filters(filtered, vec![FilterOperation::Brightness(0.8)]);
    let filtered_child = scene.add(filtered, (2.0, 2.0), (10.0, 10.0));

    let layers = vec![
        root,
        clip,
        group,
        group_child,
        rotated,
        rotated_child,
        filtered,
        filtered_child,
    ];
    (scene, layers)
}

#[test]
fn render_targets_chain_to_root() {
    let (mut scene, layers) = mixed_scene();
    scene.run();

    for &layer in &layers {
        let mut current = layer;
        let mut hops = 0;
        loop {
            let target = scene
                .store
                .render_target(current)
                .expect("every layer in the scene is reached");
            assert!(
                scene.store.render_surface(target).is_some(),
                "target of {current:?} owns no surface"
            );
            if target == scene.root {
                break;
            }
            current = scene.store.parent(target).expect("non-root target has a parent");
            hops += 1;
            assert!(hops < layers.len(), "render target chain does not terminate");
        }
    }
}

#[test]
fn effects_force_render_surfaces() {
    let mut scene = Scene::new();
    let root = scene.root;
    let filtered = scene.add(root, (0.0, 0.0), (10.0, 10.0));
    scene.store.set_filters(filtered, vec![FilterOperation::Blur(1.0)]);
    let background = scene.add(root, (0.0, 0.0), (10.0, 10.0));
    scene
        .store
        .set_background_filters(background, vec![FilterOperation::Opacity(0.5)]);
    let masked = scene.add(root, (0.0, 0.0), (10.0, 10.0));
    let mask = scene.store.create_layer();
    scene.store.set_bounds(mask, Size::new(10.0, 10.0));
    scene.store.set_mask_layer(masked, Some(mask));
    let reflected = scene.add(root, (0.0, 0.0), (10.0, 10.0));
    let replica = scene.store.create_layer();
    scene.store.set_replica_layer(reflected, Some(replica));
    scene.run();

    for layer in [filtered, background, masked, reflected] {
        assert!(scene.props(layer).has_render_surface, "{layer:?}");
    }
    assert_eq!(scene.store.render_target(mask), Some(masked));
    assert_eq!(
        scene.props(mask).visible_layer_rect,
        Rect::new(0.0, 0.0, 10.0, 10.0)
    );
    assert!(scene.props(masked).is_clipped, "a mask clips its owner");
    assert_eq!(scene.store.render_target(replica), Some(reflected));
    assert!(scene.surface(reflected).has_replica);
}

#[test]
fn empty_surfaces_are_retracted() {
    let mut scene = Scene::new();
    let root = scene.root;
    let clipper = scene.add_group(root, (0.0, 0.0), (800.0, 600.0));
    scene.update_flags(clipper, |f| f.masks_to_bounds = true);
    let offscreen = scene.add_group(clipper, (5000.0, 5000.0), (10.0, 10.0));
    scene.update_flags(offscreen, |f| f.force_render_surface = true);
    let offscreen_child = scene.add(offscreen, (0.0, 0.0), (10.0, 10.0));
    let nested = scene.add_group(offscreen, (0.0, 0.0), (10.0, 10.0));
    scene.update_flags(nested, |f| f.force_render_surface = true);
    let _ = scene.add(nested, (0.0, 0.0), (10.0, 10.0));

    let empty = scene.add_group(root, (0.0, 0.0), (10.0, 10.0));
    scene.update_flags(empty, |f| f.force_render_surface = true);
    let _ = scene.add_group(empty, (0.0, 0.0), (10.0, 10.0));

    let kept = scene.add_group(root, (100.0, 100.0), (10.0, 10.0));
    scene.update_flags(kept, |f| f.force_render_surface = true);
    let _ = scene.add(kept, (0.0, 0.0), (10.0, 10.0));

    let pass = scene.run();

    assert_eq!(pass.render_surface_layer_list, idx(&[root, kept]));
    for (owner, surface) in pass.surfaces(&scene.store) {
        if owner != root.index() {
            assert!(!geometry::is_empty(surface.content_rect));
        }
    }
    assert_eq!(scene.list(root), idx(&[root, kept]));
    assert!(scene.store.surface[offscreen.index() as usize].layer_list.is_empty());
    assert!(scene.store.surface[nested.index() as usize].layer_list.is_empty());
    // The retracted surface's layers are still computed.
    assert_eq!(scene.store.render_target(offscreen_child), Some(offscreen));
}

#[test]
fn second_pass_is_identical() {
    let (mut scene, _) = mixed_scene();

    fn snapshot(store: &LayerStore) -> Vec<(Transform3d, Transform3d, f32, Rect, Rect, Rect, bool, u32)> {
        store
            .draw
            .iter()
            .map(|d| {
                (
                    d.target_space_transform,
                    d.screen_space_transform,
                    d.opacity,
                    d.clip_rect,
                    d.visible_layer_rect,
                    d.drawable_content_rect,
                    d.is_clipped,
                    d.render_target,
                )
            })
            .collect()
    }
    fn lists(store: &LayerStore) -> Vec<(Rect, Transform3d, Vec<u32>)> {
        store
            .surface
            .iter()
            .map(|s| (s.content_rect, s.draw_transform, s.layer_list.clone()))
            .collect()
    }

    let first = scene.run();
    let (draw, surfaces) = (snapshot(&scene.store), lists(&scene.store));
    let second = scene.run();
    assert_eq!(first.render_surface_layer_list, second.render_surface_layer_list);
    assert_eq!(snapshot(&scene.store), draw);
    assert_eq!(lists(&scene.store), surfaces);
}

#[test]
fn clips_shrink_toward_leaves() {
    let mut scene = Scene::new();
    let outer = scene.add(scene.root, (10.0, 10.0), (200.0, 200.0));
    scene.update_flags(outer, |f| f.masks_to_bounds = true);
    let inner = scene.add(outer, (50.0, 50.0), (300.0, 300.0));
    scene.update_flags(inner, |f| f.masks_to_bounds = true);
    let leaf = scene.add(inner, (-100.0, -100.0), (500.0, 500.0));
    let escaping = scene.add(inner, (0.0, 0.0), (500.0, 500.0));
    scene.store.set_clip_parent(escaping, Some(outer));
    scene.run();

    let outer_clip = scene.props(outer).clip_rect;
    assert_eq!(outer_clip, Rect::new(10.0, 10.0, 210.0, 210.0));
    assert_eq!(
        scene.props(inner).clip_rect,
        Rect::new(60.0, 60.0, 210.0, 210.0)
    );
    for layer in [inner, leaf, escaping] {
        let props = scene.props(layer);
        assert!(props.is_clipped);
        assert!(
            geometry::contains(outer_clip, props.clip_rect),
            "{layer:?} escapes its clipping ancestor"
        );
    }
    assert!(geometry::contains(
        scene.props(inner).clip_rect,
        scene.props(leaf).clip_rect
    ));
    // The clip child ignores the inner clip.
    assert_eq!(scene.props(escaping).clip_rect, outer_clip);
}

#[test]
fn drawable_rect_matches_bounds_through_draw_transform() {
    let (mut scene, layers) = mixed_scene();
    scene.run();

    for &layer in &layers {
        let props = scene.props(layer);
        if props.has_render_surface {
            continue;
        }
        let bounds = Rect::from_origin_size(Point::ORIGIN, scene.store.bounds(layer));
        let mapped = geometry::map_enclosing_clipped_rect(&props.target_space_transform, bounds);
        if props.is_clipped {
            assert_eq!(
                geometry::intersect(props.drawable_content_rect, props.clip_rect),
                geometry::intersect(mapped, props.clip_rect),
                "{layer:?}"
            );
        } else {
            assert_eq!(props.drawable_content_rect, mapped, "{layer:?}");
        }
    }
}

#[test]
fn malformed_inputs_are_rejected() {
    let mut scene = Scene::new();
    let a = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    let b = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    let deep = scene.add(a, (0.0, 0.0), (10.0, 10.0));

    let bad_texture = DrawConfig::new(VIEWPORT).with_max_texture_size(0);
    assert_eq!(
        scene
            .store
            .calculate_draw_properties(scene.root, &bad_texture, &mut Tracer::none())
            .unwrap_err(),
        DrawPropertiesError::InvalidMaxTextureSize
    );

    let shallow = DrawConfig::new(VIEWPORT).with_max_depth(1);
    assert_eq!(
        scene
            .store
            .calculate_draw_properties(scene.root, &shallow, &mut Tracer::none())
            .unwrap_err(),
        DrawPropertiesError::TreeTooDeep { limit: 1 }
    );

    scene.store.set_clip_parent(deep, Some(b));
    assert_eq!(
        scene
            .store
            .calculate_draw_properties(scene.root, &DrawConfig::new(VIEWPORT), &mut Tracer::none())
            .unwrap_err(),
        DrawPropertiesError::ClipParentNotAncestor { layer: deep.index() }
    );
    scene.store.set_clip_parent(deep, None);

    scene.store.set_scroll_parent(deep, Some(b));
    assert_eq!(
        scene
            .store
            .calculate_draw_properties(scene.root, &DrawConfig::new(VIEWPORT), &mut Tracer::none())
            .unwrap_err(),
        DrawPropertiesError::ScrollParentNotInParentSubtree { layer: deep.index() }
    );
    scene.store.set_scroll_parent(deep, None);

    let pass = scene.run();
    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root]));
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

#[test]
fn scroll_parent_visited_first_but_lists_keep_tree_order() {
    let (mut scene, scroller, _, follower, follower_child) = scroll_parent_scene(true);
    let pass = scene.run();

    assert!(scene.props(scene.root).has_child_with_a_scroll_parent);
    assert_eq!(
        scene.props(follower).clip_rect,
        Rect::new(10.0, 10.0, 110.0, 110.0)
    );
    assert_eq!(
        scene.list(scene.root),
        idx(&[scene.root, follower, follower_child, scroller])
    );
    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root, scroller]));
}

#[test]
fn scroll_children_follow_scroll_parent_offset() {
    let (mut scene, scroller, contents, follower, _) = scroll_parent_scene(false);
    scene.store.set_scroll_clip(contents, Some(scroller));
    scene.store.set_scroll_offset(contents, Vec2::new(0.0, 25.0));
    scene.run();

    assert_eq!(
        scene.props(contents).target_space_transform.translation_2d(),
        Vec2::new(0.0, -25.0)
    );
    assert_eq!(
        scene.props(follower).screen_space_transform.translation_2d(),
        Vec2::new(0.0, -25.0)
    );
}

#[test]
fn fixed_position_layer_ignores_scrolling() {
    let mut scene = Scene::new();
    let root = scene.root;
    let scroller = scene.add_group(root, (0.0, 0.0), (800.0, 2000.0));
    scene.store.set_scroll_clip(scroller, Some(root));
    scene.store.set_scroll_offset(scroller, Vec2::new(0.0, 30.0));
    let content = scene.add(scroller, (5.0, 5.0), (50.0, 50.0));
    let fixed = scene.add(scroller, (5.0, 5.0), (50.0, 50.0));
    scene.store.set_position_constraint(
        fixed,
        PositionConstraint {
            is_fixed_position: true,
            ..PositionConstraint::default()
        },
    );
    let anchored = scene.add(scroller, (5.0, 5.0), (50.0, 50.0));
    scene.store.set_position_constraint(
        anchored,
        PositionConstraint {
            is_fixed_position: true,
            anchored_bottom: true,
            ..PositionConstraint::default()
        },
    );
    scene
        .store
        .set_fixed_container_size_delta(root, Vec2::new(0.0, 20.0));
    scene.run();

    let translation = |id| scene.props(id).screen_space_transform.translation_2d();
    assert_eq!(translation(content), Vec2::new(5.0, -25.0));
    assert_eq!(translation(fixed), Vec2::new(5.0, 5.0));
    assert_eq!(translation(anchored), Vec2::new(5.0, 25.0));
}

#[test]
fn scrolled_layers_snap_to_pixels() {
    let mut scene = Scene::new();
    let scroller = scene.add(scene.root, (0.0, 0.0), (100.0, 100.0));
    scene.store.set_scroll_clip(scroller, Some(scene.root));
    scene.store.set_scroll_offset(scroller, Vec2::new(0.0, 10.25));
    let fixed = scene.add(scroller, (3.0, 3.0), (10.0, 10.0));
    scene.store.set_position_constraint(
        fixed,
        PositionConstraint {
            is_fixed_position: true,
            ..PositionConstraint::default()
        },
    );
    scene.run();

    assert_eq!(
        scene.props(scroller).target_space_transform.translation_2d(),
        Vec2::new(0.0, -10.0)
    );
    // The snapping residual is compensated too.
    let fixed_translation = scene.props(fixed).target_space_transform.translation_2d();
    assert!((fixed_translation - Vec2::new(3.0, 3.0)).hypot() < 1e-9);
}

#[test]
fn animation_scale_unknown_when_layer_and_ancestor_animate() {
    let mut scene = Scene::new();
    let parent = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    let animated_child = scene.add(parent, (0.0, 0.0), (10.0, 10.0));
    let scaled_child = scene.add(parent, (0.0, 0.0), (10.0, 10.0));
    scene
        .store
        .set_transform(scaled_child, Transform3d::from_scale(3.0, 3.0, 1.0));

    let animating = |maximum| AnimationState {
        scale: Some(ScaleAnimation {
            maximum_target_scale: Some(maximum),
            starting_scale: Some(1.0),
        }),
        ..AnimationState::default()
    };
    scene.store.set_animation(parent, animating(2.0));
    scene.store.set_animation(animated_child, animating(4.0));
    scene.run();

    assert_eq!(scene.props(parent).maximum_animation_contents_scale, 2.0);
    assert_eq!(scene.props(parent).starting_animation_contents_scale, 1.0);
    assert_eq!(scene.props(animated_child).maximum_animation_contents_scale, 0.0);
    assert_eq!(scene.props(scaled_child).maximum_animation_contents_scale, 6.0);
    assert_eq!(scene.props(scaled_child).starting_animation_contents_scale, 3.0);

    scene.run_with(&DrawConfig::new(VIEWPORT).with_raster_scale_adjustment(false));
    assert_eq!(scene.props(parent).maximum_animation_contents_scale, 0.0);
}

#[test]
fn independent_recomputation_agrees() {
    let mut scene = Scene::new();
    let root = scene.root;
    let page = scene.add_group(root, (0.0, 0.0), (800.0, 600.0));
    let scroller = scene.add_group(page, (0.0, 0.0), (800.0, 2000.0));
    scene.store.set_scroll_clip(scroller, Some(page));
    scene.store.set_scroll_offset(scroller, Vec2::new(0.0, 10.25));
    let _item = scene.add(scroller, (20.0, 20.0), (100.0, 100.0));
    let fixed = scene.add(scroller, (5.0, 5.0), (50.0, 50.0));
    scene.store.set_position_constraint(
        fixed,
        PositionConstraint {
            is_fixed_position: true,
            ..PositionConstraint::default()
        },
    );

    let surface = scene.add(page, (100.0, 100.0), (40.0, 40.0));
    scene
        .store
        .set_transform(surface, Transform3d::from_scale(2.0, 2.0, 1.0));
    scene.store.set_opacity(surface, 0.5);
    scene.store.set_filters(surface, vec![FilterOperation::Blur(1.0)]);
    let in_surface = scene.add(surface, (5.0, 5.0), (20.0, 20.0));
    scene.store.set_opacity(in_surface, 0.8);

    let clipper = scene.add_group(root, (0.0, 0.0), (300.0, 300.0));
    scene.update_flags(clipper, |f| f.masks_to_bounds = true);
    let _clipped = scene.add(clipper, (10.0, 10.0), (400.0, 400.0));

    let config = DrawConfig::new(Size::new(1600.0, 1200.0))
        .with_device_scale_factor(2.0)
        .with_page_scale(page, 1.5);
    scene.run_with(&config);

    assert_eq!(verify_draw_properties(&scene.store, root, &config), Vec::new());
    assert!(scene.props(surface).has_render_surface);
    assert_eq!(scene.surface(surface).sublayer_scale, Vec2::new(6.0, 6.0));
    assert_eq!(scene.props(in_surface).opacity, 0.8);
    assert_eq!(scene.surface(surface).draw_opacity, 0.5);
}

#[test]
fn lcd_text_requires_opaque_pixel_aligned_content() {
    let mut scene = Scene::new();
    let aligned = scene.add(scene.root, (10.0, 10.0), (10.0, 10.0));
    let fractional = scene.add(scene.root, (10.5, 10.0), (10.0, 10.0));
    let translucent = scene.add(scene.root, (10.0, 10.0), (10.0, 10.0));
    let transparent_content = scene.add(scene.root, (10.0, 10.0), (10.0, 10.0));
    for layer in [aligned, fractional, translucent] {
        scene.update_flags(layer, |f| f.contents_opaque = true);
    }
    scene.store.set_opacity(translucent, 0.5);
    scene.run();

    assert!(scene.props(aligned).can_use_lcd_text);
    assert!(!scene.props(fractional).can_use_lcd_text);
    assert!(!scene.props(translucent).can_use_lcd_text);
    assert!(!scene.props(transparent_content).can_use_lcd_text);

    scene.run_with(&DrawConfig::new(VIEWPORT).with_lcd_text(LcdTextPolicy::AlwaysAllowed));
    assert!(scene.props(transparent_content).can_use_lcd_text);
    scene.run_with(&DrawConfig::new(VIEWPORT).with_lcd_text(LcdTextPolicy::Disabled));
    assert!(!scene.props(aligned).can_use_lcd_text);
}

#[test]
fn lcd_text_frozen_while_animating() {
    let mut scene = Scene::new();
    let layer = scene.add(scene.root, (10.0, 10.0), (10.0, 10.0));
    scene.update_flags(layer, |f| f.contents_opaque = true);
    scene.run();
    assert!(scene.props(layer).can_use_lcd_text);

    scene.store.set_position(layer, Point::new(10.5, 10.0));
    scene.store.set_animation(
        layer,
        AnimationState {
            transform_is_animating: true,
            ..AnimationState::default()
        },
    );
    scene.run();
    assert!(scene.props(layer).can_use_lcd_text, "kept during animation");
    assert!(scene.props(layer).screen_space_transform_is_animating);

    scene.store.set_animation(layer, AnimationState::default());
    scene.run();
    assert!(!scene.props(layer).can_use_lcd_text);
}

#[test]
fn hidden_layer_with_copy_request_is_drawn() {
    let mut scene = Scene::new();
    let hidden = scene.add(scene.root, (0.0, 0.0), (50.0, 50.0));
    scene.update_flags(hidden, |f| f.hidden = true);
    scene.store.request_copy(hidden);
    let pass = scene.run();

    assert!(scene.props(hidden).is_drawn);
    assert_eq!(pass.render_surface_layer_list, idx(&[scene.root, hidden]));
    assert!(!scene.surface(hidden).contributes_to_drawn_surface);
    assert_eq!(scene.list(hidden), idx(&[hidden]));
}

#[test]
fn pruning_exemptions() {
    let mut scene = Scene::new();
    let hidden = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    scene.update_flags(hidden, |f| f.hidden = true);
    let hidden_child = scene.add(hidden, (0.0, 0.0), (10.0, 10.0));

    let touchable = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    scene.store.set_opacity(touchable, 0.0);
    scene
        .store
        .set_touch_region(touchable, Rect::new(0.0, 0.0, 10.0, 10.0));

    let fading_in = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    scene.store.set_opacity(fading_in, 0.0);
    scene.store.set_animation(
        fading_in,
        AnimationState {
            opacity_can_animate: true,
            ..AnimationState::default()
        },
    );

    scene.run();
    assert_eq!(scene.store.render_target(hidden_child), None);
    assert_eq!(scene.store.render_target(touchable), Some(scene.root));
    assert_eq!(scene.store.render_target(fading_in), None);

    scene.run_with(&DrawConfig::new(VIEWPORT).with_pending_tree(true));
    assert_eq!(scene.store.render_target(fading_in), Some(scene.root));
}

#[test]
fn back_facing_layer_is_left_out_of_lists() {
    let mut scene = Scene::new();
    let flipped = scene.add(scene.root, (400.0, 0.0), (100.0, 100.0));
    scene
        .store
        .set_transform(flipped, Transform3d::from_rotation_y(PI));
    scene.update_flags(flipped, |f| f.double_sided = false);
    let child = scene.add(flipped, (0.0, 0.0), (10.0, 10.0));
    scene.run();

    let list = scene.list(scene.root);
    assert!(!list.contains(&flipped.index()));
    assert!(list.contains(&child.index()));
}

#[test]
fn replica_transforms_and_footprint() {
    let mut scene = Scene::new();
    let owner = scene.add(scene.root, (10.0, 10.0), (50.0, 50.0));
    let replica = scene.store.create_layer();
    scene.store.set_position(replica, Point::new(0.0, 100.0));
    scene.store.set_replica_layer(owner, Some(replica));
    scene.run();

    let surface = scene.surface(owner);
    assert_eq!(
        surface.replica_draw_transform.translation_2d(),
        Vec2::new(10.0, 110.0)
    );
    assert_eq!(
        surface.replica_screen_space_transform.translation_2d(),
        Vec2::new(10.0, 110.0)
    );
    assert_eq!(
        surface.drawable_content_rect(),
        Rect::new(10.0, 10.0, 60.0, 160.0)
    );
}

#[test]
fn surface_content_is_limited_to_texture_size() {
    let mut scene = Scene::new();
    let surface = scene.add_group(scene.root, (0.0, 0.0), (0.0, 0.0));
    scene.update_flags(surface, |f| f.force_render_surface = true);
    let _ = scene.add(surface, (0.0, 0.0), (200.0, 100.0));
    scene.run_with(&DrawConfig::new(VIEWPORT).with_max_texture_size(64));

    assert_eq!(
        scene.surface(surface).content_rect,
        Rect::new(0.0, 0.0, 64.0, 64.0)
    );
}

#[test]
fn unclipped_descendant_keeps_surface_unclipped() {
    let mut scene = Scene::new();
    let root = scene.root;
    let clipper = scene.add_group(root, (0.0, 0.0), (100.0, 100.0));
    scene.update_flags(clipper, |f| f.masks_to_bounds = true);
    let surface = scene.add(clipper, (0.0, 0.0), (50.0, 50.0));
    scene.update_flags(surface, |f| f.force_render_surface = true);
    let escaping = scene.add(surface, (0.0, 0.0), (500.0, 500.0));
    scene.store.set_clip_parent(escaping, Some(root));
    scene.run();

    assert_eq!(scene.props(surface).num_unclipped_descendants, 1);
    assert!(!scene.props(escaping).is_clipped);
    let s = scene.surface(surface);
    assert!(!s.is_clipped);
    assert_eq!(s.content_rect, Rect::new(0.0, 0.0, 500.0, 500.0));
    assert!(scene.props(surface).is_clipped, "the clip moves to the layer");
}

#[test]
fn page_scale_and_device_scale_compose() {
    let mut scene = Scene::new();
    let page = scene.add_group(scene.root, (0.0, 0.0), (800.0, 600.0));
    let content = scene.add(page, (10.0, 10.0), (10.0, 10.0));
    let config = DrawConfig::new(VIEWPORT)
        .with_device_scale_factor(2.0)
        .with_page_scale(page, 1.5);
    scene.run_with(&config);

    let screen = scene.props(content).screen_space_transform;
    assert_eq!(screen.scale_components_2d(0.0), Vec2::new(3.0, 3.0));
    assert_eq!(screen.translation_2d(), Vec2::new(30.0, 30.0));
    assert_eq!(
        scene.props(page).screen_space_transform.scale_components_2d(0.0),
        Vec2::new(2.0, 2.0)
    );
}

#[test]
fn changes_are_reported_once() {
    let mut scene = Scene::new();
    let parent = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    let child = scene.add(parent, (0.0, 0.0), (10.0, 10.0));
    let first = scene.run();
    assert!(first.topology_changed);
    assert!(!scene.store.needs_update());

    scene.store.set_opacity(parent, 0.5);
    assert!(scene.store.needs_update());
    let second = scene.run();
    assert!(second.changed.contains(&parent.index()));
    assert!(second.changed.contains(&child.index()));
    assert!(!second.topology_changed);

    let third = scene.run();
    assert!(third.changed.is_empty());
    assert!(third.generation > second.generation);
}

#[cfg(feature = "trace")]
#[test]
fn trace_reports_surfaces_and_skips() {
    use crate::trace::{
        DrawTraceSink, PassSummary, SkipReason, SubtreeSkippedEvent, SurfaceCreatedEvent,
    };

    #[derive(Default)]
    struct Recorder {
        created: Vec<(u32, SurfaceReason)>,
        skipped: Vec<(u32, SkipReason)>,
        summary: Option<PassSummary>,
    }
    impl DrawTraceSink for Recorder {
        fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
            self.created.push((e.layer, e.reason));
        }
        fn on_subtree_skipped(&mut self, e: &SubtreeSkippedEvent) {
            self.skipped.push((e.layer, e.reason));
        }
        fn on_pass_end(&mut self, s: &PassSummary) {
            self.summary = Some(*s);
        }
    }

    let mut scene = Scene::new();
    let filtered = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    scene.store.set_filters(filtered, vec![FilterOperation::Blur(1.0)]);
    let transparent = scene.add(scene.root, (0.0, 0.0), (10.0, 10.0));
    scene.store.set_opacity(transparent, 0.0);

    let mut recorder = Recorder::default();
    scene
        .store
        .calculate_draw_properties(
            scene.root,
            &DrawConfig::new(VIEWPORT),
            &mut Tracer::new(&mut recorder),
        )
        .unwrap();

    assert_eq!(
        recorder.created,
        vec![
            (scene.root.index(), SurfaceReason::Root),
            (filtered.index(), SurfaceReason::Filters),
        ]
    );
    assert_eq!(
        recorder.skipped,
        vec![(transparent.index(), SkipReason::ZeroOpacity)]
    );
    let summary = recorder.summary.expect("pass end is reported");
    assert_eq!(summary.layers_visited, 3);
    assert_eq!(summary.render_surfaces, 2);
    assert_eq!(summary.layers_drawn, 2);
}
