// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON dumps of computed draw properties.
//!
//! [`pass_to_json`] captures the render-surface list of a [`DrawPass`] with
//! every surface's layer list and the draw properties of each listed layer.
//! Rects are written as `[x0, y0, x1, y1]` and transforms as column-major
//! 4×4 arrays.

use std::io::{self, Write};

use kurbo::Rect;
use serde_json::{Value, json};

use stratum_core::draw::DrawPass;
use stratum_core::draw::verify::Mismatch;
use stratum_core::layer::{INVALID, LayerStore};
use stratum_core::transform::Transform3d;

fn rect(r: Rect) -> Value {
    json!([r.x0, r.y0, r.x1, r.y1])
}

fn transform(t: &Transform3d) -> Value {
    json!(t.to_cols_array_2d())
}

fn target(idx: u32) -> Value {
    if idx == INVALID {
        Value::Null
    } else {
        json!(idx)
    }
}

fn layer_to_json(store: &LayerStore, idx: u32) -> Value {
    let d = store.draw_properties_at(idx);
    json!({
        "layer": idx,
        "render_target": target(d.render_target),
        "target_space_transform": transform(&d.target_space_transform),
        "screen_space_transform": transform(&d.screen_space_transform),
        "opacity": d.opacity,
        "is_clipped": d.is_clipped,
        "clip_rect": rect(d.clip_rect),
        "visible_layer_rect": rect(d.visible_layer_rect),
        "drawable_content_rect": rect(d.drawable_content_rect),
        "can_use_lcd_text": d.can_use_lcd_text,
        "maximum_animation_contents_scale": d.maximum_animation_contents_scale,
    })
}

/// Builds a JSON object describing a computed pass.
pub fn pass_to_json(store: &LayerStore, pass: &DrawPass) -> Value {
    let surfaces: Vec<Value> = pass
        .surfaces(store)
        .map(|(owner, s)| {
            let layers: Vec<Value> = s
                .layer_list
                .iter()
                .map(|&idx| layer_to_json(store, idx))
                .collect();
            json!({
                "owner": owner,
                "draw_transform": transform(&s.draw_transform),
                "screen_space_transform": transform(&s.screen_space_transform),
                "draw_opacity": s.draw_opacity,
                "is_clipped": s.is_clipped,
                "clip_rect": rect(s.clip_rect),
                "content_rect": rect(s.content_rect),
                "drawable_content_rect": rect(s.drawable_content_rect()),
                "sublayer_scale": [s.sublayer_scale.x, s.sublayer_scale.y],
                "contributes_to_drawn_surface": s.contributes_to_drawn_surface,
                "layers": layers,
            })
        })
        .collect();

    json!({
        "generation": pass.generation,
        "topology_changed": pass.topology_changed,
        "changed": pass.changed,
        "surfaces": surfaces,
    })
}

/// Builds a JSON array from verification mismatches.
pub fn mismatches_to_json(mismatches: &[Mismatch]) -> Value {
    mismatches
        .iter()
        .map(|m| {
            json!({
                "layer": m.layer,
                "property": format!("{:?}", m.property),
                "deviation": m.deviation,
            })
        })
        .collect()
}

/// Writes [`pass_to_json`] to `writer` as pretty-printed JSON.
pub fn write_pass(store: &LayerStore, pass: &DrawPass, writer: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &pass_to_json(store, pass))?;
    writeln!(writer)
}
