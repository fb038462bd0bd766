//! Recoloring - positional slot -> palette replacement

use std::collections::HashMap;

use image::RgbaImage;

use crate::enumerate::ColorTuple;
use crate::slots::SlotColorSequence;

/// Replace the i-th slot color with the i-th tuple color.
///
/// Slots beyond the tuple's length keep their color. Transparent pixels and
/// pixels matching no slot pass through unchanged. Alpha is never touched.
pub fn recolor(sprite: &RgbaImage, slots: &SlotColorSequence, tuple: &ColorTuple) -> RgbaImage {
    let mut mapping: HashMap<[u8; 3], [u8; 3]> = HashMap::new();
    for (slot, color) in slots.colors().iter().zip(tuple.colors()) {
        mapping.entry(slot.0).or_insert(color.channels());
    }

    let mut out = sprite.clone();
    for px in out.pixels_mut() {
        let [r, g, b, a] = px.0;
        if a == 0 {
            continue;
        }
        if let Some(&[nr, ng, nb]) = mapping.get(&[r, g, b]) {
            px.0 = [nr, ng, nb, a];
        }
    }
    out
}
