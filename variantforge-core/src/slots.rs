//! Slot Extraction
//!
//! A pattern's slots are its distinct paintable colors, most prevalent first.

use std::cmp::Reverse;
use std::collections::HashMap;

use image::{Rgb, RgbaImage};

/// Distinct paintable colors of one sprite, ordered by descending pixel count.
/// Ties keep first-seen (row-major) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotColorSequence(Vec<Rgb<u8>>);

impl SlotColorSequence {
    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.0
    }

    /// The slot count `k`.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Rgb<u8>>> for SlotColorSequence {
    fn from(colors: Vec<Rgb<u8>>) -> Self {
        Self(colors)
    }
}

struct SlotTally {
    rgb: [u8; 3],
    count: usize,
    first_seen: usize,
}

/// Extract the slot colors of a sprite.
///
/// Any pixel with non-zero alpha counts as paintable, so a stray
/// semi-transparent pixel still becomes (part of) a slot.
pub fn extract_slots(sprite: &RgbaImage) -> SlotColorSequence {
    let mut index: HashMap<[u8; 3], usize> = HashMap::new();
    let mut tallies: Vec<SlotTally> = vec![];

    for px in sprite.pixels() {
        let [r, g, b, a] = px.0;
        if a == 0 {
            continue;
        }
        let rgb = [r, g, b];
        match index.get(&rgb) {
            Some(&i) => tallies[i].count += 1,
            None => {
                let first_seen = tallies.len();
                index.insert(rgb, first_seen);
                tallies.push(SlotTally { rgb, count: 1, first_seen });
            }
        }
    }

    tallies.sort_by_key(|t| (Reverse(t.count), t.first_seen));
    SlotColorSequence(tallies.into_iter().map(|t| Rgb(t.rgb)).collect())
}
