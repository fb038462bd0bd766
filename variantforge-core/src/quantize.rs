//! Octree Color Quantization
//!
//! Builds a palette of at most `max_colors` entries from an RGB plane. The
//! result implements [`ColorMap`] so it plugs straight into
//! `image::imageops::dither` for Floyd-Steinberg error diffusion.
//!
//! When an image already has no more than `max_colors` distinct colors, every
//! leaf sits at full depth and the palette reproduces them exactly.

use image::imageops::ColorMap;
use image::{Rgb, RgbImage};

const MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<usize>; 8],
    depth: usize,
    leaf: bool,
    pixel_count: u64,
    sums: [u64; 3],
}

impl Node {
    fn at_depth(depth: usize) -> Self {
        Self {
            depth,
            leaf: depth == MAX_DEPTH,
            ..Default::default()
        }
    }
}

fn child_slot(rgb: [u8; 3], depth: usize) -> usize {
    let shift = 7 - depth;
    let bit = |c: u8| ((c >> shift) & 1) as usize;
    (bit(rgb[0]) << 2) | (bit(rgb[1]) << 1) | bit(rgb[2])
}

struct Octree {
    nodes: Vec<Node>,
    leaves: usize,
}

impl Octree {
    fn new() -> Self {
        Self { nodes: vec![Node::at_depth(0)], leaves: 0 }
    }

    fn insert(&mut self, rgb: [u8; 3]) {
        let mut current = 0;
        for depth in 0..=MAX_DEPTH {
            let node = &mut self.nodes[current];
            node.pixel_count += 1;
            for (sum, c) in node.sums.iter_mut().zip(rgb) {
                *sum += u64::from(c);
            }
            if depth == MAX_DEPTH {
                break;
            }

            let slot = child_slot(rgb, depth);
            current = match self.nodes[current].children[slot] {
                Some(next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(Node::at_depth(depth + 1));
                    self.nodes[current].children[slot] = Some(next);
                    if depth + 1 == MAX_DEPTH {
                        self.leaves += 1;
                    }
                    next
                }
            };
        }
    }

    /// Fold the deepest subtrees into their parents until at most
    /// `max_leaves` remain. Within a level the lightest subtrees go first,
    /// ties broken by creation order.
    fn reduce(&mut self, max_leaves: usize) {
        for depth in (0..MAX_DEPTH).rev() {
            if self.leaves <= max_leaves {
                return;
            }

            let mut candidates: Vec<usize> = self
                .reachable()
                .into_iter()
                .filter(|&i| self.nodes[i].depth == depth && !self.nodes[i].leaf)
                .collect();
            candidates.sort_by_key(|&i| (self.nodes[i].pixel_count, i));

            for i in candidates {
                if self.leaves <= max_leaves {
                    return;
                }
                let merged = self.nodes[i].children.iter().flatten().count();
                self.nodes[i].children = [None; 8];
                self.nodes[i].leaf = true;
                self.leaves = self.leaves + 1 - merged;
            }
        }
    }

    /// Node indices reachable from the root, depth-first in child order.
    fn reachable(&self) -> Vec<usize> {
        let mut order = vec![];
        let mut stack = vec![0];
        while let Some(i) = stack.pop() {
            order.push(i);
            stack.extend(self.nodes[i].children.iter().rev().flatten());
        }
        order
    }

    fn palette(&self) -> Vec<Rgb<u8>> {
        self.reachable()
            .into_iter()
            .map(|i| &self.nodes[i])
            .filter(|n| n.leaf && n.pixel_count > 0)
            .map(|n| {
                let avg = |s: u64| ((s + n.pixel_count / 2) / n.pixel_count) as u8;
                Rgb([avg(n.sums[0]), avg(n.sums[1]), avg(n.sums[2])])
            })
            .collect()
    }
}

/// A bounded palette derived from an image by octree reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OctreePalette {
    colors: Vec<Rgb<u8>>,
}

impl OctreePalette {
    pub fn build(image: &RgbImage, max_colors: usize) -> Self {
        let mut tree = Octree::new();
        for px in image.pixels() {
            tree.insert(px.0);
        }
        tree.reduce(max_colors.max(1));
        Self { colors: tree.palette() }
    }

    pub fn colors(&self) -> &[Rgb<u8>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Map every pixel to its nearest palette entry without error diffusion.
    pub fn remap(&self, image: &mut RgbImage) {
        for px in image.pixels_mut() {
            self.map_color(px);
        }
    }
}

fn distance_sq(a: &Rgb<u8>, b: &Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0)
        .map(|(&x, y)| {
            let d = i32::from(x) - i32::from(y);
            (d * d) as u32
        })
        .sum()
}

impl ColorMap for OctreePalette {
    type Color = Rgb<u8>;

    /// Nearest entry by squared RGB distance; the lowest index wins ties.
    fn index_of(&self, color: &Rgb<u8>) -> usize {
        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (distance_sq(c, color), *i))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn map_color(&self, color: &mut Rgb<u8>) {
        if let Some(c) = self.colors.get(self.index_of(color)) {
            *color = *c;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
        })
    }

    fn distinct(image: &RgbImage) -> HashSet<[u8; 3]> {
        image.pixels().map(|p| p.0).collect()
    }

    #[test]
    fn test_few_colors_reproduced_exactly() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 | 1 => Rgb([12, 200, 7]),
            2 => Rgb([255, 255, 255]),
            _ => Rgb([0, 0, 0]),
        });
        let palette = OctreePalette::build(&img, 16);
        assert_eq!(palette.len(), 3);
        let mut out = img.clone();
        palette.remap(&mut out);
        assert_eq!(out, img);
    }

    #[test]
    fn test_palette_bounded() {
        let img = gradient(32, 32);
        assert!(distinct(&img).len() > 16);
        for max in [1, 2, 5, 16] {
            let palette = OctreePalette::build(&img, max);
            assert!(palette.len() <= max, "max={} got={}", max, palette.len());
            assert!(!palette.is_empty());
        }
    }

    #[test]
    fn test_remap_uses_only_palette_colors() {
        let mut img = gradient(16, 16);
        let palette = OctreePalette::build(&img, 4);
        palette.remap(&mut img);
        let allowed: HashSet<[u8; 3]> = palette.colors().iter().map(|c| c.0).collect();
        assert!(distinct(&img).is_subset(&allowed));
    }

    #[test]
    fn test_build_is_deterministic() {
        let img = gradient(20, 20);
        assert_eq!(OctreePalette::build(&img, 8), OctreePalette::build(&img, 8));
    }

    #[test]
    fn test_index_of_ties_pick_lowest() {
        let palette = OctreePalette {
            colors: vec![Rgb([0, 0, 0]), Rgb([2, 0, 0])],
        };
        assert_eq!(palette.index_of(&Rgb([1, 0, 0])), 0);
        assert_eq!(palette.index_of(&Rgb([2, 0, 0])), 1);
    }
}
