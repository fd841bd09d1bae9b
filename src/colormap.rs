// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

/// Magma anchor colours at evenly spaced positions from 0 to 1.
const MAGMA_ANCHORS: [[u8; 3]; 9] = [
    [0, 0, 4],
    [28, 16, 68],
    [79, 18, 123],
    [129, 37, 129],
    [181, 54, 122],
    [229, 80, 100],
    [251, 135, 97],
    [254, 194, 135],
    [252, 253, 191],
];

/// 256 entry RGB lookup table, dark purple for 0 through to pale yellow
/// for 255.
pub type Palette = [[u8; 3]; 256];

/// Builds the magma-like palette by linear interpolation between the anchor
/// colours. Perceived brightness increases monotonically with the index.
pub fn magma() -> Palette {
    let segments = (MAGMA_ANCHORS.len() - 1) as f32;
    let mut lut = [[0u8; 3]; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let t = i as f32 / 255.0 * segments;
        let k = (t.floor() as usize).min(MAGMA_ANCHORS.len() - 2);
        let f = t - k as f32;
        let (a, b) = (MAGMA_ANCHORS[k], MAGMA_ANCHORS[k + 1]);
        for c in 0..3 {
            entry[c] = (a[c] as f32 + (b[c] as f32 - a[c] as f32) * f).round() as u8;
        }
    }
    lut
}

/// Maps each intensity in `src` to its palette colour, writing packed RGB
/// into `dst`.
pub fn apply(palette: &Palette, src: &[u8], dst: &mut [u8]) {
    for (px, &v) in dst.chunks_exact_mut(3).zip(src) {
        px.copy_from_slice(&palette[v as usize]);
    }
}
