//! Binary morphology on `u8` masks.
//!
//! Any nonzero voxel is foreground; results hold `0` and `1` only.
//! Voxels outside the grid never change the outcome of a dilation or
//! an erosion, so closing does not shave foreground touching the border.

use std::collections::VecDeque;

use ndarray::{Array3, Zip};

const FACE_NEIGHBORS: [[isize; 3]; 6] = [
    [-1, 0, 0],
    [1, 0, 0],
    [0, -1, 0],
    [0, 1, 0],
    [0, 0, -1],
    [0, 0, 1],
];

/// Offsets of a ball structuring element of `radius` voxels.
pub fn ball_offsets(radius: usize) -> Vec<[isize; 3]> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy + dz * dz <= r2 {
                    offsets.push([dx, dy, dz]);
                }
            }
        }
    }
    offsets
}

fn offset_index(dims: [usize; 3], index: [usize; 3], offset: [isize; 3]) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    for axis in 0..3 {
        let v = index[axis] as isize + offset[axis];
        if v < 0 || v >= dims[axis] as isize {
            return None;
        }
        out[axis] = v as usize;
    }
    Some(out)
}

fn dims_of(mask: &Array3<u8>) -> [usize; 3] {
    let (nx, ny, nz) = mask.dim();
    [nx, ny, nz]
}

/// Binary dilation with a ball of `radius` voxels.
pub fn dilate(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let dims = dims_of(mask);
    let offsets = ball_offsets(radius);
    let mut out = Array3::<u8>::zeros(mask.raw_dim());
    Zip::indexed(&mut out).par_for_each(|(i, j, k), value| {
        let hit = offsets.iter().any(|&offset| {
            offset_index(dims, [i, j, k], offset)
                .map(|[x, y, z]| mask[(x, y, z)] != 0)
                .unwrap_or(false)
        });
        *value = u8::from(hit);
    });
    out
}

/// Binary erosion with a ball of `radius` voxels.
pub fn erode(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    let dims = dims_of(mask);
    let offsets = ball_offsets(radius);
    let mut out = Array3::<u8>::zeros(mask.raw_dim());
    Zip::indexed(&mut out).par_for_each(|(i, j, k), value| {
        let keep = mask[(i, j, k)] != 0
            && offsets.iter().all(|&offset| {
                offset_index(dims, [i, j, k], offset)
                    .map(|[x, y, z]| mask[(x, y, z)] != 0)
                    .unwrap_or(true)
            });
        *value = u8::from(keep);
    });
    out
}

/// Dilation followed by erosion.
pub fn closing(mask: &Array3<u8>, radius: usize) -> Array3<u8> {
    if radius == 0 {
        return mask.mapv(|v| u8::from(v != 0));
    }
    erode(&dilate(mask, radius), radius)
}

/// Label 6-connected foreground components.
///
/// Labels start at 1 and follow the order in which components are first
/// reached by a scan over `[x, y, z]` with `x` varying fastest. Returns the
/// label volume and the voxel count of each component (index `label - 1`).
pub fn label_components(mask: &Array3<u8>) -> (Array3<u32>, Vec<usize>) {
    let dims = dims_of(mask);
    let mut labels = Array3::<u32>::zeros(mask.raw_dim());
    let mut sizes = Vec::new();
    let mut queue = VecDeque::new();

    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                if mask[(x, y, z)] == 0 || labels[(x, y, z)] != 0 {
                    continue;
                }
                let label = sizes.len() as u32 + 1;
                let mut count = 0usize;
                labels[(x, y, z)] = label;
                queue.push_back([x, y, z]);
                while let Some(index) = queue.pop_front() {
                    count += 1;
                    for offset in FACE_NEIGHBORS {
                        if let Some([a, b, c]) = offset_index(dims, index, offset) {
                            if mask[(a, b, c)] != 0 && labels[(a, b, c)] == 0 {
                                labels[(a, b, c)] = label;
                                queue.push_back([a, b, c]);
                            }
                        }
                    }
                }
                sizes.push(count);
            }
        }
    }
    (labels, sizes)
}

/// Keep only the largest 6-connected component. Ties go to the component
/// reached first in scan order.
pub fn largest_component(mask: &Array3<u8>) -> Array3<u8> {
    let (labels, sizes) = label_components(mask);
    let mut best: Option<(usize, usize)> = None;
    for (i, &size) in sizes.iter().enumerate() {
        if best.map_or(true, |(_, best_size)| size > best_size) {
            best = Some((i, size));
        }
    }
    match best {
        Some((i, _)) => {
            let keep = i as u32 + 1;
            labels.mapv(|l| u8::from(l == keep))
        }
        None => Array3::zeros(mask.raw_dim()),
    }
}

/// Fill background cavities not 6-connected to the grid border.
pub fn fill_holes(mask: &Array3<u8>) -> Array3<u8> {
    let dims = dims_of(mask);
    let mut outside = Array3::<bool>::from_elem(mask.raw_dim(), false);
    let mut queue = VecDeque::new();

    for z in 0..dims[2] {
        for y in 0..dims[1] {
            for x in 0..dims[0] {
                let on_border = x == 0
                    || y == 0
                    || z == 0
                    || x + 1 == dims[0]
                    || y + 1 == dims[1]
                    || z + 1 == dims[2];
                if on_border && mask[(x, y, z)] == 0 && !outside[(x, y, z)] {
                    outside[(x, y, z)] = true;
                    queue.push_back([x, y, z]);
                }
            }
        }
    }

    while let Some(index) = queue.pop_front() {
        for offset in FACE_NEIGHBORS {
            if let Some([a, b, c]) = offset_index(dims, index, offset) {
                if mask[(a, b, c)] == 0 && !outside[(a, b, c)] {
                    outside[(a, b, c)] = true;
                    queue.push_back([a, b, c]);
                }
            }
        }
    }

    outside.mapv(|o| u8::from(!o))
}
