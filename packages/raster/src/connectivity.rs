//! Connected-component pixel counts.
//!
//! Components are labelled in two raster passes: the first assigns
//! provisional labels from the already-visited half of the 8-neighbourhood
//! and records label equivalences in a union-find table, the second resolves
//! every label to its root and tallies component sizes.

use ndarray::Array2;

use crate::Raster;

/// Neighbours visited before a pixel in row-major order.
const PREVIOUS: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];

/// Size of each pixel's connected component, capped at `max_size`.
///
/// Components are groups of set pixels with identical values joined through
/// any of their eight neighbours. Every pixel of a component receives the
/// component's size, or `max_size` if the component is larger. Unset pixels
/// stay unset.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn connected_pixel_count(raster: &Raster, max_size: usize) -> Raster {
    let (labels, sizes) = label_components(raster);
    let components = sizes.iter().filter(|&&size| size > 0).count();

    log::debug!(
        "'{}': {components} connected component(s), cap {max_size}",
        raster.band()
    );

    let counts = labels.mapv(|label| (label > 0).then(|| sizes[label].min(max_size) as f64));
    Raster::from_pixels("connections", *raster.spec(), counts)
}

/// Labels 8-connected components of equal-valued set pixels.
///
/// Returns the label array, `0` for unset pixels, and the pixel count of
/// each label. Only root labels have a non-zero count.
fn label_components(raster: &Raster) -> (Array2<usize>, Vec<usize>) {
    let pixels = raster.values();
    let (height, width) = pixels.dim();
    let mut labels = Array2::<usize>::zeros((height, width));
    let mut parent = vec![0usize];

    for row in 0..height {
        for col in 0..width {
            let Some(value) = pixels[[row, col]] else {
                continue;
            };

            let mut label = 0;
            for (dr, dc) in PREVIOUS {
                let (Some(r), Some(c)) = (row.checked_add_signed(dr), col.checked_add_signed(dc))
                else {
                    continue;
                };
                if c >= width || pixels[[r, c]] != Some(value) {
                    continue;
                }
                let neighbour = labels[[r, c]];
                if label == 0 {
                    label = neighbour;
                } else if neighbour != label {
                    union(&mut parent, label, neighbour);
                }
            }

            if label == 0 {
                label = parent.len();
                parent.push(label);
            }
            labels[[row, col]] = label;
        }
    }

    let mut sizes = vec![0usize; parent.len()];
    for label in &mut labels {
        if *label > 0 {
            *label = find(&mut parent, *label);
            sizes[*label] += 1;
        }
    }
    (labels, sizes)
}

fn find(parent: &mut [usize], mut label: usize) -> usize {
    while parent[label] != label {
        parent[label] = parent[parent[label]];
        label = parent[label];
    }
    label
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let a = find(parent, a);
    let b = find(parent, b);
    if a != b {
        parent[a.max(b)] = a.min(b);
    }
}
