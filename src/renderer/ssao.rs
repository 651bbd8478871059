//! SSAO Kernel and Noise Generation
//!
//! The SSAO pass marches a fixed set of tangent-space offsets per pixel
//! and rotates them by a small tiled noise texture. Both tables are built
//! once from seeded generators so every frame (and every run) samples the
//! same pattern.
//!
//! Kernel construction is stratified: sample `i` draws its direction from
//! the `i`-th slice of a cosine-weighted hemisphere, which keeps the set
//! evenly spread without a rejection loop. Offset lengths grow with a
//! cubic curve so most probes land close to the shaded point, where
//! occlusion contributes the most.

use std::f32::consts::TAU;

use glam::{Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::settings::{MAX_SSAO_KERNEL_SIZE, SSAO_NOISE_DIM};

const KERNEL_SEED: u64 = 0x00E7_B0A3_5EED;
const NOISE_SEED: u64 = 0x01C3_55A0_17E5;

/// Shortest offset length, as a fraction of the SSAO radius.
const MIN_OFFSET: f32 = 0.08;

/// Builds the hemisphere offset kernel (`samples` clamped to the
/// compile-time maximum). Offsets are tangent-space with +Z along the
/// surface normal.
#[must_use]
pub fn generate_ssao_kernel(samples: usize) -> Vec<Vec4> {
    let samples = samples.clamp(1, MAX_SSAO_KERNEL_SIZE);
    let mut rng = StdRng::seed_from_u64(KERNEL_SEED);
    let mut kernel = Vec::with_capacity(samples);

    for i in 0..samples {
        // Stratify elevation: jitter within this sample's slice of the
        // cosine-weighted hemisphere, azimuth fully random.
        let stratum = (i as f32 + rng.random_range(0.0..1.0)) / samples as f32;
        let cos_theta = (1.0 - stratum).sqrt();
        let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
        let phi = rng.random_range(0.0..TAU);

        let direction = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

        // Cubic length ramp: early samples hug the origin, the tail
        // reaches the full radius.
        let t = (i as f32 + 1.0) / samples as f32;
        let length = MIN_OFFSET + (1.0 - MIN_OFFSET) * t * t * t;

        kernel.push((direction * length).extend(0.0));
    }
    kernel
}

/// Builds the tiled rotation noise: `SSAO_NOISE_DIM`² unit rotation
/// vectors encoded as RGBA8. Angles follow a golden-ratio sequence with a
/// jitter on top, so neighboring texels decorrelate without visible
/// banding across tile repeats. The texture uses `Repeat` addressing and
/// `Nearest` filtering.
#[must_use]
pub fn generate_ssao_noise() -> Vec<[u8; 4]> {
    const GOLDEN: f32 = 0.618_034;

    let count = (SSAO_NOISE_DIM * SSAO_NOISE_DIM) as usize;
    let mut rng = StdRng::seed_from_u64(NOISE_SEED);
    let mut noise = Vec::with_capacity(count);

    for i in 0..count {
        let sequence = (i as f32 * GOLDEN).fract();
        let angle = (sequence + rng.random_range(0.0..1.0 / count as f32)) * TAU;

        noise.push([
            ((angle.cos() * 0.5 + 0.5) * 255.0) as u8,
            ((angle.sin() * 0.5 + 0.5) * 255.0) as u8,
            0,
            255,
        ]);
    }
    noise
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_deterministic() {
        assert_eq!(generate_ssao_kernel(16), generate_ssao_kernel(16));
    }

    #[test]
    fn kernel_samples_stay_in_upper_hemisphere() {
        for sample in generate_ssao_kernel(MAX_SSAO_KERNEL_SIZE) {
            assert!(sample.z >= 0.0);
            assert!(sample.truncate().length() <= 1.0 + 1e-5);
        }
    }

    #[test]
    fn kernel_lengths_ramp_outward() {
        let kernel = generate_ssao_kernel(32);
        let first = kernel.first().unwrap().truncate().length();
        let last = kernel.last().unwrap().truncate().length();
        assert!(first < 0.2, "early samples should hug the origin ({first})");
        assert!(last > 0.9, "the tail should reach the radius ({last})");
    }

    #[test]
    fn kernel_size_is_clamped() {
        assert_eq!(generate_ssao_kernel(10_000).len(), MAX_SSAO_KERNEL_SIZE);
        assert_eq!(generate_ssao_kernel(0).len(), 1);
    }

    #[test]
    fn noise_covers_the_tile_with_unit_rotations() {
        let noise = generate_ssao_noise();
        assert_eq!(noise.len(), (SSAO_NOISE_DIM * SSAO_NOISE_DIM) as usize);
        for texel in noise {
            let x = f32::from(texel[0]) / 255.0 * 2.0 - 1.0;
            let y = f32::from(texel[1]) / 255.0 * 2.0 - 1.0;
            let len = (x * x + y * y).sqrt();
            assert!((len - 1.0).abs() < 0.02, "rotation not unit length ({len})");
        }
    }
}
