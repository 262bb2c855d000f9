use crate::scene::model::Scene;
use xxhash_rust::xxh3::Xxh3;

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Stable per-frame fingerprint used by static-frame elision caches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameFingerprint {
    /// High 64 bits of the 128-bit digest.
    pub hi: u64,
    /// Low 64 bits of the 128-bit digest.
    pub lo: u64,
}

/// Fingerprint the evaluated state of `scene` at `t_s`.
///
/// Layer content is constant within one snapshot, so only the drawn layers' ids, order, evaluated
/// transforms and opacities are hashed. The time itself is not, so a still stretch of an animation
/// elides across frames.
pub fn fingerprint_at(scene: &Scene, t_s: f64) -> FrameFingerprint {
    let mut h = StableHasher::new();
    h.write_u32(scene.canvas().width);
    h.write_u32(scene.canvas().height);
    h.write_bytes(&scene.background().to_premul().to_array());

    let mut drawn = 0u32;
    for layer in scene.layers() {
        if !layer.visible {
            continue;
        }
        let (t, opacity) = layer.evaluated_at(t_s);
        if opacity <= 0.0 {
            continue;
        }
        drawn += 1;
        h.write_u64(layer.id.0);
        h.write_f64(t.x);
        h.write_f64(t.y);
        h.write_f64(t.scale_x);
        h.write_f64(t.scale_y);
        h.write_f64(t.rotation_deg);
        h.write_f64(opacity);
    }
    h.write_u32(drawn);
    h.finish()
}

struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_bytes(&mut self, b: &[u8]) {
        self.inner.update(b);
    }

    fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_f64(&mut self, v: f64) {
        // -0.0 and 0.0 draw identically.
        let v = if v == 0.0 { 0.0 } else { v };
        self.write_u64(v.to_bits());
    }

    fn finish(self) -> FrameFingerprint {
        let v = self.inner.digest128();
        FrameFingerprint {
            hi: (v >> 64) as u64,
            lo: v as u64,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/fingerprint.rs"]
mod tests;
