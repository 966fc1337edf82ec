//! Ember configuration: batch and stack capacities, blur chain, HDR format.

use render_api::TextureFormat;

/// Per-device renderer configuration. Applied by `Context` to every device it creates.
#[derive(Clone, Debug)]
pub struct EmberConfig {
    /// Vertices held by the batch before it flushes transparently.
    pub batch_capacity: usize,
    /// Depth limit of the matrix and state stacks.
    pub stack_capacity: usize,
    /// Number of blur render-target pairs (primary + scratch).
    pub blur_levels: usize,
    /// Smallest vertex buffer bucket, in vertices.
    pub min_vertex_bucket: usize,
    /// Number of vertex buffer size classes, halving from `batch_capacity`.
    pub vertex_bucket_count: usize,
    /// Format of the accumulation, bloom and blur targets.
    pub hdr_format: TextureFormat,
    pub default_blur_spread: f32,
}

impl Default for EmberConfig {
    fn default() -> Self {
        Self {
            batch_capacity: 1 << 15,
            stack_capacity: 256,
            blur_levels: 8,
            min_vertex_bucket: 256,
            vertex_bucket_count: 8,
            hdr_format: TextureFormat::Rgba16Float,
            default_blur_spread: 8.0,
        }
    }
}

impl EmberConfig {
    /// Clamp to values the batching engine and blur chain can work with.
    pub fn sanitized(mut self) -> Self {
        self.batch_capacity = self.batch_capacity.max(16) & !1;
        self.stack_capacity = self.stack_capacity.max(2);
        self.blur_levels = self.blur_levels.clamp(1, 8);
        self.min_vertex_bucket = self.min_vertex_bucket.clamp(1, self.batch_capacity);
        self.vertex_bucket_count = self.vertex_bucket_count.max(1);
        if !self.default_blur_spread.is_finite() || self.default_blur_spread < 0.0 {
            self.default_blur_spread = 8.0;
        }
        self
    }

    /// Vertex buffer size classes, largest first: `batch_capacity` halved down to `min_vertex_bucket`.
    pub fn vertex_buckets(&self) -> Vec<usize> {
        let mut buckets = Vec::with_capacity(self.vertex_bucket_count);
        let mut size = self.batch_capacity;
        while buckets.len() < self.vertex_bucket_count {
            buckets.push(size);
            let next = size / 2;
            if next < self.min_vertex_bucket || next == 0 {
                break;
            }
            size = next;
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_buckets_halve_to_256() {
        let buckets = EmberConfig::default().vertex_buckets();
        assert_eq!(buckets, vec![32768, 16384, 8192, 4096, 2048, 1024, 512, 256]);
    }

    #[test]
    fn sanitized_keeps_capacity_even() {
        let cfg = EmberConfig { batch_capacity: 33, stack_capacity: 0, blur_levels: 20, ..Default::default() }
            .sanitized();
        assert_eq!(cfg.batch_capacity, 32);
        assert_eq!(cfg.stack_capacity, 2);
        assert_eq!(cfg.blur_levels, 8);
        assert_eq!(cfg.min_vertex_bucket, 32);
        assert_eq!(cfg.vertex_buckets(), vec![32]);
    }
}
