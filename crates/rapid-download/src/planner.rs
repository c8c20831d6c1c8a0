//! Chunk planning.
//!
//! Planning is pure: the same `(total, chunk count)` pair always yields the
//! same ranges, so completed chunk indices stay valid across restarts.

use rapid_core::ByteRange;

/// Byte ranges for one download, in chunk-index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    /// One range per chunk; contiguous, disjoint, covering the resource.
    pub ranges: Vec<ByteRange>,
    /// Whether chunks may be fetched with range requests and resumed.
    pub resumable: bool,
}

impl ChunkPlan {
    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> u32 {
        u32::try_from(self.ranges.len()).unwrap_or(u32::MAX)
    }

    /// Whether the plan holds no chunks. Never true for a plan from [`plan`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Split a resource into chunks.
///
/// Unknown or zero sizes and providers without range support yield one
/// non-resumable chunk. Otherwise the resource is split into
/// `preferred` near-equal ranges (at least one byte each), the last range
/// absorbing the remainder.
#[must_use]
pub fn plan(total: Option<u64>, supports_ranges: bool, preferred: u32) -> ChunkPlan {
    let total = match total {
        Some(total) if total > 0 && supports_ranges => total,
        other => {
            let range = other.map_or(ByteRange::open(0), |t| ByteRange::new(0, t));
            return ChunkPlan {
                ranges: vec![range],
                resumable: false,
            };
        }
    };

    let count = u64::from(preferred.max(1)).min(total);
    let base = total / count;
    let ranges = (0..count)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == count { total } else { start + base };
            ByteRange::new(start, end)
        })
        .collect();

    ChunkPlan {
        ranges,
        resumable: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(plan: &ChunkPlan, total: u64) {
        let mut cursor = 0;
        for range in &plan.ranges {
            assert_eq!(range.start, cursor, "ranges must be contiguous");
            let end = range.end.unwrap();
            assert!(end > range.start, "ranges must be non-empty");
            cursor = end;
        }
        assert_eq!(cursor, total);
    }

    #[test]
    fn test_union_covers_resource_for_many_sizes() {
        for total in [1_u64, 2, 7, 8, 9, 100, 1023, 1024, 1_000_003, 5 * 1024 * 1024 * 1024] {
            for count in [1_u32, 2, 3, 4, 8, 16, 64] {
                let plan = plan(Some(total), true, count);
                assert!(plan.resumable);
                assert_eq!(u64::from(plan.len()), u64::from(count).min(total));
                assert_covers(&plan, total);
            }
        }
    }

    #[test]
    fn test_planning_is_deterministic() {
        assert_eq!(plan(Some(12_345), true, 7), plan(Some(12_345), true, 7));
    }

    #[test]
    fn test_last_range_absorbs_remainder() {
        let plan = plan(Some(10), true, 3);
        assert_eq!(
            plan.ranges,
            vec![ByteRange::new(0, 3), ByteRange::new(3, 6), ByteRange::new(6, 10)]
        );
    }

    #[test]
    fn test_no_range_support_yields_single_chunk() {
        let plan = plan(Some(500), false, 8);
        assert_eq!(plan.ranges, vec![ByteRange::new(0, 500)]);
        assert!(!plan.resumable);
    }

    #[test]
    fn test_unknown_size_yields_single_open_chunk() {
        let plan = plan(None, true, 8);
        assert_eq!(plan.ranges, vec![ByteRange::open(0)]);
        assert!(!plan.resumable);

        let plan = super::plan(Some(0), true, 8);
        assert_eq!(plan.len(), 1);
        assert!(!plan.resumable);
    }

    #[test]
    fn test_zero_preferred_is_one_chunk() {
        let plan = plan(Some(100), true, 0);
        assert_eq!(plan.ranges, vec![ByteRange::new(0, 100)]);
        assert!(plan.resumable);
    }
}
