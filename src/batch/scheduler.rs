use std::ops::Range;

/// Partitioning of `total` items into chunks and concurrency groups.
///
/// All ranges are in global index space, so an item keeps its input position
/// however the run is sliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk_size: usize,
    concurrency_limit: Option<usize>,
}

impl ChunkPlan {
    pub fn new(total: usize, chunk_size: Option<usize>, concurrency_limit: Option<usize>) -> Self {
        let chunk_size = match chunk_size {
            Some(size) if size > 0 => size,
            _ => total,
        };

        Self {
            total,
            chunk_size,
            concurrency_limit: concurrency_limit.filter(|l| *l > 0),
        }
    }

    /// `ceil(total / chunk_size)`; a run with no items still has one (empty) chunk
    pub fn total_chunks(&self) -> usize {
        if self.total == 0 {
            1
        } else {
            self.total.div_ceil(self.chunk_size)
        }
    }

    /// Global index ranges of each chunk, in drain order
    pub fn chunks(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.total_chunks()).map(move |chunk_index| {
            let start = chunk_index * self.chunk_size;
            start..(start + self.chunk_size).min(self.total)
        })
    }

    /// Groups launched together within `chunk`.
    ///
    /// The whole chunk is one group unless a concurrency limit is set and the
    /// chunk is longer than it.
    pub fn groups(&self, chunk: Range<usize>) -> Vec<Range<usize>> {
        match self.concurrency_limit {
            Some(limit) if chunk.len() > limit => chunk
                .clone()
                .step_by(limit)
                .map(|start| start..(start + limit).min(chunk.end))
                .collect(),
            _ => vec![chunk],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lengths(ranges: &[Range<usize>]) -> Vec<usize> {
        ranges.iter().map(|r| r.len()).collect()
    }

    #[test]
    fn test_chunks_with_remainder() {
        let plan = ChunkPlan::new(10, Some(3), None);
        let chunks: Vec<_> = plan.chunks().collect();

        assert_eq!(plan.total_chunks(), 4);
        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn test_single_chunk_without_size() {
        let plan = ChunkPlan::new(5, None, None);
        let chunks: Vec<_> = plan.chunks().collect();

        assert_eq!(chunks, vec![0..5]);
        assert_eq!(plan.groups(0..5), vec![0..5]);
    }

    #[test]
    fn test_groups_sliced_by_concurrency() {
        let plan = ChunkPlan::new(5, None, Some(2));
        let groups = plan.groups(0..5);

        assert_eq!(groups, vec![0..2, 2..4, 4..5]);
        assert_eq!(lengths(&groups), vec![2, 2, 1]);
    }

    #[test]
    fn test_groups_keep_global_offsets() {
        let plan = ChunkPlan::new(10, Some(4), Some(3));
        let chunks: Vec<_> = plan.chunks().collect();

        assert_eq!(plan.groups(chunks[1].clone()), vec![4..7, 7..8]);
        // last chunk is 2 long, within the limit
        assert_eq!(plan.groups(chunks[2].clone()), vec![8..10]);
    }

    #[test]
    fn test_limit_equal_to_chunk_is_one_group() {
        let plan = ChunkPlan::new(6, Some(3), Some(3));
        assert_eq!(plan.groups(0..3), vec![0..3]);
    }

    #[test]
    fn test_empty_plan() {
        let plan = ChunkPlan::new(0, Some(3), Some(2));
        let chunks: Vec<_> = plan.chunks().collect();

        assert_eq!(plan.total_chunks(), 1);
        assert_eq!(chunks, vec![0..0]);
    }
}
