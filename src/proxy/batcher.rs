//! Order-preserving partitioning of records into upload batches

use crate::proxy::models::{Batch, ProxyRecord};
use std::num::NonZeroUsize;

/// Default number of records per upload batch
pub const DEFAULT_BATCH_CAPACITY: usize = 50;

/// Split records into consecutive batches of at most `capacity` members.
///
/// Concatenating the members of the returned batches reproduces `records`
/// exactly; only the last batch may be under capacity.
pub fn partition(records: &[ProxyRecord], capacity: NonZeroUsize) -> Vec<Batch> {
    records
        .chunks(capacity.get())
        .enumerate()
        .map(|(index, chunk)| Batch::new(index, chunk.to_vec()))
        .collect()
}

/// Number of batches `partition` produces for `len` records
pub fn expected_batches(len: usize, capacity: NonZeroUsize) -> usize {
    len.div_ceil(capacity.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::models::ProtocolSet;

    fn records(n: usize) -> Vec<ProxyRecord> {
        (0..n)
            .map(|i| {
                ProxyRecord::new(
                    format!("10.0.{}.{}", i / 256, i % 256),
                    8000 + i as u16,
                    ProtocolSet::default(),
                )
                .unwrap()
            })
            .collect()
    }

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_empty_input() {
        assert!(partition(&[], cap(50)).is_empty());
        assert_eq!(expected_batches(0, cap(50)), 0);
    }

    #[test]
    fn test_sizes_and_indices() {
        let batches = partition(&records(120), cap(50));
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        let indices: Vec<usize> = batches.iter().map(|b| b.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        for len in [0, 1, 7, 49, 50, 51, 100, 133] {
            for capacity in [1, 3, 50, 200] {
                let input = records(len);
                let batches = partition(&input, cap(capacity));
                let rebuilt: Vec<ProxyRecord> =
                    batches.into_iter().flat_map(|b| b.members).collect();
                assert_eq!(rebuilt, input, "len={} capacity={}", len, capacity);
                assert_eq!(
                    partition(&input, cap(capacity)).len(),
                    expected_batches(len, cap(capacity))
                );
            }
        }
    }

    #[test]
    fn test_no_batch_exceeds_capacity() {
        let batches = partition(&records(101), cap(25));
        assert!(batches.iter().all(|b| b.len() <= 25 && !b.is_empty()));
        assert_eq!(batches.last().map(Batch::len), Some(1));
    }
}
