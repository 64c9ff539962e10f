//! Utility functions for batched writes.
//!
//! This module provides shared utilities for splitting records into
//! numbered write batches.

/// Split records into numbered batches.
///
/// # Arguments
///
/// * `records` - Slice of records to split
/// * `batch_size` - Maximum records per batch; zero is treated as one
///
/// # Returns
///
/// Iterator of `(batch_number, batch)` pairs, numbered from 1, where each
/// batch contains at most `batch_size` records.
pub fn numbered_batches<T>(records: &[T], batch_size: usize) -> impl Iterator<Item = (usize, &[T])> {
    records
        .chunks(batch_size.max(1))
        .enumerate()
        .map(|(i, batch)| (i + 1, batch))
}

/// Number of batches `total` records split into.
#[must_use]
pub const fn batch_count(total: usize, batch_size: usize) -> usize {
    let size = if batch_size == 0 { 1 } else { batch_size };
    total.div_ceil(size)
}
