//! Equal-split arithmetic for fan-out allocation.

use crate::error::Error;

/// Divide `total` into `parts` nearly-equal non-negative integers.
///
/// The first `total % parts` entries get one satoshi more than the rest, so
/// the result always sums to `total` exactly and no two entries differ by
/// more than 1. Order matters: callers zip the result positionally against a
/// separately ordered list of destination addresses.
pub fn split_equally(total: u64, parts: usize) -> Result<Vec<u64>, Error> {
    if parts == 0 {
        return Err(Error::InvalidArgument("cannot split into zero parts"));
    }

    let base = total / parts as u64;
    let remainder = (total - base * parts as u64) as usize;

    let mut amounts = Vec::with_capacity(parts);
    for index in 0..parts {
        amounts.push(if index < remainder { base + 1 } else { base });
    }

    debug_assert_eq!(amounts.len(), parts);
    debug_assert_eq!(amounts.iter().sum::<u64>(), total);

    Ok(amounts)
}
