use thiserror::Error;

/// Number of bits per block
const BITS_PER_BLOCK: usize = 64;

/// Returned when every mask bit is in use.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("exceeded maximum inter-router connection count ({capacity})")]
pub(crate) struct MaskBitsExhausted {
    pub(crate) capacity: usize,
}

/// The pool of mask bits handed out to inter-router connections.
///
/// A set bit means the mask bit is free. Only the core thread touches the pool, so no
/// synchronization is needed.
#[derive(Debug)]
pub(crate) struct MaskBitPool {
    /// Bitmap blocks (each u64 holds 64 free bits)
    blocks: Box<[u64]>,
    /// Number of mask bits in the pool
    capacity: usize,
}

impl MaskBitPool {
    /// Creates a pool with every bit below `capacity` free.
    pub(crate) fn new(capacity: usize) -> Self {
        let num_blocks = capacity.div_ceil(BITS_PER_BLOCK);
        let blocks: Vec<u64> = (0..num_blocks)
            .map(|block| {
                let remaining = capacity - block * BITS_PER_BLOCK;
                if remaining >= BITS_PER_BLOCK {
                    u64::MAX
                } else {
                    (1u64 << remaining) - 1
                }
            })
            .collect();

        Self { blocks: blocks.into_boxed_slice(), capacity }
    }

    /// Claims the lowest-numbered free bit.
    pub(crate) fn claim(&mut self) -> Result<usize, MaskBitsExhausted> {
        for (block_idx, block) in self.blocks.iter_mut().enumerate() {
            if *block == 0 {
                continue;
            }

            let bit_idx = block.trailing_zeros() as usize;
            *block &= !(1u64 << bit_idx);
            return Ok(block_idx * BITS_PER_BLOCK + bit_idx);
        }

        Err(MaskBitsExhausted { capacity: self.capacity })
    }

    /// Returns a bit to the pool.
    pub(crate) fn release(&mut self, bit: usize) {
        if bit >= self.capacity {
            return;
        }

        debug_assert!(!self.is_free(bit), "mask bit {bit} released twice");
        self.blocks[bit / BITS_PER_BLOCK] |= 1u64 << (bit % BITS_PER_BLOCK);
    }

    /// Returns `true` if the bit is free.
    pub(crate) fn is_free(&self, bit: usize) -> bool {
        if bit >= self.capacity {
            return false;
        }

        self.blocks[bit / BITS_PER_BLOCK] & (1u64 << (bit % BITS_PER_BLOCK)) != 0
    }

    /// Returns the number of free bits.
    pub(crate) fn free_count(&self) -> usize {
        self.blocks.iter().map(|block| block.count_ones() as usize).sum()
    }
}
