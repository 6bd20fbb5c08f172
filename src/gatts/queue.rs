use smallvec::SmallVec;

use crate::att::ErrorCode;

/// Prepared write chunk.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Chunk {
    off: u16,
    data: Vec<u8>,
}

/// Per-characteristic prepared write queue. The transaction is open while
/// `chunks` is `Some`, even if no data was queued.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct WriteQueue {
    chunks: Option<SmallVec<[Chunk; 4]>>,
}

impl WriteQueue {
    /// Appends a chunk, opening the transaction if needed.
    pub fn push(&mut self, off: u16, data: &[u8]) {
        (self.chunks.get_or_insert_with(SmallVec::new)).push(Chunk {
            off,
            data: data.to_vec(),
        });
    }

    /// Returns whether a transaction is open.
    #[inline(always)]
    pub const fn is_open(&self) -> bool {
        self.chunks.is_some()
    }

    /// Checks that chunk offsets are contiguous in arrival order starting at 0
    /// and that the reassembled value fits in `max` bytes.
    pub fn validate(&self, max: usize) -> Result<(), ErrorCode> {
        let Some(chunks) = self.chunks.as_ref() else {
            return Ok(());
        };
        let mut n = 0;
        for c in chunks {
            if usize::from(c.off) != n {
                return Err(ErrorCode::InvalidOffset);
            }
            n += c.data.len();
        }
        if n > max {
            return Err(ErrorCode::InvalidAttributeValueLength);
        }
        Ok(())
    }

    /// Closes the transaction and returns the chunk data concatenated in
    /// arrival order. Offsets are not used for placement. Returns `None` if no
    /// transaction was open.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        let chunks = self.chunks.take()?;
        let mut v = Vec::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
        for c in chunks {
            v.extend_from_slice(&c.data);
        }
        Some(v)
    }

    /// Discards the transaction. Returns whether one was open.
    #[inline]
    pub fn clear(&mut self) -> bool {
        self.chunks.take().is_some()
    }
}
