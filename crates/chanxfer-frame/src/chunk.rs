use bytes::Bytes;

/// Number of chunks a payload of `len` bytes splits into.
pub fn chunk_count(len: usize, max_chunk_size: usize) -> usize {
    if max_chunk_size == 0 {
        return 0;
    }
    len.div_ceil(max_chunk_size)
}

/// Iterator over consecutive, non-overlapping slices of a payload.
///
/// Slices share the payload's storage (`Bytes::slice`), come out in
/// ascending offset order, and are at most `max_chunk_size` bytes; only the
/// last one may be shorter. An empty payload yields nothing.
#[derive(Debug, Clone)]
pub struct Chunks {
    payload: Bytes,
    offset: usize,
    max_chunk_size: usize,
}

impl Chunks {
    /// Split `payload` into slices of at most `max_chunk_size` bytes.
    ///
    /// A zero `max_chunk_size` yields no chunks.
    pub fn new(payload: Bytes, max_chunk_size: usize) -> Self {
        Self {
            payload,
            offset: 0,
            max_chunk_size,
        }
    }

    /// Offset of the next chunk within the payload.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for Chunks {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.max_chunk_size == 0 || self.offset >= self.payload.len() {
            return None;
        }
        let end = (self.offset + self.max_chunk_size).min(self.payload.len());
        let chunk = self.payload.slice(self.offset..end);
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = chunk_count(
            self.payload.len().saturating_sub(self.offset),
            self.max_chunk_size,
        );
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks {}
