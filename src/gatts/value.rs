use super::*;

/// Characteristic value store.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(super) struct Value {
    buf: Vec<u8>,
    max: usize,
    var: bool,
}

impl Value {
    /// Creates a value store with the initial value `v`.
    pub fn new(v: &[u8], max: usize, var: bool) -> Result<Self> {
        let mut this = Self {
            buf: Vec::with_capacity(if var { v.len() } else { max }),
            max,
            var,
        };
        this.check(v.len())?;
        this.buf.extend_from_slice(v);
        Ok(this)
    }

    /// Returns an error if a value of length `n` does not fit.
    #[inline]
    pub fn check(&self, n: usize) -> Result<()> {
        if n > self.max {
            return Err(Error::ValueTooLong {
                len: n,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Returns whether `n` bytes written at offset `off` fit.
    #[inline]
    pub const fn fits(&self, off: u16, n: usize) -> bool {
        off as usize + n <= self.max
    }

    /// Replaces the current value. The caller must check the length first.
    #[inline]
    pub fn set(&mut self, v: &[u8]) {
        debug_assert!(v.len() <= self.max);
        self.buf.clear();
        self.buf.extend_from_slice(v);
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline(always)]
    pub const fn max_len(&self) -> usize {
        self.max
    }

    #[inline(always)]
    pub const fn is_variable_len(&self) -> bool {
        self.var
    }
}

impl AsRef<[u8]> for Value {
    #[inline(always)]
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}
