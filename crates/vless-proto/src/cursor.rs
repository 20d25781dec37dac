//! Bounds-checked reader over an untrusted byte buffer.

/// Read position into a borrowed buffer.
///
/// Every read returns `None` instead of panicking when the buffer is too
/// short, and a failed read never moves the position.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Start at `pos`. A position past the end is allowed; reads then fail.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    #[inline]
    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    #[inline]
    pub fn read_u16_be(&mut self) -> Option<u16> {
        self.read_array::<2>().map(u16::from_be_bytes)
    }

    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Some(out)
    }

    pub fn read_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    #[inline]
    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.read_bytes(n).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_advance_position() {
        let data = [0x01, 0x01, 0xbb, 0xaa, 0xbb, 0xcc];
        let mut cur = Cursor::new(&data);
        assert_eq!(cur.read_u8(), Some(0x01));
        assert_eq!(cur.read_u16_be(), Some(0x01bb));
        assert_eq!(cur.read_bytes(2), Some(&[0xaa, 0xbb][..]));
        assert_eq!(cur.position(), 5);
        assert_eq!(cur.remaining(), 1);
    }

    #[test]
    fn failed_read_does_not_move() {
        let data = [1, 2, 3];
        let mut cur = Cursor::at(&data, 1);
        assert_eq!(cur.read_array::<4>(), None);
        assert_eq!(cur.skip(3), None);
        assert_eq!(cur.position(), 1);
        assert_eq!(cur.read_u16_be(), Some(0x0203));
        assert_eq!(cur.read_u8(), None);
    }

    #[test]
    fn start_past_end_is_empty() {
        let data = [1, 2];
        let mut cur = Cursor::at(&data, 10);
        assert_eq!(cur.remaining(), 0);
        assert_eq!(cur.read_u8(), None);
        assert_eq!(cur.read_bytes(usize::MAX), None);
    }
}
