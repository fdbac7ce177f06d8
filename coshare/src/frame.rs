//! Private storage for the stack of a suspended coroutine.

/// Copy of the part of the shared stack a coroutine was using
/// when it last yielded.
///
/// The buffer only ever grows, and it grows by replacement:
/// when a frame does not fit, the old buffer is discarded
/// and a new one of exactly the required size is allocated.
/// Shallower frames reuse the existing buffer.
pub struct SavedFrame
{
    buf: Box<[u8]>,
    len: usize,
}

impl SavedFrame
{
    /// Create an empty saved frame without allocating.
    pub fn new() -> Self
    {
        Self{buf: Box::new([]), len: 0}
    }

    /// The number of bytes the buffer can hold without growing.
    pub fn capacity(&self) -> usize
    {
        self.buf.len()
    }

    /// The number of bytes saved by the last call to [`save`][`Self::save`].
    pub fn len(&self) -> usize
    {
        self.len
    }

    /// The saved bytes.
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.buf[.. self.len]
    }

    /// Replace the saved bytes with `bytes`.
    pub fn save(&mut self, bytes: &[u8])
    {
        if self.buf.len() < bytes.len() {
            self.buf = vec![0; bytes.len()].into_boxed_slice();
        }
        self.buf[.. bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len();
    }
}

impl Default for SavedFrame
{
    fn default() -> Self
    {
        Self::new()
    }
}

#[cfg(test)]
mod tests
{
    use {
        super::*,
        proptest::{self as p, proptest},
    };

    #[test]
    fn new_is_empty()
    {
        let frame = SavedFrame::new();
        assert_eq!(frame.len(), 0);
        assert_eq!(frame.capacity(), 0);
        assert!(frame.as_bytes().is_empty());
    }

    #[test]
    fn grows_to_exact_size()
    {
        let mut frame = SavedFrame::new();
        frame.save(&[1, 2, 3]);
        assert_eq!(frame.capacity(), 3);
        frame.save(&[4]);
        assert_eq!(frame.capacity(), 3);
        assert_eq!(frame.as_bytes(), &[4]);
        frame.save(&[5; 10]);
        assert_eq!(frame.capacity(), 10);
        assert_eq!(frame.as_bytes(), &[5; 10]);
    }

    proptest!
    {
        #[test]
        fn capacity_never_shrinks(
            frames in p::collection::vec(
                p::collection::vec(p::num::u8::ANY, 0 .. 512),
                p::collection::SizeRange::default(),
            ),
        )
        {
            let mut frame = SavedFrame::new();
            let mut max = 0;
            for bytes in frames {
                let before = frame.capacity();
                frame.save(&bytes);
                max = max.max(bytes.len());
                assert!(frame.capacity() >= before);
                assert_eq!(frame.capacity(), max);
                assert!(frame.len() <= frame.capacity());
                assert_eq!(frame.as_bytes(), &bytes[..]);
            }
        }
    }
}
