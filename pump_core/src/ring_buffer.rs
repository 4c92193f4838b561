//! Fixed-capacity circular buffer with oldest-overwrite semantics.
//!
//! Indexing is logical: index 0 is the oldest stored element and
//! `len() - 1` the most recent, regardless of where the write cursor sits.

use crate::error::IndexOutOfRange;

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    // physical index of the oldest element
    start: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create an empty buffer. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            start: 0,
            len: 0,
        }
    }

    /// Append `value`, overwriting the oldest element when full.
    pub fn push_back(&mut self, value: T) {
        if self.len < self.capacity {
            // start is always 0 while filling (it only moves once full)
            let idx = (self.start + self.len) % self.capacity;
            if idx < self.buf.len() {
                self.buf[idx] = value;
            } else {
                self.buf.push(value);
            }
            self.len += 1;
        } else {
            self.buf[self.start] = value;
            self.start = (self.start + 1) % self.capacity;
        }
    }

    /// Discard all elements in O(1). Storage is kept for reuse.
    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn physical(&self, index: usize) -> Result<usize, IndexOutOfRange> {
        if index >= self.len {
            return Err(IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        Ok((self.start + index) % self.capacity)
    }

    /// Element at logical `index` (0 = oldest).
    pub fn get(&self, index: usize) -> Result<&T, IndexOutOfRange> {
        let i = self.physical(index)?;
        Ok(&self.buf[i])
    }

    /// Mutable element at logical `index` (0 = oldest).
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T, IndexOutOfRange> {
        let i = self.physical(index)?;
        Ok(&mut self.buf[i])
    }

    /// Oldest-first iterator over the stored elements.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &T> + '_ {
        (0..self.len).map(move |i| &self.buf[(self.start + i) % self.capacity])
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Linearized copy of the contents, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_then_overwrites_oldest() {
        let mut rb = RingBuffer::new(3);
        rb.push_back(1);
        rb.push_back(2);
        assert_eq!(rb.len(), 2);
        assert!(!rb.is_full());
        rb.push_back(3);
        rb.push_back(4);
        assert!(rb.is_full());
        assert_eq!(rb.to_vec(), vec![2, 3, 4]);
        assert_eq!(*rb.get(0).unwrap(), 2);
        assert_eq!(*rb.get(2).unwrap(), 4);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let mut rb = RingBuffer::new(4);
        rb.push_back(10);
        let err = rb.get(1).unwrap_err();
        assert_eq!(err, IndexOutOfRange { index: 1, len: 1 });
        assert!(rb.get_mut(4).is_err());
    }

    #[test]
    fn get_mut_writes_through_logical_index() {
        let mut rb = RingBuffer::new(2);
        for v in 0..5 {
            rb.push_back(v);
        }
        *rb.get_mut(0).unwrap() = 42;
        assert_eq!(rb.to_vec(), vec![42, 4]);
    }

    #[test]
    fn clear_keeps_storage_and_restarts_fill() {
        let mut rb = RingBuffer::new(3);
        for v in 0..7 {
            rb.push_back(v);
        }
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.capacity(), 3);
        assert!(rb.get(0).is_err());
        rb.push_back(100);
        rb.push_back(101);
        assert_eq!(rb.to_vec(), vec![100, 101]);
        rb.push_back(102);
        rb.push_back(103);
        assert_eq!(rb.to_vec(), vec![101, 102, 103]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut rb = RingBuffer::new(0);
        assert_eq!(rb.capacity(), 1);
        rb.push_back('a');
        rb.push_back('b');
        assert_eq!(rb.to_vec(), vec!['b']);
    }
}
