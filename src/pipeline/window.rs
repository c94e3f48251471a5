//! Fixed-capacity circular window over the most recent values.

/// Ring buffer that keeps the last `N` pushed values.
///
/// Indexing is relative to the newest value: `get(0)` is the most recent push,
/// `get(1)` the one before it, and so on.
#[derive(Debug, Clone)]
pub struct RotatingWindow<T, const N: usize> {
    slots: [Option<T>; N],
    cursor: usize,
    len: usize,
}

impl<T: Copy, const N: usize> RotatingWindow<T, N> {
    pub fn new() -> Self {
        Self {
            slots: [None; N],
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Push a value, evicting the oldest one once full.
    pub fn push(&mut self, value: T) {
        self.slots[self.cursor] = Some(value);
        self.cursor = (self.cursor + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    /// Value `age` pushes back from the newest, if still retained.
    pub fn get(&self, age: usize) -> Option<T> {
        if age >= self.len {
            return None;
        }
        let index = (self.cursor + N - 1 - age) % N;
        self.slots[index]
    }

    /// Values from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).rev().filter_map(move |age| self.get(age))
    }
}

impl<T: Copy, const N: usize> Default for RotatingWindow<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
