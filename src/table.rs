//! Unique table for BDD nodes.
//!
//! A chained hash table that stores each distinct value once and hands out
//! stable indices. Index 0 is a sentinel and never holds a value. The table
//! doubles its storage and rehashes its buckets when full.

use std::ops::Index;

/// [Szudzik pairing function][szudzik-pairing].
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

pub trait MyHash {
    /// Structural hash used for bucket selection.
    fn hash(&self) -> u64;
}

pub struct Table<T> {
    data: Vec<T>,
    next: Vec<usize>,
    buckets: Vec<usize>,
    bitmask: u64,
}

impl<T> Table<T>
where
    T: Default,
{
    /// Create a new table with room for `2^bits` values.
    pub fn new(bits: usize) -> Self {
        assert!(bits <= 31, "Storage bits should be in the range 0..=31");

        let capacity = 1 << bits;
        let mut data = Vec::with_capacity(capacity);
        data.push(T::default()); // sentinel
        let buckets = vec![0; capacity.max(2)];
        let bitmask = (buckets.len() - 1) as u64;

        Self {
            data,
            next: vec![0],
            buckets,
            bitmask,
        }
    }
}

impl<T> Table<T> {
    /// Number of values stored, excluding the sentinel.
    pub fn len(&self) -> usize {
        self.data.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.buckets.len()
    }

    pub fn value(&self, index: usize) -> &T {
        assert_ne!(index, 0, "Index is 0");
        &self.data[index]
    }

    /// Index of the next value in the same bucket, or 0.
    pub fn next(&self, index: usize) -> usize {
        assert_ne!(index, 0, "Index is 0");
        self.next[index]
    }

    fn add(&mut self, value: T) -> usize {
        self.data.push(value);
        self.next.push(0);
        self.data.len() - 1
    }
}

impl<T> Table<T>
where
    T: MyHash + Eq,
{
    fn bucket_index(&self, value: &T) -> usize {
        (value.hash() & self.bitmask) as usize
    }

    /// Double the bucket array and relink every stored value.
    fn rehash(&mut self) {
        let size = self.buckets.len() * 2;
        self.buckets = vec![0; size];
        self.bitmask = (size - 1) as u64;
        for index in 1..self.data.len() {
            let b = self.bucket_index(&self.data[index]);
            self.next[index] = self.buckets[b];
            self.buckets[b] = index;
        }
    }

    /// Put a value into the table and return its index.
    ///
    /// Returns the index of the existing copy if the value is already present.
    pub fn put(&mut self, value: T) -> usize {
        let bucket = self.bucket_index(&value);
        let mut index = self.buckets[bucket];
        while index != 0 {
            if self.data[index] == value {
                return index;
            }
            index = self.next[index];
        }

        let i = self.add(value);
        self.next[i] = self.buckets[bucket];
        self.buckets[bucket] = i;

        if self.len() > self.buckets.len() {
            self.rehash();
        }
        i
    }
}

impl<T> Index<usize> for Table<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.value(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
    struct Item(i32);

    impl MyHash for Item {
        fn hash(&self) -> u64 {
            self.0.unsigned_abs() as u64
        }
    }

    #[test]
    fn test_szudzik() {
        // a\b  0  1  2  3  4
        // ------------------
        // 0    0  1  4  9 16
        // 1    2  3  5 10 17
        // 2    6  7  8 11 18
        assert_eq!(pairing2(0, 0), 0);
        assert_eq!(pairing2(0, 1), 1);
        assert_eq!(pairing2(1, 0), 2);
        assert_eq!(pairing2(1, 2), 5);
        assert_eq!(pairing2(2, 1), 7);
        assert_eq!(pairing2(0, 4), 16);
    }

    #[test]
    fn test_put() {
        let mut table = Table::new(2);
        let index1 = table.put(Item(5));
        let index2 = table.put(Item(-5));
        assert_ne!(index1, index2);
        assert_eq!(table[index1], Item(5));
        assert_eq!(table[index2], Item(-5));
        assert_eq!(table.next(index2), index1);
        assert_eq!(table.put(Item(5)), index1);
    }

    #[test]
    fn test_grows() {
        let mut table = Table::new(1);
        let indices: Vec<usize> = (0..100).map(|i| table.put(Item(i))).collect();
        assert_eq!(table.len(), 100);
        assert!(table.num_buckets() >= 100);
        for (i, &index) in indices.iter().enumerate() {
            assert_eq!(table.put(Item(i as i32)), index);
            assert_eq!(table[index], Item(i as i32));
        }
    }
}
