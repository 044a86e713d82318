//! SparseIdMap - two-level lookup over the 16-bit id space
//!
//! The high byte of an id selects a slot in a fixed index; the slot points into an
//! arena of 256-entry sub-tables that are only allocated when an id in that range
//! is first inserted. Lookups are two array accesses with no hashing.

const TABLE_SIZE: usize = 256;

/// Sparse map keyed by a 16-bit identifier
#[derive(Debug, Clone)]
pub struct SparseIdMap<T> {
    /// High byte -> arena index of the sub-table
    index: Box<[Option<u16>; TABLE_SIZE]>,
    /// Arena of lazily created sub-tables
    tables: Vec<Vec<Option<T>>>,
    len: usize,
}

impl<T> Default for SparseIdMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseIdMap<T> {
    /// Create an empty map; no sub-table is allocated yet
    pub fn new() -> Self {
        Self {
            index: Box::new([None; TABLE_SIZE]),
            tables: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    fn split(id: u16) -> (usize, usize) {
        ((id as usize) / TABLE_SIZE, (id as usize) % TABLE_SIZE)
    }

    /// Get the value stored for `id`
    pub fn get(&self, id: u16) -> Option<&T> {
        let (hi, lo) = Self::split(id);
        let slot = self.index[hi]?;
        self.tables[slot as usize][lo].as_ref()
    }

    /// Get a mutable reference to the value stored for `id`
    pub fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        let (hi, lo) = Self::split(id);
        let slot = self.index[hi]?;
        self.tables[slot as usize][lo].as_mut()
    }

    pub fn contains(&self, id: u16) -> bool {
        self.get(id).is_some()
    }

    /// Insert a value, returning the previous one for the same id
    pub fn insert(&mut self, id: u16, value: T) -> Option<T> {
        let (hi, lo) = Self::split(id);
        let slot = match self.index[hi] {
            Some(slot) => slot as usize,
            None => {
                let slot = self.tables.len();
                self.tables
                    .push(std::iter::repeat_with(|| None).take(TABLE_SIZE).collect());
                // At most 256 tables exist, so the arena index fits in u16
                self.index[hi] = Some(slot as u16);
                slot
            }
        };

        let previous = self.tables[slot][lo].replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the value stored for `id`
    ///
    /// Sub-tables stay allocated; they are reused by later inserts.
    pub fn remove(&mut self, id: u16) -> Option<T> {
        let (hi, lo) = Self::split(id);
        let slot = self.index[hi]?;
        let removed = self.tables[slot as usize][lo].take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated sub-tables
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Iterate stored values in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> + '_ {
        self.index
            .iter()
            .enumerate()
            .filter_map(|(hi, slot)| slot.map(|s| (hi, s as usize)))
            .flat_map(move |(hi, slot)| {
                self.tables[slot]
                    .iter()
                    .enumerate()
                    .filter_map(move |(lo, v)| {
                        v.as_ref().map(|v| ((hi * TABLE_SIZE + lo) as u16, v))
                    })
            })
    }
}
