use std::collections::HashMap;

/// Issues reusable integer ids with stack discipline.
///
/// `create` hands back the most recently freed id before minting a new
/// one. Double free is caller error and is not guarded.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u32,
    free: Vec<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id, reusing the most recently freed one first.
    pub fn create(&mut self) -> u32 {
        if let Some(id) = self.free.pop() {
            return id;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    /// Return an id to the free pool.
    pub fn free(&mut self, id: u32) {
        self.free.push(id);
    }
}

/// An [`IdAllocator`] that additionally stores a value under each id.
///
/// Used for the pending-call table and open generator streams.
#[derive(Debug, Default)]
pub struct IdRegistry<T> {
    allocator: IdAllocator,
    entries: HashMap<u32, T>,
}

impl<T> IdRegistry<T> {
    pub fn new() -> Self {
        Self {
            allocator: IdAllocator::new(),
            entries: HashMap::new(),
        }
    }

    /// Store `value` under a fresh id and return the id.
    pub fn register(&mut self, value: T) -> u32 {
        let id = self.allocator.create();
        self.entries.insert(id, value);
        id
    }

    /// Remove and return the value stored under `id`.
    ///
    /// The id is returned to the pool only if it was actually
    /// registered, so an unknown id (e.g. from a misbehaving peer)
    /// cannot poison the allocator.
    pub fn free(&mut self, id: u32) -> Option<T> {
        let value = self.entries.remove(&id);
        if value.is_some() {
            self.allocator.free(id);
        }
        value
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry and reset the allocator.
    pub fn drain(&mut self) -> Vec<T> {
        self.allocator = IdAllocator::new();
        self.entries.drain().map(|(_, value)| value).collect()
    }
}
