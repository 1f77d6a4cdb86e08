//! The raw table: slots, control bytes and probing, keyed by caller-supplied
//! hashes.

use alloc::alloc::handle_alloc_error;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ptr::NonNull;

use crate::allocator::Allocator;
use crate::allocator::Global;
use crate::group::ControlGroup;
use crate::group::DefaultGroup;
use crate::group::EMPTY;
use crate::group::TOMBSTONE;
use crate::group::hashtag;
use crate::group::is_full;
use crate::trace::debug;

/// Capacity allocated by the first insertion into an unallocated table.
const INITIAL_CAPACITY: usize = 32;

/// Returns `true` if `count` entries in `capacity` slots would exceed the
/// 0.7 maximum load factor.
#[inline(always)]
fn exceeds_load_factor(count: usize, capacity: usize) -> bool {
    count as u128 * 10 > capacity as u128 * 7
}

/// Smallest slot count holding `count` entries under the maximum load factor.
#[inline(always)]
fn capacity_for(count: usize) -> usize {
    usize::try_from((count as u128 * 10).div_ceil(7)).expect("capacity overflow")
}

#[cold]
#[inline(never)]
fn probe_exhausted(capacity: usize) -> ! {
    panic!("probe scanned all {capacity} slots without finding an available one")
}

/// The pair of buffers behind a table: `capacity` entry slots and
/// `capacity + G::WIDTH` control bytes.
///
/// The trailing `G::WIDTH` control bytes mirror the leading ones, so a group
/// loaded at any index below `capacity` sees the slots that follow it modulo
/// `capacity`. `Slots` never drops entries or frees itself; its owner does.
struct Slots<T, G> {
    entries: NonNull<T>,
    ctrl: NonNull<u8>,
    capacity: usize,
    _marker: PhantomData<(T, G)>,
}

/// Buffers under construction during a rebuild. Frees them, without dropping
/// any entry, if the rebuild unwinds.
struct FreshSlots<'a, T, A: Allocator, G: ControlGroup> {
    slots: Slots<T, G>,
    alloc: &'a A,
}

impl<T, A: Allocator, G: ControlGroup> Drop for FreshSlots<'_, T, A, G> {
    fn drop(&mut self) {
        let slots = core::mem::replace(&mut self.slots, Slots::unallocated());
        // SAFETY: The buffers came from `alloc`. Their entries are bitwise
        // copies still owned by the old buffers.
        unsafe { slots.free(self.alloc) };
    }
}

impl<T, G: ControlGroup> Slots<T, G> {
    const fn unallocated() -> Self {
        Self {
            entries: NonNull::dangling(),
            ctrl: NonNull::dangling(),
            capacity: 0,
            _marker: PhantomData,
        }
    }

    fn layouts(capacity: usize) -> (Layout, Layout) {
        let entries = Layout::array::<T>(capacity).expect("allocation size overflow");
        let ctrl = Layout::from_size_align(capacity + G::WIDTH, G::WIDTH)
            .expect("allocation size overflow");
        (entries, ctrl)
    }

    fn allocate<A: Allocator>(alloc: &A, capacity: usize) -> Self {
        debug_assert!(capacity > 0 && capacity % G::WIDTH == 0);
        let (entries_layout, ctrl_layout) = Self::layouts(capacity);

        let entries = if entries_layout.size() == 0 {
            NonNull::dangling()
        } else {
            match alloc.allocate(entries_layout) {
                Ok(ptr) => ptr.cast(),
                Err(_) => handle_alloc_error(entries_layout),
            }
        };
        let ctrl = match alloc.allocate(ctrl_layout) {
            Ok(ptr) => ptr,
            Err(_) => handle_alloc_error(ctrl_layout),
        };

        // SAFETY: `ctrl` was just allocated with room for `capacity + WIDTH`
        // bytes.
        unsafe { ctrl.as_ptr().write_bytes(EMPTY, capacity + G::WIDTH) };

        Self {
            entries,
            ctrl,
            capacity,
            _marker: PhantomData,
        }
    }

    /// Returns both buffers to `alloc` without touching any entry.
    ///
    /// # Safety
    ///
    /// The buffers must have been allocated by `alloc`, and every live entry
    /// must already have been dropped or moved out.
    unsafe fn free<A: Allocator>(self, alloc: &A) {
        if self.capacity == 0 {
            return;
        }
        let (entries_layout, ctrl_layout) = Self::layouts(self.capacity);
        // SAFETY: Both blocks came from `alloc` with these layouts.
        unsafe {
            if entries_layout.size() != 0 {
                alloc.deallocate(self.entries.cast(), entries_layout);
            }
            alloc.deallocate(self.ctrl, ctrl_layout);
        }
    }

    fn total_bytes(&self) -> usize {
        if self.capacity == 0 {
            return 0;
        }
        let (entries_layout, ctrl_layout) = Self::layouts(self.capacity);
        entries_layout.size() + ctrl_layout.size()
    }

    fn controls(&self) -> &[u8] {
        // SAFETY: The control buffer holds at least `capacity` initialized
        // bytes, and a dangling pointer is valid for an empty slice.
        unsafe { core::slice::from_raw_parts(self.ctrl.as_ptr(), self.capacity) }
    }

    fn fill_empty(&mut self) {
        if self.capacity != 0 {
            // SAFETY: The control buffer holds `capacity + WIDTH` bytes.
            unsafe {
                self.ctrl
                    .as_ptr()
                    .write_bytes(EMPTY, self.capacity + G::WIDTH)
            };
        }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity`.
    #[inline(always)]
    unsafe fn ctrl(&self, index: usize) -> u8 {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller ensures `index` is in bounds.
        unsafe { *self.ctrl.as_ptr().add(index) }
    }

    /// Writes a control byte and its mirror, if it has one.
    ///
    /// # Safety
    ///
    /// `index` must be below `capacity`.
    #[inline(always)]
    unsafe fn set_ctrl(&mut self, index: usize, byte: u8) {
        debug_assert!(index < self.capacity);
        // SAFETY: Caller ensures `index` is in bounds; the mirror of an index
        // below `WIDTH` lands in the trailing `WIDTH` bytes.
        unsafe {
            *self.ctrl.as_ptr().add(index) = byte;
            if index < G::WIDTH {
                *self.ctrl.as_ptr().add(self.capacity + index) = byte;
            }
        }
    }

    #[inline(always)]
    fn entry_ptr(&self, index: usize) -> *mut T {
        self.entries.as_ptr().wrapping_add(index)
    }

    /// # Safety
    ///
    /// `index` must be below `capacity` and hold a live entry.
    #[inline(always)]
    unsafe fn entry(&self, index: usize) -> &T {
        // SAFETY: Caller ensures the slot is initialized.
        unsafe { &*self.entry_ptr(index) }
    }

    /// # Safety
    ///
    /// `index` must be below `capacity` and hold a live entry.
    #[inline(always)]
    unsafe fn entry_mut(&mut self, index: usize) -> &mut T {
        // SAFETY: Caller ensures the slot is initialized.
        unsafe { &mut *self.entry_ptr(index) }
    }

    /// Reduces `pos` below `capacity`; `pos` must be below `2 * capacity`.
    #[inline(always)]
    fn wrap(&self, pos: usize) -> usize {
        if pos >= self.capacity {
            pos - self.capacity
        } else {
            pos
        }
    }

    #[inline(always)]
    fn probe_start(&self, hash: u64) -> usize {
        (hash as usize) % self.capacity
    }

    /// Locates the live entry matching `eq` among those tagged for `hash`.
    fn find(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<usize> {
        if self.capacity == 0 {
            return None;
        }

        let tag = hashtag(hash);
        let mut pos = self.probe_start(hash);
        let mut scanned = 0;
        while scanned < self.capacity {
            // SAFETY: `pos < capacity` and the control buffer extends `WIDTH`
            // bytes past `capacity`.
            let group = unsafe { G::load(self.ctrl.as_ptr().add(pos)) };
            let empty = group.match_empty();

            // Nothing past the first empty slot can belong to this chain.
            let mut candidates = group.match_byte(tag);
            if let Some(first_empty) = empty.lowest_set_bit() {
                candidates = candidates.truncate(first_empty);
            }

            for bit in candidates {
                let index = self.wrap(pos + bit);
                // SAFETY: A control byte equal to a tag marks a live entry.
                if eq(unsafe { self.entry(index) }) {
                    return Some(index);
                }
            }

            if empty.any_bit_set() {
                return None;
            }

            pos = self.wrap(pos + G::WIDTH);
            scanned += G::WIDTH;
        }

        None
    }

    /// Like [`find`](Self::find), but on a miss returns the first available
    /// slot seen along the probe sequence.
    ///
    /// The table must be allocated and hold at least one available slot.
    fn find_or_available(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Result<usize, usize> {
        debug_assert!(self.capacity != 0);

        let tag = hashtag(hash);
        let mut first_available = None;
        let mut pos = self.probe_start(hash);
        let mut scanned = 0;
        while scanned < self.capacity {
            // SAFETY: `pos < capacity` and the control buffer extends `WIDTH`
            // bytes past `capacity`.
            let group = unsafe { G::load(self.ctrl.as_ptr().add(pos)) };

            if first_available.is_none() {
                first_available = group
                    .match_available()
                    .lowest_set_bit()
                    .map(|bit| self.wrap(pos + bit));
            }

            let empty = group.match_empty();
            let mut candidates = group.match_byte(tag);
            if let Some(first_empty) = empty.lowest_set_bit() {
                candidates = candidates.truncate(first_empty);
            }

            for bit in candidates {
                let index = self.wrap(pos + bit);
                // SAFETY: A control byte equal to a tag marks a live entry.
                if eq(unsafe { self.entry(index) }) {
                    return Ok(index);
                }
            }

            if empty.any_bit_set() {
                break;
            }

            pos = self.wrap(pos + G::WIDTH);
            scanned += G::WIDTH;
        }

        match first_available {
            Some(index) => Err(index),
            None => probe_exhausted(self.capacity),
        }
    }

    /// Returns the first available slot along the probe sequence of `hash`,
    /// without looking for an existing match.
    fn find_available(&self, hash: u64) -> usize {
        debug_assert!(self.capacity != 0);

        let mut pos = self.probe_start(hash);
        let mut scanned = 0;
        while scanned < self.capacity {
            // SAFETY: `pos < capacity` and the control buffer extends `WIDTH`
            // bytes past `capacity`.
            let group = unsafe { G::load(self.ctrl.as_ptr().add(pos)) };
            if let Some(bit) = group.match_available().lowest_set_bit() {
                return self.wrap(pos + bit);
            }

            pos = self.wrap(pos + G::WIDTH);
            scanned += G::WIDTH;
        }

        probe_exhausted(self.capacity)
    }
}

/// Debug statistics for hash table analysis.
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries
    pub len: usize,
    /// Total number of slots allocated
    pub capacity: usize,
    /// Number of slots holding a tombstone
    pub tombstones: usize,
    /// Number of slots that have never held an entry
    pub empty_slots: usize,
    /// Load factor (len / capacity)
    pub load_factor: f64,
    /// Slot utilization ((len + tombstones) / capacity)
    pub slot_utilization: f64,
    /// Total memory in bytes used by both buffers
    pub total_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Flat Table Debug Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        );
        println!(
            "Slot Usage: {} live + {} tombstones, {} empty ({:.2}% utilization)",
            self.len,
            self.tombstones,
            self.empty_slots,
            self.slot_utilization * 100.0
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
    }
}

/// Number of entries found at each probe distance from their home slot.
///
/// `distances[d]` counts the entries stored `d` slots past the slot their
/// hash maps to. Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, Default)]
pub struct ProbeHistogram {
    /// Entry count per probe distance.
    pub distances: alloc::vec::Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Longest probe distance of any entry.
    pub fn max_distance(&self) -> usize {
        self.distances.len().saturating_sub(1)
    }

    /// Mean probe distance over all entries.
    pub fn mean_distance(&self) -> f64 {
        let (count, total) = self
            .distances
            .iter()
            .enumerate()
            .fold((0usize, 0usize), |(count, total), (distance, &n)| {
                (count + n, total + distance * n)
            });
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Pretty-print the histogram.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Probe Distance Histogram ===");
        let total: usize = self.distances.iter().sum();
        for (distance, &count) in self.distances.iter().enumerate() {
            if count == 0 {
                continue;
            }
            println!(
                "{:>6}: {:>8} ({:.2}%)",
                distance,
                count,
                count as f64 / total.max(1) as f64 * 100.0
            );
        }
        println!("Mean distance: {:.3}", self.mean_distance());
    }
}

/// A flat open-addressing hash table with tombstone deletion.
///
/// `FlatTable<T, A, G>` stores values of type `T` in one contiguous buffer,
/// next to a buffer of control bytes: one per slot, either `EMPTY`,
/// `TOMBSTONE`, or the top seven bits of the stored value's hash. Probing is
/// linear from `hash % capacity`, one [`ControlGroup`] at a time, so with the
/// SSE2 backend sixteen slots are filtered per step before any value is
/// compared.
///
/// Like [`hashbrown::HashTable`], the table does not hash values itself:
/// every operation takes the hash and an equality predicate, and operations
/// that may rebuild the table take a `hasher` closure to recompute hashes of
/// stored values.
///
/// The table grows to twice its capacity before an insertion would push the
/// load factor above 0.7. Removal leaves a tombstone, which later insertions
/// may reuse; when tombstones and live entries together would cross the
/// threshold the table is rebuilt in place instead. [`defragment`] clears
/// tombstones explicitly.
///
/// All buffer memory comes from the allocator `A`, and the table is strictly
/// single-threaded: share it across threads only behind a lock.
///
/// [`hashbrown::HashTable`]: https://docs.rs/hashbrown/latest/hashbrown/struct.HashTable.html
/// [`defragment`]: FlatTable::defragment
///
/// ## Example
///
/// ```rust
/// # use core::hash::Hash;
/// # use core::hash::Hasher;
/// #
/// # use flat_hash::flat_table::Entry;
/// # use flat_hash::flat_table::FlatTable;
/// # use siphasher::sip::SipHasher;
/// #
/// # #[derive(Debug, PartialEq)]
/// # struct Person {
/// #     id: u64,
/// #     name: String,
/// # }
/// #
/// # fn hash_id(id: u64) -> u64 {
/// #     let mut hasher = SipHasher::new();
/// #     id.hash(&mut hasher);
/// #     hasher.finish()
/// # }
///
/// let mut table = FlatTable::new();
/// let hash = hash_id(123);
///
/// match table.entry(hash, |p: &Person| p.id == 123, |p| hash_id(p.id)) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
/// assert_eq!(table.capacity(), 32);
/// ```
pub struct FlatTable<T, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    slots: Slots<T, G>,
    len: usize,
    tombstones: usize,
    alloc: A,
}

// SAFETY: The table owns its entries and allocator; moving it to another
// thread moves both.
unsafe impl<T: Send, A: Allocator + Send, G: ControlGroup> Send for FlatTable<T, A, G> {}

// SAFETY: Shared access only hands out `&T` and `&A`.
unsafe impl<T: Sync, A: Allocator + Sync, G: ControlGroup> Sync for FlatTable<T, A, G> {}

impl<T, A: Allocator, G: ControlGroup> Debug for FlatTable<T, A, G> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;
        use alloc::string::ToString;
        use alloc::vec::Vec;

        if self.slots.capacity == 0 {
            return f
                .debug_struct("FlatTable")
                .field("controls", &"unallocated")
                .field("len", &self.len)
                .field("tombstones", &self.tombstones)
                .field("capacity", &self.slots.capacity)
                .finish();
        }

        f.debug_struct("FlatTable")
            .field(
                "controls",
                &self
                    .slots
                    .controls()
                    .chunks(16)
                    .map(|w| {
                        w.iter()
                            .map(|&b| match b {
                                EMPTY => "..".to_string(),
                                TOMBSTONE => "xx".to_string(),
                                tag => format!("{tag:02x}"),
                            })
                            .collect::<Vec<_>>()
                            .join(", ")
                    })
                    .collect::<Vec<String>>(),
            )
            .field("len", &self.len)
            .field("tombstones", &self.tombstones)
            .field("capacity", &self.slots.capacity)
            .finish()
    }
}

impl<T, A, G> Clone for FlatTable<T, A, G>
where
    T: Clone,
    A: Allocator + Clone,
    G: ControlGroup,
{
    /// Clones every entry into the same slot of a table of equal capacity,
    /// tombstones included.
    fn clone(&self) -> Self {
        let mut new_table = Self::new_in(self.alloc.clone());
        if self.slots.capacity == 0 {
            return new_table;
        }
        new_table.slots = Slots::allocate(&new_table.alloc, self.slots.capacity);

        for index in 0..self.slots.capacity {
            // SAFETY: Both tables have the same capacity, `index` is below it,
            // and the source slot is read only when its control byte marks it
            // live. The control byte is copied after the value is in place, so
            // a panicking `clone` leaves the new table consistent.
            unsafe {
                let ctrl = self.slots.ctrl(index);
                if is_full(ctrl) {
                    let value = self.slots.entry(index).clone();
                    new_table.slots.entry_ptr(index).write(value);
                    new_table.slots.set_ctrl(index, ctrl);
                    new_table.len += 1;
                } else if ctrl == TOMBSTONE {
                    new_table.slots.set_ctrl(index, TOMBSTONE);
                    new_table.tombstones += 1;
                }
            }
        }

        debug_assert_eq!(new_table.len, self.len);
        new_table
    }
}

impl<T, A: Allocator, G: ControlGroup> Drop for FlatTable<T, A, G> {
    fn drop(&mut self) {
        self.drop_entries();
        let slots = core::mem::replace(&mut self.slots, Slots::unallocated());
        // SAFETY: The buffers came from `self.alloc`, and every entry was
        // dropped above.
        unsafe { slots.free(&self.alloc) };
    }
}

impl<T, A: Allocator + Default, G: ControlGroup> Default for FlatTable<T, A, G> {
    fn default() -> Self {
        Self::new_in(A::default())
    }
}

impl<T> FlatTable<T> {
    /// Creates an empty table on the global heap. Nothing is allocated
    /// until the first insertion.
    pub const fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a table with `capacity` slots on the global heap.
    ///
    /// The slot count is rounded up to a multiple of the group width, and a
    /// table with `n` slots holds up to 70% of `n` entries before growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use flat_hash::flat_table::FlatTable;
    /// #
    /// let table: FlatTable<String> = FlatTable::with_capacity(100);
    /// assert!(table.capacity() >= 100);
    /// assert!(table.is_empty());
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_in(capacity, Global)
    }
}

impl<T, A: Allocator, G: ControlGroup> FlatTable<T, A, G> {
    /// Creates an empty table drawing memory from `alloc`.
    pub const fn new_in(alloc: A) -> Self {
        Self {
            slots: Slots::unallocated(),
            len: 0,
            tombstones: 0,
            alloc,
        }
    }

    /// Creates a table with `capacity` slots drawn from `alloc`.
    ///
    /// A zero capacity allocates nothing.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        let mut table = Self::new_in(alloc);
        if capacity > 0 {
            table.slots = Slots::allocate(&table.alloc, Self::round_capacity(capacity));
        }
        table
    }

    #[inline(always)]
    fn round_capacity(capacity: usize) -> usize {
        capacity
            .max(1)
            .div_ceil(G::WIDTH)
            .checked_mul(G::WIDTH)
            .expect("capacity overflow")
    }

    /// Returns the allocator backing this table.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the total number of slots.
    ///
    /// Always a multiple of the group width, and zero before the first
    /// allocation.
    pub fn capacity(&self) -> usize {
        self.slots.capacity
    }

    /// Returns the number of slots holding a tombstone.
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Returns the control byte of every slot, in slot order.
    ///
    /// Bytes with the top bit set are available (`0x80` empty, `0x81`
    /// tombstone); the others hold the seven-bit hash tag of a live entry.
    pub fn control_bytes(&self) -> &[u8] {
        self.slots.controls()
    }

    /// Returns the live entry stored in slot `index`, or `None` if the slot
    /// is available or out of range.
    pub fn slot(&self, index: usize) -> Option<&T> {
        if index >= self.slots.capacity {
            return None;
        }
        // SAFETY: `index` is in bounds, and the entry is read only when its
        // control byte marks it live.
        unsafe {
            if is_full(self.slots.ctrl(index)) {
                Some(self.slots.entry(index))
            } else {
                None
            }
        }
    }

    /// Finds a value by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash::flat_table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::new();
    /// table
    ///     .entry(hash_u64(42), |&n: &u64| n == 42, |&n| hash_u64(n))
    ///     .or_insert(42);
    ///
    /// assert_eq!(table.find(hash_u64(42), |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(hash_u64(7), |&n| n == 7), None);
    /// ```
    pub fn find(&self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&T> {
        let index = self.slots.find(hash, eq)?;
        // SAFETY: `find` only returns live slots.
        Some(unsafe { self.slots.entry(index) })
    }

    /// Finds a value by hash and equality predicate, returning a mutable
    /// reference.
    pub fn find_mut(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<&mut T> {
        let index = self.slots.find(hash, eq)?;
        // SAFETY: `find` only returns live slots.
        Some(unsafe { self.slots.entry_mut(index) })
    }

    /// Gets the entry for the given hash and equality predicate.
    ///
    /// The load factor is checked before probing, so this may grow or
    /// defragment the table (recomputing stored hashes with `hasher`) even
    /// when the value is already present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash::flat_table::Entry;
    /// # use flat_hash::flat_table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_str(s: &str) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     s.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::new();
    /// let hash = hash_str("hello");
    ///
    /// match table.entry(hash, |s: &String| s == "hello", |s| hash_str(s)) {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     Entry::Occupied(_) => unreachable!(),
    /// }
    ///
    /// assert!(matches!(
    ///     table.entry(hash, |s: &String| s == "hello", |s| hash_str(s)),
    ///     Entry::Occupied(_)
    /// ));
    /// assert_eq!(table.len(), 1);
    /// ```
    pub fn entry(
        &mut self,
        hash: u64,
        eq: impl Fn(&T) -> bool,
        hasher: impl Fn(&T) -> u64,
    ) -> Entry<'_, T, A, G> {
        self.reserve_one(&hasher);
        match self.slots.find_or_available(hash, eq) {
            Ok(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Err(index) => Entry::Vacant(VacantEntry {
                table: self,
                hash,
                index,
            }),
        }
    }

    /// Inserts a value without checking whether an equal value is present.
    ///
    /// This skips the match comparisons and takes the first available slot
    /// on the probe sequence. If an equal value is already stored, the table
    /// ends up holding both; lookups then return whichever comes first in
    /// the probe sequence. This never causes memory unsafety.
    pub fn insert_unique_unchecked(
        &mut self,
        hash: u64,
        value: T,
        hasher: impl Fn(&T) -> u64,
    ) -> &mut T {
        self.reserve_one(&hasher);
        let index = self.slots.find_available(hash);
        // SAFETY: `find_available` returns an in-bounds available slot.
        unsafe { self.occupy(index, hash, value) }
    }

    /// Removes and returns the value matching `eq`, leaving a tombstone.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::Hash;
    /// # use core::hash::Hasher;
    /// #
    /// # use flat_hash::flat_table::FlatTable;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # fn hash_u64(n: u64) -> u64 {
    /// #     let mut hasher = SipHasher::new();
    /// #     n.hash(&mut hasher);
    /// #     hasher.finish()
    /// # }
    /// #
    /// let mut table = FlatTable::new();
    /// table
    ///     .entry(hash_u64(42), |&n: &u64| n == 42, |&n| hash_u64(n))
    ///     .or_insert(42);
    ///
    /// assert_eq!(table.remove(hash_u64(42), |&n| n == 42), Some(42));
    /// assert!(table.is_empty());
    /// assert_eq!(table.tombstones(), 1);
    ///
    /// assert_eq!(table.remove(hash_u64(99), |&n| n == 99), None);
    /// ```
    pub fn remove(&mut self, hash: u64, eq: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.slots.find(hash, eq)?;
        // SAFETY: `find` only returns live slots.
        Some(unsafe { self.take(index) })
    }

    /// Rebuilds the table with at least `capacity` slots.
    ///
    /// The new capacity is the larger of `capacity` and the current
    /// capacity, rounded up to a multiple of the group width. Every live
    /// entry is moved into the new buffers, tombstones are discarded, and
    /// the old buffers are returned to the allocator. Runs in time
    /// proportional to the capacity.
    pub fn grow(&mut self, capacity: usize, hasher: impl Fn(&T) -> u64) {
        let capacity = capacity.max(self.slots.capacity);
        if capacity == 0 {
            return;
        }
        self.rebuild(capacity, hasher);
    }

    /// Rebuilds the table at its current capacity to remove every
    /// tombstone.
    ///
    /// Live entries are preserved and probe chains shortened. Does nothing on
    /// an unallocated table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use flat_hash::flat_table::FlatTable;
    /// #
    /// let mut table = FlatTable::new();
    /// for n in 0..10u64 {
    ///     table.insert_unique_unchecked(n, n, |&n| n);
    /// }
    /// for n in 0..5u64 {
    ///     table.remove(n, |&v| v == n);
    /// }
    /// assert_eq!(table.tombstones(), 5);
    ///
    /// table.defragment(|&n| n);
    /// assert_eq!(table.tombstones(), 0);
    /// assert_eq!(table.len(), 5);
    /// ```
    pub fn defragment(&mut self, hasher: impl Fn(&T) -> u64) {
        if self.slots.capacity == 0 {
            return;
        }
        self.rebuild(self.slots.capacity, hasher);
    }

    /// Reserves room for at least `additional` more entries without
    /// exceeding the maximum load factor.
    pub fn reserve(&mut self, additional: usize, hasher: impl Fn(&T) -> u64) {
        let required = self.len.saturating_add(additional);
        if required == 0 || !exceeds_load_factor(required, self.slots.capacity) {
            return;
        }
        self.rebuild(capacity_for(required), hasher);
    }

    /// Shrinks the table to the smallest capacity that holds its entries
    /// under the maximum load factor.
    ///
    /// An empty table releases both buffers.
    pub fn shrink_to_fit(&mut self, hasher: impl Fn(&T) -> u64) {
        if self.len == 0 {
            let slots = core::mem::replace(&mut self.slots, Slots::unallocated());
            // SAFETY: The buffers came from `self.alloc` and hold no live
            // entries.
            unsafe { slots.free(&self.alloc) };
            self.tombstones = 0;
            return;
        }

        let capacity = Self::round_capacity(capacity_for(self.len));
        if capacity < self.slots.capacity {
            self.rebuild(capacity, hasher);
        }
    }

    /// Removes all entries, keeping the allocated capacity.
    pub fn clear(&mut self) {
        self.drop_entries();
        self.slots.fill_empty();
        self.len = 0;
        self.tombstones = 0;
    }

    /// Returns an iterator over all values, in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            entries: self.slots.entries,
            ctrl: self.slots.ctrl,
            index: 0,
            capacity: self.slots.capacity,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator over mutable references to all values, in slot
    /// order.
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        IterMut {
            entries: self.slots.entries,
            ctrl: self.slots.ctrl,
            index: 0,
            capacity: self.slots.capacity,
            remaining: self.len,
            _marker: PhantomData,
        }
    }

    /// Returns an iterator that removes and yields all values.
    ///
    /// Capacity is kept. Every slot is reset to empty once the iterator is
    /// dropped, even if it was not run to completion.
    pub fn drain(&mut self) -> Drain<'_, T, A, G> {
        let slots = core::mem::replace(&mut self.slots, Slots::unallocated());
        let remaining = core::mem::take(&mut self.len);
        self.tombstones = 0;
        Drain {
            table: self,
            slots,
            index: 0,
            remaining,
        }
    }

    /// Returns statistics about slot usage.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.slots.capacity;
        let ratio = |n: usize| {
            if capacity == 0 {
                0.0
            } else {
                n as f64 / capacity as f64
            }
        };
        DebugStats {
            len: self.len,
            capacity,
            tombstones: self.tombstones,
            empty_slots: capacity - self.len - self.tombstones,
            load_factor: ratio(self.len),
            slot_utilization: ratio(self.len + self.tombstones),
            total_bytes: self.slots.total_bytes(),
        }
    }

    /// Computes how far each entry sits from the slot its hash maps to.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self, hasher: impl Fn(&T) -> u64) -> ProbeHistogram {
        let mut histogram = ProbeHistogram::default();
        let capacity = self.slots.capacity;
        for index in 0..capacity {
            // SAFETY: `index` is in bounds and only live entries are read.
            unsafe {
                if !is_full(self.slots.ctrl(index)) {
                    continue;
                }
                let home = self.slots.probe_start(hasher(self.slots.entry(index)));
                let distance = (index + capacity - home) % capacity;
                if histogram.distances.len() <= distance {
                    histogram.distances.resize(distance + 1, 0);
                }
                histogram.distances[distance] += 1;
            }
        }
        histogram
    }

    /// Makes room for one more entry, growing to double capacity (or to
    /// [`INITIAL_CAPACITY`] when unallocated) if the load factor would be
    /// exceeded, and rebuilding in place when tombstones alone push the
    /// occupancy over it.
    #[inline]
    fn reserve_one(&mut self, hasher: impl Fn(&T) -> u64) {
        let capacity = self.slots.capacity;
        if capacity == 0 {
            self.rebuild(INITIAL_CAPACITY, hasher);
        } else if exceeds_load_factor(self.len + 1, capacity) {
            self.rebuild(capacity.checked_mul(2).expect("capacity overflow"), hasher);
        } else if exceeds_load_factor(self.len + self.tombstones + 1, capacity) {
            self.rebuild(capacity, hasher);
        }
    }

    /// Moves every live entry into freshly allocated buffers of `capacity`
    /// slots and releases the old ones.
    #[cold]
    #[inline(never)]
    fn rebuild(&mut self, capacity: usize, hasher: impl Fn(&T) -> u64) {
        let capacity = Self::round_capacity(capacity);
        debug_assert!(!exceeds_load_factor(self.len, capacity));
        debug!(
            old_capacity = self.slots.capacity,
            new_capacity = capacity,
            len = self.len,
            tombstones = self.tombstones,
            "rebuilding flat table"
        );

        // The old buffers stay untouched until every entry has been copied, so
        // a panicking `hasher` leaves the table as it was.
        let mut guard = FreshSlots {
            slots: Slots::<T, G>::allocate(&self.alloc, capacity),
            alloc: &self.alloc,
        };
        for index in 0..self.slots.capacity {
            // SAFETY: `index` is in bounds of the old buffers and `target` of
            // the new ones. Copies are bitwise; the old buffers keep ownership
            // until they are swapped out below.
            unsafe {
                if !is_full(self.slots.ctrl(index)) {
                    continue;
                }
                let hash = hasher(self.slots.entry(index));
                let target = guard.slots.find_available(hash);
                core::ptr::copy_nonoverlapping(
                    self.slots.entry_ptr(index),
                    guard.slots.entry_ptr(target),
                    1,
                );
                guard.slots.set_ctrl(target, hashtag(hash));
            }
        }

        let fresh = core::mem::replace(&mut guard.slots, Slots::unallocated());
        drop(guard);
        let old = core::mem::replace(&mut self.slots, fresh);
        self.tombstones = 0;
        // SAFETY: The old buffers came from `self.alloc`, and every live entry
        // now lives in the new buffers.
        unsafe { old.free(&self.alloc) };
    }

    /// Writes `value` into the available slot `index`.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds and available.
    #[inline]
    unsafe fn occupy(&mut self, index: usize, hash: u64, value: T) -> &mut T {
        // SAFETY: Caller ensures `index` is an in-bounds available slot.
        unsafe {
            let previous = self.slots.ctrl(index);
            debug_assert!(!is_full(previous));
            if previous == TOMBSTONE {
                self.tombstones -= 1;
            }
            self.slots.set_ctrl(index, hashtag(hash));
            self.len += 1;

            let slot = self.slots.entry_ptr(index);
            slot.write(value);
            &mut *slot
        }
    }

    /// Moves the entry out of slot `index` and leaves a tombstone.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds and hold a live entry.
    #[inline]
    unsafe fn take(&mut self, index: usize) -> T {
        // SAFETY: Caller ensures the slot is live; it is marked dead before
        // the value is handed out.
        unsafe {
            self.slots.set_ctrl(index, TOMBSTONE);
            self.len -= 1;
            self.tombstones += 1;
            self.slots.entry_ptr(index).read()
        }
    }

    fn drop_entries(&mut self) {
        if !core::mem::needs_drop::<T>() || self.len == 0 {
            return;
        }
        for index in 0..self.slots.capacity {
            // SAFETY: `index` is in bounds and only live entries are dropped.
            unsafe {
                if is_full(self.slots.ctrl(index)) {
                    self.slots.entry_ptr(index).drop_in_place();
                }
            }
        }
    }
}

/// A view into a single entry in the table, which may be vacant or occupied.
///
/// This enum is constructed from the [`entry`] method on [`FlatTable`].
///
/// [`entry`]: FlatTable::entry
pub enum Entry<'a, T, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, T, A, G>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, T, A, G>),
}

impl<'a, T, A: Allocator, G: ControlGroup> Entry<'a, T, A, G> {
    /// Inserts `default` if the entry is vacant, and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant, and returns a
    /// mutable reference to the value.
    pub fn or_insert_with(self, default: impl FnOnce() -> T) -> &'a mut T {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to an occupied value before any potential insert.
    pub fn and_modify(self, f: impl FnOnce(&mut T)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns the slot index this entry refers to.
    pub fn index(&self) -> usize {
        match self {
            Entry::Occupied(entry) => entry.index,
            Entry::Vacant(entry) => entry.index,
        }
    }
}

impl<'a, T: Default, A: Allocator, G: ControlGroup> Entry<'a, T, A, G> {
    /// Inserts `T::default()` if the entry is vacant, and returns a mutable
    /// reference to the value.
    pub fn or_default(self) -> &'a mut T {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry: the available slot chosen for the value.
pub struct VacantEntry<'a, T, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    table: &'a mut FlatTable<T, A, G>,
    hash: u64,
    index: usize,
}

impl<'a, T, A: Allocator, G: ControlGroup> VacantEntry<'a, T, A, G> {
    /// Inserts `value` into the reserved slot and returns a mutable
    /// reference to it.
    pub fn insert(self, value: T) -> &'a mut T {
        // SAFETY: The slot was reserved as available by `entry`, and the
        // exclusive borrow kept the table unchanged since.
        unsafe { self.table.occupy(self.index, self.hash, value) }
    }

    /// Returns the index of the reserved slot.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A view into an occupied entry.
pub struct OccupiedEntry<'a, T, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    table: &'a mut FlatTable<T, A, G>,
    index: usize,
}

impl<'a, T, A: Allocator, G: ControlGroup> OccupiedEntry<'a, T, A, G> {
    /// Gets a reference to the value.
    pub fn get(&self) -> &T {
        // SAFETY: `index` points at a live entry for the lifetime of `self`.
        unsafe { self.table.slots.entry(self.index) }
    }

    /// Gets a mutable reference to the value.
    pub fn get_mut(&mut self) -> &mut T {
        // SAFETY: `index` points at a live entry for the lifetime of `self`.
        unsafe { self.table.slots.entry_mut(self.index) }
    }

    /// Converts the entry into a mutable reference bound to the table.
    pub fn into_mut(self) -> &'a mut T {
        // SAFETY: `index` points at a live entry; the borrow of the table is
        // handed to the caller.
        unsafe { self.table.slots.entry_mut(self.index) }
    }

    /// Removes the value from the table, leaving a tombstone.
    pub fn remove(self) -> T {
        // SAFETY: `index` points at a live entry.
        unsafe { self.table.take(self.index) }
    }

    /// Returns the index of the slot holding the value.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// An iterator over the values of a [`FlatTable`], in slot order.
///
/// This struct is created by [`FlatTable::iter`].
pub struct Iter<'a, T> {
    entries: NonNull<T>,
    ctrl: NonNull<u8>,
    index: usize,
    capacity: usize,
    remaining: usize,
    _marker: PhantomData<&'a T>,
}

// SAFETY: The iterator only hands out shared references.
unsafe impl<T: Sync> Send for Iter<'_, T> {}
// SAFETY: As above.
unsafe impl<T: Sync> Sync for Iter<'_, T> {}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries,
            ctrl: self.ctrl,
            index: self.index,
            capacity: self.capacity,
            remaining: self.remaining,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.index < self.capacity {
            let index = self.index;
            self.index += 1;
            // SAFETY: `index` is below the capacity the pointers were taken
            // with, and the entry is read only when its control byte marks it
            // live. The borrow in `_marker` keeps the table alive and frozen.
            unsafe {
                if is_full(*self.ctrl.as_ptr().add(index)) {
                    self.remaining -= 1;
                    return Some(&*self.entries.as_ptr().add(index));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// A mutable iterator over the values of a [`FlatTable`], in slot order.
///
/// This struct is created by [`FlatTable::iter_mut`].
pub struct IterMut<'a, T> {
    entries: NonNull<T>,
    ctrl: NonNull<u8>,
    index: usize,
    capacity: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut T>,
}

// SAFETY: The iterator hands out unique references to distinct entries.
unsafe impl<T: Send> Send for IterMut<'_, T> {}
// SAFETY: Shared access to the iterator exposes nothing.
unsafe impl<T: Sync> Sync for IterMut<'_, T> {}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.index < self.capacity {
            let index = self.index;
            self.index += 1;
            // SAFETY: As in `Iter::next`; each slot is yielded at most once,
            // so the mutable references never alias.
            unsafe {
                if is_full(*self.ctrl.as_ptr().add(index)) {
                    self.remaining -= 1;
                    return Some(&mut *self.entries.as_ptr().add(index));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}

/// A draining iterator over the values of a [`FlatTable`].
///
/// This struct is created by [`FlatTable::drain`]. The table is left empty
/// and unallocated while the iterator lives; dropping the iterator hands the
/// emptied buffers back.
pub struct Drain<'a, T, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    table: &'a mut FlatTable<T, A, G>,
    slots: Slots<T, G>,
    index: usize,
    remaining: usize,
}

// SAFETY: The iterator owns the drained buffers and the table borrow.
unsafe impl<T: Send, A: Allocator + Send, G: ControlGroup> Send for Drain<'_, T, A, G> {}
// SAFETY: Shared access hands out nothing.
unsafe impl<T: Sync, A: Allocator + Sync, G: ControlGroup> Sync for Drain<'_, T, A, G> {}

impl<T, A: Allocator, G: ControlGroup> Drop for Drain<'_, T, A, G> {
    fn drop(&mut self) {
        for _ in &mut *self {}
        self.slots.fill_empty();
        self.table.slots = core::mem::replace(&mut self.slots, Slots::unallocated());
    }
}

impl<T, A: Allocator, G: ControlGroup> Iterator for Drain<'_, T, A, G> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 && self.index < self.slots.capacity {
            let index = self.index;
            self.index += 1;
            // SAFETY: `index` is in bounds and every slot is visited once, so
            // each live entry is read out exactly once.
            unsafe {
                if is_full(self.slots.ctrl(index)) {
                    self.remaining -= 1;
                    return Some(self.slots.entry_ptr(index).read());
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T, A: Allocator, G: ControlGroup> ExactSizeIterator for Drain<'_, T, A, G> {}
impl<T, A: Allocator, G: ControlGroup> FusedIterator for Drain<'_, T, A, G> {}

impl<'a, T, A: Allocator, G: ControlGroup> IntoIterator for &'a FlatTable<T, A, G> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<'a, T, A: Allocator, G: ControlGroup> IntoIterator for &'a mut FlatTable<T, A, G> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> IterMut<'a, T> {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec::Vec;
    use core::cell::Cell;
    use core::hash::Hash;
    use core::hash::Hasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::allocator::TrackingAllocator;
    use crate::group::ScalarGroup;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u64 {
        let mut h = state.build_hasher();
        h.write_u64(key);
        h.finish()
    }

    fn hash_string_key(state: &HashState, key: &str) -> u64 {
        let mut h = state.build_hasher();
        key.hash(&mut h);
        h.finish()
    }

    struct DropCounter {
        key: u64,
        drops: Rc<Cell<usize>>,
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    /// The same suite, run once per control-group backend.
    macro_rules! backend_suite {
        ($backend:ident, $group:ty) => {
            mod $backend {
                use super::*;

                type Table<T> = FlatTable<T, Global, $group>;
                const WIDTH: usize = <$group as ControlGroup>::WIDTH;

                fn insert_items(table: &mut Table<Item>, state: &HashState, keys: impl Iterator<Item = u64>) {
                    for k in keys {
                        let hash = hash_key(state, k);
                        match table.entry(hash, |v| v.key == k, |v| hash_key(state, v.key)) {
                            Entry::Vacant(v) => {
                                v.insert(Item {
                                    key: k,
                                    value: (k as i32) * 2,
                                });
                            }
                            Entry::Occupied(_) => panic!("unexpected occupied on first insert of {k}"),
                        }
                    }
                }

                fn find_item<'a>(table: &'a Table<Item>, state: &HashState, k: u64) -> Option<&'a Item> {
                    table.find(hash_key(state, k), |v| v.key == k)
                }

                #[test]
                fn insert_and_find() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    for k in 0..32u64 {
                        insert_items(&mut table, &state, core::iter::once(k));
                        assert_eq!(
                            find_item(&table, &state, k),
                            Some(&Item {
                                key: k,
                                value: (k as i32) * 2
                            }),
                            "{:#?}",
                            table
                        );
                    }
                    assert_eq!(table.len(), 32);
                    for k in 0..32u64 {
                        assert_eq!(find_item(&table, &state, k).map(|v| v.value), Some(k as i32 * 2));
                    }
                    assert!(find_item(&table, &state, 999).is_none());
                }

                #[test]
                fn duplicate_entry_is_occupied() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    let k = 42u64;
                    let hash = hash_key(&state, k);

                    match table.entry(hash, |v| v.key == k, |v| hash_key(&state, v.key)) {
                        Entry::Vacant(v) => {
                            v.insert(Item { key: k, value: 7 });
                        }
                        Entry::Occupied(_) => panic!("should be vacant first time"),
                    }

                    match table.entry(hash, |v| v.key == k, |v| hash_key(&state, v.key)) {
                        Entry::Occupied(mut occ) => {
                            assert_eq!(occ.get().value, 7);
                            occ.get_mut().value = 11;
                        }
                        Entry::Vacant(_) => panic!("should be occupied second time"),
                    }

                    assert_eq!(table.len(), 1);
                    assert_eq!(find_item(&table, &state, k).unwrap().value, 11);
                }

                #[test]
                fn first_insert_allocates_thirty_two_slots() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    assert_eq!(table.capacity(), 0);

                    insert_items(&mut table, &state, 1..=3);
                    assert_eq!(table.capacity(), 32);
                    assert_eq!(table.len(), 3);
                    assert!(find_item(&table, &state, 2).is_some());

                    let removed = table.remove(hash_key(&state, 2), |v| v.key == 2);
                    assert_eq!(removed, Some(Item { key: 2, value: 4 }));
                    assert!(find_item(&table, &state, 2).is_none());
                    assert_eq!(table.len(), 2);
                    assert_eq!(table.tombstones(), 1);

                    let hash = hash_key(&state, 2);
                    match table.entry(hash, |v| v.key == 2, |v| hash_key(&state, v.key)) {
                        Entry::Vacant(v) => {
                            assert!(table_slot_was_available(&v));
                            v.insert(Item { key: 2, value: 5 });
                        }
                        Entry::Occupied(_) => panic!("removed key should be vacant"),
                    }
                    assert_eq!(table.len(), 3);
                    assert_eq!(table.capacity(), 32);
                    assert!(table.tombstones() <= 1);
                    assert_eq!(find_item(&table, &state, 2).unwrap().value, 5);
                }

                fn table_slot_was_available(entry: &VacantEntry<'_, Item, Global, $group>) -> bool {
                    let ctrl = entry.table.control_bytes()[entry.index()];
                    ctrl == EMPTY || ctrl == TOMBSTONE
                }

                #[test]
                fn twenty_third_insert_doubles_capacity() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);

                    insert_items(&mut table, &state, 0..22);
                    assert_eq!(table.capacity(), 32);

                    insert_items(&mut table, &state, 22..23);
                    assert_eq!(table.capacity(), 64);
                    assert_eq!(table.len(), 23);
                    for k in 0..23 {
                        assert!(find_item(&table, &state, k).is_some(), "missing {k}");
                    }
                }

                #[test]
                fn load_factor_holds_after_every_insert() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::with_capacity_in(3, Global);
                    assert_eq!(table.capacity() % WIDTH, 0);

                    for k in 0..2000u64 {
                        insert_items(&mut table, &state, core::iter::once(k));
                        assert!(table.len() * 10 <= table.capacity() * 7);
                        assert_eq!(table.capacity() % WIDTH, 0);
                    }
                    for k in 0..2000u64 {
                        assert!(find_item(&table, &state, k).is_some());
                    }
                }

                #[test]
                fn removed_keys_are_not_found() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..100);

                    for k in (0..100).step_by(3) {
                        assert!(table.remove(hash_key(&state, k), |v| v.key == k).is_some());
                    }
                    assert!(table.remove(hash_key(&state, 0), |v| v.key == 0).is_none());

                    for k in 0..100 {
                        assert_eq!(find_item(&table, &state, k).is_some(), k % 3 != 0);
                    }
                    assert_eq!(table.len(), 100 - 34);
                }

                #[test]
                fn defragment_after_removing_everything() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..20);
                    for k in 0..20 {
                        table.remove(hash_key(&state, k), |v| v.key == k);
                    }
                    assert_eq!(table.len(), 0);
                    assert_eq!(table.tombstones(), 20);

                    let capacity = table.capacity();
                    table.defragment(|v| hash_key(&state, v.key));
                    assert_eq!(table.capacity(), capacity);
                    assert_eq!(table.len(), 0);
                    assert_eq!(table.tombstones(), 0);
                    assert!(table.control_bytes().iter().all(|&b| b == EMPTY));
                }

                #[test]
                fn defragment_preserves_entries() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..60);
                    for k in (0..60).filter(|k| k % 2 == 1) {
                        table.remove(hash_key(&state, k), |v| v.key == k);
                    }

                    let mut before: Vec<Item> = table.iter().cloned().collect();
                    table.defragment(|v| hash_key(&state, v.key));
                    let mut after: Vec<Item> = table.iter().cloned().collect();
                    before.sort_by_key(|v| v.key);
                    after.sort_by_key(|v| v.key);

                    assert_eq!(before, after);
                    assert_eq!(table.tombstones(), 0);
                    assert!(!table.control_bytes().contains(&TOMBSTONE));
                    for k in (0..60).filter(|k| k % 2 == 0) {
                        assert!(find_item(&table, &state, k).is_some());
                    }
                }

                #[test]
                fn defragment_unallocated_is_noop() {
                    let mut table: Table<Item> = Table::new_in(Global);
                    table.defragment(|v| v.key);
                    assert_eq!(table.capacity(), 0);
                }

                #[test]
                fn grow_preserves_entries() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..20);
                    table.remove(hash_key(&state, 5), |v| v.key == 5);

                    table.grow(100, |v| hash_key(&state, v.key));
                    assert!(table.capacity() >= 100);
                    assert_eq!(table.capacity() % WIDTH, 0);
                    assert_eq!(table.len(), 19);
                    assert_eq!(table.tombstones(), 0);
                    for k in (0..20).filter(|&k| k != 5) {
                        assert!(find_item(&table, &state, k).is_some());
                    }

                    let capacity = table.capacity();
                    table.grow(1, |v| hash_key(&state, v.key));
                    assert_eq!(table.capacity(), capacity);
                    assert_eq!(table.len(), 19);
                }

                #[test]
                fn explicit_collision() {
                    let mut table: Table<u64> = Table::new_in(Global);
                    for n in 0..10u64 {
                        match table.entry(7, |&v| v == n, |_| 7) {
                            Entry::Vacant(v) => {
                                v.insert(n);
                            }
                            Entry::Occupied(_) => panic!("{n} inserted twice"),
                        }
                    }
                    assert_eq!(table.len(), 10);

                    // Tombstones in the middle of the chain must not cut it.
                    for n in [0u64, 3, 4] {
                        assert_eq!(table.remove(7, |&v| v == n), Some(n));
                    }
                    for n in 0..10u64 {
                        assert_eq!(table.find(7, |&v| v == n).is_some(), ![0, 3, 4].contains(&n));
                    }

                    // A reinserted key reuses the first tombstone on the chain.
                    let reused = table.entry(7, |&v| v == 3, |_| 7).index();
                    assert_eq!(reused, 7);
                    table.entry(7, |&v| v == 3, |_| 7).or_insert(3);
                    assert_eq!(table.tombstones(), 2);
                    assert_eq!(table.find(7, |&v| v == 3), Some(&3));
                }

                #[test]
                fn probe_wraps_past_the_last_slot() {
                    let mut table: Table<u64> = Table::with_capacity_in(32, Global);
                    let capacity = table.capacity() as u64;
                    let hash = capacity - 1;

                    for n in 0..5u64 {
                        table.insert_unique_unchecked(hash, n, |_| hash);
                    }
                    assert_eq!(table.slot(capacity as usize - 1), Some(&0));
                    for (slot, n) in (0..4).zip(1..5u64) {
                        assert_eq!(table.slot(slot), Some(&n));
                    }

                    assert_eq!(table.remove(hash, |&v| v == 0), Some(0));
                    for n in 1..5u64 {
                        assert_eq!(table.find(hash, |&v| v == n), Some(&n));
                    }
                    assert_eq!(table.find(hash, |&v| v == 0), None);
                }

                #[test]
                fn tombstone_pressure_rebuilds_in_place() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    for k in 0..5000u64 {
                        insert_items(&mut table, &state, core::iter::once(k));
                        if k >= 10 {
                            let old = k - 10;
                            assert!(table.remove(hash_key(&state, old), |v| v.key == old).is_some());
                        }
                        assert_eq!(table.capacity(), 32);
                        assert!((table.len() + table.tombstones()) * 10 <= table.capacity() * 7);
                    }
                    for k in 4990..5000 {
                        assert!(find_item(&table, &state, k).is_some());
                    }
                }

                #[test]
                fn removed_and_dropped_values_drop_once() {
                    let drops = Rc::new(Cell::new(0));
                    let mut table: Table<DropCounter> = Table::new_in(Global);
                    for key in 0..100u64 {
                        table.insert_unique_unchecked(
                            key,
                            DropCounter {
                                key,
                                drops: drops.clone(),
                            },
                            |v| v.key,
                        );
                    }
                    assert!(table.capacity() > 32);
                    assert_eq!(drops.get(), 0);

                    for key in 0..10u64 {
                        let removed = table.remove(key, |v| v.key == key);
                        assert!(removed.is_some());
                    }
                    assert_eq!(drops.get(), 10);

                    table.defragment(|v| v.key);
                    assert_eq!(drops.get(), 10);

                    drop(table);
                    assert_eq!(drops.get(), 100);
                }

                #[test]
                fn clear_keeps_capacity() {
                    let drops = Rc::new(Cell::new(0));
                    let mut table: Table<DropCounter> = Table::new_in(Global);
                    for key in 0..20u64 {
                        table.insert_unique_unchecked(key, DropCounter { key, drops: drops.clone() }, |v| v.key);
                    }
                    table.remove(3, |v| v.key == 3);
                    let capacity = table.capacity();

                    table.clear();
                    assert_eq!(drops.get(), 20);
                    assert!(table.is_empty());
                    assert_eq!(table.tombstones(), 0);
                    assert_eq!(table.capacity(), capacity);
                    assert!(table.control_bytes().iter().all(|&b| b == EMPTY));
                    assert!(table.find(4, |v| v.key == 4).is_none());
                }

                #[test]
                fn iter_and_drain() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..50);
                    table.remove(hash_key(&state, 10), |v| v.key == 10);

                    let iter = table.iter();
                    assert_eq!(iter.len(), 49);
                    let mut keys: Vec<u64> = iter.map(|v| v.key).collect();
                    keys.sort_unstable();
                    assert_eq!(keys, (0..50).filter(|&k| k != 10).collect::<Vec<_>>());

                    for item in table.iter_mut() {
                        item.value += 1;
                    }
                    assert_eq!(find_item(&table, &state, 7).unwrap().value, 15);

                    let capacity = table.capacity();
                    let drained: Vec<Item> = table.drain().collect();
                    assert_eq!(drained.len(), 49);
                    assert!(table.is_empty());
                    assert_eq!(table.tombstones(), 0);
                    assert_eq!(table.capacity(), capacity);
                    assert!(table.iter().next().is_none());
                }

                #[test]
                fn partial_drain_empties_table() {
                    let mut table: Table<String> = Table::new_in(Global);
                    for n in 0..10u64 {
                        table.insert_unique_unchecked(n, n.to_string(), |s| s.parse().unwrap());
                    }
                    let mut drain = table.drain();
                    assert!(drain.next().is_some());
                    drop(drain);
                    assert!(table.is_empty());
                    assert!(table.control_bytes().iter().all(|&b| b == EMPTY));
                }

                #[test]
                #[cfg_attr(miri, ignore)]
                fn forgotten_drain_leaves_table_empty() {
                    let mut table: Table<u64> = Table::with_capacity_in(32, Global);
                    for n in 0..10u64 {
                        table.insert_unique_unchecked(n, n, |&v| v);
                    }
                    let mut drain = table.drain();
                    assert!(drain.next().is_some());
                    core::mem::forget(drain);

                    assert_eq!(table.len(), 0);
                    assert_eq!(table.iter().count(), 0);
                    assert!(table.find(3, |&v| v == 3).is_none());
                    table.insert_unique_unchecked(3, 3, |&v| v);
                    assert_eq!(table.find(3, |&v| v == 3), Some(&3));
                    assert_eq!(table.len(), 1);
                }

                #[cfg(feature = "std")]
                #[test]
                fn panicking_hasher_keeps_entries_reachable() {
                    let tracker = TrackingAllocator::new(Global);
                    {
                        let mut table: FlatTable<u64, _, $group> =
                            FlatTable::with_capacity_in(32, &tracker);
                        for v in 0..10u64 {
                            table.insert_unique_unchecked(0, v, |_| 0);
                        }
                        assert_eq!(table.remove(0, |&v| v == 4), Some(4));

                        let calls = Cell::new(0);
                        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            table.defragment(|_| {
                                calls.set(calls.get() + 1);
                                if calls.get() == 3 {
                                    panic!("hasher failed");
                                }
                                0
                            });
                        }));
                        assert!(result.is_err());

                        assert_eq!(table.len(), 9);
                        assert_eq!(table.tombstones(), 1);
                        assert_eq!(table.capacity(), 32);
                        assert_eq!(table.iter().count(), 9);
                        for v in (0..10u64).filter(|&v| v != 4) {
                            assert_eq!(table.find(0, |&x| x == v), Some(&v));
                        }
                        assert!(matches!(table.entry(0, |&x| x == 7, |_| 0), Entry::Occupied(_)));

                        table.defragment(|_| 0);
                        assert_eq!(table.tombstones(), 0);
                        assert_eq!(table.len(), 9);
                    }
                    assert_eq!(tracker.live_bytes(), 0);
                    let stats = tracker.stats();
                    assert_eq!(stats.allocations, stats.deallocations);
                }

                #[test]
                #[should_panic(expected = "capacity overflow")]
                fn reserve_beyond_address_space_panics() {
                    let mut table: Table<u64> = Table::new_in(Global);
                    table.insert_unique_unchecked(1, 1, |&v| v);
                    table.reserve(usize::MAX / 10 * 9, |&v| v);
                }

                #[test]
                fn string_keys() {
                    let state = HashState::default();
                    let mut table: Table<(String, i32)> = Table::new_in(Global);
                    let words = ["apple", "banana", "cherry", "date", "elderberry"];
                    for (i, word) in words.iter().enumerate() {
                        let hash = hash_string_key(&state, word);
                        table
                            .entry(hash, |(k, _)| k == word, |(k, _)| hash_string_key(&state, k))
                            .or_insert((word.to_string(), i as i32));
                    }
                    assert_eq!(table.len(), words.len());

                    let hash = hash_string_key(&state, "cherry");
                    assert_eq!(table.find(hash, |(k, _)| k == "cherry").map(|(_, v)| *v), Some(2));
                    assert_eq!(table.remove(hash, |(k, _)| k == "cherry").map(|(_, v)| v), Some(2));
                    assert!(table.find(hash, |(k, _)| k == "cherry").is_none());
                }

                #[test]
                fn entry_helpers() {
                    let mut table: Table<(u64, i32)> = Table::new_in(Global);
                    *table.entry(1, |e| e.0 == 1, |e| e.0).or_insert((1, 0)) = (1, 5);
                    table.entry(1, |e| e.0 == 1, |e| e.0).and_modify(|e| e.1 += 1).or_insert((1, 0));
                    table.entry(2, |e| e.0 == 2, |e| e.0).or_insert_with(|| (2, 9));
                    let value: &mut (u64, i32) = table.entry(3, |e| e.0 == 3, |e| e.0).or_default();
                    assert_eq!(*value, (0, 0));

                    assert_eq!(table.find(1, |e| e.0 == 1), Some(&(1, 6)));
                    assert_eq!(table.find(2, |e| e.0 == 2), Some(&(2, 9)));

                    match table.entry(2, |e| e.0 == 2, |e| e.0) {
                        Entry::Occupied(occ) => assert_eq!(occ.remove(), (2, 9)),
                        Entry::Vacant(_) => panic!("expected occupied"),
                    }
                    assert_eq!(table.len(), 2);
                }

                #[test]
                fn unchecked_insert_keeps_duplicates() {
                    let mut table: Table<u64> = Table::new_in(Global);
                    table.insert_unique_unchecked(5, 5, |&v| v);
                    table.insert_unique_unchecked(5, 5, |&v| v);
                    assert_eq!(table.len(), 2);
                    assert_eq!(table.iter().filter(|&&v| v == 5).count(), 2);
                    assert_eq!(table.remove(5, |&v| v == 5), Some(5));
                    assert_eq!(table.find(5, |&v| v == 5), Some(&5));
                }

                #[test]
                fn clone_preserves_layout() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..15);
                    table.remove(hash_key(&state, 4), |v| v.key == 4);

                    let cloned = table.clone();
                    assert_eq!(cloned.len(), table.len());
                    assert_eq!(cloned.tombstones(), table.tombstones());
                    assert_eq!(cloned.capacity(), table.capacity());
                    assert_eq!(cloned.control_bytes(), table.control_bytes());
                    for k in (0..15).filter(|&k| k != 4) {
                        assert_eq!(find_item(&cloned, &state, k), find_item(&table, &state, k));
                    }

                    let empty: Table<Item> = Table::new_in(Global);
                    assert_eq!(empty.clone().capacity(), 0);
                }

                #[test]
                fn reserve_and_shrink() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    table.reserve(100, |v| hash_key(&state, v.key));
                    let capacity = table.capacity();
                    assert!(capacity * 7 >= 100 * 10);

                    insert_items(&mut table, &state, 0..100);
                    assert_eq!(table.capacity(), capacity);

                    for k in 10..100 {
                        table.remove(hash_key(&state, k), |v| v.key == k);
                    }
                    table.shrink_to_fit(|v| hash_key(&state, v.key));
                    assert!(table.capacity() < capacity);
                    assert!(table.len() * 10 <= table.capacity() * 7);
                    for k in 0..10 {
                        assert!(find_item(&table, &state, k).is_some());
                    }

                    for k in 0..10 {
                        table.remove(hash_key(&state, k), |v| v.key == k);
                    }
                    table.shrink_to_fit(|v| hash_key(&state, v.key));
                    assert_eq!(table.capacity(), 0);
                    assert_eq!(table.tombstones(), 0);

                    insert_items(&mut table, &state, 0..3);
                    assert_eq!(table.capacity(), 32);
                }

                #[test]
                fn slot_access() {
                    let mut table: Table<u64> = Table::with_capacity_in(32, Global);
                    table.insert_unique_unchecked(3, 30, |_| 3);
                    assert_eq!(table.slot(3), Some(&30));
                    assert_eq!(table.slot(4), None);
                    assert_eq!(table.slot(1000), None);
                    table.remove(3, |&v| v == 30);
                    assert_eq!(table.slot(3), None);
                    assert_eq!(table.control_bytes()[3], TOMBSTONE);
                }

                #[test]
                fn zero_sized_values() {
                    let tracker = TrackingAllocator::new(Global);
                    {
                        let mut table: FlatTable<(), _, $group> = FlatTable::new_in(&tracker);
                        for hash in 0..40u64 {
                            table.insert_unique_unchecked(hash, (), |_| 0);
                        }
                        assert_eq!(table.len(), 40);
                        assert_eq!(table.iter().count(), 40);
                        assert_eq!(table.remove(0, |_| true), Some(()));
                        assert_eq!(table.len(), 39);
                    }
                    assert_eq!(tracker.live_bytes(), 0);
                }

                #[test]
                fn allocator_sees_every_buffer_returned() {
                    let state = HashState::default();
                    let tracker = TrackingAllocator::new(Global);
                    {
                        let mut table: FlatTable<Item, _, $group> = FlatTable::new_in(&tracker);
                        for k in 0..500u64 {
                            let hash = hash_key(&state, k);
                            table
                                .entry(hash, |v| v.key == k, |v| hash_key(&state, v.key))
                                .or_insert(Item { key: k, value: 0 });
                        }
                        table.defragment(|v| hash_key(&state, v.key));

                        let stats = tracker.stats();
                        assert_eq!(stats.live_allocations(), 2);
                        assert_eq!(stats.live_bytes(), table.debug_stats().total_bytes);
                    }
                    let stats = tracker.stats();
                    assert_eq!(stats.live_bytes(), 0);
                    assert_eq!(stats.live_allocations(), 0);
                    assert!(stats.allocations > 2);
                }

                #[test]
                fn stats_and_histogram() {
                    let state = HashState::default();
                    let mut table: Table<Item> = Table::new_in(Global);
                    insert_items(&mut table, &state, 0..40);
                    table.remove(hash_key(&state, 0), |v| v.key == 0);

                    let stats = table.debug_stats();
                    assert_eq!(stats.len, 39);
                    assert_eq!(stats.tombstones, 1);
                    assert_eq!(stats.capacity, table.capacity());
                    assert_eq!(stats.empty_slots, table.capacity() - 40);
                    assert!(stats.load_factor <= 0.7);

                    let histogram = table.probe_histogram(|v| hash_key(&state, v.key));
                    assert_eq!(histogram.distances.iter().sum::<usize>(), 39);
                    assert!(histogram.max_distance() < table.capacity());
                    assert!(histogram.mean_distance() >= 0.0);
                }

                #[test]
                fn debug_output() {
                    let mut table: Table<u64> = Table::new_in(Global);
                    let unallocated = alloc::format!("{table:?}");
                    assert!(unallocated.contains("unallocated"));

                    table.insert_unique_unchecked(0, 1, |_| 0);
                    table.insert_unique_unchecked(1, 2, |_| 1);
                    table.remove(1, |&v| v == 2);
                    let rendered = alloc::format!("{table:?}");
                    assert!(rendered.contains("00, xx, .."));
                }
            }
        };
    }

    backend_suite!(scalar, ScalarGroup);

    #[cfg(all(target_feature = "sse2", any(target_arch = "x86", target_arch = "x86_64")))]
    backend_suite!(sse2, crate::group::Sse2Group);

    #[test]
    #[should_panic(expected = "without finding an available one")]
    fn exhausted_probe_is_fatal() {
        let mut slots = Slots::<u64, ScalarGroup>::allocate(&Global, 4);
        for index in 0..4 {
            // SAFETY: In bounds; the test only inspects control bytes.
            unsafe { slots.set_ctrl(index, 0x01) };
        }
        let _ = slots.find_available(0);
    }

    #[test]
    fn load_factor_arithmetic() {
        assert!(!exceeds_load_factor(22, 32));
        assert!(exceeds_load_factor(23, 32));
        assert_eq!(capacity_for(7), 10);
        assert_eq!(capacity_for(100), 143);
        assert!(!exceeds_load_factor(100, capacity_for(100)));
        assert_eq!(capacity_for(usize::MAX / 10 * 7), usize::MAX / 10 * 10);
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn capacity_for_overflow_panics() {
        let _ = capacity_for(usize::MAX / 10 * 8);
    }
}
