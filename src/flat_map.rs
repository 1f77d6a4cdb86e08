use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;

use crate::allocator::Allocator;
use crate::allocator::Global;
use crate::flat_table::Entry as TableEntry;
use crate::flat_table::FlatTable;
use crate::group::ControlGroup;
use crate::group::DefaultGroup;
use crate::DefaultHashBuilder;

/// Rehashes a stored pair by its key.
#[inline]
fn make_hasher<K: Hash, V, S: BuildHasher>(hash_builder: &S) -> impl Fn(&(K, V)) -> u64 + '_ {
    move |(k, _)| hash_builder.hash_one(k)
}

#[inline]
fn equivalent_key<Q, K, V>(key: &Q) -> impl Fn(&(K, V)) -> bool + '_
where
    K: Borrow<Q>,
    Q: Eq + ?Sized,
{
    move |(k, _)| Borrow::<Q>::borrow(k) == key
}

/// A hash map stored in a single flat [`FlatTable`] of `(K, V)` pairs.
///
/// Keys are hashed with the builder `S`; lookups filter candidate slots by
/// a seven-bit tag taken from the hash before comparing keys. Removal leaves
/// a tombstone in the slot, which later insertions reuse, and
/// [`defragment`](FlatHashMap::defragment) clears them outright.
///
/// # Performance Characteristics
///
/// - **Memory**: 1 control byte per slot plus the size of `(K, V)`; hashes
///   are not stored, so growth rehashes every key
/// - **Load factor**: at most 0.7; the table doubles before crossing it
/// - **Probing**: linear, [`ControlGroup::WIDTH`] slots per step (16 with
///   SSE2)
///
/// # Examples
///
/// ```rust
/// use flat_hash::FlatHashMap;
///
/// let mut map = FlatHashMap::new();
/// map.emplace("apple", 3);
/// map.emplace("pear", 5);
///
/// assert_eq!(map.get("apple"), Some(&3));
/// assert_eq!(map.remove("pear"), Some(5));
/// assert_eq!(map.len(), 1);
/// assert_eq!(map.tombstones(), 1);
/// ```
pub struct FlatHashMap<
    K,
    V,
    S = DefaultHashBuilder,
    A: Allocator = Global,
    G: ControlGroup = DefaultGroup,
> {
    table: FlatTable<(K, V), A, G>,
    hash_builder: S,
}

impl<K, V, S, A, G> Clone for FlatHashMap<K, V, S, A, G>
where
    K: Clone,
    V: Clone,
    S: Clone,
    A: Allocator + Clone,
    G: ControlGroup,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S, A, G> Debug for FlatHashMap<K, V, S, A, G>
where
    K: Debug,
    V: Debug,
    A: Allocator,
    G: ControlGroup,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(any(feature = "std", feature = "foldhash"))]
impl<K, V> FlatHashMap<K, V> {
    /// Creates an empty map with the default hasher. Nothing is allocated
    /// until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let map: FlatHashMap<i32, String> = FlatHashMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.capacity(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultHashBuilder::default())
    }

    /// Creates a map with `capacity` slots and the default hasher.
    ///
    /// The map holds up to 70% of its slot count before growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let map: FlatHashMap<i32, String> = FlatHashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

#[cfg(any(feature = "std", feature = "foldhash"))]
impl<K, V, A: Allocator> FlatHashMap<K, V, DefaultHashBuilder, A> {
    /// Creates an empty map with the default hasher, drawing memory from
    /// `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self::with_capacity_and_hasher_in(0, DefaultHashBuilder::default(), alloc)
    }

    /// Creates a map with `capacity` slots and the default hasher, drawing
    /// memory from `alloc`.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Self {
        Self::with_capacity_and_hasher_in(capacity, DefaultHashBuilder::default(), alloc)
    }
}

impl<K, V, S> FlatHashMap<K, V, S> {
    /// Creates an empty map with the given hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use core::hash::BuildHasher;
    /// # use siphasher::sip::SipHasher;
    /// #
    /// # use flat_hash::FlatHashMap;
    /// #
    /// # struct SimpleHasher;
    /// # impl BuildHasher for SimpleHasher {
    /// #     type Hasher = SipHasher;
    /// #
    /// #     fn build_hasher(&self) -> Self::Hasher {
    /// #         SipHasher::new()
    /// #     }
    /// # }
    /// #
    /// let map: FlatHashMap<i32, String, _> = FlatHashMap::with_hasher(SimpleHasher);
    /// assert!(map.is_empty());
    /// ```
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(0, hash_builder, Global)
    }

    /// Creates a map with `capacity` slots and the given hasher builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hash_builder, Global)
    }
}

impl<K, V, S, A: Allocator, G: ControlGroup> FlatHashMap<K, V, S, A, G> {
    /// Creates a map with `capacity` slots, the given hasher builder, and
    /// memory drawn from `alloc`.
    ///
    /// A zero capacity allocates nothing; otherwise the slot count is rounded
    /// up to a multiple of the group width and allocated immediately.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::DefaultHashBuilder;
    /// use flat_hash::FlatHashMap;
    /// use flat_hash::allocator::Global;
    /// use flat_hash::group::ScalarGroup;
    ///
    /// let map: FlatHashMap<u32, u32, _, _, ScalarGroup> =
    ///     FlatHashMap::with_capacity_and_hasher_in(10, DefaultHashBuilder::default(), Global);
    /// assert_eq!(map.capacity(), 10);
    /// ```
    pub fn with_capacity_and_hasher_in(capacity: usize, hash_builder: S, alloc: A) -> Self {
        Self {
            table: FlatTable::with_capacity_in(capacity, alloc),
            hash_builder,
        }
    }

    /// Returns the map's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the allocator backing this map.
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }

    /// Returns the number of elements in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the map contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the total number of slots, live or not.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns the number of slots holding a tombstone.
    pub fn tombstones(&self) -> usize {
        self.table.tombstones()
    }

    /// Returns the pair stored in slot `index`, or `None` if the slot is
    /// available or out of range.
    ///
    /// Walking `0..capacity()` with this visits the same pairs as
    /// [`iter`](Self::iter), with the gaps left in.
    pub fn slot(&self, index: usize) -> Option<(&K, &V)> {
        self.table.slot(index).map(|(k, v)| (k, v))
    }

    /// Removes all elements from the map.
    ///
    /// This operation preserves the map's allocated capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// map.remove(&1);
    /// map.insert(2, "b");
    /// let capacity = map.capacity();
    ///
    /// map.clear();
    /// assert!(map.is_empty());
    /// assert_eq!(map.tombstones(), 0);
    /// assert_eq!(map.capacity(), capacity);
    /// ```
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Returns an iterator over the key-value pairs, in slot order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let mut pairs: Vec<_> = map.iter().collect();
    /// pairs.sort();
    /// assert_eq!(pairs, [(&1, &"a"), (&2, &"b")]);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Returns an iterator over the pairs with mutable references to the
    /// values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes all pairs from the map, returning them as an iterator.
    ///
    /// Capacity is kept. Pairs not consumed are dropped with the iterator.
    pub fn drain(&mut self) -> Drain<'_, K, V, A, G> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns statistics about slot usage.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> crate::flat_table::DebugStats {
        self.table.debug_stats()
    }
}

impl<K, V, S, A, G> FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
    /// Inserts a key-value pair unless the key is already present.
    ///
    /// Returns the stored value and `true` if the pair was inserted. If the
    /// key was present, the existing value is returned with `false` and
    /// both arguments are dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// let (value, inserted) = map.emplace(7, "seven");
    /// assert_eq!((*value, inserted), ("seven", true));
    ///
    /// let (value, inserted) = map.emplace(7, "SEVEN");
    /// assert_eq!((*value, inserted), ("seven", false));
    /// ```
    pub fn emplace(&mut self, key: K, value: V) -> (&mut V, bool) {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        ) {
            TableEntry::Occupied(entry) => (&mut entry.into_mut().1, false),
            TableEntry::Vacant(entry) => (&mut entry.insert((key, value)).1, true),
        }
    }

    /// Like [`emplace`](Self::emplace), but clones the key and value only
    /// when the key is absent.
    pub fn emplace_cloned(&mut self, key: &K, value: &V) -> (&mut V, bool)
    where
        K: Clone,
        V: Clone,
    {
        let hash = self.hash_builder.hash_one(key);
        match self
            .table
            .entry(hash, equivalent_key(key), make_hasher(&self.hash_builder))
        {
            TableEntry::Occupied(entry) => (&mut entry.into_mut().1, false),
            TableEntry::Vacant(entry) => (&mut entry.insert((key.clone(), value.clone())).1, true),
        }
    }

    /// Inserts a pair without checking whether the key is present.
    ///
    /// The caller must know the key is absent. If it is not, the map ends up
    /// holding two pairs for the key; lookups find one of them and `len`
    /// counts both. This never causes memory unsafety.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// for n in 0..100 {
    ///     map.emplace_unique_unchecked(n, n * 2);
    /// }
    /// assert_eq!(map.get(&21), Some(&42));
    /// ```
    pub fn emplace_unique_unchecked(&mut self, key: K, value: V) -> &mut V {
        let hash = self.hash_builder.hash_one(&key);
        &mut self
            .table
            .insert_unique_unchecked(hash, (key, value), make_hasher(&self.hash_builder))
            .1
    }

    /// Cloning counterpart of
    /// [`emplace_unique_unchecked`](Self::emplace_unique_unchecked).
    pub fn emplace_cloned_unique_unchecked(&mut self, key: &K, value: &V) -> &mut V
    where
        K: Clone,
        V: Clone,
    {
        self.emplace_unique_unchecked(key.clone(), value.clone())
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, `None` is returned.
    /// If the map did have this key present, the value is updated, and the old
    /// value is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        ) {
            TableEntry::Occupied(mut entry) => {
                Some(core::mem::replace(&mut entry.get_mut().1, value))
            }
            TableEntry::Vacant(entry) => {
                entry.insert((key, value));
                None
            }
        }
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).map(|(_, v)| v)
    }

    /// Returns the stored key and value corresponding to the key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find(hash, equivalent_key(key))
            .map(|(k, v)| (k, v))
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table
            .find_mut(hash, equivalent_key(key))
            .map(|(_, v)| v)
    }

    /// Returns `true` if the map contains a value for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_key_value(key).is_some()
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// The slot becomes a tombstone.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Removes a key from the map, returning the stored key and value if the
    /// key was present.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_builder.hash_one(key);
        self.table.remove(hash, equivalent_key(key))
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut letters = FlatHashMap::new();
    /// for ch in "a short treatise on fungi".chars() {
    ///     letters.entry(ch).and_modify(|n| *n += 1).or_insert(1);
    /// }
    ///
    /// assert_eq!(letters[&'s'], 2);
    /// assert_eq!(letters[&'t'], 3);
    /// assert_eq!(letters.get(&'y'), None);
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, A, G> {
        let hash = self.hash_builder.hash_one(&key);
        match self.table.entry(
            hash,
            equivalent_key(&key),
            make_hasher(&self.hash_builder),
        ) {
            TableEntry::Occupied(entry) => Entry::Occupied(OccupiedEntry { entry }),
            TableEntry::Vacant(entry) => Entry::Vacant(VacantEntry { entry, key }),
        }
    }

    /// Rebuilds the map with at least `capacity` slots, dropping every
    /// tombstone. Never shrinks.
    pub fn grow(&mut self, capacity: usize) {
        self.table.grow(capacity, make_hasher(&self.hash_builder));
    }

    /// Rebuilds the map at its current capacity, dropping every tombstone.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::new();
    /// for n in 0..20 {
    ///     map.insert(n, n);
    /// }
    /// for n in 0..15 {
    ///     map.remove(&n);
    /// }
    /// assert_eq!(map.tombstones(), 15);
    ///
    /// map.defragment();
    /// assert_eq!(map.tombstones(), 0);
    /// assert_eq!(map.len(), 5);
    /// ```
    pub fn defragment(&mut self) {
        self.table.defragment(make_hasher(&self.hash_builder));
    }

    /// Reserves room for at least `additional` more elements without
    /// exceeding the maximum load factor.
    pub fn reserve(&mut self, additional: usize) {
        self.table
            .reserve(additional, make_hasher(&self.hash_builder));
    }

    /// Shrinks the capacity as much as possible while keeping the load factor
    /// under its maximum. An empty map releases its memory.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flat_hash::FlatHashMap;
    ///
    /// let mut map = FlatHashMap::with_capacity(100);
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// map.shrink_to_fit();
    /// assert!(map.capacity() >= 2);
    /// assert!(map.capacity() < 100);
    /// assert_eq!(map.len(), 2);
    /// ```
    pub fn shrink_to_fit(&mut self) {
        self.table
            .shrink_to_fit(make_hasher(&self.hash_builder));
    }

    /// Computes how far each pair sits from the slot its key hashes to.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> crate::flat_table::ProbeHistogram {
        self.table
            .probe_histogram(make_hasher(&self.hash_builder))
    }
}

impl<K, V, S, A, G> Default for FlatHashMap<K, V, S, A, G>
where
    S: Default,
    A: Allocator + Default,
    G: ControlGroup,
{
    fn default() -> Self {
        Self::with_capacity_and_hasher_in(0, S::default(), A::default())
    }
}

impl<K, V, S, A, G> PartialEq for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v == o))
    }
}

impl<K, V, S, A, G> Eq for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
}

impl<K, Q, V, S, A, G> core::ops::Index<&Q> for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
    type Output = V;

    /// Returns the value for `key`.
    ///
    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in FlatHashMap")
    }
}

impl<K, V, S, A, G> Extend<(K, V)> for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S, A, G> Extend<(&'a K, &'a V)> for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq + Copy,
    V: Copy,
    S: BuildHasher,
    A: Allocator,
    G: ControlGroup,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.extend(iter.into_iter().map(|(&k, &v)| (k, v)));
    }
}

impl<K, V, S, A, G> FromIterator<(K, V)> for FlatHashMap<K, V, S, A, G>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    A: Allocator + Default,
    G: ControlGroup,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, S, A: Allocator, G: ControlGroup> IntoIterator for &'a FlatHashMap<K, V, S, A, G> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S, A: Allocator, G: ControlGroup> IntoIterator
    for &'a mut FlatHashMap<K, V, S, A, G>
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

/// A view into a single entry in the map, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`FlatHashMap`].
///
/// [`entry`]: FlatHashMap::entry
pub enum Entry<'a, K, V, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    /// A vacant entry.
    Vacant(VacantEntry<'a, K, V, A, G>),
    /// An occupied entry.
    Occupied(OccupiedEntry<'a, K, V, A, G>),
}

impl<'a, K, V, A: Allocator, G: ControlGroup> Entry<'a, K, V, A, G> {
    /// Inserts a default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts a value computed from a closure if the entry is vacant and
    /// returns a mutable reference.
    pub fn or_insert_with<F>(self, default: F) -> &'a mut V
    where
        F: FnOnce() -> V,
    {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Provides in-place mutable access to an occupied entry before any
    /// potential inserts.
    pub fn and_modify<F>(self, f: F) -> Self
    where
        F: FnOnce(&mut V),
    {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns a reference to this entry's key.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, A, G> Entry<'a, K, V, A, G>
where
    V: Default,
    A: Allocator,
    G: ControlGroup,
{
    /// Inserts the default value if the entry is vacant and returns a mutable
    /// reference.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the map.
pub struct VacantEntry<'a, K, V, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    entry: crate::flat_table::VacantEntry<'a, (K, V), A, G>,
    key: K,
}

impl<'a, K, V, A: Allocator, G: ControlGroup> VacantEntry<'a, K, V, A, G> {
    /// Gets a reference to the key that would be used when inserting a value.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Take ownership of the key.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts the value into the map and returns a mutable reference to it.
    pub fn insert(self, value: V) -> &'a mut V {
        &mut self.entry.insert((self.key, value)).1
    }
}

/// A view into an occupied entry in the map.
pub struct OccupiedEntry<'a, K, V, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    entry: crate::flat_table::OccupiedEntry<'a, (K, V), A, G>,
}

impl<'a, K, V, A: Allocator, G: ControlGroup> OccupiedEntry<'a, K, V, A, G> {
    /// Gets a reference to the key in the entry.
    pub fn key(&self) -> &K {
        &self.entry.get().0
    }

    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        &self.entry.get().1
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        &mut self.entry.get_mut().1
    }

    /// Converts the entry into a mutable reference to the value.
    pub fn into_mut(self) -> &'a mut V {
        &mut self.entry.into_mut().1
    }

    /// Inserts a value into the entry and returns the old value.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(&mut self.entry.get_mut().1, value)
    }

    /// Removes the entry from the map and returns the value.
    pub fn remove(self) -> V {
        self.entry.remove().1
    }

    /// Removes the entry from the map and returns the key and value.
    pub fn remove_entry(self) -> (K, V) {
        self.entry.remove()
    }
}

/// An iterator over the key-value pairs of a `FlatHashMap`.
#[derive(Clone)]
pub struct Iter<'a, K, V> {
    inner: crate::flat_table::Iter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the key-value pairs of a `FlatHashMap`.
pub struct IterMut<'a, K, V> {
    inner: crate::flat_table::IterMut<'a, (K, V)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v)| (&*k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a `FlatHashMap`.
#[derive(Clone)]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a `FlatHashMap`.
#[derive(Clone)]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of a `FlatHashMap`.
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the key-value pairs of a `FlatHashMap`.
pub struct Drain<'a, K, V, A: Allocator = Global, G: ControlGroup = DefaultGroup> {
    inner: crate::flat_table::Drain<'a, (K, V), A, G>,
}

impl<K, V, A: Allocator, G: ControlGroup> Iterator for Drain<'_, K, V, A, G> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, A: Allocator, G: ControlGroup> ExactSizeIterator for Drain<'_, K, V, A, G> {}
