//! Disk-resident B-tree mapping fixed-width keys to `u64` values.
//!
//! Minimum degree is [`DEGREE`] (T = 64): every non-root node holds
//! `T-1..=2T-1` keys and internal nodes hold one more child than keys.
//!
//! # File layout
//!
//! ```text
//! [root_offset: u64][next_free: u64]   16-byte header
//! ...                                  padding to NODE_ALIGN
//! [node][node]...                      fixed-size nodes, 64-byte aligned
//! ```
//!
//! A node is encoded as:
//!
//! ```text
//! [is_leaf: u8]
//! [num_keys: u32]
//! [keys: (2T-1) × K::WIDTH]
//! [values: (2T-1) × u64]
//! [children: 2T × u64]
//! [self_offset: u64]
//! ```
//!
//! Nodes are appended and never moved. Deleted or merged nodes are not
//! reclaimed. Every mutation rewrites the touched nodes and then the header.

use crate::error::{Error, Result};
use crate::storage::PageFile;

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::Path;

use tracing::debug;

/// Minimum degree of the tree.
pub const DEGREE: usize = 64;
/// Maximum keys per node.
pub const MAX_KEYS: usize = 2 * DEGREE - 1;
/// Maximum children per internal node.
pub const MAX_CHILDREN: usize = 2 * DEGREE;
/// Size of the index file header.
pub const INDEX_HEADER_SIZE: u64 = 16;
/// Node allocation alignment.
pub const NODE_ALIGN: u64 = 64;

/// Encoded node size for a key of `key_width` bytes.
#[must_use]
pub const fn node_size(key_width: usize) -> usize {
    1 + 4 + MAX_KEYS * key_width + MAX_KEYS * 8 + MAX_CHILDREN * 8 + 8
}

/// Encoded node size of a `u32`-keyed tree.
pub const NODE_SIZE_U32: usize = node_size(4);

const fn align_up(offset: u64) -> u64 {
    offset.div_ceil(NODE_ALIGN) * NODE_ALIGN
}

pub(crate) const FIRST_NODE_OFFSET: u64 = align_up(INDEX_HEADER_SIZE);

/// Fixed-width key stored in a [`BTree`].
pub trait BTreeKey: Copy + Ord + Debug {
    /// Encoded width in bytes.
    const WIDTH: usize;

    /// Writes the key little-endian into `buf[..WIDTH]`.
    fn write_le(self, buf: &mut [u8]);

    /// Reads a key from `buf[..WIDTH]`.
    fn read_le(buf: &[u8]) -> Self;
}

impl BTreeKey for u32 {
    const WIDTH: usize = 4;

    fn write_le(self, buf: &mut [u8]) {
        buf[..4].copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(buf: &[u8]) -> Self {
        Self::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
    }
}

impl BTreeKey for u64 {
    const WIDTH: usize = 8;

    fn write_le(self, buf: &mut [u8]) {
        buf[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn read_le(buf: &[u8]) -> Self {
        read_u64(buf, 0)
    }
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// In-memory image of one node. `children` is empty for leaves and holds
/// `keys.len() + 1` offsets otherwise.
#[derive(Debug, Clone)]
struct Node<K> {
    offset: u64,
    is_leaf: bool,
    keys: Vec<K>,
    values: Vec<u64>,
    children: Vec<u64>,
}

impl<K: BTreeKey> Node<K> {
    fn leaf(offset: u64) -> Self {
        Self {
            offset,
            is_leaf: true,
            keys: Vec::with_capacity(MAX_KEYS),
            values: Vec::with_capacity(MAX_KEYS),
            children: Vec::new(),
        }
    }

    fn internal(offset: u64, first_child: u64) -> Self {
        let mut children = Vec::with_capacity(MAX_CHILDREN);
        children.push(first_child);
        Self {
            offset,
            is_leaf: false,
            keys: Vec::with_capacity(MAX_KEYS),
            values: Vec::with_capacity(MAX_KEYS),
            children,
        }
    }

    fn is_full(&self) -> bool {
        self.keys.len() == MAX_KEYS
    }

    /// Index of the first key `>= key` and whether it is equal.
    fn locate(&self, key: K) -> (usize, bool) {
        match self.keys.binary_search(&key) {
            Ok(i) => (i, true),
            Err(i) => (i, false),
        }
    }

    fn key_area() -> usize {
        MAX_KEYS * K::WIDTH
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; node_size(K::WIDTH)];
        buf[0] = u8::from(self.is_leaf);
        buf[1..5].copy_from_slice(&(self.keys.len() as u32).to_le_bytes());

        let keys_at = 5;
        let values_at = keys_at + Self::key_area();
        let children_at = values_at + MAX_KEYS * 8;
        let self_at = children_at + MAX_CHILDREN * 8;

        for (i, key) in self.keys.iter().enumerate() {
            key.write_le(&mut buf[keys_at + i * K::WIDTH..]);
        }
        for (i, value) in self.values.iter().enumerate() {
            let at = values_at + i * 8;
            buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }
        for (i, child) in self.children.iter().enumerate() {
            let at = children_at + i * 8;
            buf[at..at + 8].copy_from_slice(&child.to_le_bytes());
        }
        buf[self_at..self_at + 8].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    fn decode(offset: u64, buf: &[u8]) -> Result<Self> {
        let is_leaf = match buf[0] {
            0 => false,
            1 => true,
            other => {
                return Err(Error::corruption(format!(
                    "B-tree node at {offset} has is_leaf byte {other}"
                )))
            }
        };
        let num_keys = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
        if num_keys > MAX_KEYS {
            return Err(Error::corruption(format!(
                "B-tree node at {offset} claims {num_keys} keys (max {MAX_KEYS})"
            )));
        }

        let keys_at = 5;
        let values_at = keys_at + Self::key_area();
        let children_at = values_at + MAX_KEYS * 8;
        let self_at = children_at + MAX_CHILDREN * 8;

        let stored_offset = read_u64(buf, self_at);
        if stored_offset != offset {
            return Err(Error::corruption(format!(
                "B-tree node at {offset} records self offset {stored_offset}"
            )));
        }

        let keys = (0..num_keys)
            .map(|i| K::read_le(&buf[keys_at + i * K::WIDTH..]))
            .collect();
        let values = (0..num_keys)
            .map(|i| read_u64(buf, values_at + i * 8))
            .collect();
        let children: Vec<u64> = if is_leaf {
            Vec::new()
        } else {
            (0..=num_keys)
                .map(|i| read_u64(buf, children_at + i * 8))
                .collect()
        };
        if children.iter().any(|&c| c < FIRST_NODE_OFFSET) {
            return Err(Error::corruption(format!(
                "B-tree node at {offset} has an invalid child pointer"
            )));
        }

        Ok(Self {
            offset,
            is_leaf,
            keys,
            values,
            children,
        })
    }
}

// ---------------------------------------------------------------------------
// BTree
// ---------------------------------------------------------------------------

/// B-tree stored in a single file.
///
/// Not internally synchronized; the owner serializes access.
#[derive(Debug)]
pub struct BTree<K: BTreeKey> {
    file: PageFile,
    root: u64,
    next_free: u64,
    max_bytes: u64,
    _key: PhantomData<fn() -> K>,
}

impl<K: BTreeKey> BTree<K> {
    const NODE_SIZE: usize = node_size(K::WIDTH);

    /// Opens or creates an index file.
    ///
    /// `max_bytes` bounds the file size: a node allocation that would end
    /// past it fails with [`Error::Capacity`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if the header is inconsistent, or an IO
    /// error if the file cannot be accessed.
    pub fn open<P: AsRef<Path>>(path: P, sync_writes: bool, max_bytes: u64) -> Result<Self> {
        let mut file = PageFile::open(path, sync_writes)?;
        let header = file.read_at_or_zero(0, INDEX_HEADER_SIZE as usize)?;
        let root = read_u64(&header, 0);
        let mut next_free = read_u64(&header, 8);

        let fresh = root == 0 && next_free == 0;
        if fresh {
            next_free = FIRST_NODE_OFFSET;
        } else if next_free < FIRST_NODE_OFFSET || (root != 0 && root >= next_free) {
            return Err(Error::corruption(format!(
                "index {} has header root={root} next_free={next_free}",
                file.path().display()
            )));
        }

        let mut tree = Self {
            file,
            root,
            next_free,
            max_bytes,
            _key: PhantomData,
        };
        if fresh {
            tree.write_header()?;
        }
        Ok(tree)
    }

    /// Offset of the root node, or 0 for an empty tree.
    #[must_use]
    pub fn root_offset(&self) -> u64 {
        self.root
    }

    /// Returns true if the tree holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root == 0
    }

    /// Offset where the next node will be placed.
    #[must_use]
    pub fn next_free(&self) -> u64 {
        self.next_free
    }

    /// Number of keys in the tree (walks every node).
    ///
    /// # Errors
    ///
    /// Propagates node read failures.
    pub fn len(&mut self) -> Result<usize> {
        if self.root == 0 {
            return Ok(0);
        }
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(offset) = stack.pop() {
            let node = self.read_node(offset)?;
            count += node.keys.len();
            stack.extend_from_slice(&node.children);
        }
        Ok(count)
    }

    /// Number of levels from root to leaf; 0 for an empty tree.
    ///
    /// # Errors
    ///
    /// Propagates node read failures.
    pub fn height(&mut self) -> Result<usize> {
        let mut height = 0;
        let mut offset = self.root;
        while offset != 0 {
            let node = self.read_node(offset)?;
            height += 1;
            offset = node.children.first().copied().unwrap_or(0);
        }
        Ok(height)
    }

    /// Looks up `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] if a node on the path fails validation.
    pub fn search(&mut self, key: K) -> Result<Option<u64>> {
        let mut offset = self.root;
        while offset != 0 {
            let node = self.read_node(offset)?;
            let (i, found) = node.locate(key);
            if found {
                return Ok(Some(node.values[i]));
            }
            if node.is_leaf {
                return Ok(None);
            }
            offset = node.children[i];
        }
        Ok(None)
    }

    /// Returns true if `key` is present.
    ///
    /// # Errors
    ///
    /// See [`BTree::search`].
    pub fn contains(&mut self, key: K) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// All `(key, value)` pairs in ascending key order.
    ///
    /// # Errors
    ///
    /// Propagates node read failures.
    pub fn entries(&mut self) -> Result<Vec<(K, u64)>> {
        let mut out = Vec::new();
        if self.root != 0 {
            self.collect_in_order(self.root, &mut out)?;
        }
        Ok(out)
    }

    /// All keys in ascending order.
    ///
    /// # Errors
    ///
    /// Propagates node read failures.
    pub fn keys(&mut self) -> Result<Vec<K>> {
        Ok(self.entries()?.into_iter().map(|(k, _)| k).collect())
    }

    fn collect_in_order(&mut self, offset: u64, out: &mut Vec<(K, u64)>) -> Result<()> {
        let node = self.read_node(offset)?;
        for i in 0..node.keys.len() {
            if !node.is_leaf {
                self.collect_in_order(node.children[i], out)?;
            }
            out.push((node.keys[i], node.values[i]));
        }
        if let Some(&last) = node.children.last() {
            self.collect_in_order(last, out)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Insert
    // -----------------------------------------------------------------------

    /// Inserts `key → value`, overwriting the value if the key exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capacity`] if a node cannot be allocated within the
    /// configured file size, or a read/write error.
    pub fn insert(&mut self, key: K, value: u64) -> Result<()> {
        if self.root == 0 {
            let mut root = Node::leaf(self.allocate()?);
            root.keys.push(key);
            root.values.push(value);
            self.write_node(&root)?;
            self.root = root.offset;
            return self.write_header();
        }

        let mut root = self.read_node(self.root)?;
        if root.is_full() {
            if let (i, true) = root.locate(key) {
                root.values[i] = value;
                return self.write_node(&root);
            }
            let mut new_root = Node::internal(self.allocate()?, root.offset);
            self.split_child(&mut new_root, 0, &mut root)?;
            self.root = new_root.offset;
            debug!(root = self.root, "B-tree root split");
            self.insert_non_full(new_root, key, value)?;
        } else {
            self.insert_non_full(root, key, value)?;
        }
        self.write_header()
    }

    fn insert_non_full(&mut self, mut node: Node<K>, key: K, value: u64) -> Result<()> {
        loop {
            let (mut i, found) = node.locate(key);
            if found {
                node.values[i] = value;
                return self.write_node(&node);
            }
            if node.is_leaf {
                node.keys.insert(i, key);
                node.values.insert(i, value);
                return self.write_node(&node);
            }

            let mut child = self.read_node(node.children[i])?;
            if child.is_full() {
                if let (j, true) = child.locate(key) {
                    child.values[j] = value;
                    return self.write_node(&child);
                }
                let sibling = self.split_child(&mut node, i, &mut child)?;
                match key.cmp(&node.keys[i]) {
                    Ordering::Less => {}
                    Ordering::Greater => {
                        i += 1;
                        child = sibling;
                    }
                    Ordering::Equal => {
                        node.values[i] = value;
                        return self.write_node(&node);
                    }
                }
                debug_assert_eq!(node.children[i], child.offset);
            }
            node = child;
        }
    }

    /// Splits the full `child` (at `parent.children[i]`) around its median,
    /// which moves up into `parent`. Returns the new right sibling.
    fn split_child(&mut self, parent: &mut Node<K>, i: usize, child: &mut Node<K>) -> Result<Node<K>> {
        let mut sibling = Node::leaf(self.allocate()?);
        sibling.is_leaf = child.is_leaf;
        sibling.keys = child.keys.split_off(DEGREE);
        sibling.values = child.values.split_off(DEGREE);
        if !child.is_leaf {
            sibling.children = child.children.split_off(DEGREE);
        }

        let (Some(median_key), Some(median_value)) = (child.keys.pop(), child.values.pop()) else {
            return Err(Error::corruption(format!(
                "B-tree node at {} split while not full",
                child.offset
            )));
        };
        parent.keys.insert(i, median_key);
        parent.values.insert(i, median_value);
        parent.children.insert(i + 1, sibling.offset);

        self.write_node(child)?;
        self.write_node(&sibling)?;
        self.write_node(parent)?;
        Ok(sibling)
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    /// Removes `key`, returning whether it was present.
    ///
    /// Nodes on the search path may be rebalanced even when the key is
    /// absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corruption`] for malformed nodes, or a read/write
    /// error.
    pub fn delete(&mut self, key: K) -> Result<bool> {
        if self.root == 0 {
            return Ok(false);
        }

        let root = self.read_node(self.root)?;
        let removed = self.delete_from(root, key)?;

        let root = self.read_node(self.root)?;
        if root.keys.is_empty() {
            self.root = root.children.first().copied().unwrap_or(0);
            debug!(root = self.root, "B-tree root collapsed");
        }
        self.write_header()?;
        Ok(removed)
    }

    fn delete_from(&mut self, mut node: Node<K>, mut key: K) -> Result<bool> {
        loop {
            let (i, found) = node.locate(key);

            if node.is_leaf {
                if !found {
                    return Ok(false);
                }
                node.keys.remove(i);
                node.values.remove(i);
                self.write_node(&node)?;
                return Ok(true);
            }

            if found {
                let left = self.read_node(node.children[i])?;
                if left.keys.len() >= DEGREE {
                    let (pred_key, pred_value) = self.last_entry(&left)?;
                    node.keys[i] = pred_key;
                    node.values[i] = pred_value;
                    self.write_node(&node)?;
                    node = left;
                    key = pred_key;
                    continue;
                }
                let right = self.read_node(node.children[i + 1])?;
                if right.keys.len() >= DEGREE {
                    let (succ_key, succ_value) = self.first_entry(&right)?;
                    node.keys[i] = succ_key;
                    node.values[i] = succ_value;
                    self.write_node(&node)?;
                    node = right;
                    key = succ_key;
                    continue;
                }
                node = self.merge_children(&mut node, i, left, right)?;
                continue;
            }

            node = self.fill_child(&mut node, i)?;
        }
    }

    /// Makes sure `parent.children[i]` holds at least `DEGREE` keys before
    /// descending into it, and returns the (possibly merged) child.
    fn fill_child(&mut self, parent: &mut Node<K>, i: usize) -> Result<Node<K>> {
        let mut child = self.read_node(parent.children[i])?;
        if child.keys.len() >= DEGREE {
            return Ok(child);
        }

        let mut left = if i > 0 {
            Some(self.read_node(parent.children[i - 1])?)
        } else {
            None
        };
        if let Some(left) = left.as_mut().filter(|n| n.keys.len() >= DEGREE) {
            self.borrow_from_left(parent, i, left, &mut child)?;
            return Ok(child);
        }

        let mut right = if i < parent.keys.len() {
            Some(self.read_node(parent.children[i + 1])?)
        } else {
            None
        };
        if let Some(right) = right.as_mut().filter(|n| n.keys.len() >= DEGREE) {
            self.borrow_from_right(parent, i, right, &mut child)?;
            return Ok(child);
        }

        match (left, right) {
            (_, Some(right)) => self.merge_children(parent, i, child, right),
            (Some(left), None) => self.merge_children(parent, i - 1, left, child),
            (None, None) => Err(Error::corruption(format!(
                "B-tree node at {} has an internal child without siblings",
                parent.offset
            ))),
        }
    }

    /// Rotates the separator `parent.keys[i-1]` down into `child` and the
    /// last key of `left` up into the parent.
    fn borrow_from_left(
        &mut self,
        parent: &mut Node<K>,
        i: usize,
        left: &mut Node<K>,
        child: &mut Node<K>,
    ) -> Result<()> {
        let last = left.keys.len() - 1;
        let up_key = left.keys.remove(last);
        let up_value = left.values.remove(last);

        child.keys.insert(0, parent.keys[i - 1]);
        child.values.insert(0, parent.values[i - 1]);
        parent.keys[i - 1] = up_key;
        parent.values[i - 1] = up_value;

        if !child.is_leaf {
            let moved = left.children.remove(left.children.len() - 1);
            child.children.insert(0, moved);
        }

        self.write_node(left)?;
        self.write_node(child)?;
        self.write_node(parent)
    }

    /// Rotates the separator `parent.keys[i]` down into `child` and the
    /// first key of `right` up into the parent.
    fn borrow_from_right(
        &mut self,
        parent: &mut Node<K>,
        i: usize,
        right: &mut Node<K>,
        child: &mut Node<K>,
    ) -> Result<()> {
        let up_key = right.keys.remove(0);
        let up_value = right.values.remove(0);

        child.keys.push(parent.keys[i]);
        child.values.push(parent.values[i]);
        parent.keys[i] = up_key;
        parent.values[i] = up_value;

        if !child.is_leaf {
            child.children.push(right.children.remove(0));
        }

        self.write_node(right)?;
        self.write_node(child)?;
        self.write_node(parent)
    }

    /// Merges `right` (at `children[i+1]`) and the separator `keys[i]` into
    /// `left` (at `children[i]`). The right node is abandoned.
    fn merge_children(
        &mut self,
        parent: &mut Node<K>,
        i: usize,
        mut left: Node<K>,
        right: Node<K>,
    ) -> Result<Node<K>> {
        left.keys.push(parent.keys.remove(i));
        left.values.push(parent.values.remove(i));
        parent.children.remove(i + 1);

        left.keys.extend(right.keys);
        left.values.extend(right.values);
        left.children.extend(right.children);

        self.write_node(&left)?;
        self.write_node(parent)?;
        Ok(left)
    }

    fn last_entry(&mut self, node: &Node<K>) -> Result<(K, u64)> {
        let mut current = node.clone();
        while let Some(&child) = current.children.last() {
            current = self.read_node(child)?;
        }
        match (current.keys.last(), current.values.last()) {
            (Some(&k), Some(&v)) => Ok((k, v)),
            _ => Err(Error::corruption(format!(
                "B-tree leaf at {} is empty",
                current.offset
            ))),
        }
    }

    fn first_entry(&mut self, node: &Node<K>) -> Result<(K, u64)> {
        let mut current = node.clone();
        while let Some(&child) = current.children.first() {
            current = self.read_node(child)?;
        }
        match (current.keys.first(), current.values.first()) {
            (Some(&k), Some(&v)) => Ok((k, v)),
            _ => Err(Error::corruption(format!(
                "B-tree leaf at {} is empty",
                current.offset
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Node I/O
    // -----------------------------------------------------------------------

    fn allocate(&mut self) -> Result<u64> {
        let offset = self.next_free;
        let end = offset + Self::NODE_SIZE as u64;
        if end > self.max_bytes {
            return Err(Error::capacity(format!(
                "index {} would grow to {end} bytes (limit {})",
                self.file.path().display(),
                self.max_bytes
            )));
        }
        self.next_free = align_up(end);
        Ok(offset)
    }

    fn read_node(&mut self, offset: u64) -> Result<Node<K>> {
        if offset < FIRST_NODE_OFFSET || offset >= self.next_free {
            return Err(Error::corruption(format!(
                "B-tree node offset {offset} is outside the allocated region"
            )));
        }
        let buf = self.file.read_at(offset, Self::NODE_SIZE)?;
        Node::decode(offset, &buf)
    }

    fn write_node(&mut self, node: &Node<K>) -> Result<()> {
        self.file.write_at(node.offset, &node.encode())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = [0u8; INDEX_HEADER_SIZE as usize];
        header[0..8].copy_from_slice(&self.root.to_le_bytes());
        header[8..16].copy_from_slice(&self.next_free.to_le_bytes());
        self.file.write_at(0, &header)
    }

    /// Forces the index file to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync()
    }
}
