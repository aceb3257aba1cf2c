//! Ordered sequence store backing every sibling group of the list model.
//!
//! A randomized balanced search tree (treap) whose nodes live in a slot
//! vector. Every node tracks its subtree size and its parent, so sorted
//! insertion, removal and index-of-cursor queries are all `O(log n)`.
//! A [`Cursor`] names a slot and stays valid until that element is removed,
//! including across [`Sequence::sort_changed`] and [`Sequence::resort`].

use std::cmp::Ordering;

/// Stable reference to one element of a [`Sequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor(usize);

#[derive(Debug)]
struct Node<T> {
    /// `None` marks a free slot.
    value: Option<T>,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    size: usize,
    priority: u32,
}

/// Balanced, order-preserving container.
#[derive(Debug)]
pub struct Sequence<T> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    root: Option<usize>,
    rng: u32,
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Sequence<T> {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::with_seed(0x9E37_79B9)
    }

    /// Create an empty sequence whose node priorities derive from `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            rng: seed.max(1),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether `cursor` still names a live element.
    pub fn contains(&self, cursor: Cursor) -> bool {
        self.nodes
            .get(cursor.0)
            .is_some_and(|node| node.value.is_some())
    }

    pub fn get(&self, cursor: Cursor) -> Option<&T> {
        self.nodes.get(cursor.0).and_then(|node| node.value.as_ref())
    }

    pub fn get_mut(&mut self, cursor: Cursor) -> Option<&mut T> {
        self.nodes
            .get_mut(cursor.0)
            .and_then(|node| node.value.as_mut())
    }

    /// Element at `index` in sorted order.
    pub fn at(&self, index: usize) -> Option<&T> {
        self.cursor_at(index).and_then(|cursor| self.get(cursor))
    }

    /// Cursor of the element at `index` in sorted order.
    pub fn cursor_at(&self, mut index: usize) -> Option<Cursor> {
        if index >= self.len() {
            return None;
        }
        let mut current = self.root?;
        loop {
            let left_size = self.size(self.nodes[current].left);
            match index.cmp(&left_size) {
                Ordering::Less => current = self.nodes[current].left?,
                Ordering::Equal => return Some(Cursor(current)),
                Ordering::Greater => {
                    index -= left_size + 1;
                    current = self.nodes[current].right?;
                }
            }
        }
    }

    /// Sorted index of the element named by `cursor`.
    pub fn position_of(&self, cursor: Cursor) -> Option<usize> {
        if !self.contains(cursor) {
            return None;
        }
        let mut node = cursor.0;
        let mut index = self.size(self.nodes[node].left);
        while let Some(parent) = self.nodes[node].parent {
            if self.nodes[parent].right == Some(node) {
                index += self.size(self.nodes[parent].left) + 1;
            }
            node = parent;
        }
        Some(index)
    }

    /// Insert `value` at its sorted position. Equal elements keep insertion
    /// order: the new element lands after the existing ones.
    pub fn insert_sorted<F>(&mut self, value: T, mut cmp: F) -> Cursor
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let priority = self.next_priority();
        let slot = self.alloc(value, priority);
        self.attach_sorted(slot, &mut cmp);
        Cursor(slot)
    }

    /// Remove the element named by `cursor`; the remaining elements keep
    /// their relative order.
    pub fn remove(&mut self, cursor: Cursor) -> Option<T> {
        if !self.contains(cursor) {
            debug_assert!(false, "stale cursor {:?}", cursor);
            return None;
        }
        self.detach(cursor.0);
        self.free.push(cursor.0);
        self.nodes[cursor.0].value.take()
    }

    /// Move one element whose sort key changed to its new position.
    ///
    /// Returns `(old_index, new_index)`. The cursor stays valid.
    pub fn sort_changed<F>(&mut self, cursor: Cursor, mut cmp: F) -> Option<(usize, usize)>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let old = self.position_of(cursor)?;
        self.detach(cursor.0);
        self.attach_sorted(cursor.0, &mut cmp);
        let new = self.position_of(cursor)?;
        Some((old, new))
    }

    /// Stable full re-sort. Every cursor stays valid.
    ///
    /// Returns `new_order` with `new_order[new_index] == old_index`.
    pub fn resort<F>(&mut self, mut cmp: F) -> Vec<usize>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut order: Vec<(usize, usize)> = self
            .slots_in_order()
            .enumerate()
            .map(|(old_index, slot)| (slot, old_index))
            .collect();
        let nodes = &self.nodes;
        order.sort_by(|a, b| match (&nodes[a.0].value, &nodes[b.0].value) {
            (Some(x), Some(y)) => cmp(x, y),
            _ => Ordering::Equal,
        });
        let new_order = order.iter().map(|&(_, old_index)| old_index).collect();
        let slots: Vec<usize> = order.into_iter().map(|(slot, _)| slot).collect();
        self.rebuild(&slots);
        new_order
    }

    /// Iterate `(cursor, value)` pairs in sorted order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            seq: self,
            next: self.root.map(|root| self.leftmost(root)),
        }
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.root = None;
    }

    fn size(&self, node: Option<usize>) -> usize {
        node.map_or(0, |n| self.nodes[n].size)
    }

    fn update_size(&mut self, node: usize) {
        let left = self.size(self.nodes[node].left);
        let right = self.size(self.nodes[node].right);
        self.nodes[node].size = left + right + 1;
    }

    fn next_priority(&mut self) -> u32 {
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        x
    }

    fn alloc(&mut self, value: T, priority: u32) -> usize {
        let node = Node {
            value: Some(value),
            parent: None,
            left: None,
            right: None,
            size: 1,
            priority,
        };
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Link a detached node into the tree at its sorted position.
    fn attach_sorted<F>(&mut self, slot: usize, cmp: &mut F)
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        {
            let node = &mut self.nodes[slot];
            node.parent = None;
            node.left = None;
            node.right = None;
            node.size = 1;
        }
        let Some(mut current) = self.root else {
            self.root = Some(slot);
            return;
        };
        loop {
            let goes_left = match (&self.nodes[slot].value, &self.nodes[current].value) {
                (Some(new), Some(existing)) => cmp(new, existing) == Ordering::Less,
                _ => false,
            };
            let next = if goes_left {
                self.nodes[current].left
            } else {
                self.nodes[current].right
            };
            match next {
                Some(child) => current = child,
                None => {
                    if goes_left {
                        self.nodes[current].left = Some(slot);
                    } else {
                        self.nodes[current].right = Some(slot);
                    }
                    self.nodes[slot].parent = Some(current);
                    break;
                }
            }
        }
        let mut ancestor = Some(current);
        while let Some(node) = ancestor {
            self.nodes[node].size += 1;
            ancestor = self.nodes[node].parent;
        }
        while let Some(parent) = self.nodes[slot].parent {
            if self.nodes[parent].priority >= self.nodes[slot].priority {
                break;
            }
            self.rotate_up(slot);
        }
    }

    /// Unlink a node from the tree, keeping its slot and value.
    fn detach(&mut self, slot: usize) {
        loop {
            let left = self.nodes[slot].left;
            let right = self.nodes[slot].right;
            let child = match (left, right) {
                (None, None) => break,
                (Some(l), None) => l,
                (None, Some(r)) => r,
                (Some(l), Some(r)) => {
                    if self.nodes[l].priority >= self.nodes[r].priority {
                        l
                    } else {
                        r
                    }
                }
            };
            self.rotate_up(child);
        }
        let parent = self.nodes[slot].parent;
        match parent {
            Some(p) => {
                if self.nodes[p].left == Some(slot) {
                    self.nodes[p].left = None;
                } else {
                    self.nodes[p].right = None;
                }
            }
            None => self.root = None,
        }
        let mut ancestor = parent;
        while let Some(node) = ancestor {
            self.nodes[node].size -= 1;
            ancestor = self.nodes[node].parent;
        }
        let node = &mut self.nodes[slot];
        node.parent = None;
        node.size = 1;
    }

    /// Rotate `node` above its parent.
    fn rotate_up(&mut self, node: usize) {
        let Some(parent) = self.nodes[node].parent else {
            return;
        };
        let grandparent = self.nodes[parent].parent;
        if self.nodes[parent].left == Some(node) {
            let moved = self.nodes[node].right;
            self.nodes[parent].left = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(parent);
            }
            self.nodes[node].right = Some(parent);
        } else {
            let moved = self.nodes[node].left;
            self.nodes[parent].right = moved;
            if let Some(m) = moved {
                self.nodes[m].parent = Some(parent);
            }
            self.nodes[node].left = Some(parent);
        }
        self.nodes[parent].parent = Some(node);
        self.nodes[node].parent = grandparent;
        match grandparent {
            Some(g) => {
                if self.nodes[g].left == Some(parent) {
                    self.nodes[g].left = Some(node);
                } else {
                    self.nodes[g].right = Some(node);
                }
            }
            None => self.root = Some(node),
        }
        self.update_size(parent);
        self.update_size(node);
    }

    /// Relink the given slots, in order, into a tree that keeps every node's
    /// priority (Cartesian tree construction).
    fn rebuild(&mut self, slots: &[usize]) {
        let mut stack: Vec<usize> = Vec::with_capacity(slots.len());
        for &slot in slots {
            {
                let node = &mut self.nodes[slot];
                node.parent = None;
                node.left = None;
                node.right = None;
            }
            let mut last = None;
            while let Some(&top) = stack.last() {
                if self.nodes[top].priority >= self.nodes[slot].priority {
                    break;
                }
                last = stack.pop();
            }
            if let Some(l) = last {
                self.nodes[slot].left = Some(l);
                self.nodes[l].parent = Some(slot);
            }
            if let Some(&top) = stack.last() {
                self.nodes[top].right = Some(slot);
                self.nodes[slot].parent = Some(top);
            }
            stack.push(slot);
        }
        self.root = stack.first().copied();
        if let Some(root) = self.root {
            self.recompute_sizes(root);
        }
    }

    fn recompute_sizes(&mut self, node: usize) -> usize {
        let left = self.nodes[node].left.map_or(0, |l| self.recompute_sizes(l));
        let right = self.nodes[node].right.map_or(0, |r| self.recompute_sizes(r));
        self.nodes[node].size = left + right + 1;
        self.nodes[node].size
    }

    fn leftmost(&self, mut node: usize) -> usize {
        while let Some(left) = self.nodes[node].left {
            node = left;
        }
        node
    }

    fn successor(&self, node: usize) -> Option<usize> {
        if let Some(right) = self.nodes[node].right {
            return Some(self.leftmost(right));
        }
        let mut child = node;
        let mut parent = self.nodes[node].parent;
        while let Some(p) = parent {
            if self.nodes[p].left == Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    fn slots_in_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.iter().map(|(cursor, _)| cursor.0)
    }

    /// Verify links, sizes and heap order. Test support only.
    #[cfg(test)]
    pub(crate) fn check_structure(&self) {
        fn walk<T>(seq: &Sequence<T>, node: usize, parent: Option<usize>) -> usize {
            let n = &seq.nodes[node];
            assert!(n.value.is_some(), "free slot linked into tree");
            assert_eq!(n.parent, parent, "broken parent link");
            let mut size = 1;
            for child in [n.left, n.right].into_iter().flatten() {
                assert!(seq.nodes[child].priority <= n.priority, "heap order");
                size += walk(seq, child, Some(node));
            }
            assert_eq!(n.size, size, "stale subtree size");
            size
        }
        if let Some(root) = self.root {
            walk(self, root, None);
        }
    }
}

/// In-order iterator over a [`Sequence`].
pub struct Iter<'a, T> {
    seq: &'a Sequence<T>,
    next: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (Cursor, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        self.next = self.seq.successor(slot);
        self.seq.nodes[slot]
            .value
            .as_ref()
            .map(|value| (Cursor(slot), value))
    }
}
