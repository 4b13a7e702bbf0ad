/*
 * Copyright (c) 2022, 2023 Frank Fischer <frank-fischer@shadow-soft.de>
 *
 * This program is free software: you can redistribute it and/or
 * modify it under the terms of the GNU General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see  <http://www.gnu.org/licenses/>
 */

//! d-ary heap implementation

use super::ItemPriQueue;

use num_traits::{FromPrimitive, ToPrimitive};

/// Heap item information.
struct DHeapItem<K, V, ID> {
    /// The key associated with this item.
    key: K,
    /// The value (priority) of the item.
    value: V,
    /// Position of this element on the heap. If this element is *not*
    /// on the heap, its the index of the next element in the free
    /// list.
    pos: ID,
}

/// A d-ary heap with stable item handles.
///
/// Each heap node has up to `d` children. Larger arities trade a more
/// expensive `pop_min` for cheaper `decrease_key` operations, which
/// pays off in label-setting shortest-path computations on dense
/// graphs. The default arity is 2.
pub struct DHeap<K, V, ID = u32> {
    /// The heap elements.
    heap: Vec<ID>,
    /// The key and heap-index for each element.
    data: Vec<DHeapItem<K, V, ID>>,
    /// First free item.
    free: Option<ID>,
    /// Number of children per node.
    arity: usize,
}

impl<K, V> DHeap<K, V> {
    pub fn new() -> Self {
        Default::default()
    }

    /// Create a heap with the given arity (at least 2).
    pub fn with_arity(arity: usize) -> Self {
        DHeap {
            heap: vec![],
            data: vec![],
            free: None,
            arity: arity.max(2),
        }
    }
}

impl<K, V, ID> Default for DHeap<K, V, ID> {
    fn default() -> Self {
        DHeap {
            heap: vec![],
            data: vec![],
            free: None,
            arity: 2,
        }
    }
}

impl<K, V, ID> ItemPriQueue<K, V> for DHeap<K, V, ID>
where
    K: Clone,
    V: PartialOrd + Clone,
    ID: FromPrimitive + ToPrimitive + Copy + Eq,
{
    type Item = ID;

    fn clear(&mut self) {
        self.heap.clear();
        self.data.clear();
        self.free = None;
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn value(&self, item: &ID) -> &V {
        &self.data[item.to_usize().unwrap()].value
    }

    fn push(&mut self, key: K, value: V) -> ID {
        let item = if let Some(item) = self.free {
            let idx = item.to_usize().unwrap();
            // take from free list
            let next = self.data[idx].pos;
            if next == item {
                self.free = None
            } else {
                self.free = Some(next)
            }
            // store data
            self.data[idx] = DHeapItem {
                key,
                value,
                pos: ID::from_usize(self.heap.len()).unwrap(),
            };
            item
        } else {
            let item = ID::from_usize(self.data.len()).unwrap();
            self.data.push(DHeapItem {
                key,
                value,
                pos: ID::from_usize(self.heap.len()).unwrap(),
            });
            item
        };
        self.heap.push(item);
        self.upheap(item);
        item
    }

    fn decrease_key(&mut self, item: &mut ID, value: V) -> bool {
        let idx = item.to_usize().unwrap();
        if self.data[idx].value > value {
            self.data[idx].value = value;
            self.upheap(*item);
            true
        } else {
            false
        }
    }

    fn pop_min(&mut self) -> Option<(K, V)> {
        if self.heap.is_empty() {
            return None;
        }

        // remove the smallest element from the heap
        let min_item = self.heap.swap_remove(0);
        let min_idx = min_item.to_usize().unwrap();
        // put its data slot in the free list
        if let Some(next) = self.free {
            // free list is not empty
            self.data[min_idx].pos = next;
        } else {
            // free list has been empty, this is the first element
            self.data[min_idx].pos = min_item;
        }
        self.free = Some(min_item);

        if !self.heap.is_empty() {
            let n = self.heap.len();
            let item = *self.heap.first().unwrap();
            let idx = item.to_usize().unwrap();
            let value = self.data[idx].value.clone();
            let mut cur_pos = 0;
            loop {
                // find the smallest of the up to `arity` children
                let first_child = self.arity * cur_pos + 1;
                if first_child >= n {
                    break;
                }
                let last_child = (first_child + self.arity).min(n);
                let mut next_pos = first_child;
                let mut next_idx = self.heap[first_child].to_usize().unwrap();
                for child_pos in first_child + 1..last_child {
                    let child_idx = self.heap[child_pos].to_usize().unwrap();
                    if self.data[child_idx].value < self.data[next_idx].value {
                        next_pos = child_pos;
                        next_idx = child_idx;
                    }
                }

                if value <= self.data[next_idx].value {
                    break;
                }

                self.heap[cur_pos] = self.heap[next_pos];
                self.data[next_idx].pos = ID::from_usize(cur_pos).unwrap();
                cur_pos = next_pos;
            }
            self.heap[cur_pos] = item;
            self.data[idx].pos = ID::from_usize(cur_pos).unwrap();
        }
        Some((self.data[min_idx].key.clone(), self.data[min_idx].value.clone()))
    }
}

impl<K, V, ID> DHeap<K, V, ID>
where
    V: PartialOrd + Clone,
    ID: FromPrimitive + ToPrimitive + Clone + Eq,
{
    /// Move the element `item` up in the heap until its parent does not have a
    /// larger key or the root node is reached.
    ///
    /// Note that this function assumes that its value is smaller than the value
    /// of its children.
    fn upheap(&mut self, item: ID) {
        let idx = item.to_usize().unwrap();
        let value = self.data[idx].value.clone();
        let mut cur_pos = self.data[idx].pos.to_usize().unwrap();
        while cur_pos > 0 {
            let parent_pos = (cur_pos - 1) / self.arity;
            let parent_idx = self.heap[parent_pos].to_usize().unwrap();
            // We could have used >=, too, but using > moves the item up
            // the heap as far as possible. This results the last node
            // touched with the same value to be considered next (to a
            // certain extend) making the search more dfs like.
            if value > self.data[parent_idx].value {
                break;
            }
            self.heap[cur_pos] = self.heap[parent_pos].clone();
            self.data[parent_idx].pos = ID::from_usize(cur_pos).unwrap();
            cur_pos = parent_pos;
        }
        self.data[idx].pos = ID::from_usize(cur_pos).unwrap();
        self.heap[cur_pos] = item;
    }
}

#[cfg(test)]
mod tests {
    use super::DHeap;
    use crate::collections::ItemPriQueue;

    #[test]
    fn heap_sorts() {
        for arity in [2usize, 3, 4].iter() {
            let mut heap = DHeap::<usize, i64>::with_arity(*arity);
            let values = [5i64, -3, 8, 0, 2, -7, 4, 1];
            for (k, &v) in values.iter().enumerate() {
                heap.push(k, v);
            }
            let mut sorted = vec![];
            while let Some((_, v)) = heap.pop_min() {
                sorted.push(v);
            }
            let mut expected = values.to_vec();
            expected.sort();
            assert_eq!(sorted, expected);
        }
    }

    #[test]
    fn decrease_key_reorders() {
        let mut heap = DHeap::<usize, i64>::new();
        heap.push(1, 10);
        let mut h = heap.push(2, 20);
        heap.push(3, 30);
        assert!(heap.decrease_key(&mut h, 5));
        assert!(!heap.decrease_key(&mut h, 7));
        assert_eq!(heap.pop_min(), Some((2, 5)));
        assert_eq!(heap.pop_min(), Some((1, 10)));
        assert_eq!(heap.pop_min(), Some((3, 30)));
        assert!(heap.is_empty());
    }
}
