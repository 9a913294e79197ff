/*! A binary heap that keeps an external slot array in sync with its contents

# About
This is an arena-backed binary heap in the same style as a textbook heap: a
flat `Vec` of cells, parent at `(i-1)/2`, children at `2i+1` and `2i+2`. The
difference from a plain heap is that every push, pop, and sift also writes
back into a caller-owned `&mut [Slot]` array, so that some other structure
(here, [crate::filter::Filter]) can always answer "where, right now, does the
value I inserted at time T live?" in O(1), independent of how many times the
heap has reshuffled it since.

Each cell carries a `slot_id`: the index into that external array that
describes this cell. On any swap, both displaced cells' `slot_id`s are used to
write the new indices back. The heap never owns the slot array; it only
borrows it for the duration of an operation.

# Design
Two heaps exist side by side in a filter, one a max-heap ([Side::Lower]) and
one a min-heap ([Side::Upper]). Rather than writing two near-identical heap
types, [IndexedHeap] takes its ordering direction as a field and compares
through [IndexedHeap::higher_priority], which is the only place the direction
is tested.
*/

use crate::error::Error;
use crate::slot::{Side, Slot};

#[derive(Clone, Copy, Debug)]
pub(crate) struct Cell {
    pub value: f64,
    pub slot_id: usize,
}

/// An indexed binary heap: either a max-heap ([Side::Lower]) or a min-heap
/// ([Side::Upper]), chosen at construction.
pub(crate) struct IndexedHeap {
    side: Side,
    cells: Vec<Cell>,
}

impl IndexedHeap {
    pub fn new(side: Side) -> Self {
        IndexedHeap {
            side,
            cells: Vec::new(),
        }
    }

    pub fn with_capacity(side: Side, capacity: usize) -> Self {
        IndexedHeap {
            side,
            cells: Vec::with_capacity(capacity),
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn value_at(&self, index: usize) -> f64 {
        self.cells[index].value
    }

    /// `true` if `a` should sit closer to the root than `b`.
    fn higher_priority(&self, a: f64, b: f64) -> bool {
        match self.side {
            Side::Lower => a > b,
            Side::Upper => a < b,
        }
    }

    pub fn peek_top(&self) -> Result<&Cell, Error> {
        self.cells
            .first()
            .ok_or_else(|| Error::Internal("peek_top called on an empty heap".into()))
    }

    pub fn push(&mut self, value: f64, slot_id: usize, slots: &mut [Slot]) {
        self.cells.push(Cell { value, slot_id });
        let index = self.cells.len() - 1;
        slots[slot_id] = Slot {
            side: self.side,
            index,
        };
        self.sift_up(index, slots);
    }

    pub fn pop_top(&mut self, slots: &mut [Slot]) -> Result<Cell, Error> {
        if self.cells.is_empty() {
            return Err(Error::Internal("pop_top called on an empty heap".into()));
        }
        let top = self.cells.swap_remove(0);
        if !self.cells.is_empty() {
            slots[self.cells[0].slot_id].index = 0;
            self.sift_down(0, slots);
        }
        Ok(top)
    }

    /// Overwrites the value at `index` in place and restores heap order by
    /// sifting in whichever direction the change implies. Only the mutated
    /// cell can be out of place afterward, so at most one of sift_up/sift_down
    /// does any work.
    pub fn replace_at(&mut self, index: usize, new_value: f64, slots: &mut [Slot]) -> Result<(), Error> {
        if index >= self.cells.len() {
            return Err(Error::Internal(format!(
                "replace_at index {index} out of bounds (size {})",
                self.cells.len()
            )));
        }
        let old_value = self.cells[index].value;
        self.cells[index].value = new_value;
        if self.higher_priority(new_value, old_value) {
            self.sift_up(index, slots);
        } else if self.higher_priority(old_value, new_value) {
            self.sift_down(index, slots);
        }
        Ok(())
    }

    fn sift_up(&mut self, mut index: usize, slots: &mut [Slot]) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.higher_priority(self.cells[index].value, self.cells[parent].value) {
                self.cells.swap(index, parent);
                slots[self.cells[index].slot_id].index = index;
                slots[self.cells[parent].slot_id].index = parent;
                index = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut index: usize, slots: &mut [Slot]) {
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut target = index;
            if left < self.cells.len() && self.higher_priority(self.cells[left].value, self.cells[target].value) {
                target = left;
            }
            if right < self.cells.len() && self.higher_priority(self.cells[right].value, self.cells[target].value) {
                target = right;
            }
            if target == index {
                break;
            }
            self.cells.swap(index, target);
            slots[self.cells[index].slot_id].index = index;
            slots[self.cells[target].slot_id].index = target;
            index = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(n: usize) -> Vec<Slot> {
        vec![
            Slot {
                side: Side::Lower,
                index: 0
            };
            n
        ]
    }

    #[test]
    fn max_heap_pops_descending() {
        let mut heap = IndexedHeap::new(Side::Lower);
        let mut slots = slots(6);
        for (id, &v) in [3.0, 1.0, 4.0, 1.0, 5.0, 9.0].iter().enumerate() {
            heap.push(v, id, &mut slots);
        }
        let mut popped = Vec::new();
        while !heap.is_empty() {
            popped.push(heap.pop_top(&mut slots).unwrap().value);
        }
        assert_eq!(popped, vec![9.0, 5.0, 4.0, 3.0, 1.0, 1.0]);
    }

    #[test]
    fn min_heap_pops_ascending() {
        let mut heap = IndexedHeap::new(Side::Upper);
        let mut slots = slots(5);
        for (id, &v) in [5.0, 2.0, 8.0, 1.0, 9.0].iter().enumerate() {
            heap.push(v, id, &mut slots);
        }
        let mut popped = Vec::new();
        while !heap.is_empty() {
            popped.push(heap.pop_top(&mut slots).unwrap().value);
        }
        assert_eq!(popped, vec![1.0, 2.0, 5.0, 8.0, 9.0]);
    }

    #[test]
    fn slot_back_references_track_moves() {
        let mut heap = IndexedHeap::new(Side::Lower);
        let mut slots = slots(5);
        for (id, &v) in [10.0, 20.0, 5.0, 30.0, 1.0].iter().enumerate() {
            heap.push(v, id, &mut slots);
            let s = slots[id];
            assert_eq!(heap.value_at(s.index), v);
        }
        // Every slot must still resolve to the value it was pushed with.
        let expected = [10.0, 20.0, 5.0, 30.0, 1.0];
        for (id, &v) in expected.iter().enumerate() {
            let s = slots[id];
            assert_eq!(heap.value_at(s.index), v);
        }
    }

    #[test]
    fn replace_at_restores_order() {
        let mut heap = IndexedHeap::new(Side::Lower);
        let mut slots = slots(4);
        for (id, &v) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            heap.push(v, id, &mut slots);
        }
        let s = slots[0]; // wherever value 1.0 ended up
        heap.replace_at(s.index, 100.0, &mut slots).unwrap();
        assert_eq!(heap.peek_top().unwrap().value, 100.0);
    }

    #[test]
    fn pop_top_on_empty_heap_is_internal_error() {
        let mut heap = IndexedHeap::new(Side::Lower);
        let mut slots: Vec<Slot> = Vec::new();
        assert!(matches!(heap.pop_top(&mut slots), Err(Error::Internal(_))));
    }
}
