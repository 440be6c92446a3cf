// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use smallvec::SmallVec;

use crate::constants::MAX_INLINE_CURSORS;

/// A buffer position: block id plus offset into that block's data area.
///
/// The derived ordering is lexicographic on `(block, off)`, which is exactly
/// the positional order of the buffer because block ids increase from head
/// to tail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Pos {
    pub(crate) block: u64,
    pub(crate) off: usize,
}

/// Moves a position forward by `step` bytes.
///
/// Interior blocks all expose `data_size` bytes, so the walk is pure
/// arithmetic: hop to the next block whenever the step reaches the end of
/// the current data area. A position resting exactly at a block's data end
/// is normalized onto the next block even for a zero step.
pub(crate) fn advance_pos(mut pos: Pos, mut step: usize, data_size: usize) -> Pos {
    debug_assert!(pos.off <= data_size);

    while step >= data_size - pos.off {
        step -= data_size - pos.off;
        pos.block += 1;
        pos.off = 0;
    }
    pos.off += step;
    pos
}

/// Moves a position backward by `step` bytes. Inverse of [`advance_pos`]
/// except that it lands on `data_size` (not 0) when stopping exactly at a
/// block boundary, mirroring how the tail end of a full block is addressed.
pub(crate) fn rewind_pos(mut pos: Pos, mut step: usize, data_size: usize) -> Pos {
    debug_assert!(pos.off <= data_size);

    while step > pos.off {
        step -= pos.off;
        pos.block -= 1;
        pos.off = data_size;
    }
    pos.off -= step;
    pos
}

/// Byte distance between two positions, `from <= to`.
pub(crate) fn pos_distance(from: Pos, to: Pos, data_size: usize) -> usize {
    debug_assert!(from <= to);

    let whole_blocks = usize::try_from(to.block - from.block).expect("block count fits in usize");
    whole_blocks * data_size + to.off - from.off
}

/// Where a new registration lands in the registry order.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Anchor {
    /// Ahead of every existing registration (used by `begin()`).
    Front,
    /// After every existing registration (used by `end()`).
    Back,
    /// Immediately after an existing registration (used by cursor clones).
    After(CursorKey),
}

/// Stable handle to a registry slot. Valid until deregistered.
pub(crate) type CursorKey = usize;

#[derive(Clone, Copy, Debug)]
struct Slot {
    pos: Pos,
    /// Index of this slot's key in the order vector.
    rank: usize,
}

/// The per-buffer list of live cursors, sorted ascending by position.
///
/// Slots give cursors stable keys; the order vector is the sorted view. The
/// sort key is the position itself, so uniform shifts of an order suffix
/// (during insert/release) preserve sortedness without re-sorting, while a
/// single cursor's forward move re-sorts just that cursor.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Vec<Option<Slot>>,
    free: Vec<CursorKey>,
    order: SmallVec<[CursorKey; MAX_INLINE_CURSORS]>,
}

impl Registry {
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    fn slot(&self, key: CursorKey) -> &Slot {
        self.slots[key].as_ref().expect("cursor key is live")
    }

    fn slot_mut(&mut self, key: CursorKey) -> &mut Slot {
        self.slots[key].as_mut().expect("cursor key is live")
    }

    /// Rewrites ranks for order entries at `from..`.
    fn renumber_from(&mut self, from: usize) {
        for index in from..self.order.len() {
            let key = self.order[index];
            self.slot_mut(key).rank = index;
        }
    }

    pub(crate) fn register(&mut self, pos: Pos, anchor: Anchor) -> CursorKey {
        let index = match anchor {
            Anchor::Front => 0,
            Anchor::Back => self.order.len(),
            Anchor::After(source) => self.slot(source).rank + 1,
        };

        let slot = Slot { pos, rank: index };
        let key = if let Some(key) = self.free.pop() {
            self.slots[key] = Some(slot);
            key
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        };

        self.order.insert(index, key);
        self.renumber_from(index);
        key
    }

    pub(crate) fn deregister(&mut self, key: CursorKey) {
        let rank = self.slot(key).rank;
        self.order.remove(rank);
        self.renumber_from(rank);
        self.slots[key] = None;
        self.free.push(key);
    }

    pub(crate) fn pos(&self, key: CursorKey) -> Pos {
        self.slot(key).pos
    }

    /// Updates a slot's position without touching the order. The caller is
    /// responsible for restoring sortedness (via [`adjust_forward`][Self::adjust_forward])
    /// or for performing a shift that preserves it.
    pub(crate) fn set_pos(&mut self, key: CursorKey, pos: Pos) {
        self.slot_mut(key).pos = pos;
    }

    /// Restores sort order for one slot after its position moved forward.
    ///
    /// The slot is pulled out of its place and reinserted before the first
    /// following entry whose position is not less than its own.
    pub(crate) fn adjust_forward(&mut self, key: CursorKey) {
        let Slot { pos, rank } = *self.slot(key);

        if rank + 1 >= self.order.len() || self.slot(self.order[rank + 1]).pos >= pos {
            return;
        }

        self.order.remove(rank);

        let mut index = rank;
        while index < self.order.len() && self.slot(self.order[index]).pos < pos {
            index += 1;
        }

        self.order.insert(index, key);
        self.renumber_from(rank);
    }

    /// Advances every registered position strictly after `cut` by `delta`
    /// bytes. Walks the order from the tail and stops at the first entry at
    /// or before the cut; the uniform shift keeps the order sorted.
    pub(crate) fn shift_after_forward(&mut self, cut: Pos, delta: usize, data_size: usize) {
        for index in (0..self.order.len()).rev() {
            let key = self.order[index];
            let slot = self.slot_mut(key);
            if slot.pos <= cut {
                break;
            }
            slot.pos = advance_pos(slot.pos, delta, data_size);
        }
    }

    /// Rewinds every registered position strictly after `cut` by `delta`
    /// bytes. Counterpart of [`shift_after_forward`][Self::shift_after_forward].
    pub(crate) fn shift_after_backward(&mut self, cut: Pos, delta: usize, data_size: usize) {
        for index in (0..self.order.len()).rev() {
            let key = self.order[index];
            let slot = self.slot_mut(key);
            if slot.pos <= cut {
                break;
            }
            slot.pos = rewind_pos(slot.pos, delta, data_size);
        }
    }

    /// Position of the first (lowest) registered cursor, if any.
    pub(crate) fn first(&self) -> Option<Pos> {
        self.order.first().map(|&key| self.slot(key).pos)
    }

    /// Position of the last (highest) registered cursor, if any.
    pub(crate) fn last(&self) -> Option<Pos> {
        self.order.last().map(|&key| self.slot(key).pos)
    }

    pub(crate) fn iter_pos(&self) -> impl Iterator<Item = Pos> + '_ {
        self.order.iter().map(|&key| self.slot(key).pos)
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.order.windows(2).all(|pair| self.slot(pair[0]).pos <= self.slot(pair[1]).pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: usize = 16;

    fn pos(block: u64, off: usize) -> Pos {
        Pos { block, off }
    }

    #[test]
    fn advance_crosses_blocks() {
        assert_eq!(advance_pos(pos(0, 0), 5, DATA), pos(0, 5));
        assert_eq!(advance_pos(pos(0, 10), 6, DATA), pos(1, 0));
        assert_eq!(advance_pos(pos(0, 10), 7, DATA), pos(1, 1));
        assert_eq!(advance_pos(pos(0, 0), DATA * 3, DATA), pos(3, 0));
    }

    #[test]
    fn advance_normalizes_block_end() {
        // A position resting at the data end hops even for a zero step.
        assert_eq!(advance_pos(pos(0, DATA), 0, DATA), pos(1, 0));
    }

    #[test]
    fn rewind_crosses_blocks() {
        assert_eq!(rewind_pos(pos(1, 1), 1, DATA), pos(1, 0));
        assert_eq!(rewind_pos(pos(1, 1), 2, DATA), pos(0, 15));
        assert_eq!(rewind_pos(pos(2, 0), DATA, DATA), pos(1, 0));
    }

    #[test]
    fn distance_matches_advance() {
        let from = pos(0, 3);
        for step in [0, 1, 7, DATA, DATA * 2 + 5] {
            let to = advance_pos(from, step, DATA);
            assert_eq!(pos_distance(from, to, DATA), step);
        }
    }

    #[test]
    fn registration_anchors() {
        let mut registry = Registry::default();

        let begin = registry.register(pos(0, 0), Anchor::Front);
        let end = registry.register(pos(2, 4), Anchor::Back);
        let clone = registry.register(pos(0, 0), Anchor::After(begin));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.first(), Some(pos(0, 0)));
        assert_eq!(registry.last(), Some(pos(2, 4)));

        let order: Vec<_> = registry.iter_pos().collect();
        assert_eq!(order, vec![pos(0, 0), pos(0, 0), pos(2, 4)]);

        registry.deregister(clone);
        registry.deregister(begin);
        registry.deregister(end);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn adjust_forward_resorts() {
        let mut registry = Registry::default();

        let a = registry.register(pos(0, 0), Anchor::Back);
        let b = registry.register(pos(0, 5), Anchor::Back);
        let c = registry.register(pos(1, 2), Anchor::Back);

        registry.set_pos(a, advance_pos(pos(0, 0), DATA + 1, DATA));
        registry.adjust_forward(a);

        let order: Vec<_> = registry.iter_pos().collect();
        assert_eq!(order, vec![pos(0, 5), pos(1, 1), pos(1, 2)]);
        assert!(registry.is_sorted());

        registry.deregister(a);
        registry.deregister(b);
        registry.deregister(c);
    }

    #[test]
    fn suffix_shifts_preserve_order() {
        let mut registry = Registry::default();

        let keys: Vec<_> = [pos(0, 2), pos(0, 6), pos(1, 3)]
            .into_iter()
            .map(|p| registry.register(p, Anchor::Back))
            .collect();

        // Shift strictly after (0, 2): the first entry stays put.
        registry.shift_after_forward(pos(0, 2), 12, DATA);
        let order: Vec<_> = registry.iter_pos().collect();
        assert_eq!(order, vec![pos(0, 2), pos(1, 2), pos(1, 15)]);
        assert!(registry.is_sorted());

        registry.shift_after_backward(pos(0, 2), 12, DATA);
        let order: Vec<_> = registry.iter_pos().collect();
        assert_eq!(order, vec![pos(0, 2), pos(0, 6), pos(1, 3)]);

        for key in keys {
            registry.deregister(key);
        }
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut registry = Registry::default();

        let a = registry.register(pos(0, 0), Anchor::Back);
        registry.deregister(a);
        let b = registry.register(pos(0, 1), Anchor::Back);

        assert_eq!(a, b);
        registry.deregister(b);
    }
}
