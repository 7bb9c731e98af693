//! Segregated free lists threaded through free block payloads.
//!
//! One doubly linked list per power-of-two size class. Insertion is at the
//! head, so traversal order is most-recently-freed first within a class.

use crate::arena::Arena;
use crate::block::{size_class, FreeLinks, NIL, NUM_SIZE_CLASSES};
use crate::config::FitPolicy;

#[derive(Clone, Copy)]
pub(crate) struct FreeLists {
    heads: [usize; NUM_SIZE_CLASSES],
}

impl FreeLists {
    pub const fn new() -> Self {
        Self {
            heads: [NIL; NUM_SIZE_CLASSES],
        }
    }

    #[inline]
    pub fn head(&self, class: usize) -> usize {
        self.heads[class]
    }

    /// Link the free block at `off` into the list for its size.
    pub fn push_front(&mut self, arena: &mut Arena, off: usize) {
        let class = size_class(arena.header(off).size);
        let head = self.heads[class];
        arena.set_links(off, FreeLinks { next: head, prev: NIL });
        if head != NIL {
            let mut links = arena.links(head);
            links.prev = off;
            arena.set_links(head, links);
        }
        self.heads[class] = off;
    }

    /// Unlink the block at `off`. Its header size must still be the size it
    /// was inserted with.
    pub fn remove(&mut self, arena: &mut Arena, off: usize) {
        let class = size_class(arena.header(off).size);
        let links = arena.links(off);
        if links.prev != NIL {
            let mut prev = arena.links(links.prev);
            prev.next = links.next;
            arena.set_links(links.prev, prev);
        } else {
            self.heads[class] = links.next;
        }
        if links.next != NIL {
            let mut next = arena.links(links.next);
            next.prev = links.prev;
            arena.set_links(links.next, next);
        }
        arena.set_links(off, FreeLinks::DETACHED);
    }

    /// Find a free block with at least `size` payload bytes.
    pub fn find(&self, arena: &Arena, size: usize, policy: FitPolicy) -> Option<usize> {
        for class in size_class(size)..NUM_SIZE_CLASSES {
            let found = match policy {
                FitPolicy::FirstFit => self.first_fit_in(arena, class, size),
                FitPolicy::BestFit => self.best_fit_in(arena, class, size),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn first_fit_in(&self, arena: &Arena, class: usize, size: usize) -> Option<usize> {
        let mut current = self.heads[class];
        while current != NIL {
            if arena.header(current).size >= size {
                return Some(current);
            }
            current = arena.links(current).next;
        }
        None
    }

    // Every block in a higher class is larger than every block in this one,
    // so the best fit of the first class holding any fit is the global best.
    fn best_fit_in(&self, arena: &Arena, class: usize, size: usize) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        let mut current = self.heads[class];
        while current != NIL {
            let block_size = arena.header(current).size;
            if block_size == size {
                return Some(current);
            }
            if block_size > size && best.is_none_or(|(_, best_size)| block_size < best_size) {
                best = Some((current, block_size));
            }
            current = arena.links(current).next;
        }
        best.map(|(off, _)| off)
    }
}
