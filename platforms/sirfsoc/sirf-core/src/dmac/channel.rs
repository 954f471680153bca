//! Per-channel descriptor bookkeeping.
//!
//! Each channel owns an arena of [`Descriptor`]s. Every descriptor is tagged
//! with the [`List`] it belongs to, and each list keeps the IDs of its
//! members in order, so the head of `Queued` is always the oldest submitted
//! transfer.
use alloc::{collections::VecDeque, vec::Vec};

use super::{cookie::Cookies, descriptor::Descriptor};

/// Descriptors preallocated for each channel.
pub const DESCRIPTORS: usize = 16;

/// The lifecycle stage of a descriptor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum List {
    /// Available for a new transfer.
    Free,
    /// Filled in by a `prep_*` call, not yet submitted.
    Prepared,
    /// Submitted, waiting for the channel.
    Queued,
    /// Programmed into the hardware.
    Active,
    /// Finished; waiting for the tasklet to run its callback.
    Completed,
}

/// The number of descriptors in each of a channel's lists.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(missing_docs)]
pub struct ListLens {
    pub free: usize,
    pub prepared: usize,
    pub queued: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Lists {
    tags: Vec<List>,
    free: VecDeque<u8>,
    prepared: VecDeque<u8>,
    queued: VecDeque<u8>,
    active: VecDeque<u8>,
    completed: VecDeque<u8>,
}

/// Everything guarded by a channel's lock.
#[derive(Debug)]
pub(crate) struct ChanState {
    pub(crate) descs: Vec<Descriptor>,
    pub(crate) lists: Lists,
    /// Burst mode, from the last slave configuration.
    pub(crate) burst: bool,
    pub(crate) happened_cyclic: u32,
    pub(crate) completed_cyclic: u32,
    pub(crate) cookies: Cookies,
    pub(crate) paused: bool,
    /// Bumped whenever the active cyclic descriptor is replaced or torn
    /// down, so that a callback taken out by the tasklet is not handed back
    /// to a descriptor that has since been reused.
    pub(crate) epoch: u32,
    /// Bumped whenever the descriptor arena is torn down.
    pub(crate) generation: u32,
    /// Set while the tasklet runs this channel's callbacks with the lock
    /// released. Completed descriptors stay in `Completed` until then.
    pub(crate) reclaiming: bool,
}

// === impl Lists ===

impl Lists {
    fn list(&self, list: List) -> &VecDeque<u8> {
        match list {
            List::Free => &self.free,
            List::Prepared => &self.prepared,
            List::Queued => &self.queued,
            List::Active => &self.active,
            List::Completed => &self.completed,
        }
    }

    fn list_mut(&mut self, list: List) -> &mut VecDeque<u8> {
        match list {
            List::Free => &mut self.free,
            List::Prepared => &mut self.prepared,
            List::Queued => &mut self.queued,
            List::Active => &mut self.active,
            List::Completed => &mut self.completed,
        }
    }

    /// Adds a newly allocated descriptor to the free list.
    pub(crate) fn push_new(&mut self) -> u8 {
        let id = self.tags.len() as u8;
        self.tags.push(List::Free);
        self.free.push_back(id);
        id
    }

    pub(crate) fn len(&self, list: List) -> usize {
        self.list(list).len()
    }

    pub(crate) fn is_empty(&self, list: List) -> bool {
        self.list(list).is_empty()
    }

    pub(crate) fn front(&self, list: List) -> Option<u8> {
        self.list(list).front().copied()
    }

    /// Number of descriptors tagged with any list.
    #[cfg(test)]
    pub(crate) fn total(&self) -> usize {
        self.tags.len()
    }

    pub(crate) fn lens(&self) -> ListLens {
        ListLens {
            free: self.free.len(),
            prepared: self.prepared.len(),
            queued: self.queued.len(),
            active: self.active.len(),
            completed: self.completed.len(),
        }
    }

    pub(crate) fn members(&self, list: List) -> Vec<u8> {
        self.list(list).iter().copied().collect()
    }

    /// Moves the head of `from` to the tail of `to`.
    pub(crate) fn move_front(&mut self, from: List, to: List) -> Option<u8> {
        let id = self.list_mut(from).pop_front()?;
        self.retag(id, from, to);
        self.list_mut(to).push_back(id);
        Some(id)
    }

    /// Moves `id` from anywhere in `from` to the tail of `to`.
    pub(crate) fn move_to(&mut self, id: u8, from: List, to: List) {
        let members = self.list_mut(from);
        let pos = members
            .iter()
            .position(|&member| member == id)
            .unwrap_or_else(|| panic!("descriptor {id} is not in the {from:?} list"));
        members.remove(pos);
        self.retag(id, from, to);
        self.list_mut(to).push_back(id);
    }

    /// Moves every member of `from`, in order, to the tail of `to`. Returns
    /// the number of descriptors moved.
    pub(crate) fn splice(&mut self, from: List, to: List) -> usize {
        let mut moved = core::mem::take(self.list_mut(from));
        for &id in &moved {
            self.retag(id, from, to);
        }
        let count = moved.len();
        self.list_mut(to).append(&mut moved);
        count
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    fn retag(&mut self, id: u8, from: List, to: List) {
        let tag = &mut self.tags[id as usize];
        assert_eq!(
            *tag, from,
            "descriptor {id} was tagged {tag:?}, but it was moved out of {from:?}"
        );
        *tag = to;
    }
}

// === impl ChanState ===

impl ChanState {
    pub(crate) fn new() -> Self {
        Self {
            descs: Vec::new(),
            lists: Lists::default(),
            burst: false,
            happened_cyclic: 0,
            completed_cyclic: 0,
            cookies: Cookies::new(),
            paused: false,
            epoch: 0,
            generation: 0,
            reclaiming: false,
        }
    }

    /// Moves the head of `Free` to `Prepared`, resetting it for a new
    /// transfer.
    pub(crate) fn prepare_free(&mut self) -> Option<u8> {
        let id = self.lists.move_front(List::Free, List::Prepared)?;
        self.descs[id as usize].reset();
        Some(id)
    }

    pub(crate) fn desc(&self, id: u8) -> &Descriptor {
        &self.descs[id as usize]
    }

    pub(crate) fn desc_mut(&mut self, id: u8) -> &mut Descriptor {
        &mut self.descs[id as usize]
    }

    /// The descriptor at the head of `Active`, if there is one.
    pub(crate) fn active(&self) -> Option<&Descriptor> {
        self.lists.front(List::Active).map(|id| self.desc(id))
    }

    /// Returns the geometry of the active descriptor, for tests.
    #[cfg(test)]
    pub(crate) fn active_geometry(&self) -> Option<super::descriptor::Geometry> {
        self.active().map(|desc| desc.geometry)
    }

    /// `true` if no transfer is prepared, queued or running. Completed
    /// transfers whose callbacks haven't run yet don't count.
    pub(crate) fn is_idle(&self) -> bool {
        self.lists.is_empty(List::Prepared)
            && self.lists.is_empty(List::Queued)
            && self.lists.is_empty(List::Active)
    }

    /// Drops every descriptor, whatever list it is in.
    pub(crate) fn teardown(&mut self) -> usize {
        let dropped = self.descs.len();
        self.descs = Vec::new();
        self.lists.clear();
        self.generation = self.generation.wrapping_add(1);
        self.epoch = self.epoch.wrapping_add(1);
        self.paused = false;
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists(n: usize) -> Lists {
        let mut lists = Lists::default();
        for _ in 0..n {
            lists.push_new();
        }
        lists
    }

    #[test]
    fn moves_preserve_order() {
        let mut lists = lists(4);
        for _ in 0..3 {
            lists.move_front(List::Free, List::Prepared);
        }
        lists.move_to(1, List::Prepared, List::Queued);
        lists.move_to(0, List::Prepared, List::Queued);
        assert_eq!(lists.members(List::Queued), [1, 0]);
        assert_eq!(lists.members(List::Prepared), [2]);

        assert_eq!(lists.splice(List::Queued, List::Free), 2);
        assert_eq!(lists.members(List::Free), [3, 1, 0]);
        assert_eq!(
            lists.lens(),
            ListLens {
                free: 3,
                prepared: 1,
                ..Default::default()
            }
        );
    }

    #[test]
    #[should_panic]
    fn move_of_non_member_panics() {
        let mut lists = lists(2);
        lists.move_to(1, List::Queued, List::Active);
    }

    #[test]
    fn completions_return_to_free() {
        let mut lists = lists(3);
        lists.move_front(List::Free, List::Completed);
        lists.move_front(List::Free, List::Completed);
        assert_eq!(lists.members(List::Completed), [0, 1]);

        lists.move_to(1, List::Completed, List::Free);
        assert_eq!(lists.total(), 3);
        assert_eq!(lists.members(List::Completed), [0]);
        assert_eq!(lists.members(List::Free), [2, 1]);
    }

    #[test]
    fn completions_do_not_keep_a_channel_busy() {
        let mut state = ChanState::new();
        for _ in 0..2 {
            state.descs.push(Descriptor::new());
            state.lists.push_new();
        }
        state.lists.move_front(List::Free, List::Completed);
        assert!(state.is_idle());
        state.lists.move_front(List::Free, List::Prepared);
        assert!(!state.is_idle());

        let generation = state.generation;
        assert_eq!(state.teardown(), 2);
        assert_ne!(state.generation, generation);
        assert_eq!(state.lists.lens(), ListLens::default());
    }
}
