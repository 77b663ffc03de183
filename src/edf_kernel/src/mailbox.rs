//! Bounded FIFO mailbox: the queueing half of the IPC subsystem.
//!
//! This module owns only mailbox-local bookkeeping (the slot arena, FIFO
//! order, and the `n_messages`/`n_blocked_msg` counters from `spec.md` §3).
//! The rendezvous/queue decision logic and all interaction with the Ready/
//! Waiting task lists lives in [`crate::ipc`], since that needs the kernel's
//! task arena too.

use alloc::vec::Vec;
use slab::Slab;

use crate::list::{DList, Linked, Links};
use crate::tcb::TaskId;

/// Handle into `KernelState::mailboxes`.
pub type MailboxId = usize;

/// Handle into a `Mailbox`'s own slot arena.
pub type SlotId = usize;

/// The four message statuses from `spec.md` §3. `RecvNoWait` is part of the
/// original status space but — per the original source and the spec's own
/// Open Question note on the `Status != 3` check — no operation ever
/// actually queues one; `receive_no_wait` either completes immediately or
/// fails, it never blocks. The variant is kept for fidelity to the data
/// model but [`Mailbox::insert_slot`] never constructs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    SendWait,
    RecvWait,
    SendNoWait,
    RecvNoWait,
}

/// One queued message. `payload` is `None` for a `RecvWait` slot — a queued
/// receiver doesn't need a buffer of its own; data that arrives while it's
/// parked is delivered straight to its `Tcb::delivered` field (see
/// `crate::ipc` for why: the original stores a raw pointer into the
/// receiver's stack for a zero-copy rendezvous, which this crate avoids by
/// routing the copy through the TCB instead of aliasing a parked task's
/// stack).
pub struct MessageSlot {
    pub kind: SlotKind,
    pub payload: Option<Vec<u8>>,
    pub blocked_task: Option<TaskId>,
    links: Links,
}

impl MessageSlot {
    pub fn new(kind: SlotKind, payload: Option<Vec<u8>>, blocked_task: Option<TaskId>) -> Self {
        MessageSlot {
            kind,
            payload,
            blocked_task,
            links: Links::default(),
        }
    }
}

impl Linked for MessageSlot {
    fn links(&self) -> &Links {
        &self.links
    }
    fn links_mut(&mut self) -> &mut Links {
        &mut self.links
    }
}

pub struct Mailbox {
    slots: Slab<MessageSlot>,
    order: DList,
    max_messages: usize,
    data_size: usize,
    /// `spec.md` invariant I5: `0 <= n_messages <= max_messages`.
    n_messages: i32,
    /// Sign encodes the queue's current role (`spec.md` §3, invariant I5/I8).
    n_blocked_msg: i32,
}

impl Mailbox {
    pub fn new(max_messages: usize, data_size: usize) -> Self {
        Mailbox {
            slots: Slab::with_capacity(max_messages),
            order: DList::new(),
            max_messages,
            data_size,
            n_messages: 0,
            n_blocked_msg: 0,
        }
    }

    /// The fixed per-message payload size (`nDataSize`) every `send_*`/
    /// `receive_*` call reads or writes exactly this many bytes against.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    pub fn n_messages(&self) -> i32 {
        self.n_messages
    }

    pub fn n_blocked_msg(&self) -> i32 {
        self.n_blocked_msg
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.n_messages == 0 && self.n_blocked_msg == 0
    }

    pub fn front_id(&self) -> Option<SlotId> {
        self.order.front()
    }

    pub fn front_kind(&self) -> Option<SlotKind> {
        self.front_id().map(|id| self.slots[id].kind)
    }

    /// If the mailbox is at capacity, evict and return the oldest slot
    /// first (the `send_no_wait` overflow rule, `spec.md` §4.4 scenario 4).
    pub fn evict_oldest_if_full(&mut self) -> Option<MessageSlot> {
        if self.slots.len() >= self.max_messages {
            self.extract_front()
        } else {
            None
        }
    }

    /// Insert a new slot at the tail, applying the bookkeeping deltas from
    /// the table in `spec.md` §4.4.
    pub fn insert_slot(&mut self, slot: MessageSlot) -> SlotId {
        let kind = slot.kind;
        let id = self.slots.insert(slot);
        self.order.push_back(&mut self.slots, id);
        match kind {
            SlotKind::SendWait => {
                self.n_messages += 1;
                self.n_blocked_msg += 1;
            }
            SlotKind::RecvWait => {
                self.n_messages += 1;
                self.n_blocked_msg -= 1;
            }
            SlotKind::SendNoWait => {
                self.n_messages += 1;
            }
            SlotKind::RecvNoWait => {
                // Dead branch in the original (`msg_insertObj` case 5) —
                // no operation ever constructs this kind.
                if self.n_messages > 0 {
                    self.n_messages -= 1;
                }
            }
        }
        id
    }

    /// Remove a specific slot and reverse its bookkeeping delta. `None` if
    /// `id` isn't currently queued (the safe substitute for the original's
    /// `FAIL`-as-`msg*` type confusion — see `SPEC_FULL.md` §9).
    pub fn extract_slot(&mut self, id: SlotId) -> Option<MessageSlot> {
        if !self.slots.contains(id) {
            return None;
        }
        self.order.remove(&mut self.slots, id);
        let slot = self.slots.remove(id);
        match slot.kind {
            SlotKind::SendWait => {
                self.n_messages -= 1;
                self.n_blocked_msg -= 1;
            }
            SlotKind::RecvWait => {
                self.n_messages -= 1;
                self.n_blocked_msg += 1;
            }
            SlotKind::SendNoWait => {
                self.n_messages -= 1;
            }
            SlotKind::RecvNoWait => {
                if self.n_messages > 0 {
                    self.n_messages -= 1;
                }
            }
        }
        Some(slot)
    }

    pub fn extract_front(&mut self) -> Option<MessageSlot> {
        let id = self.order.front()?;
        self.extract_slot(id)
    }
}
