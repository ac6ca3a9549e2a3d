//! Scripted objects and the generational arena that owns them.
//!
//! Objects are addressed by [`ObjectId`] handles carrying a slot index and a
//! generation. Destruction only flags the object and moves it from the live
//! list onto the pending list; the slot is freed later by the reaper, and the
//! generation bump makes every stale handle resolve to nothing.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::core::clock::VirtualTime;
use crate::core::error::SchedulerError;

/// Generational handle to a scripted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    /// Slot index inside the arena.
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when this handle was issued.
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Per-object flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectFlags(u16);

impl ObjectFlags {
    /// No flags.
    pub const EMPTY: Self = Self(0);
    /// Object has been destructed and awaits final teardown.
    pub const DESTRUCTED: Self = Self(1 << 0);
    /// Object wants periodic `reset` calls.
    pub const WILL_RESET: Self = Self(1 << 1);
    /// Object has been reset and not touched since.
    pub const RESET_STATE: Self = Self(1 << 2);
    /// Object wants `clean_up` probes while idle.
    pub const WILL_CLEAN_UP: Self = Self(1 << 3);
    /// Object is on the heartbeat list.
    pub const HEART_BEAT: Self = Self(1 << 4);
    /// Object's program defines a `heart_beat` function.
    pub const HEART_BEAT_FN: Self = Self(1 << 5);
    /// Object can act as a command giver.
    pub const ENABLE_COMMANDS: Self = Self(1 << 6);
    /// Object is bound to a connection.
    pub const INTERACTIVE: Self = Self(1 << 7);
    /// Object is a clone of a master copy.
    pub const CLONE: Self = Self(1 << 8);

    /// Raw bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Set or clear the bits of `other`.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for ObjectFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ObjectFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Description of an object to be created.
#[derive(Debug, Clone)]
pub struct ObjectSpec {
    /// Object name (usually the file it was loaded from).
    pub name: String,
    /// Initial flags; scheduler-owned bits are ignored.
    pub flags: ObjectFlags,
    /// Number of references held on the object's program.
    pub program_refs: u32,
}

impl ObjectSpec {
    /// Spec with the given name, no flags and a single program reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: ObjectFlags::EMPTY,
            program_refs: 1,
        }
    }

    /// Add flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ObjectFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Set the program reference count.
    #[must_use]
    pub const fn with_program_refs(mut self, refs: u32) -> Self {
        self.program_refs = refs;
        self
    }
}

/// A scripted object as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct ScriptObject {
    /// Object name.
    pub name: String,
    /// Flag set.
    pub flags: ObjectFlags,
    /// Virtual time at or after which the next reset is due.
    pub next_reset: VirtualTime,
    /// Virtual time of the last external reference.
    pub time_of_ref: VirtualTime,
    /// Virtual time the object was created.
    pub load_time: VirtualTime,
    /// References held on the object's program (inheritors plus clones).
    pub program_refs: u32,
    /// Object this one shadows, if any.
    pub shadowing: Option<ObjectId>,
    /// Heartbeats delivered to this object.
    pub heart_beats: u64,
    pub(crate) next_all: Option<ObjectId>,
    pub(crate) prev_all: Option<ObjectId>,
}

impl ScriptObject {
    /// True once the object has been destructed.
    pub const fn is_destructed(&self) -> bool {
        self.flags.contains(ObjectFlags::DESTRUCTED)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<ScriptObject>,
}

/// Arena of objects plus the live and pending-destruction lists.
///
/// The live list is doubly linked through the objects and newest-first. The
/// pending list is a plain vector drained by the reaper.
#[derive(Debug, Default)]
pub struct ObjectTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<ObjectId>,
    live: usize,
    pending: Vec<ObjectId>,
}

impl ObjectTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new object and link it at the head of the live list.
    pub fn insert(&mut self, mut object: ScriptObject) -> ObjectId {
        object.flags.remove(ObjectFlags::DESTRUCTED | ObjectFlags::HEART_BEAT);
        object.prev_all = None;
        object.next_all = self.head;

        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len())
                .unwrap_or_else(|_| crate::core::error::fatal("object table exhausted"));
            self.slots.push(Slot {
                generation: 0,
                object: Some(object),
            });
            ObjectId {
                index,
                generation: 0,
            }
        };

        if let Some(old_head) = self.head {
            if let Some(ob) = self.get_mut(old_head) {
                ob.prev_all = Some(id);
            }
        }
        self.head = Some(id);
        self.live += 1;
        id
    }

    /// Resolve a handle. Destructed objects resolve until the reaper frees them.
    pub fn get(&self, id: ObjectId) -> Option<&ScriptObject> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    /// Resolve a handle mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut ScriptObject> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    /// True for destructed objects and for handles whose slot has been freed.
    pub fn is_destructed(&self, id: ObjectId) -> bool {
        self.get(id).is_none_or(ScriptObject::is_destructed)
    }

    /// Flags of a live or pending object.
    pub fn flags(&self, id: ObjectId) -> Option<ObjectFlags> {
        self.get(id).map(|ob| ob.flags)
    }

    /// First object on the live list.
    pub const fn head(&self) -> Option<ObjectId> {
        self.head
    }

    /// Successor of `id` on the live list.
    pub fn next_live(&self, id: ObjectId) -> Option<ObjectId> {
        self.get(id).and_then(|ob| ob.next_all)
    }

    /// Number of live objects.
    pub const fn live_count(&self) -> usize {
        self.live
    }

    /// Live objects in list order.
    pub fn live_ids(&self) -> Vec<ObjectId> {
        let mut ids = Vec::with_capacity(self.live);
        let mut cursor = self.head;
        while let Some(id) = cursor {
            ids.push(id);
            cursor = self.next_live(id);
        }
        ids
    }

    /// Flag an object destructed and move it onto the pending list.
    pub fn mark_destructed(&mut self, id: ObjectId) -> Result<(), SchedulerError> {
        let (prev, next) = match self.get_mut(id) {
            Some(ob) if !ob.is_destructed() => {
                ob.flags.insert(ObjectFlags::DESTRUCTED);
                (ob.prev_all.take(), ob.next_all.take())
            }
            _ => return Err(SchedulerError::ObjectDestructed(id)),
        };

        match prev {
            Some(p) => {
                if let Some(ob) = self.get_mut(p) {
                    ob.next_all = next;
                }
            }
            None => self.head = next,
        }
        if let Some(n) = next {
            if let Some(ob) = self.get_mut(n) {
                ob.prev_all = prev;
            }
        }

        self.live -= 1;
        self.pending.push(id);
        Ok(())
    }

    /// Objects awaiting final teardown.
    pub fn pending(&self) -> &[ObjectId] {
        &self.pending
    }

    /// True when the reaper has work.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Take the pending list, leaving it empty.
    pub fn take_pending(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.pending)
    }

    /// Release a slot, invalidating every handle to it.
    pub fn free(&mut self, id: ObjectId) -> Option<ScriptObject> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let object = slot.object.take()?;
        if !object.is_destructed() {
            crate::core::error::fatal("freeing an object that is still on the live list");
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(object)
    }
}
