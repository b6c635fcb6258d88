// Gadget: the resource type the lessons pass around
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use crate::handle::ExclusiveHandle;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, PartialEq, Eq)]
pub struct Gadget {
    id: u32,
    name: String,
}

impl Gadget {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        let name = name.into();
        debug!(id, %name, "gadget created");
        Gadget { id, name }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn use_it(&self) -> String {
        format!("Using {}", self)
    }
}

impl Default for Gadget {
    fn default() -> Self {
        Gadget::new(0, "not-set")
    }
}

impl Clone for Gadget {
    fn clone(&self) -> Self {
        Gadget::new(self.id, self.name.clone())
    }
}

/// Copies a borrowed gadget, so `queue.push(&g)` keeps `g` usable.
impl From<&Gadget> for Gadget {
    fn from(gadget: &Gadget) -> Self {
        gadget.clone()
    }
}

/// Builds a gadget in place from its constructor arguments.
impl<S: Into<String>> From<(u32, S)> for Gadget {
    fn from((id, name): (u32, S)) -> Self {
        Gadget::new(id, name)
    }
}

impl fmt::Display for Gadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gadget({}, {})", self.id, self.name)
    }
}

impl Drop for Gadget {
    fn drop(&mut self) {
        debug!(id = self.id, name = %self.name, "gadget destroyed");
    }
}

/// Allocates a gadget named `gadget-<n>` with the next free id.
pub fn create_gadget() -> ExclusiveHandle<Gadget> {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed) + 1;
    ExclusiveHandle::new(Gadget::new(id, format!("gadget-{id}")))
}

/// Borrows without taking ownership.
pub fn use_gadget(gadget: Option<&Gadget>) -> Option<String> {
    gadget.map(Gadget::use_it)
}

/// Sink: takes ownership, the gadget dies when this returns.
pub fn consume(gadget: ExclusiveHandle<Gadget>) -> Option<String> {
    ExclusiveHandle::as_ref(&gadget).map(Gadget::use_it)
}

/// Someone who owns exactly one gadget. Movable, never copyable.
#[derive(Debug)]
pub struct Owner {
    name: String,
    gadget: ExclusiveHandle<Gadget>,
}

impl Owner {
    pub fn new(name: impl Into<String>, gadget: ExclusiveHandle<Gadget>) -> Self {
        Owner {
            name: name.into(),
            gadget,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn use_gadget(&self) -> Option<String> {
        use_gadget(ExclusiveHandle::as_ref(&self.gadget))
    }

    /// Gives the gadget away, leaving the owner empty-handed.
    pub fn hand_over(&mut self) -> ExclusiveHandle<Gadget> {
        ExclusiveHandle::take(&mut self.gadget)
    }
}

/// A device that can hand out shared ownership of itself.
///
/// Only reachable through an `Rc`: the weak self-reference is wired up while
/// the allocation is being built.
#[derive(Debug)]
pub struct Device {
    name: String,
    me: Weak<Device>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Rc<Device> {
        let name = name.into();
        Rc::new_cyclic(|me| Device {
            name,
            me: me.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Another strong owner of this device. `None` only while the last
    /// owner is dropping it.
    pub fn shared_from_self(&self) -> Option<Rc<Device>> {
        self.me.upgrade()
    }

    /// Registers this device with `devices`, which then co-owns it.
    pub fn register(&self, devices: &mut Vec<Rc<Device>>) -> bool {
        match self.shared_from_self() {
            Some(me) => {
                devices.push(me);
                true
            }
            None => false,
        }
    }
}
