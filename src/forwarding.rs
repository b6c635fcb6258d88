// Forwarding: the callee picks its behaviour from how the caller passed the value
use std::collections::VecDeque;
use std::fmt;

use crate::gadget::Gadget;

/// How a value reached the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// `&Gadget`, read-only access.
    Shared,
    /// `&mut Gadget`, the callee may modify it.
    Exclusive,
    /// `Gadget`, the callee owns it and drops it.
    Owned,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Shared => "&Gadget",
            Category::Exclusive => "&mut Gadget",
            Category::Owned => "Gadget",
        };
        f.write_str(label)
    }
}

/// One overload per way of passing a gadget.
pub trait HaveFun {
    fn have_fun(self) -> (Category, String);
}

impl HaveFun for &Gadget {
    fn have_fun(self) -> (Category, String) {
        (Category::Shared, self.use_it())
    }
}

impl HaveFun for &mut Gadget {
    fn have_fun(self) -> (Category, String) {
        (Category::Exclusive, self.use_it())
    }
}

impl HaveFun for Gadget {
    fn have_fun(self) -> (Category, String) {
        (Category::Owned, self.use_it())
    }
}

/// Passes `gadget` on untouched, so a borrow stays a borrow and an owned
/// value is moved into the callee.
pub fn use_gadget<G: HaveFun>(gadget: G) -> (Category, String) {
    gadget.have_fun()
}

pub fn use_pair<A: HaveFun, B: HaveFun>(first: A, second: B) -> [(Category, String); 2] {
    [first.have_fun(), second.have_fun()]
}

/// A queue whose `push` copies a borrowed item and moves an owned one.
///
/// `push` adds at the front; `emplace` builds the item from its constructor
/// arguments at the back; `pop` takes from the back.
#[derive(Debug)]
pub struct Queue<T> {
    items: VecDeque<T>,
}

impl<T> Queue<T> {
    pub fn new() -> Self {
        Queue {
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: impl Into<T>) {
        self.items.push_front(item.into());
    }

    pub fn emplace<A>(&mut self, args: A)
    where
        T: From<A>,
    {
        self.items.push_back(T::from(args));
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Moves the last item into `slot`, dropping what `slot` held before.
    /// Leaves `slot` untouched and returns `false` when the queue is empty.
    pub fn pop_into(&mut self, slot: &mut T) -> bool {
        match self.items.pop_back() {
            Some(item) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Queue::new()
    }
}
