//! Revisioned values.
//!
//! A `Revision` pairs a value with the number of times it has been written.
//! Two revisions are equal when their counters match, regardless of the
//! value: assigning a structurally identical state is still a change that
//! observers must see.

use std::ops::Deref;

/// A value plus its write counter.
#[derive(Debug, Clone)]
pub struct Revision<T> {
    revision: u64,
    value: T,
}

impl<T> Revision<T> {
    /// Wrap an initial value at revision 0.
    pub fn new(value: T) -> Self {
        Self { revision: 0, value }
    }

    /// Replace the value and bump the counter.
    pub fn set(&mut self, value: T) {
        self.value = value;
        self.revision += 1;
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> Deref for Revision<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> PartialEq for Revision<T> {
    fn eq(&self, other: &Self) -> bool {
        self.revision == other.revision
    }
}

impl<T> Eq for Revision<T> {}
