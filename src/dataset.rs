// Dataset: deep copy on clone, cheap explicit move
use std::fmt;
use std::mem;

use tracing::debug;

use crate::handle::ExclusiveHandle;

/// A named row of integers that owns its buffer through an
/// `ExclusiveHandle<[i32]>`.
///
/// `clone` copies the buffer, `take` steals it and leaves the source in the
/// moved-from state (empty name, no values).
pub struct Dataset {
    name: String,
    values: ExclusiveHandle<[i32]>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, values: &[i32]) -> Self {
        let name = name.into();
        debug!(%name, len = values.len(), "dataset created");
        Dataset {
            name,
            values: Box::<[i32]>::from(values).into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_slice(&self) -> &[i32] {
        ExclusiveHandle::as_ref(&self.values).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, i32> {
        self.as_slice().iter()
    }

    /// Moves the contents out. No allocation happens.
    pub fn take(&mut self) -> Dataset {
        debug!(name = %self.name, "dataset moved");
        Dataset {
            name: mem::take(&mut self.name),
            values: ExclusiveHandle::take(&mut self.values),
        }
    }

    pub fn swap(&mut self, other: &mut Dataset) {
        mem::swap(&mut self.name, &mut other.name);
        ExclusiveHandle::swap(&mut self.values, &mut other.values);
    }
}

impl Clone for Dataset {
    fn clone(&self) -> Self {
        debug!(name = %self.name, "dataset copied");
        Dataset {
            name: self.name.clone(),
            values: Box::<[i32]>::from(self.as_slice()).into(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        let mut copy = source.clone();
        self.swap(&mut copy);
    }
}

impl fmt::Debug for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("values", &self.as_slice())
            .finish()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a i32;
    type IntoIter = std::slice::Iter<'a, i32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Two datasets under one name. Copy and move fall out of the members.
#[derive(Debug, Clone)]
pub struct DataRows {
    name: String,
    row1: Dataset,
    row2: Dataset,
}

impl DataRows {
    pub fn new(name: impl Into<String>, row1: Dataset, row2: Dataset) -> Self {
        DataRows {
            name: name.into(),
            row1,
            row2,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> [&Dataset; 2] {
        [&self.row1, &self.row2]
    }

    pub fn take(&mut self) -> DataRows {
        DataRows {
            name: mem::take(&mut self.name),
            row1: self.row1.take(),
            row2: self.row2.take(),
        }
    }
}
