//! The pending work list.
//!
//! [`FileQueue`] keeps paths in insertion order (which is also dispatch order)
//! and never holds the same path twice. Identity is plain string equality:
//! `a.ncm` and `./a.ncm` are different entries.

use std::slice::Iter;

/// Ordered, duplicate-free list of file paths waiting to be dumped.
///
/// The only way in is [`add()`](Self::add), which is also the only place the
/// uniqueness invariant is checked.
///
/// # Examples
///
/// ```
/// use ncmdrop_queue::FileQueue;
///
/// let mut queue = FileQueue::new();
/// assert!(queue.add("a.ncm"));
/// assert!(queue.add("b.ncm"));
/// assert!(!queue.add("a.ncm"));
/// assert_eq!(queue.as_slice(), ["a.ncm", "b.ncm"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQueue {
    items: Vec<String>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `path` unless it is already queued.
    ///
    /// Returns `true` if the queue changed.
    pub fn add(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.contains(&path) {
            return false;
        }
        self.items.push(path);
        true
    }

    /// Remove `path` if present.
    ///
    /// Returns `true` if the queue changed.
    pub fn remove(&mut self, path: &str) -> bool {
        match self.items.iter().position(|item| item == path) {
            Some(index) => {
                self.items.remove(index);
                true
            },
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.iter().any(|item| item == path)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, String> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// Copy of the current contents, used as the fixed work list of a batch.
    pub fn snapshot(&self) -> Vec<String> {
        self.items.clone()
    }
}

impl<S: Into<String>> Extend<S> for FileQueue {
    fn extend<T: IntoIterator<Item = S>>(&mut self, iter: T) {
        for path in iter {
            self.add(path);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for FileQueue {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}

impl<'a> IntoIterator for &'a FileQueue {
    type Item = &'a String;
    type IntoIter = Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
