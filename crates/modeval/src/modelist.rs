//! The accepted mode list.
//!
//! Accepted modes are cycled through at runtime (e.g. by a "next mode" hotkey), so the list is
//! treated as a ring: the successor of the last mode is the first.

use serde::{Deserialize, Serialize};

use crate::mode::DisplayMode;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeList {
    modes: Vec<DisplayMode>,
}

impl ModeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mode: DisplayMode) {
        self.modes.push(mode);
    }

    pub fn len(&self) -> usize {
        self.modes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DisplayMode> {
        self.modes.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut DisplayMode> {
        self.modes.get_mut(index)
    }

    pub fn first(&self) -> Option<&DisplayMode> {
        self.modes.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DisplayMode> {
        self.modes.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, DisplayMode> {
        self.modes.iter_mut()
    }

    pub fn as_slice(&self) -> &[DisplayMode] {
        &self.modes
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.modes.iter().position(|mode| mode.name == name)
    }

    /// Index of the mode after `index`, wrapping around.
    pub fn next_index(&self, index: usize) -> Option<usize> {
        (index < self.modes.len()).then(|| (index + 1) % self.modes.len())
    }

    /// Index of the mode before `index`, wrapping around.
    pub fn prev_index(&self, index: usize) -> Option<usize> {
        let len = self.modes.len();
        (index < len).then(|| (index + len - 1) % len)
    }

    /// One full lap around the ring, starting at `start`.
    pub fn cycle_from(&self, start: usize) -> impl Iterator<Item = &DisplayMode> + '_ {
        let len = self.modes.len();
        let start = if len == 0 { 0 } else { start % len };
        self.modes[start..].iter().chain(self.modes[..start].iter())
    }

    /// Removes the mode at `index`; its neighbours become adjacent.
    pub fn delete(&mut self, index: usize) -> Option<DisplayMode> {
        (index < self.modes.len()).then(|| self.modes.remove(index))
    }

    /// Drops every mode whose status is not OK, returning how many were removed.
    pub fn retain_ok(&mut self) -> usize {
        let before = self.modes.len();
        self.modes.retain(|mode| mode.status.is_ok());
        before - self.modes.len()
    }

    pub fn clear(&mut self) {
        self.modes.clear();
    }
}

impl<'a> IntoIterator for &'a ModeList {
    type Item = &'a DisplayMode;
    type IntoIter = std::slice::Iter<'a, DisplayMode>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<DisplayMode> for ModeList {
    fn from_iter<I: IntoIterator<Item = DisplayMode>>(iter: I) -> Self {
        Self {
            modes: iter.into_iter().collect(),
        }
    }
}
