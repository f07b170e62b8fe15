//! Selection queries and updates.

use std::collections::BTreeSet;

use super::QueryModel;

/// How much of the current page is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedState {
    None,
    Some,
    All,
}

impl QueryModel {
    pub fn has_selections(&self) -> bool {
        self.selections.as_ref().is_some_and(|s| !s.is_empty())
    }

    /// Selected row keys, empty before selections load.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.selections
            .iter()
            .flat_map(|s| s.iter().map(String::as_str))
            .collect()
    }

    pub fn is_row_selected(&self, key: &str) -> bool {
        self.selections.as_ref().is_some_and(|s| s.contains(key))
    }

    /// Selection coverage of the rows on the current page.
    pub fn selected_state(&self) -> SelectedState {
        let Some(page) = self.ordered_rows() else {
            return SelectedState::None;
        };
        let selected = page.iter().filter(|key| self.is_row_selected(key)).count();
        match selected {
            0 => SelectedState::None,
            n if n == page.len() => SelectedState::All,
            _ => SelectedState::Some,
        }
    }

    /// Applies a confirmed check/uncheck of `keys` to the selection.
    pub fn selections_changed<I, S>(&self, checked: bool, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selections: BTreeSet<String> = self
            .selections
            .as_deref()
            .cloned()
            .unwrap_or_default();
        for key in keys {
            let key = key.into();
            if checked {
                selections.insert(key);
            } else {
                selections.remove(&key);
            }
        }
        self.selections_loaded(selections)
    }
}
