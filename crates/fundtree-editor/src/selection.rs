use std::collections::BTreeSet;

use crate::channel::{Channel, Subscription};
use crate::drag::DragInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

impl SelectionMode {
    pub fn from_multiple(multiple: bool) -> Self {
        if multiple {
            SelectionMode::Multiple
        } else {
            SelectionMode::Single
        }
    }
}

/// Selected node ids. Holds at most one id in single-select mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// The selected id in single-select mode.
    pub fn single(&self) -> Option<&str> {
        match self.ids.len() {
            1 => self.ids.iter().next().map(String::as_str),
            _ => None,
        }
    }
}

/// Broadcasts the selection and the drag in progress to every rendered node.
///
/// One tracker belongs to one editor; independent editors never share
/// channels. Values are published only when they actually change.
#[derive(Clone)]
pub struct FocusTracker {
    mode: SelectionMode,
    selection: Channel<Selection>,
    drag: Channel<Option<DragInfo>>,
}

impl FocusTracker {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            selection: Channel::default(),
            drag: Channel::new(None),
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn selection(&self) -> Selection {
        self.selection.current()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selection.current().contains(id)
    }

    /// Select `id`. In multiple mode an additive click toggles membership;
    /// otherwise the selection is replaced.
    pub fn select(&self, id: &str, additive: bool) {
        let mut next = self.selection.current();
        match self.mode {
            SelectionMode::Multiple if additive => {
                if !next.ids.remove(id) {
                    next.ids.insert(id.to_string());
                }
            }
            _ => {
                next.ids.clear();
                next.ids.insert(id.to_string());
            }
        }
        self.publish_selection(next);
    }

    pub fn deselect(&self, id: &str) {
        let mut next = self.selection.current();
        if next.ids.remove(id) {
            self.publish_selection(next);
        }
    }

    /// Drop every selected id `keep` rejects.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) {
        let mut next = self.selection.current();
        next.ids.retain(|id| keep(id));
        self.publish_selection(next);
    }

    pub fn clear(&self) {
        self.publish_selection(Selection::default());
    }

    fn publish_selection(&self, next: Selection) {
        if next != self.selection.current() {
            self.selection.publish(next);
        }
    }

    pub fn begin_drag(&self, info: DragInfo) {
        if self.drag.current().as_ref() != Some(&info) {
            self.drag.publish(Some(info));
        }
    }

    pub fn end_drag(&self) {
        if self.drag.current().is_some() {
            self.drag.publish(None);
        }
    }

    pub fn current_drag(&self) -> Option<DragInfo> {
        self.drag.current()
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_selection(&self, handler: impl Fn(&Selection) + 'static) -> Subscription {
        self.selection.subscribe(handler)
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe_drag(&self, handler: impl Fn(&Option<DragInfo>) + 'static) -> Subscription {
        self.drag.subscribe(handler)
    }
}

impl Default for FocusTracker {
    fn default() -> Self {
        Self::new(SelectionMode::Single)
    }
}

impl std::fmt::Debug for FocusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusTracker")
            .field("mode", &self.mode)
            .field("selection", &self.selection.current())
            .field("drag", &self.drag.current())
            .finish()
    }
}
