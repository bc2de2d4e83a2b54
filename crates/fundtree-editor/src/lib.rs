pub mod channel;
pub mod drag;
pub mod editor;
pub mod expansion;
pub mod host;
pub mod relationship;
pub mod selection;
pub mod viewport;

pub use channel::{Channel, Subscription};
pub use drag::{relabel_subtree, CloneSuffixes, DragInfo, DropEngine, DropGesture, DropRejection};
pub use editor::{EditOutcome, TemplateEditor};
pub use expansion::ExpansionState;
pub use host::{AcceptAll, CommitError, ForestHost};
pub use relationship::{annotate, DecoratedNode, Relationship};
pub use selection::{FocusTracker, Selection, SelectionMode};
pub use viewport::{Fit, MatrixForm, Point, Pointer, Transform, TransformParseError, Viewport, ZoomLimits};

pub use fundtree_core;
