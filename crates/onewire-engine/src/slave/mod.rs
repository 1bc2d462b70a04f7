//! Bus-slave roles: emulating keys towards an external reader.

mod hub;
mod link;
mod responder;
pub mod tree;

pub use hub::MultiDeviceHub;
pub use link::{classify_reset, SlaveLink};
pub use responder::{Edge, ResponderState, ResultCallback, SingleSlaveResponder};
pub use tree::{DiscriminationTree, SlotTable, TreeNode, HUB_DEVICE_LIMIT};
