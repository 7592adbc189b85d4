mod controlled;
mod remapped;
mod sequential;

pub use controlled::{CONTROLLED, ControlKeys, ControlledOperation, ControlledToTensor};
pub use remapped::{REMAPPED, RemappedForward, RemappedOperation, SpaceMapping};
pub use sequential::{SEQUENTIAL, SequentialOperation, SequentialToTensor};
