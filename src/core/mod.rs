pub mod errors;
mod model;
mod space;
mod tensor;
pub mod tree;
pub mod utils;

pub use model::QModel;
pub use space::{KetSpace, SpaceAxis, SpaceTree};
pub use tensor::{MixedStateTensor, OperatorTensor, PureStateTensor, StateTensor, Tensor, prod, sum};
pub use tree::Tree;
