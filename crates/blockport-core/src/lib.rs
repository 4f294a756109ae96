pub mod attr;
pub mod buffer;
pub mod error;
pub mod layout;
pub mod ledger;
pub mod tensor;

pub use attr::*;
pub use buffer::{FloatBuffer, encode_f32, from_buffer, tensor_to_f32, to_buffer};
pub use error::*;
pub use layout::*;
pub use ledger::*;
pub use tensor::*;
