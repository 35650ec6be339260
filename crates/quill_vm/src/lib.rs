//! A stack machine for quill bytecode.

mod error;
mod host;
mod machine;
mod value;

#[cfg(test)]
mod tests;

pub use error::{ErrorCode, VmError, VmResult};
pub use host::{Host, StubHost};
pub use machine::{Vm, VmOptions, DEFAULT_STACK_SIZE};
pub use value::Value;
