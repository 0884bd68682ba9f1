//! The bytecode family: instruction set, assembler, compiler, and the VM
//! that executes the result (spec §4.6/§4.7).

pub mod builder;
pub mod code;
pub mod compiler;
pub mod op;
pub mod vm;

pub use code::Code;
