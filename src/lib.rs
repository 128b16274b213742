// Iskra: an ISLISP-style Lisp evaluation core.
//
// A parsed S-expression plus a pair of lexical/global environments goes
// in; a value or a condition comes out. Non-local exits share the
// condition channel with ordinary signalling.

pub mod arena;
pub mod classes;
pub mod conditions;
pub mod env;
pub mod eval;
pub mod lambda;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod symbol;
pub mod types;
