#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "list/dict/frame lengths are small and checked before narrowing to i64/u32")]
#![expect(clippy::cast_possible_wrap, reason = "indices and depths here never approach i64::MAX")]
#![expect(clippy::missing_errors_doc, reason = "error variants are documented on Unwind/VarError/CommandError themselves")]
#![expect(clippy::module_name_repetitions, reason = "ForeignHandle/ForeignTypeSpec naming mirrors the spec's own vocabulary")]

mod builtins;
mod command;
mod error;
mod eval;
mod foreign;
mod frame;
mod intern;
mod interp;
mod namespace;
mod parse;
mod repl;
mod resource;
mod trace;
mod value;

pub use crate::{
    command::{BuiltinFn, CommandKind, CommandRecord, ProcParam},
    error::{Code, CommandError, EvalError, ParseError, ReturnOptions, Unwind, VarError},
    foreign::{ForeignCtor, ForeignDestructor, ForeignMethod, ForeignRenderer, ForeignTypeSpec},
    frame::{Link, VarSlot},
    intern::{Accessor, Handle},
    interp::Interp,
    namespace::NamespaceId,
    parse::{Command, ParseOutcome, Word, WordPart},
    repl::{ReplProgress, ReplSession},
    resource::{DEFAULT_MAX_RECURSION_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    value::{ForeignHandle, ForeignTypeTag, IntRep, Obj},
};
