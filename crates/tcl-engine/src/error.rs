use std::fmt;

use crate::value::Obj;

/// The five result codes threaded through evaluation (spec §4.3.1, §6).
///
/// Numerically fixed across the interpreter boundary.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    Ok = 0,
    Error = 1,
    Return = 2,
    Break = 3,
    Continue = 4,
}

impl Code {
    #[must_use]
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Return),
            3 => Some(Self::Break),
            4 => Some(Self::Continue),
            _ => None,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Return => "return",
            Self::Break => "break",
            Self::Continue => "continue",
        };
        f.write_str(name)
    }
}

/// Auxiliary options carried by a `return`, readable by the next `catch`
/// (spec §4.3.1).
#[derive(Debug, Clone, Default)]
pub struct ReturnOptions {
    /// `-code N`: overrides the unwind code a `return` collapses to.
    pub code: Option<Code>,
    /// `-level N`: number of enclosing scopes to unwind. Defaults to 1.
    pub level: i64,
    pub errorinfo: Option<String>,
    pub errorcode: Option<String>,
}

/// The evaluator's internal control-flow carrier: any non-`Ok` code plus
/// its payload. This *is* the result-code-plus-payload of spec §4.3.1; it
/// is only converted into a host-visible [`EvalError`] string at the top
/// level (spec §7).
#[derive(Debug, Clone)]
pub enum Unwind {
    /// Script-level error: message is the interpreter result.
    Error(Obj),
    /// `return`: unwinds one proc level carrying a value and options.
    Return { value: Obj, options: ReturnOptions },
    /// `break`: unwinds to the nearest loop construct.
    Break,
    /// `continue`: unwinds to the nearest loop construct.
    Continue,
}

impl Unwind {
    #[must_use]
    pub fn code(&self) -> Code {
        match self {
            Self::Error(_) => Code::Error,
            Self::Return { .. } => Code::Return,
            Self::Break => Code::Break,
            Self::Continue => Code::Continue,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(Obj::from_string(message.into()))
    }
}

impl fmt::Display for Unwind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(msg) => f.write_str(&msg.as_string()),
            Self::Return { value, .. } => write!(f, "return: {}", value.as_string()),
            Self::Break => write!(f, "invoked \"break\" outside of a loop"),
            Self::Continue => write!(f, "invoked \"continue\" outside of a loop"),
        }
    }
}

impl std::error::Error for Unwind {}

/// Parse-time failure: position, length, and message (spec §4.1, §7).
#[derive(Debug, Clone)]
pub struct ParseError {
    pub pos: usize,
    pub len: usize,
    pub message: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.pos, self.pos + self.len)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for Unwind {
    fn from(err: ParseError) -> Self {
        Unwind::error(err.message)
    }
}

/// Variable resolution/link failure (spec §4.5, §7).
#[derive(Debug, Clone)]
pub enum VarError {
    NoSuchVariable { name: String },
    CannotRead { name: String, reason: String },
}

impl fmt::Display for VarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchVariable { name } => write!(f, "can't read \"{name}\": no such variable"),
            Self::CannotRead { name, reason } => write!(f, "can't read \"{name}\": {reason}"),
        }
    }
}

impl std::error::Error for VarError {}

impl From<VarError> for Unwind {
    fn from(err: VarError) -> Self {
        Unwind::error(err.to_string())
    }
}

/// Command-table failure: lookup, rename, delete (spec §4.7, §7).
#[derive(Debug, Clone)]
pub enum CommandError {
    InvalidCommandName { name: String },
    AlreadyExists { name: String },
    WrongArgs { usage: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommandName { name } => write!(f, "invalid command name \"{name}\""),
            Self::AlreadyExists { name } => write!(f, "can't rename to \"{name}\": command already exists"),
            Self::WrongArgs { usage } => write!(f, "wrong # args: should be \"{usage}\""),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<CommandError> for Unwind {
    fn from(err: CommandError) -> Self {
        Unwind::error(err.to_string())
    }
}

/// The host-visible failure of [`crate::interp::Interp::eval`] (spec §6,
/// §7): a result code paired with the interpreter's result string at the
/// point evaluation stopped. Only raised for non-`Ok` codes that survive
/// to the top level uncaught — `return`/`break`/`continue` that collapse
/// normally inside `eval` never reach here.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub code: Code,
    pub message: String,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<Unwind> for EvalError {
    fn from(unwind: Unwind) -> Self {
        match unwind {
            Unwind::Error(msg) => Self { code: Code::Error, message: msg.as_string() },
            Unwind::Return { value, .. } => Self { code: Code::Return, message: value.as_string() },
            Unwind::Break => Self { code: Code::Break, message: "invoked \"break\" outside of a loop".to_string() },
            Unwind::Continue => Self { code: Code::Continue, message: "invoked \"continue\" outside of a loop".to_string() },
        }
    }
}
