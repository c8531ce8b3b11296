use crate::heap::HeapRef;
use std::fmt::Display;

#[derive(Debug)]
pub enum VmError {
    MalformedDescriptor(String),
    Preprocessing(String),
    DuplicateClass(String),
    UnknownClass(String),
    UnknownMethod {
        class: String,
        method: String,
    },
    UnknownOpcode {
        line_no: usize,
        line: String,
    },
    MalformedOperand {
        opcode: String,
        operands: String,
    },
    UnsupportedBuiltinMethod {
        class: String,
        method: String,
    },
    StepBudgetExceeded(u64),
    StackOverflow(usize),
    WrongHeapAddress(HeapRef),
    UncaughtException {
        class_name: String,
        message: Option<String>,
    },
    Io(std::io::Error),
    JavaException(JavaException),
    /// An already materialized exception object in flight between frames.
    JavaExceptionThrown(HeapRef),
}

impl From<std::io::Error> for VmError {
    fn from(value: std::io::Error) -> Self {
        VmError::Io(value)
    }
}

impl From<JavaException> for VmError {
    fn from(value: JavaException) -> Self {
        VmError::JavaException(value)
    }
}

impl Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VmError::UncaughtException {
                class_name,
                message,
            } => {
                write!(f, "{}", class_name)?;
                if let Some(message) = message {
                    write!(f, ": {}", message)?;
                }
                Ok(())
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for VmError {}

/// The Java-visible exceptions the emulator can raise on its own. These are
/// materialized as heap objects and can be consumed by catch handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaExceptionKind {
    ArithmeticException,
    ArrayIndexOutOfBoundsException,
    NullPointerException,
    ClassCastException,
    NumberFormatException,
}

impl JavaExceptionKind {
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::ArithmeticException => "java/lang/ArithmeticException",
            Self::ArrayIndexOutOfBoundsException => "java/lang/ArrayIndexOutOfBoundsException",
            Self::NullPointerException => "java/lang/NullPointerException",
            Self::ClassCastException => "java/lang/ClassCastException",
            Self::NumberFormatException => "java/lang/NumberFormatException",
        }
    }

    pub fn class_name_dot(self) -> String {
        self.class_name().replace('/', ".")
    }
}

#[derive(Debug, Clone)]
pub struct JavaException {
    pub kind: JavaExceptionKind,
    pub message: Option<String>,
}

impl JavaException {
    pub fn new(kind: JavaExceptionKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }

    pub fn with_message(kind: JavaExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into()),
        }
    }
}

/// Builds a [`JavaException`] from a kind identifier and an optional message.
#[macro_export]
macro_rules! build_exception {
    ($kind:ident) => {
        $crate::error::JavaException::new($crate::error::JavaExceptionKind::$kind)
    };
    ($kind:ident, $msg:expr) => {
        $crate::error::JavaException::with_message($crate::error::JavaExceptionKind::$kind, $msg)
    };
}

/// Expands to an `Err(VmError::JavaException(..))` expression so handlers can
/// raise catchable exceptions with `throw_exception!(Kind)?` or as a match arm.
#[macro_export]
macro_rules! throw_exception {
    ($kind:ident) => {
        Err($crate::error::VmError::JavaException(
            $crate::build_exception!($kind),
        ))
    };
    ($kind:ident, $msg:expr) => {
        Err($crate::error::VmError::JavaException(
            $crate::build_exception!($kind, $msg),
        ))
    };
}
