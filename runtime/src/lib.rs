//! Register-based virtual machine for Dalvik-style Smali assembly listings.
//!
//! A [`ClassLoader`] parses disassembled `.smali` classes, an [`Emulator`]
//! resolves a named method and executes it against caller-supplied argument
//! bindings. The emulator owns the heap, the builtin `java.lang` surface and
//! the static-field store; the latter lives as long as the loader, so a
//! `<clinit>` call followed by a method call observes the initialized
//! statics.

use crate::heap::Object;
use crate::interpreter::Interpreter;
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

pub mod builtins;
pub mod class_loader;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod parser;
pub mod preprocessor;
pub mod rt;
pub mod source;
pub mod vm;

pub use crate::builtins::BuiltinRegistry;
pub use crate::class_loader::ClassLoader;
pub use crate::error::{JavaException, JavaExceptionKind, VmError};
pub use crate::heap::{Heap, HeapRef};
pub use crate::source::Source;
pub use crate::vm::{Frame, Value};

/// Per-instruction tracing, compiled out unless the `log-runtime-traces`
/// feature is enabled.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log-runtime-traces")]
        {
            tracing_log::log::debug!($($arg)*);
        }
    }};
}

#[derive(Debug, Clone)]
pub struct VmConfig {
    /// Maximum `invoke-*` recursion depth before the run fails with
    /// [`VmError::StackOverflow`].
    pub frame_stack_size: usize,
    /// Optional cap on executed instructions across a whole `exec_method`
    /// call, child frames included.
    pub step_budget: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            frame_stack_size: 256,
            step_budget: None,
        }
    }
}

/// Statistics about one top-level run.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub preproc: Duration,
    pub execution: Duration,
    pub steps: u64,
}

impl Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "preprocessing time : {} ms", self.preproc.as_millis())?;
        writeln!(f, "execution time     : {} ms", self.execution.as_millis())?;
        writeln!(f, "execution steps    : {}", self.steps)
    }
}

/// A complete virtual machine: loaded classes, heap, builtins and the
/// process-wide static-field store.
pub struct Emulator {
    pub(crate) loader: ClassLoader,
    pub(crate) heap: Heap,
    pub(crate) statics: HashMap<(String, String), Value>,
    pub(crate) builtins: BuiltinRegistry,
    pub(crate) config: VmConfig,
    pub(crate) stats: Stats,
}

impl Emulator {
    pub fn new(loader: ClassLoader) -> Self {
        Self::with_config(loader, VmConfig::default())
    }

    pub fn with_config(loader: ClassLoader, config: VmConfig) -> Self {
        Emulator {
            loader,
            heap: Heap::new(),
            statics: HashMap::new(),
            builtins: BuiltinRegistry::with_default_classes(),
            config,
            stats: Stats::default(),
        }
    }

    /// Executes `class_name.method_name` with the given `"pN"` register
    /// bindings. Returns the method's value (null for void) or the error;
    /// an unhandled Java exception surfaces as
    /// [`VmError::UncaughtException`].
    pub fn exec_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        args: HashMap<String, Value>,
    ) -> Result<Value, VmError> {
        let source = {
            let class = self
                .loader
                .get(class_name)
                .ok_or_else(|| VmError::UnknownClass(class_name.to_string()))?;
            let (_, method) = class.resolve_method(method_name, Some(args.len()))?;
            method.source.clone()
        };
        self.run_top(&source, args)
    }

    /// Scripting entry point: runs a bare method listing without loading a
    /// class around it.
    pub fn exec_source(
        &mut self,
        source: &Source,
        args: HashMap<String, Value>,
    ) -> Result<Value, VmError> {
        self.run_top(source, args)
    }

    fn run_top(
        &mut self,
        source: &Source,
        args: HashMap<String, Value>,
    ) -> Result<Value, VmError> {
        self.stats = Stats::default();
        let outcome = Interpreter::run_method(self, source, args, 0)?;
        if let Some(exception_ref) = outcome.thrown {
            let class_name = self.heap.class_name(exception_ref)?;
            let message = match self.heap.instance_field(exception_ref, "message") {
                Ok(Value::Ref(text_ref)) => Some(
                    String::from_utf8_lossy(self.heap.string_bytes(text_ref)?).into_owned(),
                ),
                _ => None,
            };
            return Err(VmError::UncaughtException {
                class_name,
                message,
            });
        }
        Ok(outcome.return_v.unwrap_or(Value::Null))
    }

    pub fn loader(&self) -> &ClassLoader {
        &self.loader
    }

    /// Class additions between runs are permitted; during a run the loader
    /// is only read.
    pub fn loader_mut(&mut self) -> &mut ClassLoader {
        &mut self.loader
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Allocates a string object, e.g. for seeding argument registers.
    pub fn new_string(&mut self, text: &str) -> Value {
        Value::Ref(self.heap.alloc_str(text))
    }

    pub fn static_field(&self, class_name: &str, field_name: &str) -> Option<Value> {
        self.statics
            .get(&(class_name.to_string(), field_name.to_string()))
            .copied()
    }

    /// Text rendering of a value, following the same rules as
    /// `String.valueOf`.
    pub fn render(&self, value: Value) -> Result<String, VmError> {
        self.heap.render_value(value)
    }

    /// Byte content of a string or byte-array result.
    pub fn value_bytes(&self, value: Value) -> Result<Vec<u8>, VmError> {
        match value {
            Value::Ref(heap_ref) => match self.heap.get(heap_ref)? {
                Object::Str { bytes, .. } => Ok(bytes.clone()),
                Object::Builder { buffer } => Ok(buffer.clone()),
                Object::Array { values, .. } => values
                    .iter()
                    .map(|v| v.as_int().map(|i| i as u8))
                    .collect(),
                _ => crate::throw_exception!(ClassCastException, "value has no byte content"),
            },
            _ => crate::throw_exception!(ClassCastException, "value has no byte content"),
        }
    }
}
