//! Host-side implementations of the `java/lang/*` classes Smali programs
//! lean on. The registry maps a demangled class name to its constructor and
//! method table; the interpreter consults it before falling back to user
//! classes when resolving `invoke-*` and `new-instance`.

use crate::error::VmError;
use crate::heap::{Heap, HeapRef, Object};
use crate::throw_exception;
use crate::vm::Value;
use std::collections::HashMap;

mod java_lang;
mod java_lang_reflect;

/// A builtin method: receives the receiver (for instance methods) and the
/// argument values, returns the value to place in the return slot, if any.
pub type BuiltinMethodFn =
    fn(&mut Heap, Option<Value>, &[Value]) -> Result<Option<Value>, VmError>;

/// Backs the `new-instance` opcode; receives the demangled class name so one
/// implementation can serve a family of classes.
pub type NewInstanceFn = fn(&mut Heap, &str) -> Result<Value, VmError>;

pub struct BuiltinClass {
    new_instance: Option<NewInstanceFn>,
    methods: HashMap<&'static str, BuiltinMethodFn>,
}

impl BuiltinClass {
    pub fn new() -> Self {
        BuiltinClass {
            new_instance: None,
            methods: HashMap::new(),
        }
    }

    pub fn with_constructor(new_instance: NewInstanceFn) -> Self {
        BuiltinClass {
            new_instance: Some(new_instance),
            methods: HashMap::new(),
        }
    }

    pub fn method(mut self, name: &'static str, f: BuiltinMethodFn) -> Self {
        self.methods.insert(name, f);
        self
    }
}

impl Default for BuiltinClass {
    fn default() -> Self {
        BuiltinClass::new()
    }
}

pub struct BuiltinRegistry {
    classes: HashMap<String, BuiltinClass>,
}

impl BuiltinRegistry {
    /// Registry preloaded with the standard `java.lang` surface.
    pub fn with_default_classes() -> Self {
        let mut registry = BuiltinRegistry {
            classes: HashMap::new(),
        };
        java_lang::do_register_java_lang_builtins(&mut registry);
        java_lang_reflect::do_register_java_lang_reflect_builtins(&mut registry);
        registry
    }

    pub fn register(&mut self, class_name: impl Into<String>, class: BuiltinClass) {
        self.classes.insert(class_name.into(), class);
    }

    pub fn contains_class(&self, class_name: &str) -> bool {
        self.classes.contains_key(class_name)
    }

    pub fn new_instance(&self, heap: &mut Heap, class_name: &str) -> Result<Value, VmError> {
        let class = self
            .classes
            .get(class_name)
            .ok_or_else(|| VmError::UnknownClass(class_name.to_string()))?;
        let constructor =
            class
                .new_instance
                .ok_or_else(|| VmError::UnsupportedBuiltinMethod {
                    class: class_name.to_string(),
                    method: "new-instance".to_string(),
                })?;
        constructor(heap, class_name)
    }

    pub fn invoke(
        &self,
        heap: &mut Heap,
        class_name: &str,
        method_name: &str,
        this: Option<Value>,
        args: &[Value],
    ) -> Result<Option<Value>, VmError> {
        let class = self
            .classes
            .get(class_name)
            .ok_or_else(|| VmError::UnknownClass(class_name.to_string()))?;
        let method =
            class
                .methods
                .get(method_name)
                .ok_or_else(|| VmError::UnsupportedBuiltinMethod {
                    class: class_name.to_string(),
                    method: method_name.to_string(),
                })?;
        method(heap, this, args)
    }
}

pub(crate) fn expect_this(this: Option<Value>) -> Result<HeapRef, VmError> {
    match this {
        Some(value) => value.as_obj_ref(),
        None => throw_exception!(NullPointerException, "missing receiver"),
    }
}

/// Text content of a string-like heap object; null-safe on the caller side
/// only (a null reference raises NullPointerException).
pub(crate) fn string_text(heap: &Heap, value: Value) -> Result<String, VmError> {
    let heap_ref = value.as_obj_ref()?;
    Ok(String::from_utf8_lossy(heap.string_bytes(heap_ref)?).into_owned())
}

pub(crate) fn byte_array_contents(heap: &Heap, value: Value) -> Result<Vec<u8>, VmError> {
    let heap_ref = value.as_obj_ref()?;
    match heap.get(heap_ref)? {
        Object::Array { values, .. } => values
            .iter()
            .map(|v| v.as_int().map(|i| i as u8))
            .collect(),
        _ => throw_exception!(ClassCastException, "not a byte array"),
    }
}
