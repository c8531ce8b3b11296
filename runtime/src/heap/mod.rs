use crate::error::VmError;
use crate::throw_exception;
use crate::vm::Value;
use std::collections::HashMap;

pub type HeapRef = usize;

/// Runtime representation of a Java-side object. Registers only ever hold a
/// [`HeapRef`] to one of these; the arena itself is owned by the emulator and
/// torn down with the loader, which also takes care of reference cycles.
#[derive(Debug, Clone)]
pub enum Object {
    /// `java.lang.String`: byte content plus the optional charset name it was
    /// constructed with.
    Str {
        bytes: Vec<u8>,
        encoding: Option<String>,
    },
    /// `java.lang.StringBuilder`: a mutable byte buffer.
    Builder { buffer: Vec<u8> },
    Array {
        elem_type: String,
        values: Vec<Value>,
    },
    /// An instance of a user Smali class, or of a built-in throwable.
    Instance {
        class_name: String,
        fields: HashMap<String, Value>,
    },
    /// Primitive box (`java.lang.Integer` and friends).
    Box {
        class_name: String,
        value: Value,
    },
    /// `java.lang.Class` token produced by `const-class`.
    Class { name: String },
}

#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn alloc(&mut self, object: Object) -> HeapRef {
        self.objects.push(object);
        self.objects.len() - 1
    }

    pub fn get(&self, heap_ref: HeapRef) -> Result<&Object, VmError> {
        self.objects
            .get(heap_ref)
            .ok_or(VmError::WrongHeapAddress(heap_ref))
    }

    pub fn get_mut(&mut self, heap_ref: HeapRef) -> Result<&mut Object, VmError> {
        self.objects
            .get_mut(heap_ref)
            .ok_or(VmError::WrongHeapAddress(heap_ref))
    }

    pub fn alloc_string(&mut self, bytes: Vec<u8>, encoding: Option<String>) -> HeapRef {
        self.alloc(Object::Str { bytes, encoding })
    }

    pub fn alloc_str(&mut self, text: &str) -> HeapRef {
        self.alloc_string(text.as_bytes().to_vec(), None)
    }

    pub fn alloc_builder(&mut self) -> HeapRef {
        self.alloc(Object::Builder { buffer: Vec::new() })
    }

    pub fn alloc_array(&mut self, elem_type: String, values: Vec<Value>) -> HeapRef {
        self.alloc(Object::Array { elem_type, values })
    }

    pub fn alloc_instance(&mut self, class_name: String, fields: HashMap<String, Value>) -> HeapRef {
        self.alloc(Object::Instance { class_name, fields })
    }

    /// Builds an exception instance with its `message` field populated, the
    /// shape `throw`/`move-exception` and `getMessage()` operate on.
    pub fn alloc_throwable(&mut self, class_name: String, message: Option<&str>) -> HeapRef {
        let message_v = match message {
            Some(text) => Value::Ref(self.alloc_str(text)),
            None => Value::Null,
        };
        let mut fields = HashMap::new();
        fields.insert("message".to_string(), message_v);
        self.alloc_instance(class_name, fields)
    }

    /// Demangled Java class name of the object, as used for catch-handler
    /// matching and text conversion.
    pub fn class_name(&self, heap_ref: HeapRef) -> Result<String, VmError> {
        Ok(match self.get(heap_ref)? {
            Object::Str { .. } => "java.lang.String".to_string(),
            Object::Builder { .. } => "java.lang.StringBuilder".to_string(),
            Object::Array { elem_type, .. } => format!("{}[]", elem_type),
            Object::Instance { class_name, .. } => class_name.clone(),
            Object::Box { class_name, .. } => class_name.clone(),
            Object::Class { .. } => "java.lang.Class".to_string(),
        })
    }

    pub fn string_bytes(&self, heap_ref: HeapRef) -> Result<&[u8], VmError> {
        match self.get(heap_ref)? {
            Object::Str { bytes, .. } => Ok(bytes),
            Object::Builder { buffer } => Ok(buffer),
            other => throw_exception!(
                ClassCastException,
                format!("{} is not a string", object_kind(other))
            ),
        }
    }

    pub fn array_length(&self, heap_ref: HeapRef) -> Result<i32, VmError> {
        match self.get(heap_ref)? {
            Object::Array { values, .. } => Ok(values.len() as i32),
            other => throw_exception!(
                ClassCastException,
                format!("{} is not an array", object_kind(other))
            ),
        }
    }

    pub fn array_get(&self, heap_ref: HeapRef, index: i32) -> Result<Value, VmError> {
        match self.get(heap_ref)? {
            Object::Array { values, .. } => {
                if index < 0 || index as usize >= values.len() {
                    return throw_exception!(
                        ArrayIndexOutOfBoundsException,
                        format!("length={}; index={}", values.len(), index)
                    );
                }
                Ok(values[index as usize])
            }
            other => throw_exception!(
                ClassCastException,
                format!("{} is not an array", object_kind(other))
            ),
        }
    }

    pub fn array_set(&mut self, heap_ref: HeapRef, index: i32, value: Value) -> Result<(), VmError> {
        match self.get_mut(heap_ref)? {
            Object::Array { values, .. } => {
                if index < 0 || index as usize >= values.len() {
                    return throw_exception!(
                        ArrayIndexOutOfBoundsException,
                        format!("length={}; index={}", values.len(), index)
                    );
                }
                values[index as usize] = value;
                Ok(())
            }
            other => throw_exception!(
                ClassCastException,
                format!("{} is not an array", object_kind(other))
            ),
        }
    }

    pub fn instance_field(&self, heap_ref: HeapRef, name: &str) -> Result<Value, VmError> {
        match self.get(heap_ref)? {
            Object::Instance { fields, .. } => Ok(fields.get(name).copied().unwrap_or(Value::Null)),
            other => throw_exception!(
                ClassCastException,
                format!("{} has no instance fields", object_kind(other))
            ),
        }
    }

    pub fn set_instance_field(
        &mut self,
        heap_ref: HeapRef,
        name: &str,
        value: Value,
    ) -> Result<(), VmError> {
        match self.get_mut(heap_ref)? {
            Object::Instance { fields, .. } => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
            other => throw_exception!(
                ClassCastException,
                format!("{} has no instance fields", object_kind(other))
            ),
        }
    }

    /// Text conversion following Dalvik's `String.valueOf`/`append` rules:
    /// primitives to decimal text, objects via their string content or a
    /// `Class@ref` tag, `null` for null references.
    pub fn render_value(&self, value: Value) -> Result<String, VmError> {
        Ok(match value {
            Value::Integer(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Float(v) => java_float_text(v as f64),
            Value::Double(v) => java_float_text(v),
            Value::Boolean(v) => v.to_string(),
            Value::Char(v) => char::from_u32(v as u32).unwrap_or('\u{fffd}').to_string(),
            Value::Null => "null".to_string(),
            Value::Ref(heap_ref) => match self.get(heap_ref)? {
                Object::Str { bytes, .. } => String::from_utf8_lossy(bytes).into_owned(),
                Object::Builder { buffer } => String::from_utf8_lossy(buffer).into_owned(),
                Object::Box { value, .. } => self.render_value(*value)?,
                Object::Class { name } => format!("class {}", name),
                Object::Instance { class_name, .. } => format!("{}@{:x}", class_name, heap_ref),
                Object::Array { elem_type, .. } => format!("{}[]@{:x}", elem_type, heap_ref),
            },
        })
    }
}

fn object_kind(object: &Object) -> &'static str {
    match object {
        Object::Str { .. } => "Str",
        Object::Builder { .. } => "Builder",
        Object::Array { .. } => "Array",
        Object::Instance { .. } => "Instance",
        Object::Box { .. } => "Box",
        Object::Class { .. } => "Class",
    }
}

/// Java prints whole floats with a trailing `.0`; Rust does not.
fn java_float_text(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let text = v.to_string();
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text
    } else {
        format!("{}.0", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_bounds_raise_java_exception() {
        let mut heap = Heap::new();
        let array = heap.alloc_array("I".to_string(), vec![Value::Integer(7)]);
        assert_eq!(heap.array_get(array, 0).unwrap(), Value::Integer(7));
        assert!(matches!(
            heap.array_get(array, 1),
            Err(VmError::JavaException(e))
                if e.kind == crate::error::JavaExceptionKind::ArrayIndexOutOfBoundsException
        ));
        assert!(matches!(
            heap.array_get(array, -1),
            Err(VmError::JavaException(_))
        ));
    }

    #[test]
    fn render_follows_java_text_rules() {
        let mut heap = Heap::new();
        assert_eq!(heap.render_value(Value::Integer(-3)).unwrap(), "-3");
        assert_eq!(heap.render_value(Value::Double(1.0)).unwrap(), "1.0");
        assert_eq!(heap.render_value(Value::Null).unwrap(), "null");
        let s = heap.alloc_str("MK");
        assert_eq!(heap.render_value(Value::Ref(s)).unwrap(), "MK");
    }

    #[test]
    fn throwable_carries_message() {
        let mut heap = Heap::new();
        let ex = heap.alloc_throwable("java.lang.NullPointerException".to_string(), Some("boom"));
        assert_eq!(heap.class_name(ex).unwrap(), "java.lang.NullPointerException");
        let message = heap.instance_field(ex, "message").unwrap();
        let Value::Ref(text) = message else {
            panic!("message should be a string ref");
        };
        assert_eq!(heap.string_bytes(text).unwrap(), b"boom");
    }
}
