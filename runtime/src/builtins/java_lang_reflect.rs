use super::{BuiltinClass, BuiltinRegistry};
use crate::error::VmError;
use crate::heap::{Heap, Object};
use crate::throw_exception;
use crate::vm::Value;

pub(super) fn do_register_java_lang_reflect_builtins(registry: &mut BuiltinRegistry) {
    registry.register(
        "java.lang.reflect.Array",
        BuiltinClass::new().method("newInstance", array_new_instance),
    );
}

/// `Array.newInstance(componentType, length)`: builds a default-initialized
/// array of the class-token's component type.
fn array_new_instance(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let class_ref = args.first().unwrap_or(&Value::Null).as_obj_ref()?;
    let elem_type = match heap.get(class_ref)? {
        Object::Class { name } => name.clone(),
        _ => return throw_exception!(ClassCastException, "not a class token"),
    };
    let length = args.get(1).unwrap_or(&Value::Null).as_int()?;
    if length < 0 {
        return throw_exception!(
            ArrayIndexOutOfBoundsException,
            format!("negative array length {}", length)
        );
    }
    let default = default_element(&elem_type);
    let values = vec![default; length as usize];
    Ok(Some(Value::Ref(heap.alloc_array(elem_type, values))))
}

fn default_element(elem_type: &str) -> Value {
    match elem_type {
        "Z" | "boolean" => Value::Boolean(false),
        "C" | "char" => Value::Char(0),
        "J" | "long" => Value::Long(0),
        "F" | "float" => Value::Float(0.0),
        "D" | "double" => Value::Double(0.0),
        "B" | "S" | "I" | "byte" | "short" | "int" => Value::Integer(0),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_initialized_arrays() {
        let registry = BuiltinRegistry::with_default_classes();
        let mut heap = Heap::new();
        let token = heap.alloc(Object::Class {
            name: "java.lang.String".to_string(),
        });
        let array = registry
            .invoke(
                &mut heap,
                "java.lang.reflect.Array",
                "newInstance",
                None,
                &[Value::Ref(token), Value::Integer(3)],
            )
            .unwrap()
            .unwrap();
        let array_ref = array.as_obj_ref().unwrap();
        assert_eq!(heap.array_length(array_ref).unwrap(), 3);
        assert_eq!(heap.array_get(array_ref, 0).unwrap(), Value::Null);
    }
}
