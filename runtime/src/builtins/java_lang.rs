use super::{byte_array_contents, expect_this, string_text, BuiltinClass, BuiltinRegistry};
use crate::error::VmError;
use crate::heap::{Heap, Object};
use crate::throw_exception;
use crate::vm::Value;

pub(super) fn do_register_java_lang_builtins(registry: &mut BuiltinRegistry) {
    registry.register(
        "java.lang.String",
        BuiltinClass::with_constructor(string_new_instance)
            .method("<init>", string_init)
            .method("charAt", string_char_at)
            .method("length", string_length)
            .method("equals", string_equals)
            .method("getBytes", string_get_bytes)
            .method("valueOf", string_value_of)
            .method("toString", string_to_string),
    );

    registry.register(
        "java.lang.StringBuilder",
        BuiltinClass::with_constructor(builder_new_instance)
            .method("<init>", builder_init)
            .method("append", builder_append)
            .method("toString", builder_to_string)
            .method("length", builder_length),
    );

    registry.register(
        "java.lang.Integer",
        BuiltinClass::new()
            .method("valueOf", integer_value_of)
            .method("intValue", box_unbox)
            .method("parseInt", integer_parse_int),
    );
    registry.register(
        "java.lang.Long",
        BuiltinClass::new()
            .method("valueOf", long_value_of)
            .method("longValue", box_unbox)
            .method("parseLong", long_parse_long),
    );
    registry.register(
        "java.lang.Double",
        BuiltinClass::new()
            .method("valueOf", double_value_of)
            .method("doubleValue", box_unbox)
            .method("parseDouble", double_parse_double),
    );
    registry.register(
        "java.lang.Float",
        BuiltinClass::new()
            .method("valueOf", float_value_of)
            .method("floatValue", box_unbox),
    );
    registry.register(
        "java.lang.Boolean",
        BuiltinClass::new()
            .method("valueOf", boolean_value_of)
            .method("booleanValue", box_unbox)
            .method("parseBoolean", boolean_parse_boolean),
    );
    registry.register(
        "java.lang.Character",
        BuiltinClass::new()
            .method("valueOf", character_value_of)
            .method("charValue", box_unbox),
    );

    for throwable in [
        "java.lang.Throwable",
        "java.lang.Exception",
        "java.lang.RuntimeException",
        "java.lang.NullPointerException",
        "java.lang.ArithmeticException",
        "java.lang.ArrayIndexOutOfBoundsException",
        "java.lang.ClassCastException",
        "java.lang.NumberFormatException",
        "java.lang.IllegalArgumentException",
        "java.lang.IllegalStateException",
    ] {
        registry.register(
            throwable,
            BuiltinClass::with_constructor(throwable_new_instance)
                .method("<init>", throwable_init)
                .method("getMessage", throwable_get_message),
        );
    }
}

fn string_new_instance(heap: &mut Heap, _class_name: &str) -> Result<Value, VmError> {
    Ok(Value::Ref(heap.alloc_string(Vec::new(), None)))
}

/// `<init>([B)` and `<init>([BLjava/lang/String;)`: fill the receiver from a
/// byte array, optionally remembering the charset name.
fn string_init(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let content = byte_array_contents(heap, *args.first().unwrap_or(&Value::Null))?;
    let charset = match args.get(1) {
        Some(value) => Some(string_text(heap, *value)?),
        None => None,
    };
    match heap.get_mut(this_ref)? {
        Object::Str { bytes, encoding } => {
            *bytes = content;
            *encoding = charset;
            Ok(None)
        }
        _ => throw_exception!(ClassCastException, "receiver is not a String"),
    }
}

fn string_char_at(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let index = args.first().unwrap_or(&Value::Null).as_int()?;
    let bytes = heap.string_bytes(this_ref)?;
    if index < 0 || index as usize >= bytes.len() {
        return throw_exception!(
            ArrayIndexOutOfBoundsException,
            format!("length={}; index={}", bytes.len(), index)
        );
    }
    Ok(Some(Value::Char(bytes[index as usize] as u16)))
}

fn string_length(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let length = heap.string_bytes(this_ref)?.len();
    Ok(Some(Value::Integer(length as i32)))
}

/// Content equality, as opposed to the reference identity `if-eq` tests.
fn string_equals(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let other = match args.first().unwrap_or(&Value::Null).as_nullable_obj_ref()? {
        Some(heap_ref) => heap_ref,
        None => return Ok(Some(Value::Boolean(false))),
    };
    let equal = match (heap.get(this_ref)?, heap.get(other)?) {
        (Object::Str { bytes: a, .. }, Object::Str { bytes: b, .. }) => a == b,
        _ => false,
    };
    Ok(Some(Value::Boolean(equal)))
}

fn string_get_bytes(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let values: Vec<Value> = heap
        .string_bytes(this_ref)?
        .iter()
        .map(|b| Value::Integer(*b as i8 as i32))
        .collect();
    Ok(Some(Value::Ref(heap.alloc_array("B".to_string(), values))))
}

fn string_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let text = heap.render_value(*args.first().unwrap_or(&Value::Null))?;
    Ok(Some(Value::Ref(heap.alloc_str(&text))))
}

fn string_to_string(
    _heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    Ok(Some(Value::Ref(expect_this(this)?)))
}

fn builder_new_instance(heap: &mut Heap, _class_name: &str) -> Result<Value, VmError> {
    Ok(Value::Ref(heap.alloc_builder()))
}

fn builder_init(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let seed = match args.first() {
        Some(value) => string_text(heap, *value)?.into_bytes(),
        None => Vec::new(),
    };
    match heap.get_mut(this_ref)? {
        Object::Builder { buffer } => {
            *buffer = seed;
            Ok(None)
        }
        _ => throw_exception!(ClassCastException, "receiver is not a StringBuilder"),
    }
}

/// `append` accepts any value and converts it to text per Dalvik rules.
/// Returns the receiver so chained appends work through `move-result-object`.
fn builder_append(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let text = heap.render_value(*args.first().unwrap_or(&Value::Null))?;
    match heap.get_mut(this_ref)? {
        Object::Builder { buffer } => {
            buffer.extend_from_slice(text.as_bytes());
            Ok(Some(Value::Ref(this_ref)))
        }
        _ => throw_exception!(ClassCastException, "receiver is not a StringBuilder"),
    }
}

fn builder_to_string(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let bytes = heap.string_bytes(this_ref)?.to_vec();
    Ok(Some(Value::Ref(heap.alloc_string(bytes, None))))
}

fn builder_length(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    let length = heap.string_bytes(this_ref)?.len();
    Ok(Some(Value::Integer(length as i32)))
}

fn box_of(heap: &mut Heap, class_name: &str, args: &[Value]) -> Result<Option<Value>, VmError> {
    let value = *args.first().unwrap_or(&Value::Null);
    Ok(Some(Value::Ref(heap.alloc(Object::Box {
        class_name: class_name.to_string(),
        value,
    }))))
}

fn integer_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Integer", args)
}

fn long_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Long", args)
}

fn double_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Double", args)
}

fn float_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Float", args)
}

fn boolean_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Boolean", args)
}

fn character_value_of(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    box_of(heap, "java.lang.Character", args)
}

/// `intValue()` and friends: return the boxed primitive as stored.
fn box_unbox(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    match heap.get(this_ref)? {
        Object::Box { value, .. } => Ok(Some(*value)),
        _ => throw_exception!(ClassCastException, "receiver is not a box"),
    }
}

fn parse_radix(args: &[Value]) -> Result<u32, VmError> {
    match args.get(1) {
        Some(value) => Ok(value.as_int()? as u32),
        None => Ok(10),
    }
}

fn integer_parse_int(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let text = string_text(heap, *args.first().unwrap_or(&Value::Null))?;
    let radix = parse_radix(args)?;
    match i32::from_str_radix(text.trim(), radix) {
        Ok(parsed) => Ok(Some(Value::Integer(parsed))),
        Err(_) => throw_exception!(
            NumberFormatException,
            format!("For input string: \"{}\"", text)
        ),
    }
}

fn long_parse_long(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let text = string_text(heap, *args.first().unwrap_or(&Value::Null))?;
    let radix = parse_radix(args)?;
    match i64::from_str_radix(text.trim(), radix) {
        Ok(parsed) => Ok(Some(Value::Long(parsed))),
        Err(_) => throw_exception!(
            NumberFormatException,
            format!("For input string: \"{}\"", text)
        ),
    }
}

fn double_parse_double(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let text = string_text(heap, *args.first().unwrap_or(&Value::Null))?;
    match text.trim().parse::<f64>() {
        Ok(parsed) => Ok(Some(Value::Double(parsed))),
        Err(_) => throw_exception!(
            NumberFormatException,
            format!("For input string: \"{}\"", text)
        ),
    }
}

fn boolean_parse_boolean(
    heap: &mut Heap,
    _this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let text = string_text(heap, *args.first().unwrap_or(&Value::Null))?;
    Ok(Some(Value::Boolean(text.eq_ignore_ascii_case("true"))))
}

fn throwable_new_instance(heap: &mut Heap, class_name: &str) -> Result<Value, VmError> {
    Ok(Value::Ref(heap.alloc_throwable(class_name.to_string(), None)))
}

fn throwable_init(
    heap: &mut Heap,
    this: Option<Value>,
    args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    if let Some(message) = args.first() {
        heap.set_instance_field(this_ref, "message", *message)?;
    }
    Ok(None)
}

fn throwable_get_message(
    heap: &mut Heap,
    this: Option<Value>,
    _args: &[Value],
) -> Result<Option<Value>, VmError> {
    let this_ref = expect_this(this)?;
    Ok(Some(heap.instance_field(this_ref, "message")?))
}
