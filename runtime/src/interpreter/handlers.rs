use crate::error::VmError;
use crate::heap::Object;
use crate::interpreter::{malformed, Exec};
use crate::parser::{extract_class_name, parse_int_literal};
use crate::throw_exception;
use crate::vm::{compare_values, Frame, Value};
use crate::Emulator;
use byteorder::{ByteOrder, LittleEndian};
use std::cmp::Ordering;
use std::collections::HashMap;

fn split_operands(rest: &str) -> Vec<&str> {
    rest.split(',')
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Exactly-N comma-separated operands, or `MalformedOperand`.
fn operands<'a, const N: usize>(op: &str, rest: &'a str) -> Result<[&'a str; N], VmError> {
    split_operands(rest)
        .try_into()
        .map_err(|_| malformed(op, rest))
}

fn is_register(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some('v') | Some('p'))
        && !token[1..].is_empty()
        && token[1..].chars().all(|c| c.is_ascii_digit())
}

/// Third operands of the arithmetic families are either a register or an
/// immediate (`/lit8`, `/lit16`); both parse through here.
fn int_operand(frame: &Frame, token: &str) -> Result<i32, VmError> {
    if is_register(token) {
        frame.get_register(token).as_int()
    } else {
        Ok(parse_int_literal(token)? as i32)
    }
}

fn long_operand(frame: &Frame, token: &str) -> Result<i64, VmError> {
    if is_register(token) {
        frame.get_register(token).as_long()
    } else {
        parse_int_literal(token)
    }
}

fn ordering_value(ordering: Ordering) -> Value {
    Value::Integer(match ordering {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

fn field_reference(op: &str, token: &str) -> Result<(String, String), VmError> {
    let (class_descriptor, field_part) =
        token.split_once("->").ok_or_else(|| malformed(op, token))?;
    let class_name = extract_class_name(class_descriptor)?;
    let (field_name, _) = field_part
        .split_once(':')
        .ok_or_else(|| malformed(op, token))?;
    Ok((class_name, field_name.to_string()))
}

fn unescape_string(op: &str, text: &str) -> Result<String, VmError> {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some('\\') => result.push('\\'),
            Some('\'') => result.push('\''),
            Some('"') => result.push('"'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let code =
                    u32::from_str_radix(&digits, 16).map_err(|_| malformed(op, text))?;
                result.push(char::from_u32(code).ok_or_else(|| malformed(op, text))?);
            }
            _ => return Err(malformed(op, text)),
        }
    }
    Ok(result)
}

// TODO: stub until an inheritance model exists; the cast itself never fails.
#[inline]
pub(super) fn handle_check_cast(_frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let operands = split_operands(rest);
    if operands.len() != 2 {
        return Err(malformed(op, rest));
    }
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_move(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, src] = operands(op, rest)?;
    let value = frame.get_register(src);
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

/// Copies the pending return value into the register and clears the slot.
#[inline]
pub(super) fn handle_move_result(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst] = operands(op, rest)?;
    let value = frame.return_v.take().unwrap_or(Value::Null);
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

/// Copies the in-flight exception into the register and clears it.
#[inline]
pub(super) fn handle_move_exception(
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst] = operands(op, rest)?;
    let value = frame.thrown.take().map(Value::Ref).unwrap_or(Value::Null);
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_const(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, literal] = operands(op, rest)?;
    frame.set_register(dst, Value::Integer(parse_int_literal(literal)? as i32));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_const_wide(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, literal] = operands(op, rest)?;
    frame.set_register(dst, Value::Long(parse_int_literal(literal)?));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_const_string(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let (dst, tail) = rest.split_once(',').ok_or_else(|| malformed(op, rest))?;
    let tail = tail.trim();
    let quoted = tail
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| malformed(op, rest))?;
    let text = unescape_string(op, quoted)?;
    let heap_ref = emu.heap.alloc_string(text.into_bytes(), None);
    frame.set_register(dst.trim(), Value::Ref(heap_ref));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_const_class(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, descriptor] = operands(op, rest)?;
    // primitive and array descriptors keep their raw spelling
    let name = extract_class_name(descriptor).unwrap_or_else(|_| descriptor.to_string());
    let heap_ref = emu.heap.alloc(Object::Class { name });
    frame.set_register(dst, Value::Ref(heap_ref));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_return_void(frame: &mut Frame) -> Result<Exec, VmError> {
    frame.return_v = None;
    frame.stop = true;
    Ok(Exec::Stopped)
}

#[inline]
pub(super) fn handle_return(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [src] = operands(op, rest)?;
    frame.return_v = Some(frame.get_register(src));
    frame.stop = true;
    Ok(Exec::Returned)
}

#[inline]
pub(super) fn handle_goto(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [label] = operands(op, rest)?;
    frame.pc = frame.label(label)?;
    Ok(Exec::Jumped)
}

fn branch_taken(op_suffix: &str, ordering: Option<Ordering>) -> Result<bool, VmError> {
    Ok(match op_suffix {
        "eq" => ordering == Some(Ordering::Equal),
        "ne" => ordering != Some(Ordering::Equal),
        "lt" => ordering == Some(Ordering::Less),
        "le" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        "gt" => ordering == Some(Ordering::Greater),
        "ge" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        other => return Err(malformed(other, "")),
    })
}

#[inline]
pub(super) fn handle_if(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [a, b, label] = operands(op, rest)?;
    let ordering = compare_values(frame.get_register(a), frame.get_register(b));
    if branch_taken(&op["if-".len()..], ordering)? {
        frame.pc = frame.label(label)?;
        return Ok(Exec::Jumped);
    }
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_ifz(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [src, label] = operands(op, rest)?;
    let value = frame.get_register(src);
    let suffix = &op["if-".len()..op.len() - 1];
    let taken = match suffix {
        // null counts as zero, a live reference never does
        "eq" => value.is_zero(),
        "ne" => !value.is_zero(),
        _ => branch_taken(suffix, compare_values(value, Value::Integer(0)))?,
    };
    if taken {
        frame.pc = frame.label(label)?;
        return Ok(Exec::Jumped);
    }
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_cmp_long(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, a, b] = operands(op, rest)?;
    let a = frame.get_register(a).as_long()?;
    let b = frame.get_register(b).as_long()?;
    frame.set_register(dst, ordering_value(a.cmp(&b)));
    Ok(Exec::Continue)
}

/// `cmpl-*` biases NaN toward less, `cmpg-*` toward greater.
#[inline]
pub(super) fn handle_cmp_float(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, a, b] = operands(op, rest)?;
    let a = frame.get_register(a).as_float()?;
    let b = frame.get_register(b).as_float()?;
    let result = match a.partial_cmp(&b) {
        Some(ordering) => ordering_value(ordering),
        None => Value::Integer(if op.starts_with("cmpl") { -1 } else { 1 }),
    };
    frame.set_register(dst, result);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_cmp_double(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, a, b] = operands(op, rest)?;
    let a = frame.get_register(a).as_double()?;
    let b = frame.get_register(b).as_double()?;
    let result = match a.partial_cmp(&b) {
        Some(ordering) => ordering_value(ordering),
        None => Value::Integer(if op.starts_with("cmpl") { -1 } else { 1 }),
    };
    frame.set_register(dst, result);
    Ok(Exec::Continue)
}

/// Operand shapes are `vA, vB, vC`, `vA, vB, #lit` (`/lit8`, `/lit16`) and
/// the two-operand `/2addr` form where the destination doubles as the first
/// input.
#[inline]
pub(super) fn handle_int_binop(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let operands = split_operands(rest);
    let (dst, a, b) = match operands[..] {
        [dst, a, b] => (dst, int_operand(frame, a)?, int_operand(frame, b)?),
        [dst, b] => (dst, frame.get_register(dst).as_int()?, int_operand(frame, b)?),
        _ => return Err(malformed(op, rest)),
    };
    let family = op.split('/').next().unwrap_or(op);
    let result = match family {
        "add-int" => a.wrapping_add(b),
        "sub-int" => a.wrapping_sub(b),
        "mul-int" => a.wrapping_mul(b),
        "div-int" => {
            if b == 0 {
                return throw_exception!(ArithmeticException, "divide by zero");
            }
            a.wrapping_div(b)
        }
        "rem-int" => {
            if b == 0 {
                return throw_exception!(ArithmeticException, "divide by zero");
            }
            a.wrapping_rem(b)
        }
        "and-int" => a & b,
        "or-int" => a | b,
        "xor-int" => a ^ b,
        "shl-int" => a.wrapping_shl(b as u32),
        "shr-int" => a.wrapping_shr(b as u32),
        "ushr-int" => ((a as u32).wrapping_shr(b as u32)) as i32,
        _ => return Err(malformed(op, rest)),
    };
    frame.set_register(dst, Value::Integer(result));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_long_binop(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let operands = split_operands(rest);
    let (dst, a, b) = match operands[..] {
        [dst, a, b] => (dst, long_operand(frame, a)?, long_operand(frame, b)?),
        [dst, b] => (dst, frame.get_register(dst).as_long()?, long_operand(frame, b)?),
        _ => return Err(malformed(op, rest)),
    };
    let family = op.split('/').next().unwrap_or(op);
    let result = match family {
        "add-long" => a.wrapping_add(b),
        "sub-long" => a.wrapping_sub(b),
        "mul-long" => a.wrapping_mul(b),
        "div-long" => {
            if b == 0 {
                return throw_exception!(ArithmeticException, "divide by zero");
            }
            a.wrapping_div(b)
        }
        "rem-long" => {
            if b == 0 {
                return throw_exception!(ArithmeticException, "divide by zero");
            }
            a.wrapping_rem(b)
        }
        "and-long" => a & b,
        "or-long" => a | b,
        "xor-long" => a ^ b,
        "shl-long" => a.wrapping_shl(b as u32),
        "shr-long" => a.wrapping_shr(b as u32),
        "ushr-long" => ((a as u64).wrapping_shr(b as u32)) as i64,
        _ => return Err(malformed(op, rest)),
    };
    frame.set_register(dst, Value::Long(result));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_float_binop(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let operands = split_operands(rest);
    let (dst, a, b) = match operands[..] {
        [dst, a, b] => (
            dst,
            frame.get_register(a).as_float()?,
            frame.get_register(b).as_float()?,
        ),
        [dst, b] => (
            dst,
            frame.get_register(dst).as_float()?,
            frame.get_register(b).as_float()?,
        ),
        _ => return Err(malformed(op, rest)),
    };
    let family = op.split('/').next().unwrap_or(op);
    let result = match family {
        "add-float" => a + b,
        "sub-float" => a - b,
        "mul-float" => a * b,
        "div-float" => a / b,
        "rem-float" => a % b,
        _ => return Err(malformed(op, rest)),
    };
    frame.set_register(dst, Value::Float(result));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_double_binop(
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let operands = split_operands(rest);
    let (dst, a, b) = match operands[..] {
        [dst, a, b] => (
            dst,
            frame.get_register(a).as_double()?,
            frame.get_register(b).as_double()?,
        ),
        [dst, b] => (
            dst,
            frame.get_register(dst).as_double()?,
            frame.get_register(b).as_double()?,
        ),
        _ => return Err(malformed(op, rest)),
    };
    let family = op.split('/').next().unwrap_or(op);
    let result = match family {
        "add-double" => a + b,
        "sub-double" => a - b,
        "mul-double" => a * b,
        "div-double" => a / b,
        "rem-double" => a % b,
        _ => return Err(malformed(op, rest)),
    };
    frame.set_register(dst, Value::Double(result));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_unop(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [dst, src] = operands(op, rest)?;
    let value = frame.get_register(src);
    let result = match op {
        "neg-int" => Value::Integer(value.as_int()?.wrapping_neg()),
        "not-int" => Value::Integer(!value.as_int()?),
        "neg-long" => Value::Long(value.as_long()?.wrapping_neg()),
        "not-long" => Value::Long(!value.as_long()?),
        "neg-float" => Value::Float(-value.as_float()?),
        "neg-double" => Value::Double(-value.as_double()?),
        "int-to-long" => Value::Long(value.as_int()? as i64),
        "int-to-float" => Value::Float(value.as_int()? as f32),
        "int-to-double" => Value::Double(value.as_int()? as f64),
        "int-to-byte" => Value::Integer(value.as_int()? as i8 as i32),
        "int-to-char" => Value::Char(value.as_int()? as u16),
        "int-to-short" => Value::Integer(value.as_int()? as i16 as i32),
        "long-to-int" => Value::Integer(value.as_long()? as i32),
        "long-to-float" => Value::Float(value.as_long()? as f32),
        "long-to-double" => Value::Double(value.as_long()? as f64),
        "float-to-int" => Value::Integer(value.as_float()? as i32),
        "float-to-long" => Value::Long(value.as_float()? as i64),
        "float-to-double" => Value::Double(value.as_float()? as f64),
        "double-to-int" => Value::Integer(value.as_double()? as i32),
        "double-to-long" => Value::Long(value.as_double()? as i64),
        "double-to-float" => Value::Float(value.as_double()? as f32),
        _ => return Err(malformed(op, rest)),
    };
    frame.set_register(dst, result);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_new_instance(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, descriptor] = operands(op, rest)?;
    let class_name = extract_class_name(descriptor)?;
    let value = if emu.builtins.contains_class(&class_name) {
        emu.builtins.new_instance(&mut emu.heap, &class_name)?
    } else if emu.loader.contains_class(&class_name) {
        Value::Ref(emu.heap.alloc_instance(class_name, HashMap::new()))
    } else {
        return Err(VmError::UnknownClass(class_name));
    };
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

fn default_array_element(elem_type: &str) -> Value {
    match elem_type.as_bytes().first() {
        Some(b'Z') => Value::Boolean(false),
        Some(b'C') => Value::Char(0),
        Some(b'J') => Value::Long(0),
        Some(b'F') => Value::Float(0.0),
        Some(b'D') => Value::Double(0.0),
        Some(b'L') | Some(b'[') => Value::Null,
        _ => Value::Integer(0),
    }
}

#[inline]
pub(super) fn handle_new_array(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, size, descriptor] = operands(op, rest)?;
    let elem_type = descriptor
        .strip_prefix('[')
        .ok_or_else(|| malformed(op, rest))?;
    let length = frame.get_register(size).as_int()?;
    if length < 0 {
        return throw_exception!(
            ArrayIndexOutOfBoundsException,
            format!("negative array size {}", length)
        );
    }
    let values = vec![default_array_element(elem_type); length as usize];
    let heap_ref = emu.heap.alloc_array(elem_type.to_string(), values);
    frame.set_register(dst, Value::Ref(heap_ref));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_array_length(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, array] = operands(op, rest)?;
    let array_ref = frame.get_register(array).as_obj_ref()?;
    let length = emu.heap.array_length(array_ref)?;
    frame.set_register(dst, Value::Integer(length));
    Ok(Exec::Continue)
}

/// Builds the array from the listed registers; the reference lands in the
/// return slot for the following `move-result-object`.
#[inline]
pub(super) fn handle_filled_new_array(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let body = rest.strip_prefix('{').ok_or_else(|| malformed(op, rest))?;
    let (registers, tail) = body.split_once('}').ok_or_else(|| malformed(op, rest))?;
    let descriptor = tail
        .trim_start()
        .strip_prefix(',')
        .ok_or_else(|| malformed(op, rest))?
        .trim();
    let elem_type = descriptor
        .strip_prefix('[')
        .ok_or_else(|| malformed(op, rest))?;

    let names = super::Interpreter::expand_register_list(registers, op)?;
    let values: Vec<Value> = names.iter().map(|name| frame.get_register(name)).collect();
    let heap_ref = emu.heap.alloc_array(elem_type.to_string(), values);
    frame.return_v = Some(Value::Ref(heap_ref));
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_fill_array_data(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [array, label] = operands(op, rest)?;
    let array_ref = frame.get_register(array).as_obj_ref()?;
    let table = frame
        .array_data
        .get(label)
        .ok_or_else(|| malformed(op, rest))?;

    let mut elements = Vec::new();
    for chunk in table.bytes.chunks_exact(table.element_width) {
        elements.push(match table.element_width {
            1 => Value::Integer(chunk[0] as i8 as i32),
            2 => Value::Integer(LittleEndian::read_i16(chunk) as i32),
            4 => Value::Integer(LittleEndian::read_i32(chunk)),
            8 => Value::Long(LittleEndian::read_i64(chunk)),
            _ => return Err(malformed(op, rest)),
        });
    }
    for (index, element) in elements.into_iter().enumerate() {
        emu.heap.array_set(array_ref, index as i32, element)?;
    }
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_aget(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, array, index] = operands(op, rest)?;
    let array_ref = frame.get_register(array).as_obj_ref()?;
    let index = frame.get_register(index).as_int()?;
    let value = emu.heap.array_get(array_ref, index)?;
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_aput(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [src, array, index] = operands(op, rest)?;
    let array_ref = frame.get_register(array).as_obj_ref()?;
    let index = frame.get_register(index).as_int()?;
    emu.heap
        .array_set(array_ref, index, frame.get_register(src))?;
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_iget(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, object, field] = operands(op, rest)?;
    let (_, field_name) = field_reference(op, field)?;
    let object_ref = frame.get_register(object).as_obj_ref()?;
    let value = emu.heap.instance_field(object_ref, &field_name)?;
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_iput(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [src, object, field] = operands(op, rest)?;
    let (_, field_name) = field_reference(op, field)?;
    let object_ref = frame.get_register(object).as_obj_ref()?;
    emu.heap
        .set_instance_field(object_ref, &field_name, frame.get_register(src))?;
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_sget(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [dst, field] = operands(op, rest)?;
    let key = field_reference(op, field)?;
    let value = emu.statics.get(&key).copied().unwrap_or(Value::Null);
    frame.set_register(dst, value);
    Ok(Exec::Continue)
}

#[inline]
pub(super) fn handle_sput(
    emu: &mut Emulator,
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [src, field] = operands(op, rest)?;
    let key = field_reference(op, field)?;
    emu.statics.insert(key, frame.get_register(src));
    Ok(Exec::Continue)
}

/// Jumps to `targets[value - first_key]`, falling through when out of range.
#[inline]
pub(super) fn handle_packed_switch(
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [src, label] = operands(op, rest)?;
    let value = frame.get_register(src).as_long()?;
    let target = {
        let table = frame
            .packed_switches
            .get(label)
            .ok_or_else(|| malformed(op, rest))?;
        let index = value - table.first_key;
        if index >= 0 && (index as usize) < table.targets.len() {
            Some(table.targets[index as usize].clone())
        } else {
            None
        }
    };
    match target {
        Some(target) => {
            frame.pc = frame.label(&target)?;
            Ok(Exec::Jumped)
        }
        None => Ok(Exec::Continue),
    }
}

#[inline]
pub(super) fn handle_sparse_switch(
    frame: &mut Frame,
    op: &str,
    rest: &str,
) -> Result<Exec, VmError> {
    let [src, label] = operands(op, rest)?;
    let value = frame.get_register(src).as_long()?;
    let target = {
        let table = frame
            .sparse_switches
            .get(label)
            .ok_or_else(|| malformed(op, rest))?;
        table
            .cases
            .iter()
            .find(|(key, _)| *key == value)
            .map(|(_, target)| target.clone())
    };
    match target {
        Some(target) => {
            frame.pc = frame.label(&target)?;
            Ok(Exec::Jumped)
        }
        None => Ok(Exec::Continue),
    }
}

/// Throwing a null reference raises NullPointerException instead.
#[inline]
pub(super) fn handle_throw(frame: &mut Frame, op: &str, rest: &str) -> Result<Exec, VmError> {
    let [src] = operands(op, rest)?;
    let exception_ref = frame.get_register(src).as_obj_ref()?;
    frame.thrown = Some(exception_ref);
    Ok(Exec::Threw)
}
