use crate::error::VmError;
use crate::heap::HeapRef;
use crate::throw_exception;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Register, return-slot and static-field values. Wide (64-bit) values occupy
/// a single logical slot; the Dalvik register-pair discipline is not modeled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(u16),
    Null,
    Ref(HeapRef),
}

impl Value {
    pub fn as_int(&self) -> Result<i32, VmError> {
        match self {
            Value::Integer(v) => Ok(*v),
            Value::Boolean(v) => Ok(*v as i32),
            Value::Char(v) => Ok(*v as i32),
            Value::Null => Ok(0),
            _ => throw_exception!(ClassCastException, format!("{:?} is not an int", self)),
        }
    }

    pub fn as_long(&self) -> Result<i64, VmError> {
        match self {
            Value::Long(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as i64),
            Value::Boolean(v) => Ok(*v as i64),
            Value::Char(v) => Ok(*v as i64),
            Value::Null => Ok(0),
            _ => throw_exception!(ClassCastException, format!("{:?} is not a long", self)),
        }
    }

    /// Float view of a register. `const` loads raw IEEE-754 bits as an
    /// integer, so integer slots are reinterpreted rather than converted.
    pub fn as_float(&self) -> Result<f32, VmError> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Integer(v) => Ok(f32::from_bits(*v as u32)),
            _ => throw_exception!(ClassCastException, format!("{:?} is not a float", self)),
        }
    }

    pub fn as_double(&self) -> Result<f64, VmError> {
        match self {
            Value::Double(v) => Ok(*v),
            Value::Long(v) => Ok(f64::from_bits(*v as u64)),
            _ => throw_exception!(ClassCastException, format!("{:?} is not a double", self)),
        }
    }

    pub fn as_obj_ref(&self) -> Result<HeapRef, VmError> {
        match self {
            Value::Ref(addr) => Ok(*addr),
            Value::Null => throw_exception!(NullPointerException),
            _ => throw_exception!(ClassCastException, format!("{:?} is not a reference", self)),
        }
    }

    pub fn as_nullable_obj_ref(&self) -> Result<Option<HeapRef>, VmError> {
        match self {
            Value::Ref(addr) => Ok(Some(*addr)),
            Value::Null => Ok(None),
            _ => throw_exception!(ClassCastException, format!("{:?} is not a reference", self)),
        }
    }

    /// Zero test used by the `if-*z` family; null references count as zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Integer(v) => *v == 0,
            Value::Long(v) => *v == 0,
            Value::Float(v) => *v == 0.0,
            Value::Double(v) => *v == 0.0,
            Value::Boolean(v) => !*v,
            Value::Char(v) => *v == 0,
            Value::Null => true,
            Value::Ref(_) => false,
        }
    }

    fn as_f64_widened(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            Value::Boolean(v) => Some(*v as i32 as f64),
            Value::Char(v) => Some(*v as f64),
            Value::Null => Some(0.0),
            Value::Ref(_) => None,
        }
    }

    fn as_i64_widened(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Boolean(v) => Some(*v as i64),
            Value::Char(v) => Some(*v as i64),
            Value::Null => Some(0),
            Value::Float(_) | Value::Double(_) | Value::Ref(_) => None,
        }
    }
}

/// Ordering for the `if-*` family. References compare by identity and only
/// ever yield `Equal`; `None` means "unordered" (distinct references, or a
/// NaN operand), which branches `if-ne` and falls through everything else.
pub fn compare_values(a: Value, b: Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Ref(x), Value::Ref(y)) => (x == y).then_some(Ordering::Equal),
        (Value::Ref(_), _) | (_, Value::Ref(_)) => None,
        _ => {
            if let (Some(x), Some(y)) = (a.as_i64_widened(), b.as_i64_widened()) {
                return Some(x.cmp(&y));
            }
            a.as_f64_widened()?.partial_cmp(&b.as_f64_widened()?)
        }
    }
}

#[derive(Debug, Clone)]
pub struct PackedSwitchTable {
    pub first_key: i64,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SparseSwitchTable {
    pub cases: Vec<(i64, String)>,
}

#[derive(Debug, Clone)]
pub struct ArrayDataTable {
    pub element_width: usize,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatchType {
    Any,
    /// Demangled exception class name.
    Class(String),
}

impl CatchType {
    pub fn matches(&self, thrown_class: &str) -> bool {
        match self {
            CatchType::Any => true,
            CatchType::Class(name) => name == thrown_class,
        }
    }
}

/// A `.catch`/`.catchall` region with labels already resolved to line indexes.
/// The covered range is `[start_line, end_line)`.
#[derive(Debug, Clone)]
pub struct TryCatchRegion {
    pub start_line: usize,
    pub end_line: usize,
    pub exception: CatchType,
    pub handler_line: usize,
}

/// Per-invocation VM state. Everything here is scoped to one method run;
/// only the emulator-owned static-field store outlives the frame.
#[derive(Debug)]
pub struct Frame {
    pub registers: HashMap<String, Value>,
    /// 1-based line index of the next instruction.
    pub pc: usize,
    /// Line index of the instruction currently (or last) executed, the
    /// anchor for try/catch containment.
    pub last_pc: usize,
    pub return_v: Option<Value>,
    pub thrown: Option<HeapRef>,
    pub stop: bool,
    pub labels: HashMap<String, usize>,
    pub packed_switches: HashMap<String, PackedSwitchTable>,
    pub sparse_switches: HashMap<String, SparseSwitchTable>,
    pub array_data: HashMap<String, ArrayDataTable>,
    pub try_catch: Vec<TryCatchRegion>,
}

impl Frame {
    pub fn new(registers: HashMap<String, Value>) -> Self {
        Frame {
            registers,
            pc: 1,
            last_pc: 1,
            return_v: None,
            thrown: None,
            stop: false,
            labels: HashMap::new(),
            packed_switches: HashMap::new(),
            sparse_switches: HashMap::new(),
            array_data: HashMap::new(),
            try_catch: Vec::new(),
        }
    }

    /// Unwritten registers read as null.
    pub fn get_register(&self, name: &str) -> Value {
        self.registers.get(name).copied().unwrap_or(Value::Null)
    }

    pub fn set_register(&mut self, name: &str, value: Value) {
        self.registers.insert(name.to_string(), value);
    }

    pub fn label(&self, name: &str) -> Result<usize, VmError> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| VmError::MalformedOperand {
                opcode: "branch-target".to_string(),
                operands: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_as_null() {
        let frame = Frame::new(HashMap::new());
        assert_eq!(frame.get_register("v7"), Value::Null);
    }

    #[test]
    fn reference_comparison_is_identity() {
        assert_eq!(
            compare_values(Value::Ref(3), Value::Ref(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(compare_values(Value::Ref(3), Value::Ref(4)), None);
        assert_eq!(compare_values(Value::Null, Value::Ref(4)), None);
        assert_eq!(
            compare_values(Value::Null, Value::Null),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn numeric_comparison_widens() {
        assert_eq!(
            compare_values(Value::Integer(5), Value::Long(5)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            compare_values(Value::Integer(-1), Value::Integer(3)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_values(Value::Double(f64::NAN), Value::Double(0.0)),
            None
        );
    }

    #[test]
    fn const_bits_reinterpret_as_float() {
        assert_eq!(Value::Integer(0x3f80_0000).as_float().unwrap(), 1.0);
        assert_eq!(
            Value::Long(0x3ff0_0000_0000_0000).as_double().unwrap(),
            1.0
        );
    }
}
