//! Helper functions for picking apart Smali source lines: descriptors,
//! directives and opcode tokens. Everything here is pure text processing.

use crate::error::VmError;
use once_cell::sync::Lazy;
use regex::Regex;
use smallvec::SmallVec;

/// Ordered list of type descriptors, as parsed out of a method signature.
pub type ArgDescriptors = SmallVec<[String; 4]>;

static FIRST_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w\-/]+").unwrap());
static CLASS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(L?)([a-zA-Z][\w/$]*);?$").unwrap());
static FIELD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.field.*\s+([\w$]+):([^\s=]+)(\s*=.*)?$").unwrap());
static START_METHOD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.method.*\s+([^\s(]+)\(([^)]*)\)(\S+)$").unwrap());
static COMPOSITE_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^L[\w/$]+;").unwrap());

/// Demangles a bare class descriptor: `Lpkg/sub/Name;` becomes `pkg.sub.Name`.
/// Anything that is not a whole class descriptor (an invocation target such as
/// `Lfoo/Bar;->baz()V`, an array type, trailing garbage) is rejected.
pub fn extract_class_name(descriptor: &str) -> Result<String, VmError> {
    let captures = CLASS_PATTERN
        .captures(descriptor)
        .ok_or_else(|| VmError::MalformedDescriptor(descriptor.to_string()))?;
    Ok(captures[2].replace('/', "."))
}

/// First whitespace-delimited token of an instruction line; alphanumerics
/// plus `-` and `/`, e.g. `cmpl-double` or `const/4`.
pub fn get_op_code(line: &str) -> Option<&str> {
    FIRST_TOKEN.find(line).map(|m| m.as_str())
}

/// Field name and type descriptor of a `.field` directive, ignoring any
/// constant initializer tail.
pub fn get_field_descriptor(line: &str) -> Result<(String, String), VmError> {
    let captures = FIELD_PATTERN
        .captures(line)
        .ok_or_else(|| VmError::MalformedDescriptor(line.to_string()))?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}

fn split_composite(current: &str) -> (String, &str) {
    match COMPOSITE_TYPE.find(current) {
        Some(m) => (m.as_str().to_string(), &current[m.end()..]),
        None => (current[..1].to_string(), &current[1..]),
    }
}

/// Splits a packed argument-list descriptor string into individual type
/// descriptors, left to right. A primitive letter consumes one character, an
/// `L…;` composite runs through the `;`, and `[` prefixes attach recursively:
/// `CLjava/lang/String;[C` yields `C`, `Ljava/lang/String;`, `[C`.
pub fn parse_argument_list(descriptors: &str) -> ArgDescriptors {
    let mut result = ArgDescriptors::new();
    let mut current = descriptors;

    while !current.is_empty() {
        let mut prefix = String::new();
        while current.starts_with('[') {
            prefix.push('[');
            current = &current[1..];
        }
        if current.is_empty() {
            result.push(prefix);
            break;
        }
        let (scalar, rest) = split_composite(current);
        prefix.push_str(&scalar);
        result.push(prefix);
        current = rest;
    }

    result
}

/// Method name, argument descriptors and return descriptor of a `.method`
/// directive line.
pub fn get_method_signature(line: &str) -> Result<(String, ArgDescriptors, String), VmError> {
    let captures = START_METHOD_PATTERN
        .captures(line)
        .ok_or_else(|| VmError::MalformedDescriptor(line.to_string()))?;
    Ok((
        captures[1].to_string(),
        parse_argument_list(&captures[2]),
        captures[3].to_string(),
    ))
}

pub fn is_method_end(line: &str) -> bool {
    line == ".end method"
}

/// Parses a Smali integer literal: decimal or `0x` hex, optional sign, and an
/// optional trailing width suffix (`t` byte, `s` short, `l` long) as emitted
/// by baksmali. Values wider than the consuming opcode are truncated there.
pub fn parse_int_literal(text: &str) -> Result<i64, VmError> {
    let text = text.trim();
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest
        .strip_suffix(['t', 'T', 's', 'S', 'l', 'L'])
        .unwrap_or(rest);
    let magnitude = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        rest.parse::<u64>()
    }
    .map_err(|_| VmError::MalformedOperand {
        opcode: "literal".to_string(),
        operands: text.to_string(),
    })?;
    let value = magnitude as i64;
    Ok(if negative { value.wrapping_neg() } else { value })
}
