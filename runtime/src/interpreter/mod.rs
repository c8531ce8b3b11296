use crate::debug_log;
use crate::error::VmError;
use crate::heap::HeapRef;
use crate::interpreter::handlers::*;
use crate::parser::{extract_class_name, get_op_code, parse_argument_list, ArgDescriptors};
use crate::preprocessor::Preprocessor;
use crate::rt::MethodKey;
use crate::source::Source;
use crate::vm::{Frame, Value};
use crate::Emulator;
use std::collections::HashMap;
use std::time::Instant;

mod handlers;

/// Outcome of one opcode handler, steering the fetch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exec {
    Continue,
    Jumped,
    Returned,
    Threw,
    Stopped,
}

/// What a finished frame hands back to its caller.
#[derive(Debug)]
pub(crate) struct FrameOutcome {
    pub return_v: Option<Value>,
    pub thrown: Option<HeapRef>,
}

pub(crate) struct Interpreter;

impl Interpreter {
    /// Executes one method source on a fresh frame. Invocations of user
    /// methods reenter here with `depth + 1`; the heap, static fields and
    /// builtins are shared through the emulator.
    pub(crate) fn run_method(
        emu: &mut Emulator,
        source: &Source,
        registers: HashMap<String, Value>,
        depth: usize,
    ) -> Result<FrameOutcome, VmError> {
        if depth >= emu.config.frame_stack_size {
            return Err(VmError::StackOverflow(depth));
        }

        let mut frame = Frame::new(registers);
        let started = Instant::now();
        Preprocessor::run(source, &mut frame)?;
        emu.stats.preproc += started.elapsed();

        let started = Instant::now();
        let outcome = Self::fetch_loop(emu, &mut frame, source, depth);
        if depth == 0 {
            emu.stats.execution += started.elapsed();
        }
        outcome?;

        Ok(FrameOutcome {
            return_v: frame.return_v,
            thrown: frame.thrown,
        })
    }

    fn fetch_loop(
        emu: &mut Emulator,
        frame: &mut Frame,
        source: &Source,
        depth: usize,
    ) -> Result<(), VmError> {
        while !frame.stop && source.has_line(frame.pc) {
            emu.stats.steps += 1;
            if let Some(budget) = emu.config.step_budget {
                if emu.stats.steps > budget {
                    return Err(VmError::StepBudgetExceeded(budget));
                }
            }

            let line_no = frame.pc;
            let line = source.get(line_no);
            frame.last_pc = line_no;
            frame.pc += 1;

            if Self::should_skip_line(line) {
                continue;
            }
            debug_log!("{:03} {}", line_no, line);

            let op = get_op_code(line).ok_or_else(|| VmError::UnknownOpcode {
                line_no,
                line: line.to_string(),
            })?;
            let operands = line[op.len()..].trim();

            match Self::dispatch(emu, frame, depth, op, operands) {
                Ok(Exec::Threw) => {
                    if !Self::dispatch_exception(emu, frame)? {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    let exception_ref = match error {
                        VmError::JavaException(exception) => {
                            emu.heap.alloc_throwable(
                                exception.kind.class_name_dot(),
                                exception.message.as_deref(),
                            )
                        }
                        VmError::JavaExceptionThrown(exception_ref) => exception_ref,
                        fatal => return Err(fatal),
                    };
                    frame.thrown = Some(exception_ref);
                    if !Self::dispatch_exception(emu, frame)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Comments, labels and directives were consumed at preprocess time.
    fn should_skip_line(line: &str) -> bool {
        line.is_empty() || matches!(line.as_bytes()[0], b'#' | b':' | b'.')
    }

    /// Scans the try/catch regions covering the throwing instruction. On a
    /// match the pc moves to the handler and `thrown` stays set so that
    /// `move-exception` can consume it; otherwise the frame unwinds.
    fn dispatch_exception(emu: &Emulator, frame: &mut Frame) -> Result<bool, VmError> {
        let Some(exception_ref) = frame.thrown else {
            frame.stop = true;
            return Ok(false);
        };
        let thrown_class = emu.heap.class_name(exception_ref)?;

        for region in &frame.try_catch {
            if frame.last_pc < region.start_line || frame.last_pc >= region.end_line {
                continue;
            }
            if region.exception.matches(&thrown_class) {
                frame.pc = region.handler_line;
                return Ok(true);
            }
        }

        frame.stop = true;
        Ok(false)
    }

    fn dispatch(
        emu: &mut Emulator,
        frame: &mut Frame,
        depth: usize,
        op: &str,
        rest: &str,
    ) -> Result<Exec, VmError> {
        match op {
            "nop" => Ok(Exec::Continue),
            // single-threaded emulation: monitors have nothing to guard
            "monitor-enter" | "monitor-exit" => Ok(Exec::Continue),
            "check-cast" => handle_check_cast(frame, op, rest),

            "move" | "move/from16" | "move/16" | "move-wide" | "move-wide/from16"
            | "move-wide/16" | "move-object" | "move-object/from16" | "move-object/16" => {
                handle_move(frame, op, rest)
            }
            "move-result" | "move-result-wide" | "move-result-object" => {
                handle_move_result(frame, op, rest)
            }
            "move-exception" => handle_move_exception(frame, op, rest),

            "const" | "const/4" | "const/16" | "const/high16" => handle_const(frame, op, rest),
            "const-wide" | "const-wide/16" | "const-wide/32" | "const-wide/high16" => {
                handle_const_wide(frame, op, rest)
            }
            "const-string" | "const-string/jumbo" => handle_const_string(emu, frame, op, rest),
            "const-class" => handle_const_class(emu, frame, op, rest),

            "return-void" => handle_return_void(frame),
            "return" | "return-wide" | "return-object" => handle_return(frame, op, rest),

            "goto" | "goto/16" | "goto/32" => handle_goto(frame, op, rest),
            "if-eq" | "if-ne" | "if-lt" | "if-ge" | "if-gt" | "if-le" => {
                handle_if(frame, op, rest)
            }
            "if-eqz" | "if-nez" | "if-ltz" | "if-gez" | "if-gtz" | "if-lez" => {
                handle_ifz(frame, op, rest)
            }
            "cmp-long" => handle_cmp_long(frame, op, rest),
            "cmpl-float" | "cmpg-float" => handle_cmp_float(frame, op, rest),
            "cmpl-double" | "cmpg-double" => handle_cmp_double(frame, op, rest),

            "add-int" | "add-int/2addr" | "add-int/lit8" | "add-int/lit16" | "sub-int"
            | "sub-int/2addr" | "mul-int" | "mul-int/2addr" | "mul-int/lit8" | "mul-int/lit16"
            | "div-int" | "div-int/2addr" | "div-int/lit8" | "div-int/lit16" | "rem-int"
            | "rem-int/2addr" | "rem-int/lit8" | "rem-int/lit16" | "and-int" | "and-int/2addr"
            | "and-int/lit8" | "and-int/lit16" | "or-int" | "or-int/2addr" | "or-int/lit8"
            | "or-int/lit16" | "xor-int" | "xor-int/2addr" | "xor-int/lit8" | "xor-int/lit16"
            | "shl-int" | "shl-int/2addr" | "shl-int/lit8" | "shr-int" | "shr-int/2addr"
            | "shr-int/lit8" | "ushr-int" | "ushr-int/2addr" | "ushr-int/lit8" => {
                handle_int_binop(frame, op, rest)
            }
            "add-long" | "add-long/2addr" | "sub-long" | "sub-long/2addr" | "mul-long"
            | "mul-long/2addr" | "div-long" | "div-long/2addr" | "rem-long" | "rem-long/2addr"
            | "and-long" | "and-long/2addr" | "or-long" | "or-long/2addr" | "xor-long"
            | "xor-long/2addr" | "shl-long" | "shl-long/2addr" | "shr-long" | "shr-long/2addr"
            | "ushr-long" | "ushr-long/2addr" => handle_long_binop(frame, op, rest),
            "add-float" | "add-float/2addr" | "sub-float" | "sub-float/2addr" | "mul-float"
            | "mul-float/2addr" | "div-float" | "div-float/2addr" | "rem-float"
            | "rem-float/2addr" => handle_float_binop(frame, op, rest),
            "add-double" | "add-double/2addr" | "sub-double" | "sub-double/2addr"
            | "mul-double" | "mul-double/2addr" | "div-double" | "div-double/2addr"
            | "rem-double" | "rem-double/2addr" => handle_double_binop(frame, op, rest),

            "neg-int" | "not-int" | "neg-long" | "not-long" | "neg-float" | "neg-double"
            | "int-to-long" | "int-to-float" | "int-to-double" | "int-to-byte" | "int-to-char"
            | "int-to-short" | "long-to-int" | "long-to-float" | "long-to-double"
            | "float-to-int" | "float-to-long" | "float-to-double" | "double-to-int"
            | "double-to-long" | "double-to-float" => handle_unop(frame, op, rest),

            "new-instance" => handle_new_instance(emu, frame, op, rest),
            "new-array" => handle_new_array(emu, frame, op, rest),
            "array-length" => handle_array_length(emu, frame, op, rest),
            "filled-new-array" | "filled-new-array/range" => {
                handle_filled_new_array(emu, frame, op, rest)
            }
            "fill-array-data" => handle_fill_array_data(emu, frame, op, rest),
            "aget" | "aget-wide" | "aget-object" | "aget-boolean" | "aget-byte" | "aget-char"
            | "aget-short" => handle_aget(emu, frame, op, rest),
            "aput" | "aput-wide" | "aput-object" | "aput-boolean" | "aput-byte" | "aput-char"
            | "aput-short" => handle_aput(emu, frame, op, rest),

            "iget" | "iget-wide" | "iget-object" | "iget-boolean" | "iget-byte" | "iget-char"
            | "iget-short" => handle_iget(emu, frame, op, rest),
            "iput" | "iput-wide" | "iput-object" | "iput-boolean" | "iput-byte" | "iput-char"
            | "iput-short" => handle_iput(emu, frame, op, rest),
            "sget" | "sget-wide" | "sget-object" | "sget-boolean" | "sget-byte" | "sget-char"
            | "sget-short" => handle_sget(emu, frame, op, rest),
            "sput" | "sput-wide" | "sput-object" | "sput-boolean" | "sput-byte" | "sput-char"
            | "sput-short" => handle_sput(emu, frame, op, rest),

            "packed-switch" => handle_packed_switch(frame, op, rest),
            "sparse-switch" => handle_sparse_switch(frame, op, rest),
            "throw" => handle_throw(frame, op, rest),

            "invoke-virtual" | "invoke-super" | "invoke-direct" | "invoke-static"
            | "invoke-interface" | "invoke-virtual/range" | "invoke-super/range"
            | "invoke-direct/range" | "invoke-static/range" | "invoke-interface/range" => {
                Self::handle_invoke(emu, frame, depth, op, rest)
            }

            _ => Err(VmError::UnknownOpcode {
                line_no: frame.last_pc,
                line: format!("{} {}", op, rest),
            }),
        }
    }

    /// Resolves an invocation target and either calls a builtin or stacks a
    /// child frame. `invoke-super` is treated like `invoke-direct`: a direct
    /// signature lookup on the named class, no vtable walk.
    fn handle_invoke(
        emu: &mut Emulator,
        frame: &mut Frame,
        depth: usize,
        op: &str,
        rest: &str,
    ) -> Result<Exec, VmError> {
        let (values, target) = Self::parse_invoke_operands(frame, op, rest)?;
        let (class_name, method_name, arg_descriptors, return_descriptor) =
            Self::parse_invoke_target(op, target)?;

        let is_static = op.starts_with("invoke-static");
        if !is_static && values.is_empty() {
            return Err(malformed(op, rest));
        }

        if emu.builtins.contains_class(&class_name) {
            let (this, args) = if is_static {
                (None, &values[..])
            } else {
                (Some(values[0]), &values[1..])
            };
            let result = emu
                .builtins
                .invoke(&mut emu.heap, &class_name, &method_name, this, args)?;
            if let Some(value) = result {
                frame.return_v = Some(value);
            }
            return Ok(Exec::Continue);
        }

        let source = {
            let class = emu
                .loader
                .get(&class_name)
                .ok_or_else(|| VmError::UnknownClass(class_name.clone()))?;
            let key = MethodKey::new(method_name, arg_descriptors, return_descriptor);
            class
                .method(&key)
                .ok_or_else(|| VmError::UnknownMethod {
                    class: class_name.clone(),
                    method: key.mangled(),
                })?
                .source
                .clone()
        };

        // p0..pN seeded left to right; p0 is `this` for non-static forms.
        let mut child_registers = HashMap::new();
        for (position, value) in values.iter().enumerate() {
            child_registers.insert(format!("p{}", position), *value);
        }

        let outcome = Self::run_method(emu, &source, child_registers, depth + 1)?;
        if let Some(thrown) = outcome.thrown {
            frame.thrown = Some(thrown);
            return Ok(Exec::Threw);
        }
        frame.return_v = outcome.return_v;
        Ok(Exec::Continue)
    }

    fn parse_invoke_operands<'a>(
        frame: &Frame,
        op: &str,
        rest: &'a str,
    ) -> Result<(Vec<Value>, &'a str), VmError> {
        let body = rest.strip_prefix('{').ok_or_else(|| malformed(op, rest))?;
        let (registers, tail) = body.split_once('}').ok_or_else(|| malformed(op, rest))?;
        let target = tail
            .trim_start()
            .strip_prefix(',')
            .ok_or_else(|| malformed(op, rest))?
            .trim();

        let names = Self::expand_register_list(registers, op)?;
        let values = names
            .iter()
            .map(|name| frame.get_register(name))
            .collect();
        Ok((values, target))
    }

    /// `v0, v1, v2` or the `/range` form `v0 .. v5`, inclusive on both ends.
    fn expand_register_list(registers: &str, op: &str) -> Result<Vec<String>, VmError> {
        let registers = registers.trim();
        if registers.is_empty() {
            return Ok(Vec::new());
        }
        if let Some((first, last)) = registers.split_once("..") {
            let first = first.trim();
            let last = last.trim();
            let prefix = first
                .chars()
                .next()
                .filter(|c| *c == 'v' || *c == 'p')
                .ok_or_else(|| malformed(op, registers))?;
            let start: usize = first[1..].parse().map_err(|_| malformed(op, registers))?;
            let end: usize = last[1..].parse().map_err(|_| malformed(op, registers))?;
            if last.chars().next() != Some(prefix) || end < start {
                return Err(malformed(op, registers));
            }
            return Ok((start..=end).map(|n| format!("{}{}", prefix, n)).collect());
        }
        Ok(registers
            .split(',')
            .map(|name| name.trim().to_string())
            .collect())
    }

    fn parse_invoke_target(
        op: &str,
        target: &str,
    ) -> Result<(String, String, ArgDescriptors, String), VmError> {
        let (class_descriptor, method_part) =
            target.split_once("->").ok_or_else(|| malformed(op, target))?;
        let class_name = extract_class_name(class_descriptor)?;
        let open = method_part.find('(').ok_or_else(|| malformed(op, target))?;
        let close = method_part.find(')').ok_or_else(|| malformed(op, target))?;
        if close < open {
            return Err(malformed(op, target));
        }
        let method_name = method_part[..open].to_string();
        let arg_descriptors = parse_argument_list(&method_part[open + 1..close]);
        let return_descriptor = method_part[close + 1..].to_string();
        Ok((class_name, method_name, arg_descriptors, return_descriptor))
    }
}

pub(crate) fn malformed(op: &str, operands: &str) -> VmError {
    VmError::MalformedOperand {
        opcode: op.to_string(),
        operands: operands.to_string(),
    }
}
