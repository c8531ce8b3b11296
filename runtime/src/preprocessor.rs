//! Single pass over a method source, run before execution. Resolves labels,
//! packed/sparse-switch tables, array-data payloads and try/catch regions
//! into the fast-lookup tables on the [`Frame`].

use crate::error::VmError;
use crate::parser::{extract_class_name, parse_int_literal};
use crate::source::Source;
use crate::vm::{
    ArrayDataTable, CatchType, Frame, PackedSwitchTable, SparseSwitchTable, TryCatchRegion,
};
use byteorder::{LittleEndian, WriteBytesExt};
use once_cell::sync::Lazy;
use regex::Regex;

static CATCH_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.catch\s+(\S+)\s+\{(\S+)\s+\.\.\s+(\S+)\}\s+(\S+)$").unwrap());
static CATCHALL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\.catchall\s+\{(\S+)\s+\.\.\s+(\S+)\}\s+(\S+)$").unwrap());

struct PendingCatch {
    exception: CatchType,
    start_label: String,
    end_label: String,
    handler_label: String,
}

pub struct Preprocessor;

impl Preprocessor {
    /// Fills the frame's lookup tables from the source. Idempotent: the
    /// tables are rebuilt from scratch on every run.
    pub fn run(source: &Source, frame: &mut Frame) -> Result<(), VmError> {
        frame.labels.clear();
        frame.packed_switches.clear();
        frame.sparse_switches.clear();
        frame.array_data.clear();
        frame.try_catch.clear();

        let mut pending = Vec::new();
        let mut index = 1;
        while source.has_line(index) {
            let line = source.get(index);
            if line.is_empty() {
                index += 1;
                continue;
            }
            if let Some(label) = line.strip_prefix(':') {
                if label.is_empty() || line.contains(char::is_whitespace) {
                    return Err(VmError::Preprocessing(format!(
                        "malformed label '{}' on line {}",
                        line, index
                    )));
                }
                if line.starts_with(":pswitch_data_") {
                    index = Self::read_packed_switch(source, index, frame)?;
                } else if line.starts_with(":sswitch_data_") {
                    index = Self::read_sparse_switch(source, index, frame)?;
                } else if line.starts_with(":array_") {
                    index = Self::read_array_data(source, index, frame)?;
                } else {
                    frame.labels.insert(line.to_string(), index);
                }
            } else if line.starts_with(".catchall") {
                pending.push(Self::parse_catchall(line)?);
            } else if line.starts_with(".catch") {
                pending.push(Self::parse_catch(line)?);
            }
            index += 1;
        }

        // Label resolution is deferred: .catch directives may reference
        // labels that only appear later in the pass.
        for catch in pending {
            frame.try_catch.push(TryCatchRegion {
                start_line: Self::resolve(frame, &catch.start_label)?,
                end_line: Self::resolve(frame, &catch.end_label)?,
                exception: catch.exception,
                handler_line: Self::resolve(frame, &catch.handler_label)?,
            });
        }
        Ok(())
    }

    fn resolve(frame: &Frame, label: &str) -> Result<usize, VmError> {
        frame
            .labels
            .get(label)
            .copied()
            .ok_or_else(|| VmError::Preprocessing(format!("unresolved catch label '{}'", label)))
    }

    fn parse_catch(line: &str) -> Result<PendingCatch, VmError> {
        let captures = CATCH_PATTERN
            .captures(line)
            .ok_or_else(|| VmError::Preprocessing(format!("malformed .catch: '{}'", line)))?;
        Ok(PendingCatch {
            exception: CatchType::Class(extract_class_name(&captures[1])?),
            start_label: captures[2].to_string(),
            end_label: captures[3].to_string(),
            handler_label: captures[4].to_string(),
        })
    }

    fn parse_catchall(line: &str) -> Result<PendingCatch, VmError> {
        let captures = CATCHALL_PATTERN
            .captures(line)
            .ok_or_else(|| VmError::Preprocessing(format!("malformed .catchall: '{}'", line)))?;
        Ok(PendingCatch {
            exception: CatchType::Any,
            start_label: captures[1].to_string(),
            end_label: captures[2].to_string(),
            handler_label: captures[3].to_string(),
        })
    }

    /// Reads a `.packed-switch` block anchored at `anchor`; returns the line
    /// index of `.end packed-switch` so the caller can skip the block.
    fn read_packed_switch(
        source: &Source,
        anchor: usize,
        frame: &mut Frame,
    ) -> Result<usize, VmError> {
        let anchor_label = source.get(anchor).to_string();
        let mut index = anchor + 1;
        let first_key = source
            .has_line(index)
            .then(|| source.get(index))
            .and_then(|line| line.strip_prefix(".packed-switch"))
            .map(parse_int_literal)
            .transpose()?
            .ok_or_else(|| {
                VmError::Preprocessing(format!("expected .packed-switch after {}", anchor_label))
            })?;

        let mut targets = Vec::new();
        loop {
            index += 1;
            if !source.has_line(index) {
                return Err(VmError::Preprocessing(format!(
                    "unclosed .packed-switch at {}",
                    anchor_label
                )));
            }
            let line = source.get(index);
            if line == ".end packed-switch" {
                break;
            }
            if line.starts_with(':') {
                targets.push(line.to_string());
            } else if !line.is_empty() {
                return Err(VmError::Preprocessing(format!(
                    "unexpected '{}' inside .packed-switch",
                    line
                )));
            }
        }
        frame
            .packed_switches
            .insert(anchor_label, PackedSwitchTable { first_key, targets });
        Ok(index)
    }

    fn read_sparse_switch(
        source: &Source,
        anchor: usize,
        frame: &mut Frame,
    ) -> Result<usize, VmError> {
        let anchor_label = source.get(anchor).to_string();
        let mut index = anchor + 1;
        if !source.has_line(index) || source.get(index) != ".sparse-switch" {
            return Err(VmError::Preprocessing(format!(
                "expected .sparse-switch after {}",
                anchor_label
            )));
        }

        let mut cases = Vec::new();
        loop {
            index += 1;
            if !source.has_line(index) {
                return Err(VmError::Preprocessing(format!(
                    "unclosed .sparse-switch at {}",
                    anchor_label
                )));
            }
            let line = source.get(index);
            if line == ".end sparse-switch" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            let (key, target) = line.split_once("->").ok_or_else(|| {
                VmError::Preprocessing(format!("malformed sparse-switch case '{}'", line))
            })?;
            cases.push((parse_int_literal(key)?, target.trim().to_string()));
        }
        frame
            .sparse_switches
            .insert(anchor_label, SparseSwitchTable { cases });
        Ok(index)
    }

    /// Reads an `.array-data` block, packing each element little-endian at
    /// the declared width.
    fn read_array_data(source: &Source, anchor: usize, frame: &mut Frame) -> Result<usize, VmError> {
        let anchor_label = source.get(anchor).to_string();
        let mut index = anchor + 1;
        let element_width = source
            .has_line(index)
            .then(|| source.get(index))
            .and_then(|line| line.strip_prefix(".array-data"))
            .map(|width| {
                width.trim().parse::<usize>().map_err(|_| {
                    VmError::Preprocessing(format!("bad .array-data width '{}'", width.trim()))
                })
            })
            .transpose()?
            .ok_or_else(|| {
                VmError::Preprocessing(format!("expected .array-data after {}", anchor_label))
            })?;

        let mut bytes = Vec::new();
        loop {
            index += 1;
            if !source.has_line(index) {
                return Err(VmError::Preprocessing(format!(
                    "unclosed .array-data at {}",
                    anchor_label
                )));
            }
            let line = source.get(index);
            if line == ".end array-data" {
                break;
            }
            for token in line.split_whitespace() {
                let value = parse_int_literal(token)?;
                match element_width {
                    1 => bytes.write_i8(value as i8)?,
                    2 => bytes.write_i16::<LittleEndian>(value as i16)?,
                    4 => bytes.write_i32::<LittleEndian>(value as i32)?,
                    8 => bytes.write_i64::<LittleEndian>(value)?,
                    other => {
                        return Err(VmError::Preprocessing(format!(
                            "unsupported .array-data width {}",
                            other
                        )));
                    }
                }
            }
        }
        frame.array_data.insert(
            anchor_label,
            ArrayDataTable {
                element_width,
                bytes,
            },
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn preprocess(text: &str) -> Frame {
        let source = Source::from(text);
        let mut frame = Frame::new(HashMap::new());
        Preprocessor::run(&source, &mut frame).unwrap();
        frame
    }

    #[test]
    fn labels_map_to_their_line_index() {
        let frame = preprocess("const/4 v0, 0x0\n:cond_0\nreturn v0\n:goto_1\n");
        assert_eq!(frame.labels[":cond_0"], 2);
        assert_eq!(frame.labels[":goto_1"], 4);
        assert_eq!(frame.labels.len(), 2);
    }

    #[test]
    fn packed_switch_block_is_recorded_and_skipped() {
        let frame = preprocess(
            ":pswitch_data_0\n.packed-switch 0x1\n:pswitch_0\n:pswitch_1\n.end packed-switch\n",
        );
        let table = &frame.packed_switches[":pswitch_data_0"];
        assert_eq!(table.first_key, 1);
        assert_eq!(table.targets, vec![":pswitch_0", ":pswitch_1"]);
        // the block's target list lines are not labels of their own
        assert!(frame.labels.is_empty());
    }

    #[test]
    fn sparse_switch_cases() {
        let frame = preprocess(
            ":sswitch_data_0\n.sparse-switch\n0x1 -> :sswitch_0\n0x10 -> :sswitch_1\n.end sparse-switch\n",
        );
        let table = &frame.sparse_switches[":sswitch_data_0"];
        assert_eq!(
            table.cases,
            vec![(1, ":sswitch_0".to_string()), (16, ":sswitch_1".to_string())]
        );
    }

    #[test]
    fn array_data_packs_little_endian() {
        let frame = preprocess(":array_0\n.array-data 4\n0x100\n-0x1\n.end array-data\n");
        let table = &frame.array_data[":array_0"];
        assert_eq!(table.element_width, 4);
        assert_eq!(
            table.bytes,
            vec![0x00, 0x01, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn byte_width_array_data() {
        let frame = preprocess(":array_1\n.array-data 1\n0x4dt\n0x4bt\n.end array-data\n");
        assert_eq!(frame.array_data[":array_1"].bytes, b"MK");
    }

    #[test]
    fn catch_regions_resolve_after_the_pass() {
        let frame = preprocess(
            ":try_start_0\nthrow v0\n:try_end_0\n.catch Ljava/lang/NullPointerException; {:try_start_0 .. :try_end_0} :handler\n:handler\nconst/4 v0, -0x1\n",
        );
        assert_eq!(frame.try_catch.len(), 1);
        let region = &frame.try_catch[0];
        assert_eq!(region.start_line, 1);
        assert_eq!(region.end_line, 3);
        assert_eq!(region.handler_line, 5);
        assert_eq!(
            region.exception,
            CatchType::Class("java.lang.NullPointerException".to_string())
        );
    }

    #[test]
    fn catchall_matches_any() {
        let frame = preprocess(
            ":try_start_0\nthrow v0\n:try_end_0\n.catchall {:try_start_0 .. :try_end_0} :handler\n:handler\n",
        );
        assert_eq!(frame.try_catch[0].exception, CatchType::Any);
    }

    #[test]
    fn unclosed_block_fails() {
        let source = Source::from(":array_0\n.array-data 4\n0x1\n");
        let mut frame = Frame::new(HashMap::new());
        assert!(matches!(
            Preprocessor::run(&source, &mut frame),
            Err(VmError::Preprocessing(_))
        ));
    }

    #[test]
    fn preprocessing_is_idempotent() {
        let text = ":cond_0\nconst/4 v0, 0x0\n:array_0\n.array-data 2\n0x1234s\n.end array-data\n";
        let source = Source::from(text);
        let mut frame = Frame::new(HashMap::new());
        Preprocessor::run(&source, &mut frame).unwrap();
        let labels = frame.labels.clone();
        let bytes = frame.array_data[":array_0"].bytes.clone();
        Preprocessor::run(&source, &mut frame).unwrap();
        assert_eq!(frame.labels, labels);
        assert_eq!(frame.array_data[":array_0"].bytes, bytes);
        assert_eq!(frame.try_catch.len(), 0);
    }
}
