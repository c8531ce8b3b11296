use crate::error::VmError;
use std::path::Path;

/// Line-indexed, immutable snapshot of a Smali listing. Lines are trimmed on
/// construction; the program counter addresses them 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    lines: Vec<String>,
}

impl Source {
    pub fn new(lines: Vec<String>) -> Self {
        let lines = lines.into_iter().map(|l| l.trim().to_string()).collect();
        Source { lines }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VmError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Source::from(text.as_str()))
    }

    /// 1-based access, trimmed text. Callers guard with [`Source::has_line`].
    pub fn get(&self, line_no: usize) -> &str {
        &self.lines[line_no - 1]
    }

    pub fn has_line(&self, line_no: usize) -> bool {
        line_no >= 1 && line_no <= self.lines.len()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|l| l.as_str())
    }
}

impl From<&str> for Source {
    fn from(text: &str) -> Self {
        Source::new(text.lines().map(|l| l.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_trimmed_and_one_based() {
        let source = Source::from("  const/4 v0, 0x5  \r\n\treturn v0\n");
        assert_eq!(source.len(), 2);
        assert_eq!(source.get(1), "const/4 v0, 0x5");
        assert_eq!(source.get(2), "return v0");
    }

    #[test]
    fn has_line_bounds() {
        let source = Source::from("nop");
        assert!(!source.has_line(0));
        assert!(source.has_line(1));
        assert!(!source.has_line(2));
    }
}
