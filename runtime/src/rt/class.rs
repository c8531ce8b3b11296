use crate::error::VmError;
use crate::parser::{
    extract_class_name, get_field_descriptor, get_method_signature, is_method_end,
};
use crate::rt::{MethodKey, MethodSource};
use crate::source::Source;
use itertools::Itertools;
use std::collections::HashMap;

/// A loaded Smali class: demangled name, field declarations and the method
/// table keyed by full signature.
#[derive(Debug, Clone)]
pub struct JavaClass {
    class_name: String,
    fields: Vec<(String, String)>,
    methods: HashMap<MethodKey, MethodSource>,
}

impl JavaClass {
    pub fn parse(source: &Source) -> Result<Self, VmError> {
        let class_name = Self::extract_declared_name(source)?;
        let mut fields = Vec::new();
        let mut methods = HashMap::new();

        let mut current: Option<(MethodKey, usize, Vec<String>)> = None;
        for (index, line) in source.iter().enumerate() {
            let line_no = index + 1;
            if line.starts_with(".field") {
                fields.push(get_field_descriptor(line)?);
            }
            if line.starts_with(".method") {
                let (name, args, ret) = get_method_signature(line)?;
                current = Some((MethodKey::new(name, args, ret), line_no, Vec::new()));
            }
            if let Some((_, _, body)) = current.as_mut() {
                body.push(line.to_string());
            }
            if is_method_end(line) {
                if let Some((key, line_index, body)) = current.take() {
                    methods.insert(
                        key,
                        MethodSource {
                            line_index,
                            source: Source::new(body),
                        },
                    );
                }
            }
        }

        Ok(JavaClass {
            class_name,
            fields,
            methods,
        })
    }

    fn extract_declared_name(source: &Source) -> Result<String, VmError> {
        let directive = source
            .iter()
            .find(|line| line.starts_with(".class"))
            .ok_or_else(|| VmError::Preprocessing("missing .class directive".to_string()))?;
        let descriptor = directive
            .split_whitespace()
            .last()
            .ok_or_else(|| VmError::Preprocessing("empty .class directive".to_string()))?;
        extract_class_name(descriptor)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Exact-signature lookup, used by `invoke-*` where the target carries
    /// its full descriptor.
    pub fn method(&self, key: &MethodKey) -> Option<&MethodSource> {
        self.methods.get(key)
    }

    /// Name-based lookup for the top-level API, disambiguating overloads by
    /// argument count when one is supplied.
    pub fn resolve_method(
        &self,
        name: &str,
        argc: Option<usize>,
    ) -> Result<(&MethodKey, &MethodSource), VmError> {
        let mut candidates: Vec<_> = self.methods.iter().filter(|(k, _)| k.name == name).collect();
        if candidates.len() > 1 {
            if let Some(argc) = argc {
                candidates.retain(|(k, _)| k.args.len() == argc);
            }
        }
        match candidates.as_slice() {
            [(key, method)] => Ok((key, method)),
            _ => Err(VmError::UnknownMethod {
                class: self.class_name.clone(),
                method: name.to_string(),
            }),
        }
    }

    /// Methods in their original declaration order.
    pub fn methods_in_declaration_order(&self) -> Vec<(&MethodKey, &MethodSource)> {
        self.methods
            .iter()
            .sorted_by_key(|(_, m)| m.line_index)
            .collect()
    }
}
