//! Source-context collector: the method under analysis and the classes
//! the constraints mention, as annotated source excerpts.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::config::SourceConfig;
use crate::expr::ExprRef;
use crate::runtime::{simple_name, type_signature, ClassRegistry, ThreadState};
use crate::session::MethodRef;

use super::CollectError;

/// Hard cap on extracted class-definition blocks.
const RELATED_CLASS_MAX_LINES: usize = 200;

fn descriptor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"L[\w/$]+;").expect("descriptor regex compiles"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineNumbers {
    pub method_start: u32,
    pub method_end: u32,
}

/// Source excerpts shipped to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceContext {
    pub method_name: String,
    pub method_signature: String,
    pub qualified_name: String,
    pub class_name: String,
    pub simple_class_name: String,
    pub method_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_source: Option<String>,
    pub line_numbers: LineNumbers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub related_classes: BTreeMap<String, String>,
}

/// Collect source context for the method under analysis, falling back to
/// the top frame's method. `cache` memoises class-source lookups across
/// solve calls within a session.
pub fn collect_source(
    config: &SourceConfig,
    registry: &ClassRegistry,
    thread: &ThreadState,
    method: Option<&MethodRef>,
    constraints: &[ExprRef],
    parameter_types: &BTreeMap<String, String>,
    cache: &mut HashMap<String, Option<String>>,
) -> Result<SourceContext, CollectError> {
    let method = match method {
        Some(m) => m.clone(),
        None => {
            let frame = thread.top_frame().ok_or(CollectError::NoMethod)?;
            MethodRef::new(&frame.class_name, &frame.method_name, &frame.signature)
        }
    };

    let class = registry
        .lookup(&method.class_name)
        .ok_or_else(|| CollectError::UnknownClass(method.class_name.clone()))?;
    let source = class
        .source
        .as_deref()
        .ok_or_else(|| CollectError::NoSource(method.class_name.clone()))?;

    let info = class
        .method(&method.method_name, &method.signature)
        .or_else(|| class.method_by_name(&method.method_name));
    let (start, end) = match info.and_then(|m| m.start_line.zip(m.end_line)) {
        Some(range) => range,
        None => return Err(CollectError::NoLineInfo(method.qualified())),
    };

    let lines: Vec<&str> = source.lines().collect();
    let to = ((end as usize) + config.context_lines).min(lines.len());
    let from = (start as usize)
        .saturating_sub(1 + config.context_lines)
        .min(to);
    let mut excerpt = String::new();
    for (offset, line) in lines[from..to].iter().enumerate() {
        if config.number_lines {
            excerpt.push_str(&format!("{:4}: {}\n", from + offset + 1, line));
        } else {
            excerpt.push_str(line);
            excerpt.push('\n');
        }
    }
    let method_source = truncate_chars(&excerpt, config.max_method_source_length);

    let class_source = config
        .include_full_class
        .then(|| truncate_chars(source, config.max_class_source_length));

    let related_classes = collect_related_classes(
        config,
        registry,
        constraints,
        parameter_types,
        &method.class_name,
        cache,
    );

    Ok(SourceContext {
        method_name: method.method_name.clone(),
        method_signature: method.signature.clone(),
        qualified_name: method.qualified(),
        class_name: method.class_name.clone(),
        simple_class_name: simple_name(&method.class_name).to_string(),
        method_source,
        class_source,
        line_numbers: LineNumbers {
            method_start: start,
            method_end: end,
        },
        source_file: class.source_file.clone(),
        related_classes,
    })
}

/// Classes the constraints refer to by JVM descriptor, plus the declared
/// parameter types, each as its class-definition block.
fn collect_related_classes(
    config: &SourceConfig,
    registry: &ClassRegistry,
    constraints: &[ExprRef],
    parameter_types: &BTreeMap<String, String>,
    exclude: &str,
    cache: &mut HashMap<String, Option<String>>,
) -> BTreeMap<String, String> {
    let mut descriptors: BTreeSet<String> = BTreeSet::new();
    for constraint in constraints {
        let text = constraint.to_string();
        for m in descriptor_regex().find_iter(&text) {
            descriptors.insert(m.as_str().to_string());
        }
    }
    for declared in parameter_types.values() {
        descriptors.insert(type_signature(declared));
    }

    let mut related = BTreeMap::new();
    for descriptor in descriptors {
        let Some(class_name) = crate::runtime::class_name_from_signature(&descriptor) else {
            continue;
        };
        if class_name == exclude {
            continue;
        }
        let source = cache
            .entry(class_name.clone())
            .or_insert_with(|| locate_source(registry, &class_name));
        let Some(source) = source.as_deref() else {
            debug!(class = %class_name, "no source for related class");
            continue;
        };
        if let Some(block) = extract_class_block(source, simple_name(&class_name)) {
            related.insert(
                class_name,
                truncate_chars(&block, config.max_related_class_length),
            );
        }
    }
    related
}

/// Locate the source for `class_name`: directly attached source first,
/// then any class whose source file matches the simple or qualified name.
fn locate_source(registry: &ClassRegistry, class_name: &str) -> Option<String> {
    if let Some(class) = registry.lookup(class_name) {
        if let Some(source) = &class.source {
            return Some(source.clone());
        }
    }
    let simple_file = format!("{}.java", simple_name(class_name));
    let qualified_file = format!("{}.java", class_name);
    registry
        .definitions()
        .find(|c| {
            c.source.is_some()
                && c.source_file
                    .as_deref()
                    .is_some_and(|f| f == simple_file || f == qualified_file)
        })
        .and_then(|c| c.source.clone())
}

/// Extract the class-definition block: from the `class Name` (or
/// `interface Name`) line through the matching closing brace, capped at
/// 200 lines.
fn extract_class_block(source: &str, simple: &str) -> Option<String> {
    let header =
        Regex::new(&format!(r"\b(class|interface)\s+{}\b", regex::escape(simple))).ok()?;
    let lines: Vec<&str> = source.lines().collect();
    let start = lines.iter().position(|line| header.is_match(line))?;

    let mut depth: i64 = 0;
    let mut opened = false;
    let mut out = Vec::new();
    for line in lines[start..].iter().take(RELATED_CLASS_MAX_LINES) {
        out.push(*line);
        for c in line.chars() {
            match c {
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }
        if opened && depth <= 0 {
            break;
        }
    }
    Some(out.join("\n"))
}

/// Byte-capped, char-boundary-safe truncation.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
