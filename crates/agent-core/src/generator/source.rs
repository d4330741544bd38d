//! Static inspection of generated tool source.
//!
//! Nothing here runs the code. Imports, the class name and the tool
//! attributes are read with patterns so a malformed answer from the model is
//! rejected before it ever reaches disk.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::GenerationError;

/// Modules a generated tool may import without a resolvability check:
/// the Python standard library plus the third-party packages the built-in
/// tooling already depends on.
pub const ALLOWED_MODULES: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "binascii", "bisect", "bz2",
    "calendar", "cmath", "codecs", "collections", "colorsys", "contextlib", "copy", "csv",
    "dataclasses", "datetime", "decimal", "difflib", "email", "enum", "errno", "fnmatch",
    "fractions", "functools", "gettext", "glob", "gzip", "hashlib", "heapq", "hmac", "html",
    "http", "importlib", "inspect", "io", "ipaddress", "itertools", "json", "keyword",
    "locale", "logging", "lzma", "math", "mimetypes", "numbers", "operator", "os", "pathlib",
    "platform", "pprint", "queue", "random", "re", "secrets", "shlex", "shutil", "socket",
    "sqlite3", "ssl", "statistics", "string", "struct", "subprocess", "sys", "tarfile",
    "tempfile", "textwrap", "threading", "time", "timeit", "traceback", "types", "typing",
    "unicodedata", "urllib", "uuid", "warnings", "weakref", "xml", "zipfile", "zlib",
    "zoneinfo", "requests", "bs4",
];

/// Names a generated tool may not take: the finish action and the seeded tools
pub const RESERVED_TOOL_NAMES: &[&str] = &["finish", "create_tool", "calculator", "fetch_web_content"];

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^import[ \t]+([^#\r\n]+)").expect("invalid import regex")
});

static FROM_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^from[ \t]+([\w.]+)[ \t]+import\b").expect("invalid from-import regex")
});

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^class[ \t]+([A-Za-z_]\w*)[ \t]*[(:]").expect("invalid class regex")
});

static NAME_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]+name[ \t]*(?::[ \t]*str[ \t]*)?=[ \t]*["']([^"'\r\n]+)["']"#)
        .expect("invalid name attribute regex")
});

static DESCRIPTION_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^[ \t]+description[ \t]*(?::[ \t]*str[ \t]*)?=[ \t]*(?:"([^"\r\n]*)"|'([^'\r\n]*)')"#,
    )
    .expect("invalid description attribute regex")
});

static TOOL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("invalid tool name regex"));

/// Remove a surrounding Markdown code fence, whatever its language tag
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // drop the info string ("python", "py", ...) on the opening line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Root package of every top-level import, e.g. `os` for `import os.path`
pub fn imported_roots(source: &str) -> BTreeSet<String> {
    let mut roots = BTreeSet::new();

    for caps in IMPORT_RE.captures_iter(source) {
        for item in caps[1].split(',') {
            if let Some(root) = item
                .split_whitespace()
                .next()
                .and_then(|module| module.split('.').next())
                .filter(|root| !root.is_empty())
            {
                roots.insert(root.to_string());
            }
        }
    }

    for caps in FROM_IMPORT_RE.captures_iter(source) {
        // relative imports (`from .x import y`) have an empty root
        if let Some(root) = caps[1].split('.').next().filter(|root| !root.is_empty()) {
            roots.insert(root.to_string());
        }
    }

    roots
}

/// Imported roots that are not on the allow-list
pub fn unlisted_imports(source: &str) -> Vec<String> {
    imported_roots(source)
        .into_iter()
        .filter(|root| !ALLOWED_MODULES.contains(&root.as_str()))
        .collect()
}

/// The parts of a generated tool the loader needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolSource {
    /// Python class implementing the tool
    pub class_name: String,
    /// Tool name (also the file stem)
    pub name: String,
    /// Description shown in the catalog
    pub description: String,
}

impl ToolSource {
    /// Extract class name, `name` and `description` from the source text
    pub fn parse(source: &str) -> Result<Self, GenerationError> {
        let class_name = CLASS_RE
            .captures(source)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| GenerationError::MalformedSource("no class definition found".into()))?;

        let name = NAME_ATTR_RE
            .captures(source)
            .map(|caps| caps[1].trim().to_string())
            .ok_or_else(|| GenerationError::MalformedSource("no 'name' attribute found".into()))?;

        if !TOOL_NAME_RE.is_match(&name) {
            return Err(GenerationError::MalformedSource(format!(
                "tool name '{name}' is not snake_case"
            )));
        }
        if RESERVED_TOOL_NAMES.contains(&name.as_str()) {
            return Err(GenerationError::MalformedSource(format!(
                "tool name '{name}' is reserved"
            )));
        }

        let description = DESCRIPTION_ATTR_RE
            .captures(source)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| format!("Generated tool '{name}'"));

        Ok(Self {
            class_name,
            name,
            description,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"import json
import os.path, re as regex
from datetime import datetime
from collections.abc import Mapping
from . import sibling


class WordCounterTool:
    name = "word_counter"
    description = "Counts the words in args."

    def run(self, args: str) -> str:
        import numpy  # nested imports are not top-level
        return str(len(args.split()))
"#;

    #[test]
    fn test_imported_roots() {
        let roots: Vec<_> = imported_roots(SAMPLE).into_iter().collect();
        assert_eq!(roots, vec!["collections", "datetime", "json", "os", "re"]);
    }

    #[test]
    fn test_unlisted_imports() {
        assert!(unlisted_imports(SAMPLE).is_empty());

        let source = "import numpy as np\nfrom pandas import DataFrame\nimport json\n";
        assert_eq!(unlisted_imports(source), vec!["numpy", "pandas"]);
    }

    #[test]
    fn test_parse_tool_source() {
        let parsed = ToolSource::parse(SAMPLE).unwrap();
        assert_eq!(parsed.class_name, "WordCounterTool");
        assert_eq!(parsed.name, "word_counter");
        assert_eq!(parsed.description, "Counts the words in args.");
    }

    #[test]
    fn test_parse_rejects_missing_parts() {
        let no_class = "name = 'x'\n";
        assert!(matches!(
            ToolSource::parse(no_class),
            Err(GenerationError::MalformedSource(_))
        ));

        let no_name = "class Thing:\n    description = 'd'\n";
        assert!(matches!(
            ToolSource::parse(no_name),
            Err(GenerationError::MalformedSource(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unsafe_names() {
        let source = "class Evil:\n    name = '../../etc/evil'\n";
        assert!(matches!(
            ToolSource::parse(source),
            Err(GenerationError::MalformedSource(msg)) if msg.contains("snake_case")
        ));
    }

    #[test]
    fn test_parse_rejects_reserved_names() {
        for reserved in RESERVED_TOOL_NAMES {
            let source = format!("class Shadow:\n    name = \"{reserved}\"\n");
            assert!(matches!(
                ToolSource::parse(&source),
                Err(GenerationError::MalformedSource(msg)) if msg.contains("reserved")
            ));
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```python\nx = 1\n```"), "x = 1");
        assert_eq!(strip_code_fences("```\nx = 1\n```\n"), "x = 1");
        assert_eq!(strip_code_fences("  x = 1  "), "x = 1");
    }
}
