//! package.json parser

use crate::parser::traits::{ParseError, Parser};
use crate::parser::types::{Dependency, DependencyKind};
use tracing::{debug, warn};

/// Parser for package.json files
pub struct PackageJsonParser;

impl PackageJsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PackageJsonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PackageJsonParser {
    fn parse(&self, content: &str) -> Result<Vec<Dependency>, ParseError> {
        let mut parser = tree_sitter::Parser::new();
        let language = tree_sitter_json::LANGUAGE;
        parser.set_language(&language.into()).map_err(|e| {
            warn!("Failed to set JSON language for tree-sitter: {}", e);
            ParseError::TreeSitter(e.to_string())
        })?;

        let tree = parser.parse(content, None).ok_or_else(|| {
            warn!("Failed to parse JSON content");
            ParseError::ParseFailed("Failed to parse JSON".to_string())
        })?;

        let root = tree.root_node();
        let mut results = Vec::new();

        if let Some(document) = root.child(0)
            && document.kind() == "object"
        {
            self.extract_dependencies(document, content, &mut results);
        }

        Ok(results)
    }
}

/// `npm:<name>@<range>` alias split into the real name and the range
#[derive(Debug, PartialEq, Eq)]
struct NpmAlias<'a> {
    name: &'a str,
    range: &'a str,
    /// Byte offset of `range` inside the aliased value
    range_offset: usize,
}

impl PackageJsonParser {
    /// Parse npm alias format: npm:package@version or npm:@scope/package@version
    fn parse_npm_alias(value: &str) -> Option<NpmAlias<'_>> {
        let rest = value.strip_prefix("npm:")?;

        // The separating @ comes after the scope's slash for scoped packages
        let search_from = if rest.starts_with('@') {
            rest.find('/')? + 1
        } else {
            0
        };
        let at_pos = search_from + rest[search_from..].find('@')?;

        Some(NpmAlias {
            name: &rest[..at_pos],
            range: &rest[at_pos + 1..],
            range_offset: "npm:".len() + at_pos + 1,
        })
    }

    /// Extract dependencies from the root object
    fn extract_dependencies(
        &self,
        object_node: tree_sitter::Node,
        content: &str,
        results: &mut Vec<Dependency>,
    ) {
        let mut cursor = object_node.walk();

        for child in object_node.children(&mut cursor) {
            if child.kind() != "pair" {
                continue;
            }

            let Some(key_node) = child.child_by_field_name("key") else {
                continue;
            };

            let key_text = self.get_string_value(key_node, content);

            let Some(kind) = DependencyKind::from_field_name(&key_text) else {
                continue;
            };

            let Some(value_node) = child.child_by_field_name("value") else {
                continue;
            };

            if value_node.kind() == "object" {
                self.extract_packages_from_object(value_node, kind, content, results);
            }
        }
    }

    /// Extract packages from a dependency object (e.g., "dependencies": { ... })
    fn extract_packages_from_object(
        &self,
        object_node: tree_sitter::Node,
        kind: DependencyKind,
        content: &str,
        results: &mut Vec<Dependency>,
    ) {
        let mut cursor = object_node.walk();

        for child in object_node.children(&mut cursor) {
            if child.kind() != "pair" {
                continue;
            }

            let Some(key_node) = child.child_by_field_name("key") else {
                continue;
            };

            let Some(value_node) = child.child_by_field_name("value") else {
                continue;
            };

            if value_node.kind() != "string" {
                continue;
            }

            let key_name = self.get_string_value(key_node, content);
            let raw_range = self.get_string_value(value_node, content);

            let start_point = value_node.start_position();
            // The range starts after the opening quote
            let mut range_start = value_node.start_byte() + 1;
            let mut range_column = start_point.column + 1;

            let (name, declared_range) = if raw_range.starts_with("npm:") {
                let Some(alias) = Self::parse_npm_alias(&raw_range) else {
                    debug!("Skipping {}: alias without version", key_name);
                    continue;
                };
                range_start += alias.range_offset;
                range_column += alias.range_offset;
                (alias.name.to_string(), alias.range.to_string())
            } else {
                (key_name, raw_range.clone())
            };

            results.push(Dependency {
                name,
                start_offset: range_start,
                end_offset: range_start + declared_range.len(),
                declared_range,
                kind,
                line: start_point.row,
                column: range_column,
            });
        }
    }

    /// Get the string value from a string node (removes quotes)
    fn get_string_value(&self, node: tree_sitter::Node, content: &str) -> String {
        let text = &content[node.byte_range()];
        text.trim()
            .trim_start_matches('"')
            .trim_end_matches('"')
            .to_string()
    }
}
