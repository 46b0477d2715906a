//! Import and export declarations.

use super::context::{has_token, named_children, unquote, AnalysisContext};
use super::declarations::Declared;
use crate::facts::{ExportFact, ExportKind, ImportFact, ImportKind, ValueRef};
use crate::node::NodeKind;
use tree_sitter::Node;

impl<'s> AnalysisContext<'s> {
    pub(crate) fn visit_import(&mut self, node: Node<'_>) {
        let Some(source_node) = node.child_by_field_name("source") else {
            self.facts.note_unsupported("import");
            return;
        };
        let source = unquote(self.text(source_node));
        let type_only = has_token(node, "type");

        let clause = named_children(node)
            .into_iter()
            .find(|child| child.kind() == "import_clause");
        let Some(clause) = clause else {
            self.push_import(
                source.clone(),
                None,
                &source,
                ImportKind::SideEffect,
                type_only,
                source_node,
            );
            return;
        };

        for part in named_children(clause) {
            match part.kind() {
                "identifier" => {
                    let local = self.text(part).to_string();
                    self.push_import(
                        local,
                        Some("default".to_string()),
                        &source,
                        ImportKind::Default,
                        type_only,
                        part,
                    );
                }
                "namespace_import" => {
                    if let Some(alias) = named_children(part).into_iter().next() {
                        let local = self.text(alias).to_string();
                        self.push_import(
                            local,
                            Some("*".to_string()),
                            &source,
                            ImportKind::Namespace,
                            type_only,
                            alias,
                        );
                    }
                }
                "named_imports" => {
                    for specifier in named_children(part) {
                        if specifier.kind() != "import_specifier" {
                            continue;
                        }
                        let Some(name) = specifier.child_by_field_name("name") else {
                            continue;
                        };
                        let alias = specifier.child_by_field_name("alias");
                        let binding = alias.unwrap_or(name);
                        let imported = unquote(self.text(name));
                        let local = self.text(binding).to_string();
                        let specifier_type_only = type_only || has_token(specifier, "type");
                        self.push_import(
                            local,
                            Some(imported),
                            &source,
                            ImportKind::Named,
                            specifier_type_only,
                            binding,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn push_import(
        &mut self,
        local: String,
        imported: Option<String>,
        source: &str,
        kind: ImportKind,
        type_only: bool,
        binding: Node<'_>,
    ) {
        let id = self.tracker.unique_id(NodeKind::Import, &local);
        self.facts.imports.push(ImportFact {
            id,
            local,
            imported,
            source: source.to_string(),
            kind,
            type_only,
            position: self.position(binding),
            offset: binding.start_byte(),
        });
    }

    pub(crate) fn visit_export(&mut self, node: Node<'_>) {
        let type_only = has_token(node, "type");
        let is_default = has_token(node, "default");
        let source = node
            .child_by_field_name("source")
            .map(|s| unquote(self.text(s)));

        if let Some(declaration) = node.child_by_field_name("declaration") {
            let declared = self.visit_exported_declaration(declaration);
            for binding in declared {
                let (exported, kind) = if is_default {
                    ("default".to_string(), ExportKind::Default)
                } else {
                    (binding.name.clone(), ExportKind::Named)
                };
                self.push_export(
                    exported,
                    kind,
                    Some(ValueRef::node(binding.id, binding.kind)),
                    None,
                    None,
                    type_only,
                    declaration,
                );
            }
            return;
        }

        if let Some(value) = node.child_by_field_name("value") {
            let local = self.value_of(value);
            self.push_export(
                "default".to_string(),
                ExportKind::Default,
                Some(local),
                None,
                None,
                type_only,
                value,
            );
            return;
        }

        let clause = named_children(node)
            .into_iter()
            .find(|child| child.kind() == "export_clause");
        if let Some(clause) = clause {
            for specifier in named_children(clause) {
                if specifier.kind() != "export_specifier" {
                    continue;
                }
                let Some(name) = specifier.child_by_field_name("name") else {
                    continue;
                };
                let alias = specifier.child_by_field_name("alias");
                let local_name = unquote(self.text(name));
                let exported = alias
                    .map(|a| unquote(self.text(a)))
                    .unwrap_or_else(|| local_name.clone());
                let specifier_type_only = type_only || has_token(specifier, "type");
                match &source {
                    Some(source) => self.push_export(
                        exported,
                        ExportKind::ReExport,
                        None,
                        Some(local_name),
                        Some(source.clone()),
                        specifier_type_only,
                        specifier,
                    ),
                    None => {
                        let local = self.identifier(name);
                        self.push_export(
                            exported,
                            ExportKind::Named,
                            Some(local),
                            None,
                            None,
                            specifier_type_only,
                            specifier,
                        )
                    }
                }
            }
            return;
        }

        let Some(source) = source else {
            self.facts.note_unsupported("export");
            return;
        };
        let namespace = named_children(node)
            .into_iter()
            .find(|child| child.kind() == "namespace_export");
        match namespace.and_then(|ns| named_children(ns).into_iter().next()) {
            // `export * as ns from './m'`
            Some(alias) => {
                let exported = unquote(self.text(alias));
                self.push_export(
                    exported,
                    ExportKind::ReExport,
                    None,
                    Some("*".to_string()),
                    Some(source),
                    type_only,
                    alias,
                );
            }
            None => self.push_export(
                "*".to_string(),
                ExportKind::ReExportAll,
                None,
                Some("*".to_string()),
                Some(source),
                type_only,
                node,
            ),
        }
    }

    fn visit_exported_declaration(&mut self, declaration: Node<'_>) -> Vec<Declared> {
        match declaration.kind() {
            "function_declaration" | "generator_function_declaration" | "function_expression"
            | "function" | "generator_function" => {
                let id = self.visit_function(declaration, None);
                let name = self.function_name(&id);
                vec![Declared {
                    name,
                    id,
                    kind: NodeKind::Function,
                }]
            }
            "class_declaration" | "abstract_class_declaration" | "class" => {
                let id = self.visit_class(declaration, None);
                let name = self
                    .facts
                    .classes
                    .iter()
                    .rev()
                    .find(|c| c.id == id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                vec![Declared {
                    name,
                    id,
                    kind: NodeKind::Class,
                }]
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_declaration(declaration)
            }
            _ => {
                self.visit(declaration);
                Vec::new()
            }
        }
    }

    fn function_name(&self, id: &crate::id::NodeId) -> String {
        self.facts
            .functions
            .iter()
            .rev()
            .find(|f| &f.id == id)
            .map(|f| f.name.clone())
            .unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    fn push_export(
        &mut self,
        exported: String,
        kind: ExportKind,
        local: Option<ValueRef>,
        imported: Option<String>,
        source: Option<String>,
        type_only: bool,
        node: Node<'_>,
    ) {
        let id = self.tracker.unique_id(NodeKind::Export, &exported);
        self.facts.exports.push(ExportFact {
            id,
            exported,
            kind,
            local,
            imported,
            source,
            type_only,
            position: self.position(node),
            offset: node.start_byte(),
        });
    }
}
