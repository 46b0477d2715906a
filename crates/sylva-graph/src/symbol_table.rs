use std::collections::HashMap;
use sylva_core::facts::ValueRef;
use sylva_core::{FileFacts, NodeId, NodeKind};

/// What a name is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Parameter,
    Function,
    Class,
    Import,
}

/// One declaration visible by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: NodeId,
    pub kind: SymbolKind,
    /// Lexical container the name is declared in.
    pub container: NodeId,
    /// Function a variable is initialized with (`const f = () => {}`).
    pub function: Option<NodeId>,
    /// Class a variable is initialized with (`const C = class {}`).
    pub class: Option<NodeId>,
}

/// A per-file symbol table for resolving same-file references.
///
/// Maps names to the declarations that bind them, each tagged with its
/// lexical container. Lookups walk the container chain from the innermost
/// container outward.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    /// Map of name to every declaration of that name, in source order.
    by_name: HashMap<String, Vec<Symbol>>,

    /// Map of container to its enclosing container.
    parents: HashMap<NodeId, NodeId>,
}

impl SymbolTable {
    /// Creates a new empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every name-binding declaration of a file.
    pub fn from_facts(facts: &FileFacts) -> Self {
        let mut table = Self::new();

        for function in &facts.functions {
            table.set_parent(function.id.clone(), function.container.clone());
            if function.binds_name {
                table.insert(&function.name, Symbol {
                    id: function.id.clone(),
                    kind: SymbolKind::Function,
                    container: function.container.clone(),
                    function: None,
                    class: None,
                });
            }
        }
        for class in &facts.classes {
            table.set_parent(class.id.clone(), class.container.clone());
            if class.binds_name {
                table.insert(&class.name, Symbol {
                    id: class.id.clone(),
                    kind: SymbolKind::Class,
                    container: class.container.clone(),
                    function: None,
                    class: None,
                });
            }
        }
        for scope in &facts.scopes {
            table.set_parent(scope.id.clone(), scope.parent.clone());
        }
        for variable in &facts.variables {
            let (function, class) = match &variable.init {
                Some(ValueRef::Node { id, kind }) if kind.is_callable() => (Some(id.clone()), None),
                Some(ValueRef::Node { id, kind: NodeKind::Class }) => (None, Some(id.clone())),
                _ => (None, None),
            };
            table.insert(&variable.name, Symbol {
                id: variable.id.clone(),
                kind: SymbolKind::Variable,
                container: variable.container.clone(),
                function,
                class,
            });
        }
        for parameter in &facts.parameters {
            table.insert(&parameter.name, Symbol {
                id: parameter.id.clone(),
                kind: SymbolKind::Parameter,
                container: parameter.function.clone(),
                function: None,
                class: None,
            });
        }
        for import in &facts.imports {
            if import.kind == sylva_core::facts::ImportKind::SideEffect {
                continue;
            }
            table.insert(&import.local, Symbol {
                id: import.id.clone(),
                kind: SymbolKind::Import,
                container: facts.module.id.clone(),
                function: None,
                class: None,
            });
        }

        table
    }

    /// Registers a symbol.
    pub fn insert(&mut self, name: &str, symbol: Symbol) {
        self.by_name.entry(name.to_string()).or_default().push(symbol);
    }

    /// Records the enclosing container of a container.
    pub fn set_parent(&mut self, container: NodeId, parent: NodeId) {
        self.parents.insert(container, parent);
    }

    /// Resolves `name` as seen from `container`.
    ///
    /// At each level of the chain, local declarations win over parameters.
    pub fn resolve(&self, name: &str, container: &NodeId) -> Option<&Symbol> {
        let candidates = self.by_name.get(name)?;
        let mut current = Some(container);
        // Container chains are acyclic; the bound only guards malformed input.
        let mut remaining = self.parents.len() + 1;

        while let Some(level) = current {
            let at_level = |parameters: bool| {
                candidates.iter().find(|s| {
                    &s.container == level && (s.kind == SymbolKind::Parameter) == parameters
                })
            };
            if let Some(symbol) = at_level(false).or_else(|| at_level(true)) {
                return Some(symbol);
            }
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            current = self.parents.get(level);
        }
        None
    }

    /// The enclosing container of a container.
    pub fn parent(&self, container: &NodeId) -> Option<&NodeId> {
        self.parents.get(container)
    }

    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
