//! Terse construction of source nodes.
//!
//! Builders take simple names and signatures and derive qualified ids from
//! the enclosing builder, which keeps fixtures short:
//!
//! ```
//! use tuglens_core::builder::{FunctionBuilder, TypeBuilder, UnitBuilder};
//!
//! let unit = UnitBuilder::new("src/Main.java")
//!     .ty(TypeBuilder::new("Main")
//!         .modifiers(["public"])
//!         .function(FunctionBuilder::new("getVersion(String)").parameter("name")))
//!     .build()
//!     .unwrap();
//! assert_eq!(unit.entities()[0].id(), "src/Main.java:Main");
//! ```

use std::collections::BTreeSet;

use crate::error::Result;
use crate::id;
use crate::model::{Function, SourceEntity, SourceUnit, Type, Variable};

fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> impl Iterator<Item = String> {
    values.into_iter().map(Into::into)
}

#[derive(Debug, Clone)]
enum EntityBuilder {
    Type(TypeBuilder),
    Function(FunctionBuilder),
    Variable(VariableBuilder),
}

impl EntityBuilder {
    fn build(self, parent: &str) -> Result<SourceEntity> {
        Ok(match self {
            EntityBuilder::Type(b) => b.build(parent)?.into(),
            EntityBuilder::Function(b) => b.build(parent)?.into(),
            EntityBuilder::Variable(b) => b.build(parent)?.into(),
        })
    }
}

/// Builds a [`SourceUnit`].
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    path: String,
    entities: Vec<EntityBuilder>,
}

impl UnitBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        UnitBuilder {
            path: path.into(),
            entities: Vec::new(),
        }
    }

    pub fn ty(mut self, ty: TypeBuilder) -> Self {
        self.entities.push(EntityBuilder::Type(ty));
        self
    }

    pub fn function(mut self, function: FunctionBuilder) -> Self {
        self.entities.push(EntityBuilder::Function(function));
        self
    }

    pub fn variable(mut self, variable: VariableBuilder) -> Self {
        self.entities.push(EntityBuilder::Variable(variable));
        self
    }

    pub fn build(self) -> Result<SourceUnit> {
        let entities = self
            .entities
            .into_iter()
            .map(|e| e.build(&self.path))
            .collect::<Result<Vec<_>>>()?;
        SourceUnit::new(self.path, entities)
    }
}

/// Builds a [`Type`] under a parent id.
#[derive(Debug, Clone)]
pub struct TypeBuilder {
    name: String,
    modifiers: BTreeSet<String>,
    supertypes: BTreeSet<String>,
    members: Vec<EntityBuilder>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TypeBuilder {
            name: name.into(),
            modifiers: BTreeSet::new(),
            supertypes: BTreeSet::new(),
            members: Vec::new(),
        }
    }

    pub fn modifiers<S: Into<String>>(mut self, modifiers: impl IntoIterator<Item = S>) -> Self {
        self.modifiers.extend(strings(modifiers));
        self
    }

    pub fn supertypes<S: Into<String>>(mut self, supertypes: impl IntoIterator<Item = S>) -> Self {
        self.supertypes.extend(strings(supertypes));
        self
    }

    pub fn ty(mut self, ty: TypeBuilder) -> Self {
        self.members.push(EntityBuilder::Type(ty));
        self
    }

    pub fn function(mut self, function: FunctionBuilder) -> Self {
        self.members.push(EntityBuilder::Function(function));
        self
    }

    pub fn variable(mut self, variable: VariableBuilder) -> Self {
        self.members.push(EntityBuilder::Variable(variable));
        self
    }

    pub fn build(self, parent: &str) -> Result<Type> {
        let id = id::type_id(parent, &self.name);
        let members = self
            .members
            .into_iter()
            .map(|m| m.build(&id))
            .collect::<Result<Vec<_>>>()?;
        Type::new(id, self.modifiers, self.supertypes, members)
    }
}

/// Builds a [`Function`] under a parent id.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    signature: String,
    modifiers: BTreeSet<String>,
    parameters: Vec<VariableBuilder>,
    body: Vec<String>,
}

impl FunctionBuilder {
    pub fn new(signature: impl Into<String>) -> Self {
        FunctionBuilder {
            signature: signature.into(),
            modifiers: BTreeSet::new(),
            parameters: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn modifiers<S: Into<String>>(mut self, modifiers: impl IntoIterator<Item = S>) -> Self {
        self.modifiers.extend(strings(modifiers));
        self
    }

    /// Append a parameter without modifiers.
    pub fn parameter(self, name: impl Into<String>) -> Self {
        self.parameter_with(VariableBuilder::new(name))
    }

    /// Append a fully specified parameter.
    pub fn parameter_with(mut self, parameter: VariableBuilder) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn body<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.body.extend(strings(lines));
        self
    }

    pub fn build(self, parent: &str) -> Result<Function> {
        let id = id::function_id(parent, &self.signature);
        let parameters = self
            .parameters
            .into_iter()
            .map(|p| p.build(&id))
            .collect::<Result<Vec<_>>>()?;
        Function::new(id, self.modifiers, parameters, self.body)
    }
}

/// Builds a [`Variable`] under a parent id.
#[derive(Debug, Clone)]
pub struct VariableBuilder {
    name: String,
    modifiers: BTreeSet<String>,
    initializer: Vec<String>,
}

impl VariableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        VariableBuilder {
            name: name.into(),
            modifiers: BTreeSet::new(),
            initializer: Vec::new(),
        }
    }

    pub fn modifiers<S: Into<String>>(mut self, modifiers: impl IntoIterator<Item = S>) -> Self {
        self.modifiers.extend(strings(modifiers));
        self
    }

    pub fn initializer<S: Into<String>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.initializer.extend(strings(lines));
        self
    }

    pub fn build(self, parent: &str) -> Result<Variable> {
        Variable::new(id::variable_id(parent, &self.name), self.modifiers, self.initializer)
    }
}
