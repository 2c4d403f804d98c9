//! Source node model: units, types, functions and variables.
//!
//! A snapshot is a forest of [`SourceUnit`]s, one per file path. Units and
//! types contain member entities ([`SourceEntity`]); functions contain their
//! parameters; variables are leaves. Every node is an immutable value: an
//! edit replaces the node at an id with a new version instead of mutating it.
//!
//! # Canonical Order
//!
//! Members of units and types are a *set*: they are kept sorted by id, so two
//! nodes with the same content compare equal no matter how they were built.
//! Function parameters are an ordered list.
//!
//! # Validation
//!
//! Constructors check the node's own id against its kind, that every child
//! id lives directly under the node, and that child ids are unique.
//! Deserialization goes through the same constructors, so a node read from
//! JSON is as trustworthy as one built in code. `validate()` re-checks a
//! whole subtree.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::id;

// ============================================================================
// Node Kind
// ============================================================================

/// The kind of a [`SourceNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Unit,
    Type,
    Function,
    Variable,
}

impl NodeKind {
    /// Whether a node of this kind can directly contain a node of `child`.
    pub fn can_contain(self, child: NodeKind) -> bool {
        match self {
            NodeKind::Unit | NodeKind::Type => child != NodeKind::Unit,
            NodeKind::Function => child == NodeKind::Variable,
            NodeKind::Variable => false,
        }
    }

    /// Whether `id` is well-formed for a node of this kind.
    pub fn is_valid_id(self, id: &str) -> bool {
        match self {
            NodeKind::Unit => id::is_valid_unit_id(id),
            NodeKind::Type => id::is_valid_type_id(id),
            NodeKind::Function => id::is_valid_function_id(id),
            NodeKind::Variable => id::is_valid_variable_id(id),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Unit => "unit",
            NodeKind::Type => "type",
            NodeKind::Function => "function",
            NodeKind::Variable => "variable",
        };
        write!(f, "{}", name)
    }
}

fn check_id(kind: NodeKind, id: &str) -> Result<()> {
    if kind.is_valid_id(id) {
        Ok(())
    } else {
        Err(LensError::invalid_id(kind, id))
    }
}

/// Checks that every child id is directly under `parent` and appears once.
fn check_children<'a>(parent: &str, child_ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for child in child_ids {
        if id::parent_id(child) != Some(parent) {
            return Err(LensError::invalid_args(format!(
                "'{}' is not a direct child of '{}'",
                child, parent
            )));
        }
        if !seen.insert(child) {
            return Err(LensError::DuplicateId {
                parent: parent.to_string(),
                id: child.to_string(),
            });
        }
    }
    Ok(())
}

fn sort_members(members: &mut [SourceEntity]) {
    members.sort_by(|a, b| a.id().cmp(b.id()));
}

/// Replaces or drops the member `child_id`, keeping the canonical order.
fn update_members(members: &mut Vec<SourceEntity>, child_id: &str, child: Option<SourceEntity>) {
    let position = members.binary_search_by(|m| m.id().cmp(child_id));
    match (position, child) {
        (Ok(i), Some(child)) => members[i] = child,
        (Ok(i), None) => {
            members.remove(i);
        }
        (Err(i), Some(child)) => members.insert(i, child),
        (Err(_), None) => {}
    }
}

// ============================================================================
// Source Unit
// ============================================================================

/// The root node of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawUnit")]
pub struct SourceUnit {
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    entities: Vec<SourceEntity>,
}

#[derive(Deserialize)]
struct RawUnit {
    path: String,
    #[serde(default)]
    entities: Vec<SourceEntity>,
}

impl TryFrom<RawUnit> for SourceUnit {
    type Error = LensError;

    fn try_from(raw: RawUnit) -> Result<Self> {
        SourceUnit::new(raw.path, raw.entities)
    }
}

impl SourceUnit {
    /// Create a unit at `path` containing `entities`.
    pub fn new(path: impl Into<String>, entities: Vec<SourceEntity>) -> Result<Self> {
        let mut unit = SourceUnit {
            path: path.into(),
            entities,
        };
        sort_members(&mut unit.entities);
        unit.check_shallow()?;
        Ok(unit)
    }

    /// Create a unit without entities.
    pub fn empty(path: impl Into<String>) -> Result<Self> {
        SourceUnit::new(path, Vec::new())
    }

    /// The unit id, which is its path.
    pub fn id(&self) -> &str {
        &self.path
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Top-level entities, in id order.
    pub fn entities(&self) -> &[SourceEntity] {
        &self.entities
    }

    fn check_shallow(&self) -> Result<()> {
        check_id(NodeKind::Unit, &self.path)?;
        check_children(&self.path, self.entities.iter().map(SourceEntity::id))?;
        if !self.entities.windows(2).all(|w| w[0].id() < w[1].id()) {
            return Err(LensError::invalid_args(format!(
                "entities of '{}' are not in canonical order",
                self.path
            )));
        }
        Ok(())
    }

    /// Validate this unit and its whole subtree.
    pub fn validate(&self) -> Result<()> {
        self.check_shallow()?;
        self.entities.iter().try_for_each(SourceEntity::validate)
    }
}

// ============================================================================
// Type
// ============================================================================

/// A type declaration (class, interface, struct, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawType")]
pub struct Type {
    id: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    modifiers: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    supertypes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    members: Vec<SourceEntity>,
}

#[derive(Deserialize)]
struct RawType {
    id: String,
    #[serde(default)]
    modifiers: BTreeSet<String>,
    #[serde(default)]
    supertypes: BTreeSet<String>,
    #[serde(default)]
    members: Vec<SourceEntity>,
}

impl TryFrom<RawType> for Type {
    type Error = LensError;

    fn try_from(raw: RawType) -> Result<Self> {
        Type::new(raw.id, raw.modifiers, raw.supertypes, raw.members)
    }
}

impl Type {
    /// Create a type; `members` may be given in any order.
    pub fn new(
        id: impl Into<String>,
        modifiers: BTreeSet<String>,
        supertypes: BTreeSet<String>,
        members: Vec<SourceEntity>,
    ) -> Result<Self> {
        let mut ty = Type {
            id: id.into(),
            modifiers,
            supertypes,
            members,
        };
        sort_members(&mut ty.members);
        ty.check_shallow()?;
        Ok(ty)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The type name (last id segment).
    pub fn name(&self) -> &str {
        id::simple_name(&self.id)
    }

    pub fn modifiers(&self) -> &BTreeSet<String> {
        &self.modifiers
    }

    pub fn supertypes(&self) -> &BTreeSet<String> {
        &self.supertypes
    }

    /// Member entities, in id order.
    pub fn members(&self) -> &[SourceEntity] {
        &self.members
    }

    /// Copy of this type with new modifiers and supertypes.
    pub(crate) fn with_signature(
        &self,
        modifiers: BTreeSet<String>,
        supertypes: BTreeSet<String>,
    ) -> Type {
        Type {
            id: self.id.clone(),
            modifiers,
            supertypes,
            members: self.members.clone(),
        }
    }

    fn check_shallow(&self) -> Result<()> {
        check_id(NodeKind::Type, &self.id)?;
        check_children(&self.id, self.members.iter().map(SourceEntity::id))?;
        if !self.members.windows(2).all(|w| w[0].id() < w[1].id()) {
            return Err(LensError::invalid_args(format!(
                "members of '{}' are not in canonical order",
                self.id
            )));
        }
        Ok(())
    }

    /// Validate this type and its whole subtree.
    pub fn validate(&self) -> Result<()> {
        self.check_shallow()?;
        self.members.iter().try_for_each(SourceEntity::validate)
    }
}

// ============================================================================
// Function
// ============================================================================

/// A function or method; its id ends with its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFunction")]
pub struct Function {
    id: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    modifiers: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<Variable>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    body: Vec<String>,
}

#[derive(Deserialize)]
struct RawFunction {
    id: String,
    #[serde(default)]
    modifiers: BTreeSet<String>,
    #[serde(default)]
    parameters: Vec<Variable>,
    #[serde(default)]
    body: Vec<String>,
}

impl TryFrom<RawFunction> for Function {
    type Error = LensError;

    fn try_from(raw: RawFunction) -> Result<Self> {
        Function::new(raw.id, raw.modifiers, raw.parameters, raw.body)
    }
}

impl Function {
    /// Create a function; `parameters` keep the given order.
    pub fn new(
        id: impl Into<String>,
        modifiers: BTreeSet<String>,
        parameters: Vec<Variable>,
        body: Vec<String>,
    ) -> Result<Self> {
        let function = Function {
            id: id.into(),
            modifiers,
            parameters,
            body,
        };
        function.check_shallow()?;
        Ok(function)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The function signature (last id segment).
    pub fn signature(&self) -> &str {
        id::simple_name(&self.id)
    }

    pub fn modifiers(&self) -> &BTreeSet<String> {
        &self.modifiers
    }

    pub fn parameters(&self) -> &[Variable] {
        &self.parameters
    }

    /// Parameter names in declaration order.
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn body(&self) -> &[String] {
        &self.body
    }

    pub(crate) fn with_parts(
        &self,
        modifiers: BTreeSet<String>,
        parameters: Vec<Variable>,
        body: Vec<String>,
    ) -> Function {
        Function {
            id: self.id.clone(),
            modifiers,
            parameters,
            body,
        }
    }

    fn check_shallow(&self) -> Result<()> {
        check_id(NodeKind::Function, &self.id)?;
        check_children(&self.id, self.parameters.iter().map(Variable::id))
    }

    /// Validate this function and its parameters.
    pub fn validate(&self) -> Result<()> {
        self.check_shallow()?;
        self.parameters.iter().try_for_each(Variable::validate)
    }
}

// ============================================================================
// Variable
// ============================================================================

/// A field, constant, local declaration or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVariable")]
pub struct Variable {
    id: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    modifiers: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    initializer: Vec<String>,
}

#[derive(Deserialize)]
struct RawVariable {
    id: String,
    #[serde(default)]
    modifiers: BTreeSet<String>,
    #[serde(default)]
    initializer: Vec<String>,
}

impl TryFrom<RawVariable> for Variable {
    type Error = LensError;

    fn try_from(raw: RawVariable) -> Result<Self> {
        Variable::new(raw.id, raw.modifiers, raw.initializer)
    }
}

impl Variable {
    pub fn new(
        id: impl Into<String>,
        modifiers: BTreeSet<String>,
        initializer: Vec<String>,
    ) -> Result<Self> {
        let variable = Variable {
            id: id.into(),
            modifiers,
            initializer,
        };
        variable.validate()?;
        Ok(variable)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The variable name (last id segment).
    pub fn name(&self) -> &str {
        id::simple_name(&self.id)
    }

    pub fn modifiers(&self) -> &BTreeSet<String> {
        &self.modifiers
    }

    pub fn initializer(&self) -> &[String] {
        &self.initializer
    }

    pub(crate) fn with_parts(&self, modifiers: BTreeSet<String>, initializer: Vec<String>) -> Variable {
        Variable {
            id: self.id.clone(),
            modifiers,
            initializer,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_id(NodeKind::Variable, &self.id)
    }
}

// ============================================================================
// Entities and Nodes
// ============================================================================

/// Any non-root node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceEntity {
    Type(Type),
    Function(Function),
    Variable(Variable),
}

impl SourceEntity {
    pub fn id(&self) -> &str {
        match self {
            SourceEntity::Type(t) => t.id(),
            SourceEntity::Function(f) => f.id(),
            SourceEntity::Variable(v) => v.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SourceEntity::Type(_) => NodeKind::Type,
            SourceEntity::Function(_) => NodeKind::Function,
            SourceEntity::Variable(_) => NodeKind::Variable,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SourceEntity::Type(t) => t.validate(),
            SourceEntity::Function(f) => f.validate(),
            SourceEntity::Variable(v) => v.validate(),
        }
    }
}

impl From<Type> for SourceEntity {
    fn from(ty: Type) -> Self {
        SourceEntity::Type(ty)
    }
}

impl From<Function> for SourceEntity {
    fn from(function: Function) -> Self {
        SourceEntity::Function(function)
    }
}

impl From<Variable> for SourceEntity {
    fn from(variable: Variable) -> Self {
        SourceEntity::Variable(variable)
    }
}

/// Any node of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceNode {
    Unit(SourceUnit),
    Type(Type),
    Function(Function),
    Variable(Variable),
}

impl SourceNode {
    pub fn id(&self) -> &str {
        match self {
            SourceNode::Unit(u) => u.id(),
            SourceNode::Type(t) => t.id(),
            SourceNode::Function(f) => f.id(),
            SourceNode::Variable(v) => v.id(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SourceNode::Unit(_) => NodeKind::Unit,
            SourceNode::Type(_) => NodeKind::Type,
            SourceNode::Function(_) => NodeKind::Function,
            SourceNode::Variable(_) => NodeKind::Variable,
        }
    }

    /// Ids of the direct children, in stored order.
    pub fn child_ids(&self) -> Vec<&str> {
        match self {
            SourceNode::Unit(u) => u.entities.iter().map(SourceEntity::id).collect(),
            SourceNode::Type(t) => t.members.iter().map(SourceEntity::id).collect(),
            SourceNode::Function(f) => f.parameters.iter().map(Variable::id).collect(),
            SourceNode::Variable(_) => Vec::new(),
        }
    }

    /// Owned copies of the direct children.
    pub fn children(&self) -> Vec<SourceNode> {
        match self {
            SourceNode::Unit(u) => u.entities.iter().cloned().map(SourceNode::from).collect(),
            SourceNode::Type(t) => t.members.iter().cloned().map(SourceNode::from).collect(),
            SourceNode::Function(f) => {
                f.parameters.iter().cloned().map(SourceNode::Variable).collect()
            }
            SourceNode::Variable(_) => Vec::new(),
        }
    }

    /// Downcast to a concrete node type.
    ///
    /// Fails with [`LensError::WrongKind`] if this node has another kind.
    pub fn cast<T: NodeType>(&self) -> Result<&T> {
        T::from_node(self).ok_or_else(|| LensError::WrongKind {
            id: self.id().to_string(),
            expected: T::KIND,
            actual: self.kind(),
        })
    }

    /// Validate this node and its whole subtree.
    pub fn validate(&self) -> Result<()> {
        match self {
            SourceNode::Unit(u) => u.validate(),
            SourceNode::Type(t) => t.validate(),
            SourceNode::Function(f) => f.validate(),
            SourceNode::Variable(v) => v.validate(),
        }
    }

    /// Drops the stale copy of child `child_id` and stores `child` in its
    /// place if the child still exists.
    ///
    /// Fails without modifying `self` if this node can't contain `child`.
    pub(crate) fn update_child(&mut self, child_id: &str, child: Option<SourceNode>) -> Result<()> {
        if let Some(child) = &child {
            if !self.kind().can_contain(child.kind()) {
                return Err(LensError::InvalidParent {
                    id: child.id().to_string(),
                    parent: self.id().to_string(),
                    parent_kind: self.kind(),
                    child_kind: child.kind(),
                });
            }
        }
        match self {
            SourceNode::Unit(u) => {
                update_members(&mut u.entities, child_id, child.and_then(SourceNode::into_entity))
            }
            SourceNode::Type(t) => {
                update_members(&mut t.members, child_id, child.and_then(SourceNode::into_entity))
            }
            SourceNode::Function(f) => {
                let position = f.parameters.iter().position(|p| p.id() == child_id);
                match (position, child) {
                    (Some(i), Some(SourceNode::Variable(v))) => f.parameters[i] = v,
                    (Some(i), None) => {
                        f.parameters.remove(i);
                    }
                    (None, Some(SourceNode::Variable(v))) => f.parameters.push(v),
                    _ => {}
                }
            }
            SourceNode::Variable(_) => {}
        }
        Ok(())
    }

    fn into_entity(self) -> Option<SourceEntity> {
        match self {
            SourceNode::Unit(_) => None,
            SourceNode::Type(t) => Some(SourceEntity::Type(t)),
            SourceNode::Function(f) => Some(SourceEntity::Function(f)),
            SourceNode::Variable(v) => Some(SourceEntity::Variable(v)),
        }
    }
}

impl From<SourceEntity> for SourceNode {
    fn from(entity: SourceEntity) -> Self {
        match entity {
            SourceEntity::Type(t) => SourceNode::Type(t),
            SourceEntity::Function(f) => SourceNode::Function(f),
            SourceEntity::Variable(v) => SourceNode::Variable(v),
        }
    }
}

impl From<SourceUnit> for SourceNode {
    fn from(unit: SourceUnit) -> Self {
        SourceNode::Unit(unit)
    }
}

impl From<Type> for SourceNode {
    fn from(ty: Type) -> Self {
        SourceNode::Type(ty)
    }
}

impl From<Function> for SourceNode {
    fn from(function: Function) -> Self {
        SourceNode::Function(function)
    }
}

impl From<Variable> for SourceNode {
    fn from(variable: Variable) -> Self {
        SourceNode::Variable(variable)
    }
}

// ============================================================================
// Typed Downcast
// ============================================================================

/// A concrete node type that a [`SourceNode`] can be downcast to.
pub trait NodeType {
    /// The kind tag of this node type.
    const KIND: NodeKind;

    /// Borrow `node` as `Self` if it has the matching kind.
    fn from_node(node: &SourceNode) -> Option<&Self>;
}

impl NodeType for SourceUnit {
    const KIND: NodeKind = NodeKind::Unit;

    fn from_node(node: &SourceNode) -> Option<&Self> {
        match node {
            SourceNode::Unit(u) => Some(u),
            _ => None,
        }
    }
}

impl NodeType for Type {
    const KIND: NodeKind = NodeKind::Type;

    fn from_node(node: &SourceNode) -> Option<&Self> {
        match node {
            SourceNode::Type(t) => Some(t),
            _ => None,
        }
    }
}

impl NodeType for Function {
    const KIND: NodeKind = NodeKind::Function;

    fn from_node(node: &SourceNode) -> Option<&Self> {
        match node {
            SourceNode::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl NodeType for Variable {
    const KIND: NodeKind = NodeKind::Variable;

    fn from_node(node: &SourceNode) -> Option<&Self> {
        match node {
            SourceNode::Variable(v) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
