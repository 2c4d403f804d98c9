//! Structural edits on a snapshot.
//!
//! A [`ProjectEdit`] changes exactly one node of a [`NodeIndex`]: it adds a
//! subtree, removes a subtree, or replaces the attributes of a type, function
//! or variable. Because every index entry holds its subtree by value, each
//! edit finishes by rebuilding the chain of ancestors up to the unit, so that
//! every parent keeps a faithful copy of its live children.
//!
//! Edits are atomic: all checks run before the index is touched, so a failed
//! edit leaves the index as it was.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{LensError, Result};
use crate::id;
use crate::list_edit::ListEdit;
use crate::model::{Function, NodeKind, SourceNode, Type, Variable};
use crate::set_edit::SetEdit;
use crate::tree::NodeIndex;

// ============================================================================
// Ancestor Propagation
// ============================================================================

/// Checks that every ancestor of `id` is indexed.
fn check_ancestors(index: &NodeIndex, id: &str) -> Result<()> {
    let mut current = id;
    while let Some(parent) = id::parent_id(current) {
        if !index.contains(parent) {
            return Err(LensError::ParentNotFound {
                id: current.to_string(),
                parent: parent.to_string(),
            });
        }
        current = parent;
    }
    Ok(())
}

/// Rebuilds every ancestor of `id` from the current index entries.
///
/// Each parent drops its stale copy of the child and takes the current one,
/// or none if the child was removed.
fn update_ancestors(index: &mut NodeIndex, id: &str) -> Result<()> {
    let mut child_id = id.to_string();
    while let Some(parent_id) = id::parent_id(&child_id) {
        let child = index.get(&child_id).cloned();
        let parent = index
            .get_mut(parent_id)
            .ok_or_else(|| LensError::ParentNotFound {
                id: child_id.clone(),
                parent: parent_id.to_string(),
            })?;
        parent.update_child(&child_id, child)?;
        child_id = parent_id.to_string();
    }
    Ok(())
}

// ============================================================================
// Add / Remove
// ============================================================================

/// Adds a node together with its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAddNode")]
pub struct AddNode {
    node: SourceNode,
}

#[derive(Deserialize)]
struct RawAddNode {
    node: SourceNode,
}

impl TryFrom<RawAddNode> for AddNode {
    type Error = LensError;

    fn try_from(raw: RawAddNode) -> Result<Self> {
        AddNode::new(raw.node)
    }
}

impl AddNode {
    /// Create an edit adding `node`; the whole subtree is validated.
    pub fn new(node: impl Into<SourceNode>) -> Result<Self> {
        let node = node.into();
        node.validate()?;
        Ok(AddNode { node })
    }

    pub fn id(&self) -> &str {
        self.node.id()
    }

    pub fn node(&self) -> &SourceNode {
        &self.node
    }

    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        let id = self.node.id();
        if index.contains(id) {
            return Err(LensError::NodeExists { id: id.to_string() });
        }
        if let Some(parent_id) = id::parent_id(id) {
            let parent = index.get(parent_id).ok_or_else(|| LensError::ParentNotFound {
                id: id.to_string(),
                parent: parent_id.to_string(),
            })?;
            if !parent.kind().can_contain(self.node.kind()) {
                return Err(LensError::InvalidParent {
                    id: id.to_string(),
                    parent: parent_id.to_string(),
                    parent_kind: parent.kind(),
                    child_kind: self.node.kind(),
                });
            }
            check_ancestors(index, parent_id)?;
        }
        index.insert_subtree(self.node.clone());
        update_ancestors(index, id)
    }
}

/// Removes a node together with its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRemoveNode")]
pub struct RemoveNode {
    id: String,
}

#[derive(Deserialize)]
struct RawRemoveNode {
    id: String,
}

impl TryFrom<RawRemoveNode> for RemoveNode {
    type Error = LensError;

    fn try_from(raw: RawRemoveNode) -> Result<Self> {
        RemoveNode::new(raw.id)
    }
}

impl RemoveNode {
    /// Create an edit removing the node at `id`.
    ///
    /// Fails with an argument error if `id` is not a valid node id.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !id::is_valid_node_id(&id) {
            return Err(LensError::invalid_args(format!("invalid node id '{}'", id)));
        }
        Ok(RemoveNode { id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        if !index.contains(&self.id) {
            return Err(LensError::not_found(&self.id));
        }
        check_ancestors(index, &self.id)?;
        index.remove_subtree(&self.id);
        update_ancestors(index, &self.id)
    }
}

// ============================================================================
// Attribute Edits
// ============================================================================

/// Changes the modifiers and supertypes of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEditType")]
pub struct EditType {
    id: String,
    /// Edits on the modifier set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifier_edits: Vec<SetEdit<String>>,
    /// Edits on the supertype set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supertype_edits: Vec<SetEdit<String>>,
}

#[derive(Deserialize)]
struct RawEditType {
    id: String,
    #[serde(default)]
    modifier_edits: Vec<SetEdit<String>>,
    #[serde(default)]
    supertype_edits: Vec<SetEdit<String>>,
}

impl TryFrom<RawEditType> for EditType {
    type Error = LensError;

    fn try_from(raw: RawEditType) -> Result<Self> {
        Ok(EditType::new(raw.id)?
            .with_modifier_edits(raw.modifier_edits)
            .with_supertype_edits(raw.supertype_edits))
    }
}

impl EditType {
    /// Create an empty edit of the type at `id`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !id::is_valid_type_id(&id) {
            return Err(LensError::invalid_id(NodeKind::Type, id));
        }
        Ok(EditType {
            id,
            modifier_edits: Vec::new(),
            supertype_edits: Vec::new(),
        })
    }

    pub fn with_modifier_edits(mut self, edits: Vec<SetEdit<String>>) -> Self {
        self.modifier_edits = edits;
        self
    }

    pub fn with_supertype_edits(mut self, edits: Vec<SetEdit<String>>) -> Self {
        self.supertype_edits = edits;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this edit changes nothing.
    pub fn is_empty(&self) -> bool {
        self.modifier_edits.is_empty() && self.supertype_edits.is_empty()
    }

    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        let ty = index.get_as::<Type>(&self.id)?;
        let modifiers = SetEdit::apply(ty.modifiers(), &self.modifier_edits)?;
        let supertypes = SetEdit::apply(ty.supertypes(), &self.supertype_edits)?;
        let edited = ty.with_signature(modifiers, supertypes);
        check_ancestors(index, &self.id)?;
        index.replace(edited.into());
        update_ancestors(index, &self.id)
    }
}

/// Changes the modifiers, parameter order and body of a function.
///
/// Parameter edits apply to the list of parameter *names*. The resulting
/// names must name every existing parameter exactly once: parameters are
/// created and destroyed with [`AddNode`] and [`RemoveNode`], this edit only
/// reorders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEditFunction")]
pub struct EditFunction {
    id: String,
    /// Edits on the modifier set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifier_edits: Vec<SetEdit<String>>,
    /// Edits on the list of parameter names.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameter_edits: Vec<ListEdit<String>>,
    /// Edits on the body lines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub body_edits: Vec<ListEdit<String>>,
}

#[derive(Deserialize)]
struct RawEditFunction {
    id: String,
    #[serde(default)]
    modifier_edits: Vec<SetEdit<String>>,
    #[serde(default)]
    parameter_edits: Vec<ListEdit<String>>,
    #[serde(default)]
    body_edits: Vec<ListEdit<String>>,
}

impl TryFrom<RawEditFunction> for EditFunction {
    type Error = LensError;

    fn try_from(raw: RawEditFunction) -> Result<Self> {
        Ok(EditFunction::new(raw.id)?
            .with_modifier_edits(raw.modifier_edits)
            .with_parameter_edits(raw.parameter_edits)
            .with_body_edits(raw.body_edits))
    }
}

impl EditFunction {
    /// Create an empty edit of the function at `id`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !id::is_valid_function_id(&id) {
            return Err(LensError::invalid_id(NodeKind::Function, id));
        }
        Ok(EditFunction {
            id,
            modifier_edits: Vec::new(),
            parameter_edits: Vec::new(),
            body_edits: Vec::new(),
        })
    }

    pub fn with_modifier_edits(mut self, edits: Vec<SetEdit<String>>) -> Self {
        self.modifier_edits = edits;
        self
    }

    pub fn with_parameter_edits(mut self, edits: Vec<ListEdit<String>>) -> Self {
        self.parameter_edits = edits;
        self
    }

    pub fn with_body_edits(mut self, edits: Vec<ListEdit<String>>) -> Self {
        self.body_edits = edits;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.modifier_edits.is_empty() && self.parameter_edits.is_empty() && self.body_edits.is_empty()
    }

    /// Resolves the edited parameter names against the live parameters.
    fn resolve_parameters(&self, index: &NodeIndex, function: &Function) -> Result<Vec<Variable>> {
        let names = ListEdit::apply(&function.parameter_names(), &self.parameter_edits)?;
        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(names.len());
        for name in &names {
            let parameter_id = id::parameter_id(&self.id, name);
            let parameter = index
                .get(&parameter_id)
                .and_then(|node| node.cast::<Variable>().ok())
                .ok_or_else(|| LensError::UnresolvedParameter {
                    function: self.id.clone(),
                    name: name.clone(),
                })?;
            if !seen.insert(name.as_str()) {
                return Err(LensError::ParameterMismatch {
                    function: self.id.clone(),
                    message: format!("parameter '{}' is listed twice", name),
                });
            }
            parameters.push(parameter.clone());
        }
        if parameters.len() != function.parameters().len() {
            return Err(LensError::ParameterMismatch {
                function: self.id.clone(),
                message: format!(
                    "expected {} parameters, got {}",
                    function.parameters().len(),
                    parameters.len()
                ),
            });
        }
        Ok(parameters)
    }

    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        let function = index.get_as::<Function>(&self.id)?;
        let modifiers = SetEdit::apply(function.modifiers(), &self.modifier_edits)?;
        let parameters = self.resolve_parameters(index, function)?;
        let body = ListEdit::apply(function.body(), &self.body_edits)?;
        let edited = function.with_parts(modifiers, parameters, body);
        check_ancestors(index, &self.id)?;
        index.replace(edited.into());
        update_ancestors(index, &self.id)
    }
}

/// Changes the modifiers and initializer of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEditVariable")]
pub struct EditVariable {
    id: String,
    /// Edits on the modifier set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifier_edits: Vec<SetEdit<String>>,
    /// Edits on the initializer lines.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub initializer_edits: Vec<ListEdit<String>>,
}

#[derive(Deserialize)]
struct RawEditVariable {
    id: String,
    #[serde(default)]
    modifier_edits: Vec<SetEdit<String>>,
    #[serde(default)]
    initializer_edits: Vec<ListEdit<String>>,
}

impl TryFrom<RawEditVariable> for EditVariable {
    type Error = LensError;

    fn try_from(raw: RawEditVariable) -> Result<Self> {
        Ok(EditVariable::new(raw.id)?
            .with_modifier_edits(raw.modifier_edits)
            .with_initializer_edits(raw.initializer_edits))
    }
}

impl EditVariable {
    /// Create an empty edit of the variable at `id`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if !id::is_valid_variable_id(&id) {
            return Err(LensError::invalid_id(NodeKind::Variable, id));
        }
        Ok(EditVariable {
            id,
            modifier_edits: Vec::new(),
            initializer_edits: Vec::new(),
        })
    }

    pub fn with_modifier_edits(mut self, edits: Vec<SetEdit<String>>) -> Self {
        self.modifier_edits = edits;
        self
    }

    pub fn with_initializer_edits(mut self, edits: Vec<ListEdit<String>>) -> Self {
        self.initializer_edits = edits;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.modifier_edits.is_empty() && self.initializer_edits.is_empty()
    }

    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        let variable = index.get_as::<Variable>(&self.id)?;
        let modifiers = SetEdit::apply(variable.modifiers(), &self.modifier_edits)?;
        let initializer = ListEdit::apply(variable.initializer(), &self.initializer_edits)?;
        let edited = variable.with_parts(modifiers, initializer);
        check_ancestors(index, &self.id)?;
        index.replace(edited.into());
        update_ancestors(index, &self.id)
    }
}

// ============================================================================
// ProjectEdit
// ============================================================================

/// An atomic change to one node of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProjectEdit {
    AddNode(AddNode),
    RemoveNode(RemoveNode),
    EditType(EditType),
    EditFunction(EditFunction),
    EditVariable(EditVariable),
}

impl ProjectEdit {
    /// Id of the node this edit targets.
    pub fn id(&self) -> &str {
        match self {
            ProjectEdit::AddNode(e) => e.id(),
            ProjectEdit::RemoveNode(e) => e.id(),
            ProjectEdit::EditType(e) => e.id(),
            ProjectEdit::EditFunction(e) => e.id(),
            ProjectEdit::EditVariable(e) => e.id(),
        }
    }

    /// Path of the unit containing the target node.
    pub fn source_path(&self) -> &str {
        id::source_path(self.id())
    }

    /// Apply this edit to `index`, then rebuild the target's ancestors.
    ///
    /// On error `index` is unchanged.
    pub fn apply_on(&self, index: &mut NodeIndex) -> Result<()> {
        match self {
            ProjectEdit::AddNode(e) => e.apply_on(index),
            ProjectEdit::RemoveNode(e) => e.apply_on(index),
            ProjectEdit::EditType(e) => e.apply_on(index),
            ProjectEdit::EditFunction(e) => e.apply_on(index),
            ProjectEdit::EditVariable(e) => e.apply_on(index),
        }
    }
}

impl From<AddNode> for ProjectEdit {
    fn from(edit: AddNode) -> Self {
        ProjectEdit::AddNode(edit)
    }
}

impl From<RemoveNode> for ProjectEdit {
    fn from(edit: RemoveNode) -> Self {
        ProjectEdit::RemoveNode(edit)
    }
}

impl From<EditType> for ProjectEdit {
    fn from(edit: EditType) -> Self {
        ProjectEdit::EditType(edit)
    }
}

impl From<EditFunction> for ProjectEdit {
    fn from(edit: EditFunction) -> Self {
        ProjectEdit::EditFunction(edit)
    }
}

impl From<EditVariable> for ProjectEdit {
    fn from(edit: EditVariable) -> Self {
        ProjectEdit::EditVariable(edit)
    }
}

// ============================================================================
// Node Diff
// ============================================================================

fn set_diff(before: &BTreeSet<String>, after: &BTreeSet<String>) -> Vec<SetEdit<String>> {
    SetEdit::diff(before, after)
}

/// Returns the attribute edit turning `before` into `after`.
///
/// Children are not compared; they are handled by their own edits. Returns
/// `None` if the attributes are equal (units have none). Fails with an
/// argument error if the nodes have different ids or kinds.
pub fn diff_node(before: &SourceNode, after: &SourceNode) -> Result<Option<ProjectEdit>> {
    if before.id() != after.id() || before.kind() != after.kind() {
        return Err(LensError::IdMismatch {
            before: before.id().to_string(),
            after: after.id().to_string(),
        });
    }
    let edit: ProjectEdit = match (before, after) {
        (SourceNode::Type(b), SourceNode::Type(a)) => {
            let edit = EditType::new(b.id())?
                .with_modifier_edits(set_diff(b.modifiers(), a.modifiers()))
                .with_supertype_edits(set_diff(b.supertypes(), a.supertypes()));
            if edit.is_empty() {
                return Ok(None);
            }
            edit.into()
        }
        (SourceNode::Function(b), SourceNode::Function(a)) => {
            let edit = EditFunction::new(b.id())?
                .with_modifier_edits(set_diff(b.modifiers(), a.modifiers()))
                .with_parameter_edits(ListEdit::diff(&b.parameter_names(), &a.parameter_names()))
                .with_body_edits(ListEdit::diff(b.body(), a.body()));
            if edit.is_empty() {
                return Ok(None);
            }
            edit.into()
        }
        (SourceNode::Variable(b), SourceNode::Variable(a)) => {
            let edit = EditVariable::new(b.id())?
                .with_modifier_edits(set_diff(b.modifiers(), a.modifiers()))
                .with_initializer_edits(ListEdit::diff(b.initializer(), a.initializer()));
            if edit.is_empty() {
                return Ok(None);
            }
            edit.into()
        }
        _ => return Ok(None),
    };
    Ok(Some(edit))
}

// ============================================================================
// Tests
// ============================================================================
