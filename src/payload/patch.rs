use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::foundation::error::{FleetError, FleetResult};

/// Incremental payload mutation addressed by a top-level field name.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Patch {
    /// Array-field edit (`{path, op, ...}`).
    Array(ArrayPatch),
    /// Whole-field replacement (`{path, value}`).
    Field(FieldPatch),
}

/// Replace one top-level field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FieldPatch {
    /// Field name.
    pub path: String,
    /// New value.
    pub value: Value,
}

/// Edit an array-valued top-level field.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArrayPatch {
    /// Append `values` at the end.
    Add {
        /// Field name.
        path: String,
        /// Elements to append.
        values: Vec<Value>,
    },
    /// Remove positions; indexes refer to the array before this patch.
    Remove {
        /// Field name.
        path: String,
        /// Positions to remove.
        indexes: Vec<usize>,
    },
    /// Overwrite a single element.
    Replace {
        /// Field name.
        path: String,
        /// Position to overwrite.
        index: usize,
        /// New element.
        value: Value,
    },
}

impl Patch {
    /// `{path, value}` patch.
    pub fn field(path: impl Into<String>, value: Value) -> Self {
        Self::Field(FieldPatch {
            path: path.into(),
            value,
        })
    }

    /// `{path, op: "add", values}` patch.
    pub fn add(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::Array(ArrayPatch::Add {
            path: path.into(),
            values,
        })
    }

    /// `{path, op: "remove", indexes}` patch.
    pub fn remove(path: impl Into<String>, indexes: Vec<usize>) -> Self {
        Self::Array(ArrayPatch::Remove {
            path: path.into(),
            indexes,
        })
    }

    /// `{path, op: "replace", index, value}` patch.
    pub fn replace(path: impl Into<String>, index: usize, value: Value) -> Self {
        Self::Array(ArrayPatch::Replace {
            path: path.into(),
            index,
            value,
        })
    }

    /// Field name this patch targets.
    pub fn path(&self) -> &str {
        match self {
            Self::Field(p) => &p.path,
            Self::Array(ArrayPatch::Add { path, .. })
            | Self::Array(ArrayPatch::Remove { path, .. })
            | Self::Array(ArrayPatch::Replace { path, .. }) => path,
        }
    }

    /// Return `true` for `op: "add"` patches.
    pub fn is_array_add(&self) -> bool {
        matches!(self, Self::Array(ArrayPatch::Add { .. }))
    }
}

/// Apply `patches` in order to a JSON object payload, in place.
///
/// Each patch is validated before it mutates anything, so a failing patch leaves the payload as
/// the previous patches left it.
pub fn apply_patches(target: &mut Value, patches: &[Patch]) -> FleetResult<()> {
    let obj = target
        .as_object_mut()
        .ok_or_else(|| FleetError::patch("payload is not an object"))?;
    for patch in patches {
        apply_one(obj, patch)?;
    }
    Ok(())
}

/// Apply `patches` to a typed payload by routing it through its JSON form.
pub fn apply_patches_to<P>(payload: &mut P, patches: &[Patch]) -> FleetResult<()>
where
    P: Serialize + DeserializeOwned,
{
    let mut doc = serde_json::to_value(&*payload)?;
    apply_patches(&mut doc, patches)?;
    *payload = serde_json::from_value(doc).map_err(|err| {
        FleetError::serde(format!("patched payload no longer matches its type: {err}"))
    })?;
    Ok(())
}

fn apply_one(obj: &mut Map<String, Value>, patch: &Patch) -> FleetResult<()> {
    let array = match patch {
        Patch::Field(FieldPatch { path, value }) => {
            obj.insert(path.clone(), value.clone());
            return Ok(());
        }
        Patch::Array(array) => array,
    };

    let path = patch.path();
    let items = obj
        .get_mut(path)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| {
            FleetError::patch(format!(
                "cannot apply array patch to non-array field '{path}'"
            ))
        })?;

    match array {
        ArrayPatch::Add { values, .. } => items.extend(values.iter().cloned()),
        ArrayPatch::Remove { indexes, .. } => {
            let mut order = indexes.clone();
            order.sort_unstable_by(|a, b| b.cmp(a));
            order.dedup();
            if let Some(&i) = order.first()
                && i >= items.len()
            {
                return Err(FleetError::patch(format!(
                    "remove index {i} out of bounds for '{path}' (len {})",
                    items.len()
                )));
            }
            for i in order {
                items.remove(i);
            }
        }
        ArrayPatch::Replace { index, value, .. } => {
            let len = items.len();
            let slot = items.get_mut(*index).ok_or_else(|| {
                FleetError::patch(format!(
                    "replace index {index} out of bounds for '{path}' (len {len})"
                ))
            })?;
            *slot = value.clone();
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/payload/patch.rs"]
mod tests;
