use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::embed::FeatureVector;
use crate::error::LensError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassId(pub u32);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stored exemplar. The store owns the vector for the rest of the session
/// or until `clear_all`.
#[derive(Debug)]
pub struct ClassExample {
    pub class_id: ClassId,
    pub vector: FeatureVector,
}

/// Per-class count for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassSummary {
    pub id: ClassId,
    pub label: String,
    pub examples: usize,
}

#[derive(Debug)]
struct ClassEntry {
    label: String,
    examples: Vec<ClassExample>,
}

/// Append-only exemplar store, reset only by `clear_all`.
///
/// All stored vectors share one dimensionality, fixed by the first example
/// added after construction or a clear.
#[derive(Debug, Default)]
pub struct ExemplarStore {
    classes: BTreeMap<ClassId, ClassEntry>,
    next_id: u32,
    dims: Option<usize>,
    total: usize,
}

impl ExemplarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_class(&mut self, label: impl Into<String>) -> ClassId {
        let id = ClassId(self.next_id);
        self.next_id += 1;
        self.classes.insert(
            id,
            ClassEntry {
                label: label.into(),
                examples: Vec::new(),
            },
        );
        id
    }

    pub fn is_declared(&self, id: ClassId) -> bool {
        self.classes.contains_key(&id)
    }

    pub fn label(&self, id: ClassId) -> Option<&str> {
        self.classes.get(&id).map(|entry| entry.label.as_str())
    }

    /// Append an exemplar, taking ownership of the vector. Returns the
    /// class's new example count.
    pub fn add_example(&mut self, class_id: ClassId, vector: FeatureVector) -> Result<usize, LensError> {
        let dims = self.dims;
        let entry = self
            .classes
            .get_mut(&class_id)
            .ok_or(LensError::UnknownClass(class_id))?;
        match dims {
            Some(expected) if expected != vector.len() => {
                return Err(LensError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            None if vector.is_empty() => {
                return Err(LensError::DimensionMismatch {
                    expected: 1,
                    actual: 0,
                });
            }
            _ => {}
        }
        self.dims = Some(vector.len());
        entry.examples.push(ClassExample { class_id, vector });
        self.total += 1;
        Ok(entry.examples.len())
    }

    /// Empty every class at once. Declared classes stay declared.
    pub fn clear_all(&mut self) {
        for entry in self.classes.values_mut() {
            entry.examples.clear();
        }
        self.total = 0;
        self.dims = None;
    }

    pub fn count(&self, id: ClassId) -> usize {
        self.classes.get(&id).map_or(0, |entry| entry.examples.len())
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Declared classes in declaration order.
    pub fn classes(&self) -> Vec<ClassSummary> {
        self.classes
            .iter()
            .map(|(id, entry)| ClassSummary {
                id: *id,
                label: entry.label.clone(),
                examples: entry.examples.len(),
            })
            .collect()
    }

    /// Classes with at least one exemplar, with their exemplars.
    pub(crate) fn populated(&self) -> impl Iterator<Item = (ClassId, &str, &[ClassExample])> {
        self.classes
            .iter()
            .filter(|(_, entry)| !entry.examples.is_empty())
            .map(|(id, entry)| (*id, entry.label.as_str(), entry.examples.as_slice()))
    }
}
