//! Ordered collection of fields

use crate::field::{Field, FieldId, FieldMatcher};

/// Fields in attach order.
#[derive(Debug, Clone, Default)]
pub struct FieldBag {
    items: Vec<Field>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn push(&mut self, field: Field) {
        self.items.push(field);
    }

    /// Removes the field with this id, returning it.
    pub fn remove(&mut self, id: &FieldId) -> Option<Field> {
        let index = self.items.iter().position(|f| f.id() == id)?;
        Some(self.items.remove(index))
    }

    /// First field matching the matcher.
    pub fn find(&self, matcher: &FieldMatcher) -> Option<&Field> {
        self.items.iter().find(|f| f.matches(matcher))
    }

    /// First field matching any of the matchers.
    pub fn find_any(&self, matchers: &[FieldMatcher]) -> Option<&Field> {
        self.items
            .iter()
            .find(|f| matchers.iter().any(|m| f.matches(m)))
    }

    /// Mutable access to the first matching field.
    pub fn find_mut(&mut self, matcher: &FieldMatcher) -> Option<&mut Field> {
        self.items.iter_mut().find(|f| f.matches(matcher))
    }

    /// All fields matching the matcher, in order.
    pub fn filter(&self, matcher: &FieldMatcher) -> Vec<&Field> {
        self.items.iter().filter(|f| f.matches(matcher)).collect()
    }

    /// All fields matching any of the matchers, in order.
    pub fn filter_any(&self, matchers: &[FieldMatcher]) -> Vec<&Field> {
        self.items
            .iter()
            .filter(|f| matchers.iter().any(|m| f.matches(m)))
            .collect()
    }

    /// Field by exact id.
    pub fn get(&self, id: &FieldId) -> Option<&Field> {
        self.items.iter().find(|f| f.id() == id)
    }

    /// Mutable field by exact id.
    pub fn get_mut(&mut self, id: &FieldId) -> Option<&mut Field> {
        self.items.iter_mut().find(|f| f.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
