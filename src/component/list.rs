//! Ordered component collection enforcing unique, non-null membership.

use crate::error::{MicrocosmError, MicrocosmResult};

use super::{BoxedComponent, Component, ComponentSlot};

/// An ordered sequence of components with unique names.
///
/// The checked mutators ([`ComponentList::push`], [`ComponentList::insert`],
/// [`ComponentList::replace`]) reject unnamed components and duplicate
/// names. Null slots can only enter through [`ComponentList::from_slots`],
/// which exists so wiring code assembled from factories can be validated at
/// setup time rather than silently dropped.
#[derive(Default)]
pub struct ComponentList {
    slots: Vec<ComponentSlot>,
}

impl ComponentList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Wraps pre-assembled slots without validation. Duplicate names are
    /// rejected before the manager touches the list; null entries surface
    /// when the drain dequeues them.
    #[must_use]
    pub fn from_slots(slots: Vec<ComponentSlot>) -> Self {
        Self { slots }
    }

    /// Appends a component.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::NamelessComponent`] when the component
    /// reports an empty name and [`MicrocosmError::DuplicateName`] when a
    /// live member already uses the name.
    pub fn push(&mut self, component: BoxedComponent) -> MicrocosmResult<()> {
        self.check_admissible(component.as_ref(), None)?;
        self.slots.push(Some(component));
        Ok(())
    }

    /// Inserts a component at `index`, shifting later members. An index
    /// equal to the length appends; one less inserts before the end.
    ///
    /// # Errors
    ///
    /// As [`ComponentList::push`], plus [`MicrocosmError::MissingValue`]
    /// when `index` is out of range.
    pub fn insert(&mut self, index: usize, component: BoxedComponent) -> MicrocosmResult<()> {
        if index > self.slots.len() {
            return Err(out_of_range(index));
        }
        self.check_admissible(component.as_ref(), None)?;
        self.slots.insert(index, Some(component));
        Ok(())
    }

    /// Replaces the member at `index`. The outgoing member's name is exempt
    /// from the duplicate check, so replacing a component with a same-named
    /// successor is allowed.
    ///
    /// # Errors
    ///
    /// As [`ComponentList::push`], plus [`MicrocosmError::MissingValue`]
    /// when `index` is out of range.
    pub fn replace(&mut self, index: usize, component: BoxedComponent) -> MicrocosmResult<()> {
        if index >= self.slots.len() {
            return Err(out_of_range(index));
        }
        self.check_admissible(component.as_ref(), Some(index))?;
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(component);
        }
        Ok(())
    }

    /// Appends every component in `components`, stopping at the first
    /// rejection.
    ///
    /// # Errors
    ///
    /// As [`ComponentList::push`].
    pub fn extend_checked<I>(&mut self, components: I) -> MicrocosmResult<()>
    where
        I: IntoIterator<Item = BoxedComponent>,
    {
        for component in components {
            self.push(component)?;
        }
        Ok(())
    }

    /// Removes and returns the first slot, or `None` when the list is
    /// empty. This is the worklist drain primitive.
    pub fn pop_front(&mut self) -> Option<ComponentSlot> {
        if self.slots.is_empty() {
            None
        } else {
            Some(self.slots.remove(0))
        }
    }

    /// Whether a live member uses `name`.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.components().any(|component| component.name() == name)
    }

    /// Names of live members, in list order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.components().map(Component::name).collect()
    }

    /// Iterates over live members, skipping null slots.
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_deref())
    }

    /// Number of slots, null placeholders included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the list holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check_admissible(
        &self,
        component: &dyn Component,
        exempt: Option<usize>,
    ) -> MicrocosmResult<()> {
        if component.name().is_empty() {
            return Err(MicrocosmError::NamelessComponent);
        }
        let duplicate = self.slots.iter().enumerate().any(|(position, slot)| {
            exempt != Some(position)
                && slot
                    .as_deref()
                    .is_some_and(|member| member.name() == component.name())
        });
        if duplicate {
            return Err(MicrocosmError::DuplicateName {
                name: component.name().to_owned(),
            });
        }
        Ok(())
    }
}

fn out_of_range(index: usize) -> MicrocosmError {
    MicrocosmError::MissingValue {
        key: format!("component list index {index}"),
    }
}
