//! Opaque per-object context storage.
//!
//! Each runtime object (engine handle, vector, pointwise kernel, operator)
//! carries exactly one [`ContextSlot`] where a backend — or the caller, for
//! physics constants — can stash private state behind a typed accessor.
//!
//! Replacing a context never drops the previous value silently: [`set`]
//! returns it, so ownership is handed back explicitly rather than leaked.
//!
//! [`set`]: ContextSlot::set

use std::any::Any;

/// Boxed context payload. `Send` so objects can migrate between threads
/// under external serialization.
pub type ContextData = Box<dyn Any + Send>;

/// One opaque state slot, owned exclusively by its object.
#[derive(Default)]
pub struct ContextSlot {
    data: Option<ContextData>,
}

impl ContextSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value`, returning the previously stored payload if any.
    pub fn set<T: Any + Send>(&mut self, value: T) -> Option<ContextData> {
        self.data.replace(Box::new(value))
    }

    /// Typed view of the stored payload. `None` if the slot is empty or
    /// holds a different type.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.data.as_ref()?.downcast_ref()
    }

    /// Typed mutable view of the stored payload.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.data.as_mut()?.downcast_mut()
    }

    /// Removes and returns the payload, leaving the slot empty.
    pub fn take(&mut self) -> Option<ContextData> {
        self.data.take()
    }

    /// Whether any payload is stored.
    pub fn is_set(&self) -> bool {
        self.data.is_some()
    }
}

impl core::fmt::Debug for ContextSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContextSlot")
            .field("set", &self.is_set())
            .finish()
    }
}
