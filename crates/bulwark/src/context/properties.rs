// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;

/// A typed key into the property bag of a [`ResilienceContext`][crate::ResilienceContext].
///
/// Keys are compared by name. Reading a value through a key of a different type yields `None`.
pub struct PropertyKey<V> {
    name: Cow<'static, str>,
    _value: PhantomData<fn() -> V>,
}

impl<V> PropertyKey<V> {
    /// Creates a key with a static name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _value: PhantomData,
        }
    }

    /// Creates a key with a name computed at runtime.
    #[must_use]
    pub fn with_name(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            _value: PhantomData,
        }
    }

    /// The name of the key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<V> Clone for PropertyKey<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _value: PhantomData,
        }
    }
}

impl<V> Debug for PropertyKey<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PropertyKey").field(&self.name).finish()
    }
}

#[derive(Default)]
pub(crate) struct Properties(HashMap<Cow<'static, str>, Box<dyn Any + Send + Sync>>);

impl Properties {
    pub(crate) fn set<V: Send + Sync + 'static>(&mut self, key: &PropertyKey<V>, value: V) {
        self.0.insert(key.name.clone(), Box::new(value));
    }

    pub(crate) fn get<V: 'static>(&self, key: &PropertyKey<V>) -> Option<&V> {
        self.0.get(key.name()).and_then(|value| value.downcast_ref::<V>())
    }

    pub(crate) fn remove<V: 'static>(&mut self, key: &PropertyKey<V>) -> Option<V> {
        // A value of another type stays where it is.
        if self.get(key).is_none() {
            return None;
        }

        self.0
            .remove(key.name())
            .and_then(|value| value.downcast::<V>().ok())
            .map(|value| *value)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_access() {
        let mut properties = Properties::default();
        let count = PropertyKey::<u32>::new("count");
        let count_as_text = PropertyKey::<String>::new("count");

        properties.set(&count, 7);

        assert_eq!(properties.get(&count), Some(&7));
        assert_eq!(properties.get(&count_as_text), None);
        assert_eq!(properties.remove(&count_as_text), None);
        assert!(properties.contains("count"));
        assert_eq!(properties.remove(&count), Some(7));
        assert_eq!(properties.len(), 0);
    }

    #[test]
    fn runtime_names() {
        let mut properties = Properties::default();
        let key = PropertyKey::<bool>::with_name(format!("flag-{}", 1));

        properties.set(&key, true);
        properties.clear();

        assert_eq!(key.name(), "flag-1");
        assert_eq!(properties.get(&key), None);
        assert_eq!(format!("{:?}", key.clone()), "PropertyKey(\"flag-1\")");
    }
}
