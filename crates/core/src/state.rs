// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed, namespaced view over a `Store`
//!
//! A `State<T>` maps each field of `T` onto a field of one store hash. Reads
//! of fields that were never written fall back to the matching field of the
//! `defaults` record, so `dump` always yields a complete `T`.

use crate::store::{SharedStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

pub struct State<T> {
    store: SharedStore,
    namespace: String,
    defaults: Map<String, Value>,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for State<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("namespace", &self.namespace)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl<T: Serialize + DeserializeOwned> State<T> {
    /// Bind a store to a namespace
    ///
    /// `defaults` must serialize to a map (a struct with named fields).
    pub fn new(
        store: SharedStore,
        namespace: impl Into<String>,
        defaults: T,
    ) -> Result<Self, StoreError> {
        let namespace = namespace.into();
        if namespace.is_empty() {
            return Err(StoreError::InvalidState(
                "namespace is required to create a state".to_string(),
            ));
        }
        let defaults = match serde_json::to_value(defaults)? {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidState(format!(
                    "state defaults must be a record, got {other}"
                )))
            }
        };
        Ok(Self {
            store,
            namespace,
            defaults,
            _record: PhantomData,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    fn check_field(&self, field: &str) -> Result<(), StoreError> {
        if self.defaults.contains_key(field) {
            Ok(())
        } else {
            Err(StoreError::InvalidState(format!(
                "{} has no field named {field}",
                self.namespace
            )))
        }
    }

    /// Read a field, falling back to its default
    pub async fn get<V: DeserializeOwned>(&self, field: &str) -> Result<V, StoreError> {
        self.check_field(field)?;
        let value = match self.store.hget(&self.namespace, field).await? {
            Some(value) => value,
            None => self.defaults.get(field).cloned().unwrap_or(Value::Null),
        };
        Ok(serde_json::from_value(value)?)
    }

    pub async fn set<V: Serialize>(&self, field: &str, value: V) -> Result<(), StoreError> {
        self.check_field(field)?;
        let value = serde_json::to_value(value)?;
        self.store.hset(&self.namespace, field, value).await
    }

    /// Atomically increment a counter field; returns the new value
    pub async fn incr(&self, field: &str) -> Result<i64, StoreError> {
        self.check_field(field)?;
        self.store.hincr(&self.namespace, field).await
    }

    /// Atomically decrement a counter field; returns the new value
    pub async fn decr(&self, field: &str) -> Result<i64, StoreError> {
        self.check_field(field)?;
        self.store.hdecr(&self.namespace, field).await
    }

    /// Drop every stored field so reads return the defaults again
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.store.del(&self.namespace).await
    }

    /// Materialize the full record
    pub async fn dump(&self) -> Result<T, StoreError> {
        let mut record = self.defaults.clone();
        for (field, value) in self.store.hgetall(&self.namespace).await? {
            if record.contains_key(&field) {
                record.insert(field, value);
            }
        }
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
