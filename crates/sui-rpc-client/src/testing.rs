//! In-memory [`ReadApi`] for tests
//!
//! Objects, dynamic fields and owned objects are inserted directly; pages are
//! served in insertion order with the entry's object id as cursor. Call
//! counters let tests assert how many requests a reader issued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use yume_core::RpcError;

use crate::{
    DynamicFieldInfo, DynamicFieldName, DynamicFieldPage, ObjectPage, ReadApi, Result, SuiObject,
};

#[derive(Default)]
pub struct InMemoryReadApi {
    objects: Mutex<HashMap<String, SuiObject>>,
    dynamic_fields: Mutex<HashMap<String, Vec<DynamicFieldInfo>>>,
    owned: Mutex<Vec<(String, SuiObject)>>,
    failing: AtomicBool,
    object_calls: AtomicUsize,
    dynamic_field_calls: AtomicUsize,
    owned_calls: AtomicUsize,
}

impl InMemoryReadApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object's content fields
    pub fn insert_object(&self, object_id: &str, object_type: &str, fields: Value) {
        let object = SuiObject {
            object_id: object_id.to_string(),
            object_type: Some(object_type.to_string()),
            owner: None,
            fields,
        };
        lock(&self.objects).insert(object_id.to_string(), object);
    }

    pub fn remove_object(&self, object_id: &str) {
        lock(&self.objects).remove(object_id);
    }

    /// Attach a dynamic field to `parent_id` and store its field object.
    pub fn insert_dynamic_field(&self, parent_id: &str, entry_id: &str, name: Value, fields: Value) {
        let info = DynamicFieldInfo {
            name: DynamicFieldName {
                type_name: "u64".to_string(),
                value: name,
            },
            object_id: entry_id.to_string(),
            object_type: "DynamicField".to_string(),
        };
        lock(&self.dynamic_fields)
            .entry(parent_id.to_string())
            .or_default()
            .push(info);
        self.insert_object(entry_id, "0x2::dynamic_field::Field", fields);
    }

    /// Attach a dynamic field whose key is a named struct (e.g. a balance slot).
    pub fn insert_named_field(&self, parent_id: &str, entry_id: &str, key_type: &str, fields: Value) {
        let info = DynamicFieldInfo {
            name: DynamicFieldName {
                type_name: key_type.to_string(),
                value: Value::Object(Default::default()),
            },
            object_id: entry_id.to_string(),
            object_type: "DynamicField".to_string(),
        };
        lock(&self.dynamic_fields)
            .entry(parent_id.to_string())
            .or_default()
            .push(info);
        self.insert_object(entry_id, "0x2::dynamic_field::Field", fields);
    }

    pub fn insert_owned(&self, owner: &str, object_type: &str, object_id: &str, fields: Value) {
        let object = SuiObject {
            object_id: object_id.to_string(),
            object_type: Some(object_type.to_string()),
            owner: Some(serde_json::json!({ "AddressOwner": owner })),
            fields,
        };
        lock(&self.owned).push((owner.to_string(), object));
    }

    /// Make every call fail with an API error until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn object_calls(&self) -> usize {
        self.object_calls.load(Ordering::SeqCst)
    }

    pub fn dynamic_field_calls(&self) -> usize {
        self.dynamic_field_calls.load(Ordering::SeqCst)
    }

    pub fn owned_calls(&self) -> usize {
        self.owned_calls.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcError::ApiError {
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serve `items` after the position of `cursor`, `limit` at a time.
fn page_after<T: Clone>(
    items: &[T],
    cursor: Option<&str>,
    limit: usize,
    id_of: impl Fn(&T) -> &str,
) -> (Vec<T>, Option<String>, bool) {
    let start = match cursor {
        Some(c) => items
            .iter()
            .position(|item| id_of(item) == c)
            .map(|i| i + 1)
            .unwrap_or(items.len()),
        None => 0,
    };
    let end = (start + limit.max(1)).min(items.len());
    let slice = items[start..end].to_vec();
    let next = slice.last().map(|item| id_of(item).to_string());
    (slice, next, end < items.len())
}

#[async_trait]
impl ReadApi for InMemoryReadApi {
    async fn get_object(&self, object_id: &str) -> Result<Option<SuiObject>> {
        self.object_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        Ok(lock(&self.objects).get(object_id).cloned())
    }

    async fn get_dynamic_fields(
        &self,
        parent_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<DynamicFieldPage> {
        self.dynamic_field_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let fields = lock(&self.dynamic_fields);
        let items = fields.get(parent_id).map(Vec::as_slice).unwrap_or(&[]);
        let (data, next_cursor, has_next_page) =
            page_after(items, cursor, limit, |f| f.object_id.as_str());
        Ok(DynamicFieldPage {
            data,
            next_cursor,
            has_next_page,
        })
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<ObjectPage> {
        self.owned_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;
        let matching: Vec<SuiObject> = lock(&self.owned)
            .iter()
            .filter(|(o, obj)| o == owner && obj.object_type.as_deref() == Some(struct_type))
            .map(|(_, obj)| obj.clone())
            .collect();
        let (data, next_cursor, has_next_page) =
            page_after(&matching, cursor, limit, |o| o.object_id.as_str());
        Ok(ObjectPage {
            data,
            next_cursor,
            has_next_page,
        })
    }
}
