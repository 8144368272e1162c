//! Cursor pagination over the read API

use yume_core::RpcError;

use crate::{DynamicFieldInfo, ReadApi, Result, SuiObject};

/// Upper bound on pages walked in one traversal
pub const MAX_PAGES: usize = 1_000;

/// Collect every dynamic field entry of `parent_id`, page by page.
///
/// Stops when the node reports no further pages. A page that claims more
/// data but returns no cursor, or repeats the previous cursor, ends the
/// walk instead of looping.
pub async fn collect_dynamic_fields<R: ReadApi + ?Sized>(
    api: &R,
    parent_id: &str,
    page_size: usize,
) -> Result<Vec<DynamicFieldInfo>> {
    let mut entries = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = api
            .get_dynamic_fields(parent_id, cursor.as_deref(), page_size)
            .await?;
        entries.extend(page.data);

        if !page.has_next_page {
            return Ok(entries);
        }
        match page.next_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => {
                tracing::warn!(
                    parent_id,
                    collected = entries.len(),
                    "Dynamic field pagination returned no new cursor, stopping"
                );
                return Ok(entries);
            }
        }
    }

    Err(RpcError::ApiError {
        message: format!("dynamic fields of {parent_id} exceeded {MAX_PAGES} pages"),
    })
}

/// Collect every object of `struct_type` owned by `owner`.
pub async fn collect_owned_objects<R: ReadApi + ?Sized>(
    api: &R,
    owner: &str,
    struct_type: &str,
    page_size: usize,
) -> Result<Vec<SuiObject>> {
    let mut objects = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let page = api
            .get_owned_objects(owner, struct_type, cursor.as_deref(), page_size)
            .await?;
        objects.extend(page.data);

        if !page.has_next_page {
            return Ok(objects);
        }
        match page.next_cursor {
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => return Ok(objects),
        }
    }

    Err(RpcError::ApiError {
        message: format!("owned objects of {owner} exceeded {MAX_PAGES} pages"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryReadApi;
    use serde_json::json;

    fn api_with_entries(n: usize) -> InMemoryReadApi {
        let api = InMemoryReadApi::new();
        for i in 0..n {
            api.insert_dynamic_field("0xtable", &format!("0xe{i}"), json!(i.to_string()), json!({}));
        }
        api
    }

    #[tokio::test]
    async fn test_collects_across_pages() {
        let api = api_with_entries(120);
        let entries = collect_dynamic_fields(&api, "0xtable", 50).await.unwrap();
        assert_eq!(entries.len(), 120);
        assert_eq!(entries[0].object_id, "0xe0");
        assert_eq!(entries[119].object_id, "0xe119");
        assert_eq!(api.dynamic_field_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_parent_is_one_call() {
        let api = InMemoryReadApi::new();
        let entries = collect_dynamic_fields(&api, "0xnothing", 50).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(api.dynamic_field_calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_propagates() {
        let api = api_with_entries(3);
        api.set_failing(true);
        let result = collect_dynamic_fields(&api, "0xtable", 50).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_owned_objects_filtered_by_type() {
        let api = InMemoryReadApi::new();
        api.insert_owned("0xme", "0xp::position::LoanPosition", "0xpos1", json!({}));
        api.insert_owned("0xme", "0xp::other::Thing", "0xthing", json!({}));
        api.insert_owned("0xyou", "0xp::position::LoanPosition", "0xpos2", json!({}));

        let objects = collect_owned_objects(&api, "0xme", "0xp::position::LoanPosition", 50)
            .await
            .unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].object_id, "0xpos1");
    }
}
