//! JSON response envelope
//!
//! Every response body is wrapped as
//! `{"success": bool, "result": ..., "message": ...}`. Lists carry paging
//! metadata:
//!
//! ```json
//! {
//!     "success": true,
//!     "result": {
//!         "meta": {"limit": 20, "next": null, "offset": 0, "previous": null, "total_count": 2},
//!         "objects": [...]
//!     }
//! }
//! ```

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub result: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListMeta {
    pub limit: usize,
    pub next: Option<String>,
    pub offset: usize,
    pub previous: Option<String>,
    pub total_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ListResult<T> {
    pub meta: ListMeta,
    pub objects: Vec<T>,
}

/// Paging hints for [`list`]. Unset counts default to the page length.
#[derive(Debug, Default, Clone)]
pub struct Page {
    pub total_count: Option<usize>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub next_url: Option<String>,
    pub previous_url: Option<String>,
}

/// `success: true` with `data` as the result
pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        result: data,
        message: None,
    })
}

pub fn success_with_message<T: Serialize>(
    data: T,
    message: impl Into<String>,
) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        result: data,
        message: Some(message.into()),
    })
}

/// Wrap a page of objects with its metadata
pub fn list<T: Serialize>(objects: Vec<T>, page: Page) -> Json<Envelope<ListResult<T>>> {
    let total_count = page.total_count.unwrap_or(objects.len());
    let limit = page.limit.unwrap_or(total_count);

    Json(Envelope {
        success: true,
        result: ListResult {
            meta: ListMeta {
                limit,
                next: page.next_url,
                offset: page.offset,
                previous: page.previous_url,
                total_count,
            },
            objects,
        },
        message: None,
    })
}
