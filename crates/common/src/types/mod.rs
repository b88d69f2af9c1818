use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Pointer to an adjacent page, echoed back with the limit that was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: u64,
    pub limit: u64,
}

/// Pagination block of a list response. `next`/`prev` are omitted from the
/// JSON entirely when there is no page in that direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

impl PageLinks {
    /// `next` exists iff records remain past the current page,
    /// `prev` exists iff the current page is not the first.
    /// Saturating: the caller may pass arbitrarily large page numbers.
    pub fn for_page(page: u64, limit: u64, total: u64) -> Self {
        let mut links = PageLinks::default();
        if page.saturating_mul(limit) < total {
            links.next = Some(PageRef { page: page.saturating_add(1), limit });
        }
        if page > 1 {
            links.prev = Some(PageRef { page: page - 1, limit });
        }
        links
    }
}

/// Uniform response envelope: `{success, data?, count?, pagination?, message?}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PageLinks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), count: None, pagination: None, message: None }
    }

    pub fn list(data: T, count: u64, pagination: PageLinks) -> Self {
        Self { success: true, data: Some(data), count: Some(count), pagination: Some(pagination), message: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { success: false, data: None, count: None, pagination: None, message: Some(message.into()) }
    }
}
