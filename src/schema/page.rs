//! Paginated result envelope produced by every search-style gateway call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of results plus the navigation facts the pager needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub pageindex: u64,
    #[serde(default)]
    pub pagesize: u64,
    #[serde(default)]
    pub has_previous_page: bool,
    #[serde(default)]
    pub has_next_page: bool,
}

impl<T> Default for PageData<T> {
    fn default() -> Self {
        PageData {
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
            pageindex: 0,
            pagesize: 0,
            has_previous_page: false,
            has_next_page: false,
        }
    }
}

impl<T> PageData<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Page index to request for the next page, when one exists.
    pub fn next_page_index(&self) -> Option<u64> {
        self.has_next_page.then(|| self.pageindex + 1)
    }

    /// Page index to request for the previous page, when one exists.
    pub fn previous_page_index(&self) -> Option<u64> {
        (self.has_previous_page && self.pageindex > 0).then(|| self.pageindex - 1)
    }
}

impl PageData<Value> {
    /// Decode a page envelope out of a loose JSON value. A bare array is
    /// accepted as a single complete page, which is what older gateway
    /// endpoints return.
    pub fn from_json(value: Value) -> anyhow::Result<Self> {
        match value {
            Value::Array(items) => {
                let count = items.len() as u64;
                Ok(PageData {
                    items,
                    total_count: count,
                    total_pages: 1,
                    pageindex: 0,
                    pagesize: count,
                    has_previous_page: false,
                    has_next_page: false,
                })
            }
            other => serde_json::from_value(other)
                .map_err(|err| anyhow::anyhow!("invalid page envelope: {err}")),
        }
    }

    pub fn row(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_full_envelope() {
        let page = PageData::from_json(json!({
            "items": [{"id": "1"}, {"id": "2"}],
            "total_count": 12,
            "total_pages": 6,
            "pageindex": 2,
            "pagesize": 2,
            "has_previous_page": true,
            "has_next_page": true
        }))
        .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page.total_count, 12);
        assert_eq!(page.next_page_index(), Some(3));
        assert_eq!(page.previous_page_index(), Some(1));
    }

    #[test]
    fn bare_array_is_one_complete_page() {
        let page = PageData::from_json(json!([{"id": "1"}])).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next_page);
        assert_eq!(page.next_page_index(), None);
    }

    #[test]
    fn last_page_has_no_next() {
        let page = PageData::from_json(json!({
            "items": [],
            "pageindex": 5,
            "has_previous_page": true,
            "has_next_page": false
        }))
        .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.next_page_index(), None);
        assert_eq!(page.previous_page_index(), Some(4));
    }
}
