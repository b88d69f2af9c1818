//! List-endpoint query parsing.
//!
//! Translates raw query-string parameters into a typed `ListParams`:
//! reserved keys (`select`, `sort`, `page`, `limit`) are pulled out first,
//! every remaining key becomes an equality or operator filter. Operators use
//! the `field[op]=value` form and are recognized on the parsed key only, so
//! a value that happens to contain "gt" or "in" is never rewritten.

use std::collections::HashMap;

use common::types::PageLinks;
use serde_json::Value;

use crate::errors::ServiceError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 25;

const RESERVED: [&str; 4] = ["select", "sort", "page", "limit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl FilterOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl Filter {
    /// Comma-separated value list, used by the `in` operator.
    pub fn values(&self) -> Vec<&str> {
        self.value.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub filters: Vec<Filter>,
    pub select: Option<Vec<String>>,
    pub sort: Vec<SortKey>,
    pub page: u64,
    pub limit: u64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self { filters: Vec::new(), select: None, sort: Vec::new(), page: DEFAULT_PAGE, limit: DEFAULT_LIMIT }
    }
}

impl ListParams {
    pub fn from_query(raw: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let mut params = ListParams::default();

        if let Some(select) = raw.get("select") {
            let fields: Vec<String> = select
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !fields.is_empty() {
                params.select = Some(fields);
            }
        }

        if let Some(sort) = raw.get("sort") {
            for key in sort.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match key.strip_prefix('-') {
                    Some(field) => params.sort.push(SortKey { field: field.to_string(), descending: true }),
                    None => params.sort.push(SortKey { field: key.to_string(), descending: false }),
                }
            }
        }

        if let Some(page) = raw.get("page") {
            let parsed: u64 = page
                .parse()
                .map_err(|_| ServiceError::Validation(format!("invalid page: {page}")))?;
            params.page = parsed.max(1);
        }
        if let Some(limit) = raw.get("limit") {
            let parsed: u64 = limit
                .parse()
                .map_err(|_| ServiceError::Validation(format!("invalid limit: {limit}")))?;
            if parsed == 0 {
                return Err(ServiceError::Validation("limit must be >= 1".into()));
            }
            params.limit = parsed;
        }

        for (key, value) in raw {
            if RESERVED.contains(&key.as_str()) {
                continue;
            }
            params.filters.push(parse_filter(key, value)?);
        }
        // HashMap iteration order is arbitrary; keep filters deterministic
        params.filters.sort_by(|a, b| a.field.cmp(&b.field));

        Ok(params)
    }

    /// Zero-based row offset of the current page. Saturates: page and limit
    /// come straight off the query string and may be arbitrarily large.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn links(&self, total: u64) -> PageLinks {
        PageLinks::for_page(self.page, self.limit, total)
    }
}

/// Parse one `field` or `field[op]` query key into a filter. The operator is
/// read from the bracket suffix of the key, never from the value.
fn parse_filter(key: &str, value: &str) -> Result<Filter, ServiceError> {
    match key.split_once('[') {
        None => Ok(Filter { field: key.to_string(), op: FilterOp::Eq, value: value.to_string() }),
        Some((field, rest)) => {
            let token = rest
                .strip_suffix(']')
                .ok_or_else(|| ServiceError::Validation(format!("malformed filter key: {key}")))?;
            let op = FilterOp::parse(token)
                .ok_or_else(|| ServiceError::Validation(format!("unknown filter operator: {token}")))?;
            if field.is_empty() {
                return Err(ServiceError::Validation(format!("malformed filter key: {key}")));
            }
            Ok(Filter { field: field.to_string(), op, value: value.to_string() })
        }
    }
}

/// Apply a `select` projection to a serialized row, keeping `id` always.
pub fn apply_select(mut row: Value, select: Option<&[String]>) -> Value {
    let Some(fields) = select else { return row };
    if let Value::Object(ref mut map) = row {
        map.retain(|k, _| k == "id" || fields.iter().any(|f| f == k));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_when_query_is_empty() {
        let p = ListParams::from_query(&HashMap::new()).unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 25);
        assert!(p.filters.is_empty());
        assert!(p.select.is_none());
        assert!(p.sort.is_empty());
    }

    #[test]
    fn reserved_keys_do_not_become_filters() {
        let p = ListParams::from_query(&query(&[
            ("select", "name,province"),
            ("sort", "-created_at,name"),
            ("page", "2"),
            ("limit", "10"),
            ("province", "Bangkok"),
        ]))
        .unwrap();
        assert_eq!(p.filters, vec![Filter { field: "province".into(), op: FilterOp::Eq, value: "Bangkok".into() }]);
        assert_eq!(p.select.as_deref(), Some(&["name".to_string(), "province".to_string()][..]));
        assert_eq!(p.sort, vec![
            SortKey { field: "created_at".into(), descending: true },
            SortKey { field: "name".into(), descending: false },
        ]);
        assert_eq!(p.page, 2);
        assert_eq!(p.limit, 10);
    }

    #[test]
    fn bracket_key_becomes_operator_filter() {
        let p = ListParams::from_query(&query(&[("postalcode[gte]", "10000")])).unwrap();
        assert_eq!(p.filters, vec![Filter { field: "postalcode".into(), op: FilterOp::Gte, value: "10000".into() }]);
    }

    #[test]
    fn operator_tokens_inside_values_are_left_alone() {
        // A value containing "gte"/"in" must stay a plain equality match
        let p = ListParams::from_query(&query(&[("name", "gteborg trading co")])).unwrap();
        assert_eq!(p.filters, vec![Filter { field: "name".into(), op: FilterOp::Eq, value: "gteborg trading co".into() }]);

        let p = ListParams::from_query(&query(&[("province", "Chiang Mai (inland)")])).unwrap();
        assert_eq!(p.filters[0].op, FilterOp::Eq);
        assert_eq!(p.filters[0].value, "Chiang Mai (inland)");
    }

    #[test]
    fn in_filter_splits_values() {
        let p = ListParams::from_query(&query(&[("province[in]", "Bangkok, Phuket ,Krabi")])).unwrap();
        assert_eq!(p.filters[0].values(), vec!["Bangkok", "Phuket", "Krabi"]);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = ListParams::from_query(&query(&[("price[regex]", "x")])).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn malformed_bracket_key_is_rejected() {
        assert!(ListParams::from_query(&query(&[("price[gt", "1")])).is_err());
        assert!(ListParams::from_query(&query(&[("[gt]", "1")])).is_err());
    }

    #[test]
    fn page_below_one_is_coerced() {
        let p = ListParams::from_query(&query(&[("page", "0")])).unwrap();
        assert_eq!(p.page, 1);
    }

    #[test]
    fn non_numeric_page_and_limit_are_rejected() {
        assert!(ListParams::from_query(&query(&[("page", "two")])).is_err());
        assert!(ListParams::from_query(&query(&[("limit", "0")])).is_err());
    }

    #[test]
    fn huge_page_values_do_not_overflow() {
        let p = ListParams::from_query(&query(&[(
            "page",
            &u64::MAX.to_string(),
        )]))
        .unwrap();
        assert_eq!(p.offset(), u64::MAX);
        let links = p.links(100);
        assert!(links.next.is_none());
        assert!(links.prev.is_some());
    }

    #[test]
    fn offset_and_links() {
        let p = ListParams { page: 3, limit: 10, ..Default::default() };
        assert_eq!(p.offset(), 20);
        let links = p.links(35);
        assert!(links.next.is_some());
        assert!(links.prev.is_some());
        assert_eq!(links.next.unwrap().page, 4);
    }

    #[test]
    fn select_projection_keeps_only_requested_fields() {
        let row = serde_json::json!({"id": "1", "name": "Acme", "province": "Bangkok", "tel": "02"});
        let select = vec!["name".to_string()];
        let out = apply_select(row, Some(&select));
        let obj = out.as_object().unwrap();
        assert!(obj.contains_key("id"));
        assert!(obj.contains_key("name"));
        assert!(!obj.contains_key("province"));
        assert!(!obj.contains_key("tel"));
    }

    #[test]
    fn no_select_returns_row_untouched() {
        let row = serde_json::json!({"id": "1", "name": "Acme"});
        let out = apply_select(row.clone(), None);
        assert_eq!(out, row);
    }
}
