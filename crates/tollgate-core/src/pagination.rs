//! Cursor pagination over id-ordered collections.

use crate::error::{TollgateError, TollgateResult};
use crate::id::ObjectId;

/// A field that may appear in a listing projection.
pub trait Projection: Copy + Send + Sync {
    /// Stored column for this field, or `None` for the record id (always
    /// selected).
    fn column(&self) -> Option<&'static str>;
}

/// Raw listing parameters as supplied by a caller.
#[derive(Debug, Clone)]
pub struct PageRequest<F> {
    /// `0` is rejected; negative or oversized values are clamped.
    pub limit: i64,
    /// Id of the last record already seen.
    pub after: Option<String>,
    /// Empty selects the full record.
    pub fields: Vec<F>,
}

impl<F> PageRequest<F> {
    pub fn first(limit: i64) -> Self {
        Self {
            limit,
            after: None,
            fields: Vec::new(),
        }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = F>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }
}

/// One page of results, ascending by id.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Last id of a full page; `None` once the page comes back short.
    pub next_cursor: Option<ObjectId>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, limit: usize, last_id: Option<ObjectId>) -> Self {
        let next_cursor = if items.len() == limit { last_id } else { None };
        Self { items, next_cursor }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Validated listing parameters.
#[derive(Debug, Clone)]
pub struct PagePlan {
    pub limit: usize,
    pub after: Option<ObjectId>,
    /// Deduplicated stored columns; empty means all of them.
    pub columns: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    max_limit: usize,
}

impl Paginator {
    pub fn new(max_limit: u64) -> Self {
        Self {
            max_limit: max_limit as usize,
        }
    }

    pub fn clamp_limit(&self, limit: i64) -> TollgateResult<usize> {
        if limit == 0 {
            return Err(TollgateError::NoResult);
        }
        if limit < 0 {
            return Ok(self.max_limit);
        }
        Ok((limit as u64).min(self.max_limit as u64) as usize)
    }

    pub fn cursor(&self, after: Option<&str>) -> TollgateResult<Option<ObjectId>> {
        match after {
            None | Some("") => Ok(None),
            Some(raw) => ObjectId::parse_str(raw).map(Some),
        }
    }

    pub fn plan<F: Projection>(&self, request: &PageRequest<F>) -> TollgateResult<PagePlan> {
        let limit = self.clamp_limit(request.limit)?;
        let after = self.cursor(request.after.as_deref())?;
        let mut columns: Vec<&'static str> = Vec::new();
        for col in request.fields.iter().filter_map(|f| f.column()) {
            if !columns.contains(&col) {
                columns.push(col);
            }
        }
        // Only `id` requested: still a projection, not the full record.
        let id_only = !request.fields.is_empty() && columns.is_empty();
        if id_only {
            columns.push("id");
        }
        Ok(PagePlan {
            limit,
            after,
            columns,
        })
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(crate::config::TollgateConfig::default().default_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserField;

    #[test]
    fn zero_limit_is_no_result() {
        let p = Paginator::new(500);
        assert!(matches!(p.clamp_limit(0), Err(TollgateError::NoResult)));
    }

    #[test]
    fn limit_is_clamped() {
        let p = Paginator::new(500);
        assert_eq!(p.clamp_limit(-3).unwrap(), 500);
        assert_eq!(p.clamp_limit(10_000).unwrap(), 500);
        assert_eq!(p.clamp_limit(10).unwrap(), 10);
    }

    #[test]
    fn cursor_parsing() {
        let p = Paginator::default();
        assert!(p.cursor(None).unwrap().is_none());
        assert!(p.cursor(Some("")).unwrap().is_none());
        assert!(matches!(
            p.cursor(Some("not-an-id")),
            Err(TollgateError::InvalidId { .. })
        ));
        let id = ObjectId::new();
        assert_eq!(p.cursor(Some(&id.to_hex())).unwrap(), Some(id));
    }

    #[test]
    fn plan_dedups_columns() {
        let req = PageRequest::first(5).fields([
            UserField::Email,
            UserField::Id,
            UserField::Email,
            UserField::LastActivity,
        ]);
        let plan = Paginator::default().plan(&req).unwrap();
        assert_eq!(plan.columns, vec!["email", "last_activity"]);
        assert_eq!(plan.limit, 5);
    }

    #[test]
    fn id_only_projection() {
        let req = PageRequest::first(5).fields([UserField::Id]);
        let plan = Paginator::default().plan(&req).unwrap();
        assert_eq!(plan.columns, vec!["id"]);
    }

    #[test]
    fn next_cursor_only_on_full_page() {
        let id = ObjectId::new();
        let full = Page::new(vec![1, 2], 2, Some(id));
        assert_eq!(full.next_cursor, Some(id));
        let short = Page::new(vec![1], 2, Some(id));
        assert!(short.next_cursor.is_none());
    }
}
