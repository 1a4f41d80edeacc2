use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Highest page number a query may ask for; keeps the row offset in range.
const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Name,
    Size,
    #[default]
    Created,
    Updated,
}

impl SortField {
    /// Column backing this sort key.
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "original_name",
            SortField::Size => "file_size",
            SortField::Created => "created_at",
            SortField::Updated => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortField::Name),
            "size" => Ok(SortField::Size),
            "created" | "date" => Ok(SortField::Created),
            "updated" => Ok(SortField::Updated),
            other => Err(format!("unknown sort field: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

/// Listing parameters. Use [`FileQuery::normalized`] before executing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileQuery {
    /// `None` lists every file of the user, `Some("")` only the root folder
    pub folder_path: Option<String>,
    pub page: i64,
    pub page_size: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl FileQuery {
    pub fn in_folder(folder_path: impl Into<String>) -> Self {
        Self {
            folder_path: Some(folder_path.into()),
            ..Self::default()
        }
    }

    /// Clamp page into `1..=MAX_PAGE` and fall back to the default page size
    /// when the requested one is out of range.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.clamp(1, MAX_PAGE);
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        self
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.page_size.max(0))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, query: &FileQuery, total: i64) -> Self {
        let total_pages = if query.page_size > 0 {
            (total + query.page_size - 1) / query.page_size
        } else {
            0
        };
        Self {
            items,
            page: query.page,
            page_size: query.page_size,
            total,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps() {
        let query = FileQuery {
            page: 0,
            page_size: 500,
            ..FileQuery::default()
        }
        .normalized();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = FileQuery {
            page: 3,
            page_size: 10,
            ..FileQuery::default()
        }
        .normalized();
        assert_eq!(query.offset(), 20);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let query = FileQuery {
            page: i64::MAX,
            page_size: MAX_PAGE_SIZE,
            ..FileQuery::default()
        }
        .normalized();
        assert_eq!(query.page, MAX_PAGE);
        assert!(query.offset() > 0);

        let raw = FileQuery {
            page: i64::MAX,
            page_size: 100,
            ..FileQuery::default()
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn test_defaults() {
        let query = FileQuery::default();
        assert_eq!(query.sort_by, SortField::Created);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn test_total_pages() {
        let query = FileQuery::default().normalized();
        let page: Page<i32> = Page::new(vec![], &query, 41);
        assert_eq!(page.total_pages, 3);
        let page: Page<i32> = Page::new(vec![], &query, 0);
        assert_eq!(page.total_pages, 0);
    }

    #[test]
    fn test_parse_sort_keys() {
        assert_eq!("SIZE".parse::<SortField>().unwrap(), SortField::Size);
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("color".parse::<SortField>().is_err());
    }
}
