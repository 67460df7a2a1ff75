//! Core data model for the registry crawl
//!
//! Regions and comunas are the two navigation levels of the search page,
//! school references are the transient links found in a result list, and
//! school records are the unit of output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A top-level entry of the region selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Option value submitted to the site
    pub id: String,

    /// Human-readable label, used for resume matching
    pub display_name: String,
}

/// A comuna entry, only meaningful while its region is selected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comuna {
    pub id: String,
    pub display_name: String,
}

/// A navigable pointer to one school's detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolReference {
    /// Numeric school code taken from the result list
    pub code: String,

    /// Detail page address built from the code
    pub url: String,
}

/// Columns of the exported table, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Column {
    Name,
    Address,
    Phone,
    Email,
    Website,
    Director,
    Operator,
    TotalEnrollment,
    Region,
    Comuna,
    SourceUrl,
}

impl Column {
    /// Every column, in export order
    pub const ALL: [Column; 11] = [
        Column::Name,
        Column::Address,
        Column::Phone,
        Column::Email,
        Column::Website,
        Column::Director,
        Column::Operator,
        Column::TotalEnrollment,
        Column::Region,
        Column::Comuna,
        Column::SourceUrl,
    ];

    /// Header text written to the export
    pub fn header(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Address => "address",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Website => "website",
            Self::Director => "director",
            Self::Operator => "operator",
            Self::TotalEnrollment => "totalEnrollment",
            Self::Region => "region",
            Self::Comuna => "comuna",
            Self::SourceUrl => "sourceUrl",
        }
    }

    /// Parses a header back into a column
    pub fn from_header(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.header() == s)
    }

    /// Returns true for columns filled from crawl context rather than the page
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Region | Self::Comuna | Self::SourceUrl)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header())
    }
}

/// One extracted school
///
/// Page-derived fields are optional; a record with all of them absent is
/// still valid output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchoolRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub director: Option<String>,
    pub operator: Option<String>,
    pub total_enrollment: Option<String>,
    pub region: String,
    pub comuna: String,
    pub source_url: String,
}

impl SchoolRecord {
    /// Creates a record with only the crawl-context fields populated
    pub fn new(region: &str, comuna: &str, source_url: &str) -> Self {
        Self {
            region: region.to_string(),
            comuna: comuna.to_string(),
            source_url: source_url.to_string(),
            ..Self::default()
        }
    }

    /// Returns the value of a column, empty when absent
    pub fn value(&self, column: Column) -> &str {
        let optional = match column {
            Column::Name => &self.name,
            Column::Address => &self.address,
            Column::Phone => &self.phone,
            Column::Email => &self.email,
            Column::Website => &self.website,
            Column::Director => &self.director,
            Column::Operator => &self.operator,
            Column::TotalEnrollment => &self.total_enrollment,
            Column::Region => return &self.region,
            Column::Comuna => return &self.comuna,
            Column::SourceUrl => return &self.source_url,
        };
        optional.as_deref().unwrap_or("")
    }

    /// Sets a column; empty values on page-derived columns become absent
    pub fn set(&mut self, column: Column, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty());
        match column {
            Column::Name => self.name = value,
            Column::Address => self.address = value,
            Column::Phone => self.phone = value,
            Column::Email => self.email = value,
            Column::Website => self.website = value,
            Column::Director => self.director = value,
            Column::Operator => self.operator = value,
            Column::TotalEnrollment => self.total_enrollment = value,
            Column::Region => self.region = value.unwrap_or_default(),
            Column::Comuna => self.comuna = value.unwrap_or_default(),
            Column::SourceUrl => self.source_url = value.unwrap_or_default(),
        }
    }

    /// Values of every column in export order
    pub fn row(&self) -> Vec<&str> {
        Column::ALL.iter().map(|c| self.value(*c)).collect()
    }

    /// Returns true if the column holds a value
    pub fn has(&self, column: Column) -> bool {
        !self.value(column).is_empty()
    }
}
