use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::format_due_date;

/// Date format the backend stores due dates in
const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Homework {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Kept as sent; items created by other clients are not always well formed
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub child_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_by: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl Homework {
    /// Parsed due date; accepts a full timestamp by reading its date part
    pub fn due(&self) -> Option<NaiveDate> {
        let date = self.due_date.get(..10).unwrap_or(&self.due_date);
        NaiveDate::parse_from_str(date, DUE_DATE_FORMAT).ok()
    }

    pub fn due_display(&self) -> String {
        match self.due() {
            Some(date) => format_due_date(date),
            None if self.due_date.is_empty() => "No due date".to_string(),
            None => self.due_date.clone(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due().map(|d| d < today).unwrap_or(false)
    }

    pub fn status_display(&self) -> &'static str {
        if self.completed {
            "completed"
        } else {
            "pending"
        }
    }
}

/// Earliest due date first; items without a readable date go last
pub fn sort_by_due_date(items: &mut [Homework]) {
    items.sort_by(|a, b| match (a.due(), b.due()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHomework {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub due_date: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_id: Option<String>,
}

impl NewHomework {
    /// Title is required; a blank description is dropped
    pub fn new(title: &str, due_date: NaiveDate) -> Option<Self> {
        let title = title.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            description: None,
            due_date: due_date.format(DUE_DATE_FORMAT).to_string(),
            completed: false,
            child_id: None,
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        let description = description.trim();
        self.description = (!description.is_empty()).then(|| description.to_string());
        self
    }

    pub fn with_child(mut self, child_id: impl Into<String>) -> Self {
        self.child_id = Some(child_id.into());
        self
    }
}
