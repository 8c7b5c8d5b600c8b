//! Remediation projects, their tasks and milestones.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::choice::closed_choice;

closed_choice! {
    #[derive(Default)]
    pub enum ProjectStatus ("status") {
        #[default]
        Planning => "PLANNING", "Planning",
        Active => "ACTIVE", "Active",
        OnHold => "ON_HOLD", "On Hold",
        Completed => "COMPLETED", "Completed",
        Cancelled => "CANCELLED", "Cancelled",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum TaskStatus ("status") {
        #[default]
        Todo => "TODO", "To Do",
        InProgress => "IN_PROGRESS", "In Progress",
        Review => "REVIEW", "In Review",
        Done => "DONE", "Done",
        Blocked => "BLOCKED", "Blocked",
    }
}

closed_choice! {
    #[derive(Default)]
    pub enum TaskPriority ("priority") {
        Low => "LOW", "Low",
        #[default]
        Medium => "MEDIUM", "Medium",
        High => "HIGH", "High",
        Critical => "CRITICAL", "Critical",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub project_manager: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub project: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub project: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
}
