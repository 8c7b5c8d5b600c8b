//! Explicit schema declarations.
//!
//! The schema is a plain value built once at startup and handed to the storage
//! layer. It describes each table's columns, the delete rule of every
//! relationship, and the admin-style filter/search fields and unique keys.
//! Stores use it to cascade deletes, to validate list filters and (for
//! Postgres) to render DDL. There is no ambient registry.

use std::fmt;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use grc_types::{
    AssessmentStatus, AuditStatus, AuditType, FindingSeverity, FindingStatus, Impact, Likelihood,
    ProjectStatus, RiskSeverity, RiskStatus, TaskPriority, TaskStatus, TreatmentStatus,
    TreatmentStrategy,
};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Framework,
    Control,
    Evidence,
    Audit,
    AuditFinding,
    AuditEvidence,
    Risk,
    RiskAssessment,
    RiskTreatment,
    Project,
    Task,
    Milestone,
}

impl EntityKind {
    pub const ALL: [EntityKind; 13] = [
        EntityKind::User,
        EntityKind::Framework,
        EntityKind::Control,
        EntityKind::Evidence,
        EntityKind::Audit,
        EntityKind::AuditFinding,
        EntityKind::AuditEvidence,
        EntityKind::Risk,
        EntityKind::RiskAssessment,
        EntityKind::RiskTreatment,
        EntityKind::Project,
        EntityKind::Task,
        EntityKind::Milestone,
    ];

    /// Human-readable name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Framework => "framework",
            Self::Control => "control",
            Self::Evidence => "evidence",
            Self::Audit => "audit",
            Self::AuditFinding => "audit finding",
            Self::AuditEvidence => "audit evidence",
            Self::Risk => "risk",
            Self::RiskAssessment => "risk assessment",
            Self::RiskTreatment => "risk treatment",
            Self::Project => "project",
            Self::Task => "task",
            Self::Milestone => "milestone",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What happens to a referencing row when its referent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Text with an optional maximum length in characters.
    Text { max_len: Option<usize> },
    Bool,
    Date,
    /// Closed set of upper-case codes.
    Choice { codes: &'static [&'static str] },
    /// Foreign key to another table's id.
    Ref { target: EntityKind, on_delete: OnDelete },
    /// Many-to-many id list; deleting a referent unlinks it.
    RefList { target: EntityKind },
    /// Structured JSON document.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    /// Clients must supply a value.
    pub required: bool,
    /// The stored value may be null.
    pub nullable: bool,
    /// Written by the server only; ignored in client input.
    pub managed: bool,
}

impl Column {
    const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            required: true,
            nullable: false,
            managed: false,
        }
    }

    pub const fn text(name: &'static str, max_len: usize) -> Self {
        Self::new(name, ColumnType::Text { max_len: Some(max_len) })
    }

    pub const fn long_text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text { max_len: None })
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ColumnType::Bool)
    }

    pub const fn date(name: &'static str) -> Self {
        Self::new(name, ColumnType::Date)
    }

    pub const fn choice(name: &'static str, codes: &'static [&'static str]) -> Self {
        Self::new(name, ColumnType::Choice { codes })
    }

    pub const fn cascade(name: &'static str, target: EntityKind) -> Self {
        Self::new(
            name,
            ColumnType::Ref {
                target,
                on_delete: OnDelete::Cascade,
            },
        )
    }

    pub const fn set_null(name: &'static str, target: EntityKind) -> Self {
        Self::new(
            name,
            ColumnType::Ref {
                target,
                on_delete: OnDelete::SetNull,
            },
        )
        .nullable()
    }

    pub const fn ref_list(name: &'static str, target: EntityKind) -> Self {
        Self::new(name, ColumnType::RefList { target }).optional()
    }

    pub const fn attachment(name: &'static str) -> Self {
        let mut column = Self::new(name, ColumnType::Json).nullable();
        column.managed = true;
        column
    }

    /// Clients may omit the field; the record type supplies a default.
    pub const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Optional and nullable.
    pub const fn nullable(mut self) -> Self {
        self.required = false;
        self.nullable = true;
        self
    }

    pub fn references(&self) -> Option<EntityKind> {
        match self.ty {
            ColumnType::Ref { target, .. } | ColumnType::RefList { target } => Some(target),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub kind: EntityKind,
    pub table: &'static str,
    pub columns: Vec<Column>,
    /// Fields accepted as `?field=value` list filters.
    pub filters: &'static [&'static str],
    /// Fields scanned by `?search=`.
    pub search: &'static [&'static str],
    /// Column sets that must be unique together.
    pub unique: &'static [&'static [&'static str]],
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn client_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.managed)
    }

    pub fn managed_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.managed)
    }
}

/// A column of `child` that points at some parent table.
#[derive(Debug, Clone, Copy)]
pub struct Reference<'a> {
    pub child: &'a TableDef,
    pub column: &'a Column,
}

#[derive(Debug, Clone)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    /// Tables must be listed after every table they reference.
    pub fn new(tables: Vec<TableDef>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn table(&self, kind: EntityKind) -> Result<&TableDef> {
        self.try_table(kind)
            .ok_or_else(|| anyhow!("{kind} is not declared in the schema").into())
    }

    pub fn try_table(&self, kind: EntityKind) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.kind == kind)
    }

    /// Every column, in any table, that references `kind`.
    pub fn references_to(&self, kind: EntityKind) -> impl Iterator<Item = Reference<'_>> {
        self.tables.iter().flat_map(move |child| {
            child
                .columns
                .iter()
                .filter(move |c| c.references() == Some(kind))
                .map(move |column| Reference { child, column })
        })
    }

    /// Internal consistency checks, run once at startup.
    pub fn check(&self) -> std::result::Result<(), String> {
        let mut problems = Vec::new();
        for (position, table) in self.tables.iter().enumerate() {
            if self.tables[..position].iter().any(|t| t.kind == table.kind) {
                problems.push(format!("{} declared twice", table.kind));
            }
            for column in &table.columns {
                if column.required && column.nullable {
                    problems.push(format!(
                        "{}.{} cannot be both required and nullable",
                        table.table, column.name
                    ));
                }
                if let ColumnType::Ref { on_delete, .. } = column.ty {
                    if on_delete == OnDelete::SetNull && !column.nullable {
                        problems.push(format!(
                            "{}.{} is SET NULL but not nullable",
                            table.table, column.name
                        ));
                    }
                }
                if let Some(target) = column.references() {
                    let declared_before = self.tables[..position].iter().any(|t| t.kind == target);
                    if !declared_before {
                        problems.push(format!(
                            "{}.{} references {} which is not declared before it",
                            table.table, column.name, target
                        ));
                    }
                }
            }
            let known = |name: &&str| table.column(name).is_some();
            for name in table.filters.iter().chain(table.search.iter()) {
                if !known(name) {
                    problems.push(format!("{}: unknown filter/search field {}", table.table, name));
                }
            }
            for key in table.unique {
                for name in key.iter() {
                    if !known(name) {
                        problems.push(format!("{}: unknown unique field {}", table.table, name));
                    }
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }

    /// The tracker's tables.
    pub fn grc() -> Self {
        use EntityKind as K;

        Self::new(vec![
            TableDef {
                kind: K::User,
                table: "users",
                columns: vec![
                    Column::text("username", 150),
                    Column::text("email", 254),
                    Column::text("full_name", 200).optional(),
                    Column::boolean("is_active").optional(),
                ],
                filters: &["is_active"],
                search: &["username", "email", "full_name"],
                unique: &[&["username"]],
            },
            TableDef {
                kind: K::Framework,
                table: "frameworks",
                columns: vec![
                    Column::text("name", 200),
                    Column::long_text("description"),
                    Column::text("version", 50),
                ],
                filters: &["name", "version"],
                search: &["name", "description", "version"],
                unique: &[],
            },
            TableDef {
                kind: K::Control,
                table: "controls",
                columns: vec![
                    Column::cascade("framework", K::Framework),
                    Column::text("identifier", 50),
                    Column::text("title", 200),
                    Column::long_text("description"),
                ],
                filters: &["framework", "identifier"],
                search: &["identifier", "title", "description"],
                unique: &[&["framework", "identifier"]],
            },
            TableDef {
                kind: K::Evidence,
                table: "evidence",
                columns: vec![
                    Column::cascade("control", K::Control),
                    Column::text("title", 200),
                    Column::long_text("description"),
                    Column::attachment("attachment"),
                    Column::cascade("created_by", K::User),
                ],
                filters: &["control", "created_by"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::Audit,
                table: "audits",
                columns: vec![
                    Column::text("title", 200),
                    Column::long_text("description"),
                    Column::choice("audit_type", AuditType::CODES),
                    Column::choice("status", AuditStatus::CODES).optional(),
                    Column::date("start_date"),
                    Column::date("end_date"),
                    Column::cascade("lead_auditor", K::User),
                    Column::ref_list("auditors", K::User),
                    Column::ref_list("controls", K::Control),
                    Column::cascade("created_by", K::User),
                ],
                filters: &["audit_type", "status", "start_date", "lead_auditor", "auditors", "controls"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::AuditFinding,
                table: "audit_findings",
                columns: vec![
                    Column::cascade("audit", K::Audit),
                    Column::cascade("control", K::Control).nullable(),
                    Column::text("title", 200),
                    Column::long_text("description"),
                    Column::choice("severity", FindingSeverity::CODES),
                    Column::choice("status", FindingStatus::CODES).optional(),
                    Column::long_text("remediation_plan").optional(),
                    Column::date("due_date").nullable(),
                    Column::set_null("assigned_to", K::User),
                    Column::cascade("created_by", K::User),
                ],
                filters: &["audit", "control", "severity", "status", "assigned_to"],
                search: &["title", "description", "remediation_plan"],
                unique: &[],
            },
            TableDef {
                kind: K::AuditEvidence,
                table: "audit_evidence",
                columns: vec![
                    Column::cascade("finding", K::AuditFinding),
                    Column::text("title", 200),
                    Column::long_text("description"),
                    Column::attachment("attachment"),
                    Column::cascade("created_by", K::User),
                ],
                filters: &["finding", "created_by"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::Risk,
                table: "risks",
                columns: vec![
                    Column::text("title", 200),
                    Column::long_text("description"),
                    Column::text("category", 100),
                    Column::choice("severity", RiskSeverity::CODES).optional(),
                    Column::choice("status", RiskStatus::CODES).optional(),
                ],
                filters: &["category", "severity", "status"],
                search: &["title", "description", "category"],
                unique: &[],
            },
            TableDef {
                kind: K::RiskAssessment,
                table: "risk_assessments",
                columns: vec![
                    Column::cascade("risk", K::Risk),
                    Column::choice("impact", Impact::CODES),
                    Column::choice("likelihood", Likelihood::CODES),
                    Column::long_text("mitigation_plan"),
                    Column::choice("status", AssessmentStatus::CODES).optional(),
                    Column::set_null("assigned_to", K::User),
                    Column::cascade("created_by", K::User),
                ],
                filters: &["risk", "impact", "likelihood", "status", "assigned_to"],
                search: &["mitigation_plan"],
                unique: &[],
            },
            TableDef {
                kind: K::RiskTreatment,
                table: "risk_treatments",
                columns: vec![
                    Column::cascade("risk", K::Risk),
                    Column::text("title", 200),
                    Column::long_text("description").optional(),
                    Column::choice("strategy", TreatmentStrategy::CODES),
                    Column::choice("status", TreatmentStatus::CODES).optional(),
                    Column::set_null("owner", K::User),
                    Column::date("due_date").nullable(),
                ],
                filters: &["risk", "strategy", "status", "owner"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::Project,
                table: "projects",
                columns: vec![
                    Column::text("title", 200),
                    Column::long_text("description").optional(),
                    Column::choice("status", ProjectStatus::CODES).optional(),
                    Column::date("start_date"),
                    Column::date("end_date").nullable(),
                    Column::set_null("project_manager", K::User),
                ],
                filters: &["status", "start_date", "end_date", "project_manager"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::Task,
                table: "tasks",
                columns: vec![
                    Column::cascade("project", K::Project),
                    Column::text("title", 200),
                    Column::long_text("description").optional(),
                    Column::choice("status", TaskStatus::CODES).optional(),
                    Column::choice("priority", TaskPriority::CODES).optional(),
                    Column::date("due_date").nullable(),
                    Column::set_null("assigned_to", K::User),
                ],
                filters: &["project", "status", "priority", "due_date", "assigned_to"],
                search: &["title", "description"],
                unique: &[],
            },
            TableDef {
                kind: K::Milestone,
                table: "milestones",
                columns: vec![
                    Column::cascade("project", K::Project),
                    Column::text("title", 200),
                    Column::long_text("description").optional(),
                    Column::date("due_date"),
                    Column::boolean("completed").optional(),
                ],
                filters: &["project", "completed", "due_date"],
                search: &["title", "description"],
                unique: &[],
            },
        ])
    }

    /// Postgres DDL for every table, in declaration order.
    pub fn ddl(&self) -> String {
        let mut sql = String::from("CREATE SCHEMA IF NOT EXISTS grc;\n");
        for table in &self.tables {
            let mut lines = vec!["    id BIGSERIAL PRIMARY KEY".to_string()];
            for column in &table.columns {
                lines.push(format!("    {}", self.column_ddl(column)));
            }
            lines.push("    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());
            lines.push("    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()".to_string());
            for key in table.unique {
                lines.push(format!("    UNIQUE ({})", key.join(", ")));
            }
            sql.push_str(&format!(
                "CREATE TABLE IF NOT EXISTS grc.{} (\n{}\n);\n",
                table.table,
                lines.join(",\n")
            ));
        }
        sql
    }

    fn column_ddl(&self, column: &Column) -> String {
        let not_null = if column.nullable { "" } else { " NOT NULL" };
        match column.ty {
            ColumnType::Text { .. } | ColumnType::Choice { .. } => {
                format!("{} TEXT{}", column.name, not_null)
            }
            ColumnType::Bool => format!("{} BOOLEAN{}", column.name, not_null),
            ColumnType::Date => format!("{} DATE{}", column.name, not_null),
            ColumnType::Json => format!("{} JSONB{}", column.name, not_null),
            ColumnType::RefList { .. } => {
                format!("{} BIGINT[] NOT NULL DEFAULT '{{}}'", column.name)
            }
            ColumnType::Ref { target, on_delete } => {
                let action = match on_delete {
                    OnDelete::Cascade => "CASCADE",
                    OnDelete::SetNull => "SET NULL",
                };
                format!(
                    "{} BIGINT{} REFERENCES grc.{}(id) ON DELETE {}",
                    column.name,
                    not_null,
                    self.try_table(target).map_or("unknown", |t| t.table),
                    action
                )
            }
        }
    }
}
