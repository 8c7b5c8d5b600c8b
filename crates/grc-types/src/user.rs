//! User records.
//!
//! Users exist only as referents for ownership and assignment fields;
//! authentication is handled elsewhere.

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}
