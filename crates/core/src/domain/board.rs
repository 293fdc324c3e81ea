use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two kinds of board the tracker exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardCategory {
    Deal,
    WorkOrder,
}

impl BoardCategory {
    pub const ALL: [BoardCategory; 2] = [BoardCategory::Deal, BoardCategory::WorkOrder];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deal => "deal",
            Self::WorkOrder => "work_order",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Deal => "Deals (Sales Pipeline)",
            Self::WorkOrder => "Work Orders (Project Execution)",
        }
    }
}

impl fmt::Display for BoardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoardCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "deal" | "deals" => Ok(Self::Deal),
            "work_order" | "work_orders" | "workorder" => Ok(Self::WorkOrder),
            other => Err(format!("unknown board category `{other}` (expected deal|work_order)")),
        }
    }
}
