use serde::{Deserialize, Serialize};

/// Category tag shared by every repeated detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Home,
    Work,
    Other,
}
