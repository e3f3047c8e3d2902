use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub prefix: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub suffix: Option<String>,
}

impl Name {
    /// Split a full name on its first space: "Jane Doe" gives first "Jane",
    /// last "Doe"; a single token only fills the first name.
    pub fn from_full_name(full_name: &str) -> Self {
        let mut name = Self::default();
        match full_name.split_once(' ') {
            Some((first, last)) if !first.is_empty() && !last.is_empty() => {
                name.first_name = Some(first.to_string());
                name.last_name = Some(last.to_string());
            }
            _ => name.first_name = Some(full_name.to_string()),
        }
        name
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.prefix,
            &self.first_name,
            &self.middle_name,
            &self.last_name,
            &self.suffix,
        ]
        .iter()
        .all(|part| part.as_deref().map_or(true, str::is_empty))
    }

    /// [Prefix] First [Middle] Last [Suffix]
    pub fn formatted(&self) -> String {
        [
            self.prefix.as_deref(),
            self.first_name.as_deref(),
            self.middle_name.as_deref(),
            self.last_name.as_deref(),
            self.suffix.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}
