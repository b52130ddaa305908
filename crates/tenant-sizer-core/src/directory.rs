use crate::error::Error;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// Resolves a group name to the principal names of its members.
pub trait GroupDirectory {
    /// Lower-cased member principal names. Unknown groups are an error; an
    /// existing group may come back empty.
    fn members(&self, group: &str) -> Result<HashSet<String>, Error>;
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    #[serde(rename = "Group")]
    group: String,
    #[serde(rename = "Member", default)]
    member: String,
}

/// Group membership from a `Group,Member` CSV export. A group listed only with
/// blank members exists but is empty.
pub struct CsvGroupDirectory {
    path: PathBuf,
}

impl CsvGroupDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GroupDirectory for CsvGroupDirectory {
    fn members(&self, group: &str) -> Result<HashSet<String>, Error> {
        if !self.path.is_file() {
            return Err(Error::GroupNotFound(group.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        let mut found = false;
        let mut members = HashSet::new();
        for row in reader.deserialize::<MembershipRow>() {
            let row = row?;
            if !row.group.eq_ignore_ascii_case(group) {
                continue;
            }
            found = true;
            if !row.member.is_empty() {
                members.insert(row.member.to_lowercase());
            }
        }

        if !found {
            return Err(Error::GroupNotFound(group.to_string()));
        }
        debug!("Group '{}' has {} members", group, members.len());
        Ok(members)
    }
}
