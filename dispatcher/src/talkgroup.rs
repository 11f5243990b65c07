//! The talkgroup table: static metadata loaded from a `talkgroups.csv`
//! (number, mode, alpha tag, description, tag, group, priority), used to
//! resolve a talkgroup ID's recording priority and whether it should be
//! recorded at all.

use std::collections::HashMap;
use std::path::Path;

use crate::error::DispatcherError;

#[derive(Debug, Clone)]
pub struct Talkgroup {
    pub number: u32,
    pub mode: String,
    pub alpha_tag: String,
    pub description: String,
    pub tag: String,
    pub group: String,
    /// Negative priority means "never record this talkgroup".
    pub priority: i32,
}

impl Talkgroup {
    pub fn should_record(&self) -> bool {
        self.priority >= 0
    }
}

#[derive(Debug, Default)]
pub struct TalkgroupTable {
    by_number: HashMap<u32, Talkgroup>,
}

impl TalkgroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), DispatcherError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        for record in reader.records() {
            let record = record?;
            let Some(number) = record.get(0).and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let priority = record.get(6).and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
            self.by_number.insert(
                number,
                Talkgroup {
                    number,
                    mode: record.get(1).unwrap_or_default().to_string(),
                    alpha_tag: record.get(2).unwrap_or_default().to_string(),
                    description: record.get(3).unwrap_or_default().to_string(),
                    tag: record.get(4).unwrap_or_default().to_string(),
                    group: record.get(5).unwrap_or_default().to_string(),
                    priority,
                },
            );
        }
        Ok(())
    }

    /// Looks up a talkgroup; `None` signals the `UNKNOWN_TG` monitoring
    /// substate — a grant for a talkgroup absent from the table entirely.
    pub fn get(&self, number: u32) -> Option<&Talkgroup> {
        self.by_number.get(&number)
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn loads_rows_and_resolves_priority() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talkgroups.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "Number,Mode,AlphaTag,Description,Tag,Group,Priority").unwrap();
        writeln!(f, "1001,D,PD Dispatch,Police Dispatch,Law,Police,1").unwrap();
        writeln!(f, "1002,D,Admin,Admin Channel,Law,Police,-1").unwrap();
        drop(f);

        let mut table = TalkgroupTable::new();
        table.load(&path).unwrap();

        let recorded = table.get(1001).unwrap();
        assert!(recorded.should_record());
        assert_eq!(recorded.alpha_tag, "PD Dispatch");

        let ignored = table.get(1002).unwrap();
        assert!(!ignored.should_record());

        assert!(table.get(9999).is_none());
    }
}
