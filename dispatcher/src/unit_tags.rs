//! Radio-ID-to-label lookup: a small static table loaded from
//! `unit_tags.csv`, plus an over-the-air alias table populated live from
//! decoded Motorola OTA broadcasts and persisted to `unitsOTA.csv`.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::DispatcherError;
use crate::ota::OtaAlias;
use crate::unit_tag::UnitTag;

/// Controls search order between the static table and the live OTA table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitTagMode {
    /// Static `unit_tags.csv` entries take precedence over OTA aliases.
    UserFirst,
    /// OTA aliases take precedence over static entries.
    OtaFirst,
    /// Only the static table is consulted; OTA aliases are ignored.
    UserOnly,
    /// No tag lookup is performed at all.
    None,
}

/// Matches the `unit_id,tag,source,timestamp,wacn,sys,talkgroup_id` OTA CSV
/// schema.
#[derive(Debug, Clone)]
struct OtaEntry {
    radio_id: i64,
    tag: String,
    source: String,
    last_seen: i64,
    wacn: String,
    sys: String,
    talkgroup_id: Option<i64>,
}

impl OtaEntry {
    fn has_metadata(&self) -> bool {
        !self.wacn.is_empty() || !self.sys.is_empty()
    }

    fn to_record(&self) -> [String; 7] {
        [
            self.radio_id.to_string(),
            self.tag.clone(),
            self.source.clone(),
            self.last_seen.to_string(),
            self.wacn.clone(),
            self.sys.clone(),
            self.talkgroup_id.map(|tg| tg.to_string()).unwrap_or_default(),
        ]
    }
}

pub struct UnitTags {
    mode: UnitTagMode,
    static_tags: Vec<UnitTag>,
    /// Oldest-first; lookups walk this in reverse so the most recently
    /// learned alias for a given radio ID is tried before older ones.
    ota_tags: Vec<OtaEntry>,
    ota_path: Option<PathBuf>,
}

impl UnitTags {
    pub fn new(mode: UnitTagMode) -> Self {
        Self {
            mode,
            static_tags: Vec::new(),
            ota_tags: Vec::new(),
            ota_path: None,
        }
    }

    pub fn mode(&self) -> UnitTagMode {
        self.mode
    }

    /// Loads `id_pattern,tag` rows from a CSV file into the static table.
    pub fn load_unit_tags(&mut self, path: impl AsRef<Path>) -> Result<(), DispatcherError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        for record in reader.records() {
            let record = record?;
            if record.len() < 2 {
                continue;
            }
            let pattern = record.get(0).unwrap_or_default().trim();
            let tag = record.get(1).unwrap_or_default().trim();
            if pattern.is_empty() {
                continue;
            }
            self.static_tags.push(UnitTag::new(pattern, tag.to_string())?);
        }
        Ok(())
    }

    /// Loads the persisted OTA alias table, then normalizes it in place:
    /// duplicate (radio_id, tag) pairs are collapsed to the newest, and an
    /// unsorted or incomplete-metadata file is rewritten atomically.
    pub fn load_unit_tags_ota(&mut self, path: impl AsRef<Path>) -> Result<(), DispatcherError> {
        let path = path.as_ref().to_path_buf();
        let mut loaded = Vec::new();
        let mut needs_rewrite = false;

        if path.exists() {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_path(&path)?;
            let mut last_id = i64::MIN;
            for record in reader.records() {
                let record = record?;
                if record.len() < 4 {
                    continue;
                }
                let Ok(radio_id) = record.get(0).unwrap_or_default().parse::<i64>() else {
                    continue;
                };
                let tag = record.get(1).unwrap_or_default().to_string();
                let source = record.get(2).unwrap_or_default().to_string();
                let Ok(last_seen) = record.get(3).unwrap_or_default().parse::<i64>() else {
                    continue;
                };
                let wacn = record.get(4).unwrap_or_default().to_string();
                let sys = record.get(5).unwrap_or_default().to_string();
                let talkgroup_id = record.get(6).and_then(|s| s.parse::<i64>().ok());

                if radio_id < last_id {
                    needs_rewrite = true;
                }
                last_id = radio_id;

                loaded.push(OtaEntry {
                    radio_id,
                    tag,
                    source,
                    last_seen,
                    wacn,
                    sys,
                    talkgroup_id,
                });
            }
        }

        let mut deduped: Vec<OtaEntry> = Vec::with_capacity(loaded.len());
        for entry in loaded {
            if let Some(existing) = deduped
                .iter_mut()
                .find(|e: &&mut OtaEntry| e.radio_id == entry.radio_id && e.tag == entry.tag)
            {
                needs_rewrite = true;
                if entry.last_seen > existing.last_seen
                    || (entry.last_seen == existing.last_seen
                        && entry.has_metadata()
                        && !existing.has_metadata())
                {
                    *existing = entry;
                }
            } else {
                deduped.push(entry);
            }
        }

        self.ota_tags = deduped;
        self.ota_path = Some(path.clone());

        if needs_rewrite {
            self.rewrite_ota_file(&path)?;
        }

        Ok(())
    }

    fn rewrite_ota_file(&self, path: &Path) -> Result<(), DispatcherError> {
        let tmp_path = path.with_extension("csv.tmp");
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp_path)?;
            for entry in &self.ota_tags {
                writer.write_record(entry.to_record())?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn append_ota_record(&self, entry: &OtaEntry) -> Result<(), DispatcherError> {
        let Some(path) = &self.ota_path else {
            return Ok(());
        };
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
        let line = entry.to_record().join(",");
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Adds or refreshes a static tag in memory only; the static table is
    /// operator-maintained and never rewritten by the recorder.
    pub fn add(&mut self, pattern: &str, tag: String) -> Result<(), DispatcherError> {
        self.static_tags.push(UnitTag::new(pattern, tag)?);
        Ok(())
    }

    /// Records a freshly decoded OTA alias. If an entry for the same radio
    /// ID with the same alias text already exists, its timestamp/metadata
    /// are refreshed in place (newest-timestamp-wins, or equal timestamp
    /// where the new record adds metadata the old one lacked). If the
    /// alias text differs from any existing entry for that radio ID, a new
    /// entry is appended rather than replacing the old one, so a reverse
    /// search always finds the most recent alias first while older aliases
    /// remain available as history.
    pub fn add_ota(&mut self, alias: &OtaAlias, last_seen: i64) -> Result<(), DispatcherError> {
        let entry = OtaEntry {
            radio_id: alias.radio_id,
            tag: alias.alias.clone(),
            source: alias.source.as_str().to_string(),
            last_seen,
            wacn: alias.wacn.clone(),
            sys: alias.sys.clone(),
            talkgroup_id: alias.talkgroup_id,
        };

        if let Some(existing) = self
            .ota_tags
            .iter_mut()
            .rev()
            .find(|e: &&mut OtaEntry| e.radio_id == entry.radio_id && e.tag == entry.tag)
        {
            if entry.last_seen > existing.last_seen
                || (entry.last_seen == existing.last_seen
                    && entry.has_metadata()
                    && !existing.has_metadata())
            {
                *existing = entry.clone();
                self.append_ota_record(&entry)?;
            }
            return Ok(());
        }

        self.append_ota_record(&entry)?;
        self.ota_tags.push(entry);
        Ok(())
    }

    /// Looks up a tag for a radio ID following the configured search mode.
    pub fn find_unit_tag(&self, radio_id: i64) -> Option<&str> {
        match self.mode {
            UnitTagMode::None => None,
            UnitTagMode::UserOnly => self.find_static(radio_id),
            UnitTagMode::UserFirst => self
                .find_static(radio_id)
                .or_else(|| self.find_ota(radio_id)),
            UnitTagMode::OtaFirst => self
                .find_ota(radio_id)
                .or_else(|| self.find_static(radio_id)),
        }
    }

    fn find_static(&self, radio_id: i64) -> Option<&str> {
        self.static_tags
            .iter()
            .find(|t| t.matches(radio_id))
            .map(|t| t.tag.as_str())
    }

    fn find_ota(&self, radio_id: i64) -> Option<&str> {
        self.ota_tags
            .iter()
            .rev()
            .find(|e| e.radio_id == radio_id)
            .map(|e| e.tag.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn alias(radio_id: i64, tag: &str) -> OtaAlias {
        OtaAlias {
            radio_id,
            alias: tag.to_string(),
            source: crate::ota::OtaSource::MotoP25Fdma,
            wacn: String::new(),
            sys: String::new(),
            talkgroup_id: None,
        }
    }

    #[test]
    fn static_lookup_honors_user_only_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "unit_tags.csv", "1001,Dispatch\n");
        let mut tags = UnitTags::new(UnitTagMode::UserOnly);
        tags.load_unit_tags(&path).unwrap();
        assert_eq!(tags.find_unit_tag(1001), Some("Dispatch"));
        assert_eq!(tags.find_unit_tag(1002), None);
    }

    #[test]
    fn ota_lookup_prefers_most_recent_alias_in_ota_first_mode() {
        let mut tags = UnitTags::new(UnitTagMode::OtaFirst);
        tags.ota_path = None;
        tags.add_ota(&alias(2001, "Engine 1"), 100).unwrap();
        tags.add_ota(&alias(2001, "Engine 1 Relocated"), 200).unwrap();
        assert_eq!(tags.find_unit_tag(2001), Some("Engine 1 Relocated"));
    }

    #[test]
    fn user_first_mode_prefers_static_over_ota() {
        let mut tags = UnitTags::new(UnitTagMode::UserFirst);
        tags.static_tags.push(UnitTag::new("3001", "Chief".into()).unwrap());
        tags.add_ota(&alias(3001, "OTA Name"), 100).unwrap();
        assert_eq!(tags.find_unit_tag(3001), Some("Chief"));
    }

    #[test]
    fn add_ota_refreshes_same_alias_instead_of_duplicating() {
        let mut tags = UnitTags::new(UnitTagMode::OtaFirst);
        tags.add_ota(&alias(4001, "Medic 1"), 100).unwrap();
        tags.add_ota(&alias(4001, "Medic 1"), 150).unwrap();
        assert_eq!(tags.ota_tags.len(), 1);
        assert_eq!(tags.ota_tags[0].last_seen, 150);
    }

    #[test]
    fn load_unit_tags_ota_dedupes_and_rewrites_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "unitsOTA.csv",
            "5001,Engine,MotoP25_FDMA,100,,,\n5001,Engine,MotoP25_FDMA,200,wacn1,sys1,300\n",
        );
        let mut tags = UnitTags::new(UnitTagMode::OtaFirst);
        tags.load_unit_tags_ota(&path).unwrap();
        assert_eq!(tags.ota_tags.len(), 1);
        assert_eq!(tags.ota_tags[0].last_seen, 200);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn none_mode_never_returns_a_tag() {
        let mut tags = UnitTags::new(UnitTagMode::None);
        tags.static_tags.push(UnitTag::new("6001", "Ignored".into()).unwrap());
        assert_eq!(tags.find_unit_tag(6001), None);
    }
}
