//! Install requests.

use crate::error::{EngineError, EngineResult};
use depotkeep_core::{ItemId, KeyRecord, UnlockScript};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything needed to install one item.
#[derive(Clone, Debug)]
pub struct InstallRequest {
    pub item: ItemId,
    /// Display name; defaults to the id.
    pub name: Option<String>,
    /// Install directory name; defaults to the id.
    pub install_dir: Option<String>,
    /// Every dependent the package provides.
    pub dependents: Vec<ItemId>,
    /// Subset of `dependents` to install. `None` installs all of them.
    pub selection: Option<Vec<ItemId>>,
    /// Decryption keys by depot.
    pub keys: BTreeMap<ItemId, String>,
    /// Library receiving the manifest record instead of the default one.
    pub library: Option<PathBuf>,
    /// Directory holding extracted depot manifest files.
    pub depot_manifests: Option<PathBuf>,
}

impl InstallRequest {
    pub fn new(item: ItemId) -> Self {
        Self {
            item,
            name: None,
            install_dir: None,
            dependents: Vec::new(),
            selection: None,
            keys: BTreeMap::new(),
            library: None,
            depot_manifests: None,
        }
    }

    /// Build a request from a parsed unlock script.
    ///
    /// `item` overrides the script's own primary id; it is needed for
    /// scripts whose every entry carries a key.
    pub fn from_script(script: &UnlockScript, item: Option<ItemId>) -> EngineResult<Self> {
        Self::from_script_or(script, item, None)
    }

    /// Like [`from_script`](Self::from_script), with `fallback` (usually the
    /// script's file stem) as the primary id when neither `item` nor the
    /// script names one.
    pub fn from_script_or(
        script: &UnlockScript,
        item: Option<ItemId>,
        fallback: Option<ItemId>,
    ) -> EngineResult<Self> {
        let item = item
            .or_else(|| script.primary().cloned())
            .or(fallback)
            .ok_or(EngineError::NoPrimaryItem)?;
        let mut request = Self::new(item);
        request.dependents = script.dependents_of(&request.item);
        request.keys = script.keys.clone();
        Ok(request)
    }

    pub fn with_dependents(mut self, dependents: impl IntoIterator<Item = ItemId>) -> Self {
        self.dependents = dependents.into_iter().collect();
        self
    }

    pub fn with_selection(mut self, selection: Vec<ItemId>) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn with_key(mut self, depot: ItemId, key: impl Into<String>) -> Self {
        self.keys.insert(depot, key.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_install_dir(mut self, install_dir: impl Into<String>) -> Self {
        self.install_dir = Some(install_dir.into());
        self
    }

    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_depot_manifests(mut self, dir: impl Into<PathBuf>) -> Self {
        self.depot_manifests = Some(dir.into());
        self
    }

    /// Dependents to install, in package order, without repeats.
    pub fn selected(&self) -> EngineResult<Vec<ItemId>> {
        let Some(selection) = &self.selection else {
            let mut all = Vec::with_capacity(self.dependents.len());
            for id in &self.dependents {
                if *id != self.item && !all.contains(id) {
                    all.push(id.clone());
                }
            }
            return Ok(all);
        };

        if let Some(unknown) = selection.iter().find(|id| !self.dependents.contains(id)) {
            return Err(EngineError::UnknownSelection(unknown.to_string()));
        }
        let mut selected = Vec::with_capacity(selection.len());
        for id in &self.dependents {
            if selection.contains(id) && *id != self.item && !selected.contains(id) {
                selected.push(id.clone());
            }
        }
        Ok(selected)
    }

    /// Key records for the item and the selected dependents. Keys that
    /// cannot be written verbatim are dropped with a warning.
    pub fn key_records(&self, selected: &[ItemId]) -> Vec<KeyRecord> {
        std::iter::once(&self.item)
            .chain(selected)
            .filter_map(|id| {
                let key = self.keys.get(id)?;
                match KeyRecord::new(id.clone(), key.as_str()) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(depot = %id, error = %e, "dropping unusable key");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.item.to_string())
    }

    pub fn install_dir_name(&self) -> String {
        self.install_dir.clone().unwrap_or_else(|| self.item.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    const SCRIPT: &str = r#"
addappid(100)
addappid(200, 1, "aaaaaaaaaaaaaaaa")
addappid(201, 1, "bbbbbbbbbbbbbbbb")
addappid(202)
"#;

    #[test]
    fn test_from_script() {
        let request = InstallRequest::from_script(&UnlockScript::parse(SCRIPT), None).unwrap();
        assert_eq!(request.item, id("100"));
        assert_eq!(request.dependents, vec![id("200"), id("201"), id("202")]);
        assert_eq!(request.selected().unwrap().len(), 3);
        assert_eq!(request.display_name(), "100");

        let records = request.key_records(&request.selected().unwrap());
        let depots: Vec<_> = records.iter().map(|r| r.depot.as_str()).collect();
        assert_eq!(depots, vec!["200", "201"]);
    }

    #[test]
    fn test_script_without_primary() {
        let script = UnlockScript::parse("addappid(5, 1, \"aaaaaaaaaaaa\")");
        assert!(matches!(
            InstallRequest::from_script(&script, None),
            Err(EngineError::NoPrimaryItem)
        ));
        let request = InstallRequest::from_script(&script, Some(id("4"))).unwrap();
        assert_eq!(request.dependents, vec![id("5")]);
    }

    #[test]
    fn test_fallback_primary_ranks_last() {
        let keyed = UnlockScript::parse(
            "addappid(4, 1, \"aaaaaaaaaaaa\")\naddappid(5, 1, \"bbbbbbbbbbbb\")",
        );
        let request = InstallRequest::from_script_or(&keyed, None, Some(id("4"))).unwrap();
        assert_eq!(request.item, id("4"));
        assert_eq!(request.dependents, vec![id("5")]);
        assert_eq!(request.key_records(&request.selected().unwrap()).len(), 2);

        let request =
            InstallRequest::from_script_or(&keyed, Some(id("5")), Some(id("4"))).unwrap();
        assert_eq!(request.item, id("5"));

        let script = UnlockScript::parse(SCRIPT);
        let request = InstallRequest::from_script_or(&script, None, Some(id("9"))).unwrap();
        assert_eq!(request.item, id("100"));
    }

    #[test]
    fn test_selection_narrows_in_package_order() {
        let request = InstallRequest::from_script(&UnlockScript::parse(SCRIPT), None)
            .unwrap()
            .with_selection(vec![id("202"), id("200")]);
        assert_eq!(request.selected().unwrap(), vec![id("200"), id("202")]);
        let records = request.key_records(&request.selected().unwrap());
        assert_eq!(records.len(), 1);

        let bad = request.clone().with_selection(vec![id("999")]);
        assert!(matches!(bad.selected(), Err(EngineError::UnknownSelection(_))));
    }

    #[test]
    fn test_item_key_included() {
        let request = InstallRequest::new(id("7")).with_key(id("7"), "kkkkkkkkkkkk");
        assert_eq!(request.key_records(&[]).len(), 1);
    }
}
