//! Friendly depot names from a `depots.ini` catalog.

use crate::item::ItemId;
use std::collections::HashMap;

/// Depot id → display name lookup.
#[derive(Clone, Debug, Default)]
pub struct DepotNames {
    names: HashMap<ItemId, String>,
}

impl DepotNames {
    /// Parse the `[depots]` section of an ini document.
    ///
    /// Lines look like `228988 = VC 2010 Redist`. Comments (`#`, `;`),
    /// other sections and malformed lines are skipped.
    pub fn parse(text: &str) -> Self {
        let mut names = HashMap::new();
        let mut in_depots = false;

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                in_depots = line.eq_ignore_ascii_case("[depots]");
                continue;
            }
            if !in_depots || line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((id, name)) = line.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if let Ok(id) = ItemId::new(id.trim())
                && !name.is_empty()
            {
                names.insert(id, name.to_string());
            }
        }

        Self { names }
    }

    /// Display name for a depot, or a generic label.
    pub fn name_of(&self, depot: &ItemId) -> String {
        self.names
            .get(depot)
            .cloned()
            .unwrap_or_else(|| format!("Depot {depot}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
