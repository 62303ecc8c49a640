//! App manifest records (`appmanifest_<id>.acf`).
//!
//! The rendered layout mirrors what the game client writes for a fully
//! installed app so that the client picks the record up as-is.

use crate::item::ItemId;
use crate::vdf;
use std::fmt::Write as _;
use time::OffsetDateTime;

/// Client state flag for "fully installed".
pub const STATE_FULLY_INSTALLED: u32 = 4;

/// Quoted numeric values shorter than this are never treated as ids.
pub const MIN_REFERENCE_DIGITS: usize = 4;

/// File name of the manifest record for an item.
pub fn file_name(id: &ItemId) -> String {
    format!("appmanifest_{id}.acf")
}

/// Item id encoded in a manifest record file name.
pub fn id_from_file_name(name: &str) -> Option<ItemId> {
    let stem = name.strip_prefix("appmanifest_")?.strip_suffix(".acf")?;
    ItemId::new(stem).ok()
}

/// An installed-app descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppManifest {
    pub appid: ItemId,
    pub name: String,
    pub install_dir: String,
    /// Unix seconds of the last write.
    pub last_updated: i64,
    /// Size on disk, unknown until the client has scanned the install.
    pub size_on_disk: Option<u64>,
    pub build_id: u64,
    /// Depots recorded as installed for this app.
    pub depots: Vec<ItemId>,
    pub launcher_path: String,
    pub language: String,
}

impl AppManifest {
    /// Create a record stamped with the current time.
    pub fn new(appid: ItemId, name: impl Into<String>, install_dir: impl Into<String>) -> Self {
        Self {
            appid,
            name: name.into(),
            install_dir: install_dir.into(),
            last_updated: OffsetDateTime::now_utc().unix_timestamp(),
            size_on_disk: None,
            build_id: 0,
            depots: Vec::new(),
            launcher_path: String::new(),
            language: "english".to_string(),
        }
    }

    /// Set the installed depots.
    pub fn with_depots(mut self, depots: impl IntoIterator<Item = ItemId>) -> Self {
        self.depots = depots.into_iter().collect();
        self
    }

    /// Set the client launcher path.
    pub fn with_launcher(mut self, launcher_path: impl Into<String>) -> Self {
        self.launcher_path = launcher_path.into();
        self
    }

    /// Set the configured language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Render in the client's record format.
    pub fn to_acf_text(&self) -> String {
        let field = |out: &mut String, indent: &str, key: &str, value: &str| {
            let _ = writeln!(out, "{indent}\"{key}\"\t\t\"{}\"", vdf::escape(value));
        };

        let mut out = String::new();
        out.push_str("\"AppState\"\n{\n");
        field(&mut out, "\t", "appid", self.appid.as_str());
        field(&mut out, "\t", "Universe", "1");
        field(&mut out, "\t", "LauncherPath", &self.launcher_path);
        field(&mut out, "\t", "name", &self.name);
        field(&mut out, "\t", "StateFlags", &STATE_FULLY_INSTALLED.to_string());
        field(&mut out, "\t", "installdir", &self.install_dir);
        field(&mut out, "\t", "LastUpdated", &self.last_updated.to_string());
        field(
            &mut out,
            "\t",
            "SizeOnDisk",
            &self.size_on_disk.unwrap_or(0).to_string(),
        );
        field(&mut out, "\t", "StagingSize", "0");
        field(&mut out, "\t", "buildid", &self.build_id.to_string());
        for key in [
            "LastOwner",
            "UpdateResult",
            "BytesToDownload",
            "BytesDownloaded",
            "BytesToStage",
            "BytesStaged",
        ] {
            field(&mut out, "\t", key, "0");
        }
        field(&mut out, "\t", "TargetBuildID", &self.build_id.to_string());
        field(&mut out, "\t", "AutoUpdateBehavior", "0");
        field(&mut out, "\t", "AllowOtherDownloadsWhileRunning", "0");
        field(&mut out, "\t", "ScheduledAutoUpdate", "0");

        if !self.depots.is_empty() {
            out.push_str("\t\"InstalledDepots\"\n\t{\n");
            for depot in &self.depots {
                let _ = writeln!(out, "\t\t\"{depot}\"\n\t\t{{");
                field(&mut out, "\t\t\t", "manifest", "0");
                field(&mut out, "\t\t\t", "size", "0");
                out.push_str("\t\t}\n");
            }
            out.push_str("\t}\n");
        }

        for block in ["UserConfig", "MountedConfig"] {
            let _ = writeln!(out, "\t\"{block}\"\n\t{{");
            field(&mut out, "\t\t", "language", &self.language);
            out.push_str("\t}\n");
        }
        out.push_str("}\n");
        out
    }

    /// Parse a record written by this crate or by the client.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let nodes = vdf::parse(text).map_err(crate::Error::ManifestParse)?;
        let root = nodes
            .iter()
            .find(|n| n.key.eq_ignore_ascii_case("AppState"))
            .ok_or_else(|| crate::Error::ManifestParse("missing AppState".to_string()))?;

        let appid = root
            .get_str("appid")
            .ok_or_else(|| crate::Error::ManifestParse("missing appid".to_string()))?;
        let appid = ItemId::new(appid)
            .map_err(|e| crate::Error::ManifestParse(format!("invalid appid: {e}")))?;

        let number = |key: &str| -> Option<u64> { root.get_str(key)?.parse().ok() };

        let depots = root
            .get("InstalledDepots")
            .map(|section| {
                section
                    .children()
                    .iter()
                    .filter_map(|n| ItemId::new(n.key.as_str()).ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            name: root
                .get_str("name")
                .map(str::to_string)
                .unwrap_or_else(|| format!("App {appid}")),
            install_dir: root.get_str("installdir").unwrap_or_default().to_string(),
            last_updated: root
                .get_str("LastUpdated")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            size_on_disk: number("SizeOnDisk").filter(|size| *size > 0),
            build_id: number("buildid").unwrap_or(0),
            depots,
            launcher_path: root.get_str("LauncherPath").unwrap_or_default().to_string(),
            language: root
                .get("UserConfig")
                .and_then(|n| n.get_str("language"))
                .unwrap_or("english")
                .to_string(),
            appid,
        })
    }
}

/// Every quoted decimal value of at least [`MIN_REFERENCE_DIGITS`] digits.
///
/// Works on raw text so that records the tree parser rejects still yield
/// their references.
pub fn referenced_ids(text: &str) -> Vec<ItemId> {
    let mut ids = Vec::new();
    for (i, part) in text.split('"').enumerate() {
        // Odd parts are inside quotes.
        if i % 2 == 1
            && part.len() >= MIN_REFERENCE_DIGITS
            && let Ok(id) = ItemId::new(part)
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    #[test]
    fn test_file_name_roundtrip() {
        assert_eq!(file_name(&id("100")), "appmanifest_100.acf");
        assert_eq!(id_from_file_name("appmanifest_100.acf"), Some(id("100")));
        assert_eq!(id_from_file_name("appmanifest_x.acf"), None);
        assert_eq!(id_from_file_name("100.acf"), None);
    }

    #[test]
    fn test_render_and_parse() {
        let manifest = AppManifest::new(id("100"), "Some \"Game\"", "SomeGame")
            .with_depots([id("200"), id("201")])
            .with_launcher(r"C:\Program Files\Steam\steam.exe");

        let text = manifest.to_acf_text();
        assert!(vdf::is_balanced(&text));
        assert!(text.contains("\t\"appid\"\t\t\"100\"\n"));
        assert!(text.contains("\t\"StateFlags\"\t\t\"4\"\n"));
        assert!(text.contains(r#""C:\\Program Files\\Steam\\steam.exe""#));

        let parsed = AppManifest::parse(&text).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_rewrite_differs_only_in_timestamp() {
        let mut first = AppManifest::new(id("100"), "Game", "Game");
        let mut second = first.clone();
        first.last_updated = 1_700_000_000;
        second.last_updated = 1_700_000_500;

        let a = first.to_acf_text();
        let b = second.to_acf_text();
        let diff: Vec<_> = a.lines().zip(b.lines()).filter(|(x, y)| x != y).collect();
        assert_eq!(diff.len(), 1);
        assert!(diff[0].0.contains("LastUpdated"));
    }

    #[test]
    fn test_parse_client_record_without_depots() {
        let text = "\"AppState\"\n{\n\t\"appid\"\t\t\"730\"\n\t\"name\"\t\t\"CS\"\n\t\"SizeOnDisk\"\t\t\"1024\"\n}\n";
        let parsed = AppManifest::parse(text).unwrap();
        assert_eq!(parsed.appid, id("730"));
        assert_eq!(parsed.size_on_disk, Some(1024));
        assert!(parsed.depots.is_empty());
    }

    #[test]
    fn test_parse_rejects_missing_appid() {
        assert!(AppManifest::parse("\"AppState\" { \"name\" \"x\" }").is_err());
        assert!(AppManifest::parse("\"Other\" { }").is_err());
    }

    #[test]
    fn test_referenced_ids() {
        let text = "\"AppState\" { \"appid\" \"1000\" \"StateFlags\" \"4\" \"dlc\" \"228980\" \"x\" \"1000\" }";
        assert_eq!(referenced_ids(text), vec![id("1000"), id("228980")]);
    }
}
