//! Classification rules and user settings.
//!
//! Settings are stored as TOML and hold the raw, user-edited rule rows. Before
//! anything is organized they are validated into an [`OrganizeConfig`], which
//! carries a [`RuleSet`] and [`ExclusionSet`] that are known to be consistent.
//!
//! # Settings File Format
//!
//! ```toml
//! target_dir = "/home/me/Desktop"
//! exclude_extensions = [".psd", ".blend", ".aep"]
//! on_conflict = "rename"
//! mode = "move"
//! archive_folder = "Archive"
//! exclude_hidden = true
//!
//! [[rules]]
//! category = "Images"
//! extensions = [".jpg", ".png", ".webp"]
//! ```

use crate::platform;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Category used for files whose extension matches no rule.
pub const FALLBACK_CATEGORY: &str = "Others";

/// Archive folder name used when none is configured.
pub const DEFAULT_ARCHIVE_FOLDER: &str = "Archive";

/// Errors detected while loading settings or validating rules.
///
/// Validation errors are always raised before any file is touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("organize mode is not set (choose move or inplace)")]
    MissingMode,

    #[error("conflict policy is not set (choose rename or overwrite)")]
    MissingConflictPolicy,

    #[error("unknown organize mode '{0}': expected move or inplace")]
    UnknownMode(String),

    #[error("unknown conflict policy '{0}': expected rename or overwrite")]
    UnknownConflictPolicy(String),

    #[error("no target directory configured")]
    MissingTargetDir,

    #[error("a rule has extensions but no category name")]
    EmptyCategoryName,

    #[error("invalid category name '{0}': must be a single folder name")]
    InvalidCategoryName(String),

    #[error("duplicate category name: {0}")]
    DuplicateCategory(String),

    #[error("extension {extension} is assigned to both {first} and {second}")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },

    #[error("extension must start with '.': {0}")]
    InvalidExtension(String),

    #[error("extension {0} is both classified and excluded")]
    ExcludedExtensionConflict(String),

    #[error("at least one classification rule is required")]
    NoRules,

    #[error("invalid archive folder name '{0}': must be a single folder name")]
    InvalidArchiveFolder(String),

    #[error("could not access settings file {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("invalid settings file {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("could not serialize settings: {0}")]
    Serialize(String),
}

/// Where organized files are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Relocate into `<target>/<archive folder>/<category>`.
    Move,
    /// Classify into `<target>/<category>`.
    InPlace,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "move" => Ok(Mode::Move),
            "inplace" => Ok(Mode::InPlace),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Move => write!(f, "move"),
            Mode::InPlace => write!(f, "inplace"),
        }
    }
}

/// How a destination that already exists is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Append `_1`, `_2`, ... to the file stem until the name is free.
    Rename,
    /// Delete whatever occupies the destination. The deleted file is not
    /// journaled and cannot be restored by undo.
    Overwrite,
}

impl FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rename" => Ok(ConflictPolicy::Rename),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            other => Err(ConfigError::UnknownConflictPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictPolicy::Rename => write!(f, "rename"),
            ConflictPolicy::Overwrite => write!(f, "overwrite"),
        }
    }
}

/// One user-edited rule row: a category and the extensions it collects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: &str, extensions: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Validated mapping from lowercase extension (with leading dot) to category.
///
/// Each extension maps to exactly one category. Iteration follows the order
/// the rules were declared in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    by_extension: HashMap<String, String>,
    order: Vec<String>,
}

impl RuleSet {
    /// Returns the category for `extension`, compared case-insensitively.
    pub fn category_for(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&extension.to_lowercase())
            .map(String::as_str)
    }

    /// Returns the category for `extension`, or [`FALLBACK_CATEGORY`].
    pub fn classify(&self, extension: &str) -> &str {
        self.category_for(extension).unwrap_or(FALLBACK_CATEGORY)
    }

    /// Iterates `(extension, category)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .map(|ext| (ext.as_str(), self.by_extension[ext].as_str()))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Human-readable preview of where each extension goes.
    pub fn preview(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .iter()
            .map(|(ext, category)| format!("{} -> {}/", ext, category))
            .collect();
        lines.push(format!("* -> {}/", FALLBACK_CATEGORY));
        lines
    }
}

/// Lowercase extensions that are never organized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    extensions: HashSet<String>,
}

impl ExclusionSet {
    /// Builds the set, lowercasing every entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidExtension`] for an entry without a leading dot.
    pub fn new<I, S>(extensions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().to_lowercase();
            if ext.is_empty() {
                continue;
            }
            if !ext.starts_with('.') {
                return Err(ConfigError::InvalidExtension(ext));
            }
            set.insert(ext);
        }
        Ok(Self { extensions: set })
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_lowercase())
    }
}

/// Validates user rule rows against the exclusion set.
///
/// Rows with neither a category nor extensions, and categories without
/// extensions, are ignored. Extensions are lowercased before every check.
///
/// # Errors
///
/// The first problem found is returned; see [`ConfigError`].
pub fn validate_rules(
    rules: &[CategoryRule],
    exclusions: &ExclusionSet,
) -> Result<RuleSet, ConfigError> {
    let mut rule_set = RuleSet::default();
    let mut seen_categories: HashSet<&str> = HashSet::new();

    for rule in rules {
        let category = rule.category.trim();
        let extensions: Vec<String> = rule
            .extensions
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if category.is_empty() && !extensions.is_empty() {
            return Err(ConfigError::EmptyCategoryName);
        }
        if category.is_empty() || extensions.is_empty() {
            continue;
        }
        if !is_single_folder_name(category) {
            return Err(ConfigError::InvalidCategoryName(category.to_string()));
        }
        if !seen_categories.insert(category) {
            return Err(ConfigError::DuplicateCategory(category.to_string()));
        }

        for ext in extensions {
            if !ext.starts_with('.') {
                return Err(ConfigError::InvalidExtension(ext));
            }
            if let Some(first) = rule_set.by_extension.get(&ext) {
                return Err(ConfigError::DuplicateExtension {
                    first: first.clone(),
                    second: category.to_string(),
                    extension: ext,
                });
            }
            if exclusions.contains(&ext) {
                return Err(ConfigError::ExcludedExtensionConflict(ext));
            }
            rule_set.order.push(ext.clone());
            rule_set.by_extension.insert(ext, category.to_string());
        }
    }

    if rule_set.is_empty() {
        return Err(ConfigError::NoRules);
    }

    Ok(rule_set)
}

/// Normalizes the archive folder name; blank means [`DEFAULT_ARCHIVE_FOLDER`].
pub fn normalize_archive_folder(name: &str) -> Result<String, ConfigError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(DEFAULT_ARCHIVE_FOLDER.to_string());
    }
    if !is_single_folder_name(name) {
        return Err(ConfigError::InvalidArchiveFolder(name.to_string()));
    }
    Ok(name.to_string())
}

/// False for `.`, `..` and anything containing a path separator.
fn is_single_folder_name(name: &str) -> bool {
    name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Everything one organize run needs. All fields are concrete.
#[derive(Debug, Clone)]
pub struct OrganizeConfig {
    pub target_dir: PathBuf,
    pub rules: RuleSet,
    pub exclusions: ExclusionSet,
    pub mode: Mode,
    pub conflict_policy: ConflictPolicy,
    /// Only used in [`Mode::Move`].
    pub archive_folder: String,
    pub exclude_hidden: bool,
}

impl OrganizeConfig {
    /// Creates a config with no exclusions, the default archive folder and
    /// hidden entries excluded.
    pub fn new(
        target_dir: impl Into<PathBuf>,
        rules: RuleSet,
        mode: Mode,
        conflict_policy: ConflictPolicy,
    ) -> Self {
        Self {
            target_dir: target_dir.into(),
            rules,
            exclusions: ExclusionSet::default(),
            mode,
            conflict_policy,
            archive_folder: DEFAULT_ARCHIVE_FOLDER.to_string(),
            exclude_hidden: true,
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    pub fn with_archive_folder(mut self, archive_folder: &str) -> Self {
        self.archive_folder = archive_folder.to_string();
        self
    }

    pub fn with_exclude_hidden(mut self, exclude_hidden: bool) -> Self {
        self.exclude_hidden = exclude_hidden;
        self
    }

    /// Directory category folders are created in.
    pub fn classification_root(&self) -> PathBuf {
        match self.mode {
            Mode::Move => self.target_dir.join(&self.archive_folder),
            Mode::InPlace => self.target_dir.clone(),
        }
    }
}

/// Persisted user settings.
///
/// `mode` and `on_conflict` stay unset until the user picks one; an unset
/// value is rejected by [`Settings::to_organize_config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
    pub exclude_extensions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_conflict: Option<ConflictPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub archive_folder: String,
    pub exclude_hidden: bool,
    pub rules: Vec<CategoryRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_dir: None,
            exclude_extensions: vec![".psd".into(), ".blend".into(), ".aep".into()],
            on_conflict: None,
            mode: None,
            archive_folder: DEFAULT_ARCHIVE_FOLDER.to_string(),
            exclude_hidden: true,
            rules: vec![
                CategoryRule::new("Images", &[".jpg", ".png", ".webp"]),
                CategoryRule::new("Videos", &[".mp4", ".mov"]),
            ],
        }
    }
}

impl Settings {
    /// Default settings targeting the user's desktop.
    pub fn defaults_for_user() -> Self {
        Self {
            target_dir: Some(platform::desktop_dir()),
            ..Self::default()
        }
    }

    /// Loads settings from `path`.
    ///
    /// A missing file is created with [`Settings::defaults_for_user`]. Keys
    /// absent from the file take their default value, and an unset target
    /// directory falls back to the desktop.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read or created and
    /// `ConfigError::Parse` if the TOML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let settings = Self::defaults_for_user();
            settings.save(path)?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if settings.target_dir.is_none() {
            settings.target_dir = Some(platform::desktop_dir());
        }

        Ok(settings)
    }

    /// Writes settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content).map_err(io_err)
    }

    /// Overwrites `path` with defaults and returns them.
    pub fn reset(path: &Path) -> Result<Self, ConfigError> {
        let settings = Self::defaults_for_user();
        settings.save(path)?;
        Ok(settings)
    }

    /// Validates these settings into a concrete organize configuration.
    ///
    /// # Errors
    ///
    /// Fails if the target, mode or conflict policy is unset, or if the
    /// rules, exclusions or archive folder are invalid.
    pub fn to_organize_config(&self) -> Result<OrganizeConfig, ConfigError> {
        let target_dir = self
            .target_dir
            .clone()
            .ok_or(ConfigError::MissingTargetDir)?;
        let mode = self.mode.ok_or(ConfigError::MissingMode)?;
        let conflict_policy = self.on_conflict.ok_or(ConfigError::MissingConflictPolicy)?;

        let exclusions = ExclusionSet::new(&self.exclude_extensions)?;
        let rules = validate_rules(&self.rules, &exclusions)?;
        let archive_folder = normalize_archive_folder(&self.archive_folder)?;

        Ok(OrganizeConfig {
            target_dir,
            rules,
            exclusions,
            mode,
            conflict_policy,
            archive_folder,
            exclude_hidden: self.exclude_hidden,
        })
    }

    /// Preview lines for the configured rules.
    pub fn rules_preview(&self) -> Result<Vec<String>, ConfigError> {
        let exclusions = ExclusionSet::new(&self.exclude_extensions)?;
        Ok(validate_rules(&self.rules, &exclusions)?.preview())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn no_exclusions() -> ExclusionSet {
        ExclusionSet::default()
    }

    #[test]
    fn test_validate_rules_lowercases_extensions() {
        let rules = vec![CategoryRule::new("Images", &[".JPG", ".png"])];
        let set = validate_rules(&rules, &no_exclusions()).unwrap();

        assert_eq!(set.category_for(".jpg"), Some("Images"));
        assert_eq!(set.category_for(".JPG"), Some("Images"));
        assert_eq!(set.classify(".txt"), FALLBACK_CATEGORY);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_validate_rules_skips_blank_rows() {
        let rules = vec![
            CategoryRule::new("", &[]),
            CategoryRule::new("Empty", &[]),
            CategoryRule::new("Images", &[".jpg"]),
        ];
        let set = validate_rules(&rules, &no_exclusions()).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_empty_category_with_extensions_is_rejected() {
        let rules = vec![CategoryRule::new("  ", &[".jpg"])];
        assert_eq!(
            validate_rules(&rules, &no_exclusions()),
            Err(ConfigError::EmptyCategoryName)
        );
    }

    #[test]
    fn test_validate_rules_rejects_path_like_categories() {
        for name in ["../outside", "a/b", "a\\b", "..", "."] {
            let rules = vec![CategoryRule::new(name, &[".jpg"])];
            assert_eq!(
                validate_rules(&rules, &no_exclusions()),
                Err(ConfigError::InvalidCategoryName(name.to_string())),
                "category {:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_duplicate_category_is_rejected() {
        let rules = vec![
            CategoryRule::new("Images", &[".jpg"]),
            CategoryRule::new("Images", &[".png"]),
        ];
        assert_eq!(
            validate_rules(&rules, &no_exclusions()),
            Err(ConfigError::DuplicateCategory("Images".to_string()))
        );
    }

    #[test]
    fn test_duplicate_extension_across_categories_is_rejected() {
        let rules = vec![
            CategoryRule::new("Images", &[".jpg"]),
            CategoryRule::new("Photos", &[".JPG"]),
        ];
        assert_eq!(
            validate_rules(&rules, &no_exclusions()),
            Err(ConfigError::DuplicateExtension {
                extension: ".jpg".to_string(),
                first: "Images".to_string(),
                second: "Photos".to_string(),
            })
        );
    }

    #[test]
    fn test_extension_without_dot_is_rejected() {
        let rules = vec![CategoryRule::new("Images", &["jpg"])];
        assert_eq!(
            validate_rules(&rules, &no_exclusions()),
            Err(ConfigError::InvalidExtension("jpg".to_string()))
        );
    }

    #[test]
    fn test_rule_overlapping_exclusion_is_rejected() {
        let rules = vec![CategoryRule::new("Design", &[".psd"])];
        let exclusions = ExclusionSet::new([".PSD"]).unwrap();
        assert_eq!(
            validate_rules(&rules, &exclusions),
            Err(ConfigError::ExcludedExtensionConflict(".psd".to_string()))
        );
    }

    #[test]
    fn test_no_rules_is_rejected() {
        assert_eq!(
            validate_rules(&[], &no_exclusions()),
            Err(ConfigError::NoRules)
        );
    }

    #[test]
    fn test_mode_and_policy_parsing() {
        assert_eq!("move".parse::<Mode>(), Ok(Mode::Move));
        assert_eq!("InPlace".parse::<Mode>(), Ok(Mode::InPlace));
        assert_eq!(
            "copy".parse::<Mode>(),
            Err(ConfigError::UnknownMode("copy".to_string()))
        );
        assert_eq!("rename".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Rename));
        assert_eq!(
            "skip".parse::<ConflictPolicy>(),
            Err(ConfigError::UnknownConflictPolicy("skip".to_string()))
        );
    }

    #[test]
    fn test_archive_folder_normalization() {
        assert_eq!(normalize_archive_folder("  ").unwrap(), "Archive");
        assert_eq!(normalize_archive_folder(" Sorted ").unwrap(), "Sorted");
        assert!(normalize_archive_folder("a/b").is_err());
        assert!(normalize_archive_folder("..").is_err());
    }

    #[test]
    fn test_unset_mode_or_policy_is_rejected() {
        let mut settings = Settings {
            target_dir: Some(PathBuf::from("/tmp")),
            ..Settings::default()
        };
        assert_eq!(
            settings.to_organize_config().unwrap_err(),
            ConfigError::MissingMode
        );

        settings.mode = Some(Mode::Move);
        assert_eq!(
            settings.to_organize_config().unwrap_err(),
            ConfigError::MissingConflictPolicy
        );

        settings.on_conflict = Some(ConflictPolicy::Rename);
        let config = settings.to_organize_config().unwrap();
        assert_eq!(config.mode, Mode::Move);
        assert_eq!(config.archive_folder, "Archive");
        assert!(config.exclusions.contains(".blend"));
        assert_eq!(config.rules.category_for(".mov"), Some("Videos"));
    }

    #[test]
    fn test_classification_root_depends_on_mode() {
        let rules = validate_rules(&[CategoryRule::new("Images", &[".jpg"])], &no_exclusions())
            .unwrap();
        let config = OrganizeConfig::new("/data", rules, Mode::Move, ConflictPolicy::Rename)
            .with_archive_folder("Sorted");
        assert_eq!(config.classification_root(), PathBuf::from("/data/Sorted"));

        let config = OrganizeConfig {
            mode: Mode::InPlace,
            ..config
        };
        assert_eq!(config.classification_root(), PathBuf::from("/data"));
    }

    #[test]
    fn test_settings_roundtrip_through_toml() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("settings.toml");

        let settings = Settings {
            target_dir: Some(temp_dir.path().to_path_buf()),
            mode: Some(Mode::InPlace),
            on_conflict: Some(ConflictPolicy::Overwrite),
            ..Settings::default()
        };
        settings.save(&path).expect("Failed to save settings");

        let loaded = Settings::load(&path).expect("Failed to load settings");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "mode = \"move\"\n").unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.mode, Some(Mode::Move));
        assert_eq!(loaded.on_conflict, None);
        assert_eq!(loaded.archive_folder, "Archive");
        assert!(loaded.exclude_hidden);
        assert_eq!(loaded.rules.len(), 2);
        assert!(loaded.target_dir.is_some());
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");

        let loaded = Settings::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(loaded.mode, None);
        assert_eq!(loaded.rules, Settings::default().rules);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("settings.toml");
        fs::write(&path, "mode = [").unwrap();

        assert!(matches!(
            Settings::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_rules_preview_lists_fallback_last() {
        let preview = Settings::default().rules_preview().unwrap();
        assert_eq!(preview.first().map(String::as_str), Some(".jpg -> Images/"));
        assert_eq!(preview.last().map(String::as_str), Some("* -> Others/"));
        assert_eq!(preview.len(), 6);
    }
}
