use crate::error::{FinancialStatementError, Result};
use crate::schema::{FinCategory, StatementKind};
use crate::utils::{downcase_keys, parse_typed_items, parse_yearly_items, YearlyItems};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Processing stage of a persisted statement document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStage {
    /// As extracted from the document.
    Raw,
    /// Indexed by year, keys lower-cased.
    Cleaned,
    /// Each item tagged with its coarse category.
    Typed,
}

impl ArtifactStage {
    pub const ALL: [ArtifactStage; 3] = [
        ArtifactStage::Raw,
        ArtifactStage::Cleaned,
        ArtifactStage::Typed,
    ];

    pub fn prefix(&self) -> &'static str {
        match self {
            ArtifactStage::Raw => "",
            ArtifactStage::Cleaned => "clean_",
            ArtifactStage::Typed => "type_",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub statement: StatementKind,
    pub stage: ArtifactStage,
    pub document: String,
}

impl ArtifactKey {
    pub fn new(statement: StatementKind, stage: ArtifactStage, document: impl Into<String>) -> Self {
        Self {
            statement,
            stage,
            document: document.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}.json", self.stage.prefix(), self.document)
    }

    pub fn folder(statement: StatementKind) -> String {
        format!("{}-rep", statement.slug())
    }

    /// `<statement>-rep/<prefix><document>.json`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(Self::folder(self.statement)).join(self.file_name())
    }

    /// Same document at another stage.
    pub fn at_stage(&self, stage: ArtifactStage) -> Self {
        Self::new(self.statement, stage, self.document.clone())
    }

    /// Parses a file name back into a key. Prefixed names are matched first,
    /// so anything else is a raw artifact.
    pub fn from_file_name(statement: StatementKind, file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".json")?;
        for stage in [ArtifactStage::Cleaned, ArtifactStage::Typed] {
            if let Some(document) = stem.strip_prefix(stage.prefix()) {
                return Some(Self::new(statement, stage, document));
            }
        }
        Some(Self::new(statement, ArtifactStage::Raw, stem))
    }
}

/// Directory-backed store for intermediate statement documents.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Path of `key`, refusing document names that would leave the
    /// statement folder.
    fn checked_path(&self, key: &ArtifactKey) -> Result<PathBuf> {
        let document = key.document.as_str();
        if matches!(document, "" | "." | "..") || document.contains(['/', '\\']) {
            return Err(FinancialStatementError::InvalidArtifact(format!(
                "document name '{}' is not a plain file name",
                document
            )));
        }
        Ok(self.path_of(key))
    }

    /// Writes the document as pretty JSON. Cleaned and typed documents are
    /// lower-cased first.
    pub fn save(&self, key: &ArtifactKey, document: &Value) -> Result<PathBuf> {
        let path = self.checked_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let body = match key.stage {
            ArtifactStage::Raw => serde_json::to_string_pretty(document)?,
            ArtifactStage::Cleaned | ArtifactStage::Typed => {
                serde_json::to_string_pretty(&downcase_keys(document.clone()))?
            }
        };
        fs::write(&path, body)?;

        info!("Saved {} artifact to {}", key.file_name(), path.display());
        Ok(path)
    }

    pub fn load(&self, key: &ArtifactKey) -> Result<Value> {
        let raw = fs::read_to_string(self.checked_path(key)?)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.checked_path(key).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Keys of every artifact of one statement and stage, sorted by document.
    pub fn list(&self, statement: StatementKind, stage: ArtifactStage) -> Result<Vec<ArtifactKey>> {
        let folder = self.root.join(ArtifactKey::folder(statement));
        if !folder.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(folder)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(key) = name
                .to_str()
                .and_then(|n| ArtifactKey::from_file_name(statement, n))
            {
                if key.stage == stage {
                    keys.push(key);
                }
            }
        }
        keys.sort_by(|a, b| a.document.cmp(&b.document));
        Ok(keys)
    }

    pub fn load_yearly_items(&self, key: &ArtifactKey) -> Result<YearlyItems> {
        self.expect_stage(key, ArtifactStage::Cleaned)?;
        parse_yearly_items(&self.load(key)?)
    }

    pub fn load_typed_items(&self, key: &ArtifactKey) -> Result<Vec<(String, Option<FinCategory>)>> {
        self.expect_stage(key, ArtifactStage::Typed)?;
        parse_typed_items(&self.load(key)?)
    }

    fn expect_stage(&self, key: &ArtifactKey, stage: ArtifactStage) -> Result<()> {
        if key.stage == stage {
            Ok(())
        } else {
            Err(FinancialStatementError::InvalidArtifact(format!(
                "{} is a {:?} artifact, expected {:?}",
                key.file_name(),
                key.stage,
                stage
            )))
        }
    }
}
