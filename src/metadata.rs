use crate::error::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

/// Title metadata as returned by a provider. Read-only to the processor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataRecord {
    pub title: String,
    pub year: Option<String>,
    pub plot: String,
    #[serde(alias = "imdbRating")]
    pub imdb_rating: Option<String>,
    #[serde(alias = "rottenTomatoes")]
    pub rotten_tomatoes: Option<String>,
    pub runtime: Option<String>,
    pub media_type: Option<String>,
    pub director: Option<String>,
    pub actors: Option<String>,
    pub released: Option<String>,
    pub genre: Option<String>,
    #[serde(alias = "imdbID")]
    pub imdb_id: Option<String>,
}

/// What a file is believed to contain, derived from its name or supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaIdentity {
    pub title: String,
    pub year: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaIdentity {
    pub fn is_series(&self) -> bool {
        self.season.is_some() || self.episode.is_some()
    }
}

/// Source of title metadata. Implementations own their network or storage access.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch(&self, identity: &MediaIdentity) -> Result<Option<MetadataRecord>>;
    fn name(&self) -> &'static str;
}

/// Turns a raw file stem into a lookup identity.
pub trait TitleCleaner: Send + Sync {
    fn clean(&self, raw_name: &str) -> MediaIdentity;
}

static TRAILING_LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[._\-\s](en|eng|english|ita|it|fr|es|de|multi)$")
        .expect("Invalid language regex")
});
static EPISODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bS(\d{1,2})E(\d{1,3})\b|\b(\d{1,2})x(\d{2,3})\b")
        .expect("Invalid episode regex")
});
static PAREN_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})\)").expect("Invalid year regex"));
static BARE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("Invalid year regex"));
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._\-]+").expect("Invalid separator regex"));

/// Filename cleaner that understands years, episode tags and separators.
/// Release-group and quality tags after the year are cut off with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicTitleCleaner;

impl TitleCleaner for BasicTitleCleaner {
    fn clean(&self, raw_name: &str) -> MediaIdentity {
        let mut name = TRAILING_LANG_RE.replace(raw_name.trim(), "").into_owned();
        let mut identity = MediaIdentity::default();

        let episode_tag = EPISODE_RE.captures(&name).map(|caps| {
            let number = |a: usize, b: usize| {
                caps.get(a)
                    .or_else(|| caps.get(b))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
            };
            let start = caps.get(0).map_or(0, |m| m.start());
            (number(1, 3), number(2, 4), start)
        });
        if let Some((season, episode, start)) = episode_tag {
            identity.season = season;
            identity.episode = episode;
            name.truncate(start);
        }

        let year_tag = PAREN_YEAR_RE
            .captures(&name)
            .and_then(|caps| Some((caps.get(1)?.as_str().to_string(), caps.get(0)?.start())))
            .or_else(|| {
                BARE_YEAR_RE
                    .find_iter(&name)
                    .find(|m| !clean_separators(&name[..m.start()]).is_empty())
                    .map(|m| (m.as_str().to_string(), m.start()))
            });
        if let Some((year, start)) = year_tag {
            identity.year = Some(year);
            name.truncate(start);
        }

        identity.title = clean_separators(&name);
        debug!("Cleaned '{}' -> {:?}", raw_name, identity);
        identity
    }
}

fn clean_separators(s: &str) -> String {
    SEPARATOR_RE
        .replace_all(s, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Provider backed by a local JSON array of records.
#[derive(Debug, Clone, Default)]
pub struct CatalogProvider {
    records: Vec<MetadataRecord>,
}

impl CatalogProvider {
    pub fn from_records(records: Vec<MetadataRecord>) -> Self {
        Self { records }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<MetadataRecord> = serde_json::from_str(&contents)?;
        info!("Loaded {} catalog records from {:?}", records.len(), path);
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl MetadataProvider for CatalogProvider {
    async fn fetch(&self, identity: &MediaIdentity) -> Result<Option<MetadataRecord>> {
        let wanted = normalize_title(&identity.title);
        let found = self.records.iter().find(|record| {
            if normalize_title(&record.title) != wanted {
                return false;
            }
            // Years must agree when both sides know one
            match (identity.year.as_deref(), record.year.as_deref()) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        });
        Ok(found.cloned())
    }

    fn name(&self) -> &'static str {
        "Catalog"
    }
}
