// wwwidget-widgets/src/fortune.rs
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_width::UnicodeWidthStr;
use wwwidget_core::{
    Cadence, ConstructionError, FromSection, Geometry, InputEvent, OutputBatch, SectionConfig,
    Style, Worker, WorkerContext, WorkerError,
};

/// Line separating two cookies in a fortune file
const SEPARATOR: &str = "%";
/// Lines starting with this mark the attribution; they and everything after are dimmed
const ATTRIBUTION: &str = "--";

/// Cookies loaded from a `%`-separated fortune file
#[derive(Debug, Clone, Default)]
pub struct FortuneCookies {
    cookies: Vec<Vec<String>>,
    total: usize,
}

/// Limits a cookie must satisfy to be kept
#[derive(Debug, Clone, Default)]
pub struct CookieFilter<'a> {
    pub max_width: Option<usize>,
    pub max_height: Option<usize>,
    pub search_word: Option<&'a str>,
}

impl CookieFilter<'_> {
    fn accepts(&self, cookie: &[String]) -> bool {
        if self.max_height.is_some_and(|h| cookie.len() > h) {
            return false;
        }
        if let Some(w) = self.max_width
            && cookie.iter().any(|line| line.width() > w)
        {
            return false;
        }
        if let Some(word) = self.search_word
            && !cookie.iter().any(|line| line.contains(word))
        {
            return false;
        }
        true
    }
}

impl FortuneCookies {
    pub fn load(path: &Path, filter: &CookieFilter<'_>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content, filter))
    }

    /// Split `content` into cookies and keep those `filter` accepts.
    /// A final cookie without a closing `%` still counts.
    pub fn parse(content: &str, filter: &CookieFilter<'_>) -> Self {
        let mut found = Self::default();
        let mut current = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line == SEPARATOR {
                found.keep(std::mem::take(&mut current), filter);
            } else {
                current.push(line.to_string());
            }
        }
        if !current.is_empty() {
            found.keep(current, filter);
        }

        debug!(
            kept = found.cookies.len(),
            total = found.total,
            "fortune cookies loaded"
        );
        found
    }

    fn keep(&mut self, cookie: Vec<String>, filter: &CookieFilter<'_>) {
        self.total += 1;
        if filter.accepts(&cookie) {
            self.cookies.push(cookie);
        }
    }

    /// Number of cookies that passed the filter
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Number of cookies in the file, kept or not
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn choose(&self) -> Option<&[String]> {
        self.cookies.choose(&mut rand::rng()).map(Vec::as_slice)
    }
}

/// Render one cookie, dimming the attribution
pub fn cookie_batch(cookie: &[String]) -> OutputBatch {
    let mut batch = OutputBatch::new();
    let mut attribution = false;
    for (row, line) in cookie.iter().enumerate() {
        attribution |= line.starts_with(ATTRIBUTION);
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        if attribution {
            batch.write_styled(row, 0, line, Style::DIM);
        } else {
            batch.write_text(row, 0, line);
        }
    }
    batch
}

#[derive(Debug, Deserialize)]
struct FortuneSettings {
    fortune_file: PathBuf,
    #[serde(default = "default_label")]
    label: String,
    #[serde(default)]
    search_word: Option<String>,
}

fn default_label() -> String {
    "Fortune".to_string()
}

/// Shows a random fortune cookie, and a new one on every click
pub struct FortuneWorker {
    geometry: Geometry,
    label: String,
    cookies: FortuneCookies,
}

impl FromSection for FortuneWorker {
    fn from_section(section: &SectionConfig) -> Result<Self, ConstructionError> {
        let geometry = section.geometry()?;
        let settings: FortuneSettings = section.settings()?;

        let filter = CookieFilter {
            max_width: Some(usize::from(geometry.width - 2)),
            max_height: Some(usize::from(geometry.height - 2)),
            search_word: settings.search_word.as_deref(),
        };
        let cookies = FortuneCookies::load(&settings.fortune_file, &filter)
            .map_err(|e| ConstructionError::io(section, &settings.fortune_file, e))?;
        if cookies.is_empty() {
            return Err(ConstructionError::field(
                section,
                "fortune_file",
                format!(
                    "has no cookie that fits a {}x{} window ({} read)",
                    filter.max_width.unwrap_or_default(),
                    filter.max_height.unwrap_or_default(),
                    cookies.total()
                ),
            ));
        }

        Ok(Self {
            geometry,
            label: settings.label,
            cookies,
        })
    }
}

impl Worker for FortuneWorker {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn produce(&mut self, _ctx: &WorkerContext) -> Result<OutputBatch, WorkerError> {
        let cookie = self
            .cookies
            .choose()
            .ok_or_else(|| WorkerError::Failed("no fortune cookies loaded".to_string()))?;
        Ok(cookie_batch(cookie))
    }

    fn cadence(&self) -> Cadence {
        Cadence::OnInput
    }

    fn accepts_input(&self) -> bool {
        true
    }

    fn accept_input(&mut self, event: InputEvent) {
        debug!(?event, "new cookie requested");
    }
}
