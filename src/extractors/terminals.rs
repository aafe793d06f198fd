use scraper::{ElementRef, Html};
use url::Url;

use super::{element_text, parse_selector, ExtractionError};
use crate::config::{ScraperConfig, SelectorConfig};
use crate::models::TerminalProblem;
use crate::session::DashboardSession;

/// Finds terminals flagged with a warning icon on the terminals view.
///
/// A terminal counts as flagged when the serialized markup of any warning
/// icon on the page occurs inside its link's parent element. This is a
/// textual containment test, not an ownership check: identical icon markup
/// elsewhere can match a parent that merely contains a copy of it.
#[derive(Debug, Clone)]
pub struct TerminalExtractor {
    view_url: String,
    selectors: SelectorConfig,
}

impl TerminalExtractor {
    pub fn new(view_url: impl Into<String>, config: &ScraperConfig) -> Self {
        Self {
            view_url: view_url.into(),
            selectors: config.selectors.clone(),
        }
    }

    pub fn extract(
        &self,
        session: &mut dyn DashboardSession,
    ) -> Result<Vec<TerminalProblem>, ExtractionError> {
        session.navigate(&self.view_url)?;
        let html = session.page_html()?;
        self.parse(&html)
    }

    pub fn parse(&self, html: &str) -> Result<Vec<TerminalProblem>, ExtractionError> {
        let document = Html::parse_document(html);
        let warning_selector = parse_selector(&self.selectors.warning_icon)?;

        let warnings: Vec<String> = document
            .select(&warning_selector)
            .map(|icon| icon.html())
            .collect();

        if warnings.is_empty() {
            tracing::debug!("No warning icons on terminals view");
            return Ok(Vec::new());
        }

        let link_selector = parse_selector(&self.selectors.terminal_link)?;
        let base = Url::parse(&self.view_url).ok();

        let problems: Vec<TerminalProblem> = document
            .select(&link_selector)
            .filter(|link| {
                link.parent()
                    .and_then(ElementRef::wrap)
                    .map(|parent| {
                        let container = parent.inner_html();
                        warnings.iter().any(|warning| container.contains(warning.as_str()))
                    })
                    .unwrap_or(false)
            })
            .map(|link| {
                let href = link.value().attr("href").unwrap_or_default();
                TerminalProblem {
                    terminal_name: element_text(&link),
                    terminal_url: resolve_href(base.as_ref(), href),
                }
            })
            .collect();

        tracing::debug!(
            warnings = warnings.len(),
            problems = problems.len(),
            "Parsed terminals view"
        );
        Ok(problems)
    }
}

/// Absolute form of a link, the way the browser reports `href`.
fn resolve_href(base: Option<&Url>, href: &str) -> String {
    base.and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}
