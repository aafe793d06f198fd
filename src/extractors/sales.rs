use scraper::{ElementRef, Html, Selector};

use super::{element_text, parse_selector, ExtractionError};
use crate::config::{PaymentIconConfig, ScraperConfig, SelectorConfig};
use crate::models::{PaymentMethod, SaleRecord};
use crate::session::DashboardSession;

/// Cells 0..=4 carry the textual sale fields.
const MIN_CELLS: usize = 5;
const PAYMENT_CELL: usize = 5;

/// Reads the sales table into records, first row first.
#[derive(Debug, Clone)]
pub struct SalesExtractor {
    view_url: String,
    selectors: SelectorConfig,
    icons: PaymentIconConfig,
}

impl SalesExtractor {
    pub fn new(view_url: impl Into<String>, config: &ScraperConfig) -> Self {
        Self {
            view_url: view_url.into(),
            selectors: config.selectors.clone(),
            icons: config.payment_icons.clone(),
        }
    }

    pub fn extract(
        &self,
        session: &mut dyn DashboardSession,
    ) -> Result<Vec<SaleRecord>, ExtractionError> {
        session.navigate(&self.view_url)?;
        let html = session.page_html()?;
        self.parse(&html)
    }

    pub fn parse(&self, html: &str) -> Result<Vec<SaleRecord>, ExtractionError> {
        let document = Html::parse_document(html);
        let table_selector = parse_selector(&self.selectors.sales_table)?;
        let row_selector = parse_selector(&self.selectors.sales_rows)?;
        let path_selector = parse_selector("path")?;

        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| ExtractionError::MissingTable {
                selector: self.selectors.sales_table.clone(),
                url: self.view_url.clone(),
            })?;

        let mut sales = Vec::new();
        let mut skipped = 0usize;

        for row in table.select(&row_selector) {
            let cells: Vec<ElementRef> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "td")
                .collect();

            if cells.len() < MIN_CELLS {
                skipped += 1;
                continue;
            }

            let texts: Vec<String> = cells[..MIN_CELLS].iter().map(element_text).collect();
            // Layout rows (placeholders, measure rows) have no text at all
            if texts.iter().all(String::is_empty) {
                skipped += 1;
                continue;
            }

            let payment_method = cells
                .get(PAYMENT_CELL)
                .map(|cell| self.payment_method(cell, &path_selector))
                .unwrap_or_default();

            let mut texts = texts.into_iter();
            sales.push(SaleRecord {
                number: texts.next().unwrap_or_default(),
                address: texts.next().unwrap_or_default(),
                timestamp: texts.next().unwrap_or_default(),
                liters: texts.next().unwrap_or_default(),
                total: texts.next().unwrap_or_default(),
                payment_method,
            });
        }

        tracing::debug!(rows = sales.len(), skipped, "Parsed sales table");
        Ok(sales)
    }

    fn payment_method(&self, cell: &ElementRef, path_selector: &Selector) -> PaymentMethod {
        cell.select(path_selector)
            .filter_map(|path| path.value().attr("d"))
            .find_map(|d| classify_icon(d, &self.icons))
            .unwrap_or(PaymentMethod::Unknown)
    }
}

/// Matches SVG path data against the known payment icon fingerprints.
pub fn classify_icon(path_data: &str, icons: &PaymentIconConfig) -> Option<PaymentMethod> {
    let normalized = path_data.split_whitespace().collect::<Vec<_>>().join(" ");
    [
        (&icons.card, PaymentMethod::Card),
        (&icons.cash, PaymentMethod::Cash),
        (&icons.coin, PaymentMethod::Coin),
    ]
    .into_iter()
    .find(|(signature, _)| !signature.is_empty() && normalized.contains(signature.as_str()))
    .map(|(_, method)| method)
}
