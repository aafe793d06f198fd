use scraper::{ElementRef, Selector};
use thiserror::Error;

use crate::session::SessionError;

pub mod sales;
pub mod terminals;

pub use sales::SalesExtractor;
pub use terminals::TerminalExtractor;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Page could not be read: {0}")]
    Session(#[from] SessionError),

    #[error("No element matches {selector} on {url}")]
    MissingTable { selector: String, url: String },

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
        selector: selector.to_string(),
        message: format!("{:?}", e),
    })
}

/// Rendered text of an element with runs of whitespace collapsed, close to
/// what a browser reports as `innerText` for table cells and links.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
