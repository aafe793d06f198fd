//! Rendering of new records into Telegram-flavoured HTML messages.

use std::fmt::Write;

use crate::models::{SaleRecord, TerminalProblem};

pub const NO_NEW_SALES: &str = "No new sales.";
pub const NO_TERMINAL_PROBLEMS: &str = "No terminal problems detected.";

pub fn format_sales(sales: &[SaleRecord]) -> String {
    if sales.is_empty() {
        return NO_NEW_SALES.to_string();
    }

    let mut message = String::from("<b>New sales:</b>\n\n");
    for sale in sales {
        let _ = write!(
            message,
            "<b>No.:</b> {}\n<b>Address:</b> {}\n<b>Time:</b> {}\n<b>Liters:</b> {}\n<b>Total:</b> {}\n<b>Payment:</b> {}\n\n",
            escape_html(&sale.number),
            escape_html(&sale.address),
            escape_html(&sale.timestamp),
            escape_html(&sale.liters),
            escape_html(&sale.total),
            sale.payment_method,
        );
    }
    let _ = write!(message, "<b>New sales: {}</b>", sales.len());
    message
}

pub fn format_problems(problems: &[TerminalProblem]) -> String {
    if problems.is_empty() {
        return NO_TERMINAL_PROBLEMS.to_string();
    }

    let mut message = String::from("<b>Terminal problems detected:</b>\n\n");
    for problem in problems {
        let _ = write!(
            message,
            "<b>Terminal:</b> {}\n<b>Link:</b> {}\n\n",
            escape_html(&problem.terminal_name),
            escape_html(&problem.terminal_url),
        );
    }
    let _ = write!(message, "<b>Terminals with problems: {}</b>", problems.len());
    message
}

/// Escapes the characters Telegram's HTML parse mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
