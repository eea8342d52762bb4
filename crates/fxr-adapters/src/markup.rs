use scraper::{ElementRef, Html, Selector};

use crate::ExtractError;

pub(crate) fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::Selector(e.to_string()))
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Cells of every table row that has at least one cell matching `cell_css`,
/// in document order.
pub(crate) fn table_rows<'a>(
    document: &'a Html,
    cell_css: &str,
) -> Result<Vec<Vec<ElementRef<'a>>>, ExtractError> {
    let row_sel = selector("tr")?;
    let cell_sel = selector(cell_css)?;
    Ok(document
        .select(&row_sel)
        .map(|row| row.select(&cell_sel).collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect())
}
