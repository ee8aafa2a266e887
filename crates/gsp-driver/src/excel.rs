//! Per-order upload spreadsheet generation (spec.md §4.3 step 7, §6
//! "Generated upload file").
//!
//! Exactly two columns, `CÓDIGO` and `QTDE`, one row per product, written
//! to a per-task temporary file that the caller deletes regardless of
//! the pipeline's eventual outcome.

use std::path::PathBuf;

use rust_xlsxwriter::Workbook;

use crate::error::DriverResult;

#[derive(Debug, Clone)]
pub struct ProductLine {
    pub product_code: String,
    pub quantity: i32,
}

/// Writes the two-column sheet to a fresh temp file and returns its path.
/// No header customization, no additional sheets — per spec.md §6.
pub fn write_order_sheet(products: &[ProductLine], temp_dir: &std::path::Path) -> DriverResult<PathBuf> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    sheet.write_string(0, 0, "CÓDIGO")?;
    sheet.write_string(0, 1, "QTDE")?;

    for (row, product) in products.iter().enumerate() {
        let row = (row + 1) as u32;
        sheet.write_string(row, 0, &product.product_code)?;
        sheet.write_number(row, 1, f64::from(product.quantity))?;
    }

    let filename = format!("gsp-order-{}.xlsx", uuid::Uuid::new_v4());
    let path = temp_dir.join(filename);
    workbook.save(&path)?;
    Ok(path)
}

/// Deletes the generated sheet, swallowing a missing file (already
/// cleaned up by a previous attempt) but not other IO errors.
pub async fn cleanup_order_sheet(path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove temp order sheet");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_expected_row_count() {
        let dir = std::env::temp_dir();
        let products = vec![
            ProductLine {
                product_code: "P1".into(),
                quantity: 2,
            },
            ProductLine {
                product_code: "P2".into(),
                quantity: 1,
            },
        ];
        let path = write_order_sheet(&products, &dir).expect("sheet written");
        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }
}
