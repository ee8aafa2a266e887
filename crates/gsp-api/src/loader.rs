//! Parses an uploaded batch file into `NewOrder`s (spec.md §6 input file
//! format): CSV, at least `consultora_code`/`product_code`/`quantity`
//! columns (case/whitespace-insensitive names), optional
//! `consultora_name`. Rows sharing a `consultora_code` group into one
//! order; quantity defaults to 1 when missing or non-numeric.

use std::collections::HashMap;

use gsp_store::{NewOrder, NewProduct};

use crate::error::{ApiError, ApiResult};

const DEFAULT_MAX_RETRIES: i32 = 3;

fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Parses CSV bytes into one `NewOrder` per distinct `consultora_code`,
/// preserving first-seen order.
pub fn parse_orders_csv(bytes: &[u8]) -> ApiResult<Vec<NewOrder>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let code_idx = headers
        .iter()
        .position(|h| h == "consultora_code")
        .ok_or_else(|| ApiError::Validation("missing required column consultora_code".into()))?;
    let product_idx = headers
        .iter()
        .position(|h| h == "product_code")
        .ok_or_else(|| ApiError::Validation("missing required column product_code".into()))?;
    let quantity_idx = headers.iter().position(|h| h == "quantity");
    let name_idx = headers.iter().position(|h| h == "consultora_name");

    let mut order_index: HashMap<String, usize> = HashMap::new();
    let mut orders: Vec<NewOrder> = Vec::new();

    for record in reader.records() {
        let record = record?;
        let consultora_code = record
            .get(code_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Validation("row missing consultora_code".into()))?
            .to_string();
        let product_code = record
            .get(product_idx)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::Validation("row missing product_code".into()))?
            .to_string();
        let quantity = quantity_idx
            .and_then(|i| record.get(i))
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(1);
        let consultora_name = name_idx
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let idx = *order_index.entry(consultora_code.clone()).or_insert_with(|| {
            orders.push(NewOrder {
                consultora_code: consultora_code.clone(),
                consultora_name: consultora_name.clone(),
                max_retries: DEFAULT_MAX_RETRIES,
                products: Vec::new(),
            });
            orders.len() - 1
        });
        orders[idx].products.push(NewProduct {
            product_code,
            quantity,
        });
    }

    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_rows_by_consultora_code() {
        let csv = "Consultora Code,Product Code,Quantity\nC001,P1,2\nC001,P2,3\nC002,P1,1\n";
        let orders = parse_orders_csv(csv.as_bytes()).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].consultora_code, "C001");
        assert_eq!(orders[0].products.len(), 2);
        assert_eq!(orders[1].consultora_code, "C002");
    }

    #[test]
    fn quantity_defaults_to_one_when_missing_or_non_numeric() {
        let csv = "consultora_code,product_code,quantity\nC001,P1,\nC001,P2,abc\n";
        let orders = parse_orders_csv(csv.as_bytes()).unwrap();
        assert_eq!(orders[0].products[0].quantity, 1);
        assert_eq!(orders[0].products[1].quantity, 1);
    }

    #[test]
    fn rejects_missing_required_columns() {
        let csv = "foo,bar\n1,2\n";
        assert!(parse_orders_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn carries_optional_consultora_name() {
        let csv = "consultora_code,consultora_name,product_code,quantity\nC001,Jane Doe,P1,1\n";
        let orders = parse_orders_csv(csv.as_bytes()).unwrap();
        assert_eq!(orders[0].consultora_name.as_deref(), Some("Jane Doe"));
    }
}
