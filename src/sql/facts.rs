//! Fact tables aggregated from the published sales rows

use crate::catalog::{PRODUCT, SALES, STORE};
use crate::config::Layout;

pub const MONTHLY_SALES_TABLE: &str = "DWH_F_SLS_TRXN_MONTH_B";
pub const STORE_PRODUCT_MONTH_TABLE: &str = "DWH_F_AGG_SLS_PLC_MONTH_T";

/// Total sales per calendar month
pub fn monthly_sales_statements(layout: &Layout) -> Vec<String> {
    let table = layout.fact_table(MONTHLY_SALES_TABLE);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    month DATE NOT NULL,\n    total_sales_amount NUMBER(20,2),\n    PRIMARY KEY (month)\n)",
            table
        ),
        format!("TRUNCATE TABLE IF EXISTS {}", table),
        format!(
            "INSERT INTO {} (month, total_sales_amount)\nSELECT DATE_TRUNC('MONTH', transaction_time)::DATE, SUM(amount)\nFROM {}\nWHERE active_flag AND transaction_time IS NOT NULL\nGROUP BY DATE_TRUNC('MONTH', transaction_time)::DATE",
            table,
            layout.target_table(&SALES)
        ),
    ]
}

/// Quantity and amount per store, product and `YYYY-MM`
pub fn store_product_month_statements(layout: &Layout) -> Vec<String> {
    let table = layout.fact_table(STORE_PRODUCT_MONTH_TABLE);
    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    store_key NUMBER NOT NULL,\n    product_key NUMBER NOT NULL,\n    year_month VARCHAR(7) NOT NULL,\n    total_quantity NUMBER,\n    total_amount NUMBER(20,2),\n    active_flag BOOLEAN DEFAULT TRUE,\n    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    PRIMARY KEY (store_key, product_key, year_month),\n    FOREIGN KEY (store_key) REFERENCES {}({}),\n    FOREIGN KEY (product_key) REFERENCES {}({})\n)",
            table,
            layout.target_table(&STORE),
            STORE.surrogate_key,
            layout.target_table(&PRODUCT),
            PRODUCT.surrogate_key
        ),
        format!("TRUNCATE TABLE IF EXISTS {}", table),
        format!(
            "INSERT INTO {} (store_key, product_key, year_month, total_quantity, total_amount)\nSELECT store_key, product_key, TO_CHAR(DATE_TRUNC('MONTH', transaction_time), 'YYYY-MM'), SUM(quantity), SUM(amount)\nFROM {}\nWHERE active_flag AND transaction_time IS NOT NULL\n  AND store_key IS NOT NULL AND product_key IS NOT NULL\nGROUP BY store_key, product_key, TO_CHAR(DATE_TRUNC('MONTH', transaction_time), 'YYYY-MM')",
            table,
            layout.target_table(&SALES)
        ),
    ]
}
