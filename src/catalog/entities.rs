//! Entity definitions for the retail sales warehouse

use super::types::*;

// =============================================================================
// Location dimensions
// =============================================================================

pub static COUNTRY: EntitySchema = EntitySchema {
    name: "country",
    table_stem: "COUNTRY",
    surrogate_key: "country_key",
    source_file: "country_data.csv",
    kind: EntityKind::Dimension,
    references: &[],
    columns: &[Column::new("country_desc", ColumnType::Varchar(256))],
};

pub static REGION: EntitySchema = EntitySchema {
    name: "region",
    table_stem: "REGION",
    surrogate_key: "region_key",
    source_file: "region_data.csv",
    kind: EntityKind::Dimension,
    references: &[Reference::required("country_id", "country")],
    columns: &[Column::new("region_desc", ColumnType::Varchar(256))],
};

pub static STORE: EntitySchema = EntitySchema {
    name: "store",
    table_stem: "STORE",
    surrogate_key: "store_key",
    source_file: "store_data.csv",
    kind: EntityKind::Dimension,
    references: &[Reference::required("region_id", "region")],
    columns: &[Column::new("store_desc", ColumnType::Varchar(256))],
};

// =============================================================================
// Product dimensions
// =============================================================================

pub static CATEGORY: EntitySchema = EntitySchema {
    name: "category",
    table_stem: "CATEGORY",
    surrogate_key: "category_key",
    source_file: "category_data.csv",
    kind: EntityKind::Dimension,
    references: &[],
    columns: &[Column::new("category_desc", ColumnType::Varchar(1024))],
};

pub static SUBCATEGORY: EntitySchema = EntitySchema {
    name: "subcategory",
    table_stem: "SUBCATEGORY",
    surrogate_key: "subcategory_key",
    source_file: "subcategory_data.csv",
    kind: EntityKind::Dimension,
    references: &[Reference::required("category_id", "category")],
    columns: &[Column::new("subcategory_desc", ColumnType::Varchar(256))],
};

pub static PRODUCT: EntitySchema = EntitySchema {
    name: "product",
    table_stem: "PRODUCT",
    surrogate_key: "product_key",
    source_file: "product_data.csv",
    kind: EntityKind::Dimension,
    references: &[Reference::required("subcategory_id", "subcategory")],
    columns: &[Column::new("product_desc", ColumnType::Varchar(256))],
};

// =============================================================================
// Customer dimension
// =============================================================================

pub static CUSTOMER: EntitySchema = EntitySchema {
    name: "customer",
    table_stem: "CUSTOMER",
    surrogate_key: "customer_key",
    source_file: "customer_data.csv",
    kind: EntityKind::Dimension,
    references: &[],
    columns: &[
        Column::new("customer_first_name", ColumnType::Varchar(256)),
        Column::new("customer_middle_name", ColumnType::Varchar(256)),
        Column::new("customer_last_name", ColumnType::Varchar(256)),
        Column::new("customer_address", ColumnType::Varchar(256)),
    ],
};

// =============================================================================
// Transactions (depend on the dimensions above)
// =============================================================================

pub static SALES: EntitySchema = EntitySchema {
    name: "sales",
    table_stem: "SALES",
    surrogate_key: "sales_key",
    source_file: "sales_data.csv",
    kind: EntityKind::Transaction,
    references: &[
        Reference::required("store_id", "store"),
        Reference::required("product_id", "product"),
        Reference::optional("customer_id", "customer"),
    ],
    columns: &[
        Column::new("transaction_time", ColumnType::Timestamp),
        Column::new("quantity", ColumnType::Number),
        Column::new("amount", ColumnType::Decimal(20, 2)),
        Column::new("discount", ColumnType::Decimal(20, 2)),
    ],
};

pub static LOCATION_HIERARCHY: EntitySchema = EntitySchema {
    name: "location_hierarchy",
    table_stem: "LOCATION_HIERARCHY",
    surrogate_key: "location_key",
    source_file: "location_hierarchy_data.csv",
    kind: EntityKind::Transaction,
    references: &[
        Reference::optional("sales_id", "sales"),
        Reference::optional("store_id", "store"),
        Reference::optional("region_id", "region"),
        Reference::optional("country_id", "country"),
    ],
    columns: &[],
};

// =============================================================================
// Registry
// =============================================================================

/// All entities, parents before children
pub static ALL_ENTITIES: &[&EntitySchema] = &[
    &COUNTRY,
    &REGION,
    &STORE,
    &CATEGORY,
    &SUBCATEGORY,
    &PRODUCT,
    &CUSTOMER,
    &SALES,
    &LOCATION_HIERARCHY,
];

/// Get entity schema by name
pub fn get_entity(name: &str) -> Option<&'static EntitySchema> {
    ALL_ENTITIES.iter().find(|e| e.name == name).copied()
}

/// Get all entity names
pub fn entity_names() -> Vec<&'static str> {
    ALL_ENTITIES.iter().map(|e| e.name).collect()
}
