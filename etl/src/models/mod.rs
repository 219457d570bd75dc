//! Table and column names of the FlexiMart schema.
//!
//! Source extracts and target tables share most column names, so the
//! constants are grouped per entity rather than per side.
//!
//! - [`customer`] - natural key `email`, surrogate `customer_id`
//! - [`product`] - natural key `product_name`, surrogate `product_id`
//! - [`sale`] - line facts from the source
//! - [`order`] - headers rolled up from sales
//! - [`order_item`] - one line per surviving sale

/// Default `status` of a freshly synthesized order.
pub const DEFAULT_ORDER_STATUS: &str = "Pending";

// =============================================================================
// Customers
// =============================================================================

pub mod customer {
    pub const TABLE: &str = "customers";
    /// Source identifier, replaced by the store-assigned surrogate.
    pub const ID: &str = "customer_id";
    pub const SHADOW_ID: &str = "old_customer_id";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const REGISTRATION_DATE: &str = "registration_date";
}

// =============================================================================
// Products
// =============================================================================

pub mod product {
    pub const TABLE: &str = "products";
    pub const ID: &str = "product_id";
    pub const SHADOW_ID: &str = "old_product_id";
    pub const NAME: &str = "product_name";
    pub const CATEGORY: &str = "category";
    pub const PRICE: &str = "price";
    pub const STOCK_QUANTITY: &str = "stock_quantity";
}

// =============================================================================
// Sales
// =============================================================================

pub mod sale {
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const PRODUCT_ID: &str = "product_id";
    pub const TRANSACTION_DATE: &str = "transaction_date";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const SUBTOTAL: &str = "subtotal";
    /// Resolved customer surrogate key.
    pub const CUSTOMER_KEY: &str = "customer_key";
    /// Resolved product surrogate key.
    pub const PRODUCT_KEY: &str = "product_key";
}

// =============================================================================
// Orders
// =============================================================================

pub mod order {
    pub const TABLE: &str = "orders";
    pub const ID: &str = "order_id";
    pub const CUSTOMER_ID: &str = "customer_id";
    pub const ORDER_DATE: &str = "order_date";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const STATUS: &str = "status";
}

// =============================================================================
// Order Items
// =============================================================================

pub mod order_item {
    pub const TABLE: &str = "order_items";
    pub const ID: &str = "order_item_id";
    pub const ORDER_ID: &str = "order_id";
    pub const PRODUCT_ID: &str = "product_id";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT_PRICE: &str = "unit_price";
    pub const SUBTOTAL: &str = "subtotal";
}
