//! Orders and order items.
//!
//! Orders are never extracted. They are rolled up from sales, persisted,
//! and resolved back so every sale can point at its order. Each stage is
//! its own type and can only be built from the one before it:
//!
//! ```text
//! ResolvedSales ─▶ AggregatedOrders ─▶ PersistedHeaders ─▶ ResolvedHeaders
//!      ─▶ RewrittenItems ─▶ FilteredItems ─▶ PersistedItems
//! ```

use crate::error::{DataError, DataResult, EtlResult};
use crate::keys::{DependencyRewriter, PreservedTable, SurrogateResolver};
use crate::logs::{log_info_indent, log_warning_indent};
use crate::models::{order, order_item, sale};
use crate::record::{AggregateSpec, ColumnType, JoinKind, RecordSet, Value};
use crate::store::RelationalStore;

/// A persisted parent: its preserved shadow map and its key resolver.
#[derive(Debug, Clone, Copy)]
pub struct Parent<'a> {
    pub preserved: &'a PreservedTable,
    pub resolver: &'a SurrogateResolver,
}

impl<'a> Parent<'a> {
    pub fn new(preserved: &'a PreservedTable, resolver: &'a SurrogateResolver) -> Self {
        Self {
            preserved,
            resolver,
        }
    }
}

/// Sales carrying `customer_key` and `product_key`.
#[derive(Debug, Clone)]
pub struct ResolvedSales {
    pub sales: RecordSet,
    /// Rows dropped for an unknown or unpersisted customer.
    pub unknown_customers: usize,
    /// Rows dropped for an unknown or unpersisted product.
    pub unknown_products: usize,
}

impl ResolvedSales {
    pub fn resolve(sales: RecordSet, customers: Parent<'_>, products: Parent<'_>) -> DataResult<Self> {
        let by_customer = DependencyRewriter::new(customers.preserved, customers.resolver).rewrite(
            sales,
            sale::CUSTOMER_ID,
            sale::CUSTOMER_KEY,
        )?;
        let by_product = DependencyRewriter::new(products.preserved, products.resolver).rewrite(
            by_customer.rows,
            sale::PRODUCT_ID,
            sale::PRODUCT_KEY,
        )?;

        if by_customer.excluded > 0 {
            log_warning_indent(
                format!("{} sales excluded: customer not loaded", by_customer.excluded),
                1,
            );
        }
        if by_product.excluded > 0 {
            log_warning_indent(
                format!("{} sales excluded: product not loaded", by_product.excluded),
                1,
            );
        }

        Ok(Self {
            sales: by_product.rows,
            unknown_customers: by_customer.excluded,
            unknown_products: by_product.excluded,
        })
    }

    /// One order per (customer, transaction date), `total_amount` summed.
    pub fn aggregate(self, status: &str) -> DataResult<AggregatedOrders> {
        let mut orders = self.sales.group_aggregate(
            &[sale::CUSTOMER_KEY, sale::TRANSACTION_DATE],
            &[AggregateSpec::sum(order::TOTAL_AMOUNT, sale::SUBTOTAL)],
        )?;
        orders.rename_column(sale::CUSTOMER_KEY, order::CUSTOMER_ID)?;
        orders.rename_column(sale::TRANSACTION_DATE, order::ORDER_DATE)?;
        let orders = orders.with_constant(order::STATUS, Value::text(status))?;

        log_info_indent(
            format!("{} sales rolled up into {} orders", self.sales.len(), orders.len()),
            1,
        );
        Ok(AggregatedOrders {
            sales: self.sales,
            orders,
        })
    }
}

/// Order headers ready to persist, with the sales they came from.
#[derive(Debug, Clone)]
pub struct AggregatedOrders {
    pub sales: RecordSet,
    pub orders: RecordSet,
}

impl AggregatedOrders {
    /// Write the headers and collect the generated `order_id`s.
    pub async fn persist(self, store: &dyn RelationalStore) -> EtlResult<PersistedHeaders> {
        let returned = store
            .persist_returning(
                order::TABLE,
                &self.orders,
                &[order::ID, order::CUSTOMER_ID, order::ORDER_DATE],
            )
            .await?;
        Ok(PersistedHeaders {
            sales: self.sales,
            loaded: self.orders.len(),
            returned,
        })
    }
}

/// Headers durably written; `returned` holds their keys.
#[derive(Debug, Clone)]
pub struct PersistedHeaders {
    pub sales: RecordSet,
    pub loaded: usize,
    pub returned: RecordSet,
}

impl PersistedHeaders {
    pub fn resolve(self) -> DataResult<ResolvedHeaders> {
        let resolver = SurrogateResolver::from_projection(
            &self.returned,
            &[order::CUSTOMER_ID, order::ORDER_DATE],
            order::ID,
        )?;
        Ok(ResolvedHeaders {
            sales: self.sales,
            loaded: self.loaded,
            resolver,
        })
    }
}

/// Resolver from (customer, order date) to `order_id`.
#[derive(Debug, Clone)]
pub struct ResolvedHeaders {
    pub sales: RecordSet,
    pub loaded: usize,
    pub resolver: SurrogateResolver,
}

impl ResolvedHeaders {
    /// Attach `order_id` to every sale through the composite key.
    pub fn rewrite(self) -> DataResult<RewrittenItems> {
        let mapping = self.resolver.to_record_set()?;
        let items = self.sales.join(
            &mapping,
            &[sale::CUSTOMER_KEY, sale::TRANSACTION_DATE],
            &[order::CUSTOMER_ID, order::ORDER_DATE],
            JoinKind::Left,
        )?;
        Ok(RewrittenItems {
            items,
            orders_loaded: self.loaded,
        })
    }
}

/// Sales with a possibly null `order_id`.
#[derive(Debug, Clone)]
pub struct RewrittenItems {
    pub items: RecordSet,
    pub orders_loaded: usize,
}

impl RewrittenItems {
    /// Drop rows without an order and project onto the item columns.
    pub fn filter(self) -> DataResult<FilteredItems> {
        let (mut items, excluded) = self.items.drop_rows_with_null(&[order::ID])?;
        if excluded > 0 {
            log_warning_indent(format!("{} order items excluded: no order", excluded), 1);
        }
        items.cast_column(order::ID, ColumnType::Int)?;

        let mut items = items.select(&[
            order::ID,
            sale::PRODUCT_KEY,
            sale::QUANTITY,
            sale::UNIT_PRICE,
            sale::SUBTOTAL,
        ])?;
        items.rename_column(sale::PRODUCT_KEY, order_item::PRODUCT_ID)?;

        let unresolved = items.null_count(order_item::PRODUCT_ID)?;
        if unresolved > 0 {
            return Err(DataError::Unresolved {
                column: order_item::PRODUCT_ID.to_string(),
                count: unresolved,
            });
        }

        Ok(FilteredItems {
            items,
            excluded,
            orders_loaded: self.orders_loaded,
        })
    }
}

/// Order items whose every foreign key is resolved.
#[derive(Debug, Clone)]
pub struct FilteredItems {
    pub items: RecordSet,
    /// Rows dropped for a missing order.
    pub excluded: usize,
    pub orders_loaded: usize,
}

impl FilteredItems {
    pub async fn persist(self, store: &dyn RelationalStore) -> EtlResult<PersistedItems> {
        let loaded = store.persist(order_item::TABLE, &self.items).await?;
        Ok(PersistedItems {
            orders_loaded: self.orders_loaded,
            items_loaded: loaded,
            excluded: self.excluded,
        })
    }
}

/// Terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistedItems {
    pub orders_loaded: usize,
    pub items_loaded: usize,
    pub excluded: usize,
}
