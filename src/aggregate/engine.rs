use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{
    Diagnostic, InventoryRecord, IssueKind, Period, UnifiedSalesDataset,
};

/// Row-level predicates applied before aggregation. Each option is
/// exact-match-or-any; they resolve against inventory attributes and are
/// inert when no inventory set is supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub stock_available: Option<bool>,
}

impl FilterOptions {
    pub fn any(&self) -> bool {
        self.category.is_some() || self.vendor.is_some() || self.stock_available.is_some()
    }

    pub fn matches(&self, record: &InventoryRecord) -> bool {
        if let Some(category) = &self.category {
            if record.category_major.as_deref() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(vendor) = &self.vendor {
            if record.vendor.as_deref() != Some(vendor.as_str()) {
                return false;
            }
        }
        if let Some(want_stock) = self.stock_available {
            if record.in_stock() != want_stock {
                return false;
            }
        }
        true
    }

    fn fingerprint(&self) -> String {
        format!(
            "category={}|vendor={}|stock={}",
            self.category.as_deref().unwrap_or("*"),
            self.vendor.as_deref().unwrap_or("*"),
            self.stock_available
                .map(|b| b.to_string())
                .unwrap_or_else(|| "*".to_string()),
        )
    }
}

/// Everything one aggregation pass depends on. The engine is a pure
/// function of this input and holds no cache; the presentation layer may
/// memoize results under [`AggregationRequest::cache_key`].
#[derive(Debug)]
pub struct AggregationRequest<'a> {
    pub dataset: &'a UnifiedSalesDataset,
    pub periods: BTreeSet<Period>,
    pub inventory: Option<&'a [InventoryRecord]>,
    pub filters: FilterOptions,
}

impl AggregationRequest<'_> {
    /// (dataset version, period set, filter set): the invalidation key
    /// for any caller-side result cache.
    pub fn cache_key(&self) -> String {
        let periods: Vec<String> = self.periods.iter().map(|p| p.to_string()).collect();
        format!(
            "{}|{}|{}",
            self.dataset.version(),
            periods.join(","),
            self.filters.fingerprint()
        )
    }
}

/// Per-product rollup across all selected periods.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductTotals {
    pub product_id: String,
    pub product_name: Option<String>,
    pub unit: Option<String>,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub gross_margin: Decimal,
    /// Mean of the line unit prices (單價 平均).
    pub avg_unit_price: Option<Decimal>,
    /// Revenue divided by quantity (單價（數量）).
    pub unit_price_by_quantity: Option<Decimal>,
}

impl ProductTotals {
    fn zeroed(product_id: String, product_name: Option<String>, unit: Option<String>) -> Self {
        ProductTotals {
            product_id,
            product_name,
            unit,
            total_quantity: 0,
            total_revenue: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            gross_margin: Decimal::ZERO,
            avg_unit_price: None,
            unit_price_by_quantity: None,
        }
    }
}

/// One (product, period) rollup. The period is the row's own date month,
/// not the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAggregate {
    pub product_id: String,
    pub period: Period,
    pub total_quantity_sold: i64,
    pub total_revenue: Decimal,
    pub total_cost: Decimal,
    pub gross_margin: Decimal,
}

/// Outer join of product totals with the inventory snapshot: neither side
/// is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedProduct {
    pub totals: ProductTotals,
    pub inventory: Option<InventoryRecord>,
}

/// Invoice-level rollup; order-scoped money fields are counted once per
/// order, not once per line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    pub order_id: String,
    pub order_date: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub total_amount: Decimal,
    pub gross_margin: Decimal,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerTotals {
    pub customer_name: String,
    pub total_amount: Decimal,
    pub order_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesSummary {
    pub total_revenue: Decimal,
    pub total_margin: Decimal,
    pub order_count: usize,
    pub margin_pct: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub product_totals: Vec<ProductTotals>,
    pub period_breakdown: Vec<PeriodAggregate>,
    pub joined: Option<Vec<JoinedProduct>>,
    pub order_summaries: Vec<OrderSummary>,
    pub customer_totals: Vec<CustomerTotals>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub summary: SalesSummary,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Default)]
struct TotalsAcc {
    product_name: Option<String>,
    unit: Option<String>,
    quantity: i64,
    revenue: Decimal,
    cost: Decimal,
    price_sum: Decimal,
    price_count: u32,
}

#[derive(Default)]
struct BucketAcc {
    quantity: i64,
    revenue: Decimal,
    cost: Decimal,
}

struct OrderAcc {
    order_date: Option<NaiveDate>,
    customer_id: Option<String>,
    customer_name: Option<String>,
    total: Option<Decimal>,
    margin: Option<Decimal>,
    line_count: usize,
}

/// Runs one aggregation pass. Deterministic: the same request yields
/// bit-identical output, row order included.
pub fn aggregate(request: &AggregationRequest<'_>) -> AggregationResult {
    // products passing the filter predicates, when filters are active and
    // inventory is available to resolve them
    let allowed: Option<HashSet<&str>> = match (request.filters.any(), request.inventory) {
        (true, Some(inventory)) => Some(
            inventory
                .iter()
                .filter(|r| request.filters.matches(r))
                .map(|r| r.product_id.as_str())
                .collect(),
        ),
        _ => None,
    };

    let mut products: BTreeMap<String, TotalsAcc> = BTreeMap::new();
    let mut buckets: BTreeMap<(String, Period), BucketAcc> = BTreeMap::new();
    let mut orders: BTreeMap<String, OrderAcc> = BTreeMap::new();
    let mut missing_product_rows = 0usize;
    let mut missing_date_rows = 0usize;

    for row in request.dataset.rows() {
        if !request.periods.contains(&row.source_period) {
            continue;
        }

        if let Some(allowed) = &allowed {
            match &row.product_id {
                Some(id) if allowed.contains(id.as_str()) => {}
                _ => continue,
            }
        }

        // order-level accumulation (independent of product identity)
        if let Some(order_id) = &row.order_id {
            let acc = orders.entry(order_id.clone()).or_insert(OrderAcc {
                order_date: None,
                customer_id: None,
                customer_name: None,
                total: None,
                margin: None,
                line_count: 0,
            });
            acc.line_count += 1;
            acc.order_date = acc.order_date.or(row.order_date);
            if acc.customer_id.is_none() {
                acc.customer_id = row.customer_id.clone();
            }
            if acc.customer_name.is_none() {
                acc.customer_name = row.customer_name.clone();
            }
            acc.total = acc.total.or(row.order_total);
            acc.margin = acc.margin.or(row.order_margin);
        }

        // product-level accumulation
        let Some(product_id) = &row.product_id else {
            missing_product_rows += 1;
            continue;
        };

        let acc = products.entry(product_id.clone()).or_default();
        if acc.product_name.is_none() {
            acc.product_name = row.product_name.clone();
        }
        if acc.unit.is_none() {
            acc.unit = row.unit.clone();
        }
        acc.quantity += row.quantity;
        acc.revenue += row.line_subtotal.unwrap_or(Decimal::ZERO);
        acc.cost += row.line_cost.unwrap_or(Decimal::ZERO);
        if let Some(price) = row.unit_price {
            acc.price_sum += price;
            acc.price_count += 1;
        }

        // period bucketing by the row's own date; undated rows stay in the
        // totals but cannot be bucketed
        match row.order_date {
            Some(date) => {
                let period = Period::from_date(date);
                if request.periods.contains(&period) {
                    let bucket = buckets.entry((product_id.clone(), period)).or_default();
                    bucket.quantity += row.quantity;
                    bucket.revenue += row.line_subtotal.unwrap_or(Decimal::ZERO);
                    bucket.cost += row.line_cost.unwrap_or(Decimal::ZERO);
                }
            }
            None => missing_date_rows += 1,
        }
    }

    let mut product_totals: Vec<ProductTotals> = products
        .into_iter()
        .map(|(product_id, acc)| {
            let avg_unit_price = if acc.price_count > 0 {
                Some(acc.price_sum / Decimal::from(acc.price_count))
            } else {
                None
            };
            let unit_price_by_quantity = if acc.quantity > 0 {
                Some(acc.revenue / Decimal::from(acc.quantity))
            } else {
                None
            };
            ProductTotals {
                product_id,
                product_name: acc.product_name,
                unit: acc.unit,
                total_quantity: acc.quantity,
                total_revenue: acc.revenue,
                total_cost: acc.cost,
                gross_margin: acc.revenue - acc.cost,
                avg_unit_price,
                unit_price_by_quantity,
            }
        })
        .collect();
    sort_by_revenue(&mut product_totals);

    let period_breakdown: Vec<PeriodAggregate> = buckets
        .into_iter()
        .map(|((product_id, period), acc)| PeriodAggregate {
            product_id,
            period,
            total_quantity_sold: acc.quantity,
            total_revenue: acc.revenue,
            total_cost: acc.cost,
            gross_margin: acc.revenue - acc.cost,
        })
        .collect();

    let joined = request
        .inventory
        .map(|inventory| join_with_inventory(&product_totals, inventory, &request.filters));

    let order_summaries: Vec<OrderSummary> = orders
        .into_iter()
        .map(|(order_id, acc)| OrderSummary {
            order_id,
            order_date: acc.order_date,
            customer_id: acc.customer_id,
            customer_name: acc.customer_name,
            total_amount: acc.total.unwrap_or(Decimal::ZERO),
            gross_margin: acc.margin.unwrap_or(Decimal::ZERO),
            line_count: acc.line_count,
        })
        .collect();

    let customer_totals = customer_totals_of(&order_summaries);
    let daily_revenue = daily_revenue_of(&order_summaries);

    let total_revenue: Decimal = order_summaries.iter().map(|o| o.total_amount).sum();
    let total_margin: Decimal = order_summaries.iter().map(|o| o.gross_margin).sum();
    let margin_pct = if total_revenue > Decimal::ZERO {
        Some(total_margin / total_revenue * Decimal::from(100))
    } else {
        None
    };
    let summary = SalesSummary {
        total_revenue,
        total_margin,
        order_count: order_summaries.len(),
        margin_pct,
    };

    let mut diagnostics = Vec::new();
    if missing_product_rows > 0 {
        diagnostics.push(Diagnostic::new(
            "aggregation",
            IssueKind::GroupingKeyMissing,
            format!("{missing_product_rows} row(s) without a 產品代號 excluded from product totals"),
        ));
    }
    if missing_date_rows > 0 {
        diagnostics.push(Diagnostic::new(
            "aggregation",
            IssueKind::ParseError,
            format!(
                "{missing_date_rows} row(s) without a 銷貨日期 excluded from period buckets (still counted in totals)"
            ),
        ));
    }

    AggregationResult {
        product_totals,
        period_breakdown,
        joined,
        order_summaries,
        customer_totals,
        daily_revenue,
        summary,
        diagnostics,
    }
}

/// Outer join by product id: sales-only products carry no inventory
/// attributes, inventory-only products carry zero sales metrics.
fn join_with_inventory(
    totals: &[ProductTotals],
    inventory: &[InventoryRecord],
    filters: &FilterOptions,
) -> Vec<JoinedProduct> {
    let mut by_id: BTreeMap<&str, &InventoryRecord> = BTreeMap::new();
    for record in inventory {
        if filters.any() && !filters.matches(record) {
            continue;
        }
        // first occurrence wins; ids are unique within one load anyway
        by_id.entry(record.product_id.as_str()).or_insert(record);
    }

    let mut joined: Vec<JoinedProduct> = Vec::with_capacity(totals.len());
    let mut matched: HashSet<&str> = HashSet::new();

    for totals_row in totals {
        let inventory_row = by_id.get(totals_row.product_id.as_str()).copied();
        if inventory_row.is_some() {
            matched.insert(totals_row.product_id.as_str());
        }
        joined.push(JoinedProduct {
            totals: totals_row.clone(),
            inventory: inventory_row.cloned(),
        });
    }

    // inventory-only products, zero-filled, in id order
    for (id, record) in &by_id {
        if matched.contains(id) {
            continue;
        }
        joined.push(JoinedProduct {
            totals: ProductTotals::zeroed(
                record.product_id.clone(),
                Some(record.product_name.clone()),
                record.unit.clone(),
            ),
            inventory: Some((*record).clone()),
        });
    }

    joined
}

fn customer_totals_of(orders: &[OrderSummary]) -> Vec<CustomerTotals> {
    let mut by_customer: BTreeMap<String, (Decimal, usize)> = BTreeMap::new();
    for order in orders {
        let Some(name) = &order.customer_name else {
            continue;
        };
        let entry = by_customer.entry(name.clone()).or_default();
        entry.0 += order.total_amount;
        entry.1 += 1;
    }

    let mut totals: Vec<CustomerTotals> = by_customer
        .into_iter()
        .map(|(customer_name, (total_amount, order_count))| CustomerTotals {
            customer_name,
            total_amount,
            order_count,
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.customer_name.cmp(&b.customer_name))
    });
    totals
}

fn daily_revenue_of(orders: &[OrderSummary]) -> Vec<DailyRevenue> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for order in orders {
        if let Some(date) = order.order_date {
            *by_date.entry(date).or_default() += order.total_amount;
        }
    }
    by_date
        .into_iter()
        .map(|(date, revenue)| DailyRevenue { date, revenue })
        .collect()
}

fn sort_by_revenue(totals: &mut [ProductTotals]) {
    totals.sort_by(|a, b| {
        b.total_revenue
            .cmp(&a.total_revenue)
            .then_with(|| a.product_id.cmp(&b.product_id))
    });
}
