//! Tables, filters and row queries.
//!
//! Filters render to the platform's REST query syntax (`column=op.value`) and
//! are evaluated directly by the in-memory backend, so both backends agree on
//! what a query means.

use core::fmt;

use serde_json::Value;

/// Every table the platform exposes to Bazaar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Profiles,
    Products,
    Orders,
    OrderItems,
    Deliveries,
    DeliveryLocationTracking,
    CardOffers,
    Referrals,
    Coupons,
    Addresses,
    CartItems,
    Wishlist,
    Reviews,
    Returns,
    WalletTransactions,
    CheckoutSagas,
    MergeRequests,
}

impl Table {
    pub const ALL: [Self; 17] = [
        Self::Profiles,
        Self::Products,
        Self::Orders,
        Self::OrderItems,
        Self::Deliveries,
        Self::DeliveryLocationTracking,
        Self::CardOffers,
        Self::Referrals,
        Self::Coupons,
        Self::Addresses,
        Self::CartItems,
        Self::Wishlist,
        Self::Reviews,
        Self::Returns,
        Self::WalletTransactions,
        Self::CheckoutSagas,
        Self::MergeRequests,
    ];

    /// Table name on the platform.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Products => "products",
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
            Self::Deliveries => "deliveries",
            Self::DeliveryLocationTracking => "delivery_location_tracking",
            Self::CardOffers => "card_offers",
            Self::Referrals => "referrals",
            Self::Coupons => "coupons",
            Self::Addresses => "addresses",
            Self::CartItems => "cart_items",
            Self::Wishlist => "wishlist",
            Self::Reviews => "reviews",
            Self::Returns => "returns",
            Self::WalletTransactions => "wallet_transactions",
            Self::CheckoutSagas => "checkout_sagas",
            Self::MergeRequests => "merge_requests",
        }
    }

    /// Column sets that must be unique besides `id`.
    #[must_use]
    pub const fn unique_keys(self) -> &'static [&'static [&'static str]] {
        match self {
            Self::Profiles => &[&["referral_code"]],
            Self::Coupons => &[&["code"]],
            Self::Deliveries => &[&["order_id"]],
            Self::Referrals => &[&["referee_id"]],
            Self::CartItems | Self::Wishlist | Self::Reviews => &[&["user_id", "product_id"]],
            Self::CheckoutSagas => &[&["idempotency_key"]],
            Self::MergeRequests => &[&["id"]],
            _ => &[],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparison applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Neq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    IsNull,
    NotNull,
    /// Case-insensitive substring match.
    Contains(String),
}

/// One `column op value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq(value.into()))
    }

    pub fn neq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Neq(value.into()))
    }

    pub fn gte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gte(value.into()))
    }

    pub fn lte(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lte(value.into()))
    }

    pub fn lt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Lt(value.into()))
    }

    pub fn gt(column: &str, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Gt(value.into()))
    }

    pub fn is_in<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(column, FilterOp::In(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn is_null(column: &str) -> Self {
        Self::new(column, FilterOp::IsNull)
    }

    #[must_use]
    pub fn not_null(column: &str) -> Self {
        Self::new(column, FilterOp::NotNull)
    }

    #[must_use]
    pub fn contains(column: &str, needle: &str) -> Self {
        Self::new(column, FilterOp::Contains(needle.to_owned()))
    }

    fn new(column: &str, op: FilterOp) -> Self {
        Self {
            column: column.to_owned(),
            op,
        }
    }

    /// The REST query parameter for this filter.
    #[must_use]
    pub fn to_param(&self) -> (String, String) {
        let value = match &self.op {
            FilterOp::Eq(v) => format!("eq.{}", render(v)),
            FilterOp::Neq(v) => format!("neq.{}", render(v)),
            FilterOp::Gt(v) => format!("gt.{}", render(v)),
            FilterOp::Gte(v) => format!("gte.{}", render(v)),
            FilterOp::Lt(v) => format!("lt.{}", render(v)),
            FilterOp::Lte(v) => format!("lte.{}", render(v)),
            FilterOp::In(vs) => {
                let list: Vec<String> = vs.iter().map(render).collect();
                format!("in.({})", list.join(","))
            }
            FilterOp::IsNull => "is.null".to_owned(),
            FilterOp::NotNull => "not.is.null".to_owned(),
            FilterOp::Contains(needle) => format!("ilike.*{needle}*"),
        };
        (self.column.clone(), value)
    }

    /// The realtime subscription filter string (`column=eq.value`).
    #[must_use]
    pub fn to_realtime(&self) -> String {
        let (column, value) = self.to_param();
        format!("{column}={value}")
    }
}

/// Sort direction for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// A select query: filters, ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    #[must_use]
    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_owned(),
            ascending: true,
        });
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(OrderBy {
            column: column.to_owned(),
            ascending: false,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// REST query parameters, including `select=*`.
    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_owned(), "*".to_owned())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect();
            params.push(("order".to_owned(), order.join(",")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_owned(), limit.to_string()));
        }
        params
    }
}
