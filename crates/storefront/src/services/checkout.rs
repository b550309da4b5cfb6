//! Signed quotes and order placement.
//!
//! # Quotes
//!
//! The client sends what it wants to buy; [`quote`] loads current prices,
//! the coupon, the card offer and the wallet balance, composes the price
//! breakdown and signs it. Placement only accepts a signed, unexpired quote,
//! so the amount charged is always the one computed here.
//!
//! # Placement saga
//!
//! [`place`] claims an idempotency key in `checkout_sagas` and then runs:
//!
//! ```text
//! Started → AddressResolved → OrderCreated → StockReserved
//!         → CouponRecorded → WalletDebited → Completed
//! ```
//!
//! Each step is recorded before the next starts. If a step fails, the steps
//! already done are undone (stock released, coupon use returned, coins
//! credited back), the order is cancelled with payment `failed` and the
//! saga ends `Compensated`. Re-submitting a key returns the order of the
//! first attempt, or the error it ended with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use bazaar_core::models::{
    CardOfferRejection, CouponRejection, MAX_LINE_QUANTITY, Order, OrderItem, TransactionReason,
};
use bazaar_core::pricing::{PricedLine, PricingError, PricingInput, compose};
use bazaar_core::quote::{QUOTE_TTL, Quote, QuoteLine, SignedQuote};
use bazaar_core::shopper::{ShopperAction, ShopperState};
use bazaar_core::token::TokenError;
use bazaar_core::{
    CardOfferId, CouponId, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
    PaymentTagError, ProductId, QuoteId, UserId,
};
use bazaar_platform::repositories::{
    CardOfferRepository, CouponRepository, OrderRepository, ProductRepository, ProfileRepository,
    SagaRepository, SagaStart, SagaStep, WalletRepository,
};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::{AppError, add_breadcrumb};
use crate::models::CurrentUser;
use crate::services::addresses::{self, AddressChoice};
use crate::services::shopper::ShopperService;
use crate::state::AppState;

/// Errors specific to pricing and placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Pricing(#[from] PricingError),

    #[error("This quote is invalid or has expired. Please review your order again.")]
    Quote(#[from] TokenError),

    #[error("This quote was issued to another account")]
    QuoteOwner,

    #[error("{name} is not available")]
    Unavailable { product_id: ProductId, name: String },

    #[error("Only {available} of {name} left in stock")]
    OutOfStock {
        product_id: ProductId,
        name: String,
        available: u32,
        requested: u32,
    },

    #[error("Coupon {code} has reached its usage limit")]
    CouponExhausted { code: String },

    #[error("Cash on delivery is not available for orders of {limit} or more")]
    CodUnavailable { limit: Money },

    #[error("{0}")]
    Payment(#[from] PaymentTagError),

    #[error("Not enough wallet coins")]
    WalletShort,

    #[error("This order is already being placed")]
    InProgress,

    #[error("An earlier attempt with this key failed: {0}")]
    PreviouslyFailed(String),
}

// =============================================================================
// Quotes
// =============================================================================

/// One requested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// What the client wants priced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub items: Vec<QuoteItem>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub card_offer_id: Option<CardOfferId>,
    #[serde(default)]
    pub use_wallet: bool,
}

impl QuoteRequest {
    /// Price the session's cart with its current selections.
    #[must_use]
    pub fn from_state(state: &ShopperState) -> Self {
        Self {
            items: state
                .cart
                .iter()
                .map(|i| QuoteItem {
                    product_id: i.product_id,
                    quantity: i.quantity,
                })
                .collect(),
            coupon_code: state.coupon_code.clone(),
            card_offer_id: state.card_offer_id,
            use_wallet: state.use_wallet,
        }
    }
}

/// Quote plus what the payment widget needs.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    #[serde(flatten)]
    pub signed: SignedQuote,
    /// Amount to collect, in paise.
    pub amount_minor_units: i64,
    /// Public merchant key for the payment widget.
    pub payment_key: String,
}

/// Collapse repeated products and check quantities.
fn normalize_items(items: &[QuoteItem]) -> Result<Vec<QuoteItem>, CheckoutError> {
    let mut merged: Vec<QuoteItem> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(PricingError::InvalidQuantity.into());
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = (existing.quantity + item.quantity).min(MAX_LINE_QUANTITY);
            }
            None => merged.push(*item),
        }
    }
    if merged.is_empty() {
        return Err(PricingError::EmptyCart.into());
    }
    Ok(merged)
}

/// Price a request at current prices and sign the result.
///
/// # Errors
///
/// Returns `CheckoutError` for unknown or short-stocked products and for a
/// coupon or card offer that does not apply.
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn quote(
    state: &AppState,
    user_id: UserId,
    request: &QuoteRequest,
    now: DateTime<Utc>,
) -> Result<QuoteResponse, CheckoutError> {
    let backend = state.backend();
    let items = normalize_items(&request.items)?;

    let ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    let products = ProductRepository::new(backend).get_many(&ids).await?;
    let mut lines = Vec::with_capacity(items.len());
    for item in &items {
        let product = products
            .iter()
            .find(|p| p.id == item.product_id)
            .ok_or_else(|| CheckoutError::Unavailable {
                product_id: item.product_id,
                name: "A product in your cart".to_owned(),
            })?;
        if !product.is_active {
            return Err(CheckoutError::Unavailable {
                product_id: product.id,
                name: product.name.clone(),
            });
        }
        if !product.has_stock_for(item.quantity) {
            return Err(CheckoutError::OutOfStock {
                product_id: product.id,
                name: product.name.clone(),
                available: product.stock,
                requested: item.quantity,
            });
        }
        lines.push(QuoteLine {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity: item.quantity,
            image: product.primary_image().map(str::to_owned),
        });
    }

    let coupon = match request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => Some(
            CouponRepository::new(backend)
                .find_by_code(code)
                .await?
                .ok_or(PricingError::Coupon(CouponRejection::NotFound))?,
        ),
        None => None,
    };
    let card_offer = match request.card_offer_id {
        Some(id) => Some(
            CardOfferRepository::new(backend)
                .get(id)
                .await?
                .ok_or(PricingError::CardOffer(CardOfferRejection::NotFound))?,
        ),
        None => None,
    };
    let wallet_balance = if request.use_wallet {
        ProfileRepository::new(backend)
            .get(user_id)
            .await?
            .map_or(Money::ZERO, |p| p.wallet_balance)
    } else {
        Money::ZERO
    };

    let priced: Vec<PricedLine> = lines
        .iter()
        .map(|l| PricedLine {
            unit_price: l.unit_price,
            quantity: l.quantity,
        })
        .collect();
    let breakdown = compose(
        state.pricing(),
        &PricingInput {
            lines: &priced,
            coupon: coupon.as_ref(),
            card_offer: card_offer.as_ref(),
            wallet_balance,
            use_wallet: request.use_wallet,
            now,
        },
    )?;

    let quote = Quote {
        id: QuoteId::random(),
        user_id,
        lines,
        coupon_code: coupon.map(|c| c.code),
        card_offer_id: card_offer.map(|o| o.id),
        use_wallet: request.use_wallet,
        breakdown,
        issued_at: now,
        expires_at: now + QUOTE_TTL,
    };
    let amount_minor_units = quote.amount_minor_units().ok_or_else(|| {
        CheckoutError::Repository(RepositoryError::DataCorruption(
            "quote total out of range".to_owned(),
        ))
    })?;
    let signed = quote.seal(state.quote_signer())?;
    info!(quote_id = %quote.id, total = %breakdown.total, "Quote issued");

    Ok(QuoteResponse {
        signed,
        amount_minor_units,
        payment_key: state.config().payment_gateway_key.clone(),
    })
}

// =============================================================================
// Placement
// =============================================================================

/// Order placement request body.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    /// Token from [`quote`].
    pub quote_token: String,
    pub address: AddressChoice,
    /// `cod` or `online:<transaction id>`.
    pub payment_method: String,
}

/// Place the order described by a signed quote.
///
/// Placement is keyed on the quote id, so a quote yields at most one order
/// however often it is submitted. `idempotency_key` is only logged.
///
/// # Errors
///
/// Returns `AppError::Checkout` for a bad quote, payment tag or stock
/// shortfall, and whatever the failed saga step returned otherwise.
#[instrument(skip(state, session, user, request), fields(user_id = %user.id))]
pub async fn place(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    idempotency_key: Option<&str>,
    request: &PlaceOrderRequest,
) -> Result<Order, AppError> {
    let now = Utc::now();
    let quote: Quote = state
        .quote_signer()
        .verify(&request.quote_token, now)
        .map_err(CheckoutError::from)?;
    if quote.user_id != user.id {
        return Err(CheckoutError::QuoteOwner.into());
    }
    let payment = PaymentMethod::parse(request.payment_method.trim()).map_err(CheckoutError::from)?;
    if payment.is_cod() && !quote.breakdown.cod_available {
        return Err(CheckoutError::CodUnavailable {
            limit: state.pricing().cod_limit,
        }
        .into());
    }

    // One quote, one order: the saga is keyed on the quote id whatever
    // retry key the client sends.
    let key = quote.id.to_string();
    if let Some(client_key) = idempotency_key.map(str::trim).filter(|k| !k.is_empty()) {
        info!(client_key, quote_id = %quote.id, "Placement retry key");
    }
    let backend = state.backend();

    match SagaRepository::new(backend).begin(&key, user.id).await? {
        SagaStart::Existing(record) => {
            return match record.step {
                SagaStep::Completed => {
                    let order_id = record.order_id.ok_or_else(|| {
                        AppError::Internal("completed saga without order".to_owned())
                    })?;
                    info!(%order_id, "Returning order from earlier attempt");
                    OrderRepository::new(backend)
                        .get(order_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound("Order".to_owned()))
                }
                SagaStep::Compensated => Err(CheckoutError::PreviouslyFailed(
                    record.error.unwrap_or_else(|| "order was not placed".to_owned()),
                )
                .into()),
                _ => Err(CheckoutError::InProgress.into()),
            };
        }
        SagaStart::New(_) => {}
    }

    let mut saga = Placement::new(backend, &key, &quote, user.id);
    let order = match saga.run(&request.address, payment).await {
        Ok(order) => order,
        Err(err) => {
            saga.compensate(&err).await;
            return Err(err);
        }
    };

    let order_ref = order.reference();
    add_breadcrumb("checkout", "Order placed", Some(&[("order", order_ref.as_str())]));
    if let Err(err) = ShopperService::new(backend, session, Some(user))
        .dispatch(ShopperAction::ClearCart)
        .await
    {
        warn!(order_id = %order.id, error = %err, "Order placed but cart not cleared");
    }
    state.catalog().invalidate_all().await;
    Ok(order)
}

/// Progress of one placement, kept so a failure can be undone.
struct Placement<'a> {
    backend: &'a dyn Backend,
    key: &'a str,
    quote: &'a Quote,
    user_id: UserId,
    order_id: Option<OrderId>,
    reserved: Vec<(ProductId, u32)>,
    coupon: Option<CouponId>,
    wallet_debited: Money,
}

impl<'a> Placement<'a> {
    fn new(backend: &'a dyn Backend, key: &'a str, quote: &'a Quote, user_id: UserId) -> Self {
        Self {
            backend,
            key,
            quote,
            user_id,
            order_id: None,
            reserved: Vec::new(),
            coupon: None,
            wallet_debited: Money::ZERO,
        }
    }

    async fn step(&self, step: SagaStep) -> Result<(), RepositoryError> {
        SagaRepository::new(self.backend)
            .advance(self.key, step, self.order_id, None)
            .await?;
        Ok(())
    }

    async fn run(&mut self, address: &AddressChoice, payment: PaymentMethod) -> Result<Order, AppError> {
        let shipping_address = addresses::resolve(self.backend, self.user_id, address).await?;
        self.step(SagaStep::AddressResolved).await?;

        let now = Utc::now();
        let payment_status = if payment.is_cod() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Paid
        };
        let order_id = OrderId::random();
        self.order_id = Some(order_id);
        let order = Order {
            id: order_id,
            user_id: self.user_id,
            items: self
                .quote
                .lines
                .iter()
                .map(|line| OrderItem {
                    id: None,
                    product_id: line.product_id,
                    name: line.name.clone(),
                    unit_price: line.unit_price,
                    quantity: line.quantity,
                    image: line.image.clone(),
                })
                .collect(),
            pricing: self.quote.breakdown,
            status: OrderStatus::Pending,
            shipping_address,
            payment_method: payment,
            payment_status,
            coupon_code: self.quote.coupon_code.clone(),
            card_offer_id: self.quote.card_offer_id,
            created_at: now,
            updated_at: now,
        };
        let orders = OrderRepository::new(self.backend);
        orders.create(&order).await?;
        self.step(SagaStep::OrderCreated).await?;

        let products = ProductRepository::new(self.backend);
        for line in &self.quote.lines {
            match products.reserve_stock(line.product_id, line.quantity).await {
                Ok(_) => self.reserved.push((line.product_id, line.quantity)),
                Err(RepositoryError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                }) => {
                    return Err(CheckoutError::OutOfStock {
                        product_id,
                        name: line.name.clone(),
                        available,
                        requested,
                    }
                    .into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.step(SagaStep::StockReserved).await?;

        if let Some(code) = &self.quote.coupon_code {
            let coupons = CouponRepository::new(self.backend);
            let coupon = coupons
                .find_by_code(code)
                .await?
                .ok_or(CheckoutError::Pricing(PricingError::Coupon(
                    CouponRejection::NotFound,
                )))?;
            match coupons.record_usage(coupon.id).await {
                Ok(_) => self.coupon = Some(coupon.id),
                Err(RepositoryError::UsageLimitReached { code }) => {
                    return Err(CheckoutError::CouponExhausted { code }.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.step(SagaStep::CouponRecorded).await?;

        let wallet_used = self.quote.breakdown.wallet_used;
        if !wallet_used.is_zero() {
            match WalletRepository::new(self.backend)
                .debit(
                    self.user_id,
                    wallet_used,
                    TransactionReason::OrderPayment,
                    Some(order_id),
                )
                .await
            {
                Ok(_) => self.wallet_debited = wallet_used,
                Err(RepositoryError::Wallet(_)) => return Err(CheckoutError::WalletShort.into()),
                Err(err) => return Err(err.into()),
            }
        }
        self.step(SagaStep::WalletDebited).await?;
        self.step(SagaStep::Completed).await?;

        info!(%order_id, total = %order.pricing.total, "Order placed");
        Ok(orders.get(order_id).await?.unwrap_or(order))
    }

    /// Undo whatever [`Placement::run`] managed to do. Failures here are
    /// logged; the original error is what the customer sees.
    async fn compensate(&self, cause: &AppError) {
        warn!(key = self.key, error = %cause, "Placement failed; compensating");

        let products = ProductRepository::new(self.backend);
        for (product_id, quantity) in &self.reserved {
            if let Err(err) = products.release_stock(*product_id, *quantity).await {
                warn!(%product_id, quantity, error = %err, "Could not release stock");
            }
        }
        if let Some(coupon_id) = self.coupon
            && let Err(err) = CouponRepository::new(self.backend)
                .release_usage(coupon_id)
                .await
        {
            warn!(%coupon_id, error = %err, "Could not release coupon use");
        }
        if !self.wallet_debited.is_zero()
            && let Err(err) = WalletRepository::new(self.backend)
                .credit(
                    self.user_id,
                    self.wallet_debited,
                    TransactionReason::OrderCancelled,
                    self.order_id,
                )
                .await
        {
            warn!(user_id = %self.user_id, error = %err, "Could not return wallet coins");
        }
        if let Some(order_id) = self.order_id
            && let Err(err) = OrderRepository::new(self.backend)
                .mark_failed(order_id, Utc::now())
                .await
        {
            warn!(%order_id, error = %err, "Could not mark order failed");
        }

        let message = match cause {
            AppError::Checkout(err) => err.to_string(),
            _ => "order could not be placed".to_owned(),
        };
        if let Err(err) = SagaRepository::new(self.backend)
            .advance(self.key, SagaStep::Compensated, self.order_id, Some(&message))
            .await
        {
            warn!(key = self.key, error = %err, "Could not record compensation");
        }
    }
}
