//! Cart, wishlist and checkout selections.
//!
//! Every change goes through [`ShopperState::apply`]. Guests keep their
//! state in the session under [`session_keys::GUEST_CART`] and
//! [`session_keys::GUEST_WISHLIST`]; signed-in shoppers mirror each action to
//! the `cart_items` and `wishlist` tables and re-read them afterwards, so
//! the state returned always carries the stored row ids.

use chrono::Utc;
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::models::{CartItem, Coupon, CouponRejection, Product, WishlistItem};
use bazaar_core::pricing::{PricedLine, subtotal};
use bazaar_core::shopper::{ShopperAction, ShopperState};
use bazaar_core::{CardOfferId, Money, ProductId};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{
    CardOfferRepository, CartRepository, CouponRepository, ProductRepository, WishlistRepository,
};

use crate::error::AppError;
use crate::models::{CheckoutSelection, CurrentUser, session_keys};

/// A cart line joined with its current product.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// Units currently available.
    pub stock: u32,
}

/// The cart as shown to the shopper.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    /// Lines whose product was removed or deactivated.
    pub unavailable: Vec<ProductId>,
    pub item_count: u32,
    pub subtotal: Money,
    pub coupon_code: Option<String>,
    pub card_offer_id: Option<CardOfferId>,
    pub use_wallet: bool,
}

/// Shopper state access for one request.
pub struct ShopperService<'a> {
    backend: &'a dyn Backend,
    session: &'a Session,
    user: Option<&'a CurrentUser>,
}

impl<'a> ShopperService<'a> {
    #[must_use]
    pub const fn new(
        backend: &'a dyn Backend,
        session: &'a Session,
        user: Option<&'a CurrentUser>,
    ) -> Self {
        Self {
            backend,
            session,
            user,
        }
    }

    /// Current state for this session.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the session or the platform read fails.
    pub async fn load(&self) -> Result<ShopperState, AppError> {
        let mut state = ShopperState::default();
        if let Some(user) = self.user {
            state.apply(ShopperAction::SignedIn { user_id: user.id });
            let items = CartRepository::new(self.backend).list(user.id).await?;
            state.apply(ShopperAction::CartLoaded { items });
            let items = WishlistRepository::new(self.backend).list(user.id).await?;
            state.apply(ShopperAction::WishlistLoaded { items });
        } else {
            let (cart, wishlist) = guest_state(self.session).await?;
            state.apply(ShopperAction::CartLoaded { items: cart });
            state.apply(ShopperAction::WishlistLoaded { items: wishlist });
        }

        let selection = self
            .session
            .get::<CheckoutSelection>(session_keys::CHECKOUT_SELECTION)
            .await?
            .unwrap_or_default();
        if let Some(code) = selection.coupon_code {
            state.apply(ShopperAction::ApplyCoupon { code });
        }
        state.apply(ShopperAction::SelectCardOffer {
            card_offer_id: selection.card_offer_id,
        });
        state.apply(ShopperAction::SetUseWallet {
            use_wallet: selection.use_wallet,
        });
        Ok(state)
    }

    /// Validate, apply and persist one action.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown products or cart lines,
    /// `AppError::Conflict` when stock is short, and platform or session
    /// failures otherwise.
    #[instrument(skip(self), fields(guest = self.user.is_none()))]
    pub async fn dispatch(&self, action: ShopperAction) -> Result<ShopperState, AppError> {
        let mut state = self.load().await?;
        self.validate(&state, &action).await?;
        let line_id = match &action {
            ShopperAction::SetQuantity { product_id, .. } => {
                state.cart_line(*product_id).and_then(|line| line.id)
            }
            _ => None,
        };
        state.apply(action.clone());

        self.save_selection(&state).await?;
        match self.user {
            Some(user) => {
                self.mirror(user, &action, line_id).await?;
                if touches_rows(&action) {
                    return self.load().await;
                }
            }
            None => {
                self.session
                    .insert(session_keys::GUEST_CART, &state.cart)
                    .await?;
                self.session
                    .insert(session_keys::GUEST_WISHLIST, &state.wishlist)
                    .await?;
            }
        }
        Ok(state)
    }

    async fn validate(&self, state: &ShopperState, action: &ShopperAction) -> Result<(), AppError> {
        match action {
            ShopperAction::AddToCart {
                product_id,
                quantity,
            } => {
                let product = self.purchasable(*product_id).await?;
                let in_cart = state.cart_line(*product_id).map_or(0, |l| l.quantity);
                ensure_stock(&product, in_cart.saturating_add(*quantity))
            }
            ShopperAction::SetQuantity {
                product_id,
                quantity,
            } if *quantity > 0 => {
                if state.cart_line(*product_id).is_none() {
                    return Err(AppError::NotFound("Cart item".to_owned()));
                }
                let product = self.purchasable(*product_id).await?;
                ensure_stock(&product, *quantity)
            }
            ShopperAction::AddToWishlist { product_id } => {
                match ProductRepository::new(self.backend).get(*product_id).await? {
                    Some(p) if p.is_active => Ok(()),
                    _ => Err(AppError::NotFound("Product".to_owned())),
                }
            }
            ShopperAction::SelectCardOffer {
                card_offer_id: Some(id),
            } => match CardOfferRepository::new(self.backend).get(*id).await? {
                Some(offer) if offer.is_active => Ok(()),
                _ => Err(AppError::NotFound("Card offer".to_owned())),
            },
            _ => Ok(()),
        }
    }

    async fn purchasable(&self, product_id: ProductId) -> Result<Product, AppError> {
        ProductRepository::new(self.backend)
            .get(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::NotFound("Product".to_owned()))
    }

    async fn mirror(
        &self,
        user: &CurrentUser,
        action: &ShopperAction,
        line_id: Option<bazaar_core::CartItemId>,
    ) -> Result<(), AppError> {
        let cart = CartRepository::new(self.backend);
        let wishlist = WishlistRepository::new(self.backend);
        match action {
            ShopperAction::AddToCart {
                product_id,
                quantity,
            } => {
                cart.add(user.id, *product_id, *quantity).await?;
            }
            ShopperAction::SetQuantity {
                product_id,
                quantity: 0,
            }
            | ShopperAction::RemoveFromCart { product_id } => {
                cart.remove(user.id, *product_id).await?;
            }
            ShopperAction::SetQuantity { quantity, .. } => {
                let id = line_id.ok_or_else(|| AppError::NotFound("Cart item".to_owned()))?;
                cart.set_quantity(user.id, id, *quantity).await?;
            }
            ShopperAction::ClearCart => cart.clear(user.id).await?,
            ShopperAction::AddToWishlist { product_id } => {
                wishlist.add(user.id, *product_id).await?;
            }
            ShopperAction::RemoveFromWishlist { product_id } => {
                wishlist.remove(user.id, *product_id).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn save_selection(&self, state: &ShopperState) -> Result<(), AppError> {
        let selection = CheckoutSelection {
            coupon_code: state.coupon_code.clone(),
            card_offer_id: state.card_offer_id,
            use_wallet: state.use_wallet,
        };
        self.session
            .insert(session_keys::CHECKOUT_SELECTION, selection)
            .await?;
        Ok(())
    }

    /// Join the cart with current products.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the platform read fails.
    pub async fn cart_view(&self, state: &ShopperState) -> Result<CartView, AppError> {
        let ids: Vec<ProductId> = state.cart.iter().map(|i| i.product_id).collect();
        let products = ProductRepository::new(self.backend).get_many(&ids).await?;

        let mut lines = Vec::with_capacity(state.cart.len());
        let mut unavailable = Vec::new();
        for item in &state.cart {
            match products.iter().find(|p| p.id == item.product_id && p.is_active) {
                Some(product) => lines.push(CartLineView {
                    product_id: product.id,
                    name: product.name.clone(),
                    image: product.primary_image().map(str::to_owned),
                    unit_price: product.price,
                    quantity: item.quantity,
                    line_total: product.price * item.quantity,
                    stock: product.stock,
                }),
                None => unavailable.push(item.product_id),
            }
        }

        Ok(CartView {
            item_count: lines.iter().map(|l| l.quantity).sum(),
            subtotal: lines.iter().map(|l| l.line_total).sum(),
            lines,
            unavailable,
            coupon_code: state.coupon_code.clone(),
            card_offer_id: state.card_offer_id,
            use_wallet: state.use_wallet,
        })
    }

    /// Wishlist products that are still listed.
    ///
    /// # Errors
    ///
    /// Returns `AppError` if the platform read fails.
    pub async fn wishlist_products(&self, state: &ShopperState) -> Result<Vec<Product>, AppError> {
        let ids: Vec<ProductId> = state.wishlist.iter().map(|w| w.product_id).collect();
        let products = ProductRepository::new(self.backend).get_many(&ids).await?;
        Ok(products.into_iter().filter(|p| p.is_active).collect())
    }

    /// Move a wishlist product into the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product is not wishlisted.
    pub async fn move_to_cart(&self, product_id: ProductId) -> Result<ShopperState, AppError> {
        let state = self.load().await?;
        if !state.in_wishlist(product_id) {
            return Err(AppError::NotFound("Wishlist item".to_owned()));
        }
        self.dispatch(ShopperAction::AddToCart {
            product_id,
            quantity: 1,
        })
        .await?;
        self.dispatch(ShopperAction::RemoveFromWishlist { product_id })
            .await
    }

    /// Check a coupon against the current cart, then select it.
    ///
    /// Returns the discount the coupon gives on the current subtotal.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` with the rejection reason when the
    /// coupon does not apply.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, code: &str) -> Result<(ShopperState, Money), AppError> {
        let state = self.load().await?;
        let view = self.cart_view(&state).await?;
        let priced: Vec<PricedLine> = view
            .lines
            .iter()
            .map(|l| PricedLine {
                unit_price: l.unit_price,
                quantity: l.quantity,
            })
            .collect();
        let subtotal = subtotal(&priced).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let coupon: Coupon = CouponRepository::new(self.backend)
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::BadRequest(CouponRejection::NotFound.to_string()))?;
        coupon
            .check(subtotal, Utc::now())
            .map_err(|rejection| AppError::BadRequest(rejection.to_string()))?;

        let state = self
            .dispatch(ShopperAction::ApplyCoupon {
                code: coupon.code.clone(),
            })
            .await?;
        Ok((state, coupon.discount(subtotal)))
    }
}

/// Guest cart and wishlist from the session.
///
/// # Errors
///
/// Returns the session error if the store read fails.
pub async fn guest_state(
    session: &Session,
) -> Result<(Vec<CartItem>, Vec<WishlistItem>), tower_sessions::session::Error> {
    let cart = session
        .get::<Vec<CartItem>>(session_keys::GUEST_CART)
        .await?
        .unwrap_or_default();
    let wishlist = session
        .get::<Vec<WishlistItem>>(session_keys::GUEST_WISHLIST)
        .await?
        .unwrap_or_default();
    Ok((cart, wishlist))
}

const fn touches_rows(action: &ShopperAction) -> bool {
    matches!(
        action,
        ShopperAction::AddToCart { .. }
            | ShopperAction::SetQuantity { .. }
            | ShopperAction::RemoveFromCart { .. }
            | ShopperAction::ClearCart
            | ShopperAction::AddToWishlist { .. }
            | ShopperAction::RemoveFromWishlist { .. }
    )
}

fn ensure_stock(product: &Product, quantity: u32) -> Result<(), AppError> {
    if product.has_stock_for(quantity) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "Only {} of {} in stock",
            product.stock, product.name
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::UserRole;
    use bazaar_core::models::DiscountKind;
    use bazaar_platform::MemoryBackend;

    use super::*;
    use crate::services::fixtures::{
        coupon, current_user, draft, seed_coupon, seed_product, seed_profile, session,
    };

    #[tokio::test]
    async fn test_guest_cart_lives_in_session() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Ghee", 400, 10)).await;
        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);

        shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 2,
            })
            .await
            .unwrap();
        let (cart, _) = guest_state(&session).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 2);
        assert!(backend.rows(bazaar_platform::Table::CartItems).await.is_empty());
    }

    #[tokio::test]
    async fn test_signed_in_cart_mirrored_to_rows() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Ghee", 400, 10)).await;
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let user = current_user(&profile);
        let session = session();
        let shopper = ShopperService::new(&backend, &session, Some(&user));

        let state = shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 1,
            })
            .await
            .unwrap();
        assert!(state.cart[0].id.is_some());

        let state = shopper
            .dispatch(ShopperAction::SetQuantity {
                product_id: product.id,
                quantity: 4,
            })
            .await
            .unwrap();
        assert_eq!(state.cart_count(), 4);

        let state = shopper
            .dispatch(ShopperAction::SetQuantity {
                product_id: product.id,
                quantity: 0,
            })
            .await
            .unwrap();
        assert!(state.cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_beyond_stock_rejected() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Saffron", 900, 2)).await;
        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);

        shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 2,
            })
            .await
            .unwrap();
        let err = shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_inactive_product_cannot_be_added() {
        let backend = MemoryBackend::new();
        let mut hidden = draft("Old stock", 100, 5);
        hidden.is_active = false;
        let product = seed_product(&backend, hidden).await;
        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);

        let err = shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cart_view_totals() {
        let backend = MemoryBackend::new();
        let ghee = seed_product(&backend, draft("Ghee", 400, 10)).await;
        let jaggery = seed_product(&backend, draft("Jaggery", 120, 10)).await;
        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);
        shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: ghee.id,
                quantity: 1,
            })
            .await
            .unwrap();
        let state = shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: jaggery.id,
                quantity: 2,
            })
            .await
            .unwrap();

        let view = shopper.cart_view(&state).await.unwrap();
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Money::from_rupees(640));
    }

    #[tokio::test]
    async fn test_apply_coupon_reports_rejection_reason() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Ghee", 400, 10)).await;
        let mut big = coupon("BIG500", DiscountKind::Flat, 100);
        big.min_purchase = Money::from_rupees(1000);
        seed_coupon(&backend, &big).await;
        seed_coupon(&backend, &coupon("SAVE10", DiscountKind::Percent, 10)).await;

        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);
        shopper
            .dispatch(ShopperAction::AddToCart {
                product_id: product.id,
                quantity: 1,
            })
            .await
            .unwrap();

        let err = shopper.apply_coupon("big500").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.starts_with("Minimum purchase")));

        let (state, discount) = shopper.apply_coupon(" save10 ").await.unwrap();
        assert_eq!(state.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(discount, Money::from_rupees(40));
        assert_eq!(
            shopper.load().await.unwrap().coupon_code.as_deref(),
            Some("SAVE10")
        );
    }

    #[tokio::test]
    async fn test_move_to_cart() {
        let backend = MemoryBackend::new();
        let product = seed_product(&backend, draft("Ghee", 400, 10)).await;
        let session = session();
        let shopper = ShopperService::new(&backend, &session, None);
        shopper
            .dispatch(ShopperAction::AddToWishlist {
                product_id: product.id,
            })
            .await
            .unwrap();

        let state = shopper.move_to_cart(product.id).await.unwrap();
        assert!(!state.in_wishlist(product.id));
        assert_eq!(state.cart_count(), 1);
    }
}
