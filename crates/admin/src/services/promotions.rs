//! Coupon and card-offer maintenance.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use bazaar_core::models::{CardOffer, CardType, Coupon, DiscountRule};
use bazaar_core::{CardOfferId, CouponId, Money};
use bazaar_platform::repositories::{CardOfferRepository, CouponRepository};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

/// Longest coupon code accepted.
pub const MAX_CODE_LEN: usize = 32;

/// Coupon fields an admin can set. The usage counter is not one of them.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponForm {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub rule: DiscountRule,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<u32>,
    #[serde(default = "active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardOfferForm {
    pub bank_name: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub description: String,
    pub rule: DiscountRule,
    #[serde(default)]
    pub min_amount: Option<Money>,
    #[serde(default = "active")]
    pub is_active: bool,
}

const fn active() -> bool {
    true
}

fn bad(msg: &str) -> AppError {
    AppError::BadRequest(msg.to_owned())
}

fn check_rule(rule: &DiscountRule) -> Result<(), AppError> {
    if rule.is_valid() {
        Ok(())
    } else {
        Err(bad("Percent discounts must be 1-100 and flat discounts positive"))
    }
}

fn non_negative(amount: Option<Money>, what: &str) -> Result<Money, AppError> {
    let amount = amount.unwrap_or(Money::ZERO);
    if amount.is_negative() {
        return Err(AppError::BadRequest(format!("{what} must not be negative")));
    }
    Ok(amount)
}

impl CouponForm {
    /// Normalize and check into a coupon with the given id and usage.
    fn into_coupon(self, id: CouponId, usage_count: u32) -> Result<Coupon, AppError> {
        let code = Coupon::normalize_code(&self.code);
        if code.is_empty() || code.len() > MAX_CODE_LEN {
            return Err(AppError::BadRequest(format!(
                "Coupon codes must be 1-{MAX_CODE_LEN} characters"
            )));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(bad("Coupon codes may only use letters, digits, '-' and '_'"));
        }
        check_rule(&self.rule)?;
        let min_purchase = non_negative(self.min_purchase, "Minimum purchase")?;
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until)
            && until <= from
        {
            return Err(bad("Coupon must end after it starts"));
        }
        if self.usage_limit == Some(0) {
            return Err(bad("Usage limit must be at least 1"));
        }

        Ok(Coupon {
            id,
            code,
            description: self.description.trim().to_owned(),
            rule: self.rule,
            min_purchase,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            usage_limit: self.usage_limit,
            usage_count,
            is_active: self.is_active,
        })
    }
}

impl CardOfferForm {
    fn into_offer(self, id: CardOfferId) -> Result<CardOffer, AppError> {
        let bank_name = self.bank_name.trim().to_owned();
        if bank_name.is_empty() {
            return Err(bad("Bank name is required"));
        }
        check_rule(&self.rule)?;
        Ok(CardOffer {
            id,
            bank_name,
            card_type: self.card_type,
            description: self.description.trim().to_owned(),
            rule: self.rule,
            min_amount: non_negative(self.min_amount, "Minimum amount")?,
            is_active: self.is_active,
        })
    }
}

// ===== Coupons =====

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list_coupons(backend: &dyn Backend) -> Result<Vec<Coupon>, AppError> {
    Ok(CouponRepository::new(backend).list().await?)
}

/// # Errors
///
/// Returns `AppError::BadRequest` for an invalid form and
/// `AppError::Conflict` if the code is taken.
#[instrument(skip(backend, form), fields(code = %form.code))]
pub async fn create_coupon(backend: &dyn Backend, form: CouponForm) -> Result<Coupon, AppError> {
    let coupon = form.into_coupon(CouponId::random(), 0)?;
    let repo = CouponRepository::new(backend);
    if repo.find_by_code(&coupon.code).await?.is_some() {
        return Err(code_taken(&coupon.code));
    }
    let created = repo.create(&coupon).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => code_taken(&coupon.code),
        other => other.into(),
    })?;
    info!(coupon_id = %created.id, code = %created.code, "Coupon created");
    Ok(created)
}

/// Replace a coupon's settings, keeping its usage count.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown coupon and
/// `AppError::Conflict` if the new code belongs to another coupon.
#[instrument(skip(backend, form))]
pub async fn update_coupon(
    backend: &dyn Backend,
    id: CouponId,
    form: CouponForm,
) -> Result<Coupon, AppError> {
    let repo = CouponRepository::new(backend);
    let existing = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon".to_owned()))?;
    let coupon = form.into_coupon(id, existing.usage_count)?;
    if let Some(other) = repo.find_by_code(&coupon.code).await?
        && other.id != id
    {
        return Err(code_taken(&coupon.code));
    }
    let updated = repo.update(&coupon).await?;
    info!(coupon_id = %id, "Coupon updated");
    Ok(updated)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown coupon.
pub async fn delete_coupon(backend: &dyn Backend, id: CouponId) -> Result<(), AppError> {
    CouponRepository::new(backend)
        .delete(id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Coupon".to_owned()),
            other => other.into(),
        })?;
    info!(coupon_id = %id, "Coupon deleted");
    Ok(())
}

fn code_taken(code: &str) -> AppError {
    AppError::Conflict(format!("Coupon code {code} is already in use"))
}

// ===== Card offers =====

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list_card_offers(backend: &dyn Backend) -> Result<Vec<CardOffer>, AppError> {
    Ok(CardOfferRepository::new(backend).list().await?)
}

/// # Errors
///
/// Returns `AppError::BadRequest` for an invalid form.
#[instrument(skip(backend, form), fields(bank = %form.bank_name))]
pub async fn create_card_offer(backend: &dyn Backend, form: CardOfferForm) -> Result<CardOffer, AppError> {
    let offer = form.into_offer(CardOfferId::random())?;
    let created = CardOfferRepository::new(backend).create(&offer).await?;
    info!(card_offer_id = %created.id, "Card offer created");
    Ok(created)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown offer.
#[instrument(skip(backend, form))]
pub async fn update_card_offer(
    backend: &dyn Backend,
    id: CardOfferId,
    form: CardOfferForm,
) -> Result<CardOffer, AppError> {
    let repo = CardOfferRepository::new(backend);
    if repo.get(id).await?.is_none() {
        return Err(AppError::NotFound("Card offer".to_owned()));
    }
    Ok(repo.update(&form.into_offer(id)?).await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown offer.
pub async fn delete_card_offer(backend: &dyn Backend, id: CardOfferId) -> Result<(), AppError> {
    CardOfferRepository::new(backend)
        .delete(id)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound("Card offer".to_owned()),
            other => other.into(),
        })?;
    info!(card_offer_id = %id, "Card offer deleted");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use bazaar_core::models::DiscountKind;
    use bazaar_platform::MemoryBackend;

    use super::*;

    fn percent(value: i64) -> DiscountRule {
        DiscountRule {
            kind: DiscountKind::Percent,
            value: Decimal::new(value, 0),
            max_discount: Some(Money::from_rupees(100)),
        }
    }

    fn coupon_form(code: &str) -> CouponForm {
        CouponForm {
            code: code.to_string(),
            description: "Festive sale".to_string(),
            rule: percent(10),
            min_purchase: Some(Money::from_rupees(300)),
            valid_from: None,
            valid_until: None,
            usage_limit: Some(100),
            is_active: true,
        }
    }

    fn offer_form(bank: &str) -> CardOfferForm {
        CardOfferForm {
            bank_name: bank.to_string(),
            card_type: CardType::Credit,
            description: String::new(),
            rule: percent(5),
            min_amount: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_coupon_codes_are_unique_and_normalized() {
        let backend = MemoryBackend::new();
        let created = create_coupon(&backend, coupon_form(" diwali10 ")).await.unwrap();
        assert_eq!(created.code, "DIWALI10");
        assert_eq!(created.usage_count, 0);

        let err = create_coupon(&backend, coupon_form("DIWALI10")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let other = create_coupon(&backend, coupon_form("HOLI5")).await.unwrap();
        let err = update_coupon(&backend, other.id, coupon_form("diwali10"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_usage_count() {
        let backend = MemoryBackend::new();
        let created = create_coupon(&backend, coupon_form("SAVE10")).await.unwrap();
        CouponRepository::new(&backend)
            .record_usage(created.id)
            .await
            .unwrap();

        let mut form = coupon_form("SAVE10");
        form.is_active = false;
        let updated = update_coupon(&backend, created.id, form).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(updated.usage_count, 1);

        delete_coupon(&backend, created.id).await.unwrap();
        assert!(list_coupons(&backend).await.unwrap().is_empty());
        let err = delete_coupon(&backend, created.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_coupon_validation() {
        let backend = MemoryBackend::new();

        let mut form = coupon_form("BAD CODE");
        assert!(create_coupon(&backend, form.clone()).await.is_err());

        form = coupon_form("OVER");
        form.rule = percent(120);
        assert!(matches!(
            create_coupon(&backend, form).await.unwrap_err(),
            AppError::BadRequest(_)
        ));

        form = coupon_form("BACKWARDS");
        let now = Utc::now();
        form.valid_from = Some(now);
        form.valid_until = Some(now - Duration::days(1));
        assert!(matches!(
            create_coupon(&backend, form).await.unwrap_err(),
            AppError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_card_offer_crud() {
        let backend = MemoryBackend::new();
        let offer = create_card_offer(&backend, offer_form("HDFC Bank")).await.unwrap();
        assert_eq!(offer.min_amount, Money::ZERO);

        let mut form = offer_form("HDFC Bank");
        form.is_active = false;
        let updated = update_card_offer(&backend, offer.id, form).await.unwrap();
        assert!(!updated.is_active);
        assert_eq!(list_card_offers(&backend).await.unwrap().len(), 1);

        let err = create_card_offer(&backend, offer_form("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        delete_card_offer(&backend, offer.id).await.unwrap();
        let err = update_card_offer(&backend, offer.id, offer_form("HDFC Bank"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
