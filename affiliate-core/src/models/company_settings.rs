use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Product;

/// Which side of a partnership carries the platform fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePayer {
    #[default]
    Company,
    Affiliate,
}

impl FeePayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Company => "company",
            Self::Affiliate => "affiliate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "company" => Some(Self::Company),
            "affiliate" => Some(Self::Affiliate),
            _ => None,
        }
    }
}

/// Per-company commission configuration. Rates are percentages (`10` = 10%).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_id: i64,
    pub commission_rate: Decimal,
    pub platform_fee_rate: Decimal,
    pub platform_fee_paid_by: FeePayer,
    pub payout_frequency_days: i32,
    pub auto_approve_commissions: bool,
}

impl CompanySettings {
    pub const DEFAULT_COMMISSION_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 0);
    pub const DEFAULT_PLATFORM_FEE_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 0);
    pub const DEFAULT_PAYOUT_FREQUENCY_DAYS: i32 = 30;

    /// The row provisioned for a company that has never configured anything.
    pub fn defaults_for(company_id: i64) -> Self {
        Self {
            company_id,
            commission_rate: Self::DEFAULT_COMMISSION_RATE,
            platform_fee_rate: Self::DEFAULT_PLATFORM_FEE_RATE,
            platform_fee_paid_by: FeePayer::Company,
            payout_frequency_days: Self::DEFAULT_PAYOUT_FREQUENCY_DAYS,
            auto_approve_commissions: false,
        }
    }

    /// Rates that apply to a single deal.
    ///
    /// A product of this company carrying its own `commission_rate` replaces
    /// the company rate for that deal only. The platform fee rate always comes
    /// from the company.
    pub fn effective_rates(
        &self,
        product: Option<&Product>,
    ) -> EffectiveRates {
        let (commission_rate, source) = match product {
            Some(Product {
                id,
                company_id,
                commission_rate: Some(rate),
                ..
            }) if *company_id == self.company_id => (*rate, RateSource::Product(*id)),
            _ => (self.commission_rate, RateSource::Company),
        };

        EffectiveRates {
            commission_rate,
            platform_fee_rate: self.platform_fee_rate,
            platform_fee_paid_by: self.platform_fee_paid_by,
            source,
        }
    }
}

/// Where the commission rate of an [`EffectiveRates`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateSource {
    Company,
    Product(i64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRates {
    pub commission_rate: Decimal,
    pub platform_fee_rate: Decimal,
    pub platform_fee_paid_by: FeePayer,
    pub source: RateSource,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn product(commission_rate: Option<Decimal>) -> Product {
        Product {
            id: 7,
            company_id: 1,
            name: "Solar install".to_string(),
            commission_rate,
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = CompanySettings::defaults_for(42);

        assert_eq!(settings.company_id, 42);
        assert_eq!(settings.commission_rate, dec!(10));
        assert_eq!(settings.platform_fee_rate, dec!(20));
        assert_eq!(settings.platform_fee_paid_by, FeePayer::Company);
        assert_eq!(settings.payout_frequency_days, 30);
        assert!(!settings.auto_approve_commissions);
    }

    #[test]
    fn company_rate_applies_without_product() {
        let rates = CompanySettings::defaults_for(1).effective_rates(None);

        assert_eq!(rates.commission_rate, dec!(10));
        assert_eq!(rates.source, RateSource::Company);
    }

    #[test]
    fn company_rate_applies_when_product_has_no_override() {
        let p = product(None);
        let rates = CompanySettings::defaults_for(1).effective_rates(Some(&p));

        assert_eq!(rates.commission_rate, dec!(10));
        assert_eq!(rates.source, RateSource::Company);
    }

    #[test]
    fn product_rate_overrides_commission_only() {
        let mut settings = CompanySettings::defaults_for(1);
        settings.platform_fee_rate = dec!(12.5);
        let p = product(Some(dec!(17.5)));

        let rates = settings.effective_rates(Some(&p));

        assert_eq!(rates.commission_rate, dec!(17.5));
        assert_eq!(rates.platform_fee_rate, dec!(12.5));
        assert_eq!(rates.source, RateSource::Product(7));
    }

    #[test]
    fn other_company_product_does_not_override() {
        let p = Product {
            company_id: 2,
            ..product(Some(dec!(40)))
        };

        let rates = CompanySettings::defaults_for(1).effective_rates(Some(&p));

        assert_eq!(rates.commission_rate, dec!(10));
        assert_eq!(rates.source, RateSource::Company);
    }

    #[test]
    fn fee_payer_parses_known_values_only() {
        assert_eq!(FeePayer::parse("company"), Some(FeePayer::Company));
        assert_eq!(FeePayer::parse("affiliate"), Some(FeePayer::Affiliate));
        assert_eq!(FeePayer::parse("platform"), None);
        assert_eq!(FeePayer::Affiliate.as_str(), "affiliate");
    }
}
