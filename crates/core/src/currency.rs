use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::expense::ConvertedAmount;
use crate::errors::DomainError;

/// Every rate in a table is expressed against this code.
pub const REFERENCE_CURRENCY: &str = "USD";

const AMOUNT_SCALE: u32 = 2;
const RATE_SCALE: u32 = 6;

/// Static USD-relative exchange rates keyed by upper-case ISO code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateTable {
    rates: BTreeMap<String, Decimal>,
}

impl Default for RateTable {
    fn default() -> Self {
        let rates = [
            ("USD", Decimal::ONE),
            ("EUR", Decimal::new(92, 2)),
            ("GBP", Decimal::new(78, 2)),
            ("INR", Decimal::new(83, 0)),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self { rates }
    }
}

impl RateTable {
    pub fn new<I, K>(rates: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        Self { rates: BTreeMap::new() }.with_rates(rates)
    }

    /// Adds or replaces entries. The reference currency stays pinned at 1.
    pub fn with_rates<I, K>(mut self, rates: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        for (code, rate) in rates {
            let code = normalize_code(code.as_ref());
            if code.is_empty() {
                return Err(DomainError::InvariantViolation(
                    "currency code must not be blank".to_string(),
                ));
            }
            if rate <= Decimal::ZERO {
                return Err(DomainError::InvariantViolation(format!(
                    "exchange rate for `{code}` must be positive, got {rate}"
                )));
            }
            if code == REFERENCE_CURRENCY && rate != Decimal::ONE {
                return Err(DomainError::InvariantViolation(format!(
                    "reference currency `{REFERENCE_CURRENCY}` must have rate 1"
                )));
            }
            self.rates.insert(code, rate);
        }
        self.rates.entry(REFERENCE_CURRENCY.to_string()).or_insert(Decimal::ONE);
        Ok(self)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(&normalize_code(code))
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }

    pub fn rate(&self, code: &str) -> Result<Decimal, DomainError> {
        let code = normalize_code(code);
        self.rates.get(&code).copied().ok_or(DomainError::UnknownCurrency(code))
    }

    /// `amount / rate(from) * rate(to)` rounded to cents; the reported rate keeps six places.
    pub fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
    ) -> Result<ConvertedAmount, DomainError> {
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;

        let converted = amount
            .checked_div(from_rate)
            .and_then(|base| base.checked_mul(to_rate))
            .ok_or_else(|| overflow(amount, from, to))?;
        let rate = to_rate.checked_div(from_rate).ok_or_else(|| overflow(amount, from, to))?;

        let mut converted =
            converted.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        converted.rescale(AMOUNT_SCALE);

        Ok(ConvertedAmount {
            amount: converted,
            currency: normalize_code(to),
            rate: rate.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        })
    }
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn overflow(amount: Decimal, from: &str, to: &str) -> DomainError {
    DomainError::InvariantViolation(format!(
        "converting {amount} from `{from}` to `{to}` overflows"
    ))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::RateTable;
    use crate::errors::DomainError;

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    #[test]
    fn converts_usd_to_inr() {
        let converted = RateTable::default().convert(dec("100"), "USD", "INR").expect("convert");

        assert_eq!(converted.amount, dec("8300.00"));
        assert_eq!(converted.amount.to_string(), "8300.00", "amounts always carry cents");
        assert_eq!(converted.currency, "INR");
        assert_eq!(converted.rate, dec("83"));
    }

    #[test]
    fn rounds_amount_to_cents_and_rate_to_six_places() {
        let converted = RateTable::default().convert(dec("10"), "EUR", "GBP").expect("convert");

        // 10 / 0.92 * 0.78 = 8.47826...
        assert_eq!(converted.amount, dec("8.48"));
        // 0.78 / 0.92 = 0.847826086...
        assert_eq!(converted.rate, dec("0.847826"));
    }

    #[test]
    fn same_currency_is_identity() {
        let converted = RateTable::default().convert(dec("42.5"), "eur", "EUR").expect("convert");
        assert_eq!(converted.amount, dec("42.50"));
        assert_eq!(converted.rate, Decimal::ONE);
    }

    #[test]
    fn round_trip_stays_within_rounding_tolerance() {
        let table = RateTable::default();
        let codes: Vec<String> = table.codes().map(str::to_string).collect();
        let amounts = [dec("0.01"), dec("1"), dec("19.99"), dec("250.75"), dec("12345.67")];
        let half_cent = dec("0.005");

        for from in &codes {
            for to in &codes {
                // Half a cent lost in each leg, the first leg scaled back into `from`.
                let ratio = table.rate(from).expect("from") / table.rate(to).expect("to");
                let tolerance = half_cent * ratio + half_cent;

                for amount in amounts {
                    let there = table.convert(amount, from, to).expect("forward");
                    let back = table.convert(there.amount, to, from).expect("backward");
                    let drift = (back.amount - amount).abs();
                    assert!(
                        drift <= tolerance,
                        "{amount} {from}->{to}->{from} came back as {}",
                        back.amount
                    );
                }
            }
        }
    }

    #[test]
    fn unknown_currency_is_an_error() {
        let error = RateTable::default().convert(dec("5"), "USD", "xyz").expect_err("unknown");
        assert_eq!(error, DomainError::UnknownCurrency("XYZ".to_string()));
    }

    #[test]
    fn overrides_extend_the_table_and_validate_rates() {
        let table = RateTable::default()
            .with_rates([("jpy", dec("150"))])
            .expect("add yen");
        assert!(table.contains("JPY"));
        assert_eq!(table.rate("jpy").expect("rate"), dec("150"));

        assert!(RateTable::default().with_rates([("CHF", Decimal::ZERO)]).is_err());
        assert!(RateTable::default().with_rates([("USD", dec("2"))]).is_err());
    }

    #[test]
    fn empty_table_still_knows_the_reference_currency() {
        let table = RateTable::new(Vec::<(String, Decimal)>::new()).expect("empty table");
        assert!(table.contains("USD"));
    }
}
