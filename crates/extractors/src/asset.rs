//! Token quantities such as `"1.0000 EOS"`

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub amount: f64,
    pub precision: u8,
    pub symbol: String,
}

impl Asset {
    /// Parse `"<decimal> <SYMBOL>"`; anything else yields `None`
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace();
        let number = parts.next()?;
        let symbol = parts.next()?;
        if parts.next().is_some() || symbol.is_empty() {
            return None;
        }
        if !symbol.chars().all(|c| c.is_ascii_uppercase()) {
            return None;
        }
        let precision = match number.split_once('.') {
            Some((_, fraction)) => u8::try_from(fraction.len()).ok()?,
            None => 0,
        };
        let amount = number.parse::<f64>().ok()?;
        Some(Self {
            amount,
            precision,
            symbol: symbol.to_string(),
        })
    }

    /// Write `amount` and `symbol` into a record
    pub(crate) fn write_into(&self, fields: &mut Map<String, Value>) {
        fields.insert("amount".into(), Value::from(self.amount));
        fields.insert("symbol".into(), Value::from(self.symbol.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let asset = Asset::parse("1.0000 EOS").unwrap();
        assert_eq!(asset.amount, 1.0);
        assert_eq!(asset.precision, 4);
        assert_eq!(asset.symbol, "EOS");

        let whole = Asset::parse("25 BOS").unwrap();
        assert_eq!(whole.precision, 0);
        assert_eq!(whole.amount, 25.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Asset::parse("").is_none());
        assert!(Asset::parse("1.0000").is_none());
        assert!(Asset::parse("abc EOS").is_none());
        assert!(Asset::parse("1.0 eos").is_none());
        assert!(Asset::parse("1.0 EOS extra").is_none());
    }
}
