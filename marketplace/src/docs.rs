use chrono::{DateTime, SecondsFormat, Utc};
use clearing_engine::quantize;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::Sha256;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeRole {
    Buyer,
    Seller,
}

impl std::fmt::Display for TradeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeRole::Buyer => write!(f, "buyer"),
            TradeRole::Seller => write!(f, "seller"),
        }
    }
}

/// Sign `auction|trader|role|product|price|quantity|timestamp` with
/// HMAC-SHA256 under the server secret.
fn sign(
    secret: &str,
    auction_id: Uuid,
    trader_id: Uuid,
    role: TradeRole,
    product: &str,
    price: Decimal,
    quantity: Decimal,
    timestamp: &str,
) -> String {
    let payload = format!(
        "{auction_id}|{trader_id}|{role}|{product}|{price}|{quantity}|{timestamp}"
    );
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Write one plain-text trade receipt under
/// `{root}/auction_{id}/auction_{id}_{role}_trader_{tid}_{epoch}.txt`.
///
/// Receipts are advisory; settlement never depends on them.
pub fn write_trade_document(
    root: &Path,
    secret: &str,
    auction_id: Uuid,
    product: &str,
    role: TradeRole,
    trader_id: Uuid,
    price: Decimal,
    quantity: Decimal,
    now: DateTime<Utc>,
) -> io::Result<PathBuf> {
    let dir = root.join(format!("auction_{auction_id}"));
    fs::create_dir_all(&dir)?;

    let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let filename = format!(
        "auction_{auction_id}_{role}_trader_{trader_id}_{epoch}.txt",
        epoch = now.timestamp()
    );
    let path = dir.join(filename);

    let total = quantize(price * quantity);
    let signature = sign(
        secret, auction_id, trader_id, role, product, price, quantity, &timestamp,
    );

    let mut file = fs::File::create(&path)?;
    writeln!(file, "=== TRADE CONFIRMATION ===")?;
    writeln!(file, "Auction: {auction_id}")?;
    writeln!(file, "Role: {role}")?;
    writeln!(file, "Trader: {trader_id}")?;
    writeln!(file, "Date: {timestamp}")?;
    writeln!(file)?;
    writeln!(file, "Details:")?;
    writeln!(file, "- Product: {product}")?;
    writeln!(file, "- Price: {price}")?;
    writeln!(file, "- Quantity: {quantity}")?;
    writeln!(file, "- Total: {total}")?;
    writeln!(file)?;
    writeln!(file, "Signature: {signature}")?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_document_written_with_signature() {
        let dir = std::env::temp_dir().join(format!("docs_test_{}", Uuid::new_v4()));
        let auction_id = Uuid::new_v4();
        let trader_id = Uuid::new_v4();

        let path = write_trade_document(
            &dir,
            "test-secret",
            auction_id,
            "grain",
            TradeRole::Buyer,
            trader_id,
            dec!(15),
            dec!(2),
            Utc::now(),
        )
        .unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Role: buyer"));
        assert!(contents.contains("- Product: grain"));
        assert!(contents.contains("- Total: 30.000000"));
        assert!(contents.contains("Signature: "));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_signature_is_deterministic() {
        let auction_id = Uuid::new_v4();
        let trader_id = Uuid::new_v4();
        let a = sign(
            "secret", auction_id, trader_id, TradeRole::Seller, "grain",
            dec!(10), dec!(1), "2026-01-01T00:00:00Z",
        );
        let b = sign(
            "secret", auction_id, trader_id, TradeRole::Seller, "grain",
            dec!(10), dec!(1), "2026-01-01T00:00:00Z",
        );
        let c = sign(
            "other", auction_id, trader_id, TradeRole::Seller, "grain",
            dec!(10), dec!(1), "2026-01-01T00:00:00Z",
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
