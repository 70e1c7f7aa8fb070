use std::fmt;

/// Per-message per-user status flag. DELIVERED may be promoted to READ but
/// never the reverse; the repository upserts enforce the direction.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ReceiptStatus {
    Delivered,
    Read,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Delivered => "DELIVERED",
            ReceiptStatus::Read => "READ",
        }
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
