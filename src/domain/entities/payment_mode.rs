/// Payment mode - test (sandbox) or live (production) environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Test,
    Live,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Test => "test",
            PaymentMode::Live => "live",
        }
    }

    /// Whether this mode is production (live)
    pub fn is_production(&self) -> bool {
        matches!(self, PaymentMode::Live)
    }

    /// Detect mode from Stripe key prefix.
    /// Live keys start with sk_live_ or rk_live_; everything else is treated as test.
    pub fn from_stripe_key_prefix(key: &str) -> Self {
        if key.starts_with("sk_live_") || key.starts_with("rk_live_") {
            PaymentMode::Live
        } else {
            PaymentMode::Test
        }
    }
}
