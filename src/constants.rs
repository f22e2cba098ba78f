//! Global Constants
//!
//! Centralized constants for routing and cost governance.
//! All magic numbers should be defined here with documentation.

/// Provider routing constants
pub mod routing {
    /// Score returned for a candidate with no recorded samples
    pub const NEUTRAL_SCORE: f64 = 0.5;

    /// Latency at or above this value scores zero (milliseconds)
    pub const LATENCY_CAP_MS: f64 = 5000.0;

    /// Cost per 1k units at or above this value scores zero
    pub const COST_CAP_PER_1K: f64 = 0.01;

    /// Maximum number of candidates considered when exploring
    pub const EXPLORE_TOP_N: usize = 3;

    /// Score component weights (must sum to 1.0)
    pub mod weights {
        pub const QUALITY: f64 = 0.40;
        pub const SUCCESS: f64 = 0.30;
        pub const LATENCY: f64 = 0.20;
        pub const COST: f64 = 0.10;
    }

    /// Tenant sample count tiers.
    ///
    /// Below `LOW_MAX_EXCLUSIVE` a tenant is "new"; up to and including
    /// `MID_MAX_INCLUSIVE` it is "established"; above that it is "mature".
    pub mod tiers {
        pub const LOW_MAX_EXCLUSIVE: u64 = 20;
        pub const MID_MAX_INCLUSIVE: u64 = 100;

        /// Exploration rate per tier
        pub const EPSILON_LOW: f64 = 0.20;
        pub const EPSILON_MID: f64 = 0.10;
        pub const EPSILON_HIGH: f64 = 0.05;

        /// (global weight, tenant weight) per tier
        pub const BLEND_LOW: (f64, f64) = (0.85, 0.15);
        pub const BLEND_MID: (f64, f64) = (0.60, 0.40);
        pub const BLEND_HIGH: (f64, f64) = (0.35, 0.65);
    }

    /// EWMA smoothing factor applied to every new observation
    pub const EWMA_LAMBDA: f64 = 0.2;
}

/// Cost guard constants
pub mod cost {
    /// Warning threshold used when the tenant value is missing or invalid (percent)
    pub const DEFAULT_WARNING_THRESHOLD: f64 = 80.0;

    /// Smallest accepted warning threshold (percent)
    pub const MIN_WARNING_THRESHOLD: f64 = 1.0;

    /// Largest accepted warning threshold (percent)
    pub const MAX_WARNING_THRESHOLD: f64 = 99.0;

    /// Percentage at which a limit hard-blocks requests
    pub const BLOCK_PERCENT: f64 = 100.0;

    /// Flat estimated price per 1000 tokens, regardless of provider or model.
    ///
    /// TODO: replace with a per-model price lookup once pricing is stored per candidate.
    pub const UNIT_COST_PER_1K_TOKENS: f64 = 0.001;
}

/// Storage constants
pub mod storage {
    /// Default database file, relative to the project directory
    pub const DEFAULT_DB_PATH: &str = ".routeguard/routeguard.db";

    /// Connection acquisition timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Alerting constants
pub mod alerts {
    /// Feature key used when the caller does not name one
    pub const DEFAULT_FEATURE_KEY: &str = "ai_generation";
}
