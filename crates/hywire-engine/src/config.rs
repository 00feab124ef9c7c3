//! Engine configuration
//!
//! Process-wide knobs, set before the first node is processed.

use hywire_expr::SwapStyle;
use hywire_net::ReconnectPolicy;

/// What to do when back/forward navigation misses the history cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMissPolicy {
    /// Re-fetch the page and swap it into the history root
    #[default]
    Fetch,
    /// Force a full reload through the location API
    FullReload,
}

/// Scroll behavior applied by show/scroll directives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Instant,
    Smooth,
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default swap style when no `hw-swap` resolves
    pub default_swap_style: SwapStyle,
    /// Default delay before the patch is applied
    pub default_swap_delay_ms: u64,
    /// Default delay before settling
    pub default_settle_delay_ms: u64,
    /// History snapshotting on/off
    pub history_enabled: bool,
    /// Bounded history cache capacity
    pub history_cache_size: usize,
    /// Storage key for persisted history snapshots
    pub history_storage_key: String,
    /// What to do on a history cache miss
    pub history_cache_miss: CacheMissPolicy,
    /// Send credentials by default
    pub with_credentials: bool,
    /// Default request timeout (0 = none)
    pub timeout_ms: u64,
    /// Allow conditional / vars expression evaluation
    pub eval_allowed: bool,
    /// Scroll behavior for show/scroll directives
    pub scroll_behavior: ScrollBehavior,
    /// Restore focus scroll position by default
    pub default_focus_scroll: bool,
    /// Class applied to `hw-indicator` targets while a request runs
    pub indicator_class: String,
    /// Class applied to the requesting node while a request runs
    pub request_class: String,
    /// Class applied to newly inserted nodes until settle
    pub added_class: String,
    /// Class applied to the target while settling
    pub settling_class: String,
    /// Class applied to the target while swapping
    pub swapping_class: String,
    /// Attributes reconciled between same-id nodes at settle time
    pub attributes_to_settle: Vec<String>,
    /// Swap 4xx/5xx response bodies anyway
    pub swap_on_error: bool,
    /// Reconnect-delay policy for dropped streams
    pub stream_reconnect: ReconnectPolicy,
    /// Cadence of the reveal/intersect scroll sampler
    pub reveal_scan_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_swap_style: SwapStyle::InnerHtml,
            default_swap_delay_ms: 0,
            default_settle_delay_ms: 20,
            history_enabled: true,
            history_cache_size: 10,
            history_storage_key: "hywire-history-cache".to_string(),
            history_cache_miss: CacheMissPolicy::Fetch,
            with_credentials: false,
            timeout_ms: 0,
            eval_allowed: true,
            scroll_behavior: ScrollBehavior::Instant,
            default_focus_scroll: false,
            indicator_class: "hw-indicator".to_string(),
            request_class: "hw-request".to_string(),
            added_class: "hw-added".to_string(),
            settling_class: "hw-settling".to_string(),
            swapping_class: "hw-swapping".to_string(),
            attributes_to_settle: vec![
                "class".to_string(),
                "style".to_string(),
                "width".to_string(),
                "height".to_string(),
            ],
            swap_on_error: false,
            stream_reconnect: ReconnectPolicy::default(),
            reveal_scan_interval_ms: 200,
        }
    }
}
