//! Session manager configuration.

/// Default timeout applied to newly opened handles, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u32 = 10_000;

/// Default receive buffer capacity in bytes.
pub const DEFAULT_READ_CAPACITY: usize = 32 * 1024;

/// Default prompt response capacity in bytes.
pub const DEFAULT_PROMPT_CAPACITY: usize = 8 * 1024;

/// Configuration for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Timeout given to each handle at open. Default: 10 s.
    pub default_timeout_ms: u32,
    /// Verbose per-transaction tracing. Default: off.
    pub diagnostics: bool,
    /// Buffer size for `receive`. Default: 32 KiB.
    pub read_capacity: usize,
    /// Buffer size for `prompt` responses. Default: 8 KiB.
    pub prompt_capacity: usize,
    /// Block `SIGALRM` around write, read and prompt. Default: on.
    pub mask_alarm: bool,
    /// Retry `unlock` on interrupt like every other blocking primitive.
    /// Default: off, an interrupted unlock is reported as `UnlockFailed`.
    pub retry_unlock: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            diagnostics: false,
            read_capacity: DEFAULT_READ_CAPACITY,
            prompt_capacity: DEFAULT_PROMPT_CAPACITY,
            mask_alarm: true,
            retry_unlock: false,
        }
    }
}
