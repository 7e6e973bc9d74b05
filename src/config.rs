use core::ffi::CStr;

/// Tunables of a [`Lookup`](crate::Lookup) context.
///
/// Const-friendly like the rest of the configuration surface: build it once
/// with [`Config::DEFAULT`] and the `with_*` helpers.
///
/// # Examples
/// ```rust
/// use wusers::Config;
///
/// const CONFIG: Config = Config::DEFAULT
///     .with_initial_page_hint(512)
///     .with_default_shell(c"pwsh.exe");
/// assert_eq!(CONFIG.initial_page_hint, 512);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// First preferred page length (bytes) passed to the enumeration call.
    pub initial_page_hint: usize,
    /// How many times a page request may be doubled after `BufferTooSmall`.
    pub max_page_retries: u32,
    /// Chunk count above which synthesized names are pruned from the cache store.
    pub chunk_high_water: usize,
    /// Reject empty names with `InvalidArgument` instead of querying the directory.
    pub reject_empty_names: bool,
    /// Value of `pw_shell`; Windows accounts carry no login shell.
    pub default_shell: &'static CStr,
    /// Value of `pw_passwd` and `gr_passwd`; password hashes are never returned.
    pub password_placeholder: &'static CStr,
}

impl Config {
    /// Sensible defaults for a local account directory.
    pub const DEFAULT: Self = Self {
        initial_page_hint: 4096,
        max_page_retries: 8,
        chunk_high_water: 64,
        reject_empty_names: true,
        default_shell: c"cmd.exe",
        password_placeholder: c"*",
    };

    /// Sets [`Config::initial_page_hint`]; zero is raised to one byte.
    #[inline]
    #[must_use]
    pub const fn with_initial_page_hint(mut self, bytes: usize) -> Self {
        self.initial_page_hint = if bytes == 0 { 1 } else { bytes };
        self
    }

    /// Sets [`Config::max_page_retries`].
    #[inline]
    #[must_use]
    pub const fn with_max_page_retries(mut self, retries: u32) -> Self {
        self.max_page_retries = retries;
        self
    }

    /// Sets [`Config::chunk_high_water`]; values below 2 are raised to 2.
    #[inline]
    #[must_use]
    pub const fn with_chunk_high_water(mut self, chunks: usize) -> Self {
        self.chunk_high_water = if chunks < 2 { 2 } else { chunks };
        self
    }

    /// Sets [`Config::reject_empty_names`].
    #[inline]
    #[must_use]
    pub const fn with_reject_empty_names(mut self, reject: bool) -> Self {
        self.reject_empty_names = reject;
        self
    }

    /// Sets [`Config::default_shell`].
    #[inline]
    #[must_use]
    pub const fn with_default_shell(mut self, shell: &'static CStr) -> Self {
        self.default_shell = shell;
        self
    }

    /// Sets [`Config::password_placeholder`].
    #[inline]
    #[must_use]
    pub const fn with_password_placeholder(mut self, placeholder: &'static CStr) -> Self {
        self.password_placeholder = placeholder;
        self
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_values_are_clamped() {
        const C: Config = Config::DEFAULT
            .with_initial_page_hint(0)
            .with_chunk_high_water(0);
        assert_eq!(C.initial_page_hint, 1);
        assert_eq!(C.chunk_high_water, 2);
        assert_eq!(Config::default(), Config::DEFAULT);
    }
}
