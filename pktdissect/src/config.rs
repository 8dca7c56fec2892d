//! Process-wide decoding options.

use once_cell::sync::OnceCell;

/// Which checksum algorithm SCTP packets use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SctpChecksum {
    /// CRC-32C, RFC 4960.
    #[default]
    Crc32c,
    /// Adler-32, RFC 2960.
    Adler32,
}

/// Options consulted while decoding and building packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DissectConfig {
    max_depth: usize,
    sctp_checksum: SctpChecksum,
}

/// Default bound on the number of nested payloads decoded below the outermost packet.
pub const DEFAULT_MAX_DEPTH: usize = 32;

static GLOBAL: OnceCell<DissectConfig> = OnceCell::new();
static DEFAULT: DissectConfig = DissectConfig::new();

impl DissectConfig {
    /// The default configuration.
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            sctp_checksum: SctpChecksum::Crc32c,
        }
    }

    /// Limit the depth of the decoded encapsulation chain.
    ///
    /// Payloads nested deeper than this are kept as opaque bytes.
    pub fn max_depth(mut self, value: usize) -> Self {
        self.max_depth = value;
        self
    }

    /// Select the SCTP checksum algorithm.
    pub fn sctp_checksum(mut self, value: SctpChecksum) -> Self {
        self.sctp_checksum = value;
        self
    }

    /// The configured depth limit.
    pub fn get_max_depth(&self) -> usize {
        self.max_depth
    }

    /// The configured SCTP checksum algorithm.
    pub fn get_sctp_checksum(&self) -> SctpChecksum {
        self.sctp_checksum
    }

    /// Publish `self` as the process-wide configuration.
    ///
    /// This succeeds once; later calls hand the rejected value back.
    pub fn install(self) -> Result<(), DissectConfig> {
        GLOBAL.set(self)
    }

    /// The installed configuration, or the default one if none was installed.
    pub fn global() -> &'static DissectConfig {
        GLOBAL.get().unwrap_or(&DEFAULT)
    }
}

impl Default for DissectConfig {
    fn default() -> Self {
        Self::new()
    }
}
