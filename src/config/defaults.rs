//! Default configuration values

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Base delay for download retry backoff (in milliseconds)
pub const DOWNLOAD_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Directory (under the project root) that receives the Viper tools bundle
pub const VIPER_TOOLS_DIR: &str = "viper_tools";

/// Marker file written inside the Viper tools directory after a successful install
pub const VIPER_TOOLS_STAMP: &str = ".viper-tools-stamp";

/// Prefix of staging directories used while extracting
pub const STAGING_PREFIX: &str = ".viper_tools.staging-";

/// Temporary download location (under the project root)
pub const DOWNLOAD_TEMP_FILE: &str = ".viper_tools.download";

/// Directories every Viper tools bundle contains
pub const VIPER_TOOLS_REQUIRED_DIRS: &[&str] = &["backends", "z3"];

/// Toolchain pin file (plain channel or TOML form)
pub const TOOLCHAIN_PIN_FILE: &str = "rust-toolchain";

/// Toolchain pin file, TOML-only variant
pub const TOOLCHAIN_PIN_FILE_TOML: &str = "rust-toolchain.toml";

/// Toolchain manager binary
pub const TOOLCHAIN_MANAGER: &str = "rustup";

/// Components the verifier needs to build against the compiler
pub const REQUIRED_COMPONENTS: &[&str] = &["rust-src", "rustc-dev", "llvm-tools-preview"];

/// Formatter component; failing to install it is not fatal
pub const OPTIONAL_FORMATTER_COMPONENT: &str = "rustfmt";

/// Native packages for apt-based Linux distributions
pub const LINUX_PACKAGES: &[&str] = &[
    "build-essential",
    "pkg-config",
    "gcc",
    "libssl-dev",
    "openjdk-11-jdk",
];

/// Native packages for macOS (Homebrew)
pub const MACOS_PACKAGES: &[&str] = &["pkg-config", "openssl", "openjdk@11"];
