//! Viper tools download URLs
//!
//! Bundles are pinned to a single release so repeated setups fetch
//! identical content.

/// Bundle for Linux hosts
pub const VIPER_TOOLS_LINUX: &str =
    "https://github.com/viperproject/viper-ide/releases/download/v-2023-08-03-1232/ViperToolsLinux.zip";

/// Bundle for macOS hosts
pub const VIPER_TOOLS_MACOS: &str =
    "https://github.com/viperproject/viper-ide/releases/download/v-2023-08-03-1232/ViperToolsMac.zip";

/// Bundle for Windows hosts
pub const VIPER_TOOLS_WINDOWS: &str =
    "https://github.com/viperproject/viper-ide/releases/download/v-2023-08-03-1232/ViperToolsWin.zip";
