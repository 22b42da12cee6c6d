//! Event reasons recorded against the host record

pub const BOOTSTRAP_FAILED: &str = "BootstrapK8sNodeFailed";
pub const BOOTSTRAP_SUCCEEDED: &str = "BootstrapK8sNodeSucceeded";
pub const READ_INSTALLATION_SECRET_FAILED: &str = "ReadInstallationSecretFailed";
pub const INSTALL_SCRIPT_FAILED: &str = "InstallScriptExecutionFailed";
pub const INSTALL_SCRIPT_SUCCEEDED: &str = "InstallScriptExecutionSucceeded";
pub const STORE_UNINSTALLATION_SECRET_FAILED: &str = "StoreUninstallationSecretFailed";
pub const UNINSTALLATION_SECRET_MISSING: &str = "UninstallationSecretMissing";
pub const RESET_FAILED: &str = "ResetK8sNodeFailed";
pub const UNINSTALL_SCRIPT_FAILED: &str = "UninstallScriptFailed";
pub const RESET_SUCCEEDED: &str = "ResetK8sNodeSucceeded";
