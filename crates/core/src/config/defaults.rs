//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_CLIENT_DIR: &str = "client";
pub(crate) const DEFAULT_NODE_MODULES_DIR: &str = "node_modules";
pub(crate) const DEFAULT_SCOPED_NAME_PATTERN: &str = "[name]__[local]___[hash]";
pub(crate) const DEFAULT_TEMP_PREFIX: &str = "stylepipe-";
pub(crate) const DEFAULT_OUT_DIR: &str = "ui/assets/esbuild";

pub(crate) fn default_repo_root() -> String {
    ".".to_string()
}

pub(crate) fn default_client_dir() -> String {
    DEFAULT_CLIENT_DIR.to_string()
}

pub(crate) fn default_node_modules_dir() -> String {
    DEFAULT_NODE_MODULES_DIR.to_string()
}

pub(crate) fn default_workspace_aliases() -> Vec<String> {
    vec!["wildcard/".to_string(), "shared".to_string()]
}

pub(crate) fn default_package_allow_list() -> Vec<String> {
    vec![
        "@reach".to_string(),
        "graphiql".to_string(),
        "@sourcegraph".to_string(),
        "bootstrap".to_string(),
        "open-color".to_string(),
        "react-grid-layout".to_string(),
    ]
}

pub(crate) fn default_include_paths() -> Vec<String> {
    vec![default_node_modules_dir(), default_client_dir()]
}

pub(crate) fn default_quiet() -> bool {
    true
}

pub(crate) fn default_browserslist() -> Vec<String> {
    vec![
        "last 1 version".to_string(),
        ">1%".to_string(),
        "not dead".to_string(),
    ]
}

pub(crate) fn default_scoped_name_pattern() -> String {
    DEFAULT_SCOPED_NAME_PATTERN.to_string()
}

pub(crate) fn default_temp_prefix() -> String {
    DEFAULT_TEMP_PREFIX.to_string()
}

pub(crate) fn default_out_dir() -> String {
    DEFAULT_OUT_DIR.to_string()
}

pub(crate) fn default_debounce_ms() -> u64 {
    100
}

pub(crate) fn default_ignore_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/.git/**".to_string(),
        "*.tmp".to_string(),
        "*~".to_string(),
    ]
}
