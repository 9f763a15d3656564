/// Centralized argument handling for statshub
///
/// Stores the command line once and exposes flag and value lookups plus the
/// per-subsystem debug checks used across the crate.
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::env;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by binaries and tests to override the default env::args() collection
pub fn set_cmd_args(args: Vec<String>) {
    *CMD_ARGS.lock() = args;
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    CMD_ARGS.lock().clone()
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Webserver debug mode
pub fn is_debug_webserver_enabled() -> bool {
    has_arg("--debug-webserver") || has_arg("--debug-all")
}

// =============================================================================
// MODE FLAGS
// =============================================================================

/// Seed the in-memory data source with demo records
pub fn is_demo_enabled() -> bool {
    has_arg("--demo")
}

/// Config file override (--config <path>)
pub fn config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Port override (--port <port>)
pub fn port_override() -> Option<u16> {
    get_arg_value("--port").and_then(|p| p.parse().ok())
}

pub mod patterns {
    use super::has_arg;

    pub fn is_help_requested() -> bool {
        has_arg("--help") || has_arg("-h")
    }
}

/// Print usage information
pub fn print_help() {
    println!("statshub - real-time diagnostic statistics hub\n");
    println!("USAGE:");
    println!("    statshub [OPTIONS]\n");
    println!("OPTIONS:");
    println!("    --config <path>        Config file (default: data/config.toml)");
    println!("    --port <port>          Override webserver port");
    println!("    --demo                 Seed the in-memory source with demo records");
    println!("    --quiet                Only show warnings and errors");
    println!("    --verbose              Show all log output");
    println!("    --verbose-<tag>        Verbose output for a subsystem");
    println!("    --debug-<tag>          Debug output for a subsystem");
    println!("                           (system, config, events, stats, cache,");
    println!("                            coordinator, registry, protocol, webserver, all)");
    println!("    -h, --help             Show this help message");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_lookup() {
        set_cmd_args(vec![
            "statshub".to_string(),
            "--config".to_string(),
            "custom.toml".to_string(),
            "--port".to_string(),
            "9000".to_string(),
        ]);

        assert!(has_arg("--config"));
        assert_eq!(config_path_override().as_deref(), Some("custom.toml"));
        assert_eq!(port_override(), Some(9000));
        assert_eq!(get_arg_value("--missing"), None);
    }
}
