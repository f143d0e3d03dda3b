use std::path::PathBuf;
use std::sync::{Arc, Once};

use core_game::{load_rules_config_from_env, RulesConfig};

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_rules_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test rules config at {}",
            config_path.display()
        );

        std::env::set_var("RULES_CONFIG_PATH", &config_path);
    });
}

/// Rules from the fixture, loaded the way the binaries load them.
pub fn test_rules() -> Arc<RulesConfig> {
    ensure_test_config();
    load_rules_config_from_env()
}
