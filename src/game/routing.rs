//! Command classification.
//!
//! Every command resolves to exactly one [`Route`]:
//!
//! | Case | Target |
//! |---|---|
//! | command in the direct set | `<B>/<command without prefix>` |
//! | command in the routed set and `payload.action` is a string | `<B>/<command>/<action>` |
//! | otherwise | `<A>/<command>` |

use std::collections::HashSet;

use serde_json::Value;

use crate::config::GameConfig;

use super::Family;

/// Where a command is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Straight to family B; `base` is the command with its prefix stripped.
    DirectB { base: String },
    /// Family B sub-action endpoint.
    RoutedB { base: String, action: String },
    /// Family A default.
    A { command: String },
}

impl Route {
    /// The family whose session the request needs.
    pub fn family(&self) -> Family {
        match self {
            Route::DirectB { .. } | Route::RoutedB { .. } => Family::B,
            Route::A { .. } => Family::A,
        }
    }

    /// Absolute request path given the two family prefixes.
    pub fn path(&self, family_a_path: &str, family_b_path: &str) -> String {
        match self {
            Route::DirectB { base } => format!("{}/{}", family_b_path, base),
            Route::RoutedB { base, action } => format!("{}/{}/{}", family_b_path, base, action),
            Route::A { command } => format!("{}/{}", family_a_path, command),
        }
    }
}

/// Classifies command names into routes.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    direct: HashSet<String>,
    direct_prefix: String,
    routed: HashSet<String>,
}

impl CommandRouter {
    /// Build a router from explicit command sets.
    pub fn new<I, J>(direct: I, direct_prefix: &str, routed: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            direct: direct.into_iter().collect(),
            direct_prefix: direct_prefix.to_string(),
            routed: routed.into_iter().collect(),
        }
    }

    /// Build a router from the game configuration.
    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(
            config.direct_commands.iter().cloned(),
            &config.direct_prefix,
            config.routed_commands.iter().cloned(),
        )
    }

    /// Resolve `command` (with its optional payload) to a route.
    ///
    /// # Example
    /// ```
    /// use gamepilot::game::{CommandRouter, Route};
    /// use serde_json::json;
    ///
    /// let router = CommandRouter::new(
    ///     vec!["v2_get_ship".to_string()],
    ///     "v2_",
    ///     vec!["storage".to_string()],
    /// );
    /// let payload = json!({"action": "deposit"});
    /// assert_eq!(
    ///     router.classify("storage", Some(&payload)),
    ///     Route::RoutedB { base: "storage".into(), action: "deposit".into() }
    /// );
    /// assert_eq!(router.classify("storage", None), Route::A { command: "storage".into() });
    /// ```
    pub fn classify(&self, command: &str, payload: Option<&Value>) -> Route {
        if self.direct.contains(command) {
            let base = command
                .strip_prefix(self.direct_prefix.as_str())
                .unwrap_or(command);
            return Route::DirectB {
                base: base.to_string(),
            };
        }

        if self.routed.contains(command) {
            if let Some(action) = payload.and_then(|p| p.get("action")).and_then(Value::as_str) {
                return Route::RoutedB {
                    base: command.to_string(),
                    action: action.to_string(),
                };
            }
        }

        Route::A {
            command: command.to_string(),
        }
    }

    /// Whether `command` belongs to either family-B set.
    pub fn is_known_b_command(&self, command: &str) -> bool {
        self.direct.contains(command) || self.routed.contains(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> CommandRouter {
        CommandRouter::from_config(&GameConfig::default())
    }

    #[test]
    fn test_direct_commands_never_carry_action() {
        let router = router();
        let payload = json!({"action": "sell"});
        for cmd in &GameConfig::default().direct_commands {
            let route = router.classify(cmd, Some(&payload));
            assert!(matches!(route, Route::DirectB { .. }), "{}", cmd);
            let path = route.path("/api/v1", "/api/v2");
            assert!(!path.contains("sell"), "{}", path);
            assert!(!path.contains("v2_"), "{}", path);
        }
    }

    #[test]
    fn test_direct_strips_prefix() {
        let route = router().classify("v2_get_ship", None);
        assert_eq!(route.path("/api/v1", "/api/v2"), "/api/v2/get_ship");
        assert_eq!(route.family(), Family::B);
    }

    #[test]
    fn test_routed_with_string_action() {
        let payload = json!({"action": "withdraw", "item": "ore"});
        let route = router().classify("storage", Some(&payload));
        assert_eq!(route.path("/api/v1", "/api/v2"), "/api/v2/storage/withdraw");
        assert_eq!(route.family(), Family::B);
    }

    #[test]
    fn test_routed_without_action_goes_to_a() {
        let router = router();
        for payload in [
            None,
            Some(json!({})),
            Some(json!({"action": 7})),
            Some(json!({"action": null})),
            Some(json!({"action": ["deposit"]})),
        ] {
            let route = router.classify("market", payload.as_ref());
            assert_eq!(
                route,
                Route::A {
                    command: "market".into()
                }
            );
            assert_eq!(route.family(), Family::A);
        }
    }

    #[test]
    fn test_unknown_command_goes_to_a() {
        let payload = json!({"action": "go"});
        let route = router().classify("travel", Some(&payload));
        assert_eq!(route.path("/api/v1", "/api/v2"), "/api/v1/travel");
    }

    #[test]
    fn test_is_known_b_command() {
        let router = router();
        assert!(router.is_known_b_command("v2_get_cargo"));
        assert!(router.is_known_b_command("faction"));
        assert!(!router.is_known_b_command("mine"));
    }
}
