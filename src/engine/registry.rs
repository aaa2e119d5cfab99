use std::collections::HashMap;
use std::sync::OnceLock;

use crate::heuristic::Language;

/// How a language tag is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Evaluated in-process by the JavaScript interpreter
    Native,
    /// Approximated by a line scanner with the language's grammar
    Heuristic(Language),
    /// Print-idiom matching for anything else
    Generic,
}

const TAGS: &[(&str, Strategy)] = &[
    ("javascript", Strategy::Native),
    ("js", Strategy::Native),
    ("python", Strategy::Heuristic(Language::Python)),
    ("py", Strategy::Heuristic(Language::Python)),
    ("java", Strategy::Heuristic(Language::Java)),
    ("cpp", Strategy::Heuristic(Language::Cpp)),
    ("c++", Strategy::Heuristic(Language::Cpp)),
    ("c", Strategy::Heuristic(Language::Cpp)),
];

fn registry() -> &'static HashMap<&'static str, Strategy> {
    static REGISTRY: OnceLock<HashMap<&'static str, Strategy>> = OnceLock::new();
    REGISTRY.get_or_init(|| TAGS.iter().copied().collect())
}

/// Looks up an already normalized (trimmed, lower-cased) tag
pub fn lookup(tag: &str) -> Strategy {
    registry().get(tag).copied().unwrap_or(Strategy::Generic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("js"), Strategy::Native);
        assert_eq!(lookup("py"), Strategy::Heuristic(Language::Python));
        assert_eq!(lookup("c"), Strategy::Heuristic(Language::Cpp));
        assert_eq!(lookup("ruby"), Strategy::Generic);
        assert_eq!(lookup("Java"), Strategy::Generic);
    }
}
