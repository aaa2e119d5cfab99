use regex::{Captures, Regex};

use super::scan::{Conversion, EntryPoint, Grammar, InputRule, PrintRule, Slot};
use super::terms::Style;

/// `cout` prints booleans as 1/0 unless told otherwise
const STYLE: Style = Style {
    true_text: "1",
    false_text: "0",
    null_text: "0",
    separator: Some(("<<", "")),
    line_breaks: &["endl", "std::endl", "'\\n'", "\"\\n\""],
    wrappers: &["to_string", "std::to_string"],
    fstrings: false,
    float_point: false,
};

const MISSING_MAIN: &str = "Warning: no 'int main()' entry point found";

pub(super) fn grammar() -> Result<Grammar, regex::Error> {
    Ok(Grammar {
        comment: "//",
        semicolons: true,
        skip: Regex::new(r"^(?:#|using\s+namespace\s)")?,
        prints: vec![
            PrintRule {
                pattern: Regex::new(r"^(?:std::)?(?:cout|cerr)\s*<<\s*(?P<args>.*)$")?,
                format: false,
            },
            PrintRule {
                pattern: Regex::new(r"^(?:std::)?printf\s*\((?P<args>.*)\)$")?,
                format: true,
            },
            PrintRule {
                pattern: Regex::new(r"^puts\s*\((?P<args>.*)\)$")?,
                format: false,
            },
        ],
        assignment: Regex::new(
            r"^(?:(?:const|static|unsigned|signed|long|short)\s+)*(?:(?P<type>std::string|string|int|long|short|double|float|bool|char|auto|size_t)(?:\s*\*\s*|\s+))?(?P<name>[A-Za-z_]\w*)(?:\[\d*\])?\s*=\s*(?P<value>[^=].*)$",
        )?,
        inputs: vec![
            InputRule {
                pattern: Regex::new(r"^(?:std::)?cin\s*>>\s*(?P<targets>.+)$")?,
                slots: cin_slots,
            },
            InputRule {
                pattern: Regex::new(
                    r"^(?:std::)?getline\s*\(\s*(?:std::)?cin\s*,\s*(?P<name>[A-Za-z_]\w*)\s*\)$",
                )?,
                slots: |caps| {
                    vec![Slot {
                        name: Some(caps["name"].to_string()),
                        prompt: None,
                        conversion: Conversion::Line,
                    }]
                },
            },
            InputRule {
                pattern: Regex::new(
                    r#"^scanf\s*\(\s*"(?P<format>[^"]*)"\s*(?P<targets>(?:,\s*&?\s*[A-Za-z_]\w*\s*)*)\)$"#,
                )?,
                slots: scanf_slots,
            },
        ],
        style: STYLE,
        entry_point: Some(EntryPoint {
            pattern: Regex::new(r"\bint\s+main\s*\(")?,
            warning: MISSING_MAIN,
        }),
        program_name: None,
        no_output: |_| "Program compiled and ran successfully with no output".to_string(),
    })
}

/// `cin >> a >> b` reads one line per target
fn cin_slots(caps: &Captures<'_>) -> Vec<Slot> {
    caps["targets"]
        .split(">>")
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(|target| Slot {
            name: Some(target.to_string()),
            prompt: None,
            conversion: Conversion::Value,
        })
        .collect()
}

/// Pairs each `%` conversion in the format with its `&target`
fn scanf_slots(caps: &Captures<'_>) -> Vec<Slot> {
    let mut conversions = Vec::new();
    let mut chars = caps["format"].chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        let spec = chars.by_ref().find(|c| !matches!(c, 'l' | 'h' | '0'..='9'));
        match spec {
            Some('d' | 'i' | 'u') => conversions.push(Conversion::Int),
            Some('f' | 'e' | 'g') => conversions.push(Conversion::Float),
            Some('c' | 's') => conversions.push(Conversion::Token),
            _ => {}
        }
    }

    caps["targets"]
        .split(',')
        .map(|target| target.trim().trim_start_matches('&').trim())
        .filter(|target| !target.is_empty())
        .zip(conversions)
        .map(|(target, conversion)| Slot {
            name: Some(target.to_string()),
            prompt: None,
            conversion,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::Budget;
    use crate::heuristic::scan::scan;
    use pretty_assertions::assert_eq;

    fn run(source: &str, stdin: &str) -> (String, String) {
        let grammar = grammar().unwrap();
        let result = scan(&grammar, source, stdin, Budget::default());
        (result.output.unwrap_or_default(), result.error.unwrap_or_default())
    }

    #[test]
    fn test_streams_and_printf() {
        let source = r#"
#include <iostream>
using namespace std;

int main() {
    string name = "C++"; int year = 1985;
    cout << "Hello from " << name << "!" << endl;
    cout << year + 1 << endl;
    printf("%d%%\n", 99);
    puts("done");
    bool ok = true;
    cout << ok << endl; // prints 1
    return 0;
}
"#;
        assert_eq!(
            run(source, ""),
            ("Hello from C++!\n1986\n99%\ndone\n1\n".to_string(), String::new())
        );
    }

    #[test]
    fn test_cin_and_scanf() {
        let source = r#"
int main() {
    int a, b;
    cin >> a >> b;
    cout << a + b << endl;
    char name[20];
    scanf("%s", name);
    printf("hi %s\n", name);
}
"#;
        assert_eq!(
            run(source, "2\n3\nZed\n"),
            ("2\n3\n5\nZed\nhi Zed\n".to_string(), String::new())
        );
    }

    #[test]
    fn test_missing_main_warns() {
        let (output, error) = run("std::cout << \"x\";\n", "");
        assert_eq!(output, "x\n");
        assert_eq!(error, MISSING_MAIN);
    }

    #[test]
    fn test_no_output_diagnostic() {
        assert_eq!(
            run("int main() { int x = 1; }", ""),
            (
                "Program compiled and ran successfully with no output".to_string(),
                String::new()
            )
        );
    }
}
