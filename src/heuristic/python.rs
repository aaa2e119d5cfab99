use regex::{Captures, Regex};

use super::scan::{Conversion, Grammar, InputRule, PrintRule, Slot};
use super::terms::Style;

const STYLE: Style = Style {
    true_text: "True",
    false_text: "False",
    null_text: "None",
    separator: Some((",", " ")),
    line_breaks: &[],
    wrappers: &["str"],
    fstrings: true,
    float_point: true,
};

pub(super) fn grammar() -> Result<Grammar, regex::Error> {
    Ok(Grammar {
        comment: "#",
        semicolons: false,
        skip: Regex::new(r"^(?:import|from)\s")?,
        prints: vec![PrintRule {
            pattern: Regex::new(r"^print\s*\((?P<args>.*)\)$")?,
            format: false,
        }],
        assignment: Regex::new(
            r"^(?P<name>[A-Za-z_]\w*)\s*(?::\s*(?P<type>[\w\[\], ]+?)\s*)?=\s*(?P<value>[^=].*)$",
        )?,
        inputs: vec![
            InputRule {
                pattern: Regex::new(
                    r"^(?:(?P<name>[A-Za-z_]\w*)\s*=\s*)?(?P<conv>int|float|str)\s*\(\s*input\s*\((?P<prompt>.*)\)\s*\)$",
                )?,
                slots: input_slot,
            },
            InputRule {
                pattern: Regex::new(
                    r"^(?:(?P<name>[A-Za-z_]\w*)\s*=\s*)?input\s*\((?P<prompt>.*)\)$",
                )?,
                slots: input_slot,
            },
        ],
        style: STYLE,
        entry_point: None,
        program_name: None,
        no_output: |_| "Script ran successfully with no output".to_string(),
    })
}

fn input_slot(caps: &Captures<'_>) -> Vec<Slot> {
    let conversion = match caps.name("conv").map(|m| m.as_str()) {
        Some("int") => Conversion::Int,
        Some("float") => Conversion::Float,
        _ => Conversion::Line,
    };
    vec![Slot {
        name: caps.name("name").map(|m| m.as_str().to_string()),
        prompt: caps
            .name("prompt")
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| !p.is_empty()),
        conversion,
    }]
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
    fn test_prints_and_assignments() {
        let source = r#"
# greeting
import sys
name = "World"
count = 3
print("Hello,", name)
print(f"{name} has {count} items")
print("sum:", count * 2)
print('done')  # trailing comment
"#;
        assert_eq!(
            run(source, ""),
            ("Hello, World\nWorld has 3 items\ndone\n".to_string(), String::new())
        );
    }

    #[test]
    fn test_equality_is_not_an_assignment() {
        let source = "x = 1\nx == 2\nprint(x)\n";
        assert_eq!(run(source, "").0, "1\n");
    }

    #[test]
    fn test_unknown_assignment_forgets_variable() {
        let source = "x = 1\nx = compute()\nprint(x)\nprint('after')\n";
        assert_eq!(run(source, "").0, "after\n");
    }

    #[test]
    fn test_input_echoes_prompt_and_line() {
        let source = r#"
name = input("Name: ")
age = int(input())
print(f"{name} is {age}")
rest = input("More? ")
"#;
        assert_eq!(
            run(source, "Ann\n41\n").0,
            "Name: Ann\n41\nAnn is 41\nMore? \n"
        );
    }

    #[test]
    fn test_no_output_diagnostic() {
        assert_eq!(run("x = 1\n", "").0, "Script ran successfully with no output");
    }
}
