use regex::{Captures, Regex};

use super::scan::{Conversion, EntryPoint, Grammar, InputRule, PrintRule, Slot};
use super::terms::Style;

const STYLE: Style = Style {
    true_text: "true",
    false_text: "false",
    null_text: "null",
    separator: None,
    line_breaks: &[],
    wrappers: &["String.valueOf", "Integer.toString", "Double.toString"],
    fstrings: false,
    float_point: true,
};

const MISSING_MAIN: &str = "Warning: no 'public static void main(String[] args)' method found";

pub(super) fn grammar() -> Result<Grammar, regex::Error> {
    Ok(Grammar {
        comment: "//",
        semicolons: true,
        skip: Regex::new(r"^(?:import|package)\s")?,
        prints: vec![
            PrintRule {
                pattern: Regex::new(r"^System\.(?:out|err)\.print(?:ln)?\s*\((?P<args>.*)\)$")?,
                format: false,
            },
            PrintRule {
                pattern: Regex::new(
                    r"^System\.(?:out|err)\.(?:printf|format)\s*\((?P<args>.*)\)$",
                )?,
                format: true,
            },
        ],
        assignment: Regex::new(
            r"^(?:(?:final|static|private|public|protected)\s+)*(?:(?P<type>String|int|long|short|byte|double|float|boolean|char|var)\s+)?(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<value>[^=].*)$",
        )?,
        inputs: vec![InputRule {
            pattern: Regex::new(
                r"^(?:(?:final\s+)?(?:String|int|long|short|double|float|boolean|char|var)\s+)?(?:(?P<name>[A-Za-z_]\w*)\s*=\s*)?\w+\.(?P<method>nextLine|next|nextInt|nextLong|nextShort|nextDouble|nextFloat|nextBoolean)\s*\(\s*\)$",
            )?,
            slots: scanner_slot,
        }],
        style: STYLE,
        entry_point: Some(EntryPoint {
            pattern: Regex::new(r"public\s+static\s+void\s+main\s*\(")?,
            warning: MISSING_MAIN,
        }),
        program_name: Some(Regex::new(r"\bclass\s+([A-Za-z_]\w*)")?),
        no_output: |class| {
            format!(
                "{}.java compiled and ran successfully with no output",
                class.unwrap_or("Main")
            )
        },
    })
}

fn scanner_slot(caps: &Captures<'_>) -> Vec<Slot> {
    let conversion = match &caps["method"] {
        "nextLine" => Conversion::Line,
        "nextInt" | "nextLong" | "nextShort" => Conversion::Int,
        "nextDouble" | "nextFloat" => Conversion::Float,
        _ => Conversion::Token,
    };
    vec![Slot {
        name: caps.name("name").map(|m| m.as_str().to_string()),
        prompt: None,
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
    fn test_hello_world() {
        let source = r#"
public class Main {
    public static void main(String[] args) {
        String name = "Java"; int year = 1995;
        double ratio = 2;
        System.out.println("Hello, " + name + "!");
        System.out.println(year);
        System.out.print(ratio);
        System.out.printf("%s turns %d%n", name, 30);
        System.out.println(); // blank line
    }
}
"#;
        assert_eq!(
            run(source, ""),
            (
                "Hello, Java!\n1995\n2.0\nJava turns 30\n\n".to_string(),
                String::new()
            )
        );
    }

    #[test]
    fn test_one_line_main() {
        let source = r#"class App { public static void main(String[] a) { System.out.println("hi"); } }"#;
        assert_eq!(run(source, "").0, "hi\n");
    }

    #[test]
    fn test_scanner_input() {
        let source = r#"
Scanner sc = new Scanner(System.in);
String who = sc.nextLine();
int n = sc.nextInt();
System.out.println(who + " x" + n);
"#;
        let (output, error) = run(source, "Bob\n7\n");
        assert_eq!(output, "Bob\n7\nBob x7\n");
        assert_eq!(error, MISSING_MAIN);
    }

    #[test]
    fn test_no_output_names_class() {
        let source = "public class Greeter {\n  public static void main(String[] args) {\n    int x = 1;\n  }\n}\n";
        assert_eq!(
            run(source, ""),
            (
                "Greeter.java compiled and ran successfully with no output".to_string(),
                String::new()
            )
        );
    }
}
