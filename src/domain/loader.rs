//! Function loader: submitted source text → callable prediction function.
//!
//! Loading runs in four stages, each with its own failure class:
//! 1. name extraction from the raw text (`LoaderError`)
//! 2. parsing (`CompilationError`)
//! 3. static checks of names, arity and return paths (`CompilationError`)
//! 4. binding the extracted name to the parsed definition (`LoaderError`)
//!
//! Every load yields an independent [`StrategyFn`]; nothing is shared between
//! loads, so concurrent requests cannot observe each other's symbols.

use crate::domain::error::SiglabError;
use crate::domain::market::MarketRow;
use crate::domain::script::ast::FunctionDef;
use crate::domain::script::{check, eval, parser, RuntimeError, Value};

const DEF_KEYWORD: &str = "def";

/// A loaded, validated prediction function.
#[derive(Debug, Clone)]
pub struct StrategyFn {
    def: FunctionDef,
}

impl StrategyFn {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Default of the config parameter, if the function declares one.
    pub fn default_config(&self) -> Option<f64> {
        self.def.params.get(1).and_then(|p| p.default)
    }

    /// Invoke on one instrument's history, returning the raw
    /// (5-period, 10-period) scores.
    pub fn invoke(
        &self,
        rows: &[MarketRow],
        config: Option<f64>,
    ) -> Result<(Value, Value), RuntimeError> {
        eval::call(&self.def, rows, config)
    }
}

/// Find the word-delimited `def` keywords in `source`.
fn def_headers(source: &str) -> Vec<usize> {
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    source
        .match_indices(DEF_KEYWORD)
        .map(|(i, _)| i)
        .filter(|&i| {
            let before_ok = source[..i].chars().next_back().is_none_or(|c| !is_ident(c));
            let after_ok = source[i + DEF_KEYWORD.len()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace);
            before_ok && after_ok
        })
        .collect()
}

/// `source` with comments removed and string literal contents blanked, so a
/// keyword scan sees only code. Strings end at their closing quote or at the
/// end of the line, as in the parser.
fn code_only(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    for ch in source.chars() {
        if ch == '\n' {
            quote = None;
            in_comment = false;
            out.push(ch);
        } else if in_comment {
            continue;
        } else if let Some(q) = quote {
            if ch == q {
                quote = None;
                out.push(ch);
            } else {
                out.push(' ');
            }
        } else if ch == '#' {
            in_comment = true;
        } else {
            if ch == '"' || ch == '\'' {
                quote = Some(ch);
            }
            out.push(ch);
        }
    }
    out
}

/// Best-effort extraction of the declared function name: the text between the
/// first `def` keyword in the raw source and the next `(`. More than one
/// definition outside comments and string literals is ambiguous.
pub fn extract_function_name(source: &str) -> Result<String, SiglabError> {
    let Some(&start) = def_headers(source).first() else {
        return Err(SiglabError::loader("no function definition ('def') found in source"));
    };
    let definitions = def_headers(&code_only(source)).len();
    if definitions > 1 {
        return Err(SiglabError::loader(format!(
            "expected exactly one function definition, found {}",
            definitions
        )));
    }

    let after = &source[start + DEF_KEYWORD.len()..];
    let Some(paren) = after.find('(') else {
        return Err(SiglabError::loader(
            "function definition has no parameter list",
        ));
    };

    let name = after[..paren].trim();
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !valid {
        return Err(SiglabError::loader(format!(
            "could not determine function name from '{}'",
            name
        )));
    }
    Ok(name.to_string())
}

/// Load `source` into a fresh [`StrategyFn`].
pub fn load_strategy(source: &str) -> Result<StrategyFn, SiglabError> {
    let name = extract_function_name(source)?;
    let def = parser::parse(source)?;
    check::check(&def)?;

    if def.name != name {
        return Err(SiglabError::loader(format!(
            "function '{}' is not defined (source defines '{}')",
            name, def.name
        )));
    }

    tracing::debug!(function = %def.name, params = def.params.len(), "strategy loaded");
    Ok(StrategyFn { def })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE_LIKE: &str = "\
def exponential_moving_average_prediction(df, span = 15) {
    # latest row
    let current = df[-1];
    let score_5 = 0;
    let score_10 = 0;
    if current.close > ema(df.close, span) {
        score_5 = 0.6;
        score_10 = 0.3;
    }
    return score_5, score_10;
}
";

    #[test]
    fn load_returns_declared_name() {
        let f = load_strategy(TEMPLATE_LIKE).unwrap();
        assert_eq!(f.name(), "exponential_moving_average_prediction");
        assert_eq!(f.default_config(), Some(15.0));
    }

    #[test]
    fn extract_name_tolerates_spacing() {
        assert_eq!(extract_function_name("def   spaced  (df) {}").unwrap(), "spaced");
        assert_eq!(extract_function_name("\n\ndef f(df)").unwrap(), "f");
    }

    #[test]
    fn extract_name_ignores_def_inside_identifiers() {
        let src = "def f(df) { let undefined_x = 1; let default = 2; return 0, 0; }";
        assert_eq!(extract_function_name(src).unwrap(), "f");
    }

    #[test]
    fn missing_def_is_loader_error() {
        let err = load_strategy("return 1, 2;").unwrap_err();
        assert!(matches!(err, SiglabError::Loader { .. }));
        assert!(err.to_string().contains("no function definition"));
    }

    #[test]
    fn two_definitions_are_ambiguous() {
        let src = "def a(df) { return 0, 0; }\ndef b(df) { return 0, 0; }";
        let err = load_strategy(src).unwrap_err();
        assert!(matches!(err, SiglabError::Loader { .. }));
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn missing_parameter_list_is_loader_error() {
        let err = extract_function_name("def broken").unwrap_err();
        assert!(matches!(err, SiglabError::Loader { .. }));
    }

    #[test]
    fn malformed_name_is_loader_error() {
        let err = extract_function_name("def 9lives(df) {}").unwrap_err();
        assert!(err.to_string().contains("could not determine function name"));
    }

    #[test]
    fn syntax_error_is_compilation_error_with_cause() {
        let err = load_strategy("def f(df) { return 1 +, 0; }").unwrap_err();
        match err {
            SiglabError::Compilation(pe) => {
                assert!(pe.message.contains("expected expression"));
                assert_eq!(pe.position, 22);
            }
            other => panic!("expected compilation error, got {:?}", other),
        }
    }

    #[test]
    fn check_failure_is_compilation_error() {
        let err = load_strategy("def f(df) { return nope, 0; }").unwrap_err();
        assert!(matches!(err, SiglabError::Compilation(_)));
        assert!(err.to_string().contains("undefined name 'nope'"));
    }

    #[test]
    fn name_bound_to_other_symbol_is_loader_error() {
        // the first textual `def` header sits in a comment
        let src = "# def helper(df) was removed\nfunc(df) { return 0, 0; }";
        assert_eq!(extract_function_name(src).unwrap(), "helper");

        let src = "# see def helper(x)\ndef main(df) { return 0, 0; }";
        let err = load_strategy(src).unwrap_err();
        assert!(matches!(err, SiglabError::Loader { .. }), "{:?}", err);
        assert!(err.to_string().contains("'helper' is not defined"));
    }

    #[test]
    fn hash_inside_column_key_does_not_hide_code() {
        let src = r##"def f(df) { return df[-1]["#x"], 0; } def g(df) { return 0, 0; }"##;
        let err = load_strategy(src).unwrap_err();
        assert!(matches!(err, SiglabError::Loader { .. }), "{:?}", err);
        assert!(err.to_string().contains("found 2"));
    }

    #[test]
    fn def_inside_column_key_is_not_a_definition() {
        let src = "def f(df) {\n    return df[-1]['def x'], df[-1][\"#def y\"];\n}\n";
        assert_eq!(extract_function_name(src).unwrap(), "f");
        assert_eq!(def_headers(&code_only(src)).len(), 1);
    }

    #[test]
    fn code_only_blanks_strings_and_comments() {
        assert_eq!(code_only("a # def b\nc"), "a \nc");
        assert_eq!(code_only(r#"x["a#b"] # c"#), r#"x["   "] "#);
    }

    #[test]
    fn deeply_nested_source_is_compilation_error() {
        let src = format!(
            "def f(df) {{ return {}1{}, 0; }}",
            "(".repeat(10_000),
            ")".repeat(10_000)
        );
        let err = load_strategy(&src).unwrap_err();
        match err {
            SiglabError::Compilation(pe) => assert!(pe.message.contains("nested too deeply")),
            other => panic!("expected compilation error, got {:?}", other),
        }
    }

    #[test]
    fn loads_are_independent() {
        let a = load_strategy("def a(df) { let x = 1; return x, x; }").unwrap();
        let b = load_strategy("def b(df) { return 2, 2; }").unwrap();
        let rows = vec![MarketRow::new("BTC", 1).with_value("close", 1.0)];
        assert_eq!(a.invoke(&rows, None).unwrap().0, Value::Number(1.0));
        assert_eq!(b.invoke(&rows, None).unwrap().0, Value::Number(2.0));
        assert!(
            load_strategy("def c(df) { return x, 0; }").is_err(),
            "a binding from another load must not be visible"
        );
    }
}
