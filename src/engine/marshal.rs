//! Conversion of engine terms into plain JSON values.
//!
//! | Prolog term                  | JSON                                   |
//! |------------------------------|----------------------------------------|
//! | atom, string                 | string (`[]` becomes `[]`)             |
//! | integer                      | number, or decimal string beyond i64   |
//! | float                        | number                                 |
//! | rational `N/D`               | string `"N/D"`                         |
//! | list                         | array                                  |
//! | `{k: V, ...}`                | object                                 |
//! | other compound `f(A, ...)`   | `{"functor": "f", "args": [...]}`      |
//! | unbound variable             | null                                   |

use scryer_prolog::Term;
use serde_json::{json, Map, Number, Value};

use crate::lexical;

pub fn term_to_json(term: &Term) -> Value {
    match term {
        Term::Integer(i) => {
            let digits = i.to_string();
            match digits.parse::<i64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => Value::String(digits),
            }
        }
        Term::Float(f) => Number::from_f64(f64::from(*f))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Term::Rational(r) => Value::String(r.to_string()),
        Term::Atom(a) if a == "[]" => Value::Array(Vec::new()),
        Term::Atom(a) => Value::String(a.clone()),
        Term::String(s) => Value::String(s.clone()),
        Term::List(items) => Value::Array(items.iter().map(term_to_json).collect()),
        Term::Compound(name, args) => {
            if let Some(object) = curly_dict(name, args) {
                return Value::Object(object);
            }
            json!({
                "functor": name,
                "args": args.iter().map(term_to_json).collect::<Vec<_>>(),
            })
        }
        Term::Var(_) => Value::Null,
        _ => Value::Null,
    }
}

/// `{k1: V1, k2: V2}` parses as `{}(','(k1:V1, k2:V2))`.
fn curly_dict(name: &str, args: &[Term]) -> Option<Map<String, Value>> {
    if name != "{}" || args.len() != 1 {
        return None;
    }
    let mut pairs = Vec::new();
    collect_conjunction(&args[0], &mut pairs);

    let mut object = Map::new();
    for pair in pairs {
        match pair {
            Term::Compound(op, kv) if op == ":" && kv.len() == 2 => {
                let key = match &kv[0] {
                    Term::Atom(k) | Term::String(k) => k.clone(),
                    Term::Integer(i) => i.to_string(),
                    _ => return None,
                };
                object.insert(key, term_to_json(&kv[1]));
            }
            _ => return None,
        }
    }
    Some(object)
}

fn collect_conjunction<'a>(term: &'a Term, out: &mut Vec<&'a Term>) {
    match term {
        Term::Compound(op, args) if op == "," && args.len() == 2 => {
            collect_conjunction(&args[0], out);
            collect_conjunction(&args[1], out);
        }
        other => out.push(other),
    }
}

const INFIX_OPERATORS: &[&str] = &[
    ",", ":", "/", "-", "+", "*", "=", "==", "\\=", "is", "<", ">", "=<", ">=", "->", ";",
];

/// Render a term as Prolog source text, for diagnostics.
pub fn term_text(term: &Term) -> String {
    match term {
        Term::Integer(i) => i.to_string(),
        Term::Float(f) => {
            let value = f64::from(*f);
            if value.fract() == 0.0 && value.is_finite() {
                format!("{value:.1}")
            } else {
                value.to_string()
            }
        }
        Term::Rational(r) => r.to_string(),
        Term::Atom(a) if a == "[]" || a == "{}" || a == "!" || a == ";" => a.clone(),
        Term::Atom(a) => lexical::format_atom(a),
        Term::String(s) => format!("{:?}", s),
        Term::List(items) => format!(
            "[{}]",
            items.iter().map(term_text).collect::<Vec<_>>().join(",")
        ),
        Term::Compound(name, args) if args.len() == 2 && INFIX_OPERATORS.contains(&name.as_str()) => {
            let sep = if name.chars().all(char::is_alphabetic) {
                format!(" {name} ")
            } else {
                name.clone()
            };
            format!("{}{}{}", term_text(&args[0]), sep, term_text(&args[1]))
        }
        Term::Compound(name, args) => format!(
            "{}({})",
            lexical::format_atom(name),
            args.iter().map(term_text).collect::<Vec<_>>().join(",")
        ),
        Term::Var(v) => v.clone(),
        _ => "_".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(a: &str) -> Term {
        Term::Atom(a.to_string())
    }

    fn compound(name: &str, args: Vec<Term>) -> Term {
        Term::Compound(name.to_string(), args)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(term_to_json(&atom("john")), json!("john"));
        assert_eq!(term_to_json(&atom("[]")), json!([]));
        assert_eq!(term_to_json(&Term::String("Rome".to_string())), json!("Rome"));
        assert_eq!(term_to_json(&Term::Var("_A".to_string())), Value::Null);
    }

    #[test]
    fn test_nested_lists() {
        let list = Term::List(vec![atom("a"), Term::List(vec![atom("b"), atom("c")])]);
        assert_eq!(term_to_json(&list), json!(["a", ["b", "c"]]));
    }

    #[test]
    fn test_curly_dict_becomes_object() {
        let dict = compound(
            "{}",
            vec![compound(
                ",",
                vec![
                    compound(":", vec![atom("from"), atom("rome")]),
                    compound(":", vec![atom("to"), Term::List(vec![atom("paris")])]),
                ],
            )],
        );
        assert_eq!(term_to_json(&dict), json!({"from": "rome", "to": ["paris"]}));
    }

    #[test]
    fn test_generic_compound_shape() {
        let term = compound("leg", vec![atom("rome"), atom("paris")]);
        assert_eq!(
            term_to_json(&term),
            json!({"functor": "leg", "args": ["rome", "paris"]})
        );
    }

    #[test]
    fn test_exception_text() {
        let error = compound(
            "error",
            vec![
                compound(
                    "existence_error",
                    vec![
                        atom("procedure"),
                        compound("/", vec![atom("undefined_pred"), Term::Var("N".to_string())]),
                    ],
                ),
                compound("/", vec![atom("undefined_pred"), Term::Var("N".to_string())]),
            ],
        );
        assert_eq!(
            term_text(&error),
            "error(existence_error(procedure,undefined_pred/N),undefined_pred/N)"
        );
        assert_eq!(term_text(&atom("Paris")), "'Paris'");
    }
}
