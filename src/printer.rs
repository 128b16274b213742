// Iskra Printer - External Representation

use std::fmt::Write;

use crate::classes;
use crate::eval::{Function, Interpreter};
use crate::types::{Value, ValueId};

/// External representation of a value
pub fn print_to_string(interp: &Interpreter, v: ValueId) -> String {
    let mut out = String::new();
    write_value(interp, v, &mut out);
    out
}

fn write_value(interp: &Interpreter, v: ValueId, out: &mut String) {
    match interp.arena.get_unchecked(v) {
        Value::Null => out.push_str("NIL"),
        Value::Integer(n) => {
            let _ = write!(out, "{}", n);
        }
        Value::Float(f) => {
            let _ = write!(out, "{:?}", f);
        }
        Value::Character(c) => out.push_str(&character_repr(*c)),
        Value::Symbol(s) => out.push_str(interp.symbols.name(*s)),
        Value::String(s) => {
            out.push('"');
            for ch in s.chars() {
                match ch {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    _ => out.push(ch),
                }
            }
            out.push('"');
        }
        Value::Cons(car, cdr) => write_list(interp, *car, *cdr, out),
        Value::Vector(items) => {
            out.push_str("#(");
            for (i, &item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_value(interp, item, out);
            }
            out.push(')');
        }
        Value::Function(id) => {
            let name = match &interp.functions[id.0 as usize] {
                Function::Native { name, .. } | Function::Lambda { name, .. } => *name,
            };
            let _ = write!(out, "#<FUNCTION {}>", interp.symbols.name(name));
        }
        Value::Instance(inst) => {
            let _ = write!(out, "#<INSTANCE {}>", classes::class_name(inst.class));
        }
    }
}

fn write_list(interp: &Interpreter, first: ValueId, rest: ValueId, out: &mut String) {
    out.push('(');
    let mut car = first;
    let mut cdr = rest;
    loop {
        write_value(interp, car, out);
        match interp.arena.get_unchecked(cdr) {
            Value::Null => break,
            Value::Cons(a, d) => {
                out.push(' ');
                car = *a;
                cdr = *d;
            }
            _ => {
                out.push_str(" . ");
                write_value(interp, cdr, out);
                break;
            }
        }
    }
    out.push(')');
}

fn character_repr(c: char) -> String {
    match c {
        ' ' => "#\\SPACE".to_string(),
        '\n' => "#\\NEWLINE".to_string(),
        '\t' => "#\\TAB".to_string(),
        _ => format!("#\\{}", c),
    }
}

/// Description of a condition instance for the driver: class name plus
/// slots sorted by name.
pub fn describe_condition(interp: &Interpreter, c: ValueId) -> String {
    match interp.arena.get_unchecked(c) {
        Value::Instance(inst) => {
            let mut slots: Vec<(String, ValueId)> = inst
                .slots
                .iter()
                .map(|(&k, &v)| (interp.symbols.name(k).to_string(), v))
                .collect();
            slots.sort_by(|a, b| a.0.cmp(&b.0));

            let mut out = String::from(classes::class_name(inst.class));
            for (name, value) in slots {
                let _ = write!(out, " {}: {}", name, print_to_string(interp, value));
            }
            out
        }
        _ => print_to_string(interp, c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader;

    fn printed(src: &str) -> String {
        let mut interp = Interpreter::new();
        let v = reader::read_str(&mut interp, src).expect("read");
        print_to_string(&interp, v)
    }

    #[test]
    fn test_print_atoms() {
        assert_eq!(printed("42"), "42");
        assert_eq!(printed("3.14"), "3.14");
        assert_eq!(printed("foo"), "FOO");
        assert_eq!(printed("nil"), "NIL");
        assert_eq!(printed("\"hi\""), "\"hi\"");
        assert_eq!(printed("#\\a"), "#\\a");
        assert_eq!(printed("#\\Space"), "#\\SPACE");
    }

    #[test]
    fn test_print_lists() {
        assert_eq!(printed("(1 2 3)"), "(1 2 3)");
        assert_eq!(printed("(1 . 2)"), "(1 . 2)");
        assert_eq!(printed("(a (b c))"), "(A (B C))");
        assert_eq!(printed("#(1 2)"), "#(1 2)");
    }
}
