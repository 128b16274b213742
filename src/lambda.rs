// Iskra Lambda Lists - Parameter Specifications
//
// A lambda-list is a possibly empty sequence of distinct symbols,
// optionally terminated by a rest marker (:REST or &REST) followed by
// exactly one symbol and nothing else. Validation happens once at
// construction; binding happens at every invocation.

use crate::arena::Arena;
use crate::conditions::{self, Signal};
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::{Value, ValueId};

/// A validated parameter specification
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaList {
    pub required: Vec<SymbolId>,
    pub rest: Option<SymbolId>,
}

fn is_rest_marker(symbols: &SymbolTable, sym: SymbolId) -> bool {
    let name = symbols.name(sym);
    name == ":REST" || name == "&REST"
}

impl LambdaList {
    /// Validate `form` as a lambda-list; any deviation is a program-error.
    pub fn parse(
        arena: &mut Arena,
        symbols: &mut SymbolTable,
        form: ValueId,
    ) -> Result<LambdaList, Signal> {
        let mut required = Vec::new();
        let mut rest = None;
        let mut cur = form;
        loop {
            let (car, cdr) = match arena.get_unchecked(cur) {
                Value::Null => break,
                Value::Cons(car, cdr) => (*car, *cdr),
                _ => return Err(conditions::malformed_form(arena, symbols)),
            };
            let sym = match arena.get_unchecked(car) {
                Value::Symbol(s) => *s,
                _ => return Err(conditions::malformed_form(arena, symbols)),
            };
            if is_rest_marker(symbols, sym) {
                // exactly one symbol after the marker, then the end
                let (rest_car, rest_cdr) = match arena.get_unchecked(cdr) {
                    Value::Cons(car, cdr) => (*car, *cdr),
                    _ => return Err(conditions::malformed_form(arena, symbols)),
                };
                let rest_sym = match arena.get_unchecked(rest_car) {
                    Value::Symbol(s) => *s,
                    _ => return Err(conditions::malformed_form(arena, symbols)),
                };
                if !matches!(arena.get_unchecked(rest_cdr), Value::Null) {
                    return Err(conditions::malformed_form(arena, symbols));
                }
                if is_rest_marker(symbols, rest_sym) || required.contains(&rest_sym) {
                    return Err(conditions::malformed_form(arena, symbols));
                }
                rest = Some(rest_sym);
                break;
            }
            if required.contains(&sym) {
                return Err(conditions::malformed_form(arena, symbols));
            }
            required.push(sym);
            cur = cdr;
        }
        Ok(LambdaList { required, rest })
    }

    /// Bind `args` (a proper list of values) to the parameters.
    ///
    /// The rest parameter, if any, is bound to the remaining tail and may
    /// share structure with the argument list. A fixed parameter without
    /// an argument, or a leftover argument without a rest parameter, is an
    /// arity program-error.
    pub fn bind(
        &self,
        arena: &mut Arena,
        symbols: &mut SymbolTable,
        args: ValueId,
    ) -> Result<Vec<(SymbolId, ValueId)>, Signal> {
        let mut bindings = Vec::with_capacity(self.required.len() + 1);
        let mut cur = args;
        for &param in &self.required {
            let (car, cdr) = match arena.get_unchecked(cur) {
                Value::Cons(car, cdr) => (*car, *cdr),
                _ => return Err(conditions::arity_error(arena, symbols)),
            };
            bindings.push((param, car));
            cur = cdr;
        }
        match self.rest {
            Some(rest) => bindings.push((rest, cur)),
            None => {
                if !matches!(arena.get_unchecked(cur), Value::Null) {
                    return Err(conditions::arity_error(arena, symbols));
                }
            }
        }
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        arena: Arena,
        symbols: SymbolTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                arena: Arena::new(),
                symbols: SymbolTable::new(),
            }
        }

        fn sym(&mut self, name: &str) -> ValueId {
            let id = self.symbols.intern(name);
            self.arena.alloc(Value::Symbol(id))
        }

        fn list(&mut self, items: &[ValueId]) -> ValueId {
            let mut out = self.arena.alloc(Value::Null);
            for &item in items.iter().rev() {
                out = self.arena.alloc(Value::Cons(item, out));
            }
            out
        }
    }

    #[test]
    fn test_parse_fixed_params() {
        let mut fx = Fixture::new();
        let x = fx.sym("X");
        let y = fx.sym("Y");
        let form = fx.list(&[x, y]);

        let ll = LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).unwrap();
        assert_eq!(ll.required.len(), 2);
        assert_eq!(ll.rest, None);
    }

    #[test]
    fn test_parse_rest_markers() {
        for marker in [":REST", "&REST"] {
            let mut fx = Fixture::new();
            let x = fx.sym("X");
            let m = fx.sym(marker);
            let xs = fx.sym("XS");
            let form = fx.list(&[x, m, xs]);

            let ll = LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).unwrap();
            assert_eq!(ll.required.len(), 1);
            let xs_id = fx.symbols.intern("XS");
            assert_eq!(ll.rest, Some(xs_id));
        }
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        // (:rest) — marker without a name
        let mut fx = Fixture::new();
        let m = fx.sym(":REST");
        let form = fx.list(&[m]);
        assert!(LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).is_err());

        // (:rest a b) — trailing parameter after the rest name
        let mut fx = Fixture::new();
        let m = fx.sym(":REST");
        let a = fx.sym("A");
        let b = fx.sym("B");
        let form = fx.list(&[m, a, b]);
        assert!(LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).is_err());

        // (x x) — duplicate parameter
        let mut fx = Fixture::new();
        let x1 = fx.sym("X");
        let x2 = fx.sym("X");
        let form = fx.list(&[x1, x2]);
        assert!(LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).is_err());

        // (x 1) — non-symbol parameter
        let mut fx = Fixture::new();
        let x = fx.sym("X");
        let one = fx.arena.alloc(Value::Integer(1));
        let form = fx.list(&[x, one]);
        assert!(LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).is_err());
    }

    #[test]
    fn test_bind_fixed_and_rest() {
        let mut fx = Fixture::new();
        let x = fx.sym("X");
        let m = fx.sym("&REST");
        let xs = fx.sym("XS");
        let form = fx.list(&[x, m, xs]);
        let ll = LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).unwrap();

        let one = fx.arena.alloc(Value::Integer(1));
        let two = fx.arena.alloc(Value::Integer(2));
        let args = fx.list(&[one, two]);
        let bindings = ll.bind(&mut fx.arena, &mut fx.symbols, args).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].1, one);
        // the rest binding is the remaining tail
        match fx.arena.get_unchecked(bindings[1].1) {
            Value::Cons(car, _) => assert_eq!(*car, two),
            other => panic!("rest not a list: {:?}", other),
        }
    }

    #[test]
    fn test_bind_rest_may_be_empty() {
        let mut fx = Fixture::new();
        let m = fx.sym(":REST");
        let xs = fx.sym("XS");
        let form = fx.list(&[m, xs]);
        let ll = LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).unwrap();

        let args = fx.list(&[]);
        let bindings = ll.bind(&mut fx.arena, &mut fx.symbols, args).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(matches!(
            fx.arena.get_unchecked(bindings[0].1),
            Value::Null
        ));
    }

    #[test]
    fn test_bind_arity_mismatch() {
        let mut fx = Fixture::new();
        let x = fx.sym("X");
        let form = fx.list(&[x]);
        let ll = LambdaList::parse(&mut fx.arena, &mut fx.symbols, form).unwrap();

        // too many
        let one = fx.arena.alloc(Value::Integer(1));
        let two = fx.arena.alloc(Value::Integer(2));
        let args = fx.list(&[one, two]);
        assert!(ll.bind(&mut fx.arena, &mut fx.symbols, args).is_err());

        // too few
        let empty = fx.list(&[]);
        assert!(ll.bind(&mut fx.arena, &mut fx.symbols, empty).is_err());
    }
}
