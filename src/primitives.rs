// Iskra Primitives - Host-Implemented Functions
//
// The numeric tower entry points, the cons/list surface, predicates,
// apply/funcall and vector constructors, registered into the global
// Function namespace. Registered functions receive evaluated argument
// lists; the evaluator's macro namespace would hand them unevaluated
// operands instead.

use crate::classes;
use crate::conditions::{self, Signal};
use crate::env::Environment;
use crate::eval::{EvalResult, Interpreter};
use crate::reader;
use crate::types::{Value, ValueId};

/// Register all standard primitives
pub fn register_primitives(interp: &mut Interpreter) {
    // Arithmetic
    interp.register_native("+", prim_add);
    interp.register_native("-", prim_sub);
    interp.register_native("*", prim_mul);
    interp.register_native("DIV", prim_div);
    interp.register_native("MOD", prim_mod);

    // Comparison
    interp.register_native("=", prim_num_eq);
    interp.register_native("<", prim_lt);
    interp.register_native(">", prim_gt);
    interp.register_native("<=", prim_le);
    interp.register_native(">=", prim_ge);

    // List operations
    interp.register_native("CONS", prim_cons);
    interp.register_native("CAR", prim_car);
    interp.register_native("CDR", prim_cdr);
    interp.register_native("SET-CAR", prim_set_car);
    interp.register_native("SET-CDR", prim_set_cdr);
    interp.register_native("LIST", prim_list);
    interp.register_native("LENGTH", prim_length);
    interp.register_native("APPEND", prim_append);
    interp.register_native("REVERSE", prim_reverse);

    // Predicates
    interp.register_native("NULL", prim_null);
    interp.register_native("ATOM", prim_atom);
    interp.register_native("CONSP", prim_consp);
    interp.register_native("LISTP", prim_listp);
    interp.register_native("SYMBOLP", prim_symbolp);
    interp.register_native("NUMBERP", prim_numberp);
    interp.register_native("FUNCTIONP", prim_functionp);
    interp.register_native("INSTANCEP", prim_instancep);
    interp.register_native("NOT", prim_not);
    interp.register_native("EQ", prim_eq);
    interp.register_native("EQL", prim_eql);
    interp.register_native("EQUAL", prim_equal);

    // Application
    interp.register_native("APPLY", prim_apply);
    interp.register_native("FUNCALL", prim_funcall);

    // Vectors
    interp.register_native("CREATE-VECTOR", prim_create_vector);
    interp.register_native("VECTOR", prim_vector);
    interp.register_native("ELT", prim_elt);
    interp.register_native("SET-ELT", prim_set_elt);

    // Classes
    interp.register_native("CLASS-OF", prim_class_of);

    // Conditions
    interp.register_native("ERROR", prim_error);

    // Reader
    interp.register_native("READ-FROM-STRING", prim_read_from_string);
}

fn argv(interp: &mut Interpreter, args: ValueId) -> Result<Vec<ValueId>, Signal> {
    match interp.list_to_vec(args) {
        Some(v) => Ok(v),
        None => Err(interp.improper_argument_list()),
    }
}

fn expect_arity(interp: &mut Interpreter, argv: &[ValueId], n: usize) -> Result<(), Signal> {
    if argv.len() != n {
        return Err(interp.arity_error());
    }
    Ok(())
}

fn boolean(interp: &Interpreter, b: bool) -> ValueId {
    if b {
        interp.t
    } else {
        interp.nil
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(f) => f,
        }
    }
}

fn num(interp: &mut Interpreter, v: ValueId) -> Result<Num, Signal> {
    let value = interp.arena.get_unchecked(v).clone();
    match value {
        Value::Integer(n) => Ok(Num::Int(n)),
        Value::Float(f) => Ok(Num::Float(f)),
        _ => Err(interp.domain_error(v, classes::NUMBER)),
    }
}

fn int(interp: &mut Interpreter, v: ValueId) -> Result<i64, Signal> {
    let value = interp.arena.get_unchecked(v).clone();
    match value {
        Value::Integer(n) => Ok(n),
        _ => Err(interp.domain_error(v, classes::INTEGER)),
    }
}

fn alloc_num(interp: &mut Interpreter, n: Num) -> ValueId {
    match n {
        Num::Int(n) => interp.alloc(Value::Integer(n)),
        Num::Float(f) => interp.alloc(Value::Float(f)),
    }
}

fn arith(interp: &mut Interpreter, operation: &str, operands: &[ValueId]) -> Signal {
    conditions::arithmetic_error(&mut interp.arena, &mut interp.symbols, operation, operands)
}

fn prim_add(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    let mut acc = Num::Int(0);
    for &arg in &argv {
        let n = num(interp, arg)?;
        acc = match (acc, n) {
            (Num::Int(a), Num::Int(b)) => match a.checked_add(b) {
                Some(s) => Num::Int(s),
                None => return Err(arith(interp, "+", &argv)),
            },
            (a, b) => Num::Float(a.as_f64() + b.as_f64()),
        };
    }
    Ok(alloc_num(interp, acc))
}

fn prim_sub(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    if argv.is_empty() {
        return Err(interp.arity_error());
    }
    let first = num(interp, argv[0])?;
    if argv.len() == 1 {
        let negated = match first {
            Num::Int(n) => match n.checked_neg() {
                Some(m) => Num::Int(m),
                None => return Err(arith(interp, "-", &argv)),
            },
            Num::Float(f) => Num::Float(-f),
        };
        return Ok(alloc_num(interp, negated));
    }
    let mut acc = first;
    for &arg in &argv[1..] {
        let n = num(interp, arg)?;
        acc = match (acc, n) {
            (Num::Int(a), Num::Int(b)) => match a.checked_sub(b) {
                Some(s) => Num::Int(s),
                None => return Err(arith(interp, "-", &argv)),
            },
            (a, b) => Num::Float(a.as_f64() - b.as_f64()),
        };
    }
    Ok(alloc_num(interp, acc))
}

fn prim_mul(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    let mut acc = Num::Int(1);
    for &arg in &argv {
        let n = num(interp, arg)?;
        acc = match (acc, n) {
            (Num::Int(a), Num::Int(b)) => match a.checked_mul(b) {
                Some(p) => Num::Int(p),
                None => return Err(arith(interp, "*", &argv)),
            },
            (a, b) => Num::Float(a.as_f64() * b.as_f64()),
        };
    }
    Ok(alloc_num(interp, acc))
}

/// Integer floor division; a zero divisor is an arithmetic-error
fn prim_div(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let a = int(interp, argv[0])?;
    let b = int(interp, argv[1])?;
    if b == 0 {
        return Err(arith(interp, "DIV", &argv));
    }
    Ok(interp.alloc(Value::Integer(a.div_euclid(b))))
}

fn prim_mod(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let a = int(interp, argv[0])?;
    let b = int(interp, argv[1])?;
    if b == 0 {
        return Err(arith(interp, "MOD", &argv));
    }
    Ok(interp.alloc(Value::Integer(a.rem_euclid(b))))
}

fn compare(
    interp: &mut Interpreter,
    args: ValueId,
    cmp: fn(f64, f64) -> bool,
    int_cmp: fn(&i64, &i64) -> bool,
) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let a = num(interp, argv[0])?;
    let b = num(interp, argv[1])?;
    let result = match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_cmp(&x, &y),
        (x, y) => cmp(x.as_f64(), y.as_f64()),
    };
    Ok(boolean(interp, result))
}

fn prim_num_eq(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    compare(interp, args, |a, b| a == b, i64::eq)
}

fn prim_lt(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    compare(interp, args, |a, b| a < b, i64::lt)
}

fn prim_gt(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    compare(interp, args, |a, b| a > b, i64::gt)
}

fn prim_le(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    compare(interp, args, |a, b| a <= b, i64::le)
}

fn prim_ge(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    compare(interp, args, |a, b| a >= b, i64::ge)
}

// ============================================================================
// Lists
// ============================================================================

fn prim_cons(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    Ok(interp.cons(argv[0], argv[1]))
}

fn prim_car(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    match interp.car(argv[0]) {
        Some(car) => Ok(car),
        None => Err(interp.domain_error(argv[0], classes::CONS)),
    }
}

fn prim_cdr(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    match interp.cdr(argv[0]) {
        Some(cdr) => Ok(cdr),
        None => Err(interp.domain_error(argv[0], classes::CONS)),
    }
}

/// (set-car obj cons) -> obj
fn prim_set_car(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    match interp.arena.get_unchecked_mut(argv[1]) {
        Value::Cons(car, _) => {
            *car = argv[0];
            Ok(argv[0])
        }
        _ => Err(interp.domain_error(argv[1], classes::CONS)),
    }
}

/// (set-cdr obj cons) -> obj
fn prim_set_cdr(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    match interp.arena.get_unchecked_mut(argv[1]) {
        Value::Cons(_, cdr) => {
            *cdr = argv[0];
            Ok(argv[0])
        }
        _ => Err(interp.domain_error(argv[1], classes::CONS)),
    }
}

fn prim_list(_interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    // The evaluated argument list is already a fresh proper list
    Ok(args)
}

fn prim_length(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let value = interp.arena.get_unchecked(argv[0]).clone();
    let len = match value {
        Value::Null => 0,
        Value::Cons(_, _) => match interp.list_to_vec(argv[0]) {
            Some(items) => items.len(),
            None => return Err(interp.domain_error(argv[0], classes::LIST)),
        },
        Value::Vector(items) => items.len(),
        Value::String(s) => s.chars().count(),
        _ => return Err(interp.domain_error(argv[0], classes::LIST)),
    };
    Ok(interp.alloc(Value::Integer(len as i64)))
}

fn prim_append(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    let mut items = Vec::new();
    for &arg in &argv {
        match interp.list_to_vec(arg) {
            Some(part) => items.extend(part),
            None => return Err(interp.domain_error(arg, classes::LIST)),
        }
    }
    Ok(interp.list(&items))
}

fn prim_reverse(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let mut items = match interp.list_to_vec(argv[0]) {
        Some(items) => items,
        None => return Err(interp.domain_error(argv[0], classes::LIST)),
    };
    items.reverse();
    Ok(interp.list(&items))
}

// ============================================================================
// Predicates
// ============================================================================

fn prim_null(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(interp.arena.get_unchecked(argv[0]), Value::Null);
    Ok(boolean(interp, b))
}

fn prim_atom(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = !matches!(interp.arena.get_unchecked(argv[0]), Value::Cons(_, _));
    Ok(boolean(interp, b))
}

fn prim_consp(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(interp.arena.get_unchecked(argv[0]), Value::Cons(_, _));
    Ok(boolean(interp, b))
}

fn prim_listp(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(
        interp.arena.get_unchecked(argv[0]),
        Value::Null | Value::Cons(_, _)
    );
    Ok(boolean(interp, b))
}

fn prim_symbolp(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(
        interp.arena.get_unchecked(argv[0]),
        Value::Symbol(_) | Value::Null
    );
    Ok(boolean(interp, b))
}

fn prim_numberp(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(
        interp.arena.get_unchecked(argv[0]),
        Value::Integer(_) | Value::Float(_)
    );
    Ok(boolean(interp, b))
}

fn prim_functionp(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(interp.arena.get_unchecked(argv[0]), Value::Function(_));
    Ok(boolean(interp, b))
}

/// (instancep obj class-name) -> membership in the fixed lattice
fn prim_instancep(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let sym = match interp.symbol_id(argv[1]) {
        Some(s) => s,
        None => return Err(interp.domain_error(argv[1], classes::SYMBOL)),
    };
    let class = match classes::find_class(interp.symbols.name(sym)) {
        Some(c) => c,
        None => {
            return Err(conditions::simple_error(
                &mut interp.arena,
                &mut interp.symbols,
                "~A does not name a class",
                &[argv[1]],
            ))
        }
    };
    let b = classes::instance_of(&interp.classes, &interp.arena, argv[0], class);
    Ok(boolean(interp, b))
}

fn prim_not(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let b = matches!(interp.arena.get_unchecked(argv[0]), Value::Null);
    Ok(boolean(interp, b))
}

fn eql_values(interp: &Interpreter, a: ValueId, b: ValueId) -> bool {
    if a == b {
        return true;
    }
    match (interp.arena.get_unchecked(a), interp.arena.get_unchecked(b)) {
        (Value::Null, Value::Null) => true,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::Character(x), Value::Character(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x == y,
        _ => false,
    }
}

fn equal_values(interp: &Interpreter, a: ValueId, b: ValueId) -> bool {
    if eql_values(interp, a, b) {
        return true;
    }
    let va = interp.arena.get_unchecked(a).clone();
    let vb = interp.arena.get_unchecked(b).clone();
    match (va, vb) {
        (Value::Cons(a1, d1), Value::Cons(a2, d2)) => {
            equal_values(interp, a1, a2) && equal_values(interp, d1, d2)
        }
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Vector(x), Value::Vector(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y.iter())
                    .all(|(&p, &q)| equal_values(interp, p, q))
        }
        _ => false,
    }
}

fn prim_eq(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let b = eql_values(interp, argv[0], argv[1]);
    Ok(boolean(interp, b))
}

fn prim_eql(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    prim_eq(interp, _env, args)
}

fn prim_equal(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let b = equal_values(interp, argv[0], argv[1]);
    Ok(boolean(interp, b))
}

// ============================================================================
// Application
// ============================================================================

/// (apply function obj* list) -> spread list onto the trailing arguments
fn prim_apply(interp: &mut Interpreter, env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    if argv.len() < 2 {
        return Err(interp.arity_error());
    }
    let function = argv[0];
    if !matches!(interp.arena.get_unchecked(function), Value::Function(_)) {
        return Err(interp.domain_error(function, classes::FUNCTION));
    }
    let last = argv[argv.len() - 1];
    if !classes::is_proper_list(&interp.arena, last) {
        return Err(interp.improper_argument_list());
    }
    let mut list = last;
    for &leading in argv[1..argv.len() - 1].iter().rev() {
        list = interp.cons(leading, list);
    }
    interp.apply(env, function, list)
}

/// (funcall function obj*) -> apply with all arguments spread
fn prim_funcall(interp: &mut Interpreter, env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    if argv.is_empty() {
        return Err(interp.arity_error());
    }
    let function = argv[0];
    if !matches!(interp.arena.get_unchecked(function), Value::Function(_)) {
        return Err(interp.domain_error(function, classes::FUNCTION));
    }
    let rest = interp.list(&argv[1..]);
    interp.apply(env, function, rest)
}

// ============================================================================
// Vectors
// ============================================================================

fn prim_create_vector(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    if argv.is_empty() || argv.len() > 2 {
        return Err(interp.arity_error());
    }
    let n = int(interp, argv[0])?;
    if n < 0 {
        return Err(interp.domain_error(argv[0], classes::INTEGER));
    }
    let fill = if argv.len() == 2 { argv[1] } else { interp.nil };
    Ok(interp.alloc(Value::Vector(vec![fill; n as usize])))
}

fn prim_vector(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    Ok(interp.alloc(Value::Vector(argv)))
}

/// (elt sequence index) over vectors, lists and strings
fn prim_elt(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 2)?;
    let index = int(interp, argv[1])?;
    if index < 0 {
        return Err(conditions::index_out_of_range(
            &mut interp.arena,
            &mut interp.symbols,
        ));
    }
    let index = index as usize;
    let value = interp.arena.get_unchecked(argv[0]).clone();
    match value {
        Value::Vector(items) => match items.get(index) {
            Some(&v) => Ok(v),
            None => Err(conditions::index_out_of_range(
                &mut interp.arena,
                &mut interp.symbols,
            )),
        },
        Value::String(s) => match s.chars().nth(index) {
            Some(c) => Ok(interp.alloc(Value::Character(c))),
            None => Err(conditions::index_out_of_range(
                &mut interp.arena,
                &mut interp.symbols,
            )),
        },
        Value::Null | Value::Cons(_, _) => {
            let items = match interp.list_to_vec(argv[0]) {
                Some(items) => items,
                None => return Err(interp.domain_error(argv[0], classes::LIST)),
            };
            match items.get(index) {
                Some(&v) => Ok(v),
                None => Err(conditions::index_out_of_range(
                    &mut interp.arena,
                    &mut interp.symbols,
                )),
            }
        }
        _ => Err(interp.domain_error(argv[0], classes::GENERAL_VECTOR)),
    }
}

/// (set-elt obj vector index) -> obj
fn prim_set_elt(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 3)?;
    let index = int(interp, argv[2])?;
    if index < 0 {
        return Err(conditions::index_out_of_range(
            &mut interp.arena,
            &mut interp.symbols,
        ));
    }
    let index = index as usize;
    match interp.arena.get_unchecked(argv[1]).clone() {
        Value::Vector(items) => {
            if index >= items.len() {
                return Err(conditions::index_out_of_range(
                    &mut interp.arena,
                    &mut interp.symbols,
                ));
            }
            if let Value::Vector(items) = interp.arena.get_unchecked_mut(argv[1]) {
                items[index] = argv[0];
            }
            Ok(argv[0])
        }
        Value::String(s) => {
            let ch = match interp.arena.get_unchecked(argv[0]) {
                Value::Character(c) => *c,
                _ => return Err(interp.domain_error(argv[0], classes::CHARACTER)),
            };
            let mut chars: Vec<char> = s.chars().collect();
            if index >= chars.len() {
                return Err(conditions::index_out_of_range(
                    &mut interp.arena,
                    &mut interp.symbols,
                ));
            }
            chars[index] = ch;
            let replaced: String = chars.into_iter().collect();
            if let Value::String(s) = interp.arena.get_unchecked_mut(argv[1]) {
                *s = replaced;
            }
            Ok(argv[0])
        }
        _ => Err(interp.domain_error(argv[1], classes::GENERAL_VECTOR)),
    }
}

// ============================================================================
// Classes and conditions
// ============================================================================

/// (class-of obj) -> the class-name symbol
fn prim_class_of(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let class = classes::class_of(&interp.arena, argv[0]);
    let sym = interp.intern(classes::class_name(class));
    Ok(interp.symbol_node(sym))
}

/// (error format-string obj*) -> signal a simple-error
fn prim_error(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    if argv.is_empty() {
        return Err(interp.arity_error());
    }
    let message = match interp.arena.get_unchecked(argv[0]).clone() {
        Value::String(s) => s,
        _ => return Err(interp.domain_error(argv[0], classes::STRING)),
    };
    Err(conditions::simple_error(
        &mut interp.arena,
        &mut interp.symbols,
        &message,
        &argv[1..],
    ))
}

/// (read-from-string string) -> one form, or a <parse-error>
fn prim_read_from_string(interp: &mut Interpreter, _env: &Environment, args: ValueId) -> EvalResult {
    let argv = argv(interp, args)?;
    expect_arity(interp, &argv, 1)?;
    let source = match interp.arena.get_unchecked(argv[0]).clone() {
        Value::String(s) => s,
        _ => return Err(interp.domain_error(argv[0], classes::STRING)),
    };
    match reader::read_str(interp, &source) {
        Ok(form) => Ok(form),
        Err(_) => Err(reader::parse_error_condition(interp, &source)),
    }
}
