use iskra::classes::{self, ClassId};
use iskra::conditions::Signal;
use iskra::env::Environment;
use iskra::eval::{EvalResult, Interpreter};
use iskra::primitives::register_primitives;
use iskra::reader;
use iskra::types::{Value, ValueId};

fn new_interpreter() -> (Interpreter, Environment) {
    let mut interp = Interpreter::new();
    register_primitives(&mut interp);
    (interp, Environment::new())
}

fn eval_str(interp: &mut Interpreter, env: &Environment, src: &str) -> EvalResult {
    let form = reader::read_str(interp, src).expect("source should parse");
    interp.eval(env, form)
}

fn eval_ok(interp: &mut Interpreter, env: &Environment, src: &str) -> ValueId {
    eval_str(interp, env, src).expect("evaluation should succeed")
}

fn signalled_class(interp: &Interpreter, result: EvalResult) -> ClassId {
    match result {
        Err(Signal::Condition(c)) => match interp.arena.get_unchecked(c) {
            Value::Instance(inst) => inst.class,
            other => panic!("not an instance: {:?}", other),
        },
        other => panic!("expected a condition, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// block / return-from (lexical)
// ---------------------------------------------------------------------------

#[test]
fn return_from_exits_the_matching_block() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(&mut interp, &env, "(block b 1 (return-from b 2) 3)");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(2));
}

#[test]
fn block_returns_last_value_on_normal_completion() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(&mut interp, &env, "(block b 1 2)");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(2));

    let result = eval_ok(&mut interp, &env, "(block b)");
    assert!(matches!(interp.arena.get_unchecked(result), Value::Null));
}

#[test]
fn inner_block_supersedes_outer_same_name() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(
        &mut interp,
        &env,
        "(block b (block b (return-from b 1) 2) 3)",
    );
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(3));
}

#[test]
fn return_from_without_a_block_in_scope() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(&mut interp, &env, "(return-from nowhere 1)");
    assert_eq!(signalled_class(&interp, result), classes::SIMPLE_ERROR);
}

#[test]
fn block_tags_must_not_be_numbers_or_characters() {
    let (mut interp, env) = new_interpreter();
    for src in ["(block 1 2)", "(block #\\a 2)", "(return-from 1 2)"] {
        let result = eval_str(&mut interp, &env, src);
        assert_eq!(
            signalled_class(&interp, result),
            classes::DOMAIN_ERROR,
            "{} should be rejected",
            src
        );
    }
}

#[test]
fn return_from_works_through_nested_lambdas() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(
        &mut interp,
        &env,
        "(block b (funcall (lambda () (return-from b 7))) 1)",
    );
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(7));
}

#[test]
fn escape_to_a_dead_block_fails_to_match() {
    let (mut interp, env) = new_interpreter();
    eval_ok(
        &mut interp,
        &env,
        "(block b (defglobal runaway (lambda () (return-from b 0))))",
    );
    // the establisher is gone; the escape surfaces unconsumed
    let result = eval_str(&mut interp, &env, "(funcall runaway)");
    match result {
        Err(signal) => assert!(signal.is_escape()),
        other => panic!("expected an escape, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// catch / throw (dynamic)
// ---------------------------------------------------------------------------

#[test]
fn throw_exits_the_matching_catch() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(&mut interp, &env, "(catch 'foo 1 (throw 'foo 42) 3)");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(42));
}

#[test]
fn throw_is_dynamically_scoped() {
    let (mut interp, env) = new_interpreter();
    eval_ok(
        &mut interp,
        &env,
        "(define-function deep (n) (if (= n 0) (throw 'out 99) (deep (- n 1))))",
    );
    let result = eval_ok(&mut interp, &env, "(catch 'out (deep 5) 1)");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(99));
}

#[test]
fn throw_passes_through_non_matching_catch() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(&mut interp, &env, "(catch 'a (catch 'b (throw 'a 1)))");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(1));
}

#[test]
fn throw_without_a_catch_in_scope() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(&mut interp, &env, "(throw 'nowhere 1)");
    assert_eq!(signalled_class(&interp, result), classes::SIMPLE_ERROR);
}

#[test]
fn catch_evaluates_its_tag_form() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(
        &mut interp,
        &env,
        "(let ((tag 'foo)) (catch tag (throw 'foo 5)))",
    );
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(5));

    let result = eval_str(&mut interp, &env, "(catch 1 2)");
    assert_eq!(signalled_class(&interp, result), classes::DOMAIN_ERROR);
}

// ---------------------------------------------------------------------------
// tagbody / go
// ---------------------------------------------------------------------------

#[test]
fn go_jumps_over_intervening_forms() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(
        &mut interp,
        &env,
        "(catch 'foo (tagbody (go bar) (throw 'foo 1) bar))",
    );
    assert!(matches!(interp.arena.get_unchecked(result), Value::Null));
}

#[test]
fn nested_tagbody_restarts_in_the_right_body() {
    let (mut interp, env) = new_interpreter();
    let result = eval_ok(
        &mut interp,
        &env,
        "(catch 'foo (tagbody (tagbody (go bar) (throw 'foo 1) bar (go foobar)) foobar))",
    );
    assert!(matches!(interp.arena.get_unchecked(result), Value::Null));
}

#[test]
fn tagbody_returns_nil_on_normal_completion() {
    let (mut interp, env) = new_interpreter();
    eval_ok(&mut interp, &env, "(defglobal n 0)");
    let result = eval_ok(&mut interp, &env, "(tagbody (setq n 1) (setq n (+ n 1)))");
    assert!(matches!(interp.arena.get_unchecked(result), Value::Null));
    let result = eval_ok(&mut interp, &env, "n");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(2));
}

#[test]
fn go_without_a_tagbody_in_scope() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(&mut interp, &env, "(go nowhere)");
    assert_eq!(signalled_class(&interp, result), classes::SIMPLE_ERROR);
}

#[test]
fn duplicate_tags_are_an_immutable_binding() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(&mut interp, &env, "(tagbody a (setq x 1) a)");
    assert_eq!(signalled_class(&interp, result), classes::PROGRAM_ERROR);
}

#[test]
fn go_works_from_a_loop_body() {
    let (mut interp, env) = new_interpreter();
    eval_ok(&mut interp, &env, "(defglobal total 0)");
    eval_ok(&mut interp, &env, "(defglobal i 0)");
    let result = eval_ok(
        &mut interp,
        &env,
        "(tagbody
           again
           (setq total (+ total i))
           (setq i (+ i 1))
           (if (< i 5) (go again) nil))",
    );
    assert!(matches!(interp.arena.get_unchecked(result), Value::Null));
    let result = eval_ok(&mut interp, &env, "total");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(10));
}

// ---------------------------------------------------------------------------
// unwind-protect
// ---------------------------------------------------------------------------

#[test]
fn cleanup_runs_on_normal_exit() {
    let (mut interp, env) = new_interpreter();
    eval_ok(&mut interp, &env, "(defglobal cleaned nil)");
    let result = eval_ok(&mut interp, &env, "(unwind-protect 1 (setq cleaned t))");
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(1));
    let result = eval_ok(&mut interp, &env, "cleaned");
    assert_eq!(result, interp.t);
}

#[test]
fn cleanup_runs_while_an_exit_is_pending() {
    let (mut interp, env) = new_interpreter();
    eval_ok(&mut interp, &env, "(defglobal cleaned nil)");
    let result = eval_ok(
        &mut interp,
        &env,
        "(catch 'out (unwind-protect (throw 'out 5) (setq cleaned t)))",
    );
    // the pending exit resumes after the cleanups
    assert_eq!(interp.arena.get_unchecked(result), &Value::Integer(5));
    let result = eval_ok(&mut interp, &env, "cleaned");
    assert_eq!(result, interp.t);
}

#[test]
fn cleanup_runs_while_a_condition_is_propagating() {
    let (mut interp, env) = new_interpreter();
    eval_ok(&mut interp, &env, "(defglobal cleaned nil)");
    let result = eval_str(&mut interp, &env, "(unwind-protect (car 9) (setq cleaned t))");
    assert_eq!(signalled_class(&interp, result), classes::DOMAIN_ERROR);
    let result = eval_ok(&mut interp, &env, "cleaned");
    assert_eq!(result, interp.t);
}

#[test]
fn escaping_cleanup_is_a_control_error() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(
        &mut interp,
        &env,
        "(catch 'a (catch 'b (unwind-protect (throw 'a 1) (throw 'b 2))))",
    );
    assert_eq!(signalled_class(&interp, result), classes::CONTROL_ERROR);
}

#[test]
fn condition_from_cleanup_replaces_the_pending_outcome() {
    let (mut interp, env) = new_interpreter();
    let result = eval_str(
        &mut interp,
        &env,
        "(catch 'x (unwind-protect (throw 'x 1) (car 9)))",
    );
    assert_eq!(signalled_class(&interp, result), classes::DOMAIN_ERROR);
}
