// Iskra Evaluator - Dispatch, Special Forms and Application
//
// The dispatcher drives every form: symbols resolve in the Variable
// namespace, atoms evaluate to themselves, and a cons dispatches on its
// head through macros, special forms and the Function namespace, in that
// order. Non-local exits travel the condition channel as Escape signals
// and are consumed by the establisher of the matching tag.

use log::{debug, trace};
use smallvec::SmallVec;

use crate::arena::Arena;
use crate::classes::{self, ClassTable};
use crate::conditions::{self, EscapeKind, Signal};
use crate::env::Environment;
use crate::lambda::LambdaList;
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::{FunId, Value, ValueId};

/// Result of evaluation: a value, or a signal on the condition channel
pub type EvalResult = Result<ValueId, Signal>;

/// Host-implemented function. Receives the evaluated argument list when
/// registered in the Function namespace, the unevaluated operand list when
/// registered in the Macro namespace.
pub type NativeFn = fn(&mut Interpreter, &Environment, ValueId) -> EvalResult;

/// An applicable object: host procedure or closure
#[derive(Debug, Clone)]
pub enum Function {
    Native {
        name: SymbolId,
        fun: NativeFn,
    },
    Lambda {
        name: SymbolId,
        params: LambdaList,
        body: Vec<ValueId>,
        env: Environment,
    },
}

/// Special Forms (Cached Symbol IDs)
#[derive(Debug, Clone, Copy)]
pub struct SpecialForms {
    pub quote: SymbolId,
    pub function: SymbolId,
    pub lambda: SymbolId,
    pub labels: SymbolId,
    pub flet: SymbolId,
    pub r#let: SymbolId,
    pub let_star: SymbolId,
    pub setq: SymbolId,
    pub r#if: SymbolId,
    pub progn: SymbolId,
    pub block: SymbolId,
    pub return_from: SymbolId,
    pub catch: SymbolId,
    pub throw: SymbolId,
    pub tagbody: SymbolId,
    pub go: SymbolId,
    pub unwind_protect: SymbolId,
    pub define_function: SymbolId,
    pub defun: SymbolId,
    pub defmacro: SymbolId,
    pub defglobal: SymbolId,
    pub defdynamic: SymbolId,
    pub dynamic: SymbolId,
    pub dynamic_let: SymbolId,
}

impl SpecialForms {
    pub fn new(symbols: &mut SymbolTable) -> Self {
        Self {
            quote: symbols.intern("QUOTE"),
            function: symbols.intern("FUNCTION"),
            lambda: symbols.intern("LAMBDA"),
            labels: symbols.intern("LABELS"),
            flet: symbols.intern("FLET"),
            r#let: symbols.intern("LET"),
            let_star: symbols.intern("LET*"),
            setq: symbols.intern("SETQ"),
            r#if: symbols.intern("IF"),
            progn: symbols.intern("PROGN"),
            block: symbols.intern("BLOCK"),
            return_from: symbols.intern("RETURN-FROM"),
            catch: symbols.intern("CATCH"),
            throw: symbols.intern("THROW"),
            tagbody: symbols.intern("TAGBODY"),
            go: symbols.intern("GO"),
            unwind_protect: symbols.intern("UNWIND-PROTECT"),
            define_function: symbols.intern("DEFINE-FUNCTION"),
            defun: symbols.intern("DEFUN"),
            defmacro: symbols.intern("DEFMACRO"),
            defglobal: symbols.intern("DEFGLOBAL"),
            defdynamic: symbols.intern("DEFDYNAMIC"),
            dynamic: symbols.intern("DYNAMIC"),
            dynamic_let: symbols.intern("DYNAMIC-LET"),
        }
    }

    /// The fixed name set; user code cannot rebind these in the
    /// Function or Macro namespaces.
    pub fn contains(&self, sym: SymbolId) -> bool {
        [
            self.quote,
            self.function,
            self.lambda,
            self.labels,
            self.flet,
            self.r#let,
            self.let_star,
            self.setq,
            self.r#if,
            self.progn,
            self.block,
            self.return_from,
            self.catch,
            self.throw,
            self.tagbody,
            self.go,
            self.unwind_protect,
            self.define_function,
            self.defun,
            self.defmacro,
            self.defglobal,
            self.defdynamic,
            self.dynamic,
            self.dynamic_let,
        ]
        .contains(&sym)
    }
}

/// The Iskra interpreter: value heap, symbol table, function store and
/// the long-lived global environment.
pub struct Interpreter {
    pub arena: Arena,
    pub symbols: SymbolTable,
    pub classes: ClassTable,
    pub functions: Vec<Function>,
    pub special: SpecialForms,
    pub global: Environment,
    /// Cached Null value
    pub nil: ValueId,
    /// Cached T symbol value
    pub t: ValueId,
}

impl Interpreter {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let mut symbols = SymbolTable::new();
        let special = SpecialForms::new(&mut symbols);
        let nil = arena.alloc(Value::Null);
        let t_sym = symbols.intern("T");
        let t = arena.alloc(Value::Symbol(t_sym));

        let global = Environment::new();
        global.variable.define(t_sym, t);

        Self {
            arena,
            symbols,
            classes: ClassTable::new(),
            functions: Vec::new(),
            special,
            global,
            nil,
            t,
        }
    }

    // -------------------------------------------------------------------
    // Heap helpers
    // -------------------------------------------------------------------

    pub fn alloc(&mut self, value: Value) -> ValueId {
        self.arena.alloc(value)
    }

    /// Create a cons cell
    pub fn cons(&mut self, car: ValueId, cdr: ValueId) -> ValueId {
        self.arena.alloc(Value::Cons(car, cdr))
    }

    /// Get car of a cons
    pub fn car(&self, v: ValueId) -> Option<ValueId> {
        match self.arena.get_unchecked(v) {
            Value::Cons(car, _) => Some(*car),
            _ => None,
        }
    }

    /// Get cdr of a cons
    pub fn cdr(&self, v: ValueId) -> Option<ValueId> {
        match self.arena.get_unchecked(v) {
            Value::Cons(_, cdr) => Some(*cdr),
            _ => None,
        }
    }

    /// Create a list from a slice of values
    pub fn list(&mut self, items: &[ValueId]) -> ValueId {
        let mut result = self.nil;
        for &item in items.iter().rev() {
            result = self.cons(item, result);
        }
        result
    }

    /// Collect a proper list into a vector; None for improper lists
    pub fn list_to_vec(&self, list: ValueId) -> Option<Vec<ValueId>> {
        let mut out = Vec::new();
        let mut cur = list;
        loop {
            match self.arena.get_unchecked(cur) {
                Value::Null => return Some(out),
                Value::Cons(car, cdr) => {
                    out.push(*car);
                    cur = *cdr;
                }
                _ => return None,
            }
        }
    }

    /// SymbolId of a symbol value
    pub fn symbol_id(&self, v: ValueId) -> Option<SymbolId> {
        match self.arena.get_unchecked(v) {
            Value::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    pub fn symbol_node(&mut self, sym: SymbolId) -> ValueId {
        self.arena.alloc(Value::Symbol(sym))
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    /// Store a function object and return its value handle
    pub fn add_function(&mut self, function: Function) -> ValueId {
        let id = FunId(self.functions.len() as u32);
        self.functions.push(function);
        self.arena.alloc(Value::Function(id))
    }

    /// Register a host function in the global Function namespace
    pub fn register_native(&mut self, name: &str, fun: NativeFn) {
        let sym = self.symbols.intern(name);
        let f = self.add_function(Function::Native { name: sym, fun });
        self.global.function.define(sym, f);
    }

    /// Register a host function in the global Macro namespace
    pub fn register_native_macro(&mut self, name: &str, fun: NativeFn) {
        let sym = self.symbols.intern(name);
        let f = self.add_function(Function::Native { name: sym, fun });
        self.global.macros.define(sym, f);
    }

    // -------------------------------------------------------------------
    // Condition helpers
    // -------------------------------------------------------------------

    pub fn domain_error(&mut self, object: ValueId, expected: classes::ClassId) -> Signal {
        conditions::domain_error(&mut self.arena, &mut self.symbols, object, expected)
    }

    fn undefined_variable(&mut self, sym: SymbolId, namespace: &str) -> Signal {
        let name = self.symbol_node(sym);
        conditions::undefined_variable(&mut self.arena, &mut self.symbols, name, namespace)
    }

    fn undefined_function(&mut self, sym: SymbolId) -> Signal {
        let name = self.symbol_node(sym);
        conditions::undefined_function(&mut self.arena, &mut self.symbols, name)
    }

    pub fn arity_error(&mut self) -> Signal {
        conditions::arity_error(&mut self.arena, &mut self.symbols)
    }

    pub fn immutable_binding(&mut self) -> Signal {
        conditions::immutable_binding(&mut self.arena, &mut self.symbols)
    }

    pub fn improper_argument_list(&mut self) -> Signal {
        conditions::improper_argument_list(&mut self.arena, &mut self.symbols)
    }

    pub fn malformed_form(&mut self) -> Signal {
        conditions::malformed_form(&mut self.arena, &mut self.symbols)
    }

    pub fn control_error(&mut self) -> Signal {
        conditions::control_error(&mut self.arena, &mut self.symbols)
    }

    fn tag_not_defined(&mut self, tag: ValueId) -> Signal {
        conditions::simple_error(
            &mut self.arena,
            &mut self.symbols,
            "~A is not defined as the tag",
            &[tag],
        )
    }

    // -------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------

    /// Main evaluation entry point
    pub fn eval(&mut self, env: &Environment, form: ValueId) -> EvalResult {
        let value = self.arena.get_unchecked(form).clone();
        match value {
            Value::Symbol(sym) => {
                if let Some(v) = env.variable.get(sym) {
                    return Ok(v);
                }
                if let Some(v) = self.global.variable.get(sym) {
                    return Ok(v);
                }
                Err(self.undefined_variable(sym, "VARIABLE"))
            }
            Value::Cons(op, operands) => self.eval_application(env, op, operands),
            // Self-evaluating atoms
            _ => Ok(form),
        }
    }

    /// Evaluate a macro call, special form or function application
    fn eval_application(&mut self, env: &Environment, op: ValueId, operands: ValueId) -> EvalResult {
        if let Some(sym) = self.symbol_id(op) {
            // Macros shadow everything else in operator position
            if let Some(mac) = env
                .macros
                .get(sym)
                .or_else(|| self.global.macros.get(sym))
            {
                trace!("expanding macro {}", self.symbols.name(sym));
                let expansion = self.apply(env, mac, operands)?;
                return self.eval(env, expansion);
            }

            if self.special.contains(sym) {
                return self.eval_special(env, sym, operands);
            }

            let fun = match env
                .function
                .get(sym)
                .or_else(|| self.global.function.get(sym))
            {
                Some(f) => f,
                None => return Err(self.undefined_function(sym)),
            };
            let args = self.eval_arguments(env, operands)?;
            return self.apply(env, fun, args);
        }

        // Operator position holds an expression
        let fun = self.eval(env, op)?;
        let args = self.eval_arguments(env, operands)?;
        self.apply(env, fun, args)
    }

    /// Evaluate each operand left-to-right into a fresh argument list
    fn eval_arguments(&mut self, env: &Environment, operands: ValueId) -> Result<ValueId, Signal> {
        let mut items: SmallVec<[ValueId; 8]> = SmallVec::new();
        let mut cur = operands;
        loop {
            match self.arena.get_unchecked(cur) {
                Value::Null => break,
                Value::Cons(car, cdr) => {
                    let (car, cdr) = (*car, *cdr);
                    items.push(self.eval(env, car)?);
                    cur = cdr;
                }
                _ => return Err(self.improper_argument_list()),
            }
        }
        Ok(self.list(&items))
    }

    /// Apply a function value to an argument list
    pub fn apply(&mut self, env: &Environment, fun: ValueId, args: ValueId) -> EvalResult {
        let id = match self.arena.get_unchecked(fun) {
            Value::Function(id) => *id,
            _ => return Err(self.domain_error(fun, classes::FUNCTION)),
        };
        let function = self.functions[id.0 as usize].clone();
        match function {
            Function::Native { fun, .. } => fun(self, env, args),
            Function::Lambda {
                params,
                body,
                env: captured,
                ..
            } => {
                let mut call_env = captured;
                call_env.variable.push_frame();
                // Dynamic extent comes from the caller, not the
                // definition site: this is what makes catch/throw
                // dynamic while block/go stay lexical.
                call_env.dynamic = env.dynamic.clone();
                call_env.catch_tag = env.catch_tag.clone();
                let bindings = params.bind(&mut self.arena, &mut self.symbols, args)?;
                for (sym, val) in bindings {
                    call_env.variable.define(sym, val);
                }
                self.eval_body(&call_env, &body)
            }
        }
    }

    /// Evaluate forms in sequence; the last value wins, an empty body is NIL
    fn eval_body(&mut self, env: &Environment, forms: &[ValueId]) -> EvalResult {
        let mut result = self.nil;
        for &form in forms {
            result = self.eval(env, form)?;
        }
        Ok(result)
    }

    fn eval_special(&mut self, env: &Environment, sym: SymbolId, operands: ValueId) -> EvalResult {
        let sf = self.special;
        if sym == sf.quote {
            return self.sf_quote(operands);
        }
        if sym == sf.function {
            return self.sf_function(env, operands);
        }
        if sym == sf.lambda {
            return self.sf_lambda(env, operands);
        }
        if sym == sf.labels {
            return self.sf_labels(env, operands);
        }
        if sym == sf.flet {
            return self.sf_flet(env, operands);
        }
        if sym == sf.r#let {
            return self.sf_let(env, operands);
        }
        if sym == sf.let_star {
            return self.sf_let_star(env, operands);
        }
        if sym == sf.setq {
            return self.sf_setq(env, operands);
        }
        if sym == sf.r#if {
            return self.sf_if(env, operands);
        }
        if sym == sf.progn {
            return self.sf_progn(env, operands);
        }
        if sym == sf.block {
            return self.sf_block(env, operands);
        }
        if sym == sf.return_from {
            return self.sf_return_from(env, operands);
        }
        if sym == sf.catch {
            return self.sf_catch(env, operands);
        }
        if sym == sf.throw {
            return self.sf_throw(env, operands);
        }
        if sym == sf.tagbody {
            return self.sf_tagbody(env, operands);
        }
        if sym == sf.go {
            return self.sf_go(env, operands);
        }
        if sym == sf.unwind_protect {
            return self.sf_unwind_protect(env, operands);
        }
        if sym == sf.define_function || sym == sf.defun {
            return self.sf_define_function(env, operands);
        }
        if sym == sf.defmacro {
            return self.sf_defmacro(env, operands);
        }
        if sym == sf.defglobal {
            return self.sf_defglobal(env, operands);
        }
        if sym == sf.defdynamic {
            return self.sf_defdynamic(env, operands);
        }
        if sym == sf.dynamic {
            return self.sf_dynamic(env, operands);
        }
        if sym == sf.dynamic_let {
            return self.sf_dynamic_let(env, operands);
        }
        unreachable!("special form dispatch out of sync with SpecialForms::contains")
    }

    // -------------------------------------------------------------------
    // Simple special forms
    // -------------------------------------------------------------------

    /// (quote expr) -> expr, unevaluated
    fn sf_quote(&mut self, operands: ValueId) -> EvalResult {
        match self.list_to_vec(operands) {
            Some(items) if items.len() == 1 => Ok(items[0]),
            Some(_) => Err(self.arity_error()),
            None => Err(self.malformed_form()),
        }
    }

    /// (function name) -> the function object bound to name
    fn sf_function(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 1 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let sym = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        match env
            .function
            .get(sym)
            .or_else(|| self.global.function.get(sym))
        {
            Some(f) => Ok(f),
            None => Err(self.undefined_function(sym)),
        }
    }

    /// (if test then else?) -> conditional evaluation
    fn sf_if(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 2 || items.len() == 3 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let test = self.eval(env, items[0])?;
        if !matches!(self.arena.get_unchecked(test), Value::Null) {
            self.eval(env, items[1])
        } else if items.len() == 3 {
            self.eval(env, items[2])
        } else {
            Ok(self.nil)
        }
    }

    /// (progn form*) -> value of the last form
    fn sf_progn(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let forms = match self.list_to_vec(operands) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(env, &forms)
    }

    /// (setq var form) -> assign the innermost visible binding
    fn sf_setq(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let sym = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        let value = self.eval(env, items[1])?;
        if env.variable.set(sym, value) || self.global.variable.set(sym, value) {
            Ok(value)
        } else {
            Err(self.undefined_variable(sym, "VARIABLE"))
        }
    }

    // -------------------------------------------------------------------
    // Binding forms
    // -------------------------------------------------------------------

    /// Parse ((var form) ...) binding lists for let, let* and dynamic-let
    fn parse_value_bindings(
        &mut self,
        bindings: ValueId,
    ) -> Result<Vec<(SymbolId, ValueId)>, Signal> {
        let items = match self.list_to_vec(bindings) {
            Some(items) => items,
            None => return Err(self.malformed_form()),
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let pair = match self.list_to_vec(item) {
                Some(pair) if pair.len() == 2 => pair,
                _ => return Err(self.malformed_form()),
            };
            let sym = match self.symbol_id(pair[0]) {
                Some(s) => s,
                None => return Err(self.domain_error(pair[0], classes::SYMBOL)),
            };
            out.push((sym, pair[1]));
        }
        Ok(out)
    }

    /// (let ((var form)*) body*) -> parallel bindings
    fn sf_let(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (bindings_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let bindings = self.parse_value_bindings(bindings_form)?;

        // Parallel: init forms see the caller's environment
        let mut values = Vec::with_capacity(bindings.len());
        for &(_, form) in &bindings {
            values.push(self.eval(env, form)?);
        }
        let mut derived = env.clone();
        derived.variable.push_frame();
        for (&(sym, _), value) in bindings.iter().zip(values) {
            derived.variable.define(sym, value);
        }

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(&derived, &forms)
    }

    /// (let* ((var form)*) body*) -> sequential bindings
    fn sf_let_star(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (bindings_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let bindings = self.parse_value_bindings(bindings_form)?;

        let mut derived = env.clone();
        derived.variable.push_frame();
        for (sym, form) in bindings {
            let value = self.eval(&derived, form)?;
            derived.variable.define(sym, value);
        }

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(&derived, &forms)
    }

    /// (dynamic-let ((var form)*) body*) -> deep-bound dynamic extent
    fn sf_dynamic_let(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (bindings_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let bindings = self.parse_value_bindings(bindings_form)?;

        let mut values = Vec::with_capacity(bindings.len());
        for &(_, form) in &bindings {
            values.push(self.eval(env, form)?);
        }
        let mut derived = env.clone();
        derived.dynamic.push_frame();
        for (&(sym, _), value) in bindings.iter().zip(values) {
            derived.dynamic.define(sym, value);
        }

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(&derived, &forms)
    }

    /// (dynamic var) -> current dynamic binding
    fn sf_dynamic(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 1 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let sym = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        match env.dynamic.get(sym).or_else(|| self.global.dynamic.get(sym)) {
            Some(v) => Ok(v),
            None => Err(self.undefined_variable(sym, "DYNAMIC-VARIABLE")),
        }
    }

    // -------------------------------------------------------------------
    // Functions and definers
    // -------------------------------------------------------------------

    /// (lambda lambda-list form*) -> closure over the current environment
    fn sf_lambda(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (ll_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let params = LambdaList::parse(&mut self.arena, &mut self.symbols, ll_form)?;
        let body_forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        let name = self.symbols.intern("ANONYMOUS-FUNCTION");
        Ok(self.add_function(Function::Lambda {
            name,
            params,
            body: body_forms,
            env: env.clone(),
        }))
    }

    /// Parse ((name lambda-list form*) ...) for flet and labels
    #[allow(clippy::type_complexity)]
    fn parse_function_bindings(
        &mut self,
        bindings: ValueId,
    ) -> Result<Vec<(SymbolId, LambdaList, Vec<ValueId>)>, Signal> {
        let items = match self.list_to_vec(bindings) {
            Some(items) => items,
            None => return Err(self.malformed_form()),
        };
        let mut out = Vec::with_capacity(items.len());
        let mut seen: Vec<SymbolId> = Vec::new();
        for item in items {
            let parts = match self.list_to_vec(item) {
                Some(parts) if parts.len() >= 2 => parts,
                _ => return Err(self.malformed_form()),
            };
            let name = match self.symbol_id(parts[0]) {
                Some(s) => s,
                None => return Err(self.domain_error(parts[0], classes::SYMBOL)),
            };
            if self.special.contains(name) || seen.contains(&name) {
                return Err(self.immutable_binding());
            }
            seen.push(name);
            let params = LambdaList::parse(&mut self.arena, &mut self.symbols, parts[1])?;
            out.push((name, params, parts[2..].to_vec()));
        }
        Ok(out)
    }

    /// (flet ((name lambda-list form*)*) body*) -> local functions whose
    /// right-hand sides see the environment outside flet
    fn sf_flet(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (bindings_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let parsed = self.parse_function_bindings(bindings_form)?;

        let mut derived = env.clone();
        derived.function.push_frame();
        for (name, params, forms) in parsed {
            let f = self.add_function(Function::Lambda {
                name,
                params,
                body: forms,
                env: env.clone(),
            });
            derived.function.define(name, f);
        }

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(&derived, &forms)
    }

    /// (labels ((name lambda-list form*)*) body*) -> like flet, but the
    /// new bindings are visible to the lambdas themselves. The closures
    /// capture the derived environment before the definitions land in its
    /// shared frontmost frame, which is safe because the function object
    /// is stored, not its evaluated body.
    fn sf_labels(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (bindings_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let parsed = self.parse_function_bindings(bindings_form)?;

        let mut derived = env.clone();
        derived.function.push_frame();
        for (name, params, forms) in parsed {
            let f = self.add_function(Function::Lambda {
                name,
                params,
                body: forms,
                env: derived.clone(),
            });
            derived.function.define(name, f);
        }

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        self.eval_body(&derived, &forms)
    }

    /// (define-function name lambda-list form*) -> global definition
    fn sf_define_function(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() >= 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let name = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        if self.special.contains(name) {
            return Err(self.immutable_binding());
        }
        let params = LambdaList::parse(&mut self.arena, &mut self.symbols, items[1])?;
        let f = self.add_function(Function::Lambda {
            name,
            params,
            body: items[2..].to_vec(),
            env: env.clone(),
        });
        self.global.function.define(name, f);
        debug!("defined function {}", self.symbols.name(name));
        Ok(items[0])
    }

    /// (defmacro name lambda-list form*) -> global macro definition
    fn sf_defmacro(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() >= 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let name = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        if self.special.contains(name) {
            return Err(self.immutable_binding());
        }
        let params = LambdaList::parse(&mut self.arena, &mut self.symbols, items[1])?;
        let f = self.add_function(Function::Lambda {
            name,
            params,
            body: items[2..].to_vec(),
            env: env.clone(),
        });
        self.global.macros.define(name, f);
        debug!("defined macro {}", self.symbols.name(name));
        Ok(items[0])
    }

    /// (defglobal name form) -> global variable definition
    fn sf_defglobal(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let name = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        let value = self.eval(env, items[1])?;
        self.global.variable.define(name, value);
        Ok(items[0])
    }

    /// (defdynamic name form) -> global dynamic variable definition
    fn sf_defdynamic(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let name = match self.symbol_id(items[0]) {
            Some(s) => s,
            None => return Err(self.domain_error(items[0], classes::SYMBOL)),
        };
        let value = self.eval(env, items[1])?;
        self.global.dynamic.define(name, value);
        Ok(items[0])
    }

    // -------------------------------------------------------------------
    // Non-local exits
    // -------------------------------------------------------------------

    /// Key for the tag namespaces. Symbols stand for themselves, strings
    /// are admitted by interning their text; numbers and characters are a
    /// domain-error, as is anything else.
    fn tag_key(&mut self, tag: ValueId) -> Result<SymbolId, Signal> {
        match self.arena.get_unchecked(tag) {
            Value::Symbol(s) => Ok(*s),
            Value::String(s) => {
                let text = s.clone();
                Ok(self.symbols.intern(&text))
            }
            _ => Err(self.domain_error(tag, classes::OBJECT)),
        }
    }

    /// (block tag form*) -> establish a lexical exit point
    fn sf_block(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (tag_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let key = self.tag_key(tag_form)?;

        let mut derived = env.clone();
        derived.block_tag.push_frame();
        derived.block_tag.define(key, self.nil);

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        let mut result = self.nil;
        for form in forms {
            match self.eval(&derived, form) {
                Ok(v) => result = v,
                Err(Signal::Escape {
                    kind: EscapeKind::Block,
                    tag,
                    value,
                }) if tag == key => {
                    trace!("block {} caught its exit", self.symbols.name(key));
                    return Ok(value);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    /// (return-from tag form?) -> lexical exit to the matching block
    fn sf_return_from(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (tag_form, rest) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let key = self.tag_key(tag_form)?;
        let value = match self.arena.get_unchecked(rest) {
            Value::Cons(form, _) => {
                let form = *form;
                self.eval(env, form)?
            }
            _ => self.nil,
        };
        if env.block_tag.get(key).is_none() {
            return Err(self.tag_not_defined(tag_form));
        }
        Err(Signal::Escape {
            kind: EscapeKind::Block,
            tag: key,
            value,
        })
    }

    /// (catch tag-form form*) -> establish a dynamic exit point
    fn sf_catch(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (tag_form, body) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let tag_value = self.eval(env, tag_form)?;
        let key = self.tag_key(tag_value)?;

        let mut derived = env.clone();
        derived.catch_tag.push_frame();
        derived.catch_tag.define(key, self.nil);

        let forms = match self.list_to_vec(body) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        let mut result = self.nil;
        for form in forms {
            match self.eval(&derived, form) {
                Ok(v) => result = v,
                Err(Signal::Escape {
                    kind: EscapeKind::Catch,
                    tag,
                    value,
                }) if tag == key => {
                    trace!("catch {} caught its throw", self.symbols.name(key));
                    return Ok(value);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    /// (throw tag-form result-form) -> dynamic exit to the matching catch
    fn sf_throw(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 2 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let tag_value = self.eval(env, items[0])?;
        let key = self.tag_key(tag_value)?;
        let value = self.eval(env, items[1])?;
        if env.catch_tag.get(key).is_none() {
            return Err(self.tag_not_defined(tag_value));
        }
        Err(Signal::Escape {
            kind: EscapeKind::Catch,
            tag: key,
            value,
        })
    }

    /// (tagbody {tag | form}*) -> NIL
    ///
    /// Non-cons items are tags, each recorded with the sequence of items
    /// after it; cons items are forms. A tagbody escape whose tag belongs
    /// to this tagbody transfers control to the forms after that tag.
    fn sf_tagbody(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) => items,
            None => return Err(self.malformed_form()),
        };

        let mut derived = env.clone();
        derived.tagbody_tag.push_frame();

        let mut own: Vec<SymbolId> = Vec::new();
        for (idx, &item) in items.iter().enumerate() {
            if matches!(self.arena.get_unchecked(item), Value::Cons(_, _)) {
                continue;
            }
            let key = self.tag_key(item)?;
            let rest = self.alloc(Value::Vector(items[idx + 1..].to_vec()));
            if !derived.tagbody_tag.define_tag(key, rest) {
                return Err(self.immutable_binding());
            }
            own.push(key);
        }

        for &item in &items {
            if !matches!(self.arena.get_unchecked(item), Value::Cons(_, _)) {
                continue;
            }
            match self.eval(&derived, item) {
                Ok(_) => {}
                Err(Signal::Escape {
                    kind: EscapeKind::Tagbody,
                    tag,
                    ..
                }) if own.contains(&tag) => {
                    return self.tagbody_jump(&derived, &own, tag);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.nil)
    }

    /// Transfer control to the forms after `start` and run to the end of
    /// the body, restarting whenever another one of this tagbody's tags
    /// is the target.
    fn tagbody_jump(&mut self, env: &Environment, own: &[SymbolId], start: SymbolId) -> EvalResult {
        let mut target = start;
        'jump: loop {
            trace!("tagbody jump to {}", self.symbols.name(target));
            let stored = env
                .tagbody_tag
                .get(target)
                .expect("tag recorded on tagbody entry");
            let forms = match self.arena.get_unchecked(stored) {
                Value::Vector(v) => v.clone(),
                _ => unreachable!("tagbody tags map to form vectors"),
            };
            for form in forms {
                if !matches!(self.arena.get_unchecked(form), Value::Cons(_, _)) {
                    continue;
                }
                match self.eval(env, form) {
                    Ok(_) => {}
                    Err(Signal::Escape {
                        kind: EscapeKind::Tagbody,
                        tag,
                        ..
                    }) if own.contains(&tag) => {
                        target = tag;
                        continue 'jump;
                    }
                    Err(err) => return Err(err),
                }
            }
            return Ok(self.nil);
        }
    }

    /// (go tag) -> transfer of control to a tag in an enclosing tagbody
    fn sf_go(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let items = match self.list_to_vec(operands) {
            Some(items) if items.len() == 1 => items,
            Some(_) => return Err(self.arity_error()),
            None => return Err(self.malformed_form()),
        };
        let key = self.tag_key(items[0])?;
        if env.tagbody_tag.get(key).is_none() {
            return Err(self.tag_not_defined(items[0]));
        }
        Err(Signal::Escape {
            kind: EscapeKind::Tagbody,
            tag: key,
            value: self.nil,
        })
    }

    /// (unwind-protect form cleanup*) -> cleanups run on every exit path.
    ///
    /// A cleanup that itself escapes would abandon a still-pending
    /// non-local exit, which is a control-error; a cleanup signalling an
    /// ordinary condition replaces the protected form's outcome.
    fn sf_unwind_protect(&mut self, env: &Environment, operands: ValueId) -> EvalResult {
        let (protected, cleanups) = match self.arena.get_unchecked(operands) {
            Value::Cons(car, cdr) => (*car, *cdr),
            _ => return Err(self.malformed_form()),
        };
        let result = self.eval(env, protected);

        let forms = match self.list_to_vec(cleanups) {
            Some(forms) => forms,
            None => return Err(self.malformed_form()),
        };
        for form in forms {
            if let Err(signal) = self.eval(env, form) {
                if signal.is_escape() {
                    return Err(self.control_error());
                }
                return Err(signal);
            }
        }
        result
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
