// Iskra Conditions - Structured Error Instances and the Signal Channel
//
// Evaluation returns through a two-armed result: a value, or a Signal.
// Signalled conditions are standard instances tagged by a condition class
// with named slots. Non-local exits ride the same channel as an internal
// Escape variant that never becomes a user-visible value; only the
// establisher of the matching tag may consume it.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::classes::{self, ClassId};
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::{StandardInstance, Value, ValueId};

/// Which establisher an in-flight escape is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeKind {
    Block,
    Catch,
    Tagbody,
}

/// The second channel of evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A signalled condition instance
    Condition(ValueId),
    /// A non-local exit in flight
    Escape {
        kind: EscapeKind,
        tag: SymbolId,
        value: ValueId,
    },
}

impl Signal {
    pub fn is_escape(&self) -> bool {
        matches!(self, Signal::Escape { .. })
    }
}

fn make_instance(
    arena: &mut Arena,
    class: ClassId,
    slots: &[(SymbolId, ValueId)],
) -> ValueId {
    let slots: HashMap<SymbolId, ValueId> = slots.iter().copied().collect();
    arena.alloc(Value::Instance(StandardInstance { class, slots }))
}

/// Read a slot of a standard instance
pub fn slot_value(arena: &Arena, inst: ValueId, slot: SymbolId) -> Option<ValueId> {
    match arena.get_unchecked(inst) {
        Value::Instance(i) => i.slots.get(&slot).copied(),
        _ => None,
    }
}

/// Write a slot of a standard instance; false for non-instances
pub fn set_slot_value(arena: &mut Arena, inst: ValueId, slot: SymbolId, value: ValueId) -> bool {
    match arena.get_unchecked_mut(inst) {
        Value::Instance(i) => {
            i.slots.insert(slot, value);
            true
        }
        _ => false,
    }
}

fn list_from(arena: &mut Arena, items: &[ValueId]) -> ValueId {
    let mut list = arena.alloc(Value::Null);
    for &item in items.iter().rev() {
        list = arena.alloc(Value::Cons(item, list));
    }
    list
}

fn class_name_symbol(arena: &mut Arena, symbols: &mut SymbolTable, class: ClassId) -> ValueId {
    let sym = symbols.intern(classes::class_name(class));
    arena.alloc(Value::Symbol(sym))
}

pub fn domain_error(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    object: ValueId,
    expected: ClassId,
) -> Signal {
    let expected_node = class_name_symbol(arena, symbols, expected);
    let object_slot = symbols.intern("OBJECT");
    let expected_slot = symbols.intern("EXPECTED-CLASS");
    Signal::Condition(make_instance(
        arena,
        classes::DOMAIN_ERROR,
        &[(object_slot, object), (expected_slot, expected_node)],
    ))
}

pub fn undefined_variable(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    name: ValueId,
    namespace: &str,
) -> Signal {
    let ns_sym = symbols.intern(namespace);
    let ns_node = arena.alloc(Value::Symbol(ns_sym));
    let name_slot = symbols.intern("NAME");
    let ns_slot = symbols.intern("NAMESPACE");
    Signal::Condition(make_instance(
        arena,
        classes::UNDEFINED_VARIABLE,
        &[(name_slot, name), (ns_slot, ns_node)],
    ))
}

pub fn undefined_function(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    name: ValueId,
) -> Signal {
    let ns_sym = symbols.intern("FUNCTION");
    let ns_node = arena.alloc(Value::Symbol(ns_sym));
    let name_slot = symbols.intern("NAME");
    let ns_slot = symbols.intern("NAMESPACE");
    Signal::Condition(make_instance(
        arena,
        classes::UNDEFINED_FUNCTION,
        &[(name_slot, name), (ns_slot, ns_node)],
    ))
}

pub fn arithmetic_error(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    operation: &str,
    operands: &[ValueId],
) -> Signal {
    let op_sym = symbols.intern(operation);
    let op_node = arena.alloc(Value::Symbol(op_sym));
    let operand_list = list_from(arena, operands);
    let op_slot = symbols.intern("OPERATION");
    let operands_slot = symbols.intern("OPERANDS");
    Signal::Condition(make_instance(
        arena,
        classes::ARITHMETIC_ERROR,
        &[(op_slot, op_node), (operands_slot, operand_list)],
    ))
}

pub fn parse_error(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    string: ValueId,
    expected: ClassId,
) -> Signal {
    let expected_node = class_name_symbol(arena, symbols, expected);
    let string_slot = symbols.intern("STRING");
    let expected_slot = symbols.intern("EXPECTED-CLASS");
    Signal::Condition(make_instance(
        arena,
        classes::PARSE_ERROR,
        &[(string_slot, string), (expected_slot, expected_node)],
    ))
}

fn program_error(arena: &mut Arena, symbols: &mut SymbolTable, cause: &str) -> Signal {
    let cause_sym = symbols.intern(cause);
    let cause_node = arena.alloc(Value::Symbol(cause_sym));
    let cause_slot = symbols.intern("CAUSE");
    Signal::Condition(make_instance(
        arena,
        classes::PROGRAM_ERROR,
        &[(cause_slot, cause_node)],
    ))
}

pub fn arity_error(arena: &mut Arena, symbols: &mut SymbolTable) -> Signal {
    program_error(arena, symbols, "ARITY-ERROR")
}

pub fn index_out_of_range(arena: &mut Arena, symbols: &mut SymbolTable) -> Signal {
    program_error(arena, symbols, "INDEX-OUT-OF-RANGE")
}

pub fn immutable_binding(arena: &mut Arena, symbols: &mut SymbolTable) -> Signal {
    program_error(arena, symbols, "IMMUTABLE-BINDING")
}

pub fn improper_argument_list(arena: &mut Arena, symbols: &mut SymbolTable) -> Signal {
    program_error(arena, symbols, "IMPROPER-ARGUMENT-LIST")
}

pub fn malformed_form(arena: &mut Arena, symbols: &mut SymbolTable) -> Signal {
    program_error(arena, symbols, "MALFORMED-FORM")
}

pub fn control_error(arena: &mut Arena, _symbols: &mut SymbolTable) -> Signal {
    Signal::Condition(make_instance(arena, classes::CONTROL_ERROR, &[]))
}

pub fn simple_error(
    arena: &mut Arena,
    symbols: &mut SymbolTable,
    format_string: &str,
    format_arguments: &[ValueId],
) -> Signal {
    let string_node = arena.alloc(Value::String(format_string.to_string()));
    let args_list = list_from(arena, format_arguments);
    let string_slot = symbols.intern("FORMAT-STRING");
    let args_slot = symbols.intern("FORMAT-ARGUMENTS");
    Signal::Condition(make_instance(
        arena,
        classes::SIMPLE_ERROR,
        &[(string_slot, string_node), (args_slot, args_list)],
    ))
}
