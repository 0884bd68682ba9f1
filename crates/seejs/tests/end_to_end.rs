//! Black-box program tests: the seven literal-input scenarios from
//! spec.md §8, each driven through a `print` host function that records
//! its `ToString`'d arguments for assertion -- matching the teacher's
//! style of black-box program tests (full source in, observable output
//! out) rather than poking at internal VM state.

use std::{cell::RefCell, rc::Rc};

use seejs::{Interpreter, NoLimitTracker, NoopTracer, Value};

fn new_interp_with_print() -> (Interpreter, Rc<RefCell<Vec<String>>>) {
    let mut interp = Interpreter::new(Box::new(NoLimitTracker), Box::new(NoopTracer));
    let printed = Rc::new(RefCell::new(Vec::new()));
    let sink = printed.clone();
    interp
        .install_global_function("print", 1, move |interp, _this, args| {
            let arg = args.first().cloned().unwrap_or(Value::Undefined);
            let s = arg.to_js_string(interp)?;
            sink.borrow_mut().push(s.as_str().to_string());
            Ok(Value::Undefined)
        })
        .expect("installing print never fails against a fresh heap");
    (interp, printed)
}

#[test]
fn scenario_1_for_loop_accumulator() {
    let (mut interp, printed) = new_interp_with_print();
    interp.global_eval("var x = 0; for (var i = 0; i < 3; i++) x += i; print(x);", "s1").unwrap();
    assert_eq!(*printed.borrow(), vec!["3"]);
}

#[test]
fn scenario_2_recursive_fibonacci() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval("function f(n){ if(n<2) return n; return f(n-1)+f(n-2); } print(f(10));", "s2")
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["55"]);
}

#[test]
fn scenario_3_try_catch_finally_ordering() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval(r#"try { throw {e:1}; } catch(e) { print(e.e); } finally { print("f"); } print("d");"#, "s3")
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["1", "f", "d"]);
}

#[test]
fn scenario_4_for_in_enumeration() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval(r#"var o = {a:1,b:2}; var s = ""; for (var k in o) s += k; print(s.length);"#, "s4")
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["2"]);
}

#[test]
fn scenario_5_undeclared_reference_error() {
    let (mut interp, printed) = new_interp_with_print();
    let err = interp.global_eval("print(typeof undeclared); undeclared;", "s5").unwrap_err();
    assert_eq!(*printed.borrow(), vec!["undefined"]);
    assert!(matches!(err.value, Value::Object(_)), "uncaught value should be a ReferenceError instance");
}

#[test]
fn scenario_6_with_shadows_closure_variable() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval(r#"print((function(){ var x=1; with({x:2}){ return x; } })());"#, "s6")
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["2"]);
}

#[test]
fn scenario_7_float_representation() {
    let (mut interp, printed) = new_interp_with_print();
    interp.global_eval("print(0.1 + 0.2 === 0.3); print(0.1 + 0.2);", "s7").unwrap();
    let lines = printed.borrow();
    assert_eq!(lines[0], "false");
    assert!(lines[1].starts_with("0.30000000000000004"), "got {:?}", lines[1]);
}

#[test]
fn break_continue_restore_stack_depth_across_labeled_loops() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval(
            r#"
            var out = "";
            outer: for (var i = 0; i < 3; i++) {
                for (var j = 0; j < 3; j++) {
                    if (j === 1) continue outer;
                    if (i === 2) break outer;
                    out += "" + i + j;
                }
            }
            print(out);
            "#,
            "labels",
        )
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["0010"]);
}

#[test]
fn finally_completion_overrides_pending_throw() {
    let (mut interp, printed) = new_interp_with_print();
    interp
        .global_eval(
            r#"
            function f() {
                try {
                    throw "boom";
                } finally {
                    return "saved";
                }
            }
            print(f());
            "#,
            "finally-override",
        )
        .unwrap();
    assert_eq!(*printed.borrow(), vec!["saved"]);
}
