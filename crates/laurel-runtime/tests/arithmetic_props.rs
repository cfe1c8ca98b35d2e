//! arithmetic_props.rs — the VM's arithmetic matches host IEEE-754 doubles
//!
//! Operands are injected through natives (not source literals) so the test
//! exercises the VM's arithmetic exactly, bit for bit, including infinities
//! and NaN propagation.

use std::cell::RefCell;
use std::rc::Rc;

use laurel_runtime::{Laurel, Value};
use proptest::prelude::*;

/// Evaluate `lhs <op> rhs` inside the VM and hand back the numeric result
fn vm_binary_op(op: &str, lhs: f64, rhs: f64) -> f64 {
    let result: Rc<RefCell<Option<f64>>> = Rc::new(RefCell::new(None));

    let mut laurel = Laurel::new();
    laurel.define_native("lhs", 0, move |_| Ok(Value::Number(lhs)));
    laurel.define_native("rhs", 0, move |_| Ok(Value::Number(rhs)));
    let sink = result.clone();
    laurel.define_native("record", 1, move |args| {
        match args[0] {
            Value::Number(n) => *sink.borrow_mut() = Some(n),
            _ => return Err("record expects a number".to_string()),
        }
        Ok(Value::Nil)
    });

    laurel
        .interpret(&format!("record(lhs() {op} rhs());"))
        .expect("arithmetic programs never fail at runtime");

    let value = result.borrow().expect("record was called");
    value
}

proptest! {
    #[test]
    fn addition_matches_host_doubles(a in any::<f64>(), b in any::<f64>()) {
        prop_assert_eq!(vm_binary_op("+", a, b).to_bits(), (a + b).to_bits());
    }

    #[test]
    fn subtraction_matches_host_doubles(a in any::<f64>(), b in any::<f64>()) {
        prop_assert_eq!(vm_binary_op("-", a, b).to_bits(), (a - b).to_bits());
    }

    #[test]
    fn multiplication_matches_host_doubles(a in any::<f64>(), b in any::<f64>()) {
        prop_assert_eq!(vm_binary_op("*", a, b).to_bits(), (a * b).to_bits());
    }

    #[test]
    fn division_matches_host_doubles(a in any::<f64>(), b in any::<f64>()) {
        // Includes division by zero: the VM produces IEEE infinities and
        // NaNs, not errors
        prop_assert_eq!(vm_binary_op("/", a, b).to_bits(), (a / b).to_bits());
    }

    #[test]
    fn comparisons_match_host_doubles(a in any::<f64>(), b in any::<f64>()) {
        let result: Rc<RefCell<Option<bool>>> = Rc::new(RefCell::new(None));

        let mut laurel = Laurel::new();
        laurel.define_native("lhs", 0, move |_| Ok(Value::Number(a)));
        laurel.define_native("rhs", 0, move |_| Ok(Value::Number(b)));
        let sink = result.clone();
        laurel.define_native("record", 1, move |args| {
            match args[0] {
                Value::Bool(flag) => *sink.borrow_mut() = Some(flag),
                _ => return Err("record expects a boolean".to_string()),
            }
            Ok(Value::Nil)
        });

        laurel
            .interpret("record(lhs() < rhs());")
            .expect("comparison programs never fail at runtime");

        prop_assert_eq!(result.borrow().expect("record was called"), a < b);
    }
}
