//! Property-based tests for argument register assignment.
//!
//! Register-resident parameters of each class take that class's registers
//! in declaration order; stack parameters never consume a register.

use proptest::prelude::*;

use irlift_analysis::bind_parameters;
use irlift_core::{CallingConventionInfo, StaticFunction, StaticHost, TypeDescriptor, Variable};
use irlift_types::{Storage, TypeNormalizer};

#[derive(Debug, Clone, Copy)]
enum Param {
    Int,
    Pointer,
    Float,
    Stack(i64),
}

fn arb_param() -> impl Strategy<Value = Param> {
    prop_oneof![
        Just(Param::Int),
        Just(Param::Pointer),
        Just(Param::Float),
        (0i64..64).prop_map(|slot| Param::Stack(slot * 8)),
    ]
}

fn convention() -> CallingConventionInfo {
    CallingConventionInfo::new(
        "test",
        &["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"],
        &["f0", "f1", "f2", "f3", "f4", "f5", "f6", "f7"],
    )
}

fn variable(i: usize, param: Param) -> Variable {
    let name = format!("arg{}", i);
    match param {
        Param::Int => Variable::register(&name, i as i64, TypeDescriptor::int(4, true)),
        Param::Pointer => Variable::register(
            &name,
            i as i64,
            TypeDescriptor::pointer(TypeDescriptor::int(1, false), 8),
        ),
        Param::Float => Variable::register(&name, i as i64, TypeDescriptor::float(8)),
        Param::Stack(offset) => Variable::stack(&name, offset, TypeDescriptor::int(8, true)),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn registers_assigned_in_declaration_order(params in prop::collection::vec(arb_param(), 0..8)) {
        let func = params
            .iter()
            .enumerate()
            .fold(
                StaticFunction::new("f", 0x1000).with_calling_convention(convention()),
                |func, (i, param)| func.with_parameter(variable(i, *param)),
            );

        let host = StaticHost::linux_x86_64();
        let mut types = TypeNormalizer::new(8);
        let locations = bind_parameters(&host, &func, &mut types).unwrap();
        prop_assert_eq!(locations.len(), params.len());

        let (mut ints, mut floats) = (0, 0);
        for (param, location) in params.iter().zip(&locations) {
            let expected = match param {
                Param::Int | Param::Pointer => {
                    ints += 1;
                    Storage::Register { name: format!("R{}", ints - 1) }
                }
                Param::Float => {
                    floats += 1;
                    Storage::Register { name: format!("F{}", floats - 1) }
                }
                Param::Stack(offset) => Storage::Memory { base: "RSP".to_string(), offset: *offset },
            };
            prop_assert_eq!(&location.storage, &expected);
        }
    }
}
