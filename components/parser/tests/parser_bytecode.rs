//! Parser to Byte Code Integration Tests
//!
//! Tests the integration between the parser and the cbc components.
//! Verifies that JavaScript source code compiles into the expected
//! instruction streams and compiled-code headers.

use cbc::disasm;
use cbc::{status_flags, CompiledCode, Value};
use parser::{parse, SourceKind};

fn compile(source: &str) -> CompiledCode {
    parse(source, SourceKind::Global).expect(source)
}

fn compile_function_body(source: &str) -> CompiledCode {
    parse(source, SourceKind::FunctionBody).expect(source)
}

fn names(code: &CompiledCode) -> Vec<&'static str> {
    disasm::opcode_names(code).unwrap()
}

/// Test: a var initializer fuses the identifier push into the
/// assignment instruction.
#[test]
fn test_var_assignment_fusion() {
    let code = compile_function_body("var x = 1 + 2;");
    assert_eq!(
        names(&code),
        vec!["AddTwoLiterals", "AssignIdent", "ReturnWithUndefined"]
    );
    // The identifier and both numbers are literals; numbers are not
    // deduplicated.
    assert!(code.literal_end >= 3);
    assert!(!names(&code).iter().any(|name| name.contains("Branch")));
}

/// Test: an empty while loop with a constant true condition reduces to
/// a bare backward jump.
#[test]
fn test_while_true_constant_fold() {
    let code = compile("while(true){}");
    let instructions = disasm::decode(&code).unwrap();

    assert_eq!(instructions[0].opcode.name(), "JumpForward2");
    assert_eq!(instructions[1].opcode.name(), "JumpBackward");
    assert_eq!(
        instructions[0].branch_target(),
        Some(instructions[1].offset)
    );
}

/// Test: if/else produces one conditional forward branch over the then
/// part and one unconditional jump over the else part.
#[test]
fn test_if_else_branch_shape() {
    let code = compile_function_body("if(a)b;else c;");
    let instructions = disasm::decode(&code).unwrap();

    let conditional: Vec<_> = instructions
        .iter()
        .filter(|i| i.opcode.name() == "BranchIfFalseForward2")
        .collect();
    let unconditional: Vec<_> = instructions
        .iter()
        .filter(|i| i.opcode.name() == "JumpForward2")
        .collect();

    assert_eq!(conditional.len(), 1);
    assert_eq!(unconditional.len(), 1);

    // The conditional branch lands behind the unconditional jump.
    assert!(conditional[0].branch_target().unwrap() > unconditional[0].offset);
    // The jump lands at the end of the else part.
    assert_eq!(
        unconditional[0].branch_target(),
        Some(instructions.last().unwrap().offset)
    );
}

/// Test: a break inside a for loop is patched to just after the back
/// edge of the update block.
#[test]
fn test_for_break_resolution() {
    let code = compile("for(var i=0;i<3;i++)break;");
    let instructions = disasm::decode(&code).unwrap();

    let back_edge = instructions
        .iter()
        .find(|i| i.opcode.name() == "BranchIfTrueBackward")
        .unwrap();
    let loop_end = back_edge.offset + 2;

    let break_jump = instructions
        .iter()
        .filter(|i| i.opcode.name() == "JumpForward2")
        .find(|i| i.branch_target() == Some(loop_end))
        .expect("break branch targeting the loop end");
    assert!(break_jump.offset < back_edge.offset);
}

/// Test: try/catch/finally emits its context opcodes in order.
#[test]
fn test_try_catch_finally_opcode_order() {
    let code = compile("try{}catch(e){}finally{}");
    assert_eq!(
        names(&code),
        vec![
            "TryCreateContext2",
            "Catch2",
            "AssignIdent",
            "Finally2",
            "ContextEnd",
            "ReturnWithUndefined"
        ]
    );
}

/// Test: switch with one case and a default patches every branch into
/// the body and the break to the end.
#[test]
fn test_switch_branch_resolution() {
    let code = compile("switch(x){case 1:break;default:}");
    let instructions = disasm::decode(&code).unwrap();
    let instruction_names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();

    // The last case compares without duplicating the value.
    assert!(instruction_names.contains(&"StrictEqual"));
    assert!(instruction_names.contains(&"BranchIfTrueForward2"));

    let end = instructions.last().unwrap().offset;
    let jumps: Vec<_> = instructions
        .iter()
        .filter(|i| i.opcode.name() == "JumpForward2")
        .collect();
    // Default branch and break branch both land after the switch.
    assert_eq!(jumps.len(), 2);
    assert!(jumps.iter().all(|j| j.branch_target() == Some(end)));
}

/// Test: every forward branch of a successful parse is patched (no
/// zero placeholders remain) and every branch lands on an instruction
/// start.
#[test]
fn test_branches_resolve_to_instruction_starts() {
    let sources = [
        "if (a) { if (b) c; } else { while (d) break; }",
        "x: for (i = 0; i < 9; i++) { y: for (j in o) { continue x; } break; }",
        "switch (v) { case 1: a; case 2: break; default: b; }",
        "try { a(); } catch (e) { b(); } finally { c(); }",
        "r = a && b || !c ? d[e] : f.g(h, i);",
        "do { with (o) { p; } } while (q);",
    ];

    for source in sources {
        let code = compile(source);
        let instructions = disasm::decode(&code).unwrap();
        let starts: Vec<usize> = instructions.iter().map(|i| i.offset).collect();
        let end = code.code.len();

        for instr in &instructions {
            let Some(displacement) = instr.branch_offset else {
                continue;
            };
            if instr.opcode.is_forward_branch() {
                assert!(displacement > 0, "unpatched branch in {:?}", source);
            }
            let target = instr.branch_target().unwrap();
            assert!(
                starts.contains(&target) || target == end,
                "branch into the middle of an instruction in {:?}",
                source
            );
        }
    }
}

/// Test: every backward displacement equals the emitting position
/// minus the recorded loop start.
#[test]
fn test_backward_displacement_equation() {
    let code = compile("do { a; } while (b);");
    let instructions = disasm::decode(&code).unwrap();
    let back_edge = instructions
        .iter()
        .find(|i| i.opcode.name() == "BranchIfTrueBackward")
        .unwrap();
    // The loop starts at offset zero here.
    assert_eq!(back_edge.branch_offset, Some(back_edge.offset as u32));
    assert_eq!(back_edge.branch_target(), Some(0));
}

/// Test: the compiled-code header carries the literal index groups.
#[test]
fn test_literal_index_groups() {
    let code = compile("function f(p, q) { var r; return p + q + r + s; }");
    let function = code
        .literals
        .iter()
        .find_map(|value| value.as_function())
        .unwrap();

    assert_eq!(function.argument_end, 2);
    // r is register-stored; s is a free identifier.
    assert_eq!(function.register_end, 3);
    assert_eq!(function.ident_end, 4);
    assert_eq!(function.literal_end as usize, function.literals.len());
    assert!(function.status_flags & status_flags::FUNCTION != 0);
}

/// Test: a direct eval call poisons register storage for the whole
/// function.
#[test]
fn test_eval_disables_registers() {
    let code = compile("function f() { var x; eval('1'); }");
    let function = code
        .literals
        .iter()
        .find_map(|value| value.as_function())
        .unwrap();

    assert_eq!(function.register_end, 0);
    let instruction_names = disasm::opcode_names(function).unwrap();
    assert!(instruction_names.contains(&"DefineVars"));
    assert!(instruction_names.contains(&"CallEvalPushResult"));
}

/// Test: string literal values are decoded into the literal pool.
#[test]
fn test_string_literal_values() {
    let code = compile_function_body("var s = '\\u0041\\tb';");
    assert!(code
        .literals
        .iter()
        .any(|value| matches!(value, Value::String(bytes) if bytes == b"A\tb")));
}

/// Test: regexp literals keep their delimiters and flags.
#[test]
fn test_regexp_literal_value() {
    let code = compile_function_body("var r = /ab+c/gi;");
    assert!(code
        .literals
        .iter()
        .any(|value| matches!(value, Value::Regexp(bytes) if bytes == b"/ab+c/gi")));
}

/// Test: object and array literal construction opcodes.
#[test]
fn test_object_and_array_literals() {
    let code = compile("x = { a: 1, 'b': 2 };");
    let instruction_names = names(&code);
    assert!(instruction_names.contains(&"CreateObject"));
    assert_eq!(
        instruction_names
            .iter()
            .filter(|name| **name == "SetProperty")
            .count(),
        2
    );

    let code = compile("y = [1, , 2];");
    let instructions = disasm::decode(&code).unwrap();
    let append = instructions
        .iter()
        .find(|i| i.opcode.name() == "ArrayAppend")
        .unwrap();
    assert_eq!(append.byte_arg, Some(3));
    assert!(instructions.iter().any(|i| i.opcode.name() == "PushElision"));
}

/// Test: getters and setters compile into set-accessor instructions.
#[test]
fn test_getter_setter_emission() {
    let code = compile("x = { get p() { return 1; }, set p(v) {} };");
    let instruction_names = names(&code);
    assert!(instruction_names.contains(&"SetGetter"));
    assert!(instruction_names.contains(&"SetSetter"));

    let getter = code
        .literals
        .iter()
        .find_map(|value| value.as_function())
        .unwrap();
    assert!(getter.status_flags & status_flags::PROPERTY_GETTER != 0);
}

/// Test: new expressions with and without argument lists.
#[test]
fn test_new_expressions() {
    let instructions = disasm::decode(&compile("x = new F(1, 2);")).unwrap();
    let new_instr = instructions
        .iter()
        .find(|i| i.opcode.name() == "NewIdent")
        .unwrap();
    assert_eq!(new_instr.byte_arg, Some(2));

    let instructions = disasm::decode(&compile("x = new F;")).unwrap();
    let new_instr = instructions
        .iter()
        .find(|i| i.opcode.name() == "NewIdent")
        .unwrap();
    assert_eq!(new_instr.byte_arg, Some(0));
}

/// Test: the conditional operator emits both branches and keeps only
/// one result.
#[test]
fn test_conditional_expression() {
    let code = compile("x = a ? b : c;");
    assert_eq!(
        names(&code),
        vec![
            "PushIdent",
            "BranchIfFalseForward2",
            "PushIdent",
            "JumpForward2",
            "PushIdent",
            "AssignIdentPushResult",
            "PopBlock",
            "ReturnWithUndefined"
        ]
    );
}

/// Test: the dump renders offsets, names and operands.
#[test]
fn test_dump_renders() {
    let code = compile_function_body("var x = 42;");
    let text = disasm::dump(&code).unwrap();
    assert!(text.contains("AssignIdent"));
    assert!(text.contains("number(42)"));
    assert!(text.contains("Argument range end: 0"));
}
