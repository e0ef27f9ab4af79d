use inkwell::context::Context;
use tarn_codegen::{host_triple, Codegen, CompileError};
use tarn_ssa::{
    BinOp, Builtin, Callee, Const, Field, Function, FunctionBuilder, Package, Parameter, Program,
    Type, UnOp, Value,
};

fn new_codegen<'ctx>(context: &'ctx Context, name: &str) -> Codegen<'ctx> {
    Codegen::new(context, name, &host_triple()).expect("host target is available")
}

fn single_package_program(package: Package) -> Program {
    let mut program = Program::new();
    program.add_package(package);
    program
}

fn main_package() -> Package {
    Package::new("example.org/hello", "main")
}

/// IR of the module, narrowed to the body of one function definition.
fn function_body(ir: &str, name: &str) -> String {
    let needle = format!("@{}(", name);
    let start = ir.find(&needle).unwrap_or_else(|| panic!("no define for {}", name));
    let end = ir[start..].find("\n}").map(|e| start + e).unwrap_or(ir.len());
    ir[start..end].to_string()
}

#[test]
fn hello_calls_print_string_and_newline() {
    let mut func = FunctionBuilder::new("main");
    func.call(Callee::Builtin(Builtin::Println), vec![Value::str("hello")]);
    func.ret(vec![]);

    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);
    assert!(program.validate().is_ok());

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let main_fn = codegen.module.get_function("main.main").unwrap();
    assert_eq!(main_fn.count_basic_blocks(), 1);
    assert_eq!(main_fn.count_params(), 0);

    let body = function_body(&codegen.ir(), "main.main");
    assert!(body.contains("print_string"));
    assert!(body.contains("print_newline"));

    // The literal lives in a private byte-array global and the record
    // leads with its length.
    let ir = codegen.ir();
    assert!(ir.contains("hello"));
    assert!(ir.contains("private"));
    assert!(ir.contains("i32 5"));
}

#[test]
fn add_lowers_to_a_single_block_of_i32_math() {
    let mut func = FunctionBuilder::new("add");
    let a = func.param("a", Type::Int);
    let b = func.param("b", Type::Int);
    func.returns(Type::Int);
    let sum = func.binop(BinOp::Add, a, b);
    func.ret(vec![sum]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let add_fn = codegen.module.get_function("pkg.add").unwrap();
    assert_eq!(add_fn.count_params(), 2);
    assert_eq!(add_fn.count_basic_blocks(), 1);

    let body = function_body(&codegen.ir(), "pkg.add");
    assert!(body.contains("add i32"));
    assert!(body.contains("ret i32"));
}

#[test]
fn abs_branches_on_a_signed_compare() {
    let mut func = FunctionBuilder::new("abs");
    let x = func.param("x", Type::Int);
    func.returns(Type::Int);
    let negate = func.create_block("if.then");
    let done = func.create_block("if.done");

    let cond = func.binop(BinOp::Lt, x.clone(), Value::int(0));
    func.branch(cond, negate, done);
    func.switch_to_block(negate).unwrap();
    let negated = func.binop(BinOp::Sub, Value::int(0), x.clone());
    func.ret(vec![negated]);
    func.switch_to_block(done).unwrap();
    func.ret(vec![x]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let abs_fn = codegen.module.get_function("pkg.abs").unwrap();
    assert_eq!(abs_fn.count_basic_blocks(), 3);

    let body = function_body(&codegen.ir(), "pkg.abs");
    assert!(body.contains("icmp slt i32"));
    assert!(body.contains("br i1"));
    assert_eq!(body.matches("ret i32").count(), 2);
}

#[test]
fn loop_phis_pick_up_both_incoming_edges() {
    let mut func = FunctionBuilder::new("sum");
    let n = func.param("n", Type::Int);
    func.returns(Type::Int);
    let header = func.create_block("for.loop");
    let latch = func.create_block("for.body");
    let exit = func.create_block("for.done");

    func.jump(header);

    func.switch_to_block(header).unwrap();
    let s = func.phi(Type::Int, vec![]);
    let i = func.phi(Type::Int, vec![]);
    let cond = func.binop(BinOp::Lt, i.clone(), n);
    func.branch(cond, latch, exit);

    func.switch_to_block(latch).unwrap();
    let s_next = func.binop(BinOp::Add, s.clone(), i.clone());
    let i_next = func.binop(BinOp::Add, i.clone(), Value::int(1));
    func.jump(header);

    // Header predecessors are [entry, latch], in that order.
    func.set_phi_edges(&s, vec![Value::int(0), s_next]);
    func.set_phi_edges(&i, vec![Value::int(0), i_next]);

    func.switch_to_block(exit).unwrap();
    func.ret(vec![s]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);
    assert!(program.validate().is_ok());

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();

    // The verifier checks that every phi's incoming blocks are exactly the
    // block's predecessors, which is the property at stake here.
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.sum");
    assert_eq!(body.matches("phi i32").count(), 2);
    assert!(body.contains("for.body"));
}

#[test]
fn field_store_goes_through_a_struct_gep() {
    let point = Type::named(
        "P",
        Type::Struct(vec![
            Field::new("x", Type::Int),
            Field::new("y", Type::Int),
        ]),
    );

    let mut func = FunctionBuilder::new("setx");
    let p = func.alloc(point.clone(), false, "p");
    let addr = func.field_addr(p, point, 0);
    func.store(addr, Value::int(7));
    func.ret(vec![]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.setx");
    assert!(body.contains("alloca"));
    assert!(body.contains("getelementptr"));
    assert!(body.contains("store i32 7"));
}

#[test]
fn print_mix_emits_runtime_calls_in_argument_order() {
    let mut func = FunctionBuilder::new("main");
    func.call(
        Callee::Builtin(Builtin::Println),
        vec![Value::str("n="), Value::int(42)],
    );
    func.ret(vec![]);

    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "main.main");
    let string_at = body.find("print_string").unwrap();
    let space_at = body.find("print_space").unwrap();
    let int_at = body.find("print_int").unwrap();
    let newline_at = body.find("print_newline").unwrap();
    assert!(string_at < space_at);
    assert!(space_at < int_at);
    assert!(int_at < newline_at);
}

#[test]
fn heap_alloc_calls_malloc_even_unoptimized() {
    let mut func = FunctionBuilder::new("spawn");
    let p = func.alloc(Type::Int, true, "n");
    func.store(p, Value::int(1));
    func.ret(vec![]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();
    codegen.optimize(0);
    codegen.verify().unwrap();

    assert!(codegen.ir().contains("malloc"));
}

#[test]
fn block_with_only_a_terminator_is_allowed() {
    let mut func = FunctionBuilder::new("hop");
    let exit = func.create_block("done");
    func.jump(exit);
    func.switch_to_block(exit).unwrap();
    func.ret(vec![]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let hop_fn = codegen.module.get_function("pkg.hop").unwrap();
    assert_eq!(hop_fn.count_basic_blocks(), 2);
    let entry = hop_fn.get_first_basic_block().unwrap();
    let first = entry.get_first_instruction().unwrap();
    assert_eq!(Some(first), entry.get_last_instruction());
}

#[test]
fn forward_references_resolve_across_packages() {
    // main calls util/math.double, which is declared in a later package.
    let mut main_fn = FunctionBuilder::new("main");
    let doubled = main_fn.call(
        Callee::Function("util/math.double".into()),
        vec![Value::int(21)],
    );
    main_fn.call(Callee::Builtin(Builtin::Println), vec![doubled]);
    main_fn.ret(vec![]);
    let mut main_pkg = main_package();
    main_pkg.add_function(main_fn.build());

    let mut double = FunctionBuilder::new("double");
    let x = double.param("x", Type::Int);
    double.returns(Type::Int);
    let two = double.binop(BinOp::Add, x.clone(), x);
    double.ret(vec![two]);
    let mut math_pkg = Package::new("util/math", "math");
    math_pkg.add_function(double.build());

    let mut program = Program::new();
    program.add_package(main_pkg);
    program.add_package(math_pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    assert!(codegen.module.get_function("util/math.double").is_some());
    assert!(function_body(&codegen.ir(), "main.main").contains("call"));
}

#[test]
fn forward_references_resolve_within_a_package() {
    // "alpha" sorts before "zeta" but calls it.
    let mut alpha = FunctionBuilder::new("alpha");
    alpha.returns(Type::Int);
    let v = alpha.call(Callee::Function("zeta".into()), vec![]);
    alpha.ret(vec![v]);

    let mut zeta = FunctionBuilder::new("zeta");
    zeta.returns(Type::Int);
    zeta.ret(vec![Value::int(9)]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(alpha.build());
    pkg.add_function(zeta.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();
}

#[test]
fn member_order_in_source_does_not_change_the_ir() {
    let build = |reversed: bool| {
        let mut pkg = Package::new("pkg", "pkg");
        let mut names = vec!["alpha", "beta", "gamma"];
        if reversed {
            names.reverse();
        }
        for name in names {
            pkg.add_named_const(name, Const::Int(name.len() as i64));
        }
        pkg.add_global("state", Type::Int);

        let program = single_package_program(pkg);
        let context = Context::create();
        let codegen = new_codegen(&context, "pkg");
        codegen.compile_program(&program).unwrap();
        codegen.ir()
    };

    assert_eq!(build(false), build(true));
}

#[test]
fn exported_members_get_private_linkage() {
    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_named_const("Answer", Const::Int(42));
    pkg.add_named_const("answer", Const::Int(42));
    pkg.add_global("Counter", Type::Int);
    pkg.add_global("counter", Type::Int);
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();

    let ir = codegen.ir();
    assert!(ir.contains("@pkg.Answer = private constant i32 42"));
    assert!(ir.contains("@pkg.answer = constant i32 42"));
    assert!(ir.contains("@pkg.Counter = private global"));
    assert!(ir.contains("@pkg.counter = external global"));
}

#[test]
fn external_functions_stay_declarations() {
    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(Function::declaration(
        "syscall",
        vec![Parameter::new("code", Type::Int)],
        vec![Type::Int],
    ));
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let declared = codegen.module.get_function("pkg.syscall").unwrap();
    assert_eq!(declared.count_basic_blocks(), 0);
}

#[test]
fn verify_and_optimize_zero_are_idempotent() {
    let mut func = FunctionBuilder::new("main");
    func.ret(vec![]);
    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    codegen.compile_program(&program).unwrap();

    codegen.verify().unwrap();
    codegen.verify().unwrap();
    codegen.optimize(0);
    codegen.verify().unwrap();
}

#[test]
fn emit_object_writes_a_nonempty_file() {
    let mut func = FunctionBuilder::new("main");
    func.ret(vec![]);
    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let path = std::env::temp_dir().join("tarn_emit_object_test.o");
    codegen.emit_object(&path).unwrap();
    let metadata = std::fs::metadata(&path).unwrap();
    assert!(metadata.len() > 0);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn deref_lowers_to_a_typed_load() {

    let mut func = FunctionBuilder::new("roundtrip");
    func.returns(Type::Int);
    let slot = func.alloc(Type::Int, false, "slot");
    func.store(slot.clone(), Value::int(11));
    let loaded = func.unop(UnOp::Load, slot, Type::Int);
    func.ret(vec![loaded]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.roundtrip");
    assert!(body.contains("load i32"));
    assert!(body.contains("store i32 11"));
}

#[test]
fn globals_resolve_by_qualified_name() {

    let mut func = FunctionBuilder::new("bump");
    let old = func.unop(UnOp::Load, Value::Global("counter".into()), Type::Int);
    let new = func.binop(BinOp::Add, old, Value::int(1));
    func.store(Value::Global("counter".into()), new);
    func.ret(vec![]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_global("counter", Type::Int);
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.bump");
    assert!(body.contains("@pkg.counter"));
    assert!(body.contains("load i32"));
}

#[test]
fn integer_operators_pick_the_signed_forms() {
    let mut func = FunctionBuilder::new("mix");
    let a = func.param("a", Type::Int);
    let b = func.param("b", Type::Int);
    func.returns(Type::Int);

    let q = func.binop(BinOp::Div, a.clone(), b.clone());
    let r = func.binop(BinOp::Rem, q, b.clone());
    let s = func.binop(BinOp::Shr, r, b.clone());
    let masked = func.binop(BinOp::AndNot, s, b);
    func.ret(vec![masked]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.mix");
    assert!(body.contains("sdiv i32"));
    assert!(body.contains("srem i32"));
    assert!(body.contains("ashr i32"));
    // x &^ y comes out as and(x, not(y)).
    assert!(body.contains("xor i32"));
    assert!(body.contains("and i32"));
}

#[test]
fn bool_not_stays_one_bit() {

    let mut func = FunctionBuilder::new("invert");
    let flag = func.param("flag", Type::Bool);
    func.returns(Type::Bool);
    let inverted = func.unop(UnOp::Not, flag, Type::Bool);
    func.ret(vec![inverted]);

    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    codegen.compile_program(&program).unwrap();
    codegen.verify().unwrap();

    let body = function_body(&codegen.ir(), "pkg.invert");
    assert!(body.contains("xor i1"));
    assert!(body.contains("ret i1"));
}

#[test]
fn slice_types_are_rejected() {
    let mut func = FunctionBuilder::new("f");
    func.param("xs", Type::Slice(Box::new(Type::Int)));
    func.ret(vec![]);
    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    let err = codegen.compile_program(&program).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedType(_)));
}

#[test]
fn tuple_returns_are_rejected() {
    let mut func = FunctionBuilder::new("pair");
    func.returns(Type::Int);
    func.returns(Type::Int);
    func.ret(vec![Value::int(1), Value::int(2)]);
    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    let err = codegen.compile_program(&program).unwrap_err();
    assert!(matches!(err, CompileError::MultipleReturns));
}

#[test]
fn calls_to_unknown_functions_are_rejected() {
    let mut func = FunctionBuilder::new("main");
    func.call(Callee::Function("missing".into()), vec![]);
    func.ret(vec![]);
    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    let err = codegen.compile_program(&program).unwrap_err();
    let CompileError::UndefinedFunction(name) = err else {
        panic!("wanted an undefined-function error");
    };
    assert_eq!(name, "main.missing");
}

#[test]
fn float_constants_are_rejected() {
    let mut pkg = Package::new("pkg", "pkg");
    pkg.add_named_const("pi", Const::Float(3.14));
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "pkg");
    let err = codegen.compile_program(&program).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedConst(_)));
}

#[test]
fn printing_a_pointer_is_rejected() {
    let mut func = FunctionBuilder::new("main");
    let p = func.alloc(Type::Int, false, "p");
    func.call(Callee::Builtin(Builtin::Print), vec![p]);
    func.ret(vec![]);
    let mut pkg = main_package();
    pkg.add_function(func.build());
    let program = single_package_program(pkg);

    let context = Context::create();
    let codegen = new_codegen(&context, "main");
    let err = codegen.compile_program(&program).unwrap_err();
    assert!(matches!(err, CompileError::UnsupportedPrintArg(_)));
}
