//! End-to-end tests: build IR trees by hand, run them through a
//! session, and check the resulting boot descriptor.

use dtforge::{
    Error, IrKind, MarkerKind, MemBlobSource, NodeId, NvList, Session, SessionConfig, SrcPos,
};

fn pos() -> SrcPos {
    SrcPos::new("test.dts", 1)
}

fn prop_def(s: &mut Session, name: NodeId, value: Option<NodeId>) -> NodeId {
    let prop = s.arena.alloc(IrKind::PropDef, &pos());
    s.arena[prop].name = Some(name);
    s.arena[prop].expr1 = value;
    prop
}

fn named_prop(s: &mut Session, name: &str, value: Option<NodeId>) -> NodeId {
    let n = s.arena.prop_node_name(name, &pos());
    prop_def(s, n, value)
}

fn node(s: &mut Session, name: &str, stmts: &[NodeId]) -> NodeId {
    let n = s.arena.alloc(IrKind::Node, &pos());
    let nm = s.arena.prop_node_name(name, &pos());
    s.arena[n].name = Some(nm);
    let mut list = None;
    for &st in stmts {
        list = s.arena.list_append(list, Some(st));
    }
    s.arena[n].statements = list;
    n
}

fn root(s: &mut Session, decls: &[NodeId], top: NodeId) -> NodeId {
    let r = s.arena.alloc(IrKind::Root, &pos());
    let mut list = None;
    for &d in decls {
        list = s.arena.list_append(list, Some(d));
    }
    s.arena[r].declarations = list;
    s.arena[r].statements = Some(top);
    r
}

fn const_def(s: &mut Session, name: &str, value_text: &str) -> NodeId {
    let c = s.arena.alloc(IrKind::ConstDef, &pos());
    s.arena[c].text = Some(name.to_string());
    let v = s.arena.literal(value_text, &pos());
    s.arena[c].expr1 = Some(v);
    c
}

fn func_def(s: &mut Session, name: &str, params: &[&str], body: &[NodeId]) -> NodeId {
    let f = s.arena.alloc(IrKind::FuncDef, &pos());
    s.arena[f].text = Some(name.to_string());
    let mut plist = None;
    for &param in params {
        let pd = s.arena.alloc(IrKind::ParamDecl, &pos());
        s.arena[pd].text = Some(param.to_string());
        plist = s.arena.list_append(plist, Some(pd));
    }
    s.arena[f].declarations = plist;
    let mut blist = None;
    for &st in body {
        blist = s.arena.list_append(blist, Some(st));
    }
    s.arena[f].statements = blist;
    f
}

fn func_call(s: &mut Session, name: &str, args: &[NodeId]) -> NodeId {
    let call = s.arena.alloc(IrKind::FuncCall, &pos());
    let callee = s.arena.id(name, &pos());
    s.arena[call].name = Some(callee);
    let mut alist = None;
    for &a in args {
        alist = s.arena.list_append(alist, Some(a));
    }
    s.arena[call].expr1 = alist;
    call
}

#[test]
fn test_for_loop_emits_numbered_cell_properties() {
    let mut s = Session::new();

    // /const/ N = 3;
    // / { for i in 0 .. N - 1 { ("p" % i) = cell(i); } };
    let cdef = const_def(&mut s, "N", "3");

    let start = s.arena.literal("0", &pos());
    let n_ref = s.arena.id("N", &pos());
    let one = s.arena.literal("1", &pos());
    let stop = s.arena.binop(IrKind::Sub, Some(n_ref), Some(one), &pos());
    let range = s.arena.binop(IrKind::Range, Some(start), Some(stop), &pos());

    let prefix = s.arena.lit_str("p", &pos());
    let i_name = s.arena.id("i", &pos());
    let pname = s.arena.binop(IrKind::Mod, Some(prefix), Some(i_name), &pos());
    let i_val = s.arena.id("i", &pos());
    let value = s.arena.unop(IrKind::Cell, Some(i_val), &pos());
    let prop = prop_def(&mut s, pname, Some(value));

    let floop = s.arena.alloc(IrKind::For, &pos());
    s.arena[floop].text = Some("i".to_string());
    s.arena[floop].expr1 = Some(range);
    s.arena[floop].statements = s.arena.list_append(None, Some(prop));

    let top = node(&mut s, "/", &[floop]);
    let r = root(&mut s, &[cdef], top);

    let boot = s.process(r).unwrap();
    let top = boot.root.unwrap();

    assert_eq!(top.properties.len(), 3);
    for (i, p) in top.properties.iter().enumerate() {
        assert_eq!(p.name, format!("p{}", i));
        assert_eq!(p.value.bytes, (i as u32).to_be_bytes());
    }
}

#[test]
fn test_nested_nodes_and_phandle_marker() {
    let mut s = Session::new();

    let phandle = s.arena.alloc(IrKind::RefPhandle, &pos());
    s.arena[phandle].label_name = Some("PIC".to_string());
    let intc = named_prop(&mut s, "interrupt-parent", Some(phandle));

    let serial = node(&mut s, "serial@4500", &[intc]);
    let soc = node(&mut s, "soc", &[serial]);
    s.arena[soc].label_name = Some("SOC".to_string());

    let top = node(&mut s, "/", &[soc]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let top = boot.root.unwrap();

    let soc = top.child("soc").unwrap();
    assert_eq!(soc.label.as_deref(), Some("SOC"));

    let serial = soc.child("serial@4500").unwrap();
    let p = serial.property("interrupt-parent").unwrap();
    assert_eq!(p.value.bytes, 0xffff_ffffu32.to_be_bytes());
    assert_eq!(p.value.markers.len(), 1);
    assert_eq!(p.value.markers[0].kind, MarkerKind::RefPhandle);
    assert_eq!(p.value.markers[0].label, "PIC");
    assert_eq!(p.value.markers[0].offset, 0);
}

#[test]
fn test_list_value_flattens_string_then_byte() {
    let mut s = Session::new();

    let str_v = s.arena.lit_str("ab", &pos());
    let byte_v = s.arena.lit_byte(1, &pos());
    let list = s.arena.list_append(None, Some(str_v));
    let list = s.arena.list_append(list, Some(byte_v));
    let prop = named_prop(&mut s, "mixed", list);

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let p = boot.root.unwrap().properties.remove(0);
    assert_eq!(p.value.bytes, b"ab\0\x01");
}

#[test]
fn test_property_label_from_expression() {
    let mut s = Session::new();

    // ("lbl" % 7): reg = cell(1);
    let prefix = s.arena.lit_str("lbl", &pos());
    let n = s.arena.literal("7", &pos());
    let label = s.arena.binop(IrKind::Mod, Some(prefix), Some(n), &pos());
    let one = s.arena.literal("1", &pos());
    let value = s.arena.unop(IrKind::Cell, Some(one), &pos());
    let prop = named_prop(&mut s, "reg", Some(value));
    s.arena[prop].label = Some(label);

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let p = boot.root.unwrap().properties.remove(0);
    assert_eq!(p.label.as_deref(), Some("lbl7"));
}

#[test]
fn test_mem_reserve_declarations() {
    let mut s = Session::new();

    let base = const_def(&mut s, "base", "0x1000");
    let rsv = s.arena.alloc(IrKind::MemReserve, &pos());
    let addr = s.arena.id("base", &pos());
    let size = s.arena.literal("0x40", &pos());
    s.arena[rsv].expr1 = Some(addr);
    s.arena[rsv].expr2 = Some(size);
    s.arena[rsv].label_name = Some("rsv".to_string());

    let top = node(&mut s, "/", &[]);
    let r = root(&mut s, &[base, rsv], top);

    let boot = s.process(r).unwrap();
    assert_eq!(boot.reserves.len(), 1);
    assert_eq!(boot.reserves[0].address, 0x1000);
    assert_eq!(boot.reserves[0].size, 0x40);
    assert_eq!(boot.reserves[0].label.as_deref(), Some("rsv"));
}

#[test]
fn test_function_return_value_in_expression() {
    let mut s = Session::new();

    // /define/ double(x) { return x * 2; }
    let x_ref = s.arena.id("x", &pos());
    let two = s.arena.literal("2", &pos());
    let product = s.arena.binop(IrKind::Mul, Some(x_ref), Some(two), &pos());
    let ret = s.arena.alloc(IrKind::Return, &pos());
    s.arena[ret].expr1 = Some(product);
    let def = func_def(&mut s, "double", &["x"], &[ret]);

    let arg = s.arena.literal("21", &pos());
    let call = func_call(&mut s, "double", &[arg]);
    let prop = named_prop(&mut s, "answer", Some(call));

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[def], top);

    let boot = s.process(r).unwrap();
    let top = boot.root.unwrap();
    let p = top.property("answer").unwrap();
    assert_eq!(p.value.bytes, 42u64.to_be_bytes());
}

#[test]
fn test_function_statement_call_emits_into_enclosing_node() {
    let mut s = Session::new();

    // /define/ stdprops() { status = "okay"; }
    let okay = s.arena.lit_str("okay", &pos());
    let status = named_prop(&mut s, "status", Some(okay));
    let def = func_def(&mut s, "stdprops", &[], &[status]);

    let call = func_call(&mut s, "stdprops", &[]);
    let eth = node(&mut s, "ethernet@0", &[call]);
    let top = node(&mut s, "/", &[eth]);
    let r = root(&mut s, &[def], top);

    let boot = s.process(r).unwrap();
    let eth = boot.root.unwrap().children.remove(0);
    let p = eth.property("status").unwrap();
    assert_eq!(p.value.bytes, b"okay\0");
}

#[test]
fn test_arity_mismatch_reports_and_fails() {
    let mut s = Session::new();

    let ret = s.arena.alloc(IrKind::Return, &pos());
    let x_ref = s.arena.id("x", &pos());
    s.arena[ret].expr1 = Some(x_ref);
    let def = func_def(&mut s, "ident", &["x"], &[ret]);

    let call = func_call(&mut s, "ident", &[]);
    let top = node(&mut s, "/", &[call]);
    let r = root(&mut s, &[def], top);

    assert!(matches!(s.process(r), Err(Error::CompileFailed { .. })));
    assert!(s
        .diagnostics
        .any_contains("not enough parameters to ident"));
}

#[test]
fn test_arity_mismatch_reports_but_still_runs_body() {
    let mut s = Session::new();

    // /define/ f() { v = nope; }  then  f(99);
    let nope = s.arena.id("nope", &pos());
    let assign = s.arena.alloc(IrKind::Assign, &pos());
    s.arena[assign].text = Some("v".to_string());
    s.arena[assign].expr1 = Some(nope);
    let def = func_def(&mut s, "f", &[], &[assign]);

    let arg = s.arena.literal("99", &pos());
    let call = func_call(&mut s, "f", &[arg]);
    let top = node(&mut s, "/", &[call]);
    let r = root(&mut s, &[def], top);

    assert!(matches!(s.process(r), Err(Error::CompileFailed { .. })));
    assert!(s.diagnostics.any_contains("too many parameters to f"));
    assert!(s.diagnostics.any_contains("unknown value for \"nope\""));
}

#[test]
fn test_missing_actual_leaves_formal_unbound() {
    let mut s = Session::new();

    let ret = s.arena.alloc(IrKind::Return, &pos());
    let x_ref = s.arena.id("x", &pos());
    s.arena[ret].expr1 = Some(x_ref);
    let def = func_def(&mut s, "ident", &["x"], &[ret]);

    let call = func_call(&mut s, "ident", &[]);
    let prop = named_prop(&mut s, "v", Some(call));
    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[def], top);

    assert!(matches!(s.process(r), Err(Error::CompileFailed { .. })));
    assert!(s.diagnostics.any_contains("not enough parameters to ident"));
    // The body ran and tripped over the unbound formal.
    assert!(s.diagnostics.any_contains("unknown value for \"x\""));
}

#[test]
fn test_const_initializer_error_reported_once() {
    let mut s = Session::new();

    // /const/ k = nope;  used twice.
    let nope = s.arena.id("nope", &pos());
    let cdef = s.arena.alloc(IrKind::ConstDef, &pos());
    s.arena[cdef].text = Some("k".to_string());
    s.arena[cdef].expr1 = Some(nope);

    let k1 = s.arena.id("k", &pos());
    let p1 = named_prop(&mut s, "a", Some(k1));
    let k2 = s.arena.id("k", &pos());
    let p2 = named_prop(&mut s, "b", Some(k2));

    let top = node(&mut s, "/", &[p1, p2]);
    let r = root(&mut s, &[cdef], top);

    assert!(s.process(r).is_err());
    let reports = s
        .diagnostics
        .iter()
        .filter(|d| d.message.contains("unknown value for \"nope\""))
        .count();
    assert_eq!(reports, 1);
}

#[test]
fn test_if_takes_branch_from_cmdline_define() {
    let mut defines = NvList::new();
    defines.note_define("debug=1");
    let mut s = Session::with_config(SessionConfig {
        defines,
        ..SessionConfig::default()
    });

    let cond = s.arena.id("debug", &pos());
    let dbg_v = s.arena.lit_str("on", &pos());
    let dbg = named_prop(&mut s, "debug-mode", Some(dbg_v));
    let rel_v = s.arena.lit_str("off", &pos());
    let rel = named_prop(&mut s, "debug-mode", Some(rel_v));

    let iff = s.arena.alloc(IrKind::If, &pos());
    s.arena[iff].expr1 = Some(cond);
    s.arena[iff].statements = s.arena.list_append(None, Some(dbg));
    s.arena[iff].statements2 = s.arena.list_append(None, Some(rel));

    let top = node(&mut s, "/", &[iff]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let top = boot.root.unwrap();
    assert_eq!(top.properties.len(), 1);
    assert_eq!(top.properties[0].value.bytes, b"on\0");
}

#[test]
fn test_incbin_slices_payload_into_property() {
    let mut blobs = MemBlobSource::new();
    blobs.insert("fw.bin", vec![0xde, 0xad, 0xbe, 0xef, 0x99]);
    let mut s = Session::with_config(SessionConfig {
        blobs: Box::new(blobs),
        ..SessionConfig::default()
    });

    let file = s.arena.lit_str("fw.bin", &pos());
    let off = s.arena.literal("1", &pos());
    let len = s.arena.literal("2", &pos());
    let inc = s
        .arena
        .triop(IrKind::Incbin, Some(file), Some(off), Some(len), &pos());
    let prop = named_prop(&mut s, "firmware", Some(inc));

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let p = boot.root.unwrap().properties.remove(0);
    assert_eq!(p.value.bytes, [0xad, 0xbe]);
}

#[test]
fn test_incbin_defaults_read_whole_file() {
    let mut blobs = MemBlobSource::new();
    blobs.insert("fw.bin", vec![1, 2, 3]);
    let mut s = Session::with_config(SessionConfig {
        blobs: Box::new(blobs),
        ..SessionConfig::default()
    });

    let file = s.arena.lit_str("fw.bin", &pos());
    let inc = s.arena.triop(IrKind::Incbin, Some(file), None, None, &pos());
    let prop = named_prop(&mut s, "firmware", Some(inc));

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    assert_eq!(boot.root.unwrap().properties[0].value.bytes, [1, 2, 3]);
}

#[test]
fn test_function_locals_do_not_leak() {
    let mut s = Session::new();

    // /define/ setter() { tmp = 5; }
    let five = s.arena.literal("5", &pos());
    let assign = s.arena.alloc(IrKind::Assign, &pos());
    s.arena[assign].text = Some("tmp".to_string());
    s.arena[assign].expr1 = Some(five);
    let def = func_def(&mut s, "setter", &[], &[assign]);

    let call = func_call(&mut s, "setter", &[]);
    let leaked = s.arena.id("tmp", &pos());
    let prop = named_prop(&mut s, "leaked", Some(leaked));

    let top = node(&mut s, "/", &[call, prop]);
    let r = root(&mut s, &[def], top);

    assert!(matches!(s.process(r), Err(Error::CompileFailed { .. })));
    assert!(s.diagnostics.any_contains("unknown value for \"tmp\""));
}

#[test]
fn test_assign_to_constant_keeps_value_and_fails_run() {
    let mut s = Session::new();

    let k = const_def(&mut s, "k", "7");
    let nine = s.arena.literal("9", &pos());
    let assign = s.arena.alloc(IrKind::Assign, &pos());
    s.arena[assign].text = Some("k".to_string());
    s.arena[assign].expr1 = Some(nine);

    let k_ref = s.arena.id("k", &pos());
    let prop = named_prop(&mut s, "v", Some(k_ref));

    let top = node(&mut s, "/", &[assign, prop]);
    let r = root(&mut s, &[k], top);

    assert!(s.process(r).is_err());
    assert!(s.diagnostics.any_contains("can't assign to constant \"k\""));
    // The original binding survived the rejected assignment.
    assert!(!s.diagnostics.any_contains("unknown value"));
}

#[test]
fn test_loop_variable_survives_loop_exit() {
    let mut s = Session::new();

    // for i in 1 .. 3 {} ; last = i;
    let start = s.arena.literal("1", &pos());
    let stop = s.arena.literal("3", &pos());
    let range = s.arena.binop(IrKind::Range, Some(start), Some(stop), &pos());
    let floop = s.arena.alloc(IrKind::For, &pos());
    s.arena[floop].text = Some("i".to_string());
    s.arena[floop].expr1 = Some(range);

    let i_ref = s.arena.id("i", &pos());
    let last = named_prop(&mut s, "last", Some(i_ref));

    let top = node(&mut s, "/", &[floop, last]);
    let r = root(&mut s, &[], top);

    let boot = s.process(r).unwrap();
    let p = boot.root.unwrap().properties.remove(0);
    assert_eq!(p.value.bytes, 3u64.to_be_bytes());
}

#[test]
fn test_const_redefinition_warns_and_first_wins() {
    let mut s = Session::new();

    let first = const_def(&mut s, "chip", "1");
    let second = const_def(&mut s, "chip", "2");
    let chip = s.arena.id("chip", &pos());
    let prop = named_prop(&mut s, "chip", Some(chip));

    let top = node(&mut s, "/", &[prop]);
    let r = root(&mut s, &[first, second], top);

    let boot = s.process(r).unwrap();
    assert_eq!(s.diagnostics.warning_count(), 1);
    assert!(s.diagnostics.any_contains("redefinition of \"chip\""));
    let p = boot.root.unwrap().properties.remove(0);
    assert_eq!(p.value.bytes, 1u64.to_be_bytes());
}
