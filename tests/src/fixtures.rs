//! Instruction builders and two versions of a small obfuscated client.
//!
//! Version 1 names its utility class `ab`; version 2 renames every obfuscated member, wraps
//! the client tick in an exception wrapper, adds an opaque trailing parameter to the logger
//! and re-keys the counter multiplier.

use remora_core::mapping::{MappedClass, MappedField, MappedMethod};
use remora_core::strip::WRAPPER_EXCEPTION;
use remora_core::{
    Artifact, ClassDef, ClassKind, Constant, FieldDef, Insn, LabelId, MethodDef, Opcode, TryCatch,
};
use tracing_subscriber::EnvFilter;

pub const GUARD_EXCEPTION: &str = "java/lang/IllegalStateException";

/// Only value the version 2 logger's guard lets through.
pub const GUARD_VALUE: i32 = 100;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

pub fn op(opcode: Opcode) -> Insn {
    Insn::Op { opcode }
}

pub fn var(opcode: Opcode, var: u16) -> Insn {
    Insn::Var { opcode, var }
}

pub fn int(value: i32) -> Insn {
    Insn::Ldc {
        constant: Constant::Int(value),
    }
}

pub fn string(value: &str) -> Insn {
    Insn::Ldc {
        constant: Constant::String(value.into()),
    }
}

pub fn label(id: u32) -> Insn {
    Insn::Label { id: LabelId(id) }
}

pub fn jump(opcode: Opcode, id: u32) -> Insn {
    Insn::Jump {
        opcode,
        target: LabelId(id),
    }
}

pub fn invoke(opcode: Opcode, owner: &str, name: &str, desc: &str) -> Insn {
    Insn::Invoke {
        opcode,
        owner: owner.into(),
        name: name.into(),
        desc: desc.into(),
        interface: false,
    }
}

pub fn field_op(opcode: Opcode, owner: &str, name: &str, desc: &str) -> Insn {
    Insn::Field {
        opcode,
        owner: owner.into(),
        name: name.into(),
        desc: desc.into(),
    }
}

pub fn method(name: &str, desc: &str, is_static: bool, instructions: Vec<Insn>) -> MethodDef {
    MethodDef {
        name: name.into(),
        desc: desc.into(),
        is_static,
        is_abstract: false,
        instructions,
        try_catch: vec![],
    }
}

pub fn field(name: &str, desc: &str) -> FieldDef {
    FieldDef {
        name: name.into(),
        desc: desc.into(),
        is_static: false,
        is_final: false,
    }
}

pub fn class(name: &str, methods: Vec<MethodDef>, fields: Vec<FieldDef>) -> ClassDef {
    ClassDef {
        name: name.into(),
        super_name: Some("java/lang/Object".into()),
        interfaces: vec![],
        kind: ClassKind::Class,
        methods,
        fields,
    }
}

/// `NEW IllegalStateException; DUP; INVOKESPECIAL <init>; ATHROW` under label `id`.
pub fn guard_failure(id: u32) -> Vec<Insn> {
    vec![
        label(id),
        Insn::TypeOp {
            opcode: Opcode::NEW,
            desc: GUARD_EXCEPTION.into(),
        },
        op(Opcode::DUP),
        invoke(Opcode::INVOKESPECIAL, GUARD_EXCEPTION, "<init>", "()V"),
        op(Opcode::ATHROW),
    ]
}

/// Wraps a body in the whole-body `RuntimeException` rethrow handler.
pub fn wrap(mut m: MethodDef, signature: &str) -> MethodDef {
    let mut instructions = vec![label(100)];
    instructions.append(&mut m.instructions);
    instructions.extend([
        label(101),
        label(102),
        var(Opcode::ASTORE, 1),
        var(Opcode::ALOAD, 1),
        string(signature),
        invoke(
            Opcode::INVOKESTATIC,
            "zz",
            "q",
            "(Ljava/lang/Throwable;Ljava/lang/String;)Lzy;",
        ),
        op(Opcode::ATHROW),
    ]);
    m.instructions = instructions;
    m.try_catch = vec![TryCatch {
        start: LabelId(100),
        end: LabelId(101),
        handler: LabelId(102),
        catch_type: Some(WRAPPER_EXCEPTION.into()),
    }];
    m
}

/// Obfuscated names and noise of one client version.
#[derive(Debug, Clone)]
pub struct Names {
    pub util: &'static str,
    pub tick: &'static str,
    pub counter: &'static str,
    pub log: &'static str,
    pub twice: &'static str,
    /// decode multiplier of the counter; the encode side is its inverse
    pub decode: i32,
    pub encode: i32,
    pub noisy: bool,
}

pub const V1: Names = Names {
    util: "ab",
    tick: "a",
    counter: "b",
    log: "c",
    twice: "d",
    decode: -1_640_531_535,
    encode: 244_002_641,
    noisy: false,
};

pub const V2: Names = Names {
    util: "zq",
    tick: "b",
    counter: "c",
    log: "e",
    twice: "f",
    decode: 625_341_585,
    encode: 1_094_995_057,
    noisy: true,
};

impl Names {
    fn log_desc(&self) -> &'static str {
        if self.noisy {
            "(Ljava/lang/String;I)V"
        } else {
            "(Ljava/lang/String;)V"
        }
    }

    /// `client.tick`: bumps the encoded counter, logs and doubles a constant.
    fn tick_method(&self) -> MethodDef {
        let mut body = vec![
            var(Opcode::ALOAD, 0),
            var(Opcode::ALOAD, 0),
            field_op(Opcode::GETFIELD, "client", self.counter, "I"),
            int(self.decode),
            op(Opcode::IMUL),
            op(Opcode::ICONST_1),
            op(Opcode::IADD),
            int(self.encode),
            op(Opcode::IMUL),
            field_op(Opcode::PUTFIELD, "client", self.counter, "I"),
            string("tick"),
        ];
        if self.noisy {
            body.push(Insn::IntPush {
                opcode: Opcode::BIPUSH,
                operand: GUARD_VALUE,
            });
        }
        body.extend([
            invoke(Opcode::INVOKESTATIC, self.util, self.log, self.log_desc()),
            op(Opcode::ICONST_3),
            invoke(Opcode::INVOKESTATIC, self.util, self.twice, "(I)I"),
            op(Opcode::POP),
            op(Opcode::RETURN),
        ]);
        let tick = method(self.tick, "()V", false, body);
        if self.noisy {
            wrap(tick, &format!("client.{}()V", self.tick))
        } else {
            tick
        }
    }

    /// `util.log`: prints its argument, behind an integrity guard when noisy.
    fn log_method(&self) -> MethodDef {
        let mut body = Vec::new();
        if self.noisy {
            body.extend([
                var(Opcode::ILOAD, 1),
                int(GUARD_VALUE),
                jump(Opcode::IF_ICMPNE, 9),
            ]);
        }
        body.extend([
            field_op(Opcode::GETSTATIC, "java/lang/System", "out", "Ljava/io/PrintStream;"),
            var(Opcode::ALOAD, 0),
            invoke(
                Opcode::INVOKEVIRTUAL,
                "java/io/PrintStream",
                "println",
                "(Ljava/lang/String;)V",
            ),
            op(Opcode::RETURN),
        ]);
        if self.noisy {
            body.extend(guard_failure(9));
        }
        method(self.log, self.log_desc(), true, body)
    }

    pub fn artifact(&self) -> Artifact {
        let init = method(
            "<init>",
            "()V",
            false,
            vec![
                var(Opcode::ALOAD, 0),
                invoke(Opcode::INVOKESPECIAL, "java/lang/Object", "<init>", "()V"),
                var(Opcode::ALOAD, 0),
                invoke(Opcode::INVOKEVIRTUAL, "client", self.tick, "()V"),
                op(Opcode::RETURN),
            ],
        );
        let twice = method(
            self.twice,
            "(I)I",
            true,
            vec![
                var(Opcode::ILOAD, 0),
                op(Opcode::ICONST_2),
                op(Opcode::IMUL),
                op(Opcode::IRETURN),
            ],
        );
        Artifact::from_classes(vec![
            class(
                "client",
                vec![init, self.tick_method()],
                vec![field(self.counter, "I")],
            ),
            class(self.util, vec![self.log_method(), twice], vec![]),
        ])
    }
}

/// Human names of version 1.
pub fn v1_mapping() -> Vec<MappedClass> {
    let method = |owner: &str, obf: &str, desc: &str, name: &str, is_static: bool| MappedMethod {
        name: name.into(),
        obfuscated_name: obf.into(),
        owner_obfuscated_name: owner.into(),
        descriptor: desc.into(),
        is_static,
        ..MappedMethod::default()
    };
    vec![
        MappedClass {
            name: "Client".into(),
            obfuscated_name: "client".into(),
            methods: vec![method("client", V1.tick, "()V", "tick", false)],
            fields: vec![MappedField {
                name: "counter".into(),
                obfuscated_name: V1.counter.into(),
                owner_obfuscated_name: "client".into(),
                descriptor: "I".into(),
                getter: Some(i64::from(V1.decode)),
                setter: Some(i64::from(V1.encode)),
                ..MappedField::default()
            }],
        },
        MappedClass {
            name: "Util".into(),
            obfuscated_name: V1.util.into(),
            methods: vec![
                method(V1.util, V1.log, "(Ljava/lang/String;)V", "log", true),
                method(V1.util, V1.twice, "(I)I", "twice", true),
            ],
            fields: vec![],
        },
    ]
}
