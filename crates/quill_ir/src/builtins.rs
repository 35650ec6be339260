//! The fixed table of built-in functions.
//!
//! The compiler declares every entry as a symbol of the outermost scope, the
//! VM dispatches them by code, so both sides read this one table.

use crate::Type;

pub mod codes {
    pub const PRINT: u16 = 0;
    pub const PRINTLN: u16 = 1;
    pub const SUBSTRING: u16 = 2;
    pub const STRLEN: u16 = 3;
    pub const CHAR_VAL: u16 = 4;
    pub const CHAR_VAL_AT: u16 = 5;
    pub const BUILD_STRING_FROM_CHARS: u16 = 6;
    pub const NOW: u16 = 7;
    pub const GET_IMEI: u16 = 8;
    pub const SEND_EMAIL: u16 = 9;
    pub const SEND_SMS: u16 = 10;
    pub const SHOW_DIALOG: u16 = 11;
    pub const SHOW_TOAST: u16 = 12;
    pub const GET_USER_ID: u16 = 13;
    pub const GET_VAR_VALUE: u16 = 14;
    pub const SET_VAR_VALUE: u16 = 15;
    pub const GO_TO_ROUTE: u16 = 16;
    pub const GET_TRANSITION: u16 = 17;
    pub const GET_HEADER: u16 = 18;
    pub const TO_STRING: u16 = 19;
    pub const FLOAT_TO_INT: u16 = 20;
    pub const READ_INT: u16 = 21;
    pub const READ_FLOAT: u16 = 22;
    pub const READ_STRING: u16 = 23;
    pub const READ_BOOL: u16 = 24;
}

/// Primitive result types a built-in can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnType {
    Int,
    Float,
    Bool,
    String,
    Void,
}

impl ReturnType {
    pub fn to_type(self) -> Type {
        match self {
            ReturnType::Int => Type::Int,
            ReturnType::Float => Type::Float,
            ReturnType::Bool => Type::Bool,
            ReturnType::String => Type::String,
            ReturnType::Void => Type::Void,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    String,
    /// Any of `int`, `float`, `bool` or `string`.
    AnyPrimitive,
    /// An `int` vector of any size, passed by reference.
    IntVector,
}

impl ParamType {
    pub fn accepts(&self, ty: &Type) -> bool {
        match self {
            ParamType::Int => Type::Int.accepts(ty),
            ParamType::Float => Type::Float.accepts(ty),
            ParamType::Bool => Type::Bool.accepts(ty),
            ParamType::String => Type::String.accepts(ty),
            ParamType::AnyPrimitive => ty.is_primitive(),
            ParamType::IntVector => ty.num_dims() == 1 && ty.base() == &Type::Int,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::String => "string",
            ParamType::AnyPrimitive => "a primitive value",
            ParamType::IntVector => "int[]",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinParam {
    pub name: &'static str,
    pub ty: ParamType,
    pub by_ref: bool,
}

/// How a call to a built-in is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    Syscall,
    /// A blocking read, compiled to `READ` with the given kind.
    Read(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub code: u16,
    pub name: &'static str,
    pub ret: ReturnType,
    pub params: &'static [BuiltinParam],
    pub kind: BuiltinKind,
}

impl Builtin {
    pub fn ret_type(&self) -> Type {
        self.ret.to_type()
    }

    /// Stack cells taken by the arguments.
    pub fn arg_cells(&self) -> usize {
        self.params.len()
    }
}

macro_rules! param {
    ($name:literal: $ty:ident) => {
        BuiltinParam {
            name: $name,
            ty: ParamType::$ty,
            by_ref: false,
        }
    };
    (ref $name:literal: $ty:ident) => {
        BuiltinParam {
            name: $name,
            ty: ParamType::$ty,
            by_ref: true,
        }
    };
}

const fn syscall(
    code: u16,
    name: &'static str,
    ret: ReturnType,
    params: &'static [BuiltinParam],
) -> Builtin {
    Builtin {
        code,
        name,
        ret,
        params,
        kind: BuiltinKind::Syscall,
    }
}

const fn read(code: u16, name: &'static str, ret: ReturnType, kind: char) -> Builtin {
    Builtin {
        code,
        name,
        ret,
        params: &[],
        kind: BuiltinKind::Read(kind),
    }
}

use codes::*;
use ReturnType as R;

/// Indexed by code.
pub static BUILTINS: &[Builtin] = &[
    syscall(PRINT, "print", R::Void, &[param!("value": AnyPrimitive)]),
    syscall(PRINTLN, "println", R::Void, &[param!("value": AnyPrimitive)]),
    syscall(
        SUBSTRING,
        "substring",
        R::String,
        &[
            param!("s": String),
            param!("start": Int),
            param!("length": Int),
        ],
    ),
    syscall(STRLEN, "strlen", R::Int, &[param!("s": String)]),
    syscall(CHAR_VAL, "charVal", R::Int, &[param!("c": String)]),
    syscall(
        CHAR_VAL_AT,
        "charValAt",
        R::Int,
        &[param!("s": String), param!("index": Int)],
    ),
    syscall(
        BUILD_STRING_FROM_CHARS,
        "buildStringFromChars",
        R::String,
        &[param!(ref "chars": IntVector), param!("count": Int)],
    ),
    syscall(NOW, "now", R::Int, &[]),
    syscall(GET_IMEI, "getImei", R::String, &[]),
    syscall(
        SEND_EMAIL,
        "sendEmail",
        R::Bool,
        &[
            param!("to": String),
            param!("subject": String),
            param!("body": String),
        ],
    ),
    syscall(
        SEND_SMS,
        "sendSms",
        R::Bool,
        &[param!("number": String), param!("text": String)],
    ),
    syscall(
        SHOW_DIALOG,
        "showDialog",
        R::Void,
        &[param!("title": String), param!("message": String)],
    ),
    syscall(SHOW_TOAST, "showToast", R::Void, &[param!("message": String)]),
    syscall(GET_USER_ID, "getUserId", R::String, &[]),
    syscall(GET_VAR_VALUE, "getVarValue", R::String, &[param!("name": String)]),
    syscall(
        SET_VAR_VALUE,
        "setVarValue",
        R::Void,
        &[param!("name": String), param!("value": String)],
    ),
    syscall(GO_TO_ROUTE, "goToRoute", R::Void, &[param!("route": String)]),
    syscall(GET_TRANSITION, "getTransition", R::String, &[]),
    syscall(GET_HEADER, "getHeader", R::String, &[param!("name": String)]),
    syscall(TO_STRING, "toString", R::String, &[param!("value": AnyPrimitive)]),
    syscall(FLOAT_TO_INT, "floatToInt", R::Int, &[param!("value": Float)]),
    read(READ_INT, "readInt", R::Int, 'i'),
    read(READ_FLOAT, "readFloat", R::Float, 'f'),
    read(READ_STRING, "readString", R::String, 's'),
    read(READ_BOOL, "readBool", R::Bool, 'b'),
];

pub fn by_code(code: u16) -> Option<&'static Builtin> {
    BUILTINS.get(usize::from(code))
}
