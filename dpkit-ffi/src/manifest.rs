//! Self-describing manifest of the C ABI, computed on demand.

use dpkit_core::catalog::{Constructor, Returns};
use dpkit_core::{err, Fallible, Primitive, CONSTRUCTORS};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub name: &'static str,
    pub version: &'static str,
    pub types: Vec<&'static str>,
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Serialize)]
pub struct ModuleEntry {
    pub name: &'static str,
    pub functions: Vec<FunctionEntry>,
}

#[derive(Debug, Serialize)]
pub struct FunctionEntry {
    pub name: &'static str,
    pub symbol: String,
    pub type_params: Vec<&'static str>,
    pub params: Vec<ParamEntry>,
    pub returns: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ParamEntry {
    pub name: &'static str,
    pub c_type: &'static str,
    pub rust_type: &'static str,
}

struct Signature {
    name: &'static str,
    params: &'static [(&'static str, &'static str, &'static str)],
    returns: &'static str,
}

const OBJECT: &str = "AnyObject *";
const TRANSFORMATION: &str = "AnyTransformation *";
const MEASUREMENT: &str = "AnyMeasurement *";

const CORE: &[Signature] = &[
    Signature {
        name: "make_chain_tt",
        params: &[
            ("transformation1", "dpkit_transformation_t", TRANSFORMATION),
            ("transformation0", "dpkit_transformation_t", TRANSFORMATION),
        ],
        returns: "FfiResult<AnyTransformation *>",
    },
    Signature {
        name: "make_chain_mt",
        params: &[
            ("measurement1", "dpkit_measurement_t", MEASUREMENT),
            ("transformation0", "dpkit_transformation_t", TRANSFORMATION),
        ],
        returns: "FfiResult<AnyMeasurement *>",
    },
    Signature {
        name: "make_composition",
        params: &[
            ("measurement0", "dpkit_measurement_t", MEASUREMENT),
            ("measurement1", "dpkit_measurement_t", MEASUREMENT),
        ],
        returns: "FfiResult<AnyMeasurement *>",
    },
    Signature {
        name: "make_postprocess",
        params: &[
            ("transformation1", "dpkit_transformation_t", TRANSFORMATION),
            ("measurement0", "dpkit_measurement_t", MEASUREMENT),
        ],
        returns: "FfiResult<AnyMeasurement *>",
    },
    Signature {
        name: "transformation_invoke",
        params: &[
            ("this", "dpkit_transformation_t", TRANSFORMATION),
            ("arg", "dpkit_object_t", OBJECT),
        ],
        returns: "FfiResult<AnyObject *>",
    },
    Signature {
        name: "transformation_check",
        params: &[
            ("this", "dpkit_transformation_t", TRANSFORMATION),
            ("d_in", "dpkit_object_t", OBJECT),
            ("d_out", "dpkit_object_t", OBJECT),
        ],
        returns: "FfiResult<bool>",
    },
    Signature {
        name: "transformation_map",
        params: &[
            ("this", "dpkit_transformation_t", TRANSFORMATION),
            ("d_in", "dpkit_object_t", OBJECT),
        ],
        returns: "FfiResult<AnyObject *>",
    },
    Signature {
        name: "transformation_input_type",
        params: &[("this", "dpkit_transformation_t", TRANSFORMATION)],
        returns: "FfiResult<char *>",
    },
    Signature {
        name: "transformation_free",
        params: &[("this", "dpkit_transformation_t", TRANSFORMATION)],
        returns: "FfiResult<void *>",
    },
    Signature {
        name: "measurement_invoke",
        params: &[("this", "dpkit_measurement_t", MEASUREMENT), ("arg", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<AnyObject *>",
    },
    Signature {
        name: "measurement_check",
        params: &[
            ("this", "dpkit_measurement_t", MEASUREMENT),
            ("d_in", "dpkit_object_t", OBJECT),
            ("d_out", "dpkit_object_t", OBJECT),
        ],
        returns: "FfiResult<bool>",
    },
    Signature {
        name: "measurement_map",
        params: &[("this", "dpkit_measurement_t", MEASUREMENT), ("d_in", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<AnyObject *>",
    },
    Signature {
        name: "measurement_free",
        params: &[("this", "dpkit_measurement_t", MEASUREMENT)],
        returns: "FfiResult<void *>",
    },
    Signature {
        name: "error_free",
        params: &[("this", "FfiError *", "FfiError *")],
        returns: "bool",
    },
    Signature {
        name: "bootstrap",
        params: &[],
        returns: "FfiResult<char *>",
    },
];

const DATA: &[Signature] = &[
    Signature {
        name: "slice_as_object",
        params: &[("raw", "const FfiSlice *", "FfiSlice *"), ("T", "const char *", "&str")],
        returns: "FfiResult<AnyObject *>",
    },
    Signature {
        name: "object_type",
        params: &[("this", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<char *>",
    },
    Signature {
        name: "object_as_slice",
        params: &[("this", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<FfiSlice *>",
    },
    Signature {
        name: "object_free",
        params: &[("this", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<void *>",
    },
    Signature {
        name: "slice_free",
        params: &[("this", "FfiSlice *", "FfiSlice *")],
        returns: "FfiResult<void *>",
    },
    Signature {
        name: "str_free",
        params: &[("this", "char *", "char *")],
        returns: "FfiResult<void *>",
    },
    Signature {
        name: "to_string",
        params: &[("this", "dpkit_object_t", OBJECT)],
        returns: "FfiResult<char *>",
    },
];

impl FunctionEntry {
    fn fixed(module: &str, signature: &Signature) -> Self {
        Self {
            name: signature.name,
            symbol: format!("dpkit_{module}__{}", signature.name),
            type_params: Vec::new(),
            params: signature
                .params
                .iter()
                .map(|&(name, c_type, rust_type)| ParamEntry {
                    name,
                    c_type,
                    rust_type,
                })
                .collect(),
            returns: signature.returns,
        }
    }

    fn constructor(ctor: &Constructor) -> Self {
        let generic = |rust_type: &str| ctor.type_params.iter().any(|t| *t == rust_type);
        let values = ctor.params.iter().map(|param| ParamEntry {
            name: param.name,
            c_type: if generic(param.rust_type) {
                "const void *"
            } else if param.rust_type.starts_with("Vec<") {
                "dpkit_object_t"
            } else {
                Primitive::parse(param.rust_type).map_or("const void *", |p| p.c_type())
            },
            rust_type: param.rust_type,
        });
        let type_args = ctor.type_params.iter().map(|&name| ParamEntry {
            name,
            c_type: "const char *",
            rust_type: "&str",
        });
        Self {
            name: ctor.name,
            symbol: format!("dpkit_{}__{}", ctor.module.name(), ctor.name),
            type_params: ctor.type_params.to_vec(),
            params: values.chain(type_args).collect(),
            returns: match ctor.returns {
                Returns::Transformation => "FfiResult<AnyTransformation *>",
                Returns::Measurement => "FfiResult<AnyMeasurement *>",
            },
        }
    }
}

pub fn manifest() -> Manifest {
    let mut modules = vec![
        ModuleEntry {
            name: "core",
            functions: CORE.iter().map(|s| FunctionEntry::fixed("core", s)).collect(),
        },
        ModuleEntry {
            name: "data",
            functions: DATA.iter().map(|s| FunctionEntry::fixed("data", s)).collect(),
        },
    ];
    for module in ["trans", "meas"] {
        modules.push(ModuleEntry {
            name: module,
            functions: CONSTRUCTORS
                .iter()
                .filter(|ctor| ctor.module.name() == module)
                .map(FunctionEntry::constructor)
                .collect(),
        });
    }
    Manifest {
        name: "dpkit",
        version: env!("CARGO_PKG_VERSION"),
        types: Primitive::ALL.iter().map(Primitive::name).collect(),
        modules,
    }
}

pub fn manifest_json() -> Fallible<String> {
    serde_json::to_string_pretty(&manifest())
        .map_err(|e| err!(FailedFunction, "manifest serialization failed: {e}"))
}
